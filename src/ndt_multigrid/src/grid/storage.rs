//! Sparse cell storage addressed by integer index.

use std::collections::HashMap;

/// Integer cell coordinate, one component per axis.
pub type CellIndex<const D: usize> = [i32; D];

/// Sparse map of cells restricted to the index range `offset..offset + size`.
///
/// The range is chosen at construction and never grows. Only cells that
/// were inserted take memory.
#[derive(Debug)]
pub struct CellStorage<T, const D: usize> {
    offset: CellIndex<D>,
    size: [usize; D],
    cells: HashMap<CellIndex<D>, T>,
}

impl<T, const D: usize> CellStorage<T, D> {
    /// Create empty storage for indices `offset[i] ..= offset[i] + size[i] - 1`.
    pub fn new(offset: CellIndex<D>, size: [usize; D]) -> Self {
        Self {
            offset,
            size,
            cells: HashMap::new(),
        }
    }

    /// Lowest addressable index.
    pub fn offset(&self) -> CellIndex<D> {
        self.offset
    }

    /// Number of cells along each axis.
    pub fn size(&self) -> [usize; D] {
        self.size
    }

    /// Whether `index` lies inside the addressable range.
    pub fn contains(&self, index: &CellIndex<D>) -> bool {
        (0..D).all(|axis| {
            let local = i64::from(index[axis]) - i64::from(self.offset[axis]);
            local >= 0 && (local as u64) < self.size[axis] as u64
        })
    }

    /// Cell at `index`, if it exists.
    pub fn get(&self, index: &CellIndex<D>) -> Option<&T> {
        self.cells.get(index)
    }

    /// Cell at `index`, inserting `init()` when empty.
    ///
    /// Returns `None` if `index` is outside the range.
    pub fn get_or_insert_with(
        &mut self,
        index: &CellIndex<D>,
        init: impl FnOnce() -> T,
    ) -> Option<&mut T> {
        if !self.contains(index) {
            return None;
        }
        Some(self.cells.entry(*index).or_insert_with(init))
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over occupied cells with their indices, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (CellIndex<D>, &T)> + '_ {
        self.cells.iter().map(|(index, cell)| (*index, cell))
    }
}
