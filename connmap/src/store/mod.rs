//! Aggregation store: open connection counts per grid cell.
//!
//! The store is the only long-lived mutable state in the pipeline. The
//! processing loop is its single writer; any number of readers (renderers,
//! exporters) take snapshots concurrently.
//!
//! # Invariants
//!
//! - Every key present has a count of at least 1. A cell reaching zero is
//!   removed, so absence and zero mean the same thing.
//! - Decrementing an absent cell is a no-op. A close with no matching open
//!   (process started mid-session, or the open's lookup failed) never pushes
//!   a count negative.
//!
//! # Consistency
//!
//! Each cell is updated under its shard lock, so a reader never sees a torn
//! count. A [`GridSnapshot`] copies cells one shard at a time and may observe
//! different cells at slightly different instants.

use std::collections::HashMap;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::grid::GridCell;

/// Concurrent map from grid cell to open connection count.
#[derive(Debug, Default)]
pub struct AggregationStore {
    cells: DashMap<GridCell, u64>,
}

impl AggregationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            cells: DashMap::new(),
        }
    }

    /// Count one more open connection in `cell`. Returns the new count.
    pub fn increment(&self, cell: GridCell) -> u64 {
        let mut count = self.cells.entry(cell).or_insert(0);
        *count += 1;
        *count
    }

    /// Count one fewer open connection in `cell`.
    ///
    /// Returns the remaining count, or `None` if the cell was absent and
    /// nothing changed.
    pub fn decrement(&self, cell: GridCell) -> Option<u64> {
        match self.cells.entry(cell) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= 1 {
                    entry.remove();
                    Some(0)
                } else {
                    *entry.get_mut() -= 1;
                    Some(*entry.get())
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Current count for a cell; zero when absent.
    pub fn count(&self, cell: GridCell) -> u64 {
        self.cells.get(&cell).map(|count| *count).unwrap_or(0)
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Copy the current counts into an immutable snapshot.
    pub fn snapshot(&self) -> GridSnapshot {
        let cells = self
            .cells
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        GridSnapshot { cells }
    }
}

/// Point-in-time copy of the store, safe to iterate while the store mutates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridSnapshot {
    cells: HashMap<GridCell, u64>,
}

/// One occupied cell, as exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellCount {
    pub column: u32,
    pub row: u32,
    pub count: u64,
}

impl GridSnapshot {
    /// Count for a cell; zero when absent.
    pub fn count(&self, cell: GridCell) -> u64 {
        self.cells.get(&cell).copied().unwrap_or(0)
    }

    /// Number of occupied cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether no cell is occupied.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sum of all counts: total open connections on the map.
    pub fn total(&self) -> u64 {
        self.cells.values().sum()
    }

    /// Largest single-cell count.
    pub fn max_count(&self) -> u64 {
        self.cells.values().copied().max().unwrap_or(0)
    }

    /// Iterate occupied cells in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (GridCell, u64)> + '_ {
        self.cells.iter().map(|(cell, count)| (*cell, *count))
    }

    /// Occupied cells sorted by row, then column.
    pub fn sorted(&self) -> Vec<CellCount> {
        let mut cells: Vec<CellCount> = self
            .iter()
            .map(|(cell, count)| CellCount {
                column: cell.column,
                row: cell.row,
                count,
            })
            .collect();
        cells.sort_by_key(|c| (c.row, c.column));
        cells
    }
}

impl FromIterator<(GridCell, u64)> for GridSnapshot {
    fn from_iter<I: IntoIterator<Item = (GridCell, u64)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().filter(|(_, count)| *count > 0).collect(),
        }
    }
}
