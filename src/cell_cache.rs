//! Per-generation memo of resolved grid cells
//!
//! Every repaint of the table view re-reads the same visible cells; the
//! binary search behind a sample-column read should run once per cell per
//! grid generation. The cache is a flat row-major array of optional slots,
//! reallocated whenever the index is rebuilt — it must never outlive the
//! grid shape it was sized for.

use rusqlite::types::Value;

use crate::table::VirtualTableIndex;

/// Flat (row, column) memo in front of [`VirtualTableIndex`].
pub struct CellValueCache {
    rows: usize,
    columns: usize,
    cells: Vec<Option<Value>>,
}

impl CellValueCache {
    /// Allocate an all-unset cache for a grid of the given shape.
    pub fn for_grid(rows: usize, columns: usize) -> Self {
        CellValueCache {
            rows,
            columns,
            cells: vec![None; rows * columns],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Memoized read. Out-of-range coordinates never reach the index and
    /// read as Null, matching the index's own edge behavior.
    pub fn get(&mut self, row: usize, column: usize, index: &mut VirtualTableIndex) -> Value {
        if row >= self.rows || column >= self.columns {
            return Value::Null;
        }
        let slot = row * self.columns + column;
        if let Some(value) = &self.cells[slot] {
            return value.clone();
        }
        let value = index.value(row, column);
        self.cells[slot] = Some(value.clone());
        value
    }
}
