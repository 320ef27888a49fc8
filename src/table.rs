//! Virtual table over sequential feature streams
//!
//! The feature table the UI shows is a cross-product of all consensus
//! features (rows) and all samples (columns after four fixed metadata
//! columns). The store never materializes that grid; it only exposes two
//! ordered streams:
//! - the row-attribute stream: one row per consensus feature, ordered by
//!   the row sort key (consensus m/z, then id) — positions map 1:1 to rows;
//! - the cell-value stream: one row per observed (feature, sample) pair,
//!   globally ordered by (feature_id, sample_id), sparse.
//!
//! [`VirtualTableIndex`] buffers both streams behind seekable cursors and
//! answers `value(row, column)` queries. Sample-column lookups resolve via
//! the **feature block index** (FeatureId → contiguous run of cell
//! positions, built in one scan at reset) followed by a binary search over
//! seeks within the block. A missing observation is the literal `"0"`;
//! out-of-range coordinates read as SQL NULL, never an error.
//!
//! [`FeatureTableModel`] couples the index with a [`CellValueCache`] so the
//! display layer's repeated reads of the same cells skip the search.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use anyhow_ext::{Context, Result};
use fallible_iterator::FallibleIterator;
use log::debug;
use rusqlite::Connection;
use rusqlite::types::Value;

use crate::cell_cache::CellValueCache;
use crate::cursor::SeekableCursor;
use crate::error::FeatureDbError;
use crate::model::{ConsensusFeature, FeatureId, Sample, SampleFeatureRow, SampleId};
use crate::queries;

/// Number of fixed metadata columns before the per-sample columns.
pub const SAMPLE_COLUMNS_OFFSET: usize = 4;

/// Cell content when a feature has no observation in a sample.
pub fn default_cell_value() -> Value {
    Value::Text("0".to_string())
}

/// The fixed metadata columns, in display order.
#[derive(Copy, Clone, Debug, PartialEq, strum_macros::Display)]
pub enum FixedColumn {
    #[strum(serialize = "Feature ID")]
    FeatureId = 0,
    #[strum(serialize = "Consensus mz")]
    ConsensusMz = 1,
    #[strum(serialize = "Consensus RT")]
    ConsensusRt = 2,
    #[strum(serialize = "Consensus charge")]
    ConsensusCharge = 3,
}

impl FixedColumn {
    pub fn from_column(column: usize) -> Option<FixedColumn> {
        match column {
            0 => Some(FixedColumn::FeatureId),
            1 => Some(FixedColumn::ConsensusMz),
            2 => Some(FixedColumn::ConsensusRt),
            3 => Some(FixedColumn::ConsensusCharge),
            _ => None,
        }
    }
}

/// One feature's contiguous run in the cell-value stream.
#[derive(Copy, Clone, Debug, PartialEq)]
struct FeatureBlock {
    start: usize,
    count: usize,
}

/// Random (row, column) access over the two sequential feature streams.
pub struct VirtualTableIndex {
    row_cursor: SeekableCursor<ConsensusFeature>,
    cell_cursor: SeekableCursor<SampleFeatureRow>,
    samples: Vec<Sample>,
    feature_blocks: HashMap<FeatureId, FeatureBlock>,
    lookups: u64,
}

impl VirtualTableIndex {
    /// Run the source queries and index their streams.
    pub fn build(db: &Connection) -> Result<Self> {
        let consensus = queries::list_consensus_features(db).dot()?;
        let cells = queries::list_sample_feature_rows(db).dot()?;
        let samples = queries::list_samples(db).dot()?;
        let index = Self::from_streams(consensus, cells, samples)?;
        debug!(
            "table index built: {} rows x {} columns, {} observed cells in {} blocks",
            index.row_count(),
            index.column_count(),
            index.cell_cursor.len(),
            index.feature_blocks.len()
        );
        Ok(index)
    }

    /// Index already-buffered streams. `consensus` must be in row order and
    /// `cells` globally ordered by (feature_id, sample_id).
    pub fn from_streams(
        consensus: Vec<ConsensusFeature>,
        cells: Vec<SampleFeatureRow>,
        samples: Vec<Sample>,
    ) -> Result<Self, FeatureDbError> {
        let feature_blocks = build_feature_blocks(&cells)?;
        Ok(VirtualTableIndex {
            row_cursor: SeekableCursor::new(consensus),
            cell_cursor: SeekableCursor::new(cells),
            samples,
            feature_blocks,
            lookups: 0,
        })
    }

    pub fn row_count(&self) -> usize {
        self.row_cursor.len()
    }

    pub fn column_count(&self) -> usize {
        SAMPLE_COLUMNS_OFFSET + self.samples.len()
    }

    /// The feature id backing a row, if the row exists.
    pub fn row_key(&mut self, row: usize) -> Option<FeatureId> {
        self.row_cursor.seek(row).map(|feature| feature.id)
    }

    /// The sample backing a column, for columns past the fixed offset.
    pub fn column_sample_id(&self, column: usize) -> Option<SampleId> {
        column
            .checked_sub(SAMPLE_COLUMNS_OFFSET)
            .and_then(|i| self.samples.get(i))
            .map(|sample| sample.id)
    }

    /// Header label for a column: fixed names, then sample names.
    pub fn column_label(&self, column: usize) -> Option<String> {
        if let Some(fixed) = FixedColumn::from_column(column) {
            return Some(fixed.to_string());
        }
        column
            .checked_sub(SAMPLE_COLUMNS_OFFSET)
            .and_then(|i| self.samples.get(i))
            .map(|sample| sample.name.clone())
    }

    /// Number of `value` calls answered since the build. Lets callers verify
    /// that a memoization layer in front of the index actually short-circuits.
    pub fn lookup_count(&self) -> u64 {
        self.lookups
    }

    /// Resolve one grid cell.
    ///
    /// Fixed columns read the row-attribute cursor directly. Sample columns
    /// binary-search the feature's block of the cell stream; no observation
    /// resolves to the `"0"` default. Out-of-range coordinates read as Null.
    pub fn value(&mut self, row: usize, column: usize) -> Value {
        self.lookups += 1;
        if row >= self.row_count() || column >= self.column_count() {
            return Value::Null;
        }

        if column < SAMPLE_COLUMNS_OFFSET {
            return match self.row_cursor.seek(row) {
                Some(feature) => match column {
                    0 => Value::Integer(feature.id),
                    1 => Value::Real(feature.consensus_mz),
                    2 => Value::Real(feature.consensus_rt),
                    _ => Value::Integer(feature.consensus_charge),
                },
                None => Value::Null,
            };
        }

        let Some(feature_id) = self.row_key(row) else {
            return Value::Null;
        };
        let Some(sample_id) = self.column_sample_id(column) else {
            return Value::Null;
        };
        let Some(&block) = self.feature_blocks.get(&feature_id) else {
            // feature observed in no sample at all
            return default_cell_value();
        };
        match self.search_block(block, sample_id) {
            Some(intensity) => Value::Real(intensity),
            None => default_cell_value(),
        }
    }

    // Binary search by sample id inside one feature block, seeking the cell
    // cursor at each probe. Bounds are inclusive: left/right start at the
    // block edges, narrow while more than two candidates remain, then both
    // survivors are checked for the exact key (at most one can hold it).
    fn search_block(&mut self, block: FeatureBlock, sample_id: SampleId) -> Option<f64> {
        let mut left = block.start;
        let mut right = block.start + block.count - 1;

        while right - left > 1 {
            let mid = left + (right - left) / 2;
            let probe = self.cell_cursor.seek(mid)?;
            if probe.sample_id < sample_id {
                left = mid;
            } else {
                right = mid;
            }
        }

        let left_row = self.cell_cursor.seek(left)?;
        if left_row.sample_id == sample_id {
            return Some(left_row.intensity);
        }
        let right_row = self.cell_cursor.seek(right)?;
        if right_row.sample_id == sample_id {
            return Some(right_row.intensity);
        }
        None
    }
}

// One ordered scan over the cell stream, noting where each feature's run
// starts and how long it is. Also the point where broken stream ordering
// gets caught: a feature run must be contiguous and its sample ids strictly
// ascending.
fn build_feature_blocks(
    cells: &[SampleFeatureRow],
) -> Result<HashMap<FeatureId, FeatureBlock>, FeatureDbError> {
    let mut blocks: HashMap<FeatureId, FeatureBlock> = HashMap::new();

    for (position, cell) in cells.iter().enumerate() {
        if position > 0 {
            let prev = &cells[position - 1];
            if prev.feature_id == cell.feature_id && prev.sample_id >= cell.sample_id {
                return Err(FeatureDbError::InvariantViolation(format!(
                    "cell stream not ordered by sample id within feature {} at position {}",
                    cell.feature_id, position
                )));
            }
        }
        match blocks.entry(cell.feature_id) {
            Entry::Vacant(entry) => {
                entry.insert(FeatureBlock {
                    start: position,
                    count: 1,
                });
            }
            Entry::Occupied(mut entry) => {
                let block = entry.get_mut();
                if block.start + block.count != position {
                    return Err(FeatureDbError::InvariantViolation(format!(
                        "cell stream run for feature {} restarts at position {}",
                        cell.feature_id, position
                    )));
                }
                block.count += 1;
            }
        }
    }

    Ok(blocks)
}

/// The table the display layer holds: index plus per-generation cell memo.
pub struct FeatureTableModel {
    index: VirtualTableIndex,
    cache: CellValueCache,
}

impl FeatureTableModel {
    pub fn build(db: &Connection) -> Result<Self> {
        let index = VirtualTableIndex::build(db)?;
        let cache = CellValueCache::for_grid(index.row_count(), index.column_count());
        Ok(FeatureTableModel { index, cache })
    }

    /// Rebuild both streams and reallocate the cell memo. Called on every
    /// reset event; a stale memo over a resized grid must never survive.
    pub fn reset(&mut self, db: &Connection) -> Result<()> {
        self.index = VirtualTableIndex::build(db)?;
        self.cache = CellValueCache::for_grid(self.index.row_count(), self.index.column_count());
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.index.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.index.column_count()
    }

    pub fn column_label(&self, column: usize) -> Option<String> {
        self.index.column_label(column)
    }

    pub fn row_key(&mut self, row: usize) -> Option<FeatureId> {
        self.index.row_key(row)
    }

    pub fn lookup_count(&self) -> u64 {
        self.index.lookup_count()
    }

    /// Memoized cell read.
    pub fn value(&mut self, row: usize, column: usize) -> Value {
        self.cache.get(row, column, &mut self.index)
    }

    /// Iterate all rows as value vectors, in row order. This is the feed for
    /// the excluded export path.
    pub fn iter_rows(&mut self) -> TableRowIter<'_> {
        TableRowIter {
            model: self,
            next_row: 0,
        }
    }
}

/// Row-by-row iteration over the whole grid.
pub struct TableRowIter<'a> {
    model: &'a mut FeatureTableModel,
    next_row: usize,
}

impl FallibleIterator for TableRowIter<'_> {
    type Item = Vec<Value>;
    type Error = anyhow::Error;

    fn next(&mut self) -> Result<Option<Vec<Value>>> {
        if self.next_row >= self.model.row_count() {
            return Ok(None);
        }
        let columns = self.model.column_count();
        let mut values = Vec::with_capacity(columns);
        for column in 0..columns {
            values.push(self.model.value(self.next_row, column));
        }
        self.next_row += 1;
        Ok(Some(values))
    }
}
