//! featdb: a Rust library for reading LC-MS feature detection results from SQLite
//!
//! A feature store holds the output of label-free feature detection over a
//! batch of LC-MS runs: consensus features, their per-sample intensities,
//! extracted mass traces and the MS2 scans acquired inside those traces.
//! This library virtualizes that store for interactive consumers, so a
//! million-cell intensity matrix or a multi-feature trace overlay is served
//! from compact sorted streams instead of materialized grids.
//!
//! # Features
//!
//! - **Virtual table access**: spreadsheet-style (row, column) reads over the
//!   consensus feature matrix, backed by binary search over a sparse stream
//! - **Cell memoization**: each (row, column) hits the index at most once
//! - **Selection cache**: mass traces and MS2 scans for the selected
//!   (sample, feature) pairs, fetched in one round trip with delta reuse
//! - **Timeline merge**: XIC points and MS2 events interleaved in retention
//!   time order, with interpolated event intensities
//! - **Plot payloads**: typed XIC and mass-peak series ready for a chart layer
//!
//! # Quick Start
//!
//! ```no_run
//! use std::collections::HashMap;
//! use featdb::{FeatureDbReader, WorkingSet};
//!
//! let mut reader = FeatureDbReader::open("path/to/features.sqlite").unwrap();
//! println!("{} samples, {} features", reader.sample_count(), reader.feature_count());
//!
//! // Spreadsheet-style access to the consensus table
//! let mut table = reader.table_model().unwrap();
//! for row in 0..table.row_count().min(5) {
//!     println!("feature id cell: {:?}", table.value(row, 0));
//! }
//!
//! // Load traces for two pairs and assemble the plot payload
//! let selection = WorkingSet::from_pairs([(1, 10), (2, 10)]);
//! let plot = reader.select_features(&selection, &HashMap::new()).unwrap();
//! println!("{} XIC series", plot.xic_series.len());
//! ```
//!
//! # Module Organization
//!
//! - [`model`]: core data structures (features, trace points, working sets)
//! - [`codec`]: binary blob encoding and decoding
//! - [`queries`]: low-level database query functions
//! - [`query_utils`]: single-value query helpers
//! - [`table`]: virtual table index and table model
//! - [`cell_cache`]: write-once cell memoization grid
//! - [`cursor`]: seekable in-memory row cursor
//! - [`active_cache`]: selection-driven trace and MS2 scan cache
//! - [`timeline`]: XIC / MS2 event merge
//! - [`graph`]: plot payload assembly
//! - [`error`]: typed error conditions

pub mod active_cache;
pub mod cell_cache;
pub mod codec;
pub mod cursor;
pub mod error;
pub mod graph;
pub mod model;
pub mod queries;
pub mod query_utils;
pub mod table;
pub mod timeline;

// Re-export main types for convenience
pub use model::{
    ConsensusFeature, Feature, FeatureId, GraphPoint, MassPeak, Ms2ScanInfo, Sample,
    SampleFeatureRow, SampleId, SpectrumId, SpectrumPoint, TracePoint, WorkingSet, XicPoint,
    format_series_id,
};

// Re-export the typed error
pub use error::FeatureDbError;

// Re-export table types
pub use table::{FeatureTableModel, FixedColumn, SAMPLE_COLUMNS_OFFSET, VirtualTableIndex};

// Re-export cache types
pub use active_cache::{ActiveFeatureCache, QUERY_PARAMS_LIMIT};
pub use cell_cache::CellValueCache;

// Re-export plot payload types
pub use graph::{MassPeakSeries, PlotData, XicSeries};

// Re-export codec functions
pub use codec::{
    SPECTRUM_RECORD_SIZE, TRACE_RECORD_SIZE, decode_spectrum_points, decode_trace_points,
    encode_spectrum_points, encode_trace_points,
};

// Re-export query utility functions
pub use query_utils::{
    query_single_i64, query_single_i64_required, query_single_string, table_exists,
};

use std::collections::HashMap;

use anyhow_ext::{Context, Result, anyhow};
use log::{debug, info};
use rusqlite::Connection;

use crate::graph::build_plot_data;

/// Tables a feature store must carry. Opening anything that lacks one of
/// these fails instead of producing a reader that errors on first use.
const REQUIRED_TABLES: [&str; 6] = [
    "Sample",
    "Feature",
    "SampleFeature",
    "FeatureMassTrace",
    "MassTraceFragmentationSpectrum",
    "FragmentationSpectrum",
];

/// Main entry point for reading a feature store
///
/// The `FeatureDbReader` owns the SQLite connection and the dataset catalog
/// (samples, consensus-feature count) plus the [`ActiveFeatureCache`] that
/// follows the current selection. Table access goes through a separately
/// owned [`FeatureTableModel`] so a table view can hold one without
/// borrowing the reader.
///
/// # Example
///
/// ```no_run
/// use featdb::FeatureDbReader;
///
/// let reader = FeatureDbReader::open("path/to/features.sqlite").unwrap();
/// for sample in reader.samples() {
///     println!("sample {}: {}", sample.id, sample.name);
/// }
/// ```
#[derive(Debug)]
pub struct FeatureDbReader {
    connection: Connection,
    samples: Vec<Sample>,
    sample_names: HashMap<SampleId, String>,
    feature_count: i64,
    active_cache: ActiveFeatureCache,
}

impl FeatureDbReader {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Open a feature store file for reading
    pub fn open(path: &str) -> Result<Self> {
        let connection = Connection::open(path).dot()?;
        Self::init(connection)
    }

    /// Wrap an already-open connection, e.g. an in-memory fixture. The
    /// connection must already hold a populated feature store schema.
    pub fn from_connection(connection: Connection) -> Result<Self> {
        Self::init(connection)
    }

    fn init(connection: Connection) -> Result<Self> {
        apply_session_pragmas(&connection).dot()?;
        validate_schema(&connection).dot()?;

        let samples = queries::list_samples(&connection).dot()?;
        let sample_names = names_by_id(&samples);
        let feature_count =
            query_single_i64_required(&connection, "SELECT COUNT(*) FROM Feature").dot()?;

        info!(
            "feature store opened: {} samples, {} consensus features",
            samples.len(),
            feature_count
        );

        Ok(Self {
            connection,
            samples,
            sample_names,
            feature_count,
            active_cache: ActiveFeatureCache::new(),
        })
    }

    // ========================================================================
    // Catalog access
    // ========================================================================

    /// All samples, in id order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples in the store
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Sample by position in id order (0-based)
    pub fn sample_by_number(&self, number: usize) -> Option<&Sample> {
        self.samples.get(number)
    }

    /// Display name for a sample id
    pub fn sample_name_by_id(&self, sample_id: SampleId) -> Option<&str> {
        self.sample_names.get(&sample_id).map(String::as_str)
    }

    /// SampleId to display-name map, as the plot assembly consumes it
    pub fn sample_names(&self) -> &HashMap<SampleId, String> {
        &self.sample_names
    }

    /// Number of consensus features in the store
    pub fn feature_count(&self) -> i64 {
        self.feature_count
    }

    // ========================================================================
    // Table access
    // ========================================================================

    /// Build a fresh table model over the current catalog. The model owns
    /// its index and cell cache; rebuild it after [`Self::reload`].
    pub fn table_model(&self) -> Result<FeatureTableModel> {
        FeatureTableModel::build(&self.connection)
    }

    // ========================================================================
    // Selection and plot payload
    // ========================================================================

    /// Change the active selection and assemble the plot payload for it.
    ///
    /// `consensus_mzs` carries the FeatureId to consensus m/z mapping from
    /// the selection event; it decorates the series descriptors only and an
    /// incomplete map degrades labels, never the data. An over-capacity
    /// selection fails with [`FeatureDbError::CapacityExceeded`] and leaves
    /// the cache empty; an empty selection yields an empty payload.
    pub fn select_features(
        &mut self,
        selection: &WorkingSet,
        consensus_mzs: &HashMap<FeatureId, f64>,
    ) -> Result<PlotData> {
        self.active_cache
            .set_active_features(&self.connection, selection)?;
        build_plot_data(&self.active_cache, &self.sample_names, consensus_mzs)
    }

    /// Drop all cached traces and scans without touching the catalog
    pub fn clear_selection(&mut self) {
        self.active_cache.clear();
    }

    /// The cache backing the current selection
    pub fn active_cache(&self) -> &ActiveFeatureCache {
        &self.active_cache
    }

    // ========================================================================
    // MS2 spectra
    // ========================================================================

    /// Fetch and decode MS2 spectra by id, one bound parameter per id.
    ///
    /// Ids without a stored spectrum are absent from the result. Requests
    /// binding more parameters than the store allows fail with
    /// [`FeatureDbError::CapacityExceeded`].
    pub fn ms2_spectra(
        &self,
        spectrum_ids: &[SpectrumId],
    ) -> Result<HashMap<SpectrumId, Vec<SpectrumPoint>>> {
        if spectrum_ids.len() > QUERY_PARAMS_LIMIT {
            return Err(FeatureDbError::CapacityExceeded {
                requested: spectrum_ids.len(),
                params: spectrum_ids.len(),
                limit: QUERY_PARAMS_LIMIT,
            }
            .into());
        }

        let rows = queries::fetch_ms2_spectra(&self.connection, spectrum_ids)?;
        let mut spectra = HashMap::with_capacity(rows.len());
        for row in rows {
            let points = decode_spectrum_points(&row.data)
                .context(format!("spectrum {}", row.spectrum_id))?;
            spectra.insert(row.spectrum_id, points);
        }
        Ok(spectra)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Re-read the catalog after the store contents changed underneath us
    /// (recompute finished, rows inserted). Clears the active cache; table
    /// models built earlier must be rebuilt or reset by their owners.
    pub fn reload(&mut self) -> Result<()> {
        self.samples = queries::list_samples(&self.connection).dot()?;
        self.sample_names = names_by_id(&self.samples);
        self.feature_count =
            query_single_i64_required(&self.connection, "SELECT COUNT(*) FROM Feature").dot()?;
        self.active_cache.clear();

        info!(
            "feature store reloaded: {} samples, {} consensus features",
            self.samples.len(),
            self.feature_count
        );
        Ok(())
    }

    // ========================================================================
    // Advanced access
    // ========================================================================

    /// Get access to the underlying SQLite connection for advanced queries
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

/// Session profile for a single exclusive reader: nothing to preserve on
/// crash, generous page cache.
fn apply_session_pragmas(db: &Connection) -> Result<()> {
    db.execute_batch(
        "PRAGMA locking_mode=EXCLUSIVE;
         PRAGMA journal_mode=MEMORY;
         PRAGMA synchronous=OFF;
         PRAGMA temp_store=MEMORY;
         PRAGMA cache_size=50000;
         PRAGMA foreign_keys=ON;",
    )
    .context("Failed to set SQLite pragmas")?;

    if let Some(mode) = query_single_string(db, "PRAGMA journal_mode")? {
        debug!("session journal_mode={}", mode);
    }
    Ok(())
}

fn validate_schema(db: &Connection) -> Result<()> {
    for table in REQUIRED_TABLES {
        if !table_exists(db, table)? {
            return Err(anyhow!("not a feature store: missing table {}", table));
        }
    }
    Ok(())
}

fn names_by_id(samples: &[Sample]) -> HashMap<SampleId, String> {
    samples
        .iter()
        .map(|sample| (sample.id, sample.name.clone()))
        .collect()
}
