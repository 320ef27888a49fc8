//! SQL layer over the feature store
//!
//! Thin parameterized queries; every ordering guarantee the upper layers
//! rely on is established here, in SQL. The schema is an external
//! contract owned by the detection pipeline, so this crate reads it and
//! never creates or alters it.

use anyhow_ext::{Context, Result};
use itertools::Itertools;
use rusqlite::Connection;
use serde_rusqlite::from_rows;

use crate::model::{ConsensusFeature, FeatureId, Sample, SampleFeatureRow, SampleId, SpectrumId};

// ============================================================================
// Catalog streams
// ============================================================================

/// All samples, in column order.
pub fn list_samples(db: &Connection) -> Result<Vec<Sample>> {
    let mut stmt = db.prepare("SELECT id, name FROM Sample ORDER BY id").dot()?;
    let samples = from_rows::<Sample>(stmt.query([]).dot()?)
        .collect::<Result<Vec<_>, _>>()
        .dot()?;
    Ok(samples)
}

/// The row-attribute stream: one record per consensus feature, in the
/// m/z order the table presents rows in.
pub fn list_consensus_features(db: &Connection) -> Result<Vec<ConsensusFeature>> {
    let mut stmt = db
        .prepare(
            "SELECT id, consensus_mz, consensus_rt, consensus_charge FROM Feature \
             ORDER BY consensus_mz, id",
        )
        .dot()?;
    let features = from_rows::<ConsensusFeature>(stmt.query([]).dot()?)
        .collect::<Result<Vec<_>, _>>()
        .dot()?;
    Ok(features)
}

/// The cell-value stream: sparse per-sample observations, ordered by
/// (feature_id, sample_id) so each feature's run is contiguous and
/// binary-searchable.
pub fn list_sample_feature_rows(db: &Connection) -> Result<Vec<SampleFeatureRow>> {
    let mut stmt = db
        .prepare(
            "SELECT feature_id, sample_id, intensity FROM SampleFeature \
             ORDER BY feature_id, sample_id",
        )
        .dot()?;
    let rows = from_rows::<SampleFeatureRow>(stmt.query([]).dot()?)
        .collect::<Result<Vec<_>, _>>()
        .dot()?;
    Ok(rows)
}

// ============================================================================
// Working-set fetches
// ============================================================================

/// One raw mass-trace blob row. A (sample, feature) pair may own several.
#[derive(Clone, Debug, PartialEq)]
pub struct MassTraceRow {
    pub sample_id: SampleId,
    pub feature_id: FeatureId,
    pub data: Vec<u8>,
    pub rt_start: f64,
    pub rt_end: f64,
}

/// One MS2 scan row from the trace/spectrum join.
#[derive(Clone, Debug, PartialEq)]
pub struct Ms2ScanRow {
    pub sample_id: SampleId,
    pub feature_id: FeatureId,
    pub scan_time: f64,
    pub precursor_mz: f64,
    pub spectrum_id: SpectrumId,
    pub scan_description: String,
}

/// One raw fragmentation-spectrum blob row.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectrumBlobRow {
    pub spectrum_id: SpectrumId,
    pub data: Vec<u8>,
}

/// All mass-trace blobs for the given pairs, in one round trip.
pub fn fetch_mass_traces(
    db: &Connection,
    pairs: &[(SampleId, FeatureId)],
) -> Result<Vec<MassTraceRow>> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let predicate = pairs
        .iter()
        .map(|_| "(sample_id = ? AND feature_id = ?)")
        .join(" OR ");
    let sql = format!(
        "SELECT sample_id, feature_id, data, rt_start, rt_end FROM FeatureMassTrace WHERE {}",
        predicate
    );

    let mut stmt = db.prepare(&sql).dot()?;
    let rows = stmt.query_map(rusqlite::params_from_iter(pair_params(pairs)), |row| {
        Ok(MassTraceRow {
            sample_id: row.get(0)?,
            feature_id: row.get(1)?,
            data: row.get(2)?,
            rt_start: row.get(3)?,
            rt_end: row.get(4)?,
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// All MS2 scans attached to the given pairs' mass traces, globally
/// ordered by scan time. The timeline merge depends on that ordering.
pub fn fetch_ms2_scans(
    db: &Connection,
    pairs: &[(SampleId, FeatureId)],
) -> Result<Vec<Ms2ScanRow>> {
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let predicate = pairs
        .iter()
        .map(|_| "(FMT.sample_id = ? AND FMT.feature_id = ?)")
        .join(" OR ");
    let sql = format!(
        "SELECT FMT.sample_id, FMT.feature_id, FS.scan_time, FS.precursor_mz, FS.id, FS.scan_id \
         FROM FeatureMassTrace AS FMT, MassTraceFragmentationSpectrum AS MSFS, \
         FragmentationSpectrum AS FS \
         WHERE FMT.id = MSFS.mt_id AND MSFS.spectrum_id = FS.id AND ({}) \
         ORDER BY FS.scan_time",
        predicate
    );

    let mut stmt = db.prepare(&sql).dot()?;
    let rows = stmt.query_map(rusqlite::params_from_iter(pair_params(pairs)), |row| {
        Ok(Ms2ScanRow {
            sample_id: row.get(0)?,
            feature_id: row.get(1)?,
            scan_time: row.get(2)?,
            precursor_mz: row.get(3)?,
            spectrum_id: row.get(4)?,
            scan_description: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        })
    })?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

/// Raw spectrum blobs for the given ids. Unknown ids yield no row.
pub fn fetch_ms2_spectra(
    db: &Connection,
    spectrum_ids: &[SpectrumId],
) -> Result<Vec<SpectrumBlobRow>> {
    if spectrum_ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = spectrum_ids.iter().map(|_| "?").join(",");
    let sql = format!(
        "SELECT FS.id, FS.data FROM FragmentationSpectrum AS FS WHERE FS.id IN ({})",
        placeholders
    );

    let mut stmt = db.prepare(&sql).dot()?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(spectrum_ids.iter().copied()),
        |row| {
            Ok(SpectrumBlobRow {
                spectrum_id: row.get(0)?,
                data: row.get(1)?,
            })
        },
    )?;

    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

// Flatten pairs into the bind order the predicates expect.
fn pair_params(pairs: &[(SampleId, FeatureId)]) -> impl Iterator<Item = i64> + '_ {
    pairs
        .iter()
        .flat_map(|&(sample_id, feature_id)| [sample_id, feature_id])
}
