//! Working-set cache of the currently plotted features
//!
//! The chart layer plots a small, frequently changing subset of the
//! dataset. This cache owns the materialized [`Feature`] and
//! [`Ms2ScanInfo`] records for the current [`WorkingSet`] and keeps every
//! selection change proportional to the *delta*: records still selected are
//! reused as-is, records no longer selected are dropped, and only the new
//! pairs are fetched.
//!
//! Selections binding more SQL parameters than the store allows are refused
//! outright; the cache clears and reports
//! [`FeatureDbError::CapacityExceeded`] instead of fetching partially.
//! State transitions are copy-on-swap: the new record maps are built
//! completely, then published wholesale.

use std::collections::HashMap;

use anyhow_ext::Result;
use itertools::Itertools;
use log::debug;
use rusqlite::Connection;

use crate::codec;
use crate::error::FeatureDbError;
use crate::model::{Feature, FeatureId, Ms2ScanInfo, SampleId, WorkingSet};
use crate::queries;

/// The store's bound on parameters in one query.
pub const QUERY_PARAMS_LIMIT: usize = 999;

/// Each (sample, feature) pair binds sample_id and feature_id.
const PARAMS_PER_PAIR: usize = 2;

type FeatureMap = HashMap<SampleId, HashMap<FeatureId, Feature>>;
type ScanMap = HashMap<SampleId, HashMap<FeatureId, Vec<Ms2ScanInfo>>>;

/// Cache of fetched records for the active (sample, feature) pairs.
#[derive(Debug, Default)]
pub struct ActiveFeatureCache {
    current: WorkingSet,
    features: FeatureMap,
    ms2_scans: ScanMap,
    fetch_rounds: u64,
    fetched_pairs: u64,
}

impl ActiveFeatureCache {
    pub fn new() -> Self {
        ActiveFeatureCache::default()
    }

    /// The working set the cached records belong to.
    pub fn working_set(&self) -> &WorkingSet {
        &self.current
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn feature(&self, sample_id: SampleId, feature_id: FeatureId) -> Option<&Feature> {
        self.features
            .get(&sample_id)
            .and_then(|features| features.get(&feature_id))
    }

    /// MS2 scans for one pair, scan-time ordered. Empty when the feature has
    /// no fragmentation data (the common case).
    pub fn ms2_scans(&self, sample_id: SampleId, feature_id: FeatureId) -> &[Ms2ScanInfo] {
        self.ms2_scans
            .get(&sample_id)
            .and_then(|scans| scans.get(&feature_id))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All cached features in deterministic (sample, feature) order.
    pub fn iter_features(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.features
            .values()
            .flat_map(|features| features.values())
            .sorted_by_key(|feature| (feature.sample_id, feature.feature_id))
    }

    /// Number of times a fetch actually hit the store.
    pub fn fetch_count(&self) -> u64 {
        self.fetch_rounds
    }

    /// Total (sample, feature) pairs ever fetched from the store.
    pub fn fetched_pair_count(&self) -> u64 {
        self.fetched_pairs
    }

    /// Drop everything; the working set becomes empty.
    pub fn clear(&mut self) {
        self.current = WorkingSet::new();
        self.features.clear();
        self.ms2_scans.clear();
    }

    /// Replace the working set, fetching only what the previous set did not
    /// already hold.
    ///
    /// Re-applying the current working set is a no-op. An oversized
    /// selection fails with [`FeatureDbError::CapacityExceeded`] and clears
    /// the cache; a decode or ordering failure during the fetch also leaves
    /// the cache empty rather than half-populated.
    pub fn set_active_features(&mut self, db: &Connection, selection: &WorkingSet) -> Result<()> {
        if *selection == self.current {
            debug!("selection unchanged ({} pairs), nothing to do", selection.pair_count());
            return Ok(());
        }
        if selection.is_empty() {
            self.clear();
            return Ok(());
        }

        let pairs = selection.pair_count();
        let params = pairs * PARAMS_PER_PAIR;
        if params > QUERY_PARAMS_LIMIT {
            self.clear();
            return Err(FeatureDbError::CapacityExceeded {
                requested: pairs,
                params,
                limit: QUERY_PARAMS_LIMIT,
            }
            .into());
        }

        // Take the old records; kept ones move into the new maps, the rest
        // drop when the old maps do. From here until the final publish the
        // cache is formally empty, so a failed fetch cannot leave torn state.
        let mut old_features = std::mem::take(&mut self.features);
        let mut old_scans = std::mem::take(&mut self.ms2_scans);
        self.current = WorkingSet::new();

        let mut new_features: FeatureMap = HashMap::new();
        let mut new_scans: ScanMap = HashMap::new();
        let mut to_fetch: Vec<(SampleId, FeatureId)> = Vec::new();

        for (sample_id, feature_id) in selection.iter_pairs() {
            let kept = old_features
                .get_mut(&sample_id)
                .and_then(|features| features.remove(&feature_id));
            match kept {
                Some(feature) => {
                    new_features
                        .entry(sample_id)
                        .or_default()
                        .insert(feature_id, feature);
                    if let Some(scans) = old_scans
                        .get_mut(&sample_id)
                        .and_then(|scans| scans.remove(&feature_id))
                    {
                        new_scans.entry(sample_id).or_default().insert(feature_id, scans);
                    }
                }
                None => to_fetch.push((sample_id, feature_id)),
            }
        }
        debug!(
            "selection of {} pairs: {} kept, {} to fetch",
            pairs,
            pairs - to_fetch.len(),
            to_fetch.len()
        );

        if !to_fetch.is_empty() {
            self.fetch_rounds += 1;
            self.fetched_pairs += to_fetch.len() as u64;
            fetch_pairs(db, &to_fetch, &mut new_features, &mut new_scans)?;
        }

        self.features = new_features;
        self.ms2_scans = new_scans;
        self.current = selection.clone();
        Ok(())
    }
}

fn fetch_pairs(
    db: &Connection,
    pairs: &[(SampleId, FeatureId)],
    features: &mut FeatureMap,
    scans: &mut ScanMap,
) -> Result<()> {
    for row in queries::fetch_mass_traces(db, pairs)? {
        let points = codec::decode_trace_points(&row.data)?;
        features
            .entry(row.sample_id)
            .or_default()
            .entry(row.feature_id)
            .or_insert_with(|| Feature::new(row.sample_id, row.feature_id))
            .add_trace(points, row.rt_start, row.rt_end);
    }

    for row in queries::fetch_ms2_scans(db, pairs)? {
        let feature_scans = scans
            .entry(row.sample_id)
            .or_default()
            .entry(row.feature_id)
            .or_default();
        if let Some(last) = feature_scans.last() {
            // the scan query orders globally by scan time, so per-feature
            // lists must come out non-decreasing
            if last.scan_time > row.scan_time {
                return Err(FeatureDbError::InvariantViolation(format!(
                    "MS2 scans for sample {} feature {} not ordered by scan time",
                    row.sample_id, row.feature_id
                ))
                .into());
            }
        }
        feature_scans.push(Ms2ScanInfo {
            spectrum_id: row.spectrum_id,
            scan_time: row.scan_time,
            precursor_mz: row.precursor_mz,
            scan_description: row.scan_description,
        });
    }

    Ok(())
}
