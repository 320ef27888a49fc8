use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Sample identifier assigned by the external store, never reused in a session.
pub type SampleId = i64;
/// Consensus feature identifier assigned by the external store.
pub type FeatureId = i64;
/// Fragmentation spectrum identifier assigned by the external store.
pub type SpectrumId = i64;

/// One decoded mass-trace record: (m/z, retention time, intensity).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TracePoint {
    pub mz: f64,
    pub rt: f32,
    pub intensity: f32,
}

/// One decoded spectrum record: (m/z, intensity).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpectrumPoint {
    pub mz: f64,
    pub intensity: f32,
}

/// One point of an extracted-ion chromatogram projection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct XicPoint {
    pub rt: f64,
    pub intensity: f64,
}

/// One point of the MS1 mass-peak projection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MassPeak {
    pub mz: f64,
    pub intensity: f64,
}

/// A sample catalog row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub name: String,
}

/// A consensus feature row: the cross-sample identity with its opaque
/// consensus scalars, as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusFeature {
    pub id: FeatureId,
    pub consensus_mz: f64,
    pub consensus_rt: f64,
    pub consensus_charge: i64,
}

/// One row of the sparse per-sample observation stream, globally ordered by
/// (feature_id, sample_id). Not every feature is observed in every sample.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleFeatureRow {
    pub feature_id: FeatureId,
    pub sample_id: SampleId,
    pub intensity: f64,
}

/// One MS2 fragmentation scan event attached to a feature.
///
/// Stored per (sample, feature) key in the active cache, ordered by scan
/// time. The precursor intensity is not stored anywhere; the timeline merge
/// computes it from the XIC when the event is placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ms2ScanInfo {
    pub spectrum_id: SpectrumId,
    pub scan_time: f64,
    pub precursor_mz: f64,
    pub scan_description: String,
}

/// One sample-local feature observation with its raw mass traces.
///
/// `rt_start`/`rt_end` are the union bounds over all constituent traces;
/// fetching widens them with min/max as blobs accumulate.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    pub sample_id: SampleId,
    pub feature_id: FeatureId,
    pub mass_traces: Vec<Vec<TracePoint>>,
    pub rt_start: f64,
    pub rt_end: f64,
}

impl Feature {
    pub fn new(sample_id: SampleId, feature_id: FeatureId) -> Self {
        Feature {
            sample_id,
            feature_id,
            mass_traces: Vec::new(),
            rt_start: f64::INFINITY,
            rt_end: f64::NEG_INFINITY,
        }
    }

    /// Append one decoded blob and widen the retention-time bounds.
    pub fn add_trace(&mut self, points: Vec<TracePoint>, rt_start: f64, rt_end: f64) {
        self.rt_start = self.rt_start.min(rt_start);
        self.rt_end = self.rt_end.max(rt_end);
        self.mass_traces.push(points);
    }

    /// Project all traces to one (rt, intensity) sequence sorted by rt.
    /// Points sharing the exact same rt are summed into one.
    pub fn xic(&self) -> Vec<XicPoint> {
        let merged = project_summing(
            self.mass_traces
                .iter()
                .flatten()
                .map(|p| (p.rt as f64, p.intensity as f64)),
        );
        merged
            .into_iter()
            .map(|(rt, intensity)| XicPoint { rt, intensity })
            .collect()
    }

    /// Project all traces to one (m/z, intensity) sequence sorted by m/z.
    /// Points sharing the exact same m/z are summed into one.
    pub fn mass_peaks(&self) -> Vec<MassPeak> {
        let merged = project_summing(
            self.mass_traces
                .iter()
                .flatten()
                .map(|p| (p.mz, p.intensity as f64)),
        );
        merged
            .into_iter()
            .map(|(mz, intensity)| MassPeak { mz, intensity })
            .collect()
    }
}

// Sort by x, then collapse runs of identical x by summing y.
fn project_summing(points: impl Iterator<Item = (f64, f64)>) -> Vec<(f64, f64)> {
    let mut sorted: Vec<(f64, f64)> = points.collect();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(sorted.len());
    for (x, y) in sorted {
        match merged.last_mut() {
            Some(last) if last.0 == x => last.1 += y,
            _ => merged.push((x, y)),
        }
    }
    merged
}

/// A generic plot coordinate tagged with its owning series.
///
/// Trace points carry only x/y; MS2 event points additionally carry the
/// precursor m/z, the spectrum id and the scan time. Absent attributes stay
/// `None` rather than being null-valued placeholders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphPoint {
    pub sample_id: SampleId,
    pub feature_id: FeatureId,
    pub x: f64,
    pub y: f64,
    pub precursor_mz: Option<f64>,
    pub spectrum_id: Option<SpectrumId>,
    pub scan_time: Option<f64>,
}

impl GraphPoint {
    pub fn trace(sample_id: SampleId, feature_id: FeatureId, x: f64, y: f64) -> Self {
        GraphPoint {
            sample_id,
            feature_id,
            x,
            y,
            precursor_mz: None,
            spectrum_id: None,
            scan_time: None,
        }
    }

    pub fn ms2_event(
        sample_id: SampleId,
        feature_id: FeatureId,
        scan_time: f64,
        intensity: f64,
        precursor_mz: f64,
        spectrum_id: SpectrumId,
    ) -> Self {
        GraphPoint {
            sample_id,
            feature_id,
            x: scan_time,
            y: intensity,
            precursor_mz: Some(precursor_mz),
            spectrum_id: Some(spectrum_id),
            scan_time: Some(scan_time),
        }
    }

    /// Series identifier understood by the plotting layer.
    pub fn series_id(&self) -> String {
        format_series_id(self.sample_id, self.feature_id)
    }
}

pub fn format_series_id(sample_id: SampleId, feature_id: FeatureId) -> String {
    format!("{}_{}", sample_id, feature_id)
}

/// The currently active (sample, feature) pairs.
///
/// Replaced wholesale on every selection change; the active cache diffs two
/// working sets to decide what to fetch and what to drop.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkingSet {
    by_sample: HashMap<SampleId, HashSet<FeatureId>>,
}

impl WorkingSet {
    pub fn new() -> Self {
        WorkingSet::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (SampleId, FeatureId)>) -> Self {
        let mut set = WorkingSet::new();
        for (sample_id, feature_id) in pairs {
            set.insert(sample_id, feature_id);
        }
        set
    }

    pub fn insert(&mut self, sample_id: SampleId, feature_id: FeatureId) {
        self.by_sample.entry(sample_id).or_default().insert(feature_id);
    }

    pub fn contains(&self, sample_id: SampleId, feature_id: FeatureId) -> bool {
        self.by_sample
            .get(&sample_id)
            .is_some_and(|features| features.contains(&feature_id))
    }

    pub fn is_empty(&self) -> bool {
        self.by_sample.values().all(|features| features.is_empty())
    }

    /// Total number of (sample, feature) pairs.
    pub fn pair_count(&self) -> usize {
        self.by_sample.values().map(|features| features.len()).sum()
    }

    /// All pairs in deterministic (sample, feature) order.
    pub fn iter_pairs(&self) -> impl Iterator<Item = (SampleId, FeatureId)> + '_ {
        self.by_sample
            .iter()
            .flat_map(|(&sample_id, features)| {
                features.iter().map(move |&feature_id| (sample_id, feature_id))
            })
            .sorted()
    }

    /// Pairs present in `self` but not in `other`, in deterministic order.
    pub fn difference(&self, other: &WorkingSet) -> Vec<(SampleId, FeatureId)> {
        self.iter_pairs()
            .filter(|&(sample_id, feature_id)| !other.contains(sample_id, feature_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_trace_feature() -> Feature {
        let mut feature = Feature::new(1, 10);
        feature.add_trace(
            vec![
                TracePoint { mz: 150.0, rt: 5.0, intensity: 100.0 },
                TracePoint { mz: 150.1, rt: 6.0, intensity: 200.0 },
            ],
            5.0,
            6.0,
        );
        feature.add_trace(
            vec![TracePoint { mz: 151.0, rt: 6.0, intensity: 50.0 }],
            6.0,
            6.0,
        );
        feature
    }

    #[test]
    fn test_trace_accumulation_widens_bounds() {
        let mut feature = Feature::new(1, 10);
        feature.add_trace(vec![TracePoint { mz: 150.0, rt: 8.0, intensity: 1.0 }], 8.0, 9.0);
        feature.add_trace(vec![TracePoint { mz: 150.0, rt: 4.0, intensity: 1.0 }], 4.0, 5.0);

        assert_eq!(feature.rt_start, 4.0);
        assert_eq!(feature.rt_end, 9.0);
        assert_eq!(feature.mass_traces.len(), 2);
    }

    #[test]
    fn test_xic_sums_equal_rt_points() {
        let xic = two_trace_feature().xic();

        assert_eq!(xic.len(), 2);
        assert_eq!(xic[0], XicPoint { rt: 5.0, intensity: 100.0 });
        // rt 6.0 appears in both traces, intensities collapse to one point
        assert_eq!(xic[1], XicPoint { rt: 6.0, intensity: 250.0 });
    }

    #[test]
    fn test_mass_peaks_sorted_by_mz() {
        let peaks = two_trace_feature().mass_peaks();

        assert_eq!(peaks.len(), 3);
        assert!(peaks.windows(2).all(|w| w[0].mz <= w[1].mz));
        assert_eq!(peaks[0].mz, 150.0);
        assert_eq!(peaks[2].mz, 151.0);
    }

    #[test]
    fn test_working_set_difference() {
        let a = WorkingSet::from_pairs([(1, 10), (1, 20), (2, 10)]);
        let b = WorkingSet::from_pairs([(1, 10), (2, 10), (2, 30)]);

        assert_eq!(a.difference(&b), vec![(1, 20)]);
        assert_eq!(b.difference(&a), vec![(2, 30)]);
        assert_eq!(a.difference(&a), Vec::new());
        assert_eq!(a.pair_count(), 3);
    }

    #[test]
    fn test_working_set_equality_ignores_insert_order() {
        let a = WorkingSet::from_pairs([(1, 10), (2, 20)]);
        let b = WorkingSet::from_pairs([(2, 20), (1, 10)]);
        assert_eq!(a, b);
        assert_ne!(a, WorkingSet::new());
    }
}
