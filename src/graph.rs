//! Typed plot payload for the chart layer
//!
//! The chart layer receives one XIC series and one mass-peak series per
//! active (sample, feature) pair: a descriptor with the display attributes
//! plus the flat point sequences, every point tagged with its series
//! identity. Attributes that do not apply to a point are absent, not
//! null-valued.

use std::collections::HashMap;

use anyhow_ext::Result;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::active_cache::ActiveFeatureCache;
use crate::model::{FeatureId, GraphPoint, SampleId, format_series_id};
use crate::timeline;

/// Descriptor of one XIC + MS2 timeline series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct XicSeries {
    pub graph_id: String,
    pub sample_id: SampleId,
    pub feature_id: FeatureId,
    pub sample_name: String,
    pub consensus_mz: f64,
    pub rt_start: f64,
    pub rt_end: f64,
}

/// Descriptor of one MS1 mass-peak series.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MassPeakSeries {
    pub graph_id: String,
    pub sample_id: SampleId,
    pub feature_id: FeatureId,
    pub sample_name: String,
    pub consensus_mz: f64,
}

/// Everything the chart layer needs for the current selection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub xic_series: Vec<XicSeries>,
    pub xic_points: Vec<GraphPoint>,
    pub mass_peak_series: Vec<MassPeakSeries>,
    pub mass_peak_points: Vec<GraphPoint>,
}

impl PlotData {
    /// True for the payload of an empty selection; the chart clears.
    pub fn is_empty(&self) -> bool {
        self.xic_series.is_empty() && self.mass_peak_series.is_empty()
    }
}

/// Assemble the payload for everything the cache currently holds.
///
/// `consensus_mzs` comes with the selection event; a missing entry reads as
/// 0.0 rather than failing, same as a missing sample name falls back to the
/// raw id.
pub fn build_plot_data(
    cache: &ActiveFeatureCache,
    sample_names: &HashMap<SampleId, String>,
    consensus_mzs: &HashMap<FeatureId, f64>,
) -> Result<PlotData> {
    let mut data = PlotData::default();

    for feature in cache.iter_features() {
        let sample_name = sample_names
            .get(&feature.sample_id)
            .cloned()
            .unwrap_or_else(|| {
                warn!("no catalog name for sample {}, using the raw id", feature.sample_id);
                feature.sample_id.to_string()
            });
        let consensus_mz = consensus_mzs
            .get(&feature.feature_id)
            .copied()
            .unwrap_or_default();
        let graph_id = format_series_id(feature.sample_id, feature.feature_id);

        let xic = feature.xic();
        let scans = cache.ms2_scans(feature.sample_id, feature.feature_id);
        let mut merged =
            timeline::merge_timeline(feature.sample_id, feature.feature_id, &xic, scans)?;
        data.xic_points.append(&mut merged);
        data.xic_series.push(XicSeries {
            graph_id: graph_id.clone(),
            sample_id: feature.sample_id,
            feature_id: feature.feature_id,
            sample_name: sample_name.clone(),
            consensus_mz,
            rt_start: feature.rt_start,
            rt_end: feature.rt_end,
        });

        data.mass_peak_points.extend(
            feature
                .mass_peaks()
                .into_iter()
                .map(|peak| {
                    GraphPoint::trace(feature.sample_id, feature.feature_id, peak.mz, peak.intensity)
                }),
        );
        data.mass_peak_series.push(MassPeakSeries {
            graph_id,
            sample_id: feature.sample_id,
            feature_id: feature.feature_id,
            sample_name,
            consensus_mz,
        });
    }

    Ok(data)
}
