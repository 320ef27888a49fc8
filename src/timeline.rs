//! Timeline merge of XIC traces and MS2 scan events
//!
//! For one (sample, feature) key, the plotting layer needs a single
//! time-ordered sequence mixing the chromatographic trace with the MS2
//! acquisition events that happened along it. Both inputs arrive already
//! time-ordered (the XIC projection sorts, the scan query orders by scan
//! time); the merge is a two-pointer walk that never sorts.
//!
//! An MS2 event has no stored intensity. It is placed on the trace by
//! linear interpolation between the bracketing XIC points:
//! `prev_y + (next_y - prev_y) * (t - prev_t) / (next_t - prev_t)`.
//! An event before the first XIC point gets intensity 0; events past the
//! last point are flushed by a tail pass anchored to the last observed
//! value.

use crate::error::FeatureDbError;
use crate::model::{FeatureId, GraphPoint, Ms2ScanInfo, SampleId, XicPoint};

/// Merge one feature's XIC points and MS2 events into a single ordered
/// plot-record sequence.
///
/// An event whose time equals an XIC point's time is emitted before that
/// point. Unsorted input is a broken upstream invariant and fails with
/// [`FeatureDbError::InvariantViolation`].
pub fn merge_timeline(
    sample_id: SampleId,
    feature_id: FeatureId,
    xic: &[XicPoint],
    scans: &[Ms2ScanInfo],
) -> Result<Vec<GraphPoint>, FeatureDbError> {
    check_time_ordered(xic, scans)?;

    let mut points = Vec::with_capacity(xic.len() + scans.len());
    let mut pending = scans.iter();
    let mut next_scan = pending.next();
    let mut prev: Option<XicPoint> = None;

    for x in xic {
        // events not strictly later than this trace point go first
        while let Some(scan) = next_scan {
            if x.rt < scan.scan_time {
                break;
            }
            let intensity = interpolated_intensity(scan.scan_time, prev, Some(*x));
            points.push(event_point(sample_id, feature_id, scan, intensity));
            next_scan = pending.next();
        }
        points.push(GraphPoint::trace(sample_id, feature_id, x.rt, x.intensity));
        prev = Some(*x);
    }

    // tail flush: the sentinel "next" is unreachable, so trailing events
    // stay anchored to the last observed XIC value
    while let Some(scan) = next_scan {
        let intensity = interpolated_intensity(scan.scan_time, prev, None);
        points.push(event_point(sample_id, feature_id, scan, intensity));
        next_scan = pending.next();
    }

    Ok(points)
}

fn event_point(
    sample_id: SampleId,
    feature_id: FeatureId,
    scan: &Ms2ScanInfo,
    intensity: f64,
) -> GraphPoint {
    GraphPoint::ms2_event(
        sample_id,
        feature_id,
        scan.scan_time,
        intensity,
        scan.precursor_mz,
        scan.spectrum_id,
    )
}

fn interpolated_intensity(event_time: f64, prev: Option<XicPoint>, next: Option<XicPoint>) -> f64 {
    match (prev, next) {
        // before the first trace sample
        (None, _) => 0.0,
        // past the trace end: clamp to the last observed value
        (Some(p), None) => p.intensity,
        (Some(p), Some(n)) => {
            if n.rt == p.rt {
                return p.intensity;
            }
            p.intensity + (n.intensity - p.intensity) * (event_time - p.rt) / (n.rt - p.rt)
        }
    }
}

fn check_time_ordered(xic: &[XicPoint], scans: &[Ms2ScanInfo]) -> Result<(), FeatureDbError> {
    if xic.windows(2).any(|w| w[0].rt > w[1].rt) {
        return Err(FeatureDbError::InvariantViolation(
            "XIC points not ordered by retention time".to_string(),
        ));
    }
    if scans.windows(2).any(|w| w[0].scan_time > w[1].scan_time) {
        return Err(FeatureDbError::InvariantViolation(
            "MS2 scans not ordered by scan time".to_string(),
        ));
    }
    Ok(())
}
