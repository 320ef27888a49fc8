//! Binary record codec for packed point blobs
//!
//! The store keeps mass traces and fragmentation spectra as little-endian
//! blobs of fixed-size records:
//! - mass-trace record: `f64` m/z, `f32` retention time, `f32` intensity (16 bytes)
//! - spectrum record: `f64` m/z, `f32` intensity (12 bytes)
//!
//! Decoding consumes exactly one record at a time until the buffer is
//! exhausted. A buffer whose length is not a multiple of the record size is
//! corrupt and fails with [`FeatureDbError::TruncatedRecord`]; there is no
//! partial decode. Encoding produces the exact same layout.

use bytes::{Buf, BufMut};

use crate::error::FeatureDbError;
use crate::model::{SpectrumPoint, TracePoint};

/// Size in bytes of one encoded mass-trace record.
pub const TRACE_RECORD_SIZE: usize = 16;
/// Size in bytes of one encoded spectrum record.
pub const SPECTRUM_RECORD_SIZE: usize = 12;

/// Decode a mass-trace blob into its ordered point sequence.
pub fn decode_trace_points(blob: &[u8]) -> Result<Vec<TracePoint>, FeatureDbError> {
    check_record_multiple(blob, TRACE_RECORD_SIZE)?;

    let mut buf = blob;
    let mut points = Vec::with_capacity(blob.len() / TRACE_RECORD_SIZE);
    while buf.has_remaining() {
        let mz = buf.get_f64_le();
        let rt = buf.get_f32_le();
        let intensity = buf.get_f32_le();
        points.push(TracePoint { mz, rt, intensity });
    }
    Ok(points)
}

/// Decode a fragmentation-spectrum blob into its ordered peak sequence.
pub fn decode_spectrum_points(blob: &[u8]) -> Result<Vec<SpectrumPoint>, FeatureDbError> {
    check_record_multiple(blob, SPECTRUM_RECORD_SIZE)?;

    let mut buf = blob;
    let mut points = Vec::with_capacity(blob.len() / SPECTRUM_RECORD_SIZE);
    while buf.has_remaining() {
        let mz = buf.get_f64_le();
        let intensity = buf.get_f32_le();
        points.push(SpectrumPoint { mz, intensity });
    }
    Ok(points)
}

/// Encode mass-trace points into the store's blob layout.
pub fn encode_trace_points(points: &[TracePoint]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(points.len() * TRACE_RECORD_SIZE);
    for point in points {
        blob.put_f64_le(point.mz);
        blob.put_f32_le(point.rt);
        blob.put_f32_le(point.intensity);
    }
    blob
}

/// Encode spectrum points into the store's blob layout.
pub fn encode_spectrum_points(points: &[SpectrumPoint]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(points.len() * SPECTRUM_RECORD_SIZE);
    for point in points {
        blob.put_f64_le(point.mz);
        blob.put_f32_le(point.intensity);
    }
    blob
}

fn check_record_multiple(blob: &[u8], record_size: usize) -> Result<(), FeatureDbError> {
    if blob.len() % record_size != 0 {
        return Err(FeatureDbError::TruncatedRecord {
            len: blob.len(),
            record_size,
        });
    }
    Ok(())
}
