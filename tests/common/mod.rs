//! Shared in-memory feature store fixture
//!
//! Three samples, three consensus features, traces and MS2 scans shaped so
//! every interesting path has a known expected outcome:
//!
//! - feature 10 (sample 1): one trace with XIC (0,10) (10,20) (20,10) and
//!   three linked MS2 scans at t=5, t=10 (tie with an XIC point) and t=25
//!   (past the last XIC point)
//! - feature 20 (sample 1): two traces with disjoint RT spans, so the
//!   feature bounds widen to their union
//! - feature 30 (sample 3): a truncated trace blob (10 bytes)
#![allow(dead_code)]

use featdb::model::{SpectrumPoint, TracePoint};
use featdb::{FeatureDbReader, encode_spectrum_points, encode_trace_points};
use rusqlite::{Connection, params};

pub fn create_db() -> Connection {
    let db = Connection::open_in_memory().expect("Failed to open in-memory database");
    create_schema(&db);
    seed_catalog(&db);
    seed_traces(&db);
    seed_spectra(&db);
    db
}

pub fn create_reader() -> FeatureDbReader {
    FeatureDbReader::from_connection(create_db()).expect("Failed to open reader over fixture")
}

/// Encode (mz, rt, intensity) triples as a mass-trace blob
pub fn trace_blob(points: &[(f64, f32, f32)]) -> Vec<u8> {
    let points: Vec<TracePoint> = points
        .iter()
        .map(|&(mz, rt, intensity)| TracePoint { mz, rt, intensity })
        .collect();
    encode_trace_points(&points)
}

/// Encode (mz, intensity) pairs as a fragmentation-spectrum blob
pub fn spectrum_blob(points: &[(f64, f32)]) -> Vec<u8> {
    let points: Vec<SpectrumPoint> = points
        .iter()
        .map(|&(mz, intensity)| SpectrumPoint { mz, intensity })
        .collect();
    encode_spectrum_points(&points)
}

fn create_schema(db: &Connection) {
    db.execute_batch(
        "CREATE TABLE Sample (
             id INTEGER PRIMARY KEY,
             name TEXT NOT NULL
         );
         CREATE TABLE Feature (
             id INTEGER PRIMARY KEY,
             consensus_mz REAL NOT NULL,
             consensus_rt REAL NOT NULL,
             consensus_charge INTEGER NOT NULL
         );
         CREATE TABLE SampleFeature (
             sample_id INTEGER NOT NULL REFERENCES Sample(id),
             feature_id INTEGER NOT NULL REFERENCES Feature(id),
             intensity REAL NOT NULL,
             PRIMARY KEY (feature_id, sample_id)
         );
         CREATE TABLE FeatureMassTrace (
             id INTEGER PRIMARY KEY,
             sample_id INTEGER NOT NULL REFERENCES Sample(id),
             feature_id INTEGER NOT NULL REFERENCES Feature(id),
             rt_start REAL NOT NULL,
             rt_end REAL NOT NULL,
             data BLOB NOT NULL
         );
         CREATE TABLE FragmentationSpectrum (
             id INTEGER PRIMARY KEY,
             scan_time REAL NOT NULL,
             precursor_mz REAL NOT NULL,
             scan_id TEXT,
             data BLOB NOT NULL
         );
         CREATE TABLE MassTraceFragmentationSpectrum (
             mt_id INTEGER NOT NULL REFERENCES FeatureMassTrace(id),
             spectrum_id INTEGER NOT NULL REFERENCES FragmentationSpectrum(id),
             PRIMARY KEY (mt_id, spectrum_id)
         );",
    )
    .expect("Failed to create fixture schema");
}

fn seed_catalog(db: &Connection) {
    db.execute_batch(
        "INSERT INTO Sample (id, name) VALUES
             (1, 'wt_rep1'),
             (2, 'wt_rep2'),
             (3, 'ko_rep1');
         INSERT INTO Feature (id, consensus_mz, consensus_rt, consensus_charge) VALUES
             (10, 150.5, 5.2, 2),
             (20, 300.25, 10.0, 1),
             (30, 450.75, 15.8, 3);
         INSERT INTO SampleFeature (sample_id, feature_id, intensity) VALUES
             (1, 10, 1000.0),
             (2, 10, 1100.0),
             (1, 20, 2000.0),
             (3, 20, 2300.0),
             (2, 30, 3100.0);",
    )
    .expect("Failed to seed catalog");
}

fn seed_traces(db: &Connection) {
    let trace_10 = trace_blob(&[
        (150.5, 0.0, 10.0),
        (150.5, 10.0, 20.0),
        (150.5, 20.0, 10.0),
    ]);
    insert_trace(db, 1, 1, 10, 0.0, 20.0, &trace_10);

    let trace_20a = trace_blob(&[(300.25, 8.0, 5.0), (300.25, 9.0, 7.0)]);
    insert_trace(db, 2, 1, 20, 8.0, 9.0, &trace_20a);
    let trace_20b = trace_blob(&[(300.25, 9.5, 9.0), (300.25, 11.0, 4.0)]);
    insert_trace(db, 3, 1, 20, 9.5, 11.0, &trace_20b);

    // 10 bytes, not a multiple of the 16-byte trace record
    insert_trace(db, 4, 3, 30, 15.0, 16.0, &[0xAB; 10]);
}

fn seed_spectra(db: &Connection) {
    let spec_100 = spectrum_blob(&[(150.1, 500.0), (151.1, 300.0)]);
    let spec_101 = spectrum_blob(&[(149.9, 80.0)]);
    let spec_102 = spectrum_blob(&[(150.2, 650.0), (152.3, 120.0), (153.0, 40.0)]);

    insert_spectrum(db, 100, 5.0, 150.5, Some("scan=100"), &spec_100);
    insert_spectrum(db, 101, 25.0, 150.6, Some("scan=101"), &spec_101);
    insert_spectrum(db, 102, 10.0, 150.4, None, &spec_102);

    db.execute_batch(
        "INSERT INTO MassTraceFragmentationSpectrum (mt_id, spectrum_id) VALUES
             (1, 100),
             (1, 101),
             (1, 102);",
    )
    .expect("Failed to link spectra to traces");
}

fn insert_trace(
    db: &Connection,
    id: i64,
    sample_id: i64,
    feature_id: i64,
    rt_start: f64,
    rt_end: f64,
    data: &[u8],
) {
    db.execute(
        "INSERT INTO FeatureMassTrace (id, sample_id, feature_id, rt_start, rt_end, data) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, sample_id, feature_id, rt_start, rt_end, data],
    )
    .expect("Failed to insert mass trace");
}

fn insert_spectrum(
    db: &Connection,
    id: i64,
    scan_time: f64,
    precursor_mz: f64,
    scan_id: Option<&str>,
    data: &[u8],
) {
    db.execute(
        "INSERT INTO FragmentationSpectrum (id, scan_time, precursor_mz, scan_id, data) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, scan_time, precursor_mz, scan_id, data],
    )
    .expect("Failed to insert fragmentation spectrum");
}
