//! Benchmarks for featdb
//!
//! Run with: cargo bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rusqlite::{Connection, params};

use featdb::model::{Ms2ScanInfo, TracePoint, XicPoint};
use featdb::timeline::merge_timeline;
use featdb::{
    ActiveFeatureCache, FeatureTableModel, VirtualTableIndex, WorkingSet, decode_trace_points,
    encode_trace_points,
};

/// Build a synthetic in-memory store: `feature_count` consensus features,
/// `sample_count` samples, roughly two thirds of the cells observed, and a
/// 1000-point mass trace for pair (1, 1).
fn synthetic_db(feature_count: usize, sample_count: usize) -> Connection {
    let db = Connection::open_in_memory().unwrap();
    db.execute_batch(
        "CREATE TABLE Sample (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
         CREATE TABLE Feature (
             id INTEGER PRIMARY KEY,
             consensus_mz REAL NOT NULL,
             consensus_rt REAL NOT NULL,
             consensus_charge INTEGER NOT NULL
         );
         CREATE TABLE SampleFeature (
             sample_id INTEGER NOT NULL,
             feature_id INTEGER NOT NULL,
             intensity REAL NOT NULL,
             PRIMARY KEY (feature_id, sample_id)
         );
         CREATE TABLE FeatureMassTrace (
             id INTEGER PRIMARY KEY,
             sample_id INTEGER NOT NULL,
             feature_id INTEGER NOT NULL,
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
             mt_id INTEGER NOT NULL,
             spectrum_id INTEGER NOT NULL,
             PRIMARY KEY (mt_id, spectrum_id)
         );",
    )
    .unwrap();

    {
        let mut insert_sample = db
            .prepare("INSERT INTO Sample (id, name) VALUES (?1, ?2)")
            .unwrap();
        for s in 1..=sample_count as i64 {
            insert_sample.execute(params![s, format!("sample_{}", s)]).unwrap();
        }

        let mut insert_feature = db
            .prepare(
                "INSERT INTO Feature (id, consensus_mz, consensus_rt, consensus_charge) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .unwrap();
        let mut insert_cell = db
            .prepare(
                "INSERT INTO SampleFeature (sample_id, feature_id, intensity) \
                 VALUES (?1, ?2, ?3)",
            )
            .unwrap();
        for f in 1..=feature_count as i64 {
            insert_feature
                .execute(params![f, 100.0 + f as f64 * 0.37, f as f64 * 0.5, 2])
                .unwrap();
            for s in 1..=sample_count as i64 {
                if (f + s) % 3 != 0 {
                    insert_cell
                        .execute(params![s, f, 1000.0 + (f * s) as f64])
                        .unwrap();
                }
            }
        }
    }

    let trace: Vec<TracePoint> = (0..1000)
        .map(|i| TracePoint {
            mz: 100.37,
            rt: i as f32 * 0.1,
            intensity: 500.0 + (i % 23) as f32,
        })
        .collect();
    db.execute(
        "INSERT INTO FeatureMassTrace (id, sample_id, feature_id, rt_start, rt_end, data) \
         VALUES (1, 1, 1, 0.0, 99.9, ?1)",
        params![encode_trace_points(&trace)],
    )
    .unwrap();

    db
}

fn bench_table_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("table_index_build");
    for &feature_count in [500usize, 2000].iter() {
        let db = synthetic_db(feature_count, 8);
        group.bench_with_input(
            BenchmarkId::from_parameter(feature_count),
            &feature_count,
            |b, _| {
                b.iter(|| {
                    let model = FeatureTableModel::build(black_box(&db)).unwrap();
                    black_box(model.row_count())
                });
            },
        );
    }
    group.finish();
}

fn bench_cell_value(c: &mut Criterion) {
    let db = synthetic_db(2000, 8);
    let mut group = c.benchmark_group("cell_value");

    group.bench_function("binary_search_uncached", |b| {
        let mut index = VirtualTableIndex::build(&db).unwrap();
        let columns = index.column_count();
        let mut row = 0usize;
        b.iter(|| {
            row = (row + 7) % 2000;
            black_box(index.value(row, 4 + row % (columns - 4)))
        });
    });

    group.bench_function("memoized_read", |b| {
        let mut model = FeatureTableModel::build(&db).unwrap();
        let columns = model.column_count();
        let mut row = 0usize;
        b.iter(|| {
            row = (row + 7) % 2000;
            black_box(model.value(row, 4 + row % (columns - 4)))
        });
    });

    group.finish();
}

fn bench_merge_timeline(c: &mut Criterion) {
    let xic: Vec<XicPoint> = (0..1000)
        .map(|i| XicPoint {
            rt: i as f64 * 0.5,
            intensity: 100.0 + (i % 17) as f64,
        })
        .collect();
    let scans: Vec<Ms2ScanInfo> = (0..50)
        .map(|i| Ms2ScanInfo {
            spectrum_id: i as i64 + 1,
            scan_time: i as f64 * 9.7,
            precursor_mz: 400.0 + i as f64,
            scan_description: String::new(),
        })
        .collect();

    c.bench_function("merge_timeline_1000x50", |b| {
        b.iter(|| merge_timeline(1, 1, black_box(&xic), black_box(&scans)).unwrap());
    });
}

fn bench_decode_trace_blob(c: &mut Criterion) {
    let points: Vec<TracePoint> = (0..10_000)
        .map(|i| TracePoint {
            mz: 500.0 + i as f64 * 1e-4,
            rt: i as f32 * 0.1,
            intensity: 1000.0,
        })
        .collect();
    let blob = encode_trace_points(&points);

    c.bench_function("decode_trace_blob_10k", |b| {
        b.iter(|| decode_trace_points(black_box(&blob)).unwrap());
    });
}

fn bench_selection_fetch(c: &mut Criterion) {
    let db = synthetic_db(100, 4);
    let mut cache = ActiveFeatureCache::new();
    let selection = WorkingSet::from_pairs([(1, 1)]);

    c.bench_function("selection_fetch_single_pair", |b| {
        b.iter(|| {
            cache.clear();
            cache
                .set_active_features(&db, black_box(&selection))
                .unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_table_index_build,
    bench_cell_value,
    bench_merge_timeline,
    bench_decode_trace_blob,
    bench_selection_fetch,
);

criterion_main!(benches);
