//! Sandbox binary for poking at a feature store from the command line
//!
//! ```bash
//! cargo run --bin featdb_sandbox -- path/to/features.sqlite
//! ```

use std::collections::HashMap;

use anyhow_ext::{Result, anyhow};
use fallible_iterator::FallibleIterator;

use featdb::queries::list_consensus_features;
use featdb::{FeatureDbReader, WorkingSet};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: featdb_sandbox <features.sqlite>"))?;

    let mut reader = FeatureDbReader::open(&path)?;

    println!("=== Catalog ===");
    for sample in reader.samples() {
        println!("sample {}: {}", sample.id, sample.name);
    }
    println!("{} consensus features", reader.feature_count());

    println!("=== Table ===");
    let mut table = reader.table_model()?;
    println!("{} rows x {} columns", table.row_count(), table.column_count());

    let labels: Vec<String> = (0..table.column_count())
        .map(|column| table.column_label(column).unwrap_or_default())
        .collect();
    println!("{}", labels.join(" | "));

    let mut rows = table.iter_rows();
    let mut printed = 0;
    while let Some(row) = rows.next()? {
        if printed == 5 {
            break;
        }
        println!("{:?}", row);
        printed += 1;
    }

    let Some(first_feature) = table.row_key(0) else {
        println!("empty store, nothing to select");
        return Ok(());
    };

    // Select the first table row across every sample, the way a click on
    // a row in the viewer would.
    let consensus_mzs: HashMap<_, _> = list_consensus_features(reader.connection())?
        .into_iter()
        .map(|feature| (feature.id, feature.consensus_mz))
        .collect();

    let mut selection = WorkingSet::new();
    for sample in reader.samples() {
        selection.insert(sample.id, first_feature);
    }

    println!("=== Selection ===");
    let plot = reader.select_features(&selection, &consensus_mzs)?;
    println!(
        "{} XIC series / {} timeline points",
        plot.xic_series.len(),
        plot.xic_points.len()
    );
    println!(
        "{} mass-peak series / {} peaks",
        plot.mass_peak_series.len(),
        plot.mass_peak_points.len()
    );

    let spectrum_ids: Vec<_> = plot
        .xic_points
        .iter()
        .filter_map(|point| point.spectrum_id)
        .collect();
    if !spectrum_ids.is_empty() {
        let spectra = reader.ms2_spectra(&spectrum_ids)?;
        println!("{} MS2 spectra decoded", spectra.len());
    }

    Ok(())
}
