mod bootstrap;
mod report;

use anyhow::{Context, Result};
use occupancy_core::settings::Settings;
use occupancy_data::pipeline::estimate_from_table;
use occupancy_data::reader;

fn main() -> Result<()> {
    let (settings, config) = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("lot-occupancy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Effective pipeline config: {:?}", config);

    let delimiter = reader::delimiter_byte(settings.delimiter)?;
    let table = reader::load_table(&settings.input, delimiter)
        .with_context(|| format!("loading {}", settings.input.display()))?;

    if !table.is_counter_table(&config.columns) {
        tracing::debug!(
            "Default counter column '{}' absent; relying on lane-specific columns",
            config.columns.counter
        );
    }

    match estimate_from_table(&table, &settings.in_lanes, &settings.out_lanes, &config) {
        Ok(occupancy) => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            report::write_report(&mut out, &occupancy, &settings.format)?;
        }
        // Disjoint observation windows mean "no data", not a failed run.
        Err(e) if e.is_recoverable() => {
            tracing::warn!("{}", e);
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            report::write_no_overlap(&mut out, &e.to_string(), &settings.format)?;
        }
        Err(e) => return Err(e).context("estimating occupancy"),
    }

    Ok(())
}
