use crate::output::print_json;
use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;
use geotrack_core::config::Config;
use geotrack_core::export::ExportArtifact;
use geotrack_core::scheduler::RunOutcome;
use geotrack_core::{ExportFormat, Tracker};

#[derive(Subcommand)]
pub enum ExportSubcommand {
    /// Fetch current locations for all devices and export them
    Current {
        /// File name inside export.output_dir (default: current_<date>.<ext>)
        #[arg(long)]
        output: Option<String>,
        /// geojson, csv or kml
        #[arg(long, default_value_t = ExportFormat::GeoJson)]
        format: ExportFormat,
    },

    /// Export one device's track for a calendar day
    History {
        /// Device IMEI
        #[arg(long)]
        imei: String,
        /// Day to export (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// File name inside export.output_dir
        #[arg(long)]
        output: Option<String>,
        #[arg(long, default_value_t = ExportFormat::GeoJson)]
        format: ExportFormat,
    },
}

pub fn run(config: &Config, subcmd: ExportSubcommand, json: bool) -> anyhow::Result<()> {
    let tracker = super::build_tracker(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    match subcmd {
        ExportSubcommand::Current { output, format } => {
            rt.block_on(current(&tracker, output.as_deref(), format, json))
        }
        ExportSubcommand::History {
            imei,
            date,
            output,
            format,
        } => {
            let artifact =
                rt.block_on(tracker.export_history(&imei, date, output.as_deref(), format))?;
            report(&artifact, json)
        }
    }
}

/// One refresh cycle whose artifact is the requested file.
async fn current(
    tracker: &Tracker,
    output: Option<&str>,
    format: ExportFormat,
    json: bool,
) -> anyhow::Result<()> {
    let record = tracker
        .refresh_to(output, format)
        .await
        .context("failed to refresh current locations")?;

    match &record.outcome {
        RunOutcome::Success { devices, artifact } => {
            if json {
                print_json(&serde_json::json!({
                    "path": artifact,
                    "format": format,
                    "source": "current",
                    "total_features": devices,
                    "generated_at": record.finished_at,
                }))
            } else {
                println!("Exported {devices} device(s) to {}", artifact.display());
                Ok(())
            }
        }
        RunOutcome::Failure { error, .. } => anyhow::bail!("refresh failed: {error}"),
    }
}

fn report(artifact: &ExportArtifact, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&serde_json::json!({
            "path": artifact.path,
            "format": artifact.format,
            "source": artifact.source(),
            "total_features": artifact.total_features(),
            "generated_at": artifact.generated_at(),
        }));
    }
    println!(
        "Exported {} feature(s) ({}) to {}",
        artifact.total_features(),
        artifact.source(),
        artifact.path.display()
    );
    Ok(())
}
