use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use slareport_core::config::PipelineConfig;
use slareport_core::pipeline::SlaPipeline;
use slareport_core::report;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "SLA reconciliation reports for loan-application extracts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the pipeline and write the detail/summary exports
    Run(RunArgs),
    /// Load the three sources and print their shapes without computing
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pipeline configuration (TOML)
    #[arg(long)]
    config: PathBuf,
    /// Output path for the per-record detail export
    #[arg(long, default_value = "detail_sla.csv")]
    detail_out: PathBuf,
    /// Output path for the per-group summary export
    #[arg(long, default_value = "summary_cabang.csv")]
    summary_out: PathBuf,
    /// Column to group the summary by
    #[arg(long, default_value = "CABANG")]
    group_by: String,
    /// Also write the stage diagnostics as JSON
    #[arg(long)]
    diagnostics_json: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Pipeline configuration (TOML)
    #[arg(long)]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run(args),
        Command::Inspect(args) => inspect(args),
    }
}

fn run(args: RunArgs) -> Result<()> {
    let config = PipelineConfig::from_toml_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    let mut pipeline = SlaPipeline::new(config);
    let run = pipeline.run().context("pipeline run failed")?;

    for warning in &run.warnings {
        warn!(%warning, "pipeline warning");
    }

    print_diagnostics(&run);
    print_categories(&run)?;

    // Serialize every export before touching the filesystem: a failure in
    // any of them must not leave a partial export on disk.
    let mut detail = report::detail_frame(&run, pipeline.config())?;
    let detail_bytes = report::write_csv(&mut detail)?;
    let mut summary = report::summary_by_group(&run, &args.group_by)?;
    let summary_bytes = report::write_csv(&mut summary)?;
    let diagnostics_bytes = args
        .diagnostics_json
        .as_ref()
        .map(|_| serde_json::to_vec_pretty(&run.diagnostics))
        .transpose()?;

    fs::write(&args.detail_out, detail_bytes)
        .with_context(|| format!("failed to write {}", args.detail_out.display()))?;
    info!(path = %args.detail_out.display(), rows = detail.height(), "detail export written");

    fs::write(&args.summary_out, summary_bytes)
        .with_context(|| format!("failed to write {}", args.summary_out.display()))?;
    info!(path = %args.summary_out.display(), groups = summary.height(), "summary export written");

    if let (Some(path), Some(json)) = (&args.diagnostics_json, diagnostics_bytes) {
        fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "diagnostics written");
    }

    Ok(())
}

fn inspect(args: InspectArgs) -> Result<()> {
    let config = PipelineConfig::from_toml_file(&args.config)
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;
    let mut pipeline = SlaPipeline::new(config);
    let summaries = pipeline.inspect().context("failed to load sources")?;

    let mut table = Table::new();
    table.set_header(["Source", "Rows", "Columns"]);
    for summary in &summaries {
        table.add_row([
            summary.role.to_string(),
            summary.rows.to_string(),
            summary.columns.join(", "),
        ]);
    }
    println!("{table}");

    for summary in &summaries {
        if !summary.distinct_status.is_empty() {
            println!(
                "{} status values: {}",
                summary.role,
                summary.distinct_status.join(", ")
            );
        }
    }

    Ok(())
}

fn print_diagnostics(run: &slareport_core::pipeline::PipelineRun) {
    let mut table = Table::new();
    table.set_header(["Stage", "Count"]);
    for (stage, count) in run.diagnostics.as_entries() {
        table.add_row([stage.to_string(), count.to_string()]);
    }
    println!("{table}");

    if !run.diagnostics.secondary_duplicate_ids.is_empty() {
        info!(
            ids = ?run.diagnostics.secondary_duplicate_ids,
            "secondary table had duplicate application ids"
        );
    }
}

fn print_categories(run: &slareport_core::pipeline::PipelineRun) -> Result<()> {
    let mut table = Table::new();
    table.set_header(["SLA Category", "Records"]);
    for (label, count) in report::category_counts(run)? {
        table.add_row([label.to_string(), count.to_string()]);
    }
    println!("{table}");
    Ok(())
}
