use anyhow::{Context, Result};
use clap::Parser;
use energy_stats::cli::{Cli, Command, OutputFormat};
use energy_stats::compare::Comparison;
use energy_stats::config::{ExperimentConfig, PipelineConfig};
use energy_stats::group::{GroupArtifacts, MetricSummary};
use energy_stats::pipeline::{ExperimentReport, Pipeline};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` enables everything down to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// JSON shape of `analyze`
#[derive(Serialize)]
struct GroupReport<'a> {
    group: &'a str,
    trials: Vec<&'a str>,
    output_dir: PathBuf,
    metrics: Vec<MetricSummary>,
}

/// Configuration file (or defaults) with the `--output` override applied
fn load_config(config_path: Option<&Path>, output: Option<&Path>) -> Result<PipelineConfig> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_toml(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(output) = output {
        config.output_dir = output.to_path_buf();
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

fn print_group(artifacts: &GroupArtifacts, output_dir: PathBuf, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            print!("{}", artifacts.to_report_string());
            println!("\nArtifacts: {}", output_dir.display());
            Ok(())
        }
        OutputFormat::Json => print_json(&GroupReport {
            group: &artifacts.name,
            trials: artifacts.trial_ids(),
            output_dir,
            metrics: artifacts.metric_summaries(),
        }),
    }
}

fn print_comparison(comparison: &Comparison, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            print!("{}", comparison.to_report_string());
            Ok(())
        }
        OutputFormat::Json => print_json(comparison),
    }
}

fn print_experiment(report: &ExperimentReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Groups analysed: {}", report.groups.join(", "));
            for comparison in &report.comparisons {
                println!();
                print!("{}", comparison.to_report_string());
            }
            Ok(())
        }
        OutputFormat::Json => print_json(report),
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(args.config.as_deref(), args.output.as_deref())?;

    match &args.command {
        Command::Analyze { name, folder } => {
            let mut pipeline = Pipeline::new(config)?;
            let output_dir = pipeline.group_dir(name);
            let group = pipeline.create_group(name, folder)?;
            let artifacts = group
                .artifacts()
                .context("Group was created without statistics")?;
            print_group(artifacts, output_dir, args.format)?;
        }
        Command::Compare { groups } => {
            let pipeline = Pipeline::new(config)?;
            let names: Vec<&str> = groups.iter().map(String::as_str).collect();
            let comparison = pipeline.compare(&names)?;
            print_comparison(&comparison, args.format)?;
        }
        Command::Run { experiment } => {
            let experiment = ExperimentConfig::from_toml(experiment)?;
            let config = match &experiment.pipeline {
                Some(pipeline) => {
                    let mut config = pipeline.clone();
                    if let Some(output) = &args.output {
                        config.output_dir = output.clone();
                    }
                    config
                }
                None => config,
            };

            let mut pipeline = Pipeline::new(config)?;
            let report = pipeline.run_experiment(&experiment)?;
            print_experiment(&report, args.format)?;
        }
    }

    Ok(())
}
