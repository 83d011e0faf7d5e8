//! CLI argument parsing for energy-stats

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "energy-stats")]
#[command(version)]
#[command(
    about = "Aggregate energy measurement trials and compare experiment groups",
    long_about = None
)]
pub struct Cli {
    /// Pipeline configuration file (TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Artifact output directory (overrides the configuration)
    #[arg(short, long, value_name = "DIR", global = true)]
    pub output: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Aggregate and summarize the trials in a folder as one group
    Analyze {
        /// Group name (also the artifact directory name)
        name: String,
        /// Folder of trial CSV files
        folder: PathBuf,
    },

    /// Compare two previously analysed groups
    Compare {
        /// Group names; exactly two are required
        #[arg(required = true)]
        groups: Vec<String>,
    },

    /// Analyse and compare the groups of an experiment file
    Run {
        /// Experiment definition (TOML)
        experiment: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::parse_from(["energy-stats", "analyze", "baseline", "raw/baseline"]);
        assert_eq!(
            cli.command,
            Command::Analyze {
                name: "baseline".to_string(),
                folder: PathBuf::from("raw/baseline"),
            }
        );
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.debug);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_compare_keeps_all_names() {
        let cli = Cli::parse_from(["energy-stats", "compare", "a", "b", "c"]);
        assert_eq!(
            cli.command,
            Command::Compare {
                groups: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            }
        );
    }

    #[test]
    fn test_cli_compare_requires_names() {
        assert!(Cli::try_parse_from(["energy-stats", "compare"]).is_err());
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "energy-stats",
            "run",
            "experiment.toml",
            "--format",
            "json",
            "--output",
            "out",
            "--debug",
        ]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        assert!(cli.debug);
    }

    #[test]
    fn test_cli_config_flag() {
        let cli = Cli::parse_from(["energy-stats", "-c", "pipeline.toml", "compare", "a", "b"]);
        assert_eq!(cli.config, Some(PathBuf::from("pipeline.toml")));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["energy-stats"]).is_err());
    }
}
