//! CLI argument parsing for aggregate

use crate::config::AggregateConfig;
use crate::parser::ParserKind;
use crate::stats::OutlierRule;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the comparison report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

fn non_empty(value: &str) -> Result<String, String> {
    if value.trim().is_empty() {
        Err("benchmark name must not be empty".to_string())
    } else {
        Ok(value.to_string())
    }
}

fn log_directory(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("{} is not a directory", value))
    }
}

#[derive(Parser, Debug)]
#[command(name = "aggregate")]
#[command(version)]
#[command(
    about = "Aggregate benchmark run logs and compare configurations",
    long_about = None
)]
pub struct Cli {
    /// Benchmark name (root of the category tree)
    #[arg(value_name = "BENCHMARK", value_parser = non_empty)]
    pub benchmark: String,

    /// Directories holding one run's logs each (e.g. one per machine)
    #[arg(value_name = "LOG_DIR", required = true, num_args = 1.., value_parser = log_directory)]
    pub log_dirs: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log format (overrides the config file)
    #[arg(short, long, value_enum)]
    pub parser: Option<ParserKind>,

    /// Relative change flagged in pairwise comparisons (e.g. 0.05 = 5%)
    #[arg(short, long, value_name = "FRACTION")]
    pub threshold: Option<f64>,

    /// Z-score outlier cutoff in standard deviations
    #[arg(long = "outlier-k", value_name = "SIGMA")]
    pub outlier_k: Option<f64>,

    /// Also run summary statistics along ordinal axes (core counts)
    #[arg(long = "ordinal-stats")]
    pub ordinal_stats: bool,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug tracing output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// Apply command-line overrides on top of a loaded configuration
    pub fn apply_overrides(&self, config: &mut AggregateConfig) {
        if let Some(parser) = self.parser {
            config.parser = parser;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(k) = self.outlier_k {
            config.outlier_rule = OutlierRule::ZScore { k };
        }
        if self.ordinal_stats {
            config.ordinal_stats = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn dir() -> String {
        std::env::temp_dir().display().to_string()
    }

    #[test]
    fn test_cli_parses_benchmark_and_dirs() {
        let d = dir();
        let cli = Cli::parse_from(["aggregate", "lulesh", d.as_str(), d.as_str()]);
        assert_eq!(cli.benchmark, "lulesh");
        assert_eq!(cli.log_dirs.len(), 2);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.debug);
    }

    #[test]
    fn test_cli_requires_log_dir() {
        let err = Cli::try_parse_from(["aggregate", "lulesh"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_cli_rejects_empty_benchmark() {
        let d = dir();
        let err = Cli::try_parse_from(["aggregate", "", d.as_str()]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_cli_rejects_missing_directory() {
        let err =
            Cli::try_parse_from(["aggregate", "lulesh", "/nonexistent/logs"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn test_cli_options() {
        let d = dir();
        let cli = Cli::parse_from([
            "aggregate",
            "--parser",
            "lulesh",
            "--threshold",
            "0.1",
            "--outlier-k",
            "3",
            "--ordinal-stats",
            "--format",
            "json",
            "lulesh",
            d.as_str(),
        ]);
        assert_eq!(cli.parser, Some(ParserKind::Lulesh));
        assert_eq!(cli.format, OutputFormat::Json);

        let mut config = AggregateConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.threshold, 0.1);
        assert_eq!(config.outlier_rule, OutlierRule::ZScore { k: 3.0 });
        assert_eq!(config.parser, ParserKind::Lulesh);
        assert!(config.ordinal_stats);
    }

    #[test]
    fn test_cli_no_overrides_keeps_config() {
        let d = dir();
        let cli = Cli::parse_from(["aggregate", "lulesh", d.as_str()]);
        let mut config = AggregateConfig {
            threshold: 0.2,
            ..AggregateConfig::default()
        };
        cli.apply_overrides(&mut config);
        assert_eq!(config.threshold, 0.2);
        assert!(!config.ordinal_stats);
    }
}
