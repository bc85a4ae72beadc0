use aggregate::cli::{Cli, OutputFormat};
use aggregate::config::AggregateConfig;
use aggregate::parser::LogParser;
use aggregate::pipeline::{Aggregation, RunContext};
use aggregate::source;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; `--debug` forces TRACE, otherwise RUST_LOG
/// (default: warnings only)
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

fn load_config(cli: &Cli) -> Result<AggregateConfig> {
    let mut config = match &cli.config {
        Some(path) => AggregateConfig::from_file(path)?,
        None => AggregateConfig::default(),
    };
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli)?;
    let parser = LogParser::from_config(&config);

    let (sources, unreadable) = source::discover(&cli.log_dirs);
    info!(
        "Discovered {} logs in {} directories",
        sources.len(),
        cli.log_dirs.len()
    );

    let mut run = Aggregation::new(RunContext::new(cli.benchmark.clone(), config));
    run.extend_skipped(unreadable);
    run.ingest(&sources, &parser);

    let summary = run.summary();
    let report = run.compare();

    match cli.format {
        OutputFormat::Text => {
            println!("{}", summary.to_report_string());
            print!("{}", report.to_report_string());
        }
        OutputFormat::Json => {
            let json = serde_json::json!({
                "summary": summary,
                "comparison": report,
                "fingerprint": report.fingerprint()?,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
