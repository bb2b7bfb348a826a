//! rulepipe - staged rule reasoning over RDF graphs
//!
//! Command-line entry point: runs one reasoning job or the service.

use std::process::ExitCode;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;

use rulepipe::cli::{run_jena, run_sparql, Cli, Console, Mode};
use rulepipe::config::{LogLevel, RulepipeConfig};
use rulepipe::logging::{init_logging, LogConfig};
use rulepipe::server::{build_runtime, run_server};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mode = match Mode::from_args(&cli.args) {
        Ok(mode) => mode,
        Err(usage) => {
            eprintln!("{}", usage);
            return ExitCode::from(2);
        }
    };

    match run(cli, mode) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, mode: Mode) -> Result<()> {
    let (mut config, ignored) =
        RulepipeConfig::load_reporting(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.general.log_level =
            LogLevel::from_str(level).with_context(|| format!("Unknown log level '{}'", level))?;
    }
    init_logging(&LogConfig::from(&config.general))?;
    for skipped in &ignored {
        skipped.log();
    }
    rulepipe::http_client::init_sync_client(&config.http.client_config());

    let console = Console { quiet: cli.quiet };
    let started = Instant::now();

    match mode {
        Mode::Service { port } => {
            if let Some(port) = port.or(cli.port) {
                config.server.port = port;
            }
            let runtime = build_runtime(config.server.workers).context("Failed to start async runtime")?;
            runtime.block_on(run_server(config)).context("Reasoning service failed")?;
            return Ok(());
        }
        Mode::Jena { input, rules, output } => {
            run_jena(&input, &rules, &output, &config, console)
                .with_context(|| format!("Reasoning over {} with {} failed", input, rules))?;
        }
        Mode::Sparql { input, update, output } => {
            run_sparql(&input, &update, &output, &config, console)
                .with_context(|| format!("Update loop over {} with {} failed", input, update))?;
        }
    }

    console.line(format!("Total run time {:.3} seconds.", started.elapsed().as_secs_f64()));
    Ok(())
}
