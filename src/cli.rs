//! Command-line front end
//!
//! ```text
//! rulepipe [jena] <input-rdf> <rules[;rules...]> <output.nt>
//! rulepipe sparql <input-rdf> <update-rules> <output.nt>
//! rulepipe service [port <N>]
//! ```

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use crate::cache::ReasonerCache;
use crate::config::{CacheConfig, RulepipeConfig};
use crate::error::ReasonResult;
use crate::reasoning::{FixpointReport, FixpointUpdateLoop, IterationProgress, LogProgress, ProgressObserver, ReasoningPipeline};
use crate::source::{load_graph, read_rule_text, write_graph_file, RuleSource};

pub const USAGE: &str = "Please provide (the optional mode and) 3 arguments:
 0) Mode to run in: 'jena' (the default), 'sparql' or 'service'
 1) Path or URL of the input RDF file
 2) Path to the rules file (several files separated with ';' run as sequential stages)
 3) Path where the output N-Triples file is written
Service mode takes only an optional port: 'service port 20299'";

#[derive(Parser, Debug)]
#[command(name = "rulepipe")]
#[command(version)]
#[command(about = "Staged forward-chaining rule reasoning over RDF graphs", long_about = None)]
#[command(after_help = USAGE)]
pub struct Cli {
    /// Configuration file (defaults to the search path)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Suppress progress lines on stdout
    #[arg(short, long)]
    pub quiet: bool,

    /// Service port (same as `service port N`)
    #[arg(long, value_name = "N")]
    pub port: Option<u16>,

    /// Mode and its arguments
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Malformed positional arguments
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// What the positional arguments ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Jena { input: String, rules: String, output: PathBuf },
    Sparql { input: String, update: String, output: PathBuf },
    Service { port: Option<u16> },
}

impl Mode {
    /// Interpret positional arguments.
    ///
    /// A first argument containing `service` selects the service. Four
    /// arguments name a mode first: `sparql` selects the update loop and
    /// any other word the staged reasoner. Three arguments run the staged
    /// reasoner.
    pub fn from_args(args: &[String]) -> Result<Mode, UsageError> {
        let Some(first) = args.first() else {
            return Err(UsageError(USAGE.to_string()));
        };

        if first.to_lowercase().contains("service") {
            let port = match &args[1..] {
                [] => None,
                [keyword, value] if keyword.contains("port") => Some(parse_port(value)?),
                [single] => match single.split_once('=') {
                    Some((keyword, value)) if keyword.contains("port") => Some(parse_port(value)?),
                    _ => return Err(UsageError(format!("Unexpected service argument '{}'", single))),
                },
                _ => return Err(UsageError("Expected 'service [port N]'".to_string())),
            };
            return Ok(Mode::Service { port });
        }

        match args {
            [input, rules, output] => Ok(Mode::Jena {
                input: input.clone(),
                rules: rules.clone(),
                output: PathBuf::from(output),
            }),
            [mode, input, rules, output] if mode.to_lowercase().contains("sparql") => Ok(Mode::Sparql {
                input: input.clone(),
                update: rules.clone(),
                output: PathBuf::from(output),
            }),
            [_, input, rules, output] => Ok(Mode::Jena {
                input: input.clone(),
                rules: rules.clone(),
                output: PathBuf::from(output),
            }),
            _ => Err(UsageError(USAGE.to_string())),
        }
    }
}

fn parse_port(value: &str) -> Result<u16, UsageError> {
    match value.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(UsageError(format!("Invalid port '{}'", value))),
    }
}

/// User-facing progress lines, silenced by `--quiet`
#[derive(Debug, Clone, Copy)]
pub struct Console {
    pub quiet: bool,
}

impl Console {
    pub fn line(&self, text: impl AsRef<str>) {
        if !self.quiet {
            println!("{}", text.as_ref());
        }
    }
}

fn seconds(started: Instant) -> String {
    format!("{:.3}", started.elapsed().as_secs_f64())
}

/// Summary of a staged run
#[derive(Debug, Clone)]
pub struct JenaSummary {
    pub stages: usize,
    pub triples: usize,
}

/// Run the staged reasoner and write N-Triples to `output`
pub fn run_jena(
    input: &str,
    rules: &str,
    output: &Path,
    config: &RulepipeConfig,
    console: Console,
) -> ReasonResult<JenaSummary> {
    console.line("Jena mode.");
    let sources = RuleSource::split_list(rules);

    // one run builds each engine once; nothing to keep them for
    let cache = ReasonerCache::new(&CacheConfig { enabled: false, ..config.cache.clone() }, config.reasoning.engine_config());
    let pipeline = ReasoningPipeline::from_sources(&sources, &config.reasoning.prefix, &cache)?;
    for stage in pipeline.stages() {
        console.line(format!("{} rules in: {}", stage.engine.rules().len(), stage.source));
    }

    let graph = load_graph(input, config.reasoning.input_format())?;
    let started = Instant::now();
    let result = pipeline.run(graph)?;
    for stage in &result.stages {
        console.line(format!(
            "Time spent on reasoning step {}: {:.3} seconds.",
            stage.source,
            stage.elapsed.as_secs_f64()
        ));
    }
    console.line(format!("Time spent on all reasoning steps: {} seconds.", seconds(started)));

    write_graph_file(&result.graph, output)?;
    info!(output = %output.display(), triples = result.graph.len(), "Result written");
    Ok(JenaSummary { stages: result.stages.len(), triples: result.graph.len() })
}

/// Run an update batch to its fixpoint and write N-Triples to `output`
pub fn run_sparql(
    input: &str,
    update: &str,
    output: &Path,
    config: &RulepipeConfig,
    console: Console,
) -> ReasonResult<FixpointReport> {
    console.line("Naive SPARQL mode.");
    let source = RuleSource::new(update, 0);
    let text = read_rule_text(&source)?;
    let fixpoint = FixpointUpdateLoop::parse(&text, update)?.with_cap(config.reasoning.max_iterations);

    let mut graph = load_graph(input, config.reasoning.input_format())?;
    console.line(format!("Starting reasoning from NTriples: {}", graph.len()));

    let started = Instant::now();
    let mut observer = |progress: &IterationProgress| {
        LogProgress.on_iteration(progress);
        console.line(format!(
            "Iteration: {}, NTriples: {} \t({:.3} s.)",
            progress.iteration,
            progress.triples,
            progress.elapsed.as_secs_f64()
        ));
    };
    let report = fixpoint.run(&mut graph, &mut observer)?;
    console.line(format!("Time spent on reasoning: {} seconds.", seconds(started)));

    write_graph_file(&graph, output)?;
    info!(output = %output.display(), triples = graph.len(), iterations = report.iterations, "Result written");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_three_arguments_run_jena() {
        let mode = Mode::from_args(&args(&["in.ttl", "a.rules;b.rules", "out.nt"])).unwrap();
        assert_eq!(
            mode,
            Mode::Jena { input: "in.ttl".into(), rules: "a.rules;b.rules".into(), output: "out.nt".into() }
        );
    }

    #[test]
    fn test_mode_word_selects_runner() {
        let mode = Mode::from_args(&args(&["SPARQL", "in.ttl", "up.ru", "out.nt"])).unwrap();
        assert!(matches!(mode, Mode::Sparql { .. }));
        let mode = Mode::from_args(&args(&["jena", "in.ttl", "r.rules", "out.nt"])).unwrap();
        assert!(matches!(mode, Mode::Jena { .. }));
    }

    #[test]
    fn test_service_port_forms() {
        assert_eq!(Mode::from_args(&args(&["service"])).unwrap(), Mode::Service { port: None });
        assert_eq!(
            Mode::from_args(&args(&["service", "port", "9000"])).unwrap(),
            Mode::Service { port: Some(9000) }
        );
        assert_eq!(
            Mode::from_args(&args(&["service", "port=9001"])).unwrap(),
            Mode::Service { port: Some(9001) }
        );
        assert!(Mode::from_args(&args(&["service", "port", "nine"])).is_err());
        assert!(Mode::from_args(&args(&["service", "port", "0"])).is_err());
    }

    #[test]
    fn test_too_few_or_many_arguments() {
        assert!(Mode::from_args(&[]).is_err());
        assert!(Mode::from_args(&args(&["in.ttl", "r.rules"])).is_err());
        assert!(Mode::from_args(&args(&["jena", "a", "b", "c", "d"])).is_err());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from(["rulepipe", "--quiet", "service", "--port", "8000"]).unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.port, Some(8000));
        assert_eq!(cli.args, vec!["service".to_string()]);
    }
}
