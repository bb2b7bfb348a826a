//! Reading rule sources and input graphs, writing results
//!
//! A location is a local path, a `file://` URL or an `http(s)://` URL.
//! Remote locations go through the shared agent in [`crate::http_client`].

use std::fmt;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ErrorCode, ReasonError, ReasonResult};
use crate::graph::{write_ntriples, Graph};
use crate::http_client::{self, is_http_url};
use crate::parser::{parse_graph, parse_rules, PrefixTable, RdfFormat};
use crate::reasoner::RuleSet;

/// Where one rule set comes from, and its place in the request's stage list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleSource {
    pub location: String,
    pub position: usize,
}

impl RuleSource {
    pub fn new(location: impl Into<String>, position: usize) -> Self {
        RuleSource { location: location.into(), position }
    }

    /// Split a `;`-separated list (`a.rules;b.rules`) into ordered sources.
    /// Blank entries are skipped.
    pub fn split_list(list: &str) -> Vec<RuleSource> {
        list.split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(position, location)| RuleSource::new(location, position))
            .collect()
    }
}

impl fmt::Display for RuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location)
    }
}

/// Text read from a location, with the media type a server declared for it
#[derive(Debug, Clone)]
pub struct SourceText {
    pub text: String,
    pub content_type: Option<String>,
}

/// Read the text at `location`, whatever kind of location it is
pub fn read_location(location: &str) -> Result<SourceText, String> {
    if is_http_url(location) {
        let fetched = http_client::sync_get(location).map_err(|e| e.to_string())?;
        return Ok(SourceText { text: fetched.body, content_type: fetched.content_type });
    }
    let path = location.strip_prefix("file://").unwrap_or(location);
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    Ok(SourceText { text, content_type: None })
}

/// Read the rule text of `source`
pub fn read_rule_text(source: &RuleSource) -> ReasonResult<String> {
    read_location(&source.location)
        .map(|s| s.text)
        .map_err(|reason| {
            ReasonError::rule_source_read(&source.location, reason)
                .with_context("position", source.position.to_string())
        })
}

/// Read and parse one rule source under the request's prefix table
pub fn load_rule_set(source: &RuleSource, prefixes: &PrefixTable) -> ReasonResult<RuleSet> {
    let text = read_rule_text(source)?;
    parse_rule_text(&text, &source.location, prefixes)
}

/// Parse rule text already in memory
pub fn parse_rule_text(text: &str, location: &str, prefixes: &PrefixTable) -> ReasonResult<RuleSet> {
    let rules = parse_rules(text, location, prefixes)
        .map_err(|e| e.into_reason_error(ErrorCode::RuleParse, location))?;
    info!(source = location, rules = rules.len(), "Loaded rules");
    Ok(rules)
}

/// Fetch and parse the graph at `location`.
///
/// The format is `format` when given, else the server's content type, else
/// the file extension.
pub fn load_graph(location: &str, format: Option<RdfFormat>) -> ReasonResult<Graph> {
    let source = read_location(location).map_err(|reason| ReasonError::graph_load(location, reason))?;
    let format = format
        .or_else(|| source.content_type.as_deref().and_then(RdfFormat::from_media_type))
        .unwrap_or_else(|| RdfFormat::from_path(location));
    let base = base_iri(location);
    let graph = parse_graph(&source.text, format, base.as_deref())
        .map_err(|e| e.into_reason_error(ErrorCode::GraphLoad, location))?;
    debug!(source = location, ?format, triples = graph.len(), "Loaded graph");
    Ok(graph)
}

/// Parse a graph sent inline, e.g. in a service request
pub fn parse_graph_payload(text: &str, format: RdfFormat) -> ReasonResult<Graph> {
    parse_graph(text, format, None).map_err(|e| e.into_reason_error(ErrorCode::GraphLoad, "request payload"))
}

fn base_iri(location: &str) -> Option<String> {
    if is_http_url(location) || location.starts_with("file://") {
        return Some(location.to_string());
    }
    let absolute = fs::canonicalize(location).ok()?;
    Some(format!("file://{}", absolute.display()))
}

/// Write `graph` as N-Triples to `path`
pub fn write_graph_file(graph: &Graph, path: &Path) -> ReasonResult<()> {
    let destination = path.display().to_string();
    let file = fs::File::create(path).map_err(|e| ReasonError::output_write(&destination, e))?;
    let mut writer = BufWriter::new(file);
    write_ntriples(graph, &mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| ReasonError::output_write(&destination, e))?;
    debug!(destination = %destination, triples = graph.len(), "Wrote N-Triples");
    Ok(())
}
