//! End-to-end reasoning runs over files on disk

use assert_fs::prelude::*;
use assert_fs::TempDir;

use rulepipe::cli::{run_jena, run_sparql, Console};
use rulepipe::parser::{parse_graph, RdfFormat};
use rulepipe::{Graph, RulepipeConfig};

const QUIET: Console = Console { quiet: true };

const DATA: &str = "@prefix my: <http://example.org/onto#> .\n<http://example.org/a> a my:Person .\n";

const PERSON_AGENT: &str = "@prefix my: <http://example.org/onto#>.\n\
    [r1: (?x rdf:type my:Person) -> (?x rdf:type my:Agent)]\n";

// `my:` is deliberately undeclared: it comes from the first source
const AGENT_LEGAL: &str = "[r2: (?x rdf:type my:Agent) -> (?x rdf:type my:LegalEntity)]\n";

const RDF_TYPE: &str = "<http://www.w3.org/1999/02/22-rdf-syntax-ns#type>";

fn type_line(class: &str) -> String {
    format!("<http://example.org/a> {} <http://example.org/onto#{}> .", RDF_TYPE, class)
}

fn read_output(path: &std::path::Path) -> Graph {
    let text = std::fs::read_to_string(path).unwrap();
    parse_graph(&text, RdfFormat::NTriples, None).unwrap()
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        dir.child("data.ttl").write_str(DATA).unwrap();
        dir.child("person.rules").write_str(PERSON_AGENT).unwrap();
        dir.child("agent.rules").write_str(AGENT_LEGAL).unwrap();
        Fixture { dir }
    }

    fn path(&self, name: &str) -> String {
        self.dir.child(name).path().display().to_string()
    }

    fn rules(&self, names: &[&str]) -> String {
        names.iter().map(|n| self.path(n)).collect::<Vec<_>>().join(";")
    }
}

#[test]
fn person_is_an_agent() {
    let fx = Fixture::new();
    let out = fx.dir.child("out.nt");
    run_jena(&fx.path("data.ttl"), &fx.path("person.rules"), out.path(), &RulepipeConfig::default(), QUIET).unwrap();

    let text = std::fs::read_to_string(out.path()).unwrap();
    assert!(text.contains(&type_line("Person")));
    assert!(text.contains(&type_line("Agent")));
    assert_eq!(read_output(out.path()).len(), 2);
}

#[test]
fn rdfxml_input_is_reasoned_over() {
    let fx = Fixture::new();
    fx.dir
        .child("data.rdf")
        .write_str(
            r#"<?xml version="1.0"?>
<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
         xmlns:my="http://example.org/onto#">
  <my:Person rdf:about="http://example.org/a"/>
</rdf:RDF>
"#,
        )
        .unwrap();
    let out = fx.dir.child("out.nt");
    run_jena(&fx.path("data.rdf"), &fx.path("person.rules"), out.path(), &RulepipeConfig::default(), QUIET).unwrap();

    let text = std::fs::read_to_string(out.path()).unwrap();
    assert!(text.contains(&type_line("Person")));
    assert!(text.contains(&type_line("Agent")));
}

#[test]
fn stages_run_in_order() {
    let fx = Fixture::new();
    let out = fx.dir.child("forward.nt");
    let summary = run_jena(
        &fx.path("data.ttl"),
        &fx.rules(&["person.rules", "agent.rules"]),
        out.path(),
        &RulepipeConfig::default(),
        QUIET,
    )
    .unwrap();
    assert_eq!(summary.stages, 2);
    assert_eq!(summary.triples, 3);
    assert!(std::fs::read_to_string(out.path()).unwrap().contains(&type_line("LegalEntity")));
}

#[test]
fn reversed_stages_differ() {
    let fx = Fixture::new();
    // the first source declares `my:`, so put a declaring copy of the
    // Agent rule first
    fx.dir
        .child("agent_first.rules")
        .write_str(&format!("@prefix my: <http://example.org/onto#>.\n{}", AGENT_LEGAL))
        .unwrap();

    let forward = fx.dir.child("forward.nt");
    let reversed = fx.dir.child("reversed.nt");
    let config = RulepipeConfig::default();
    run_jena(&fx.path("data.ttl"), &fx.rules(&["person.rules", "agent.rules"]), forward.path(), &config, QUIET).unwrap();
    run_jena(&fx.path("data.ttl"), &fx.rules(&["agent_first.rules", "person.rules"]), reversed.path(), &config, QUIET)
        .unwrap();

    let reversed_graph = read_output(reversed.path());
    assert_ne!(read_output(forward.path()), reversed_graph);
    assert_eq!(reversed_graph.len(), 2);
    let text = std::fs::read_to_string(reversed.path()).unwrap();
    assert!(text.contains(&type_line("Agent")));
    assert!(!text.contains("LegalEntity"));
}

#[test]
fn rerunning_on_output_adds_nothing() {
    let fx = Fixture::new();
    let config = RulepipeConfig::default();
    let first = fx.dir.child("first.nt");
    let second = fx.dir.child("second.nt");
    let rules = fx.rules(&["person.rules", "agent.rules"]);

    run_jena(&fx.path("data.ttl"), &rules, first.path(), &config, QUIET).unwrap();
    run_jena(&first.path().display().to_string(), &rules, second.path(), &config, QUIET).unwrap();
    assert_eq!(read_output(first.path()), read_output(second.path()));
}

#[test]
fn output_keeps_every_input_triple() {
    let fx = Fixture::new();
    fx.dir
        .child("rich.ttl")
        .write_str(&format!("{}<http://example.org/b> <http://example.org/p> \"kept\"@en .\n", DATA))
        .unwrap();
    let out = fx.dir.child("out.nt");
    run_jena(&fx.path("rich.ttl"), &fx.path("person.rules"), out.path(), &RulepipeConfig::default(), QUIET).unwrap();

    let input = parse_graph(&(DATA.to_string() + "<http://example.org/b> <http://example.org/p> \"kept\"@en .\n"), RdfFormat::Turtle, None).unwrap();
    assert!(input.is_subset(&read_output(out.path())));
}

#[test]
fn sparql_loop_reaches_fixpoint() {
    let fx = Fixture::new();
    fx.dir
        .child("chain.ttl")
        .write_str(
            "@prefix ex: <http://example.org/> .\n\
             ex:n0 ex:state ex:Reached ; ex:next ex:n1 .\n\
             ex:n1 ex:next ex:n2 .\n\
             ex:n2 ex:next ex:n3 .\n",
        )
        .unwrap();
    fx.dir
        .child("propagate.ru")
        .write_str(
            "PREFIX ex: <http://example.org/>\n\
             INSERT { ?y ex:state ex:Reached } WHERE { ?x ex:state ex:Reached . ?x ex:next ?y }\n",
        )
        .unwrap();

    let out = fx.dir.child("out.nt");
    let report =
        run_sparql(&fx.path("chain.ttl"), &fx.path("propagate.ru"), out.path(), &RulepipeConfig::default(), QUIET)
            .unwrap();
    assert_eq!(report.iterations, 4);
    assert!(!report.cap_reached);
    assert_eq!(read_output(out.path()).len(), 7);
}

#[test]
fn sparql_loop_honours_configured_cap() {
    let fx = Fixture::new();
    fx.dir
        .child("grow.ru")
        .write_str("INSERT { _:b <http://example.org/copyOf> ?s } WHERE { ?s ?p ?o }\n")
        .unwrap();
    let mut config = RulepipeConfig::default();
    config.reasoning.max_iterations = 3;

    let out = fx.dir.child("out.nt");
    let report = run_sparql(&fx.path("data.ttl"), &fx.path("grow.ru"), out.path(), &config, QUIET).unwrap();
    assert_eq!(report.iterations, 3);
    assert!(report.cap_reached);
    out.assert(predicates::path::exists());
}
