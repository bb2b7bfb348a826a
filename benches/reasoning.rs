//! Benchmarks for stage closure and the fixpoint update loop

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use rulepipe::parser::{parse_graph, PrefixTable, RdfFormat};
use rulepipe::reasoner::{EngineConfig, ForwardEngine};
use rulepipe::reasoning::{FixpointUpdateLoop, IterationProgress};
use rulepipe::source::parse_rule_text;
use rulepipe::Graph;

const RULES: &str = r#"
@prefix my: <http://example.org/onto#>.
[subclass: (?a rdfs:subClassOf ?b) (?b rdfs:subClassOf ?c) -> (?a rdfs:subClassOf ?c)]
[typing: (?x rdf:type ?a) (?a rdfs:subClassOf ?b) -> (?x rdf:type ?b)]
[reach: (?x my:next ?y) (?y my:next ?z) -> (?x my:reaches ?z)]
"#;

const UPDATE: &str = r#"
PREFIX my: <http://example.org/onto#>
INSERT { ?y my:state my:Reached } WHERE { ?x my:state my:Reached . ?x my:next ?y }
"#;

/// A class chain of depth `depth`, `size` typed individuals and a `next` chain
fn sample_graph(size: usize, depth: usize) -> Graph {
    let mut text = String::from("@prefix my: <http://example.org/onto#> .\n@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n");
    for level in 0..depth {
        text.push_str(&format!("my:C{} rdfs:subClassOf my:C{} .\n", level, level + 1));
    }
    for i in 0..size {
        text.push_str(&format!("my:i{} a my:C0 ; my:next my:i{} .\n", i, i + 1));
    }
    text.push_str("my:i0 my:state my:Reached .\n");
    parse_graph(&text, RdfFormat::Turtle, None).unwrap()
}

fn closure_benchmark(c: &mut Criterion) {
    let rules = parse_rule_text(RULES, "bench.rules", &PrefixTable::new()).unwrap();
    let engine = ForwardEngine::new(rules, EngineConfig::default()).unwrap();

    let mut group = c.benchmark_group("stage_closure");
    for size in [10usize, 50, 100] {
        let graph = sample_graph(size, 5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| black_box(engine.closure(graph).unwrap()));
        });
    }
    group.finish();
}

fn fixpoint_benchmark(c: &mut Criterion) {
    let fixpoint = FixpointUpdateLoop::parse(UPDATE, "bench.ru").unwrap();

    let mut group = c.benchmark_group("fixpoint_loop");
    for size in [10usize, 50] {
        let graph = sample_graph(size, 1);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, graph| {
            b.iter(|| {
                let mut graph = graph.clone();
                let report = fixpoint.run(&mut graph, &mut |_: &IterationProgress| {}).unwrap();
                black_box(report.iterations)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, closure_benchmark, fixpoint_benchmark);
criterion_main!(benches);
