//! N-Triples output

use std::io::{self, Write};

use super::Graph;

/// Write every triple of `graph` as one N-Triples line, in graph order
pub fn write_ntriples<W: Write>(graph: &Graph, writer: &mut W) -> io::Result<()> {
    for triple in graph {
        writeln!(writer, "{}", triple)?;
    }
    writer.flush()
}

/// Serialize `graph` to an N-Triples string
pub fn to_ntriples(graph: &Graph) -> String {
    let mut out = String::new();
    for triple in graph {
        out.push_str(&triple.to_string());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_graph, RdfFormat};
    use crate::term::{Term, Triple};

    #[test]
    fn test_literal_forms() {
        let mut graph = Graph::new();
        let s = Term::uri("http://example.org/s");
        let p = Term::uri("http://example.org/p");
        graph.insert(Triple::new(s.clone(), p.clone(), Term::literal("line\nbreak \"quoted\"")));
        graph.insert(Triple::new(s.clone(), p.clone(), Term::lang_literal("chat", "fr")));
        graph.insert(Triple::new(Term::blank("b1"), p, Term::integer(3)));

        let text = to_ntriples(&graph);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], r#"<http://example.org/s> <http://example.org/p> "line\nbreak \"quoted\"" ."#);
        assert_eq!(lines[1], r#"<http://example.org/s> <http://example.org/p> "chat"@fr ."#);
        assert_eq!(
            lines[2],
            r#"_:b1 <http://example.org/p> "3"^^<http://www.w3.org/2001/XMLSchema#integer> ."#
        );
    }

    #[test]
    fn test_output_parses_back() {
        let mut graph = Graph::new();
        graph.insert(Triple::new(
            Term::uri("http://example.org/a"),
            Term::uri("http://example.org/label"),
            Term::literal("tab\there"),
        ));

        let mut buffer = Vec::new();
        write_ntriples(&graph, &mut buffer).unwrap();
        let reparsed = parse_graph(&String::from_utf8(buffer).unwrap(), RdfFormat::NTriples, None).unwrap();
        assert_eq!(reparsed, graph);
    }
}
