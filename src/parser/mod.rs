//! Text parsers
//!
//! Three languages share one set of nom token parsers and a small cursor:
//! - Turtle and N-Triples input graphs ([`turtle`])
//! - forward rule text with `@prefix` directives ([`rules`])
//! - SPARQL update batches (in [`crate::sparql::parser`])
//!
//! RDF/XML input graphs are scanned directly by [`rdfxml`].
//!
//! Prefix resolution for rule text never touches global state: callers pass
//! a [`PrefixTable`] into each parse call ([`prefix`]).

pub mod prefix;
pub mod rdfxml;
pub mod rules;
pub mod turtle;

pub use prefix::{find_prefix_iri, resolve_binding, PrefixBinding, PrefixTable};
pub use rules::parse_rules;
pub use turtle::{parse_graph, RdfFormat};

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace1, satisfy},
    combinator::{opt, recognize, value},
    multi::many0,
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

use crate::error::{ErrorCode, ReasonError};
use crate::term::uri::ns;
use crate::term::{Literal, Term, Uri};

/// Parser error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("Syntax error at line {line}, column {column}: {message}")]
    Syntax { line: usize, column: usize, message: String },

    #[error("Undefined prefix: {prefix}")]
    UndefinedPrefix { prefix: String },

    #[error("Unsupported construct at line {line}: {construct}")]
    Unsupported { line: usize, construct: String },

    #[error("Unexpected end of input")]
    UnexpectedEof,
}

impl ParseError {
    /// Lift into the crate error, tagged with the code of the language
    /// being parsed and the source it came from
    pub fn into_reason_error(self, code: ErrorCode, source: &str) -> ReasonError {
        let err = ReasonError::new(code, format!("{}: {}", source, self)).at(source.to_string());
        match self {
            ParseError::UndefinedPrefix { prefix } => {
                err.with_context("prefix", prefix).with_hint("declare it with @prefix or PREFIX")
            }
            _ => err,
        }
    }
}

// ============================================================================
// Token parsers
// ============================================================================

/// Whitespace and comments (`#` and `//` to end of line)
pub(crate) fn ws(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), preceded(char('#'), take_while(|c| c != '\n'))),
            value((), preceded(tag("//"), take_while(|c| c != '\n'))),
        ))),
    )(input)
}

/// An IRI reference `<...>`
pub(crate) fn iri_ref(input: &str) -> IResult<&str, &str> {
    let (input, _) = char('<')(input)?;
    let (input, iri) = take_while(|c: char| c != '>' && c != '<' && c != '"' && !c.is_whitespace())(input)?;
    let (input, _) = char('>')(input)?;
    Ok((input, iri))
}

/// A prefixed name `prefix:local`; the prefix may be empty
pub(crate) fn prefixed_name(input: &str) -> IResult<&str, (&str, &str)> {
    let (after_colon, prefix) = terminated(
        recognize(opt(pair(
            satisfy(|c: char| c.is_alphabetic()),
            take_while(|c: char| c.is_alphanumeric() || c == '_' || c == '-'),
        ))),
        char(':'),
    )(input)?;
    let (_, local) = take_while(|c: char| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | '%'))(after_colon)?;

    // A trailing '.' ends the statement rather than the name
    let local = local.trim_end_matches('.');
    Ok((&after_colon[local.len()..], (prefix, local)))
}

/// A quoted string in any of the four Turtle forms
pub(crate) fn string_literal(input: &str) -> IResult<&str, String> {
    alt((
        |i| long_string(i, "\"\"\""),
        |i| long_string(i, "'''"),
        |i| short_string(i, '"'),
        |i| short_string(i, '\''),
    ))(input)
}

fn long_string<'a>(input: &'a str, delim: &'static str) -> IResult<&'a str, String> {
    let (input, _) = tag(delim)(input)?;
    let (input, body) = take_until(delim)(input)?;
    let (input, _) = tag(delim)(input)?;
    Ok((input, unescape_string(body)))
}

fn short_string(input: &str, quote: char) -> IResult<&str, String> {
    let (input, _) = char(quote)(input)?;
    let (input, body) = recognize(many0(alt((
        take_while1(|c: char| c != quote && c != '\\' && c != '\n' && c != '\r'),
        recognize(pair(char('\\'), satisfy(|_| true))),
    ))))(input)?;
    let (input, _) = char(quote)(input)?;
    Ok((input, unescape_string(body)))
}

/// Unescape `\n`, `\t`, `\uXXXX` and friends
pub(crate) fn unescape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('t') => result.push('\t'),
            Some('b') => result.push('\u{8}'),
            Some('f') => result.push('\u{c}'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(marker @ ('u' | 'U')) => {
                let width = if marker == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(width).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => result.push(decoded),
                    None => {
                        result.push('\\');
                        result.push(marker);
                        result.push_str(&hex);
                    }
                }
            }
            Some(other) => {
                result.push('\\');
                result.push(other);
            }
            None => result.push('\\'),
        }
    }
    result
}

/// A variable `?name` or `$name`
pub(crate) fn variable_name(input: &str) -> IResult<&str, &str> {
    let (input, _) = alt((char('?'), char('$')))(input)?;
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// A blank node label `_:label`
pub(crate) fn blank_node_label(input: &str) -> IResult<&str, &str> {
    let (input, _) = tag("_:")(input)?;
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-')(input)
}

/// A numeric literal, typed the Turtle way
pub(crate) fn numeric_literal(input: &str) -> IResult<&str, Literal> {
    let (rest, text) = recognize(tuple((
        opt(alt((char('-'), char('+')))),
        digit1,
        opt(pair(char('.'), digit1)),
        opt(tuple((alt((char('e'), char('E'))), opt(alt((char('+'), char('-')))), digit1))),
    )))(input)?;

    let datatype = if text.contains(['e', 'E']) {
        ns::XSD_DOUBLE
    } else if text.contains('.') {
        ns::XSD_DECIMAL
    } else {
        ns::XSD_INTEGER
    };
    Ok((rest, Literal::typed(text.to_string(), datatype.to_string())))
}

/// A bare word (keywords, builtin names)
pub(crate) fn word(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

// ============================================================================
// Cursor
// ============================================================================

/// Position-tracking cursor over source text, driving the token parsers
pub(crate) struct Cursor<'a> {
    source: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Cursor { source, rest: source }
    }

    pub(crate) fn rest(&self) -> &'a str {
        self.rest
    }

    /// Skip whitespace and comments
    pub(crate) fn skip_ws(&mut self) {
        if let Ok((rest, _)) = ws(self.rest) {
            self.rest = rest;
        }
    }

    /// True once only whitespace and comments remain
    pub(crate) fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest.is_empty()
    }

    pub(crate) fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest.chars().next()
    }

    pub(crate) fn starts_with(&mut self, s: &str) -> bool {
        self.skip_ws();
        self.rest.starts_with(s)
    }

    /// Consume `c` if it is the next token
    pub(crate) fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    pub(crate) fn eat_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(s) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    pub(crate) fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{}'", c)))
        }
    }

    /// Consume a case-insensitive keyword followed by a word boundary
    pub(crate) fn eat_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let len = keyword.len();
        let matches = self.rest.len() >= len
            && self.rest.is_char_boundary(len)
            && self.rest[..len].eq_ignore_ascii_case(keyword)
            && !self.rest[len..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == ':');
        if matches {
            self.rest = &self.rest[len..];
        }
        matches
    }

    pub(crate) fn peek_keyword(&mut self, keyword: &str) -> bool {
        let saved = self.rest;
        let found = self.eat_keyword(keyword);
        self.rest = saved;
        found
    }

    /// Run a token parser at the current position
    pub(crate) fn try_token<T>(&mut self, mut parser: impl FnMut(&'a str) -> IResult<&'a str, T>) -> Option<T> {
        self.skip_ws();
        match parser(self.rest) {
            Ok((rest, value)) => {
                self.rest = rest;
                Some(value)
            }
            Err(_) => None,
        }
    }

    pub(crate) fn token<T>(
        &mut self,
        what: &str,
        parser: impl FnMut(&'a str) -> IResult<&'a str, T>,
    ) -> Result<T, ParseError> {
        self.try_token(parser).ok_or_else(|| self.unexpected(what))
    }

    /// (line, column) of the current position, both 1-based
    pub(crate) fn position(&self) -> (usize, usize) {
        let consumed = &self.source[..self.source.len() - self.rest.len()];
        let line = consumed.matches('\n').count() + 1;
        let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        (line, column)
    }

    pub(crate) fn error(&self, message: impl Into<String>) -> ParseError {
        let (line, column) = self.position();
        ParseError::Syntax { line, column, message: message.into() }
    }

    /// Error naming what was expected and what was found
    pub(crate) fn unexpected(&self, expected: &str) -> ParseError {
        if self.rest.trim().is_empty() {
            return ParseError::UnexpectedEof;
        }
        let found: String = self.rest.chars().take(20).collect();
        self.error(format!("expected {}, found '{}'", expected, found))
    }

    pub(crate) fn unsupported(&self, construct: impl Into<String>) -> ParseError {
        ParseError::Unsupported { line: self.position().0, construct: construct.into() }
    }

    /// An IRI written `<...>` or `prefix:local`
    pub(crate) fn try_iri(&mut self, prefixes: &PrefixTable) -> Result<Option<Uri>, ParseError> {
        if let Some(iri) = self.try_token(iri_ref) {
            return Ok(Some(prefixes.resolve_relative(iri)));
        }
        match self.try_token(prefixed_name) {
            Some((prefix, local)) => prefixes.resolve(prefix, local).map(Some),
            None => Ok(None),
        }
    }

    /// A quoted literal with optional `@lang` or `^^datatype`
    pub(crate) fn try_quoted_literal(&mut self, prefixes: &PrefixTable) -> Result<Option<Term>, ParseError> {
        let Some(value) = self.try_token(string_literal) else {
            return Ok(None);
        };
        if self.rest.starts_with('@') {
            let lang = self.token("language tag", |i| {
                preceded(
                    char('@'),
                    recognize(pair(
                        take_while1(|c: char| c.is_ascii_alphabetic()),
                        take_while(|c: char| c.is_ascii_alphanumeric() || c == '-'),
                    )),
                )(i)
            })?;
            return Ok(Some(Term::lang_literal(value, lang)));
        }
        if self.rest.starts_with("^^") {
            self.rest = &self.rest[2..];
            let datatype = self
                .try_iri(prefixes)?
                .ok_or_else(|| self.unexpected("datatype IRI"))?;
            return Ok(Some(Term::typed_literal(value, datatype.as_str())));
        }
        Ok(Some(Term::literal(value)))
    }
}
