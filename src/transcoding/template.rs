//! Path template compilation.
//!
//! # Grammar
//! ```text
//! Template  = "/" Segments [ Verb ] ;
//! Segments  = Segment { "/" Segment } ;
//! Segment   = "*" | "**" | LITERAL | Variable ;
//! Variable  = "{" FieldPath [ "=" Segments ] "}" ;
//! FieldPath = IDENT { "." IDENT } ;
//! Verb      = ":" LITERAL ;
//! ```
//!
//! # Design Decisions
//! - `{var}` is expanded to `{var=*}` while parsing
//! - Literals are kept exactly as written; they are matched against the
//!   still-encoded request path
//! - The bare template `/` is accepted and matches only the root path

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::transcoding::error::{TranscodeError, TranscodeResult};

/// A dotted path of field names, e.g. `sub.subfield`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Parse a dotted field path. Every component must be an identifier.
    pub fn parse(path: &str) -> Option<Self> {
        let parts: Vec<String> = path.split('.').map(str::to_string).collect();
        if parts.iter().all(|p| is_ident(p)) {
            Some(Self(parts))
        } else {
            None
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First component of the path.
    pub fn head(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or_default()
    }

    /// True if `prefix` equals this path or is an ancestor of it.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One node of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    SingleWildcard,
    DoubleWildcard,
    Variable(Variable),
}

/// A named capture and the subtemplate it must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub field_path: FieldPath,
    pub segments: Vec<Segment>,
}

impl Variable {
    /// Whether the variable may span several path segments.
    pub fn is_multi_segment(&self) -> bool {
        self.segments.len() > 1
            || self
                .segments
                .iter()
                .any(|s| matches!(s, Segment::DoubleWildcard))
    }
}

/// A compiled path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    segments: Vec<Segment>,
    verb: Option<String>,
}

impl PathTemplate {
    /// Compile a template string.
    pub fn parse(template: &str) -> TranscodeResult<Self> {
        if template == "/" {
            return Ok(Self {
                segments: Vec::new(),
                verb: None,
            });
        }
        if !template.starts_with('/') {
            return Err(TranscodeError::malformed(template, 0, "template must start with `/`"));
        }

        let mut parser = Parser {
            template,
            bytes: template.as_bytes(),
            pos: 1,
        };
        let segments = parser.parse_segments(false)?;
        let verb = if parser.peek() == Some(b':') {
            parser.pos += 1;
            Some(parser.parse_literal()?)
        } else {
            None
        };
        if let Some(c) = parser.peek() {
            return Err(TranscodeError::malformed(
                template,
                parser.pos,
                format!("unexpected character `{}`", c as char),
            ));
        }

        let compiled = Self { segments, verb };
        compiled.check_double_wildcard(template)?;
        compiled.check_unique_variables(template)?;
        Ok(compiled)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }

    /// Variables in declaration order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Variable(v) => Some(v),
            _ => None,
        })
    }

    pub fn has_double_wildcard(&self) -> bool {
        self.flattened().any(|s| matches!(s, Segment::DoubleWildcard))
    }

    /// Number of path segments the template consumes, counting `**` as one.
    pub fn segment_count(&self) -> usize {
        self.flattened().count()
    }

    /// Path-producing segments with variables expanded in place.
    fn flattened(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().flat_map(|s| match s {
            Segment::Variable(v) => v.segments.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
    }

    fn check_double_wildcard(&self, template: &str) -> TranscodeResult<()> {
        let flat: Vec<&Segment> = self.flattened().collect();
        let positions: Vec<usize> = flat
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Segment::DoubleWildcard))
            .map(|(i, _)| i)
            .collect();
        match positions.as_slice() {
            [] => Ok(()),
            [i] if *i + 1 == flat.len() => Ok(()),
            _ => Err(TranscodeError::MisplacedDoubleWildcard {
                template: template.to_string(),
            }),
        }
    }

    fn check_unique_variables(&self, template: &str) -> TranscodeResult<()> {
        let mut seen = HashSet::new();
        for var in self.variables() {
            if !seen.insert(&var.field_path) {
                return Err(TranscodeError::malformed(
                    template,
                    0,
                    format!("field `{}` is captured more than once", var.field_path),
                ));
            }
        }
        Ok(())
    }
}

impl FromStr for PathTemplate {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            f.write_str("/")?;
        }
        for segment in &self.segments {
            f.write_str("/")?;
            write_segment(f, segment)?;
        }
        if let Some(verb) = &self.verb {
            write!(f, ":{}", verb)?;
        }
        Ok(())
    }
}

fn write_segment(f: &mut fmt::Formatter<'_>, segment: &Segment) -> fmt::Result {
    match segment {
        Segment::Literal(text) => f.write_str(text),
        Segment::SingleWildcard => f.write_str("*"),
        Segment::DoubleWildcard => f.write_str("**"),
        Segment::Variable(var) => {
            write!(f, "{{{}", var.field_path)?;
            if var.segments != [Segment::SingleWildcard] {
                f.write_str("=")?;
                for (i, sub) in var.segments.iter().enumerate() {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    write_segment(f, sub)?;
                }
            }
            f.write_str("}")
        }
    }
}

struct Parser<'a> {
    template: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, reason: impl Into<String>) -> TranscodeError {
        TranscodeError::malformed(self.template, self.pos, reason)
    }

    fn parse_segments(&mut self, in_variable: bool) -> TranscodeResult<Vec<Segment>> {
        let mut segments = vec![self.parse_segment(in_variable)?];
        while self.peek() == Some(b'/') {
            self.pos += 1;
            segments.push(self.parse_segment(in_variable)?);
        }
        Ok(segments)
    }

    fn parse_segment(&mut self, in_variable: bool) -> TranscodeResult<Segment> {
        match self.peek() {
            Some(b'*') => {
                let segment = if self.bytes.get(self.pos + 1) == Some(&b'*') {
                    self.pos += 2;
                    Segment::DoubleWildcard
                } else {
                    self.pos += 1;
                    Segment::SingleWildcard
                };
                match self.peek() {
                    None | Some(b'/') | Some(b':') | Some(b'}') => Ok(segment),
                    Some(_) => Err(self.error("wildcard must span a whole segment")),
                }
            }
            Some(b'{') if in_variable => Err(TranscodeError::NestedVariable {
                template: self.template.to_string(),
                position: self.pos,
            }),
            Some(b'{') => self.parse_variable(),
            None | Some(b'/') | Some(b'}') | Some(b':') => Err(self.error("empty segment")),
            Some(_) => Ok(Segment::Literal(self.parse_literal()?)),
        }
    }

    fn parse_variable(&mut self) -> TranscodeResult<Segment> {
        self.pos += 1;
        let field_path = self.parse_field_path()?;
        let segments = if self.peek() == Some(b'=') {
            self.pos += 1;
            self.parse_segments(true)?
        } else {
            vec![Segment::SingleWildcard]
        };
        if self.peek() != Some(b'}') {
            return Err(self.error("unterminated variable"));
        }
        self.pos += 1;
        Ok(Segment::Variable(Variable {
            field_path,
            segments,
        }))
    }

    fn parse_field_path(&mut self) -> TranscodeResult<FieldPath> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        FieldPath::parse(&self.template[start..self.pos])
            .ok_or_else(|| TranscodeError::malformed(self.template, start, "invalid field path"))
    }

    fn parse_literal(&mut self) -> TranscodeResult<String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, b'/' | b'{' | b'}' | b'*' | b':') {
                break;
            }
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("empty literal"));
        }
        Ok(self.template[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(path: &str, segments: Vec<Segment>) -> Segment {
        Segment::Variable(Variable {
            field_path: FieldPath::parse(path).unwrap(),
            segments,
        })
    }

    #[test]
    fn test_parse_variable_with_subtemplate() {
        let t = PathTemplate::parse("/v1/{name=messages/*}").unwrap();
        assert_eq!(
            t.segments(),
            &[
                Segment::Literal("v1".into()),
                var(
                    "name",
                    vec![Segment::Literal("messages".into()), Segment::SingleWildcard]
                ),
            ]
        );
        assert_eq!(t.verb(), None);
        assert_eq!(t.segment_count(), 3);
    }

    #[test]
    fn test_bare_variable_expands_to_single_wildcard() {
        let short = PathTemplate::parse("/v1/messages/{message_id}").unwrap();
        let long = PathTemplate::parse("/v1/messages/{message_id=*}").unwrap();
        assert_eq!(short, long);
        assert_eq!(short.to_string(), "/v1/messages/{message_id}");
    }

    #[test]
    fn test_verb_and_double_wildcard() {
        let t = PathTemplate::parse("/v1/{name=shelves/**}:undelete").unwrap();
        assert_eq!(t.verb(), Some("undelete"));
        assert!(t.has_double_wildcard());
        assert!(t.variables().next().unwrap().is_multi_segment());
        assert_eq!(t.to_string(), "/v1/{name=shelves/**}:undelete");
    }

    #[test]
    fn test_nested_field_path() {
        let t = PathTemplate::parse("/v1/messages/{message_id}/{sub.subfield}").unwrap();
        let paths: Vec<String> = t.variables().map(|v| v.field_path.to_string()).collect();
        assert_eq!(paths, vec!["message_id", "sub.subfield"]);
    }

    #[test]
    fn test_root_template() {
        let t = PathTemplate::parse("/").unwrap();
        assert!(t.segments().is_empty());
        assert_eq!(t.to_string(), "/");
    }

    #[test]
    fn test_literal_kept_encoded() {
        let t = PathTemplate::parse("/v1/a%20b").unwrap();
        assert_eq!(t.segments()[1], Segment::Literal("a%20b".into()));
    }

    #[test]
    fn test_nested_variable_rejected() {
        let err = PathTemplate::parse("/v1/{name=shelves/{shelf}}").unwrap_err();
        assert!(matches!(err, TranscodeError::NestedVariable { .. }));
    }

    #[test]
    fn test_misplaced_double_wildcard() {
        for template in ["/v1/**/foo", "/**/**", "/v1/{name=**}/x", "/{a=**}/{b}"] {
            let err = PathTemplate::parse(template).unwrap_err();
            assert!(
                matches!(err, TranscodeError::MisplacedDoubleWildcard { .. }),
                "{template}: {err:?}"
            );
        }
        assert!(PathTemplate::parse("/v1/**:verb").is_ok());
    }

    #[test]
    fn test_malformed_templates() {
        for template in [
            "v1/foo",
            "",
            "/v1//foo",
            "/v1/",
            "/v1/{}",
            "/v1/{1abc}",
            "/v1/{name",
            "/v1/{name=}",
            "/v1/a*",
            "/v1/foo:",
            "/v1/foo:bar/baz",
            "/v1/{a}/{a}",
        ] {
            let err = PathTemplate::parse(template).unwrap_err();
            assert!(
                matches!(err, TranscodeError::MalformedTemplate { .. }),
                "{template}: {err:?}"
            );
        }
    }

    #[test]
    fn test_field_path_prefix() {
        let sub = FieldPath::parse("sub").unwrap();
        let leaf = FieldPath::parse("sub.subfield").unwrap();
        assert!(leaf.starts_with(&sub));
        assert!(!sub.starts_with(&leaf));
        assert_eq!(leaf.head(), "sub");
        assert!(FieldPath::parse("a..b").is_none());
    }
}
