//! Path matching against compiled bindings.
//!
//! # Responsibilities
//! - Check the HTTP method against each binding's verb
//! - Walk template segments over the raw `/`-separated path
//! - Capture and decode variable values
//!
//! # Design Decisions
//! - Bindings are tried in declared order; the first full match wins
//! - Literals compare against the still-encoded path segment
//! - Captures are decoded only once the whole path has matched

use crate::transcoding::error::TranscodeResult;
use crate::transcoding::percent::{decode_segment_with, DecodeMode};
use crate::transcoding::rule::Binding;
use crate::transcoding::template::{FieldPath, PathTemplate, Segment, Variable};

/// Matcher switches taken from the HTTP configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Decode `%2F` in multi-segment captures that span several segments.
    pub fully_decode_reserved_expansion: bool,
}

/// A decoded variable value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub field_path: FieldPath,
    pub value: String,
}

/// Captures of one successful match, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableBinding {
    captures: Vec<Capture>,
}

impl VariableBinding {
    /// Value captured for a dotted field path.
    pub fn get(&self, field_path: &str) -> Option<&str> {
        self.captures
            .iter()
            .find(|c| c.field_path.to_string() == field_path)
            .map(|c| c.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Capture> {
        self.captures.iter()
    }

    pub fn len(&self) -> usize {
        self.captures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.captures.is_empty()
    }
}

/// The binding that matched and what it captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingMatch<'a> {
    pub index: usize,
    pub binding: &'a Binding,
    pub variables: VariableBinding,
}

/// Try `bindings` in order and return the first that consumes `path`.
pub fn match_bindings<'a>(
    bindings: &'a [Binding],
    method: &str,
    path: &str,
    options: MatchOptions,
) -> TranscodeResult<Option<BindingMatch<'a>>> {
    for (index, binding) in bindings.iter().enumerate() {
        if !binding.accepts_method(method) {
            continue;
        }
        if let Some(variables) = match_template(&binding.template, path, options)? {
            return Ok(Some(BindingMatch {
                index,
                binding,
                variables,
            }));
        }
    }
    Ok(None)
}

/// Match one template against a raw request path.
pub fn match_template(
    template: &PathTemplate,
    path: &str,
    options: MatchOptions,
) -> TranscodeResult<Option<VariableBinding>> {
    let Some(mut segments) = split_path(path) else {
        return Ok(None);
    };

    if let Some(verb) = template.verb() {
        let suffix = format!(":{}", verb);
        let Some(last) = segments.last_mut() else {
            return Ok(None);
        };
        let current: &str = *last;
        match current.strip_suffix(suffix.as_str()) {
            Some(stripped) => *last = stripped,
            None => return Ok(None),
        }
    }

    let mut pos = 0;
    let mut raw = Vec::new();
    if !walk(template.segments(), &segments, &mut pos, &mut raw) || pos != segments.len() {
        return Ok(None);
    }

    let mut captures = Vec::with_capacity(raw.len());
    for (variable, start, end) in raw {
        let mode = decode_mode(variable, end - start, options);
        let value = decode_segment_with(&segments[start..end].join("/"), mode)?;
        captures.push(Capture {
            field_path: variable.field_path.clone(),
            value,
        });
    }
    Ok(Some(VariableBinding { captures }))
}

/// Split after the leading `/`. The root path has no segments.
fn split_path(path: &str) -> Option<Vec<&str>> {
    let rest = path.strip_prefix('/')?;
    if rest.is_empty() {
        return Some(Vec::new());
    }
    Some(rest.split('/').collect())
}

fn walk<'t>(
    template: &'t [Segment],
    path: &[&str],
    pos: &mut usize,
    raw: &mut Vec<(&'t Variable, usize, usize)>,
) -> bool {
    for segment in template {
        match segment {
            Segment::Literal(text) => {
                if path.get(*pos) != Some(&text.as_str()) {
                    return false;
                }
                *pos += 1;
            }
            Segment::SingleWildcard => {
                if *pos >= path.len() {
                    return false;
                }
                *pos += 1;
            }
            Segment::DoubleWildcard => *pos = path.len(),
            Segment::Variable(variable) => {
                let start = *pos;
                if !walk(&variable.segments, path, pos, raw) {
                    return false;
                }
                raw.push((variable, start, *pos));
            }
        }
    }
    true
}

fn decode_mode(variable: &Variable, consumed: usize, options: MatchOptions) -> DecodeMode {
    if !variable.is_multi_segment() {
        DecodeMode::Full
    } else if options.fully_decode_reserved_expansion && consumed > 1 {
        DecodeMode::Full
    } else {
        DecodeMode::KeepEncodedSlash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoding::rule::{BodySpec, ANY_VERB};

    fn binding(verb: &str, template: &str) -> Binding {
        Binding {
            verb: verb.into(),
            template: PathTemplate::parse(template).unwrap(),
            body: BodySpec::None,
            response_body: None,
        }
    }

    fn capture(template: &str, path: &str) -> Option<VariableBinding> {
        let t = PathTemplate::parse(template).unwrap();
        match_template(&t, path, MatchOptions::default()).unwrap()
    }

    #[test]
    fn test_variable_with_subtemplate() {
        let vars = capture("/v1/{name=messages/*}", "/v1/messages/123456").unwrap();
        assert_eq!(vars.get("name"), Some("messages/123456"));
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_literal_mismatch_and_length() {
        assert!(capture("/v1/messages/{id}", "/v1/users/1").is_none());
        assert!(capture("/v1/messages/{id}", "/v1/messages").is_none());
        assert!(capture("/v1/messages/{id}", "/v1/messages/1/extra").is_none());
        assert!(capture("/v1/messages/{id}", "v1/messages/1").is_none());
    }

    #[test]
    fn test_segment_count_equals_path_length_without_double_wildcard() {
        let template = PathTemplate::parse("/v1/*/{a}/{b=x/*}").unwrap();
        for path in ["/v1/p/q/x/r", "/v1/p/q/x", "/v1/p/q/x/r/s", "/v1"] {
            let matched = match_template(&template, path, MatchOptions::default()).unwrap();
            let segments = path.trim_start_matches('/').split('/').count();
            assert_eq!(matched.is_some(), segments == template.segment_count(), "{path}");
        }
    }

    #[test]
    fn test_double_wildcard_takes_the_rest() {
        let vars = capture("/v1/{name=shelves/**}", "/v1/shelves/1/books/2").unwrap();
        assert_eq!(vars.get("name"), Some("shelves/1/books/2"));

        let vars = capture("/files/{path=**}", "/files").unwrap();
        assert_eq!(vars.get("path"), Some(""));

        assert!(capture("/static/**", "/static/css/site.css").is_some());
    }

    #[test]
    fn test_verb_suffix() {
        let vars = capture("/v1/{name=operations/**}:cancel", "/v1/operations/a/b:cancel").unwrap();
        assert_eq!(vars.get("name"), Some("operations/a/b"));
        assert!(capture("/v1/{name}:cancel", "/v1/op").is_none());
        assert!(capture("/v1/{name}:cancel", "/v1/op:delete").is_none());
    }

    #[test]
    fn test_literal_compared_encoded() {
        assert!(capture("/v1/a%20b", "/v1/a%20b").is_some());
        assert!(capture("/v1/a%20b", "/v1/a b").is_none());
    }

    #[test]
    fn test_capture_decoding_by_variable_kind() {
        let single = capture("/v1/{id}", "/v1/a%2Fb%20c").unwrap();
        assert_eq!(single.get("id"), Some("a/b c"));

        let multi = capture("/v1/{name=**}", "/v1/a%2Fb/c%20d").unwrap();
        assert_eq!(multi.get("name"), Some("a%2Fb/c d"));
    }

    #[test]
    fn test_fully_decode_reserved_expansion() {
        let template = PathTemplate::parse("/v1/{name=**}").unwrap();
        let options = MatchOptions {
            fully_decode_reserved_expansion: true,
        };
        let spanning = match_template(&template, "/v1/a%2Fb/c", options).unwrap().unwrap();
        assert_eq!(spanning.get("name"), Some("a/b/c"));

        let one_segment = match_template(&template, "/v1/a%2Fb", options).unwrap().unwrap();
        assert_eq!(one_segment.get("name"), Some("a%2Fb"));
    }

    #[test]
    fn test_root_template() {
        assert!(capture("/", "/").is_some());
        assert!(capture("/", "/x").is_none());
    }

    #[test]
    fn test_method_filter() {
        let bindings = vec![binding("POST", "/v1/x"), binding("GET", "/v1/x")];
        let matched = match_bindings(&bindings, "GET", "/v1/x", MatchOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(matched.index, 1);

        let any = vec![binding(ANY_VERB, "/v1/x")];
        assert!(match_bindings(&any, "HEAD", "/v1/x", MatchOptions::default())
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_first_match_wins() {
        let wildcard = binding("GET", "/v1/{name=**}");
        let specific = binding("GET", "/v1/messages/{message_id}");
        let path = "/v1/messages/123456";

        let forward = [wildcard.clone(), specific.clone()];
        let matched = match_bindings(&forward, "GET", path, MatchOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(matched.index, 0);
        assert_eq!(matched.variables.get("name"), Some("messages/123456"));

        let reversed = [specific, wildcard];
        let matched = match_bindings(&reversed, "GET", path, MatchOptions::default())
            .unwrap()
            .unwrap();
        assert_eq!(matched.index, 0);
        assert_eq!(matched.variables.get("message_id"), Some("123456"));
    }

    #[test]
    fn test_non_matching_binding_is_skipped() {
        let primary = binding("GET", "/v1/messages/{message_id}");
        let extra = binding("GET", "/v1/users/{user_id}/messages/{message_id}");
        let path = "/v1/users/me/messages/123456";

        for bindings in [[primary.clone(), extra.clone()], [extra.clone(), primary.clone()]] {
            let matched = match_bindings(&bindings, "GET", path, MatchOptions::default())
                .unwrap()
                .unwrap();
            assert_eq!(matched.binding, &extra);
            assert_eq!(matched.variables.get("user_id"), Some("me"));
            assert_eq!(matched.variables.get("message_id"), Some("123456"));
        }
    }

    #[test]
    fn test_invalid_utf8_capture() {
        let template = PathTemplate::parse("/v1/{id}").unwrap();
        assert!(match_template(&template, "/v1/%FF", MatchOptions::default()).is_err());
    }
}
