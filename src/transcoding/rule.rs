//! HTTP rule model.
//!
//! A rule carries exactly one primary pattern and a flat list of additional
//! bindings. `AdditionalBinding` has no bindings of its own, so a nested
//! binding cannot be represented; the rule source is checked for it when it
//! is converted.

use crate::config::schema::HttpRuleConfig;
use crate::transcoding::error::{TranscodeError, TranscodeResult};
use crate::transcoding::template::{FieldPath, PathTemplate};

/// Verb matching any HTTP method in a custom pattern.
pub const ANY_VERB: &str = "*";

/// The HTTP method and path a rule answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Get(PathTemplate),
    Put(PathTemplate),
    Post(PathTemplate),
    Delete(PathTemplate),
    Patch(PathTemplate),
    Custom { kind: String, path: PathTemplate },
}

impl Pattern {
    /// HTTP method, or the custom kind (`*` matches any method).
    pub fn verb(&self) -> &str {
        match self {
            Pattern::Get(_) => "GET",
            Pattern::Put(_) => "PUT",
            Pattern::Post(_) => "POST",
            Pattern::Delete(_) => "DELETE",
            Pattern::Patch(_) => "PATCH",
            Pattern::Custom { kind, .. } => kind,
        }
    }

    pub fn template(&self) -> &PathTemplate {
        match self {
            Pattern::Get(t)
            | Pattern::Put(t)
            | Pattern::Post(t)
            | Pattern::Delete(t)
            | Pattern::Patch(t) => t,
            Pattern::Custom { path, .. } => path,
        }
    }
}

/// Where the request body goes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BodySpec {
    /// No body; non-path fields come from the query string.
    #[default]
    None,
    /// `*`: every non-path field comes from the body.
    Wildcard,
    /// A single top-level field is read from the body.
    Field(String),
}

/// A binding declared under `additional_bindings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdditionalBinding {
    pub pattern: Pattern,
    pub body: BodySpec,
    pub response_body: Option<String>,
}

/// A transcoding rule for one RPC method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRule {
    pub selector: String,
    pub pattern: Pattern,
    pub body: BodySpec,
    pub response_body: Option<String>,
    pub additional_bindings: Vec<AdditionalBinding>,
}

/// One (verb, template) pairing tried by the matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub verb: String,
    pub template: PathTemplate,
    pub body: BodySpec,
    pub response_body: Option<String>,
}

impl Binding {
    pub fn accepts_method(&self, method: &str) -> bool {
        self.verb == ANY_VERB || self.verb == method
    }
}

impl HttpRule {
    /// Primary binding first, then additional bindings in declared order.
    pub fn bindings(&self) -> Vec<Binding> {
        let primary = Binding {
            verb: self.pattern.verb().to_string(),
            template: self.pattern.template().clone(),
            body: self.body.clone(),
            response_body: self.response_body.clone(),
        };
        std::iter::once(primary)
            .chain(self.additional_bindings.iter().map(|b| Binding {
                verb: b.pattern.verb().to_string(),
                template: b.pattern.template().clone(),
                body: b.body.clone(),
                response_body: b.response_body.clone(),
            }))
            .collect()
    }

    /// Convert a rule from configuration, compiling every template.
    pub fn from_config(config: &HttpRuleConfig) -> TranscodeResult<Self> {
        let selector = config.selector.trim();
        if selector.is_empty() {
            return Err(TranscodeError::invalid_rule("", "selector must not be empty"));
        }

        let mut additional_bindings = Vec::with_capacity(config.additional_bindings.len());
        for nested in &config.additional_bindings {
            if !nested.additional_bindings.is_empty() {
                return Err(TranscodeError::invalid_rule(
                    selector,
                    "additional bindings must not declare additional bindings",
                ));
            }
            if !nested.selector.is_empty() && nested.selector != selector {
                return Err(TranscodeError::invalid_rule(
                    selector,
                    format!("additional binding names a different selector `{}`", nested.selector),
                ));
            }
            additional_bindings.push(AdditionalBinding {
                pattern: parse_pattern(selector, nested)?,
                body: parse_body(selector, nested.body.as_deref())?,
                response_body: parse_response_body(selector, nested.response_body.as_deref())?,
            });
        }

        Ok(Self {
            selector: selector.to_string(),
            pattern: parse_pattern(selector, config)?,
            body: parse_body(selector, config.body.as_deref())?,
            response_body: parse_response_body(selector, config.response_body.as_deref())?,
            additional_bindings,
        })
    }
}

fn parse_pattern(selector: &str, config: &HttpRuleConfig) -> TranscodeResult<Pattern> {
    let mut patterns = Vec::new();
    let simple: [(&Option<String>, fn(PathTemplate) -> Pattern); 5] = [
        (&config.get, Pattern::Get),
        (&config.put, Pattern::Put),
        (&config.post, Pattern::Post),
        (&config.delete, Pattern::Delete),
        (&config.patch, Pattern::Patch),
    ];
    for (template, build) in simple {
        if let Some(template) = template {
            patterns.push(build(PathTemplate::parse(template)?));
        }
    }
    if let Some(custom) = &config.custom {
        if custom.kind.is_empty() {
            return Err(TranscodeError::invalid_rule(selector, "custom pattern needs a kind"));
        }
        patterns.push(Pattern::Custom {
            kind: custom.kind.clone(),
            path: PathTemplate::parse(&custom.path)?,
        });
    }

    match patterns.len() {
        1 => Ok(patterns.remove(0)),
        0 => Err(TranscodeError::invalid_rule(selector, "no pattern set")),
        _ => Err(TranscodeError::invalid_rule(selector, "more than one pattern set")),
    }
}

fn parse_body(selector: &str, body: Option<&str>) -> TranscodeResult<BodySpec> {
    match body {
        None | Some("") => Ok(BodySpec::None),
        Some("*") => Ok(BodySpec::Wildcard),
        Some(field) => top_level_field(selector, "body", field).map(BodySpec::Field),
    }
}

fn parse_response_body(selector: &str, field: Option<&str>) -> TranscodeResult<Option<String>> {
    match field {
        None | Some("") => Ok(None),
        Some(field) => top_level_field(selector, "response_body", field).map(Some),
    }
}

fn top_level_field(selector: &str, what: &str, field: &str) -> TranscodeResult<String> {
    match FieldPath::parse(field) {
        Some(path) if path.len() == 1 => Ok(field.to_string()),
        _ => Err(TranscodeError::invalid_rule(
            selector,
            format!("{} must name a top-level field, got `{}`", what, field),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::CustomPatternConfig;

    fn rule(selector: &str) -> HttpRuleConfig {
        HttpRuleConfig {
            selector: selector.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_bindings_in_declared_order() {
        let mut config = rule("example.v1.Messaging.GetMessage");
        config.get = Some("/v1/messages/{message_id}".into());
        config.additional_bindings = vec![HttpRuleConfig {
            get: Some("/v1/users/{user_id}/messages/{message_id}".into()),
            ..Default::default()
        }];

        let rule = HttpRule::from_config(&config).unwrap();
        let bindings = rule.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].template.to_string(), "/v1/messages/{message_id}");
        assert_eq!(
            bindings[1].template.to_string(),
            "/v1/users/{user_id}/messages/{message_id}"
        );
        assert!(bindings.iter().all(|b| b.verb == "GET"));
    }

    #[test]
    fn test_custom_pattern() {
        let mut config = rule("example.v1.Web.Serve");
        config.custom = Some(CustomPatternConfig {
            kind: "*".into(),
            path: "/static/**".into(),
        });
        let rule = HttpRule::from_config(&config).unwrap();
        let binding = &rule.bindings()[0];
        assert!(binding.accepts_method("HEAD"));
        assert!(binding.accepts_method("OPTIONS"));
    }

    #[test]
    fn test_body_spec() {
        let mut config = rule("s");
        config.post = Some("/v1/x".into());
        config.body = Some("*".into());
        assert_eq!(HttpRule::from_config(&config).unwrap().body, BodySpec::Wildcard);

        config.body = Some("message".into());
        assert_eq!(
            HttpRule::from_config(&config).unwrap().body,
            BodySpec::Field("message".into())
        );

        config.body = Some("message.text".into());
        assert!(matches!(
            HttpRule::from_config(&config),
            Err(TranscodeError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_pattern_must_be_unique() {
        let mut config = rule("s");
        assert!(matches!(
            HttpRule::from_config(&config),
            Err(TranscodeError::InvalidRule { .. })
        ));
        config.get = Some("/a".into());
        config.post = Some("/b".into());
        assert!(matches!(
            HttpRule::from_config(&config),
            Err(TranscodeError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_nested_additional_bindings_rejected() {
        let mut config = rule("s");
        config.get = Some("/a".into());
        config.additional_bindings = vec![HttpRuleConfig {
            get: Some("/b".into()),
            additional_bindings: vec![HttpRuleConfig {
                get: Some("/c".into()),
                ..Default::default()
            }],
            ..Default::default()
        }];
        let err = HttpRule::from_config(&config).unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidRule { .. }));
    }

    #[test]
    fn test_template_errors_surface() {
        let mut config = rule("s");
        config.get = Some("/v1/{a={b}}".into());
        assert!(matches!(
            HttpRule::from_config(&config),
            Err(TranscodeError::NestedVariable { .. })
        ));
    }
}
