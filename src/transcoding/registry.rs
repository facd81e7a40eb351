//! Rule registry.
//!
//! # Data Flow
//! ```text
//! HttpConfig.rules
//!     → HttpRule::from_config (pattern, body, templates)
//!     → validate every binding against the method's message schemas
//!     → RuleRegistry (immutable, indexed by selector)
//! ```
//!
//! # Design Decisions
//! - Duplicate selectors: the last rule wins and takes the earlier slot
//! - Path variables and body fields are resolved once here, never per request
//! - Any invalid rule fails the whole build

use std::collections::HashMap;

use crate::config::schema::HttpConfig;
use crate::transcoding::error::{TranscodeError, TranscodeResult};
use crate::transcoding::matcher::{match_bindings, MatchOptions, VariableBinding};
use crate::transcoding::rule::{Binding, BodySpec, HttpRule};
use crate::transcoding::schema::{DescriptorPool, FieldHandle, MethodDescriptor};
use crate::transcoding::template::FieldPath;

/// Schema handles a binding needs at request time.
#[derive(Debug, Clone)]
pub struct BindingFields {
    /// One handle per template variable, in template order.
    pub variables: Vec<FieldHandle>,
    /// The named body field, if the body is a single field.
    pub body: Option<FieldHandle>,
    /// The projected response field.
    pub response: Option<FieldHandle>,
}

/// A validated rule with its bindings.
#[derive(Debug, Clone)]
pub struct RegisteredRule {
    rule: HttpRule,
    method: MethodDescriptor,
    bindings: Vec<Binding>,
    fields: Vec<BindingFields>,
}

impl RegisteredRule {
    fn compile(rule: HttpRule, pool: &DescriptorPool) -> TranscodeResult<Self> {
        let method = pool.method(&rule.selector)?.clone();
        let mut bindings = rule.bindings();
        let mut fields = Vec::with_capacity(bindings.len());
        for binding in &mut bindings {
            let compiled = compile_binding(&rule.selector, binding, &method, pool)?;
            // Field names may be written in JSON form; keep the proto name.
            if let Some(handle) = &compiled.body {
                binding.body = BodySpec::Field(handle.path().head().to_string());
            }
            if let Some(handle) = &compiled.response {
                binding.response_body = Some(handle.path().head().to_string());
            }
            fields.push(compiled);
        }
        Ok(Self {
            rule,
            method,
            bindings,
            fields,
        })
    }

    pub fn selector(&self) -> &str {
        &self.rule.selector
    }

    pub fn rule(&self) -> &HttpRule {
        &self.rule
    }

    pub fn method(&self) -> &MethodDescriptor {
        &self.method
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding_fields(&self, index: usize) -> Option<&BindingFields> {
        self.fields.get(index)
    }
}

fn compile_binding(
    selector: &str,
    binding: &Binding,
    method: &MethodDescriptor,
    pool: &DescriptorPool,
) -> TranscodeResult<BindingFields> {
    let mut variables = Vec::new();
    for variable in binding.template.variables() {
        let handle = pool.resolve(&method.input_type, &variable.field_path)?;
        handle.check_path_bindable()?;
        variables.push(handle);
    }

    let body = match &binding.body {
        BodySpec::Field(name) => {
            let path = FieldPath::from_segments(vec![name.clone()]);
            let handle = pool.resolve(&method.input_type, &path)?;
            if let Some(overlap) = variables.iter().find(|v| v.path().starts_with(handle.path())) {
                return Err(TranscodeError::invalid_rule(
                    selector,
                    format!(
                        "field `{}` is bound by both the path and the body",
                        overlap.path()
                    ),
                ));
            }
            Some(handle)
        }
        BodySpec::None | BodySpec::Wildcard => None,
    };

    let response = match &binding.response_body {
        Some(name) => {
            let path = FieldPath::from_segments(vec![name.clone()]);
            Some(pool.resolve(&method.output_type, &path)?)
        }
        None => None,
    };

    Ok(BindingFields {
        variables,
        body,
        response,
    })
}

/// A matched request: the rule, which binding, and the captures.
#[derive(Debug, Clone)]
pub struct RouteMatch<'r> {
    pub rule: &'r RegisteredRule,
    pub binding_index: usize,
    pub variables: VariableBinding,
}

impl<'r> RouteMatch<'r> {
    pub fn selector(&self) -> &'r str {
        self.rule.selector()
    }

    pub fn binding(&self) -> &'r Binding {
        &self.rule.bindings[self.binding_index]
    }

    pub fn fields(&self) -> &'r BindingFields {
        &self.rule.fields[self.binding_index]
    }
}

/// All validated rules, in registration order.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: Vec<RegisteredRule>,
    by_selector: HashMap<String, usize>,
    options: MatchOptions,
}

impl RuleRegistry {
    /// Build from the HTTP configuration section.
    pub fn build(config: &HttpConfig, pool: &DescriptorPool) -> TranscodeResult<Self> {
        let rules = config
            .rules
            .iter()
            .map(HttpRule::from_config)
            .collect::<TranscodeResult<Vec<_>>>()?;
        let options = MatchOptions {
            fully_decode_reserved_expansion: config.fully_decode_reserved_expansion,
        };
        Self::from_rules(rules, pool, options)
    }

    /// Build from already converted rules.
    pub fn from_rules(
        rules: Vec<HttpRule>,
        pool: &DescriptorPool,
        options: MatchOptions,
    ) -> TranscodeResult<Self> {
        let mut registry = Self {
            rules: Vec::with_capacity(rules.len()),
            by_selector: HashMap::with_capacity(rules.len()),
            options,
        };

        for rule in rules {
            let compiled = RegisteredRule::compile(rule, pool)?;
            match registry.by_selector.get(compiled.selector()) {
                Some(&slot) => {
                    tracing::warn!(
                        selector = %compiled.selector(),
                        "Duplicate http rule, later definition replaces earlier one"
                    );
                    registry.rules[slot] = compiled;
                }
                None => {
                    registry
                        .by_selector
                        .insert(compiled.selector().to_string(), registry.rules.len());
                    registry.rules.push(compiled);
                }
            }
        }

        Ok(registry)
    }

    pub fn get(&self, selector: &str) -> Option<&RegisteredRule> {
        self.by_selector.get(selector).map(|&i| &self.rules[i])
    }

    pub fn rules(&self) -> &[RegisteredRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn options(&self) -> MatchOptions {
        self.options
    }

    /// First binding, across rules in registration order, matching the request.
    pub fn route(&self, method: &str, path: &str) -> TranscodeResult<RouteMatch<'_>> {
        for rule in &self.rules {
            if let Some(found) = match_bindings(&rule.bindings, method, path, self.options)? {
                return Ok(RouteMatch {
                    rule,
                    binding_index: found.index,
                    variables: found.variables,
                });
            }
        }
        Err(TranscodeError::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })
    }
}
