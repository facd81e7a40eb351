//! Request assembly.
//!
//! # Responsibilities
//! - Partition request fields into path, body and query bound
//! - Coerce captured strings into the declared scalar types
//! - Merge path captures, body and query parameters into one message
//!
//! # Design Decisions
//! - The assembled message is the proto3 JSON form of the request; turning it
//!   into wire bytes is the invoker's concern
//! - Path captures are written after the body, so they win on overlap
//! - Unknown query keys are ignored, unmappable known keys are rejected

use serde_json::{Map, Number, Value};
use url::form_urlencoded;

use crate::transcoding::error::{TranscodeError, TranscodeResult};
use crate::transcoding::registry::RouteMatch;
use crate::transcoding::rule::{Binding, BodySpec};
use crate::transcoding::schema::{Cardinality, DescriptorPool, FieldHandle, LeafType, ScalarType};
use crate::transcoding::template::FieldPath;

/// A request ready for the RPC layer.
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub selector: String,
    pub input_type: String,
    pub message: Value,
}

/// Where each leaf field of a request message comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldClassification {
    pub path_bound: Vec<FieldPath>,
    pub body_bound: Vec<FieldPath>,
    pub query_bound: Vec<FieldPath>,
    /// Leaves no source can fill: repeated messages and maps outside the
    /// body, and recursive message cycles.
    pub unbound: Vec<FieldPath>,
}

impl FieldClassification {
    /// Classify the leaf fields of `input_type` for one binding.
    pub fn classify(
        binding: &Binding,
        input_type: &str,
        pool: &DescriptorPool,
    ) -> TranscodeResult<Self> {
        let path_vars = binding
            .template
            .variables()
            .map(|v| pool.resolve(input_type, &v.field_path).map(|h| h.path().clone()))
            .collect::<TranscodeResult<Vec<_>>>()?;

        let body_head = match &binding.body {
            BodySpec::Field(name) => {
                let path = FieldPath::from_segments(vec![name.clone()]);
                Some(pool.resolve(input_type, &path)?.path().head().to_string())
            }
            _ => None,
        };

        let mut classification = Self::default();
        for (path, field) in pool.leaf_fields(input_type)? {
            if path_vars.contains(&path) {
                classification.path_bound.push(path);
                continue;
            }
            match &binding.body {
                BodySpec::Wildcard => classification.body_bound.push(path),
                BodySpec::Field(_) if body_head.as_deref() == Some(path.head()) => {
                    classification.body_bound.push(path)
                }
                _ => {
                    let queryable = match field.cardinality {
                        Cardinality::Map => false,
                        _ => field.leaf_type().is_some(),
                    };
                    if queryable {
                        classification.query_bound.push(path);
                    } else {
                        classification.unbound.push(path);
                    }
                }
            }
        }
        Ok(classification)
    }
}

/// Builds request messages for matched routes.
#[derive(Debug, Clone, Copy)]
pub struct RequestAssembler<'p> {
    pool: &'p DescriptorPool,
}

impl<'p> RequestAssembler<'p> {
    pub fn new(pool: &'p DescriptorPool) -> Self {
        Self { pool }
    }

    /// Assemble the request message for a match.
    pub fn assemble(
        &self,
        route: &RouteMatch<'_>,
        raw_query: Option<&str>,
        raw_body: &[u8],
    ) -> TranscodeResult<StructuredRequest> {
        let input_type = &route.rule.method().input_type;
        let binding = route.binding();
        let fields = route.fields();
        let mut message = Map::new();

        match &binding.body {
            BodySpec::Wildcard => self.merge_body(input_type, raw_body, &mut message)?,
            BodySpec::Field(_) => {
                if let Some(handle) = &fields.body {
                    if let Some(value) = parse_body(raw_body)? {
                        check_body_shape(handle, &value)?;
                        let leaf = handle.leaf();
                        let value = match leaf.message_type() {
                            Some(nested) => self.canonical_value(nested, leaf.cardinality, value),
                            None => value,
                        };
                        set_field(&mut message, handle.path(), value, false);
                    }
                }
            }
            BodySpec::None => {
                if !raw_body.is_empty() {
                    tracing::debug!(selector = %route.selector(), "Ignoring request body, rule declares none");
                }
            }
        }

        for (capture, handle) in route.variables.iter().zip(&fields.variables) {
            let value = coerce(&capture.value, handle)?;
            set_field(&mut message, handle.path(), value, false);
        }

        if binding.body != BodySpec::Wildcard {
            if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
                self.apply_query(route, query, &mut message)?;
            }
        }

        Ok(StructuredRequest {
            selector: route.selector().to_string(),
            input_type: input_type.clone(),
            message: Value::Object(message),
        })
    }

    fn merge_body(
        &self,
        input_type: &str,
        raw_body: &[u8],
        message: &mut Map<String, Value>,
    ) -> TranscodeResult<()> {
        let object = match parse_body(raw_body)? {
            None => return Ok(()),
            Some(Value::Object(object)) => object,
            Some(_) => {
                return Err(TranscodeError::MalformedBody(
                    "expected a JSON object".to_string(),
                ))
            }
        };
        let schema = self.pool.message(input_type)?;
        for (key, value) in object {
            let field = schema.field(&key).ok_or_else(|| TranscodeError::UnknownField {
                message: input_type.to_string(),
                field: key.clone(),
            })?;
            let value = match field.message_type() {
                Some(nested) => self.canonical_value(nested, field.cardinality, value),
                None => value,
            };
            message.insert(field.name.clone(), value);
        }
        Ok(())
    }

    /// Rename JSON-named keys of a message object to proto names, recursively,
    /// so path captures written later replace body values instead of sitting
    /// next to them. Keys the schema does not know are kept as they are.
    fn canonical_object(&self, message_type: &str, object: Map<String, Value>) -> Map<String, Value> {
        let Ok(schema) = self.pool.message(message_type) else {
            return object;
        };
        object
            .into_iter()
            .map(|(key, value)| match schema.field(&key) {
                Some(field) => {
                    let value = match field.message_type() {
                        Some(nested) => self.canonical_value(nested, field.cardinality, value),
                        None => value,
                    };
                    (field.name.clone(), value)
                }
                None => (key, value),
            })
            .collect()
    }

    fn canonical_value(&self, message_type: &str, cardinality: Cardinality, value: Value) -> Value {
        let canonical = |item: Value| match item {
            Value::Object(object) => Value::Object(self.canonical_object(message_type, object)),
            other => other,
        };
        match (cardinality, value) {
            (Cardinality::Singular, value) => canonical(value),
            (Cardinality::Repeated, Value::Array(items)) => {
                Value::Array(items.into_iter().map(canonical).collect())
            }
            (Cardinality::Map, Value::Object(entries)) => Value::Object(
                entries
                    .into_iter()
                    .map(|(key, entry)| (key, canonical(entry)))
                    .collect(),
            ),
            (_, other) => other,
        }
    }

    fn apply_query(
        &self,
        route: &RouteMatch<'_>,
        query: &str,
        message: &mut Map<String, Value>,
    ) -> TranscodeResult<()> {
        let input_type = &route.rule.method().input_type;
        let fields = route.fields();
        let body_field = fields.body.as_ref().map(|handle| handle.path().head());

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let handle = match FieldPath::parse(&key).map(|p| self.pool.resolve(input_type, &p)) {
                Some(Ok(handle)) => handle,
                _ => {
                    tracing::debug!(key = %key, "Ignoring unknown query parameter");
                    continue;
                }
            };
            if fields.variables.iter().any(|v| v.path() == handle.path()) {
                tracing::debug!(key = %key, "Ignoring query parameter bound by the path");
                continue;
            }
            if body_field == Some(handle.path().head()) {
                tracing::debug!(key = %key, "Ignoring query parameter bound by the body");
                continue;
            }

            handle.check_query_bindable(&key)?;
            let coerced = coerce(&value, &handle)?;
            set_field(message, handle.path(), coerced, handle.leaf().is_repeated());
        }
        Ok(())
    }
}

fn parse_body(raw_body: &[u8]) -> TranscodeResult<Option<Value>> {
    if raw_body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(raw_body)
        .map(Some)
        .map_err(|e| TranscodeError::MalformedBody(e.to_string()))
}

fn check_body_shape(handle: &FieldHandle, value: &Value) -> TranscodeResult<()> {
    let field = handle.leaf();
    let ok = match field.cardinality {
        Cardinality::Repeated => value.is_array(),
        Cardinality::Map => value.is_object(),
        Cardinality::Singular if field.message_type().is_some() => value.is_object() || value.is_null(),
        Cardinality::Singular => !value.is_object() && !value.is_array(),
    };
    if ok {
        Ok(())
    } else {
        Err(TranscodeError::MalformedBody(format!(
            "body does not fit field `{}` of type {}",
            handle.path(),
            field.type_label()
        )))
    }
}

/// Parse a URL string into the JSON value of the handle's leaf type.
pub fn coerce(raw: &str, handle: &FieldHandle) -> TranscodeResult<Value> {
    let leaf = handle.leaf();
    let parsed = match leaf.leaf_type() {
        Some(LeafType::Scalar(scalar)) => coerce_scalar(raw, scalar),
        Some(LeafType::Enum) => coerce_enum(raw),
        None => None,
    };
    parsed.ok_or_else(|| TranscodeError::TypeCoercion {
        field_path: handle.path().to_string(),
        expected: leaf.type_label(),
        value: raw.to_string(),
    })
}

fn coerce_scalar(raw: &str, scalar: ScalarType) -> Option<Value> {
    match scalar {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
            raw.parse::<i32>().ok().map(Value::from)
        }
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
            raw.parse::<i64>().ok().map(Value::from)
        }
        ScalarType::Uint32 | ScalarType::Fixed32 => raw.parse::<u32>().ok().map(Value::from),
        ScalarType::Uint64 | ScalarType::Fixed64 => raw.parse::<u64>().ok().map(Value::from),
        ScalarType::Double | ScalarType::Float => match raw {
            "NaN" | "Infinity" | "-Infinity" => Some(Value::String(raw.to_string())),
            _ => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .filter(|f| scalar == ScalarType::Double || f.abs() <= f32::MAX as f64)
                .and_then(Number::from_f64)
                .map(Value::Number),
        },
        ScalarType::Bool => match raw {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ScalarType::String | ScalarType::Bytes => Some(Value::String(raw.to_string())),
    }
}

/// Enum values travel as their name or their number.
fn coerce_enum(raw: &str) -> Option<Value> {
    if let Ok(number) = raw.parse::<i32>() {
        return Some(Value::from(number));
    }
    let mut chars = raw.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    valid.then(|| Value::String(raw.to_string()))
}

/// Write `value` at `path`, creating intermediate objects.
fn set_field(target: &mut Map<String, Value>, path: &FieldPath, value: Value, append: bool) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };
    let mut current = target;
    for name in parents {
        let entry = current
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Some(next) = entry.as_object_mut() else {
            return;
        };
        current = next;
    }

    if !append {
        current.insert(last.clone(), value);
        return;
    }
    match current
        .entry(last.clone())
        .or_insert_with(|| Value::Array(Vec::new()))
    {
        Value::Array(items) => items.push(value),
        other => *other = Value::Array(vec![value]),
    }
}
