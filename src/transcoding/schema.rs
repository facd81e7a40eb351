//! Message schemas and dotted field path resolution.
//!
//! # Responsibilities
//! - Hold the message and method descriptors the gateway knows about
//! - Resolve `a.b.c` field paths to descriptors
//! - Decide which fields can travel in the URL path or query string
//!
//! # Design Decisions
//! - Each `MessageSchema` builds its name → index map once; lookups never
//!   scan the field list
//! - Fields resolve by proto name or by JSON (lowerCamelCase) name
//! - Timestamp, Duration, FieldMask and the wrapper types behave like scalars

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transcoding::error::{TranscodeError, TranscodeResult};
use crate::transcoding::template::FieldPath;

/// Protobuf scalar value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    fn default_json(&self) -> Value {
        match self {
            ScalarType::Bool => Value::Bool(false),
            ScalarType::String | ScalarType::Bytes => Value::String(String::new()),
            _ => Value::from(0),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarType::deserialize(serde_json::Value::String(s.to_string()))
            .map_err(|_| format!("unknown scalar type `{}`", s))
    }
}

/// Scalar-like well-known types and the scalar they travel as in URLs.
const WELL_KNOWN_SCALARS: &[(&str, ScalarType)] = &[
    ("google.protobuf.Timestamp", ScalarType::String),
    ("google.protobuf.Duration", ScalarType::String),
    ("google.protobuf.FieldMask", ScalarType::String),
    ("google.protobuf.DoubleValue", ScalarType::Double),
    ("google.protobuf.FloatValue", ScalarType::Float),
    ("google.protobuf.Int64Value", ScalarType::Int64),
    ("google.protobuf.UInt64Value", ScalarType::Uint64),
    ("google.protobuf.Int32Value", ScalarType::Int32),
    ("google.protobuf.UInt32Value", ScalarType::Uint32),
    ("google.protobuf.BoolValue", ScalarType::Bool),
    ("google.protobuf.StringValue", ScalarType::String),
    ("google.protobuf.BytesValue", ScalarType::Bytes),
];

fn well_known_scalar(type_name: &str) -> Option<ScalarType> {
    WELL_KNOWN_SCALARS
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, scalar)| *scalar)
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    Enum(String),
    Message(String),
}

/// How many values a field holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    #[default]
    Singular,
    Repeated,
    Map,
}

/// Type of a value that can be written from a URL string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafType {
    Scalar(ScalarType),
    Enum,
}

/// A single field of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub json_name: String,
    pub kind: FieldKind,
    pub cardinality: Cardinality,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            json_name: json_name(&name),
            name,
            kind,
            cardinality: Cardinality::Singular,
        }
    }

    pub fn scalar(name: impl Into<String>, scalar: ScalarType) -> Self {
        Self::new(name, FieldKind::Scalar(scalar))
    }

    pub fn message(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Message(type_name.into()))
    }

    pub fn enumeration(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Enum(type_name.into()))
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn repeated(self) -> Self {
        self.with_cardinality(Cardinality::Repeated)
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Map
    }

    /// Message type name, unless the field is a scalar-like well-known type.
    pub fn message_type(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Message(name) if well_known_scalar(name).is_none() => Some(name),
            _ => None,
        }
    }

    /// Type a URL string is coerced into, if the field is scalar-like.
    pub fn leaf_type(&self) -> Option<LeafType> {
        match &self.kind {
            FieldKind::Scalar(scalar) => Some(LeafType::Scalar(*scalar)),
            FieldKind::Enum(_) => Some(LeafType::Enum),
            FieldKind::Message(name) => well_known_scalar(name).map(LeafType::Scalar),
        }
    }

    /// Human readable type, used in error messages.
    pub fn type_label(&self) -> String {
        match &self.kind {
            FieldKind::Scalar(scalar) => scalar.to_string(),
            FieldKind::Enum(name) | FieldKind::Message(name) => name.clone(),
        }
    }

    /// Proto3 JSON value of an unset field.
    pub fn default_json(&self) -> Value {
        match (self.cardinality, &self.kind) {
            (Cardinality::Repeated, _) => Value::Array(Vec::new()),
            (Cardinality::Map, _) => Value::Object(Default::default()),
            (_, FieldKind::Scalar(scalar)) => scalar.default_json(),
            (_, FieldKind::Enum(_)) => Value::from(0),
            (_, FieldKind::Message(name)) if well_known_scalar(name).is_some() => Value::Null,
            (_, FieldKind::Message(_)) => Value::Object(Default::default()),
        }
    }
}

/// lowerCamelCase JSON name of a proto field name.
pub fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Fields of one message type with a cached lookup index.
#[derive(Debug, Clone)]
pub struct MessageSchema {
    name: String,
    fields: Vec<FieldDescriptor>,
    index: HashMap<String, usize>,
}

impl MessageSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let mut index = HashMap::with_capacity(fields.len() * 2);
        for (i, field) in fields.iter().enumerate() {
            index.entry(field.json_name.clone()).or_insert(i);
        }
        // Proto names take precedence over colliding JSON names.
        for (i, field) in fields.iter().enumerate() {
            index.insert(field.name.clone(), i);
        }
        Self {
            name: name.into(),
            fields,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look a field up by proto or JSON name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.index.get(name).map(|&i| &self.fields[i])
    }
}

/// Input and output types of an RPC method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub selector: String,
    pub input_type: String,
    pub output_type: String,
}

/// A resolved field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHandle {
    path: FieldPath,
    steps: Vec<FieldDescriptor>,
}

impl FieldHandle {
    /// Path using proto field names, whatever spelling was resolved.
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Descriptors along the path, outermost first.
    pub fn steps(&self) -> &[FieldDescriptor] {
        &self.steps
    }

    pub fn leaf(&self) -> &FieldDescriptor {
        // A handle is only built from a non-empty path.
        &self.steps[self.steps.len() - 1]
    }

    fn intermediates(&self) -> &[FieldDescriptor] {
        &self.steps[..self.steps.len() - 1]
    }

    /// Require a singular scalar-like leaf reached through singular messages.
    pub fn check_path_bindable(&self) -> TranscodeResult<()> {
        if self.intermediates().iter().any(|f| f.is_repeated() || f.is_map()) {
            return Err(self.invalid("path crosses a repeated or map field"));
        }
        let leaf = self.leaf();
        if leaf.is_repeated() || leaf.is_map() {
            return Err(self.invalid("repeated and map fields cannot be bound to the path"));
        }
        if leaf.leaf_type().is_none() {
            return Err(self.invalid("message fields cannot be bound to the path"));
        }
        Ok(())
    }

    /// Require a scalar-like (possibly repeated) leaf with no repeated
    /// message or map along the way.
    pub fn check_query_bindable(&self, key: &str) -> TranscodeResult<()> {
        let unsupported = |reason: &str| TranscodeError::UnsupportedQueryMapping {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        for step in &self.steps {
            if step.is_map() {
                return Err(unsupported("map fields cannot be set from the query string"));
            }
            if step.is_repeated() && step.leaf_type().is_none() {
                return Err(unsupported("repeated message fields cannot be set from the query string"));
            }
        }
        if self.leaf().leaf_type().is_none() {
            return Err(unsupported("message fields must be addressed through their subfields"));
        }
        Ok(())
    }

    fn invalid(&self, reason: &str) -> TranscodeError {
        TranscodeError::InvalidFieldType {
            field_path: self.path.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Every message and method the gateway can transcode.
#[derive(Debug, Clone, Default)]
pub struct DescriptorPool {
    messages: HashMap<String, MessageSchema>,
    methods: HashMap<String, MethodDescriptor>,
}

impl DescriptorPool {
    /// Build a pool, checking that every referenced message type exists.
    pub fn new(
        messages: Vec<MessageSchema>,
        methods: Vec<MethodDescriptor>,
    ) -> TranscodeResult<Self> {
        let pool = Self {
            messages: messages
                .into_iter()
                .map(|m| (m.name.clone(), m))
                .collect(),
            methods: methods
                .into_iter()
                .map(|m| (m.selector.clone(), m))
                .collect(),
        };

        for schema in pool.messages.values() {
            for field in &schema.fields {
                if let Some(type_name) = field.message_type() {
                    pool.message(type_name)?;
                }
            }
        }
        for method in pool.methods.values() {
            pool.message(&method.input_type)?;
            pool.message(&method.output_type)?;
        }
        Ok(pool)
    }

    pub fn message(&self, name: &str) -> TranscodeResult<&MessageSchema> {
        self.messages
            .get(name)
            .ok_or_else(|| TranscodeError::UnknownMessage(name.to_string()))
    }

    pub fn method(&self, selector: &str) -> TranscodeResult<&MethodDescriptor> {
        self.methods
            .get(selector)
            .ok_or_else(|| TranscodeError::UnknownSelector(selector.to_string()))
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Resolve a dotted path against a message type.
    pub fn resolve(&self, message: &str, path: &FieldPath) -> TranscodeResult<FieldHandle> {
        let mut schema = self.message(message)?;
        let mut steps = Vec::with_capacity(path.len());
        let mut names = Vec::with_capacity(path.len());

        for (i, segment) in path.segments().iter().enumerate() {
            let field = schema.field(segment).ok_or_else(|| TranscodeError::UnknownField {
                message: schema.name.clone(),
                field: segment.clone(),
            })?;
            names.push(field.name.clone());
            steps.push(field.clone());

            if i + 1 < path.len() {
                let next = field.message_type().ok_or_else(|| TranscodeError::InvalidFieldType {
                    field_path: names.join("."),
                    reason: "not a message with addressable fields".to_string(),
                })?;
                schema = self.message(next)?;
            }
        }

        if steps.is_empty() {
            return Err(TranscodeError::UnknownField {
                message: message.to_string(),
                field: String::new(),
            });
        }
        Ok(FieldHandle {
            path: FieldPath::from_segments(names),
            steps,
        })
    }

    /// Leaf fields of a message with nested messages expanded recursively.
    ///
    /// Repeated and map fields are leaves. A message type already on the
    /// expansion stack is a leaf too, which keeps recursive types finite.
    pub fn leaf_fields(&self, message: &str) -> TranscodeResult<Vec<(FieldPath, FieldDescriptor)>> {
        let mut out = Vec::new();
        let mut stack = HashSet::new();
        self.collect_leaves(message, &mut Vec::new(), &mut stack, &mut out)?;
        Ok(out)
    }

    fn collect_leaves(
        &self,
        message: &str,
        prefix: &mut Vec<String>,
        stack: &mut HashSet<String>,
        out: &mut Vec<(FieldPath, FieldDescriptor)>,
    ) -> TranscodeResult<()> {
        let schema = self.message(message)?;
        stack.insert(message.to_string());
        for field in &schema.fields {
            prefix.push(field.name.clone());
            match field.message_type() {
                Some(nested)
                    if field.cardinality == Cardinality::Singular && !stack.contains(nested) =>
                {
                    self.collect_leaves(nested, prefix, stack, out)?;
                }
                _ => out.push((FieldPath::from_segments(prefix.clone()), field.clone())),
            }
            prefix.pop();
        }
        stack.remove(message);
        Ok(())
    }
}
