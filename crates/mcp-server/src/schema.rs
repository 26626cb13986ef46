//! Declarative argument shapes for tools.
//!
//! A tool declares its input as an [`ObjectShape`]: an ordered list of fields,
//! each with a primitive type, a required flag and optionally a closed set of
//! allowed string values. The shape renders the JSON Schema advertised by
//! `tools/list`, and [`ObjectShape::compile`] turns that same schema into a
//! [`CompiledShape`] that validates the argument bag of `tools/call`.
use std::{fmt, sync::Arc};

use jsonschema::{Draft, Validator};
use mcp_core::JsonObject;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    String,
    Integer,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "string",
            PrimitiveType::Integer => "integer",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One declared field of an [`ObjectShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    name: String,
    kind: PrimitiveType,
    required: bool,
    description: Option<String>,
    allowed: Option<Vec<String>>,
}

impl FieldShape {
    fn new(name: impl Into<String>, kind: PrimitiveType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            description: None,
            allowed: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, PrimitiveType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, PrimitiveType::Integer)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict a string field to a closed set of values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PrimitiveType {
        self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn to_json_schema(&self) -> Value {
        let mut schema = JsonObject::new();
        schema.insert("type".into(), Value::from(self.kind.as_str()));
        if let Some(allowed) = &self.allowed {
            schema.insert("enum".into(), json!(allowed));
        }
        if let Some(description) = &self.description {
            schema.insert("description".into(), Value::from(description.as_str()));
        }
        Value::Object(schema)
    }
}

/// The input shape of a tool: an object with ordered, typed fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectShape {
    fields: Vec<FieldShape>,
}

impl ObjectShape {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: FieldShape) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[FieldShape] {
        &self.fields
    }

    /// Render `{type: "object", properties, required}`.
    pub fn to_json_schema(&self) -> JsonObject {
        let properties: JsonObject = self
            .fields
            .iter()
            .map(|field| (field.name.clone(), field.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|field| field.required)
            .map(|field| field.name.as_str())
            .collect();

        let mut schema = JsonObject::new();
        schema.insert("type".into(), Value::from("object"));
        schema.insert("properties".into(), Value::Object(properties));
        schema.insert("required".into(), json!(required));
        schema
    }

    /// Compile the rendered schema into validators.
    ///
    /// Besides the object schema, each field gets a type-only validator and a
    /// full one, so a rejected bag can be reported field by field.
    pub fn compile(self) -> Result<CompiledShape, SchemaError> {
        let object = compile_schema(&Value::Object(self.to_json_schema()))?;
        let fields = self
            .fields
            .iter()
            .map(|field| {
                Ok(FieldValidators {
                    kind: compile_schema(&json!({ "type": field.kind.as_str() }))?,
                    full: compile_schema(&field.to_json_schema())?,
                })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Ok(CompiledShape {
            shape: self,
            object: Arc::new(object),
            fields: fields.into(),
        })
    }
}

fn compile_schema(schema: &Value) -> Result<Validator, SchemaError> {
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(schema)
        .map_err(|err| SchemaError(err.to_string()))
}

/// A shape whose schema failed to compile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid schema: {0}")]
pub struct SchemaError(String);

struct FieldValidators {
    kind: Validator,
    full: Validator,
}

impl FieldValidators {
    fn check(&self, field: &FieldShape, value: Option<&Value>) -> Option<Problem> {
        let Some(value) = value else {
            return field.required.then_some(Problem::Missing);
        };
        if !self.kind.is_valid(value) {
            return Some(Problem::TypeMismatch {
                expected: field.kind,
                found: json_type_name(value),
            });
        }
        if !self.full.is_valid(value) {
            return Some(Problem::NotAllowed {
                allowed: field.allowed.clone().unwrap_or_default(),
            });
        }
        None
    }
}

/// An [`ObjectShape`] ready to validate argument bags.
#[derive(Clone)]
pub struct CompiledShape {
    shape: ObjectShape,
    object: Arc<Validator>,
    fields: Arc<[FieldValidators]>,
}

impl fmt::Debug for CompiledShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CompiledShape").field(&self.shape).finish()
    }
}

impl CompiledShape {
    pub fn shape(&self) -> &ObjectShape {
        &self.shape
    }

    pub fn fields(&self) -> &[FieldShape] {
        &self.shape.fields
    }

    /// Check an argument bag against the compiled schema.
    ///
    /// A missing bag counts as an empty object. Every problem is reported, in
    /// field declaration order. On success only declared fields are kept.
    pub fn validate(&self, arguments: Option<&JsonObject>) -> Result<Arguments, ValidationError> {
        let empty = JsonObject::new();
        let arguments = arguments.unwrap_or(&empty);

        let issues: Vec<FieldIssue> = if self.object.is_valid(&Value::Object(arguments.clone())) {
            Vec::new()
        } else {
            self.shape
                .fields
                .iter()
                .zip(self.fields.iter())
                .filter_map(|(field, validators)| {
                    let problem = validators.check(field, arguments.get(&field.name))?;
                    Some(FieldIssue {
                        field: field.name.clone(),
                        problem,
                    })
                })
                .collect()
        };
        if !issues.is_empty() {
            return Err(ValidationError { issues });
        }

        let accepted = self
            .shape
            .fields
            .iter()
            .filter_map(|field| {
                let value = arguments.get(&field.name)?;
                Some((field.name.clone(), value.clone()))
            })
            .collect();
        Ok(Arguments(accepted))
    }
}

/// What is wrong with a single field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    Missing,
    TypeMismatch {
        expected: PrimitiveType,
        found: &'static str,
    },
    NotAllowed {
        allowed: Vec<String>,
    },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::Missing => f.write_str("required field is missing"),
            Problem::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Problem::NotAllowed { allowed } => {
                write!(f, "expected one of: {}", allowed.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub problem: Problem,
}

impl Serialize for FieldIssue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        json!({ "field": self.field, "problem": self.problem.to_string() }).serialize(serializer)
    }
}

/// Arguments rejected by an [`ObjectShape`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid arguments: {}", self.summary())]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    fn summary(&self) -> String {
        self.issues
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.problem))
            .collect::<Vec<_>>()
            .join("; ")
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.field.as_str())
    }
}

/// An argument bag that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(JsonObject);

impl Arguments {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn as_object(&self) -> &JsonObject {
        &self.0
    }

    /// Deserialize into the typed request of a tool.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0))
    }
}
