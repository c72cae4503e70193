//! Declarative request validation.
//!
//! Every request record type declares a [`Schema`] once: an ordered table of
//! (field name, field type, rule tags) entries with a typed accessor per field.
//! Tags use the `ruleName[=ruleArgument]` syntax separated by `;`, for example
//! `"required;min=8;max=30"`. Bad tags are rejected when the schema is built,
//! which happens at startup through [`SchemaRegistry`], so a misdeclared schema
//! never reaches request handling.
//!
//! Validation evaluates every rule of every field and collects all violations.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

mod rule;

pub use rule::{Rule, RuleKind};

/// Semantic type of a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Float,
    Boolean,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// A borrowed field value read out of a record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Integer(i64),
    Float(f64),
    Boolean(bool),
}

impl FieldValue<'_> {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Text(_) => FieldType::Text,
            FieldValue::Integer(_) => FieldType::Integer,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Boolean(_) => FieldType::Boolean,
        }
    }

    /// Zero values count as unset: blank text, `0`, `0.0` and `false`.
    pub fn is_unset(&self) -> bool {
        match *self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Integer(number) => number == 0,
            FieldValue::Float(number) => number == 0.0,
            FieldValue::Boolean(flag) => !flag,
        }
    }
}

/// Schema declaration defects. These are programming errors and abort startup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("'{rule}' requirement on field '{field}' is not available")]
    UnknownRule { field: String, rule: String },

    #[error("'{rule}' requirement on field '{field}' has no value")]
    MissingArgument { field: String, rule: RuleKind },

    #[error("'{rule}' requirement on field '{field}' cannot be '{value}', should be an integer")]
    InvalidArgument {
        field: String,
        rule: RuleKind,
        value: String,
    },

    #[error("'{rule}' requirement on field '{field}' does not take a value")]
    UnexpectedArgument { field: String, rule: RuleKind },

    #[error("'{rule}' requirement cannot apply to {field_type} field '{field}'")]
    InapplicableRule {
        field: String,
        rule: RuleKind,
        field_type: FieldType,
    },

    #[error("field '{field}' is declared more than once in schema '{schema}'")]
    DuplicateField { schema: &'static str, field: String },

    #[error("no schema registered for '{0}'")]
    Unregistered(&'static str),
}

/// One failed rule on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub field: String,
    pub rule: RuleKind,
    pub message: String,
}

/// Every violation found in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    violations: Vec<Violation>,
}

impl ValidationErrors {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// Violations reported against `field`, in rule order.
    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            f.write_str(&violation.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

enum Accessor<R> {
    Text(fn(&R) -> &str),
    Integer(fn(&R) -> i64),
    Float(fn(&R) -> f64),
    Boolean(fn(&R) -> bool),
}

impl<R> Accessor<R> {
    fn field_type(&self) -> FieldType {
        match self {
            Accessor::Text(_) => FieldType::Text,
            Accessor::Integer(_) => FieldType::Integer,
            Accessor::Float(_) => FieldType::Float,
            Accessor::Boolean(_) => FieldType::Boolean,
        }
    }

    fn read<'r>(&self, record: &'r R) -> FieldValue<'r> {
        match self {
            Accessor::Text(get) => FieldValue::Text(get(record)),
            Accessor::Integer(get) => FieldValue::Integer(get(record)),
            Accessor::Float(get) => FieldValue::Float(get(record)),
            Accessor::Boolean(get) => FieldValue::Boolean(get(record)),
        }
    }
}

struct FieldSchema<R> {
    name: &'static str,
    accessor: Accessor<R>,
    rules: Vec<Rule>,
}

/// Validation table for record type `R`.
pub struct Schema<R> {
    name: &'static str,
    fields: Vec<FieldSchema<R>>,
}

impl<R> Schema<R> {
    pub fn builder(name: &'static str) -> SchemaBuilder<R> {
        SchemaBuilder {
            name,
            fields: Vec::new(),
            error: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Declared rules for `field`, or `None` if the field is not in the schema.
    pub fn rules(&self, field: &str) -> Option<&[Rule]> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.rules.as_slice())
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.accessor.field_type())
    }

    /// Check every rule of every field. The record is valid iff nothing failed.
    pub fn validate(&self, record: &R) -> Result<(), ValidationErrors> {
        let violations: Vec<Violation> = self
            .fields
            .iter()
            .flat_map(|field| {
                let value = field.accessor.read(record);
                field
                    .rules
                    .iter()
                    .filter_map(move |rule| rule.check(field.name, value))
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            tracing::debug!(
                schema = self.name,
                count = violations.len(),
                "record failed validation"
            );
            Err(ValidationErrors { violations })
        }
    }
}

impl<R> fmt::Debug for Schema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = f.debug_map();
        for field in &self.fields {
            fields.entry(&field.name, &(field.accessor.field_type(), &field.rules));
        }
        fields.finish()
    }
}

/// Accumulates field declarations; the first defect wins and is returned by [`build`](Self::build).
pub struct SchemaBuilder<R> {
    name: &'static str,
    fields: Vec<FieldSchema<R>>,
    error: Option<SchemaError>,
}

impl<R> SchemaBuilder<R> {
    pub fn text(self, name: &'static str, get: fn(&R) -> &str, tags: &str) -> Self {
        self.field(name, Accessor::Text(get), tags)
    }

    pub fn integer(self, name: &'static str, get: fn(&R) -> i64, tags: &str) -> Self {
        self.field(name, Accessor::Integer(get), tags)
    }

    pub fn float(self, name: &'static str, get: fn(&R) -> f64, tags: &str) -> Self {
        self.field(name, Accessor::Float(get), tags)
    }

    pub fn boolean(self, name: &'static str, get: fn(&R) -> bool, tags: &str) -> Self {
        self.field(name, Accessor::Boolean(get), tags)
    }

    fn field(mut self, name: &'static str, accessor: Accessor<R>, tags: &str) -> Self {
        if self.error.is_some() {
            return self;
        }
        match self.declare(name, accessor, tags) {
            Ok(field) => self.fields.push(field),
            Err(err) => self.error = Some(err),
        }
        self
    }

    fn declare(
        &self,
        name: &'static str,
        accessor: Accessor<R>,
        tags: &str,
    ) -> Result<FieldSchema<R>, SchemaError> {
        if self.fields.iter().any(|f| f.name == name) {
            return Err(SchemaError::DuplicateField {
                schema: self.name,
                field: name.to_string(),
            });
        }

        let rules = Rule::parse_tags(name, tags)?;
        let field_type = accessor.field_type();
        if let Some(rule) = rules.iter().find(|rule| !rule.applies_to(field_type)) {
            return Err(SchemaError::InapplicableRule {
                field: name.to_string(),
                rule: rule.kind(),
                field_type,
            });
        }

        Ok(FieldSchema {
            name,
            accessor,
            rules,
        })
    }

    pub fn build(self) -> Result<Schema<R>, SchemaError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(Schema {
                name: self.name,
                fields: self.fields,
            }),
        }
    }
}

/// A record type that carries a declared validation schema.
pub trait Validate: Sized + 'static {
    fn schema() -> Result<Schema<Self>, SchemaError>;
}

/// Schemas of every request record type, built once at startup and shared read-only.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and store the schema for `R`, failing on any declaration defect.
    pub fn register<R: Validate>(mut self) -> Result<Self, SchemaError> {
        let schema = R::schema().map_err(|err| {
            tracing::error!(
                record = std::any::type_name::<R>(),
                "invalid schema declaration: {}",
                err
            );
            err
        })?;
        tracing::debug!(schema = schema.name(), "registered request schema");
        self.schemas.insert(TypeId::of::<R>(), Box::new(schema));
        Ok(self)
    }

    pub fn get<R: Validate>(&self) -> Result<&Schema<R>, SchemaError> {
        self.schemas
            .get(&TypeId::of::<R>())
            .and_then(|schema| schema.downcast_ref::<Schema<R>>())
            .ok_or(SchemaError::Unregistered(std::any::type_name::<R>()))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
