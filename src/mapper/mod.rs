/// Object-to-object mapping
///
/// The mapper builds a target type from a source value field by field,
/// following the target's declared [`Schema`]:
///
/// 1. a rule registered for `(source type, target type, field)` wins and
///    writes the typed target directly
/// 2. otherwise a same-named source field is copied: scalars verbatim,
///    enums by variant name, nested structures recursively and lists of
///    structures element by element
/// 3. otherwise the field keeps its default
///
/// Rules are registered on a [`MapperBuilder`]; the built [`ObjectMapper`]
/// has no way to change them.

mod error;
mod schema;

pub use error::MappingError;
pub use schema::{FieldDescriptor, FieldKind, Mappable, Schema};

use serde::Serialize;
use serde_json::Value;
use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::pipeline::Record;

type Transform = dyn Fn(&mut dyn Any, &dyn Any) + Send + Sync;

/// An override for one field between two types
#[derive(Clone)]
pub struct MappingRule {
    pub type_from: &'static str,
    pub type_to: &'static str,
    pub field: String,
    /// Whether the rule also runs when updating an existing instance
    pub update: bool,
    transform: Arc<Transform>,
}

impl fmt::Debug for MappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappingRule")
            .field("type_from", &self.type_from)
            .field("type_to", &self.type_to)
            .field("field", &self.field)
            .field("update", &self.update)
            .finish()
    }
}

type RuleTable = HashMap<(TypeId, TypeId), HashMap<String, MappingRule>>;

/// Collects mapping rules during bootstrap
#[derive(Debug, Default)]
pub struct MapperBuilder {
    rules: RuleTable,
}

impl MapperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule computing `field` of `B` from an `A`
    ///
    /// A later rule for the same `(A, B, field)` replaces an earlier one.
    /// With `update` unset the rule only runs when building a new `B`;
    /// partial updates leave the field as it was.
    pub fn add_rule<A, B, F>(mut self, field: &str, update: bool, transform: F) -> Result<Self, MappingError>
    where
        A: 'static,
        B: Mappable,
        F: Fn(&mut B, &A) + Send + Sync + 'static,
    {
        let schema = B::schema();
        if schema.field(field).is_none() {
            return Err(MappingError::UnknownField {
                target: schema.type_name,
                field: field.to_string(),
            });
        }

        let transform = move |target: &mut dyn Any, source: &dyn Any| {
            if let (Some(target), Some(source)) = (target.downcast_mut::<B>(), source.downcast_ref::<A>()) {
                transform(target, source);
            }
        };

        let rule = MappingRule {
            type_from: type_name::<A>(),
            type_to: schema.type_name,
            field: field.to_string(),
            update,
            transform: Arc::new(transform),
        };
        tracing::trace!(from = rule.type_from, to = rule.type_to, field, update, "mapping rule registered");

        self.rules
            .entry((TypeId::of::<A>(), TypeId::of::<B>()))
            .or_default()
            .insert(field.to_string(), rule);
        Ok(self)
    }

    pub fn build(self) -> ObjectMapper {
        ObjectMapper { rules: self.rules }
    }
}

/// Maps values between types using schemas and registered rules
#[derive(Debug, Default)]
pub struct ObjectMapper {
    rules: RuleTable,
}

impl ObjectMapper {
    pub fn builder() -> MapperBuilder {
        MapperBuilder::new()
    }

    /// The rule registered for `(A, B, field)`, if any
    pub fn rule<A: 'static, B: 'static>(&self, field: &str) -> Option<&MappingRule> {
        self.rules_for::<A, B>().and_then(|rules| rules.get(field))
    }

    /// Build a new `B` from an `A`
    pub fn map<A, B>(&self, source: &A) -> Result<B, MappingError>
    where
        A: Serialize + 'static,
        B: Mappable,
    {
        self.map_onto(source, None)
    }

    /// Build a new `B` from a key-value record
    ///
    /// Missing keys leave the field at its default; unknown keys are ignored.
    pub fn map_from_dict<B: Mappable>(&self, source: &Record) -> Result<B, MappingError> {
        self.map::<Record, B>(source)
    }

    /// Map every element of a slice, preserving order
    pub fn map_collection<A, B>(&self, sources: &[A]) -> Result<Vec<B>, MappingError>
    where
        A: Serialize + 'static,
        B: Mappable,
    {
        sources.iter().map(|source| self.map(source)).collect()
    }

    /// Apply the fields present in `source` to an existing `B`
    ///
    /// Fields the source does not carry keep their current value, and only
    /// rules registered with `update` run. On error `existing` is left
    /// untouched.
    pub fn update<A, B>(&self, source: &A, existing: &mut B) -> Result<(), MappingError>
    where
        A: Serialize + 'static,
        B: Mappable,
    {
        let updated = self.map_onto(source, Some(&*existing))?;
        *existing = updated;
        Ok(())
    }

    /// Apply a partial key-value payload to an existing `B`
    pub fn update_from_dict<B: Mappable>(&self, payload: &Record, existing: &mut B) -> Result<(), MappingError> {
        self.update::<Record, B>(payload, existing)
    }

    fn rules_for<A: 'static, B: 'static>(&self) -> Option<&HashMap<String, MappingRule>> {
        self.rules.get(&(TypeId::of::<A>(), TypeId::of::<B>()))
    }

    fn map_onto<A, B>(&self, source: &A, existing: Option<&B>) -> Result<B, MappingError>
    where
        A: Serialize + 'static,
        B: Mappable,
    {
        let schema = B::schema();
        let rules = self.rules_for::<A, B>();
        let has_rule = |field: &str| rules.is_some_and(|r| r.contains_key(field));

        let source_record = to_record(source)?;
        let base = existing.map(to_record).transpose()?;

        let record = map_record(
            &source_record,
            schema,
            base.as_ref(),
            schema.type_name,
            &has_rule,
        )?;

        let mut target: B = serde_json::from_value(Value::Object(record)).map_err(|e| MappingError::Build {
            target: schema.type_name,
            message: e.to_string(),
        })?;

        if let Some(rules) = rules {
            for field in schema.fields {
                let Some(rule) = rules.get(field.name) else {
                    continue;
                };
                if existing.is_some() && !rule.update {
                    continue;
                }
                (rule.transform)(&mut target as &mut dyn Any, source as &dyn Any);
            }
        }

        Ok(target)
    }
}

fn to_record<T: Serialize + 'static>(value: &T) -> Result<Record, MappingError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(MappingError::NotARecord {
            type_name: type_name::<T>(),
            found: value_kind(&other),
        }),
        Err(e) => Err(MappingError::Serialize {
            type_name: type_name::<T>(),
            message: e.to_string(),
        }),
    }
}

/// Map the fields of `schema` present in `source`, starting from `base`
fn map_record(
    source: &Record,
    schema: &Schema,
    base: Option<&Record>,
    path: &str,
    skip: &dyn Fn(&str) -> bool,
) -> Result<Record, MappingError> {
    let mut out = base.cloned().unwrap_or_default();

    for field in schema.fields {
        if skip(field.name) {
            continue;
        }
        let Some(value) = source.get(field.name) else {
            continue;
        };

        let field_path = format!("{}.{}", path, field.name);
        let prior = base.and_then(|b| b.get(field.name));
        let converted = convert(value, field.kind, prior, &field_path)?;
        out.insert(field.name.to_string(), converted);
    }

    Ok(out)
}

fn convert(value: &Value, kind: FieldKind, prior: Option<&Value>, path: &str) -> Result<Value, MappingError> {
    let no_skip = |_: &str| false;

    match kind {
        FieldKind::Scalar => Ok(value.clone()),
        FieldKind::Enum => match value {
            Value::String(_) | Value::Null => Ok(value.clone()),
            other => Err(shape_error(path, "variant name", other)),
        },
        FieldKind::Nested(schema) => match value {
            Value::Null => Ok(Value::Null),
            Value::Object(map) => {
                let prior = prior.and_then(Value::as_object);
                map_record(map, schema(), prior, path, &no_skip).map(Value::Object)
            }
            other => Err(shape_error(path, "object", other)),
        },
        FieldKind::List(schema) => match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    let item_path = format!("{}[{}]", path, index);
                    match item {
                        Value::Object(map) => map_record(map, schema(), None, &item_path, &no_skip).map(Value::Object),
                        other => Err(shape_error(&item_path, "object", other)),
                    }
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(shape_error(path, "array", other)),
        },
    }
}

fn shape_error(path: &str, expected: &'static str, found: &Value) -> MappingError {
    MappingError::Shape {
        path: path.to_string(),
        expected,
        found: value_kind(found),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
