//! Declarative input table for text-to-image jobs.
//!
//! Every field is described once in [`INPUT_SCHEMA`]; [`validate`] walks the table,
//! fills defaults, and reports every violation it finds rather than stopping at the
//! first one.

use crate::domain::model::{Scheduler, ValidatedInput};
use serde_json::{json, Map, Value};

/// Input keys that are accepted but never validated.
pub const PASSTHROUGH_KEYS: [&str; 1] = ["health_check"];

pub const ALLOWED_DIMENSIONS: [i64; 13] = [
    128, 256, 384, 448, 512, 576, 640, 704, 768, 832, 896, 960, 1024,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Float,
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            // integers are widened to float
            FieldType::Float => value.is_number(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Constraint {
    Unconstrained,
    OneOf(&'static [i64]),
    IntRange { min: i64, max: i64 },
    FloatRange { min: f64, max: f64 },
    SchedulerName,
}

impl Constraint {
    fn check(&self, value: &Value) -> bool {
        match self {
            Constraint::Unconstrained => true,
            Constraint::OneOf(allowed) => value.as_i64().is_some_and(|v| allowed.contains(&v)),
            Constraint::IntRange { min, max } => {
                value.as_i64().is_some_and(|v| (*min..=*max).contains(&v))
            }
            Constraint::FloatRange { min, max } => {
                value.as_f64().is_some_and(|v| (*min..=*max).contains(&v))
            }
            Constraint::SchedulerName => value
                .as_str()
                .is_some_and(|name| name.parse::<Scheduler>().is_ok()),
        }
    }

    fn describe(&self) -> String {
        match self {
            Constraint::Unconstrained => String::new(),
            Constraint::OneOf(allowed) => format!(
                " Allowed values: {}.",
                allowed
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Constraint::IntRange { min, max } => {
                format!(" Expected an integer between {} and {}.", min, max)
            }
            Constraint::FloatRange { min, max } => {
                format!(" Expected a number between {} and {}.", min, max)
            }
            Constraint::SchedulerName => format!(
                " Allowed values: {}.",
                Scheduler::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    Required,
    Null,
    Integer(i64),
    Float(f64),
    Text(&'static str),
    /// Fresh 16-bit value, drawn every time the default is applied.
    RandomSeed,
}

impl DefaultValue {
    fn resolve(&self) -> Option<Value> {
        match self {
            DefaultValue::Required => None,
            DefaultValue::Null => Some(Value::Null),
            DefaultValue::Integer(v) => Some(json!(v)),
            DefaultValue::Float(v) => Some(json!(v)),
            DefaultValue::Text(v) => Some(json!(v)),
            DefaultValue::RandomSeed => Some(json!(rand::random::<u16>())),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub field_type: FieldType,
    pub default: DefaultValue,
    pub constraint: Constraint,
}

pub const INPUT_SCHEMA: [FieldSpec; 9] = [
    FieldSpec {
        name: "prompt",
        field_type: FieldType::String,
        default: DefaultValue::Required,
        constraint: Constraint::Unconstrained,
    },
    FieldSpec {
        name: "negative_prompt",
        field_type: FieldType::String,
        default: DefaultValue::Null,
        constraint: Constraint::Unconstrained,
    },
    FieldSpec {
        name: "width",
        field_type: FieldType::Integer,
        default: DefaultValue::Integer(768),
        constraint: Constraint::OneOf(&ALLOWED_DIMENSIONS),
    },
    FieldSpec {
        name: "height",
        field_type: FieldType::Integer,
        default: DefaultValue::Integer(768),
        constraint: Constraint::OneOf(&ALLOWED_DIMENSIONS),
    },
    FieldSpec {
        name: "num_outputs",
        field_type: FieldType::Integer,
        default: DefaultValue::Integer(1),
        constraint: Constraint::IntRange { min: 1, max: 3 },
    },
    FieldSpec {
        name: "num_inference_steps",
        field_type: FieldType::Integer,
        default: DefaultValue::Integer(50),
        constraint: Constraint::IntRange { min: 1, max: 499 },
    },
    FieldSpec {
        name: "guidance_scale",
        field_type: FieldType::Float,
        default: DefaultValue::Float(7.5),
        constraint: Constraint::FloatRange {
            min: 0.0,
            max: 20.0,
        },
    },
    FieldSpec {
        name: "scheduler",
        field_type: FieldType::String,
        default: DefaultValue::Text("DPMSolverMultistep"),
        constraint: Constraint::SchedulerName,
    },
    FieldSpec {
        name: "seed",
        field_type: FieldType::Integer,
        default: DefaultValue::RandomSeed,
        // any value representable as a signed 64-bit integer
        constraint: Constraint::IntRange {
            min: i64::MIN,
            max: i64::MAX,
        },
    },
];

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validates a raw job input against [`INPUT_SCHEMA`].
///
/// Returns the defaulted input, or one message per problem found. Explicit `null`
/// on an optional field behaves as if the field were absent.
pub fn validate(input: &Value) -> Result<ValidatedInput, Vec<String>> {
    let Some(object) = input.as_object() else {
        return Err(vec!["Job input must be a JSON object.".to_string()]);
    };

    let mut errors = Vec::new();

    for key in object.keys() {
        let known = INPUT_SCHEMA.iter().any(|spec| spec.name == key.as_str())
            || PASSTHROUGH_KEYS.contains(&key.as_str());
        if !known {
            errors.push(format!(
                "Unexpected input. {} is not a valid input option.",
                key
            ));
        }
    }

    let mut resolved = Map::new();
    for spec in &INPUT_SCHEMA {
        let supplied = object.get(spec.name).filter(|v| !v.is_null());

        let value = match supplied {
            Some(value) => value.clone(),
            None => match spec.default.resolve() {
                Some(default) => default,
                None => {
                    errors.push(format!("{} is a required input.", spec.name));
                    continue;
                }
            },
        };

        if value.is_null() {
            resolved.insert(spec.name.to_string(), value);
            continue;
        }

        if !spec.field_type.accepts(&value) {
            errors.push(format!(
                "{} should be {} type, not {}.",
                spec.name,
                spec.field_type.name(),
                json_type_name(&value)
            ));
            continue;
        }

        if !spec.constraint.check(&value) {
            errors.push(format!(
                "{} does not meet the constraints.{}",
                spec.name,
                spec.constraint.describe()
            ));
            continue;
        }

        let value = match spec.field_type {
            FieldType::Float => value.as_f64().map(|v| json!(v)).unwrap_or(value),
            _ => value,
        };
        resolved.insert(spec.name.to_string(), value);
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    serde_json::from_value(Value::Object(resolved)).map_err(|e| vec![e.to_string()])
}
