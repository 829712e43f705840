use std::collections::BTreeMap;

use plan::ParamValue;

/// The shape a parameter field may take, per §3.4's "typed fields
/// with optional/required/nullable flags and defaults".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    String,
    NodeRef,
    List,
}

/// One entry of a [`crate::TaskSpec`]'s parameter schema.
#[derive(Debug, Clone)]
pub struct ParamField {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<ParamValue>,
}

impl ParamField {
    pub const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            nullable: false,
            default: None,
        }
    }

    pub fn optional(name: &'static str, kind: ParamKind, default: ParamValue) -> Self {
        Self {
            name,
            kind,
            required: false,
            nullable: false,
            default: Some(default),
        }
    }
}

#[derive(Debug, snafu::Snafu)]
pub enum ParamError {
    #[snafu(display("missing required parameter {name:?}"))]
    Missing { name: String },
    #[snafu(display("parameter {name:?} has type {actual:?}, expected {expected:?}"))]
    WrongType {
        name: String,
        expected: ParamKind,
        actual: &'static str,
    },
    #[snafu(display("parameter {name:?} is null but the field is not nullable"))]
    UnexpectedNull { name: String },
}

fn matches_kind(value: &ParamValue, kind: ParamKind) -> bool {
    matches!(
        (value, kind),
        (ParamValue::Int(_), ParamKind::Int)
            | (ParamValue::Float(_), ParamKind::Float)
            // an integer literal is an acceptable float (plan JSON doesn't
            // force `3.0` to be written out for a field that happens to be
            // a whole number)
            | (ParamValue::Int(_), ParamKind::Float)
            | (ParamValue::Bool(_), ParamKind::Bool)
            | (ParamValue::String(_), ParamKind::String)
            | (ParamValue::NodeRef(_), ParamKind::NodeRef)
            | (ParamValue::List(_), ParamKind::List)
    )
}

fn type_name(value: &ParamValue) -> &'static str {
    match value {
        ParamValue::Null => "null",
        ParamValue::Bool(_) => "bool",
        ParamValue::Int(_) => "int",
        ParamValue::Float(_) => "float",
        ParamValue::String(_) => "string",
        ParamValue::NodeRef(_) => "node_ref",
        ParamValue::List(_) => "list",
    }
}

/// Validate `params` against `schema`, applying defaults for missing
/// optional fields. Returns the effective parameter map (defaults
/// filled in) a task's `run`/`run_async` should use.
pub fn validate_params(
    schema: &[ParamField],
    params: &BTreeMap<String, ParamValue>,
) -> Result<BTreeMap<String, ParamValue>, ParamError> {
    let mut effective = params.clone();

    for field in schema {
        match params.get(field.name) {
            Some(ParamValue::Null) => {
                if !field.nullable {
                    return Err(ParamError::UnexpectedNull {
                        name: field.name.to_string(),
                    });
                }
            }
            Some(value) => {
                if !matches_kind(value, field.kind) {
                    return Err(ParamError::WrongType {
                        name: field.name.to_string(),
                        expected: field.kind,
                        actual: type_name(value),
                    });
                }
            }
            None => {
                if field.required {
                    return Err(ParamError::Missing {
                        name: field.name.to_string(),
                    });
                }
                if let Some(default) = &field.default {
                    effective.insert(field.name.to_string(), default.clone());
                }
            }
        }
    }

    Ok(effective)
}
