//! Operator entries
//!
//! [`OperatorSpec`] is the raw JSON record from the config file. It becomes a
//! typed [`Operator`] only when a pipeline is built, via [`OperatorSpec::parse`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::OperatorError;

/// Raw, unvalidated operator record (`{ "type": ..., ...fields }`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperatorSpec(pub Value);

/// A validated fault-injection operator
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Rewrite each message with a named transform
    Map { transform: String },
    /// Re-emit each message after a uniform random delay in `[min_ms, max_ms]`
    RandomDelay { min_ms: u64, max_ms: u64 },
    /// Batch messages, flushing on `max_size` items or every `window`
    Buffer {
        window: Option<Duration>,
        max_size: Option<usize>,
    },
    /// Drop each message with probability `chance`
    RandomDrop { chance: f64 },
}

impl Operator {
    /// Config name of this operator kind
    pub fn kind(&self) -> &'static str {
        match self {
            Operator::Map { .. } => "map",
            Operator::RandomDelay { .. } => "randomDelay",
            Operator::Buffer { .. } => "buffer",
            Operator::RandomDrop { .. } => "randomDrop",
        }
    }
}

impl OperatorSpec {
    /// Build a spec from a JSON value
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The `type` field, if present
    pub fn kind(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    /// Validate this entry into a typed operator
    pub fn parse(&self) -> Result<Operator, OperatorError> {
        let fields = match self.0.as_object() {
            Some(fields) => fields,
            None => return Err(OperatorError::MissingType),
        };
        let kind = self.kind().ok_or(OperatorError::MissingType)?;

        match kind {
            "map" => parse_map(fields),
            "randomDelay" => parse_random_delay(fields),
            "buffer" => parse_buffer(fields),
            "randomDrop" => parse_random_drop(fields),
            other => Err(OperatorError::UnknownType(other.to_string())),
        }
    }
}

fn parse_map(fields: &Map<String, Value>) -> Result<Operator, OperatorError> {
    // `func` is the older field name
    let value = fields
        .get("transform")
        .or_else(|| fields.get("func"))
        .filter(|v| !v.is_null())
        .ok_or(OperatorError::MissingField {
            operator: "map",
            field: "transform",
        })?;

    match value.as_str() {
        Some(name) if !name.is_empty() => Ok(Operator::Map {
            transform: name.to_string(),
        }),
        Some(_) => Err(OperatorError::MissingField {
            operator: "map",
            field: "transform",
        }),
        None => Err(OperatorError::InvalidField {
            operator: "map",
            field: "transform",
        }),
    }
}

fn parse_random_delay(fields: &Map<String, Value>) -> Result<Operator, OperatorError> {
    const OP: &str = "randomDelay";

    let max = number(fields, OP, "max")?.ok_or(OperatorError::MissingField {
        operator: OP,
        field: "max",
    })?;
    let min = number(fields, OP, "min")?.unwrap_or(0.0);

    if min < 0.0 {
        return Err(OperatorError::InvalidField {
            operator: OP,
            field: "min",
        });
    }
    if max < 0.0 {
        return Err(OperatorError::InvalidField {
            operator: OP,
            field: "max",
        });
    }

    // Fractional bounds shrink inwards to whole milliseconds
    let min_ms = min.ceil() as u64;
    let max_ms = max.floor() as u64;
    if min_ms > max_ms {
        return Err(OperatorError::InvalidDelayRange {
            min: min_ms,
            max: max_ms,
        });
    }

    Ok(Operator::RandomDelay { min_ms, max_ms })
}

fn parse_buffer(fields: &Map<String, Value>) -> Result<Operator, OperatorError> {
    const OP: &str = "buffer";

    let time = number(fields, OP, "time")?;
    let max_size = number(fields, OP, "maxSize")?;

    if time.is_some_and(|t| t < 0.0) {
        return Err(OperatorError::InvalidField {
            operator: OP,
            field: "time",
        });
    }
    if max_size.is_some_and(|n| n < 0.0 || n.fract() != 0.0) {
        return Err(OperatorError::InvalidField {
            operator: OP,
            field: "maxSize",
        });
    }

    // Zero means "not set" for both fields
    let window = time
        .filter(|t| *t > 0.0)
        .map(|t| Duration::from_millis(t.round() as u64))
        .filter(|d| !d.is_zero());
    let max_size = max_size.filter(|n| *n > 0.0).map(|n| n as usize);

    if window.is_none() && max_size.is_none() {
        return Err(OperatorError::MissingField {
            operator: OP,
            field: "time or maxSize",
        });
    }

    Ok(Operator::Buffer { window, max_size })
}

fn parse_random_drop(fields: &Map<String, Value>) -> Result<Operator, OperatorError> {
    const OP: &str = "randomDrop";

    let chance = number(fields, OP, "chance")?.ok_or(OperatorError::MissingField {
        operator: OP,
        field: "chance",
    })?;

    if !(0.0..=1.0).contains(&chance) {
        return Err(OperatorError::ChanceOutOfRange(chance));
    }

    Ok(Operator::RandomDrop { chance })
}

/// Read an optional numeric field; `null` counts as absent
fn number(
    fields: &Map<String, Value>,
    operator: &'static str,
    field: &'static str,
) -> Result<Option<f64>, OperatorError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or(OperatorError::InvalidField { operator, field }),
    }
}
