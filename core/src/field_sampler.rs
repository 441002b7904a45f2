//! Generic sampler over the declarative field schema.

use crate::{
    config::{FieldKind, FieldSchema},
    error::{SimError, SimResult},
    rng::SimRng,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A drawn attribute value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b)  => write!(f, "{}", u8::from(*b)),
            Self::Int(v)   => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(s)  => f.write_str(s),
        }
    }
}

/// Draw a non-null value consistent with `kind`.
pub fn sample_value(name: &str, kind: &FieldKind, rng: &mut SimRng) -> SimResult<FieldValue> {
    match kind {
        FieldKind::IntRange { low, high } => {
            if low >= high {
                return Err(SimError::config(format!(
                    "field '{name}': empty integer range [{low}, {high})"
                )));
            }
            Ok(FieldValue::Int(rng.range_i64(*low, *high)))
        }
        FieldKind::FloatRange { low, high } => Ok(FieldValue::Float(rng.range_f64(*low, *high))),
        FieldKind::Categorical { values, weights } => {
            if values.is_empty() {
                return Err(SimError::config(format!("field '{name}': no categories")));
            }
            let idx = match weights {
                Some(w) if w.len() == values.len() => rng.weighted_index(w)?,
                Some(w) => {
                    return Err(SimError::config(format!(
                        "field '{name}': {} weights for {} categories",
                        w.len(),
                        values.len()
                    )))
                }
                None => rng.pick_index(values.len()),
            };
            Ok(FieldValue::Text(values[idx].clone()))
        }
        FieldKind::Flag => Ok(FieldValue::Flag(rng.chance(0.5))),
    }
}

/// Draw a value for `field`, absent with probability `null_rate`.
pub fn sample_field(field: &FieldSchema, rng: &mut SimRng) -> SimResult<Option<FieldValue>> {
    if rng.chance(field.null_rate) {
        return Ok(None);
    }
    sample_value(&field.name, &field.kind, rng).map(Some)
}
