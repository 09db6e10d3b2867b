//! Deep merge of partial API responses
//!
//! A paginated query yields several partial payloads that share one shape.
//! Merging each page into an accumulator assembles the one logical record:
//! sequences concatenate, mappings merge key by key, scalars must agree.

use serde_json::Value;
use thiserror::Error;

/// Contract violations between two responses expected to share shape
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("cannot merge {found} into {expected}")]
    ShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("conflicting scalar values: {dst} != {src}")]
    ScalarConflict { dst: String, src: String },
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
        _ => "scalar",
    }
}

/// Merges `src` into `dst`.
///
/// Both values must have the same kind at every shared position: sequences
/// are concatenated in order, mappings take absent keys and recurse on
/// present ones, and scalars must be equal. Anything else means the two
/// payloads do not belong to the same logical record.
pub fn merge_values(dst: &mut Value, src: Value) -> Result<(), MergeError> {
    match (dst, src) {
        (Value::Array(dst), Value::Array(src)) => {
            dst.extend(src);
            Ok(())
        }
        (Value::Object(dst), Value::Object(src)) => {
            for (key, value) in src {
                match dst.get_mut(&key) {
                    Some(existing) => merge_values(existing, value)?,
                    None => {
                        dst.insert(key, value);
                    }
                }
            }
            Ok(())
        }
        (dst, src) => {
            if kind(dst) != kind(&src) {
                return Err(MergeError::ShapeMismatch {
                    expected: kind(dst),
                    found: kind(&src),
                });
            }
            if *dst != src {
                return Err(MergeError::ScalarConflict {
                    dst: dst.to_string(),
                    src: src.to_string(),
                });
            }
            Ok(())
        }
    }
}
