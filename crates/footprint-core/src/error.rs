//! Error types for the data model and configuration

use crate::model::InferenceType;

/// Model validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("empty value for {0} candidate")]
    EmptyValue(InferenceType),

    #[error("candidate has no subject id")]
    MissingSubject,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be at most {max}, got {value}")]
    TooLarge {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("risk floor {floor} is above risk ceiling {ceiling}")]
    InvertedClamp { floor: f64, ceiling: f64 },
}

/// Unknown enum name while parsing user input
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
