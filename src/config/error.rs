//! Configuration error types

use std::path::PathBuf;

/// Fatal error while loading a fault configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Config source could not be read
    Io {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
    /// Config source is not a well-formed topic list
    Parse(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io {
                path: Some(path),
                source,
            } => write!(f, "Failed to read config {}: {}", path.display(), source),
            ConfigError::Io { path: None, source } => {
                write!(f, "Failed to read config: {}", source)
            }
            ConfigError::Parse(e) => write!(f, "Malformed config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

/// Non-fatal error for a single operator entry
///
/// The offending operator is skipped and the rest of the chain still runs.
#[derive(Debug, Clone, PartialEq)]
pub enum OperatorError {
    /// Entry has no `type` string
    MissingType,
    /// Operator type is not one of the known kinds
    UnknownType(String),
    /// A required field is absent
    MissingField {
        operator: &'static str,
        field: &'static str,
    },
    /// A field is present but has the wrong shape
    InvalidField {
        operator: &'static str,
        field: &'static str,
    },
    /// `randomDrop` chance outside [0, 1]
    ChanceOutOfRange(f64),
    /// `randomDelay` with min greater than max
    InvalidDelayRange { min: u64, max: u64 },
    /// `map` names a transform that is not registered
    UnknownTransform(String),
}

impl std::fmt::Display for OperatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorError::MissingType => write!(f, "Operator entry has no type"),
            OperatorError::UnknownType(kind) => write!(f, "Unexpected operator type of {}", kind),
            OperatorError::MissingField { operator, field } => {
                write!(f, "No '{}' given for {} operator", field, operator)
            }
            OperatorError::InvalidField { operator, field } => {
                write!(f, "Invalid '{}' for {} operator", field, operator)
            }
            OperatorError::ChanceOutOfRange(chance) => write!(
                f,
                "Drop chance must be in [0,1] for randomDrop operator, got {}",
                chance
            ),
            OperatorError::InvalidDelayRange { min, max } => write!(
                f,
                "randomDelay min ({}) is greater than max ({})",
                min, max
            ),
            OperatorError::UnknownTransform(name) => {
                write!(f, "No transform named '{}' for map operator", name)
            }
        }
    }
}

impl std::error::Error for OperatorError {}
