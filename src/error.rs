//! Error types for metric bookkeeping
//!
//! Structural and logic errors surface synchronously to the caller. Sink
//! delivery failures are a separate type ([`crate::plot::SinkError`]) that the
//! plot cache absorbs and never returns from a metric operation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for mlogger operations.
pub type Result<T> = std::result::Result<T, MetricError>;

/// Errors raised by metrics, containers and state (de)serialization.
#[derive(Error, Debug)]
pub enum MetricError {
    /// Input is not scalar-like or has no numeric interpretation.
    #[error("Cannot convert value to float: {reason}")]
    ValueConversion { reason: String },

    /// A metric with the same (name, tag) identity is already registered.
    #[error("Metric '{name}' with tag '{tag}' is already registered")]
    DuplicateRegistration { name: String, tag: String },

    /// Lookup of a child by name failed (wrapper child or container child).
    #[error("Unknown child '{name}'")]
    UnknownChild { name: String },

    /// Lookup of a metric by identity failed.
    #[error("Unknown metric '{name}' with tag '{tag}'")]
    UnknownMetric { name: String, tag: String },

    /// Average/Sum read before any weight was accumulated.
    #[error("Accumulator '{name}' has no data yet (total weight is zero)")]
    EmptyAccumulator { name: String },

    /// A recorded variant tag is not in the state registry.
    #[error("Unknown variant tag '{kind}' in serialized state")]
    SerializationTypeMismatch { kind: String },

    /// A known variant tag whose fields could not be read back.
    #[error("Malformed state for variant '{kind}': {message}")]
    MalformedState { kind: String, message: String },

    /// Accumulator weights must be finite and strictly positive.
    #[error("Invalid weight {weight}: weights must be finite and > 0")]
    InvalidWeight { weight: f64 },

    /// An explicit history index went backwards.
    #[error("Index {index} is lower than the last logged index {last}")]
    NonMonotonicIndex { last: f64, index: f64 },

    /// Argument-less update on a variant that needs a value.
    #[error("Metric '{name}' of kind '{kind}' requires a value to update")]
    MissingValue { name: String, kind: &'static str },

    /// Dynamic metric updated before a function was bound.
    #[error("Dynamic metric '{name}' has no function bound")]
    NoFunctionBound { name: String },

    /// Dynamic metric read before its first evaluation.
    #[error("Dynamic metric '{name}' has not been evaluated yet")]
    Unevaluated { name: String },

    /// Operation that the metric's kind does not define.
    #[error("Metric '{name}' of kind '{kind}' does not support {operation}")]
    Unsupported { name: String, kind: &'static str, operation: &'static str },

    /// IO error with the path involved.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error.
    #[error("YAML configuration error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl MetricError {
    /// Create an IO error with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Create a value conversion error.
    pub fn conversion(reason: impl Into<String>) -> Self {
        Self::ValueConversion { reason: reason.into() }
    }

    /// Whether the error is caused by a lookup miss.
    pub fn is_lookup_miss(&self) -> bool {
        matches!(self, Self::UnknownChild { .. } | Self::UnknownMetric { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_registration_message() {
        let err = MetricError::DuplicateRegistration { name: "loss".into(), tag: "train".into() };
        let msg = err.to_string();
        assert!(msg.contains("loss"));
        assert!(msg.contains("train"));
        assert!(msg.contains("already registered"));
    }

    #[test]
    fn test_lookup_miss_classification() {
        assert!(MetricError::UnknownChild { name: "a".into() }.is_lookup_miss());
        assert!(MetricError::UnknownMetric { name: "a".into(), tag: "t".into() }.is_lookup_miss());
        assert!(!MetricError::EmptyAccumulator { name: "a".into() }.is_lookup_miss());
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = MetricError::io(
            "/tmp/missing.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("missing.json"));
    }
}
