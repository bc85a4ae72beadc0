//! Error taxonomy for aggregation runs
//!
//! Every error here is scoped to one unit of work (one log, one insert,
//! one comparison group). None of them aborts an aggregation run; the
//! pipeline records them as skipped units in the final report.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while turning a log source into a metric record
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no metrics found in log")]
    NoMetrics,

    #[error("missing section: {0}")]
    MissingSection(String),

    #[error("invalid value for metric '{metric}': {value}")]
    InvalidValue { metric: String, value: String },

    #[error("cannot derive identity from '{filename}': {reason}")]
    Identity { filename: String, reason: String },

    #[error("unreadable log: {0}")]
    Unreadable(String),
}

/// Errors produced by the aggregation core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AggregateError {
    #[error("schema mismatch: expected [{expected}], found [{found}]")]
    SchemaMismatch { expected: String, found: String },

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("division undefined: zero {what}")]
    DivisionUndefined { what: String },

    #[error("insufficient samples: need at least {required}, got {actual}")]
    InsufficientSamples { required: usize, actual: usize },
}

impl AggregateError {
    /// Classification used by the report
    pub fn kind(&self) -> FailureKind {
        match self {
            AggregateError::SchemaMismatch { .. } => FailureKind::SchemaMismatch,
            AggregateError::Parse(_) => FailureKind::ParseError,
            AggregateError::DivisionUndefined { .. } => FailureKind::DivisionUndefined,
            AggregateError::InsufficientSamples { .. } => FailureKind::InsufficientSamples,
        }
    }
}

/// Failure classes reported for skipped units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    SchemaMismatch,
    ParseError,
    DivisionUndefined,
    InsufficientSamples,
}

pub type Result<T> = std::result::Result<T, AggregateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = AggregateError::InsufficientSamples {
            required: 2,
            actual: 1,
        };
        assert_eq!(err.kind(), FailureKind::InsufficientSamples);

        let err: AggregateError = ParseError::NoMetrics.into();
        assert_eq!(err.kind(), FailureKind::ParseError);
    }

    #[test]
    fn test_display_messages() {
        let err = AggregateError::DivisionUndefined {
            what: "baseline".to_string(),
        };
        assert_eq!(err.to_string(), "division undefined: zero baseline");

        let err = AggregateError::SchemaMismatch {
            expected: "benchmark:categorical".to_string(),
            found: "cores:ordinal".to_string(),
        };
        assert!(err.to_string().contains("expected [benchmark:categorical]"));
    }

    #[test]
    fn test_failure_kind_serializes_kebab_case() {
        let json = serde_json::to_string(&FailureKind::DivisionUndefined).unwrap();
        assert_eq!(json, "\"division-undefined\"");
    }
}
