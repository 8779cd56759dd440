//! Error types and result alias for the crate.
//!
//! This module defines [`enum@crate::error::Error`] and the crate-wide [Result] alias. The two
//! field variants are the ones direct callers of the field protocol see: [`Error::InvalidField`]
//! when a field index, name, type or access direction is wrong, and [`Error::InvalidFieldValue`]
//! when a value breaks a field's domain constraint. Inside route propagation both are caught
//! and reported instead of returned.
use thiserror::Error;

use crate::node::load::LoadState;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid field '{field}' on {node_type}: {reason}")]
    InvalidField {
        node_type: String,
        field: String,
        reason: String,
    },

    #[error("invalid value for field '{field}' on {node_type}: {reason}")]
    InvalidFieldValue {
        node_type: String,
        field: String,
        reason: String,
    },

    #[error("invalid route: {0}")]
    InvalidRoute(String),

    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),

    #[error("node does not exist in this scene")]
    UnknownNode,

    #[error("execution space does not exist in this scene")]
    UnknownSpace,

    #[error("illegal load state transition {from:?} -> {to:?}")]
    InvalidLoadState { from: LoadState, to: LoadState },

    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("timestamp {requested} is earlier than the previous tick at {previous}")]
    TimeRegression { previous: f64, requested: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("content error: {0}")]
    Content(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn invalid_field(
        node_type: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidField {
            node_type: node_type.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(
        node_type: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidFieldValue {
            node_type: node_type.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for the two errors a field setter may raise.
    #[inline]
    pub fn is_field_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidField { .. } | Error::InvalidFieldValue { .. }
        )
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Other(value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_uses_other_variant() {
        let err: Error = String::from("boom").into();
        matches!(err, Error::Other(_))
            .then_some(())
            .expect("expected Other variant");
    }

    #[test]
    fn from_str_allocates_owned_message() {
        let err: Error = "issue".into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "issue"));
    }

    #[test]
    fn field_errors_are_classified() {
        assert!(Error::invalid_field("Transform", "bogus", "no such field").is_field_error());
        assert!(Error::invalid_value("LineSet", "vertexCount", "must be >= 2").is_field_error());
        assert!(!Error::InvalidRoute("x".into()).is_field_error());
    }

    #[test]
    fn field_error_message_names_type_and_field() {
        let err = Error::invalid_value("LineSet", "vertexCount", "entry 0 is 1, must be >= 2");
        let msg = err.to_string();
        assert!(msg.contains("LineSet"));
        assert!(msg.contains("vertexCount"));
    }
}
