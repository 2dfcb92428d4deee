//! Error handling for the routegen plan-synthesis library.
//!
//! This module defines the main error type `Error` used throughout the
//! library, along with a convenient `Result` type alias. It uses `thiserror`
//! for easy error handling and implements conversions from common error
//! types.
//!
//! The five generation-time failure kinds (`UnsupportedType`,
//! `MissingMetadata`, `AmbiguousAnnotation`, `InvalidTemplate`,
//! `SchemaConflict`) are all fatal to the run: partially-synthesized binding
//! code would compile to incorrect runtime behavior, so the synthesizer
//! aborts the offending file immediately instead of recovering.
//!
//! # Examples
//!
//! ```
//! use routegen_core::error::{Error, Position, Result};
//!
//! fn might_fail(at: &Position) -> Result<()> {
//!     // Operations that might fail...
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Result type for routegen synthesis operations
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies where in the input metadata a fatal diagnostic was raised.
///
/// Rendered as `interface`, `interface.method` or `interface.method(param)`
/// depending on how much identity is known at the failure site.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Name of the interface being processed
    pub interface: String,
    /// Method within the interface, if known
    pub method: Option<String>,
    /// Parameter or field within the method, if known
    pub parameter: Option<String>,
}

impl Position {
    /// Position pointing at a whole interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            interface: name.into(),
            method: None,
            parameter: None,
        }
    }

    /// Narrow this position to a method
    pub fn method(&self, name: impl Into<String>) -> Self {
        Self {
            interface: self.interface.clone(),
            method: Some(name.into()),
            parameter: None,
        }
    }

    /// Narrow this position to a parameter or record field
    pub fn parameter(&self, name: impl Into<String>) -> Self {
        Self {
            interface: self.interface.clone(),
            method: self.method.clone(),
            parameter: Some(name.into()),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interface)?;
        if let Some(method) = &self.method {
            write!(f, ".{}", method)?;
        }
        if let Some(parameter) = &self.parameter {
            write!(f, "({})", parameter)?;
        }
        Ok(())
    }
}

/// Main error type for routegen synthesis operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// No conversion rule or invocation matches the target type
    #[error("unsupported type `{type_name}` at {at}")]
    UnsupportedType { type_name: String, at: Position },

    /// A parameter, field or record is absent from the metadata source
    #[error("missing metadata for {what} at {at}")]
    MissingMetadata { what: String, at: Position },

    /// Duplicate or contradictory annotation on one method
    #[error("ambiguous annotation at {at}: {detail}")]
    AmbiguousAnnotation { detail: String, at: Position },

    /// Malformed placeholder in a URL template
    #[error("invalid template `{template}`: {detail}")]
    InvalidTemplate { template: String, detail: String },

    /// A field resolves to more than one request source
    #[error("schema conflict at {at}: {detail}")]
    SchemaConflict { detail: String, at: Position },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new unsupported-type error
    pub fn unsupported_type(type_name: impl Into<String>, at: &Position) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
            at: at.clone(),
        }
    }

    /// Create a new missing-metadata error
    pub fn missing_metadata(what: impl Into<String>, at: &Position) -> Self {
        Self::MissingMetadata {
            what: what.into(),
            at: at.clone(),
        }
    }

    /// Create a new ambiguous-annotation error
    pub fn ambiguous_annotation(detail: impl Into<String>, at: &Position) -> Self {
        Self::AmbiguousAnnotation {
            detail: detail.into(),
            at: at.clone(),
        }
    }

    /// Create a new invalid-template error
    pub fn invalid_template(template: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidTemplate {
            template: template.into(),
            detail: detail.into(),
        }
    }

    /// Create a new schema-conflict error
    pub fn schema_conflict(detail: impl Into<String>, at: &Position) -> Self {
        Self::SchemaConflict {
            detail: detail.into(),
            at: at.clone(),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Config(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Config(s)
    }
}
