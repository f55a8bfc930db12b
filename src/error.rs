//! Error types shared across the request compiler and the result assembler.

use crate::token::Span;
use std::fmt;
use thiserror::Error;

/// An attribute path inside the resource tree, rendered dotted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AttributePath(pub Vec<String>);

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "(root)")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

impl From<&[String]> for AttributePath {
    fn from(path: &[String]) -> Self {
        Self(path.to_vec())
    }
}

/// Identity of the row an error refers to, when known.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowKey(pub Option<String>);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(key) => write!(f, "row {}", key),
            None => write!(f, "unknown row"),
        }
    }
}

/// The closed error taxonomy of the core.
///
/// `Request` is attributable to client input and safe to surface.
/// `Data` means a data source returned rows violating an expected invariant.
/// `Implementation` means the resolved configuration and the supplied result
/// sets disagree; retrying cannot help.
/// `NotFound` is the expected outcome of a single-record query with no row.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("Cannot parse {key}: {message}")]
    Request { key: String, message: String },

    #[error("invalid data at {attribute_path} from data source '{data_source}' ({row_key}): {message}")]
    Data {
        attribute_path: AttributePath,
        data_source: String,
        row_key: RowKey,
        message: String,
    },

    #[error("configuration defect at {attribute_path}: {message}")]
    Implementation {
        attribute_path: AttributePath,
        message: String,
    },

    #[error("resource not found")]
    NotFound,
}

impl Error {
    pub fn request(key: &str, error: ParseError) -> Self {
        Error::Request {
            key: key.to_string(),
            message: error.to_string(),
        }
    }

    pub fn data(
        path: &[String],
        data_source: &str,
        row_key: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Data {
            attribute_path: AttributePath::from(path),
            data_source: data_source.to_string(),
            row_key: RowKey(row_key),
            message: message.into(),
        }
    }

    pub fn implementation(path: &[String], message: impl Into<String>) -> Self {
        Error::Implementation {
            attribute_path: AttributePath::from(path),
            message: message.into(),
        }
    }

    /// Whether the error may be shown to the caller verbatim.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Request { .. } | Error::NotFound)
    }
}

/// Parse failure inside one of the mini-language compilers.
///
/// Carries an optional byte span into the offending source string. The
/// request compiler converts this into [`Error::Request`] together with the
/// name of the parameter that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(message: String) -> Self {
        Self {
            message,
            span: None,
        }
    }

    pub fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{} (at position {})", self.message, span.start),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}
