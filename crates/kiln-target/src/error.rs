//! Error types for target construction and parsing.
//!
//! Parse failures carry one of two semantic kinds, type errors and value
//! errors. Recursive parsing annotates an error with the attribute key or
//! array index it passed through without ever changing its kind, so a
//! failure deep inside a nested target surfaces with the full path to the
//! offending field.

use std::fmt;
use std::path::PathBuf;

/// Coarse classification of a [`TargetError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A value has the wrong shape or type for its schema, or a kind is unknown.
    Type,
    /// Malformed syntax, duplicate or missing fields, unparsable literals.
    Value,
    /// Reading a target definition from disk failed.
    Io,
    /// A TOML or JSON document could not be read or written.
    Format,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Type => write!(f, "TypeError"),
            ErrorKind::Value => write!(f, "ValueError"),
            ErrorKind::Io => write!(f, "IOError"),
            ErrorKind::Format => write!(f, "FormatError"),
        }
    }
}

/// Errors that can occur while building, parsing or loading targets.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// Wrong value type for a schema, unknown kind, conflicting kind hooks.
    #[error("TypeError: {message}")]
    Type {
        /// Description, including any location annotations.
        message: String,
    },

    /// Malformed flag syntax, duplicate key, missing `kind`, bad literal.
    #[error("ValueError: {message}")]
    Value {
        /// Description, including any location annotations.
        message: String,
    },

    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error reading target files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Target file not found.
    #[error("target file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },
}

impl TargetError {
    /// Build a type error.
    pub fn type_error(message: impl Into<String>) -> Self {
        TargetError::Type {
            message: message.into(),
        }
    }

    /// Build a value error.
    pub fn value_error(message: impl Into<String>) -> Self {
        TargetError::Value {
            message: message.into(),
        }
    }

    /// The semantic kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TargetError::Type { .. } => ErrorKind::Type,
            TargetError::Value { .. } => ErrorKind::Value,
            TargetError::Io(_) | TargetError::NotFound { .. } => ErrorKind::Io,
            TargetError::Toml(_) | TargetError::TomlSer(_) | TargetError::Json(_) => {
                ErrorKind::Format
            }
        }
    }

    /// The message without the kind prefix, if this is a parse error.
    pub fn message(&self) -> Option<&str> {
        match self {
            TargetError::Type { message } | TargetError::Value { message } => Some(message),
            _ => None,
        }
    }

    /// Append location context, keeping the error kind.
    ///
    /// Only type and value errors carry context; other errors are returned
    /// unchanged.
    pub fn with_suffix(self, suffix: impl fmt::Display) -> Self {
        match self {
            TargetError::Type { message } => TargetError::Type {
                message: format!("{message}{suffix}"),
            },
            TargetError::Value { message } => TargetError::Value {
                message: format!("{message}{suffix}"),
            },
            other => other,
        }
    }

    /// Prepend location context, keeping the error kind.
    pub fn with_prefix(self, prefix: impl fmt::Display) -> Self {
        match self {
            TargetError::Type { message } => TargetError::Type {
                message: format!("{prefix}{message}"),
            },
            TargetError::Value { message } => TargetError::Value {
                message: format!("{prefix}{message}"),
            },
            other => other,
        }
    }
}

/// Result type for target operations.
pub type Result<T> = std::result::Result<T, TargetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotation_preserves_kind() {
        let err = TargetError::type_error("bad").with_suffix("[2]");
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.message(), Some("bad[2]"));

        let err = TargetError::value_error("bad").with_prefix("[0]");
        assert_eq!(err.kind(), ErrorKind::Value);
        assert_eq!(err.to_string(), "ValueError: [0]bad");
    }

    #[test]
    fn io_errors_pass_through_annotation() {
        let err = TargetError::NotFound {
            path: PathBuf::from("/x.target.toml"),
        }
        .with_suffix(", during parsing");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.message().is_none());
    }
}
