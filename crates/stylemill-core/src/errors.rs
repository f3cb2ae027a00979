use std::path::PathBuf;
use thiserror::Error;

/// A failure reported by the compile capability, located in a source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}\n\nin {} on line {line}, column {column}", .file.display())]
pub struct CompileError {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl CompileError {
    pub fn new(
        file: impl Into<PathBuf>,
        line: u32,
        column: u32,
        message: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// An error with no usable location, pinned to the start of `file`
    pub fn unlocated(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::new(file, 0, 0, message)
    }
}

/// Errors surfaced while handling a single style-sheet request
#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("failed to stat {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl MiddlewareError {
    /// Write-phase failures leave the request degraded rather than failed
    pub fn is_write_error(&self) -> bool {
        matches!(
            self,
            MiddlewareError::CreateDir { .. } | MiddlewareError::Write { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_display_includes_location() {
        let err = CompileError::new("styles/a.scss", 3, 10, "Undefined variable.");
        let msg = err.to_string();
        assert!(msg.starts_with("Undefined variable."));
        assert!(msg.contains("styles/a.scss"));
        assert!(msg.contains("line 3, column 10"));
    }

    #[test]
    fn compile_error_converts_into_middleware_error() {
        let err: MiddlewareError = CompileError::unlocated("a.scss", "boom").into();
        assert!(matches!(err, MiddlewareError::Compile(_)));
        assert!(!err.is_write_error());
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn write_errors_are_flagged() {
        let err = MiddlewareError::Write {
            path: PathBuf::from("/out/a.css"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.is_write_error());
        assert!(err.to_string().contains("/out/a.css"));

        let err = MiddlewareError::Stat {
            path: PathBuf::from("/out/a.css"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(!err.is_write_error());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::Invalid("src must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: src must not be empty"
        );
    }
}
