/// Structured error types for caseforge-core library.
///
/// Uses `thiserror` for better API surface and error composition.
/// Binary crates (caseforge-cli) can still use `anyhow` for convenience,
/// but library consumers get structured, composable errors.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for caseforge operations
#[derive(Error, Debug)]
pub enum CaseError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// JSON parsing or serialization failed
    #[error("JSON error at {context}: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },

    /// Config file does not exist
    #[error("Config not found at {path:?}\n\nRun: caseforge config init")]
    ConfigNotFound { path: PathBuf },

    /// Config file exists but could not be read (permissions, encoding)
    #[error("Failed to read config file {path:?}: {reason}")]
    ConfigRead { path: PathBuf, reason: String },

    /// Config file read but could not be decoded
    #[error("Failed to parse config file {path:?} (invalid TOML): {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// Configuration error (missing credential, inconsistent values)
    #[error("Configuration error: {reason}")]
    Config { reason: String },

    /// Required user input missing or malformed; no request was started
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Failure while consuming the model event stream; partial output discarded
    #[error("Generation failed: {reason}")]
    Generation { reason: String },

    /// Document parsing failed
    #[error("Document error in {path:?}: {reason}")]
    Document { path: PathBuf, reason: String },

    /// Workbook assembly failed
    #[error("Workbook error: {reason}")]
    Workbook { reason: String },
}

/// Result type alias for caseforge-core operations
pub type Result<T> = std::result::Result<T, CaseError>;

impl CaseError {
    /// Create a JSON error with context
    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    /// Create a config error
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Create an input-validation error
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a generation error
    pub fn generation(reason: impl Into<String>) -> Self {
        Self::Generation {
            reason: reason.into(),
        }
    }

    /// Create a document error
    pub fn document(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Document {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a workbook error
    pub fn workbook(reason: impl Into<String>) -> Self {
        Self::Workbook {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaseError::invalid_input("requirement text is empty");
        assert_eq!(err.to_string(), "Invalid input: requirement text is empty");

        let err = CaseError::ConfigNotFound {
            path: PathBuf::from("/tmp/config.toml"),
        };
        assert!(err.to_string().contains("caseforge config init"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let case_err: CaseError = io_err.into();

        assert!(matches!(case_err, CaseError::Io { .. }));
    }
}
