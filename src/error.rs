use std::path::PathBuf;
use thiserror::Error;

impl From<serde_json::Error> for ProvenanceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<::config::ConfigError> for ProvenanceError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ProvenanceError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record in {location}: {message}")]
    MalformedRecord { location: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

pub type Result<T> = std::result::Result<T, ProvenanceError>;

impl ProvenanceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// A line of the audit log that failed to parse
    pub fn malformed_line(path: &std::path::Path, line: usize, err: impl std::fmt::Display) -> Self {
        Self::MalformedRecord {
            location: format!("{}:{}", path.display(), line),
            message: err.to_string(),
        }
    }

    /// A lineage snapshot that failed to parse
    pub fn malformed_snapshot(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::MalformedRecord {
            location: path.display().to_string(),
            message: err.to_string(),
        }
    }
}
