// src/utils/error.rs
use thiserror::Error;

/// Problems with the extraction configuration. Always fatal: the run stops
/// before any document is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Rule '{0}' has no 'defined-by' patterns")]
    MissingDefinedBy(String),

    #[error("Invalid regex '{pattern}' in rule '{rule}': {source}")]
    Regex {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Malformed config: {0}")]
    Shape(String),
}

/// Failures that stop a single document group. Other groups keep going.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {0}: {1}")]
    Parse(String, String),

    #[error("Document {0} has content but no configured section matched")]
    MissingSections(String),

    #[error("Processing task failed: {0}")]
    Task(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction failed: {0}")]
    Document(#[from] DocumentError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
