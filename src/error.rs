use std::path::PathBuf;
use thiserror::Error;

/// Main error type for callmap operations
#[derive(Error, Debug)]
pub enum CallMapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parser error: {0}")]
    Parser(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    /// A call site whose shape the classifier refuses to guess about
    #[error("Unsupported call shape in {file} at line {line}: {message}")]
    InputShape {
        file: PathBuf,
        line: usize,
        message: String,
    },

    /// Source text extraction was asked for a range the code does not contain
    #[error("Missing source context: {0}")]
    MissingContext(String),

    #[error("No call graph entries in {0}")]
    EmptyGraph(PathBuf),

    #[error("Analysis of {path} exceeded {millis} ms")]
    Timeout { path: PathBuf, millis: u64 },
}

pub type Result<T> = std::result::Result<T, CallMapError>;
