//! Error types for quest template configuration

use qreward_core::QuestError;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("line {line}: expected `key = value`, found `{content}`")]
    InvalidLine { line: usize, content: String },

    #[error("line {line}: invalid reward declaration: {message}")]
    InvalidReward { line: usize, message: String },

    #[error("line {line}: duplicate key `{key}`")]
    DuplicateKey { line: usize, key: String },

    #[error("missing required key `{0}`")]
    MissingKey(&'static str),

    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<ConfigError>,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Line the error points at, if any
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::InvalidLine { line, .. }
            | ConfigError::InvalidReward { line, .. }
            | ConfigError::DuplicateKey { line, .. } => Some(*line),
            ConfigError::File { source, .. } => source.line(),
            ConfigError::MissingKey(_) | ConfigError::Io { .. } => None,
        }
    }
}

impl From<ConfigError> for QuestError {
    fn from(err: ConfigError) -> Self {
        QuestError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
