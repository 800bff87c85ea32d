use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArcturusError {
    #[error("Tileserver binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("Tileserver config not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Failed to spawn {}: {source}", .binary.display())]
    SpawnFailed {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    StyleNotFound(String),

    #[error("Map id not found: {0}")]
    MapNotFound(String),

    #[error("Invalid tileserver config: {0}")]
    InvalidConfig(String),

    #[error("Invalid style document: {0}")]
    InvalidStyle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ArcturusError {
    /// True for the precondition and lookup failures that surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ArcturusError::BinaryNotFound(_)
                | ArcturusError::ConfigNotFound(_)
                | ArcturusError::StyleNotFound(_)
                | ArcturusError::MapNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ArcturusError>;
