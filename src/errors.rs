// src/errors.rs
use thiserror::Error;

use crate::models::Reason;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to read file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to run objective: server returned status code {status}")]
    Status { status: u16 },

    #[error("Error prior to running: {}", .0.message)]
    Prerun(Reason),

    #[error("Malformed JSON record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Record is not valid UTF-8")]
    Utf8,

    #[error("Unexpected record structure: {0}")]
    InvalidRecord(String),

    #[error("Unknown verdict code {0}")]
    UnknownVerdict(i64),
}

impl WatchError {
    /// Non-200 status or a network-level failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, WatchError::Request(_) | WatchError::Status { .. })
    }

    /// Protocol corruption: the stream can no longer be trusted.
    pub fn is_decode(&self) -> bool {
        matches!(
            self,
            WatchError::Json(_)
                | WatchError::Utf8
                | WatchError::InvalidRecord(_)
                | WatchError::UnknownVerdict(_)
        )
    }

    /// The server's rejection reason, if the run was refused before queueing.
    pub fn reason(&self) -> Option<&Reason> {
        match self {
            WatchError::Prerun(reason) => Some(reason),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, WatchError>;
