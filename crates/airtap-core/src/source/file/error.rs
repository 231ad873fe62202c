use std::fmt;

use thiserror::Error;

/// Failure while reading a saved capture file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("cannot read capture file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed capture file while {stage}: {message}")]
    Malformed { stage: Stage, message: String },
}

/// Point in the file where decoding failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Opening,
    Header,
    Packets,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Opening => "opening",
            Stage::Header => "reading the header",
            Stage::Packets => "reading packets",
        })
    }
}

impl FileError {
    pub(crate) fn malformed(stage: Stage, message: impl Into<String>) -> Self {
        FileError::Malformed {
            stage,
            message: message.into(),
        }
    }
}
