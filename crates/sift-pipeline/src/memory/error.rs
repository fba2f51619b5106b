use std::fmt;

#[derive(Debug)]
pub enum MemoryError {
    InvalidFilter(String),
    InvalidPipeline(String),
    UnknownStage(String),
    Storage(String),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
            MemoryError::InvalidPipeline(msg) => write!(f, "invalid pipeline: {msg}"),
            MemoryError::UnknownStage(stage) => write!(f, "unsupported stage: {stage}"),
            MemoryError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for MemoryError {}
