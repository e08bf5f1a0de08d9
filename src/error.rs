use thiserror::Error;

/// Main error type for Bracecov operations
#[derive(Error, Debug)]
pub enum BracecovError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Coverage dump format error: {0}")]
    DumpFormat(String),
}

pub type Result<T> = std::result::Result<T, BracecovError>;
