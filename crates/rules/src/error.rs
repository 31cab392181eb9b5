use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RulesError>;

#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Rules directory does not exist: {0}")]
    MissingDirectory(PathBuf),

    #[error("Rules path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid rule file {path}: {message}")]
    InvalidFile { path: PathBuf, message: String },
}
