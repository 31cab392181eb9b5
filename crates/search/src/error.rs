use migrator_lsp::{LaunchError, SessionError};
use migrator_rules::RulesError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Project path of the application does not exist: {0}")]
    ProjectNotFound(PathBuf),

    #[error("Project path is not a directory: {0}")]
    ProjectNotADirectory(PathBuf),

    #[error("No pom.xml found in {0}. Only Maven projects are currently supported")]
    NotAMavenProject(PathBuf),

    #[error("Rules error: {0}")]
    Rules(#[from] RulesError),

    #[error("Launch error: {0}")]
    Launch(#[from] LaunchError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Language server stream is not available")]
    MissingStdio,

    #[error("Language server is no longer running; rule '{rule_id}' was not dispatched")]
    BackendDied { rule_id: String },

    #[error("Language server connection is no longer usable; rule '{rule_id}' was not completed")]
    SessionLost { rule_id: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
