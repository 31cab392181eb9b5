use migrator_protocol::ResponseError;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Failures before or while starting the backend process.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Language server config directory does not exist: {0}")]
    MissingConfigDir(PathBuf),

    #[error("Language server plugins directory does not exist: {0}")]
    MissingPluginsDir(PathBuf),

    #[error("No launcher jar matching '{prefix}*' found in {dir}")]
    LauncherNotFound { dir: PathBuf, prefix: String },

    #[error("Multiple launcher jars found in {dir}: {candidates:?}")]
    AmbiguousLauncher {
        dir: PathBuf,
        candidates: Vec<PathBuf>,
    },

    #[error("Failed to start language server process: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Language server process exited immediately after starting ({0})")]
    ExitedEarly(ExitStatus),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Language server did not answer `initialize` within {0:?}")]
    InitializeTimeout(Duration),

    #[error("Malformed `initialize` response: {0}")]
    MalformedInitialize(#[source] serde_json::Error),

    #[error("Request `{method}` failed: {error}")]
    Rpc {
        method: String,
        error: ResponseError,
    },

    #[error("Request `{method}` timed out after {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },

    #[error("Language server connection closed")]
    Closed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SessionError {
    /// True when the connection itself is gone and no later request can succeed.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Closed | SessionError::IoError(_))
    }
}
