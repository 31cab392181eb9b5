//! Backend plumbing for the migrator: starting the language server, framing JSON-RPC over its
//! stdio, and the initialize-then-serve session the search engine talks to.

mod client;
mod error;
pub mod framing;
mod launcher;
mod session;

pub use client::{LanguageClient, LoggingClient};
pub use error::{LaunchError, SessionError};
pub use launcher::{
    platform_config_dir, BackendHandle, BackendProcess, LaunchConfig, LaunchPlan, TerminateOnDrop,
    DEFAULT_STARTUP_GRACE, LAUNCHER_JAR_PREFIX,
};
pub use session::{Connection, Session, DEFAULT_INIT_TIMEOUT};
