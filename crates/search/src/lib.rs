//! Rule evaluation against the language server: query translation, result normalization, the
//! per-rule execution engine and the end-to-end analysis run.

mod engine;
mod error;
pub mod normalize;
pub mod query;
mod report;
mod runner;

pub use engine::{
    CommandExecutor, Engine, EngineOptions, EngineState, MergeStrategy, DEFAULT_COMMAND,
};
pub use error::{EngineError, Result};
pub use normalize::{normalize, Normalized};
pub use query::{to_query_params, AnalysisMode, QueryParams};
pub use report::{AnalysisReport, MigrationTask, RunOutcome, DEFAULT_REPORT_TITLE};
pub use runner::{initialize_params, load, preflight, run_analysis, AnalysisConfig, SHUTDOWN_TIMEOUT};
