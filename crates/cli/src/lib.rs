//! Front end for the migrator: configuration layering and report rendering, shared by the
//! `migrator` binary and its tests.

pub mod report;
pub mod settings;

pub use report::{render_rules, render_table};
pub use settings::{absolutize, AnalyzerSettings, SettingsLayer};
