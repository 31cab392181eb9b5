use chrono::{DateTime, Local, SecondsFormat};
use migrator_protocol::SymbolMatch;
use migrator_rules::Rule;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_REPORT_TITLE: &str = "Migration Analysis Report";

/// One rule paired with what the backend found for it. Lives only as long as reporting does.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MigrationTask {
    pub rule: Rule,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<SymbolMatch>,
}

impl MigrationTask {
    pub fn new(rule: Rule, results: Vec<SymbolMatch>) -> Self {
        Self { rule, results }
    }

    pub fn rule_id(&self) -> &str {
        &self.rule.rule_id
    }
}

/// What an analysis run hands to reporting: tasks in rule load order plus run bookkeeping.
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub tasks: Vec<MigrationTask>,
    /// Rules that were never dispatched because the backend died.
    pub skipped: Vec<String>,
    pub aborted: bool,
}

impl RunOutcome {
    pub fn match_count(&self) -> usize {
        self.tasks.iter().map(|t| t.results.len()).sum()
    }

    /// `ruleID -> task`. A duplicated id keeps the last task.
    pub fn into_map(self) -> BTreeMap<String, MigrationTask> {
        self.tasks
            .into_iter()
            .map(|task| (task.rule.rule_id.clone(), task))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub title: String,
    pub project_path: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub migration_tasks: BTreeMap<String, MigrationTask>,
}

impl AnalysisReport {
    pub fn new(project_path: &Path, outcome: RunOutcome) -> Self {
        Self::at(project_path, outcome, Local::now())
    }

    pub fn at(project_path: &Path, outcome: RunOutcome, when: DateTime<Local>) -> Self {
        Self {
            title: DEFAULT_REPORT_TITLE.to_string(),
            project_path: project_path.display().to_string(),
            timestamp: when.to_rfc3339_opts(SecondsFormat::Secs, false),
            migration_tasks: outcome.into_map(),
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
