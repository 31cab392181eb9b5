use crate::error::{EngineError, Result};
use crate::normalize::normalize;
use crate::query::to_query_params;
use crate::report::{MigrationTask, RunOutcome};
use async_trait::async_trait;
use migrator_lsp::{BackendHandle, Session, SessionError};
use migrator_protocol::SymbolMatch;
use migrator_rules::{location_name, JavaReferenced, Rule, When};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_COMMAND: &str = "java.project.getAll";

/// The one channel the engine queries through.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, command: &str, arguments: Vec<Value>) -> std::result::Result<Value, SessionError>;

    /// False once the channel can no longer carry requests.
    fn is_open(&self) -> bool {
        true
    }
}

#[async_trait]
impl CommandExecutor for Session {
    async fn execute(&self, command: &str, arguments: Vec<Value>) -> std::result::Result<Value, SessionError> {
        self.execute_command(command, arguments).await
    }

    fn is_open(&self) -> bool {
        !self.is_closed()
    }
}

/// How the per-condition results of an `or`/`and` rule are folded into one list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// `or`: union of all matches. `and`: concatenation when every condition matched, else empty.
    #[default]
    Combine,
    /// Each condition replaces the previous result; the last one wins.
    Overwrite,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Combine => "combine",
            MergeStrategy::Overwrite => "overwrite",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combine" => Ok(MergeStrategy::Combine),
            "overwrite" => Ok(MergeStrategy::Overwrite),
            other => Err(format!(
                "unknown merge strategy '{other}' (expected 'combine' or 'overwrite')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    NotStarted,
    SessionReady,
    Dispatching,
    Awaiting,
    Merged,
    Done,
    Aborted,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub command: String,
    pub merge: MergeStrategy,
    /// Per-call bound. `None` waits as long as the backend takes.
    pub command_timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            merge: MergeStrategy::default(),
            command_timeout: None,
        }
    }
}

/// Evaluates rules one at a time against a ready session.
///
/// Conditions run in declaration order and rules in the order given. A failed call only empties
/// that condition's result; a dead backend or a lost connection aborts the rest of the run.
pub struct Engine<'a, E: ?Sized, B: ?Sized> {
    executor: &'a E,
    backend: &'a B,
    options: EngineOptions,
    state: EngineState,
}

impl<'a, E, B> Engine<'a, E, B>
where
    E: CommandExecutor + ?Sized,
    B: BackendHandle + ?Sized,
{
    pub fn new(executor: &'a E, backend: &'a B, options: EngineOptions) -> Self {
        Self {
            executor,
            backend,
            options,
            state: EngineState::NotStarted,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Runs one rule and pairs it with its matches.
    ///
    /// Fails when the backend is not running or its connection is gone. The engine then moves to
    /// [`EngineState::Aborted`] and dispatches nothing further.
    pub async fn run_rule(&mut self, rule: &Rule) -> Result<MigrationTask> {
        if self.state == EngineState::NotStarted {
            self.state = EngineState::SessionReady;
        }
        if !self.backend.is_alive() {
            self.state = EngineState::Aborted;
            log::error!(
                "Language server is not running; rule '{}' will not be dispatched",
                rule.rule_id
            );
            return Err(EngineError::BackendDied {
                rule_id: rule.rule_id.clone(),
            });
        }
        if self.state == EngineState::Aborted || !self.executor.is_open() {
            self.state = EngineState::Aborted;
            log::error!(
                "Language server connection is closed; rule '{}' will not be dispatched",
                rule.rule_id
            );
            return Err(EngineError::SessionLost {
                rule_id: rule.rule_id.clone(),
            });
        }

        let bound = rule.with_command(self.options.command.as_str());
        log_plan(&bound);

        let leaves = bound.when.referenced_leaves();
        if leaves.is_empty() {
            log::warn!("Rule {} has no valid java.referenced conditions", bound.rule_id);
        }

        self.state = EngineState::Dispatching;
        let mut per_condition = Vec::with_capacity(leaves.len());
        for (idx, leaf) in leaves.iter().enumerate() {
            let matches = self.evaluate(&bound, idx, leaf).await?;
            per_condition.push(matches);
            self.state = EngineState::Dispatching;
        }

        let results = merge(&bound.when, per_condition, self.options.merge);
        self.state = EngineState::Merged;
        log::info!(
            "Rule {}: {} match(es)",
            bound.rule_id,
            results.len()
        );
        Ok(MigrationTask::new(rule.clone(), results))
    }

    /// Runs every rule in order. After an abort the remaining rules are recorded as skipped and
    /// the tasks gathered so far are returned.
    pub async fn run_all(&mut self, rules: &[Rule]) -> RunOutcome {
        let mut outcome = RunOutcome::default();
        for (idx, rule) in rules.iter().enumerate() {
            match self.run_rule(rule).await {
                Ok(task) => outcome.tasks.push(task),
                Err(err) => {
                    let remaining: Vec<String> =
                        rules[idx..].iter().map(|r| r.rule_id.clone()).collect();
                    log::error!(
                        "{err}. Skipping {} remaining rule(s)",
                        remaining.len()
                    );
                    outcome.skipped = remaining;
                    outcome.aborted = true;
                    return outcome;
                }
            }
        }
        self.state = EngineState::Done;
        outcome
    }

    async fn evaluate(
        &mut self,
        rule: &Rule,
        idx: usize,
        leaf: &JavaReferenced,
    ) -> Result<Vec<SymbolMatch>> {
        let params = to_query_params(leaf);
        let command = rule.ls_cmd.as_deref().unwrap_or(DEFAULT_COMMAND);
        log::debug!(
            "Sending '{command}' for rule {} condition {idx}: {}",
            rule.rule_id,
            params.to_value()
        );

        self.state = EngineState::Awaiting;
        let call = self.executor.execute(command, vec![params.to_value()]);
        let response = match self.options.command_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(response) => response,
                Err(_) => Err(SessionError::RequestTimeout {
                    method: command.to_string(),
                    timeout,
                }),
            },
            None => call.await,
        };

        match response {
            Ok(raw) => {
                let matches = normalize(&raw);
                if matches.is_empty() {
                    log::debug!("No symbols for rule {} condition {idx}", rule.rule_id);
                } else {
                    log::info!(
                        "Found {} usage(s) of symbol: {}, name: {}",
                        matches.len(),
                        location_name(&params.location),
                        params.query
                    );
                    for m in &matches {
                        log::debug!(
                            "Found {} at line {}, char: {} - {} within the file: {}",
                            m.name,
                            m.location.range.start.line + 1,
                            m.location.range.start.character,
                            m.location.range.end.character,
                            m.location.uri
                        );
                    }
                }
                Ok(matches)
            }
            Err(err) => {
                if !self.backend.is_alive() {
                    self.state = EngineState::Aborted;
                    log::error!(
                        "Language server died while evaluating rule {}: {err}",
                        rule.rule_id
                    );
                    return Err(EngineError::BackendDied {
                        rule_id: rule.rule_id.clone(),
                    });
                }
                if err.is_fatal() || !self.executor.is_open() {
                    self.state = EngineState::Aborted;
                    log::error!(
                        "Lost the language server connection while evaluating rule {}: {err}",
                        rule.rule_id
                    );
                    return Err(EngineError::SessionLost {
                        rule_id: rule.rule_id.clone(),
                    });
                }
                log::warn!(
                    "Error executing command for rule {} condition {idx}: {err}",
                    rule.rule_id
                );
                Ok(Vec::new())
            }
        }
    }
}

fn log_plan(rule: &Rule) {
    match &rule.when {
        When::Single(leaf) => log::info!(
            "Rule {}: single java.referenced {} {}",
            rule.rule_id,
            leaf.location,
            leaf.pattern
        ),
        When::Any(conditions) | When::All(conditions) => {
            let op = if matches!(rule.when, When::Any(_)) { "OR" } else { "AND" };
            log::info!(
                "Rule {}: {op} between {} condition(s)",
                rule.rule_id,
                conditions.len()
            );
            for (i, condition) in conditions.iter().enumerate() {
                match &condition.java_referenced {
                    Some(leaf) => log::info!("  {op}[{i}] {} {}", leaf.location, leaf.pattern),
                    None => log::debug!("  {op}[{i}] has no java.referenced leaf, not evaluated"),
                }
                if condition.java_dependency.is_some() {
                    log::debug!("  {op}[{i}] java.dependency is not evaluated");
                }
                let modifiers = condition.modifiers();
                if !modifiers.is_empty() {
                    log::debug!("  {op}[{i}] ignoring modifiers: {}", modifiers.join(", "));
                }
            }
        }
    }
    if let Some(message) = &rule.message {
        log::debug!("Rule {} message: {}", rule.rule_id, message.trim());
    }
    log::debug!("Rule {} effort: {}", rule.rule_id, rule.effort);
}

fn dedup_concat(lists: Vec<Vec<SymbolMatch>>) -> Vec<SymbolMatch> {
    let mut seen = HashSet::new();
    lists
        .into_iter()
        .flatten()
        .filter(|m| seen.insert(m.clone()))
        .collect()
}

fn merge(when: &When, per_condition: Vec<Vec<SymbolMatch>>, strategy: MergeStrategy) -> Vec<SymbolMatch> {
    match strategy {
        MergeStrategy::Overwrite => per_condition.into_iter().last().unwrap_or_default(),
        MergeStrategy::Combine => match when {
            When::Single(_) | When::Any(_) => dedup_concat(per_condition),
            When::All(_) => {
                if !per_condition.is_empty() && per_condition.iter().all(|l| !l.is_empty()) {
                    dedup_concat(per_condition)
                } else {
                    Vec::new()
                }
            }
        },
    }
}
