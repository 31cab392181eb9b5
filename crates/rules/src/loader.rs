use crate::error::{Result, RulesError};
use crate::model::Rule;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const RULE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// A rule file that could not be decoded. The rest of the directory still loads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedRules {
    pub rules: Vec<Rule>,
    pub skipped: Vec<SkippedFile>,
}

/// Loads rule definitions from a directory of YAML files.
///
/// Each file may hold a single rule, a list of rules, or several YAML documents of either form.
/// Files are visited in file-name order so the resulting rule order is stable across runs.
pub struct RuleLoader {
    root: PathBuf,
    recursive: bool,
}

impl RuleLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            recursive: true,
        }
    }

    /// Only scan direct children of the root when `false`.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn load(&self) -> Result<LoadedRules> {
        if !self.root.exists() {
            return Err(RulesError::MissingDirectory(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(RulesError::NotADirectory(self.root.clone()));
        }

        log::debug!(
            "Parsing YAML rules from folder: {} (recursive: {})",
            self.root.display(),
            self.recursive
        );

        let mut walker = WalkDir::new(&self.root).sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut loaded = LoadedRules::default();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("Failed to read entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_rule_file(entry.path()) {
                continue;
            }

            match parse_rule_file(entry.path()) {
                Ok(rules) => {
                    log::debug!(
                        "Successfully parsed {} rules from: {}",
                        rules.len(),
                        entry.path().display()
                    );
                    loaded.rules.extend(rules);
                }
                Err(err) => {
                    log::warn!(
                        "Failed to parse rules from file: {} - {err}",
                        entry.path().display()
                    );
                    loaded.skipped.push(SkippedFile {
                        path: entry.path().to_path_buf(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        log::debug!(
            "Parsed {} rules from folder: {} ({} files skipped)",
            loaded.rules.len(),
            self.root.display(),
            loaded.skipped.len()
        );
        Ok(loaded)
    }
}

/// Recursively loads every rule under `root`, skipping malformed files.
pub fn load_rules(root: impl AsRef<Path>) -> Result<Vec<Rule>> {
    RuleLoader::new(root).load().map(|loaded| loaded.rules)
}

fn is_rule_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            RULE_EXTENSIONS
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
}

fn parse_rule_file(path: &Path) -> Result<Vec<Rule>> {
    let content = std::fs::read_to_string(path)?;
    let invalid = |message: String| RulesError::InvalidFile {
        path: path.to_path_buf(),
        message,
    };

    let mut rules = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&content) {
        let value = serde_yaml::Value::deserialize(document).map_err(|e| invalid(e.to_string()))?;
        match value {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Sequence(_) => {
                let batch: Vec<Rule> =
                    serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?;
                rules.extend(batch);
            }
            serde_yaml::Value::Mapping(_) => {
                let rule: Rule =
                    serde_yaml::from_value(value).map_err(|e| invalid(e.to_string()))?;
                rules.push(rule);
            }
            other => {
                return Err(invalid(format!(
                    "expected a rule or a list of rules, found {}",
                    yaml_kind(&other)
                )))
            }
        }
    }
    Ok(rules)
}

fn yaml_kind(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}
