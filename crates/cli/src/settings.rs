//! Analyzer configuration: CLI flags and environment (both resolved by clap), an optional TOML
//! file, then built-in defaults, in that order of precedence.

use anyhow::{Context, Result};
use migrator_lsp::LaunchConfig;
use migrator_search::{AnalysisConfig, EngineOptions, MergeStrategy, DEFAULT_COMMAND};
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RULES_PATH: &str = "./rules";
pub const DEFAULT_JDT_LS_PATH: &str = "./jdt/konveyor-jdtls";
pub const DEFAULT_JDT_WORKSPACE: &str = "./jdt";
pub const DEFAULT_INIT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_STARTUP_GRACE_MS: u64 = 2000;

/// One partially-filled layer of settings. Both the TOML file and the command line produce one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsLayer {
    pub app_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub jdt_ls_path: Option<PathBuf>,
    pub jdt_workspace: Option<PathBuf>,
    pub ls_command: Option<String>,
    pub java_home: Option<PathBuf>,
    pub init_timeout_secs: Option<u64>,
    pub startup_grace_ms: Option<u64>,
    pub command_timeout_secs: Option<u64>,
    pub merge: Option<String>,
    pub recursive: Option<bool>,
}

impl SettingsLayer {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Fills every unset field of `self` from `lower`.
    pub fn or(self, lower: SettingsLayer) -> SettingsLayer {
        SettingsLayer {
            app_path: self.app_path.or(lower.app_path),
            rules_path: self.rules_path.or(lower.rules_path),
            jdt_ls_path: self.jdt_ls_path.or(lower.jdt_ls_path),
            jdt_workspace: self.jdt_workspace.or(lower.jdt_workspace),
            ls_command: self.ls_command.or(lower.ls_command),
            java_home: self.java_home.or(lower.java_home),
            init_timeout_secs: self.init_timeout_secs.or(lower.init_timeout_secs),
            startup_grace_ms: self.startup_grace_ms.or(lower.startup_grace_ms),
            command_timeout_secs: self.command_timeout_secs.or(lower.command_timeout_secs),
            merge: self.merge.or(lower.merge),
            recursive: self.recursive.or(lower.recursive),
        }
    }
}

/// Fully resolved settings. Every path is absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerSettings {
    pub app_path: PathBuf,
    pub rules_path: PathBuf,
    pub jdt_ls_path: PathBuf,
    pub jdt_workspace: PathBuf,
    pub ls_command: String,
    pub java_home: Option<PathBuf>,
    pub init_timeout: Duration,
    pub startup_grace: Duration,
    pub command_timeout: Option<Duration>,
    pub merge: MergeStrategy,
    pub recursive: bool,
}

impl AnalyzerSettings {
    pub fn resolve(layer: SettingsLayer, cwd: &Path) -> Result<Self> {
        let app_path = layer
            .app_path
            .context("Path to the project to scan is missing")?;
        let merge = match layer.merge.as_deref() {
            Some(raw) => raw.parse::<MergeStrategy>().map_err(anyhow::Error::msg)?,
            None => MergeStrategy::default(),
        };
        let or_default = |value: Option<PathBuf>, default: &str| {
            absolutize(cwd, &value.unwrap_or_else(|| PathBuf::from(default)))
        };

        Ok(Self {
            app_path: absolutize(cwd, &app_path),
            rules_path: or_default(layer.rules_path, DEFAULT_RULES_PATH),
            jdt_ls_path: or_default(layer.jdt_ls_path, DEFAULT_JDT_LS_PATH),
            jdt_workspace: or_default(layer.jdt_workspace, DEFAULT_JDT_WORKSPACE),
            ls_command: layer
                .ls_command
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            java_home: layer
                .java_home
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| absolutize(cwd, &p)),
            init_timeout: Duration::from_secs(
                layer.init_timeout_secs.unwrap_or(DEFAULT_INIT_TIMEOUT_SECS),
            ),
            startup_grace: Duration::from_millis(
                layer.startup_grace_ms.unwrap_or(DEFAULT_STARTUP_GRACE_MS),
            ),
            command_timeout: layer.command_timeout_secs.map(Duration::from_secs),
            merge,
            recursive: layer.recursive.unwrap_or(true),
        })
    }

    pub fn log_summary(&self) {
        log::info!("Project path: {}", self.app_path.display());
        log::info!("Rules path: {}", self.rules_path.display());
        log::info!("JDT-LS path: {}", self.jdt_ls_path.display());
        log::info!("JDT workspace: {}", self.jdt_workspace.display());
        log::info!("LS command: {}", self.ls_command);
        log::debug!(
            "Merge: {}, recursive: {}, init timeout: {:?}",
            self.merge,
            self.recursive,
            self.init_timeout
        );
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        let mut launch = LaunchConfig::new(&self.jdt_ls_path, &self.jdt_workspace);
        launch.java_home = self.java_home.clone();
        launch.startup_grace = self.startup_grace;

        let mut config = AnalysisConfig::new(self.app_path.clone(), self.rules_path.clone(), launch);
        config.recursive = self.recursive;
        config.init_timeout = self.init_timeout;
        config.engine = EngineOptions {
            command: self.ls_command.clone(),
            merge: self.merge,
            command_timeout: self.command_timeout,
        };
        config
    }
}

/// Joins `path` onto `cwd` when relative and folds `.`/`..` lexically (no filesystem access, so
/// paths that do not exist yet still resolve).
pub fn absolutize(cwd: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn absolutize_folds_dots() {
        let cwd = Path::new("/work/dir");
        assert_eq!(absolutize(cwd, Path::new("./rules")), PathBuf::from("/work/dir/rules"));
        assert_eq!(absolutize(cwd, Path::new("../jdt")), PathBuf::from("/work/jdt"));
        assert_eq!(absolutize(cwd, Path::new("/abs/x/./y")), PathBuf::from("/abs/x/y"));
    }

    #[test]
    fn defaults_fill_everything_but_app_path() {
        let cwd = Path::new("/w");
        let err = AnalyzerSettings::resolve(SettingsLayer::default(), cwd).expect_err("missing app");
        assert!(err.to_string().contains("project to scan"));

        let settings = AnalyzerSettings::resolve(
            SettingsLayer {
                app_path: Some(PathBuf::from("app")),
                ..Default::default()
            },
            cwd,
        )
        .expect("resolve");
        assert_eq!(settings.app_path, PathBuf::from("/w/app"));
        assert_eq!(settings.rules_path, PathBuf::from("/w/rules"));
        assert_eq!(settings.jdt_ls_path, PathBuf::from("/w/jdt/konveyor-jdtls"));
        assert_eq!(settings.jdt_workspace, PathBuf::from("/w/jdt"));
        assert_eq!(settings.ls_command, DEFAULT_COMMAND);
        assert_eq!(settings.init_timeout, Duration::from_secs(30));
        assert_eq!(settings.merge, MergeStrategy::Combine);
        assert!(settings.recursive);
        assert_eq!(settings.command_timeout, None);
    }

    #[test]
    fn upper_layer_wins_and_file_fills_gaps() {
        let temp = TempDir::new().expect("tempdir");
        let file = temp.path().join("migrator.toml");
        std::fs::write(
            &file,
            "app_path = \"/from/file\"\nls_command = \"io.konveyor.tackle.ruleEntry\"\nmerge = \"overwrite\"\nrecursive = false\n",
        )
        .expect("write");

        let cli = SettingsLayer {
            app_path: Some(PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let merged = cli.or(SettingsLayer::from_toml_file(&file).expect("parse"));
        let settings = AnalyzerSettings::resolve(merged, Path::new("/w")).expect("resolve");
        assert_eq!(settings.app_path, PathBuf::from("/from/cli"));
        assert_eq!(settings.ls_command, "io.konveyor.tackle.ruleEntry");
        assert_eq!(settings.merge, MergeStrategy::Overwrite);
        assert!(!settings.recursive);

        let config = settings.analysis_config();
        assert_eq!(config.engine.command, "io.konveyor.tackle.ruleEntry");
        assert!(!config.recursive);
    }

    #[test]
    fn unknown_keys_and_bad_merge_are_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let file = temp.path().join("bad.toml");
        std::fs::write(&file, "rules = \"./r\"\n").expect("write");
        assert!(SettingsLayer::from_toml_file(&file).is_err());

        let layer = SettingsLayer {
            app_path: Some(PathBuf::from("/a")),
            merge: Some("union".to_string()),
            ..Default::default()
        };
        assert!(AnalyzerSettings::resolve(layer, Path::new("/")).is_err());
    }
}
