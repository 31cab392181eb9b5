use crate::engine::{Engine, EngineOptions};
use crate::error::{EngineError, Result};
use crate::report::RunOutcome;
use migrator_lsp::{
    BackendProcess, Connection, LaunchConfig, LoggingClient, TerminateOnDrop,
    DEFAULT_INIT_TIMEOUT,
};
use migrator_protocol::{file_uri, ClientInfo, InitializeParams};
use migrator_rules::{Rule, RuleLoader};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything one analysis run needs. Paths are expected to be absolute already.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub app_path: PathBuf,
    pub rules_path: PathBuf,
    pub recursive: bool,
    pub launch: LaunchConfig,
    pub engine: EngineOptions,
    pub init_timeout: Duration,
}

impl AnalysisConfig {
    pub fn new(app_path: PathBuf, rules_path: PathBuf, launch: LaunchConfig) -> Self {
        Self {
            app_path,
            rules_path,
            recursive: true,
            launch,
            engine: EngineOptions::default(),
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

/// The target must be a Maven project directory. A `pom.xml` without Spring Boot only warns.
pub fn preflight(app_path: &Path) -> Result<()> {
    if !app_path.exists() {
        return Err(EngineError::ProjectNotFound(app_path.to_path_buf()));
    }
    if !app_path.is_dir() {
        return Err(EngineError::ProjectNotADirectory(app_path.to_path_buf()));
    }
    let pom = app_path.join("pom.xml");
    if !pom.is_file() {
        return Err(EngineError::NotAMavenProject(app_path.to_path_buf()));
    }
    let content = std::fs::read_to_string(&pom)?;
    log::info!("Maven project detected");
    if content.contains("spring-boot") {
        log::info!("Spring Boot dependencies found");
    } else {
        log::warn!("This doesn't appear to be a Spring Boot project");
    }
    Ok(())
}

pub fn load(config: &AnalysisConfig) -> Result<Vec<Rule>> {
    let loaded = RuleLoader::new(&config.rules_path)
        .recursive(config.recursive)
        .load()?;
    if !loaded.skipped.is_empty() {
        log::warn!(
            "Skipped {} malformed rule file(s) under {}",
            loaded.skipped.len(),
            config.rules_path.display()
        );
    }
    log::info!(
        "Loaded {} rule(s) from {}",
        loaded.rules.len(),
        config.rules_path.display()
    );
    Ok(loaded.rules)
}

pub fn initialize_params(config: &AnalysisConfig) -> InitializeParams {
    let bundle = config.launch.bundle_path();
    log::debug!("Bundle path is {}", bundle.display());
    InitializeParams {
        process_id: Some(std::process::id()),
        root_uri: Some(file_uri(&config.app_path)),
        capabilities: json!({}),
        initialization_options: Some(json!({ "bundles": [bundle.display().to_string()] })),
        client_info: Some(ClientInfo {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    }
}

/// Pre-flight, load, launch, handshake, evaluate, tear down.
///
/// The backend is terminated on every path once it has been started, including handshake
/// failures and early returns.
pub async fn run_analysis(config: &AnalysisConfig) -> Result<RunOutcome> {
    preflight(&config.app_path)?;
    let rules = load(config)?;
    if rules.is_empty() {
        log::warn!("No rules found, nothing to analyze");
        return Ok(RunOutcome::default());
    }

    log::info!(
        "Starting analysis of {} with command '{}'",
        config.app_path.display(),
        config.engine.command
    );
    let mut backend = TerminateOnDrop::new(BackendProcess::launch(&config.launch).await?);
    let (stdout, stdin) = backend.take_stdio().ok_or(EngineError::MissingStdio)?;

    let connection = Connection::new(stdout, stdin, Arc::new(LoggingClient));
    log::info!("Connecting to the language server");
    let session = connection
        .initialize(initialize_params(config), config.init_timeout)
        .await?;

    let outcome = {
        let mut engine = Engine::new(&session, &*backend, config.engine.clone());
        engine.run_all(&rules).await
    };
    log::info!(
        "Analysis finished: {} rule(s), {} match(es){}",
        outcome.tasks.len(),
        outcome.match_count(),
        if outcome.aborted { ", aborted" } else { "" }
    );

    session.shutdown(SHUTDOWN_TIMEOUT).await;
    drop(backend);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn preflight_requires_maven_project() {
        let temp = TempDir::new().expect("tempdir");
        let missing = temp.path().join("nope");
        assert!(matches!(
            preflight(&missing),
            Err(EngineError::ProjectNotFound(_))
        ));
        assert!(matches!(
            preflight(temp.path()),
            Err(EngineError::NotAMavenProject(_))
        ));

        std::fs::write(temp.path().join("pom.xml"), "<project/>").expect("pom");
        preflight(temp.path()).expect("plain maven project only warns");

        let file = temp.path().join("pom.xml");
        assert!(matches!(
            preflight(&file),
            Err(EngineError::ProjectNotADirectory(_))
        ));
    }

    #[tokio::test]
    async fn empty_rule_set_skips_launch() {
        let temp = TempDir::new().expect("tempdir");
        let app = temp.path().join("app");
        let rules = temp.path().join("rules");
        std::fs::create_dir_all(&app).expect("app");
        std::fs::create_dir_all(&rules).expect("rules");
        std::fs::write(app.join("pom.xml"), "spring-boot").expect("pom");

        // The install dir does not exist, so reaching the launcher would fail.
        let launch = LaunchConfig::new(temp.path().join("no-jdtls"), temp.path().join("ws"));
        let config = AnalysisConfig::new(app, rules, launch);
        let outcome = run_analysis(&config).await.expect("empty run");
        assert!(outcome.tasks.is_empty());
        assert!(!outcome.aborted);
    }

    #[tokio::test]
    async fn missing_rules_dir_is_fatal_before_launch() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("pom.xml"), "spring-boot").expect("pom");
        let launch = LaunchConfig::new(temp.path().join("no-jdtls"), temp.path().join("ws"));
        let config = AnalysisConfig::new(
            temp.path().to_path_buf(),
            temp.path().join("missing-rules"),
            launch,
        );
        assert!(matches!(
            run_analysis(&config).await,
            Err(EngineError::Rules(_))
        ));
    }

    #[test]
    fn initialize_params_carry_bundle_and_root_uri() {
        let launch = LaunchConfig::new("/opt/jdtls", "/tmp/ws");
        let config = AnalysisConfig::new(PathBuf::from("/work/app"), PathBuf::from("/r"), launch);
        let params = initialize_params(&config);
        assert_eq!(params.root_uri.as_deref(), Some("file:///work/app"));
        let bundles = params
            .initialization_options
            .as_ref()
            .and_then(|o| o.get("bundles"))
            .and_then(|b| b.as_array())
            .cloned()
            .unwrap_or_default();
        assert_eq!(bundles.len(), 1);
        assert!(bundles[0]
            .as_str()
            .is_some_and(|b| b.ends_with("java-analyzer-bundle.core-1.0.0-SNAPSHOT.jar")));
    }
}
