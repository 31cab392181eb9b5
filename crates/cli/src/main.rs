use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use migrator_cli::{render_rules, render_table, AnalyzerSettings, SettingsLayer};
use migrator_rules::RuleLoader;
use migrator_search::{run_analysis, AnalysisReport};
use std::env;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "migrator")]
#[command(about = "Rule-driven migration analysis of Java projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every rule against a project through the language server
    Analyze(AnalyzeArgs),

    /// Load a rules directory and list what it contains
    Rules(RulesArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the project to analyze
    #[arg(env = "MIGRATOR_APP_PATH")]
    app_path: Option<PathBuf>,

    /// Rules directory
    #[arg(long = "rules", env = "MIGRATOR_RULES_PATH")]
    rules_path: Option<PathBuf>,

    /// JDT-LS installation directory
    #[arg(long, env = "MIGRATOR_JDT_LS_PATH")]
    jdt_ls_path: Option<PathBuf>,

    /// Directory that holds the language server workspace
    #[arg(long, env = "MIGRATOR_JDT_WORKSPACE")]
    jdt_workspace: Option<PathBuf>,

    /// Command sent through workspace/executeCommand for every query
    #[arg(long, env = "MIGRATOR_LS_COMMAND")]
    ls_command: Option<String>,

    /// Java installation used to run the language server
    #[arg(long, env = "JAVA_HOME")]
    java_home: Option<PathBuf>,

    /// Seconds to wait for the initialize handshake
    #[arg(long = "init-timeout")]
    init_timeout_secs: Option<u64>,

    /// Milliseconds to wait before checking the server did not exit on startup
    #[arg(long = "startup-grace")]
    startup_grace_ms: Option<u64>,

    /// Per-command timeout in seconds (default: none)
    #[arg(long = "command-timeout")]
    command_timeout_secs: Option<u64>,

    /// How or/and condition results are merged: combine | overwrite
    #[arg(long)]
    merge: Option<String>,

    /// Only scan the top level of the rules directory
    #[arg(long)]
    no_recursive: bool,

    /// TOML file with default settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Write the report to a file instead of stdout
    #[arg(long)]
    output_file: Option<PathBuf>,
}

impl AnalyzeArgs {
    fn layer(&self) -> SettingsLayer {
        SettingsLayer {
            app_path: self.app_path.clone(),
            rules_path: self.rules_path.clone(),
            jdt_ls_path: self.jdt_ls_path.clone(),
            jdt_workspace: self.jdt_workspace.clone(),
            ls_command: self.ls_command.clone(),
            java_home: self.java_home.clone(),
            init_timeout_secs: self.init_timeout_secs,
            startup_grace_ms: self.startup_grace_ms,
            command_timeout_secs: self.command_timeout_secs,
            merge: self.merge.clone(),
            recursive: self.no_recursive.then_some(false),
        }
    }
}

#[derive(Args)]
struct RulesArgs {
    /// Rules directory
    #[arg(env = "MIGRATOR_RULES_PATH", default_value = migrator_cli::settings::DEFAULT_RULES_PATH)]
    path: PathBuf,

    /// Only scan the top level of the rules directory
    #[arg(long)]
    no_recursive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if env::var_os("RUST_LOG").is_none() {
        if cli.quiet {
            builder.filter_level(log::LevelFilter::Warn);
        } else if cli.verbose {
            builder.filter_level(log::LevelFilter::Debug);
        }
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Analyze(args) => analyze(args).await,
        Commands::Rules(args) => list_rules(args),
    }
}

async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let cwd = env::current_dir().context("Failed to determine current directory")?;
    let file_layer = match &args.config {
        Some(path) => SettingsLayer::from_toml_file(path)?,
        None => SettingsLayer::default(),
    };
    let settings = AnalyzerSettings::resolve(args.layer().or(file_layer), &cwd)?;
    settings.log_summary();

    let outcome = run_analysis(&settings.analysis_config())
        .await
        .context("Analysis failed")?;
    let aborted = outcome.aborted;
    let skipped = outcome.skipped.len();

    let rendered = match args.output {
        OutputFormat::Text => format!(
            "\n=== Code Analysis Results ===\n{}",
            render_table(&outcome.tasks)
        ),
        OutputFormat::Json => {
            let report = AnalysisReport::new(&settings.app_path, outcome);
            let mut json = report.to_json_pretty().context("Failed to serialize report")?;
            json.push('\n');
            json
        }
    };

    match &args.output_file {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            log::info!("Report written to {}", path.display());
        }
        None => print!("{rendered}"),
    }

    if aborted {
        anyhow::bail!(
            "Language server became unavailable during analysis; {skipped} rule(s) were not run"
        );
    }
    Ok(())
}

fn list_rules(args: RulesArgs) -> Result<()> {
    let cwd = env::current_dir().context("Failed to determine current directory")?;
    let root = migrator_cli::absolutize(&cwd, &args.path);
    let loaded = RuleLoader::new(&root)
        .recursive(!args.no_recursive)
        .load()
        .with_context(|| format!("Failed to load rules from {}", root.display()))?;

    print!("{}", render_rules(&loaded.rules));
    for skipped in &loaded.skipped {
        log::warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    log::info!(
        "{} rule(s), {} file(s) skipped",
        loaded.rules.len(),
        loaded.skipped.len()
    );
    Ok(())
}
