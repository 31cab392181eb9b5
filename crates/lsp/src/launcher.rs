use crate::error::LaunchError;
use std::ffi::OsString;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

pub const LAUNCHER_JAR_PREFIX: &str = "org.eclipse.equinox.launcher_";
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(2);

const BUNDLE_JAR: &str = "java-analyzer-bundle.core-1.0.0-SNAPSHOT.jar";

/// Name of the per-platform configuration directory inside the server install.
///
/// `os` is matched case-insensitively as a substring; mac is checked first because "darwin"
/// contains "win".
pub fn platform_config_dir(os: &str) -> &'static str {
    let os = os.to_ascii_lowercase();
    if os.contains("mac") || os.contains("darwin") {
        "config_mac_arm"
    } else if os.contains("win") {
        "config_win"
    } else {
        "config_linux"
    }
}

#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub install_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub java_home: Option<PathBuf>,
    pub os: String,
    pub startup_grace: Duration,
}

impl LaunchConfig {
    pub fn new(install_dir: impl Into<PathBuf>, workspace_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_dir: install_dir.into(),
            workspace_dir: workspace_dir.into(),
            java_home: None,
            os: std::env::consts::OS.to_string(),
            startup_grace: DEFAULT_STARTUP_GRACE,
        }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.install_dir.join(platform_config_dir(&self.os))
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.install_dir.join("plugins")
    }

    /// Server-side extension bundle passed through `initializationOptions.bundles`.
    pub fn bundle_path(&self) -> PathBuf {
        self.install_dir
            .join("java-analyzer-bundle")
            .join("java-analyzer-bundle.core")
            .join("target")
            .join(BUNDLE_JAR)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.workspace_dir.join(".jdt_workspace")
    }

    /// Exactly one `org.eclipse.equinox.launcher_*.jar` must exist under `plugins/`.
    pub fn find_launcher(&self) -> Result<PathBuf, LaunchError> {
        let dir = self.plugins_dir();
        if !dir.is_dir() {
            return Err(LaunchError::MissingPluginsDir(dir));
        }
        let mut candidates: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.file_name().and_then(|n| n.to_str()).is_some_and(|name| {
                        name.starts_with(LAUNCHER_JAR_PREFIX) && name.ends_with(".jar")
                    })
            })
            .collect();
        candidates.sort();
        match candidates.len() {
            0 => Err(LaunchError::LauncherNotFound {
                dir,
                prefix: LAUNCHER_JAR_PREFIX.to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(LaunchError::AmbiguousLauncher { dir, candidates }),
        }
    }

    /// Validates the install layout and builds the full command line.
    pub fn resolve(&self) -> Result<LaunchPlan, LaunchError> {
        let config_dir = self.config_dir();
        if !config_dir.is_dir() {
            return Err(LaunchError::MissingConfigDir(config_dir));
        }
        let launcher = self.find_launcher()?;

        let program = match &self.java_home {
            Some(home) => home.join("bin").join("java"),
            None => PathBuf::from("java"),
        };

        let mut args: Vec<OsString> = [
            "-Declipse.application=org.eclipse.jdt.ls.core.id1",
            "-Dosgi.bundles.defaultStartLevel=4",
            "-Dosgi.checkConfiguration=true",
            "-Dosgi.sharedConfiguration.area.readOnly=true",
            "-Dosgi.configuration.cascaded=true",
            "-Declipse.product=org.eclipse.jdt.ls.core.product",
            "-Dlog.level=ALL",
            "-Djdt.ls.debug=true",
            "-noverify",
            "-Xmx1G",
            "--add-modules=ALL-SYSTEM",
            "--add-opens",
            "java.base/java.util=ALL-UNNAMED",
            "--add-opens",
            "java.base/java.lang=ALL-UNNAMED",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push("-jar".into());
        args.push(launcher.into_os_string());
        args.push("-configuration".into());
        args.push(config_dir.into_os_string());
        args.push("-data".into());
        args.push(self.data_dir().into_os_string());

        let envs = self
            .java_home
            .iter()
            .map(|home| (OsString::from("JAVA_HOME"), home.clone().into_os_string()))
            .collect();

        Ok(LaunchPlan {
            program: program.into_os_string(),
            args,
            envs,
        })
    }
}

/// A fully resolved command line. Kept separate from [`LaunchConfig`] so tests can spawn any
/// program through the same supervision path.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchPlan {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
}

impl LaunchPlan {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Liveness and termination of the backend, as seen by whoever owns it.
pub trait BackendHandle {
    fn is_alive(&self) -> bool;

    /// Idempotent: a second call is a no-op.
    fn terminate(&self);
}

pub struct BackendProcess {
    child: Mutex<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    pid: Option<u32>,
    terminated: AtomicBool,
}

impl BackendProcess {
    pub async fn launch(config: &LaunchConfig) -> Result<Self, LaunchError> {
        let plan = config.resolve()?;
        log::info!("Starting language server from {}", config.install_dir.display());
        log::debug!("Launch command: {:?} {:?}", plan.program, plan.args);
        let process = Self::spawn(&plan, config.startup_grace).await?;
        log::info!(
            "Language server started (pid {}), workspace {}",
            process.pid.map_or_else(|| "?".to_string(), |p| p.to_string()),
            config.data_dir().display()
        );
        Ok(process)
    }

    /// Spawns `plan` and waits `grace` to catch an immediate crash (bad JVM flags, missing java).
    pub async fn spawn(plan: &LaunchPlan, grace: Duration) -> Result<Self, LaunchError> {
        let mut child = plan.command().spawn().map_err(LaunchError::Spawn)?;
        let pid = child.id();

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!(target: "backend", "{line}");
                }
            });
        }

        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }
        if let Some(status) = child.try_wait()? {
            return Err(LaunchError::ExitedEarly(status));
        }

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            child: Mutex::new(child),
            pid,
            terminated: AtomicBool::new(false),
        })
    }

    /// Hands out the protocol pipes. Returns `None` on the second call.
    pub fn take_stdio(&mut self) -> Option<(ChildStdout, ChildStdin)> {
        Some((self.stdout.take()?, self.stdin.take()?))
    }
}

impl BackendHandle for BackendProcess {
    fn is_alive(&self) -> bool {
        if self.terminated.load(Ordering::SeqCst) {
            return false;
        }
        match self.child.lock() {
            Ok(mut child) => matches!(child.try_wait(), Ok(None)),
            Err(_) => false,
        }
    }

    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }
        let Ok(mut child) = self.child.lock() else {
            return;
        };
        match child.try_wait() {
            Ok(Some(status)) => log::debug!("Language server already exited ({status})"),
            _ => match child.start_kill() {
                Ok(()) => log::info!("Language server process terminated"),
                Err(err) => log::warn!("Failed to terminate language server: {err}"),
            },
        }
    }
}

/// Terminates the wrapped backend when dropped, on every exit path.
pub struct TerminateOnDrop<B: BackendHandle> {
    inner: B,
}

impl<B: BackendHandle> TerminateOnDrop<B> {
    pub fn new(inner: B) -> Self {
        Self { inner }
    }
}

impl<B: BackendHandle> Deref for TerminateOnDrop<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.inner
    }
}

impl<B: BackendHandle> DerefMut for TerminateOnDrop<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.inner
    }
}

impl<B: BackendHandle> Drop for TerminateOnDrop<B> {
    fn drop(&mut self) {
        self.inner.terminate();
    }
}
