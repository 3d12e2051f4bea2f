// SPDX-FileCopyrightText: 2026 Plugvisor Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs external plugins as supervised child processes.
//!
//! Configuration reaches the child only through a per-instance file whose
//! path is substituted into the argument template. A supervisor task owns
//! each `Child`, publishes its exit on a `watch` channel, and performs the
//! force-kill when asked.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use plugvisor_core::PlugvisorError;
use plugvisor_plugin::{ConfigurationValidator, PluginDefinition};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};

/// How a plugin process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, or `None` when the process was ended by a signal or its
    /// status could not be collected.
    pub code: Option<i32>,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "process exited with code {code}"),
            None => write!(f, "process terminated without an exit code"),
        }
    }
}

/// A running (or just exited) plugin process.
///
/// Dropping the handle closes the supervisor's kill channel, which kills the
/// process.
pub struct ProcessHandle {
    plugin_id: String,
    instance_id: String,
    pid: Option<u32>,
    config_path: PathBuf,
    kill_tx: mpsc::Sender<()>,
    exit_rx: watch::Receiver<Option<ExitOutcome>>,
}

impl ProcessHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// The ephemeral configuration file passed to the process.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// A receiver that yields the exit outcome once the process is gone.
    pub fn exit_receiver(&self) -> watch::Receiver<Option<ExitOutcome>> {
        self.exit_rx.clone()
    }

    /// The exit outcome, if the process has already exited.
    pub fn try_outcome(&self) -> Option<ExitOutcome> {
        *self.exit_rx.borrow()
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> ExitOutcome {
        wait_for_exit(&mut self.exit_rx).await
    }

    /// Ask the supervisor to kill the process immediately.
    pub async fn kill(&self) {
        // The supervisor is gone once the process has exited.
        let _ = self.kill_tx.send(()).await;
    }
}

/// Wait on an exit channel until an outcome is published.
pub async fn wait_for_exit(rx: &mut watch::Receiver<Option<ExitOutcome>>) -> ExitOutcome {
    let published = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => *outcome,
        Err(_) => None,
    };
    published.unwrap_or(ExitOutcome { code: None })
}

/// Split an argument template into arguments.
///
/// Whitespace separates arguments; single or double quotes group text
/// (quotes themselves are removed). There are no escape sequences.
pub fn split_args(template: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in template.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_arg = true;
            }
            None if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            None => {
                current.push(c);
                in_arg = true;
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    args
}

/// Replace `{instanceId}`, `{configPath}` and `{workspaceId}` in each argument.
pub fn substitute_placeholders(
    args: Vec<String>,
    instance_id: &str,
    config_path: &Path,
    workspace_id: &str,
) -> Vec<String> {
    let config_path = config_path.display().to_string();
    args.into_iter()
        .map(|arg| {
            arg.replace("{instanceId}", instance_id)
                .replace("{configPath}", &config_path)
                .replace("{workspaceId}", workspace_id)
        })
        .collect()
}

/// Launches and stops external plugin processes.
pub struct ProcessPluginRunner {
    validator: Arc<ConfigurationValidator>,
    stop_timeout: Duration,
}

impl ProcessPluginRunner {
    pub fn new(validator: Arc<ConfigurationValidator>, stop_timeout: Duration) -> Self {
        Self {
            validator,
            stop_timeout,
        }
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// Write the configuration file and spawn the plugin process.
    ///
    /// The configuration file is removed again if the launch fails.
    pub async fn start(
        &self,
        definition: &PluginDefinition,
        instance_id: &str,
        workspace_id: &str,
        configuration: &str,
    ) -> Result<ProcessHandle, PlugvisorError> {
        let executable = definition
            .resolved_executable()
            .ok_or_else(|| PlugvisorError::LaunchFailure {
                plugin_id: definition.id.clone(),
                message: "manifest has no executable".to_string(),
                source: None,
            })?;

        let validator = Arc::clone(&self.validator);
        let (plugin_id, inst, doc) = (
            definition.id.clone(),
            instance_id.to_string(),
            configuration.to_string(),
        );
        let config_path = tokio::task::spawn_blocking(move || {
            validator.materialize_ephemeral_config(&plugin_id, &inst, &doc)
        })
        .await
        .map_err(|e| PlugvisorError::Internal(format!("config writer task failed: {e}")))??;

        let args = substitute_placeholders(
            split_args(definition.args_template.as_deref().unwrap_or_default()),
            instance_id,
            &config_path,
            workspace_id,
        );

        let mut child = match Command::new(&executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                self.remove_config(&config_path);
                return Err(PlugvisorError::LaunchFailure {
                    plugin_id: definition.id.clone(),
                    message: format!("failed to spawn {}: {e}", executable.display()),
                    source: Some(Box::new(e)),
                });
            }
        };

        let pid = child.id();
        tracing::info!(
            plugin_id = %definition.id,
            instance_id = %instance_id,
            pid = ?pid,
            executable = %executable.display(),
            ?args,
            "started plugin process"
        );

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(
                stdout,
                Stream::Stdout,
                definition.id.clone(),
                instance_id.to_string(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(
                stderr,
                Stream::Stderr,
                definition.id.clone(),
                instance_id.to_string(),
            ));
        }

        let (kill_tx, kill_rx) = mpsc::channel(1);
        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(supervise(
            child,
            kill_rx,
            exit_tx,
            definition.id.clone(),
            instance_id.to_string(),
        ));

        Ok(ProcessHandle {
            plugin_id: definition.id.clone(),
            instance_id: instance_id.to_string(),
            pid,
            config_path,
            kill_tx,
            exit_rx,
        })
    }

    /// Stop a plugin process: graceful request, bounded wait, then force-kill
    /// and wait for the OS to reap it. Removes the configuration file.
    pub async fn stop(&self, mut handle: ProcessHandle) -> Result<ExitOutcome, PlugvisorError> {
        let outcome = match handle.try_outcome() {
            Some(outcome) => outcome,
            None => {
                request_termination(&handle);
                match tokio::time::timeout(self.stop_timeout, handle.wait()).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::warn!(
                            plugin_id = %handle.plugin_id,
                            instance_id = %handle.instance_id,
                            timeout_secs = self.stop_timeout.as_secs(),
                            "plugin process did not exit in time, killing it"
                        );
                        handle.kill().await;
                        handle.wait().await
                    }
                }
            }
        };

        tracing::info!(
            plugin_id = %handle.plugin_id,
            instance_id = %handle.instance_id,
            code = ?outcome.code,
            "plugin process stopped"
        );
        self.remove_config(&handle.config_path);
        Ok(outcome)
    }

    /// Release what a process left behind after it exited on its own.
    pub fn cleanup_exited(&self, handle: ProcessHandle) {
        self.remove_config(&handle.config_path);
    }

    fn remove_config(&self, path: &Path) {
        if let Err(e) = self.validator.remove_ephemeral_config(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove ephemeral configuration");
        }
    }
}

#[cfg(unix)]
fn request_termination(handle: &ProcessHandle) {
    let Some(pid) = handle.pid else {
        return;
    };
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: kill(2) has no memory-safety preconditions; the pid belongs to
    // a child we have not reaped yet, so it cannot have been recycled.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc != 0 {
        tracing::debug!(
            instance_id = %handle.instance_id,
            error = %std::io::Error::last_os_error(),
            "SIGTERM delivery failed"
        );
    }
}

#[cfg(not(unix))]
fn request_termination(_handle: &ProcessHandle) {
    // No graceful request exists here; the timeout path force-kills.
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn forward_lines<R>(reader: R, stream: Stream, plugin_id: String, instance_id: String)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                Stream::Stdout => tracing::info!(%plugin_id, %instance_id, "{line}"),
                Stream::Stderr => tracing::error!(%plugin_id, %instance_id, "{line}"),
            },
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(%plugin_id, %instance_id, error = %e, "stopped reading plugin output");
                break;
            }
        }
    }
}

async fn supervise(
    mut child: Child,
    mut kill_rx: mpsc::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitOutcome>>,
    plugin_id: String,
    instance_id: String,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill_rx.recv() => {
            if let Err(e) = child.start_kill() {
                tracing::warn!(%plugin_id, %instance_id, error = %e, "failed to kill plugin process");
            }
            child.wait().await
        }
    };

    let outcome = match status {
        Ok(status) => ExitOutcome {
            code: status.code(),
        },
        Err(e) => {
            tracing::error!(%plugin_id, %instance_id, error = %e, "failed to wait for plugin process");
            ExitOutcome { code: None }
        }
    };
    tracing::debug!(%plugin_id, %instance_id, code = ?outcome.code, "plugin process exited");
    exit_tx.send_replace(Some(outcome));
}
