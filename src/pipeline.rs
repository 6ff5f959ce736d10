use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::time::timeout;

use crate::config::ToolchainProfile;
use crate::executor::{ExecutionResult, Outcome};
use crate::workspace::Workspace;

const COMPILE_STDOUT: &str = "compile_stdout.txt";
const COMPILE_STDERR: &str = "compile_stderr.txt";
const RUN_STDOUT: &str = "run_stdout.txt";
const RUN_STDERR: &str = "run_stderr.txt";

/// Fixed message reported when a deadline expires
pub const TIMEOUT_MESSAGE: &str = "execution timed out";

/// How a bounded subprocess step ended
enum StepEnd {
    Exited(std::process::ExitStatus),
    Deadline,
}

/// Compiles and runs one snippet under `profile` in a fresh workspace.
///
/// Total: every failure mode folds into an `ExecutionResult`. The workspace
/// drops on every return path, which releases the directory and all
/// toolchain artifacts inside it.
pub async fn compile_and_run(
    profile: &ToolchainProfile,
    source_code: &str,
    scratch_root: &Path,
    surface_partial_output: bool,
) -> ExecutionResult {
    let workspace = match Workspace::create(scratch_root) {
        Ok(workspace) => workspace,
        Err(e) => {
            log::error!("workspace allocation failed: {e:#}");
            return ExecutionResult::new(Outcome::InternalError, format!("{e:#}"));
        }
    };

    if let Err(e) = workspace.write_source(&profile.source_file_name(), source_code) {
        log::error!("source materialization failed: {e:#}");
        return ExecutionResult::new(Outcome::InternalError, format!("{e:#}"));
    }

    if let Some(compile_command) = &profile.compile_command {
        let compile_deadline = Duration::from_secs(profile.compile_timeout_seconds);
        match run_step(
            compile_command,
            profile,
            &workspace,
            COMPILE_STDOUT,
            COMPILE_STDERR,
            compile_deadline,
        )
        .await
        {
            // Warnings on a zero-exit compile are discarded
            Ok(StepEnd::Exited(status)) if status.success() => {}
            Ok(StepEnd::Exited(_)) => {
                // Terminal: the run step is never attempted
                return ExecutionResult::new(
                    Outcome::CompileError,
                    diagnostics(&workspace, COMPILE_STDERR, COMPILE_STDOUT),
                );
            }
            Ok(StepEnd::Deadline) => {
                return ExecutionResult::new(Outcome::Timeout, "compilation timed out");
            }
            Err(e) => {
                log::error!("compile step failed for '{}': {e:#}", profile.name);
                return ExecutionResult::new(Outcome::InternalError, format!("{e:#}"));
            }
        }
    }

    let run_deadline = Duration::from_secs(profile.timeout_seconds);
    match run_step(
        &profile.run_command,
        profile,
        &workspace,
        RUN_STDOUT,
        RUN_STDERR,
        run_deadline,
    )
    .await
    {
        Ok(StepEnd::Exited(status)) if status.success() => {
            // Empty output on a zero exit is still a success
            ExecutionResult::new(Outcome::Success, workspace.read_capture(RUN_STDOUT))
        }
        Ok(StepEnd::Exited(_)) => ExecutionResult::new(
            Outcome::RuntimeError,
            diagnostics(&workspace, RUN_STDERR, RUN_STDOUT),
        ),
        Ok(StepEnd::Deadline) => {
            let output = if surface_partial_output {
                workspace.read_capture(RUN_STDOUT)
            } else {
                TIMEOUT_MESSAGE.to_string()
            };
            ExecutionResult::new(Outcome::Timeout, output)
        }
        Err(e) => {
            log::error!("run step failed for '{}': {e:#}", profile.name);
            ExecutionResult::new(Outcome::InternalError, format!("{e:#}"))
        }
    }
}

/// Runs one templated subprocess step with the workspace as working
/// directory, stdout/stderr redirected to files inside it, bounded by
/// `deadline`. Deadline expiry kills the whole process group before
/// returning, so no runaway process outlives the request.
async fn run_step(
    template: &[String],
    profile: &ToolchainProfile,
    workspace: &Workspace,
    stdout_name: &str,
    stderr_name: &str,
    deadline: Duration,
) -> Result<StepEnd> {
    let command = apply_template(template, profile);
    if command.is_empty() {
        bail!("empty command for toolchain '{}'", profile.name);
    }

    let stdout_file = fs::File::create(workspace.path().join(stdout_name))?;
    let stderr_file = fs::File::create(workspace.path().join(stderr_name))?;

    let mut cmd = tokio::process::Command::new(&command[0]);
    cmd.args(&command[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file))
        .stderr(Stdio::from(stderr_file))
        .current_dir(workspace.path());
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn '{}'", command[0]))?;

    match timeout(deadline, child.wait()).await {
        Ok(status) => Ok(StepEnd::Exited(status?)),
        Err(_) => {
            kill_process_tree(&mut child);
            // Reap so the killed child does not linger as a zombie
            let _ = child.wait().await;
            Ok(StepEnd::Deadline)
        }
    }
}

/// Kills a timed-out child and everything it spawned.
///
/// The child was started as its own process group leader, so signalling the
/// group takes down grandchildren too.
#[cfg(unix)]
fn kill_process_tree(child: &mut tokio::process::Child) {
    match child.id() {
        Some(pid) => unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        },
        None => {
            if let Err(e) = child.start_kill() {
                log::warn!("failed to kill timed-out process: {e}");
            }
        }
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut tokio::process::Child) {
    if let Err(e) = child.start_kill() {
        log::warn!("failed to kill timed-out process: {e}");
    }
}

/// Captured stderr, falling back to stdout when stderr came back empty
fn diagnostics(workspace: &Workspace, primary: &str, fallback: &str) -> String {
    let text = workspace.read_capture(primary);
    if text.trim().is_empty() {
        workspace.read_capture(fallback)
    } else {
        text
    }
}

/// Applies `%INPUT%`/`%OUTPUT%` substitutions to a command template
fn apply_template(template: &[String], profile: &ToolchainProfile) -> Vec<String> {
    let source_name = profile.source_file_name();
    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%INPUT%", &source_name);
    mapping.insert("%OUTPUT%", &profile.entry_point);

    template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}
