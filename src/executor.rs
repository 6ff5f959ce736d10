use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;

use crate::config::Config;
use crate::evaluate;
use crate::pipeline;
use crate::registry::{Registry, Strategy};

/// One snippet submitted for execution, owned by a single call
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language: String,
}

/// Classified result of one execution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    CompileError,
    RuntimeError,
    Timeout,
    InternalError,
    UnsupportedLanguage,
}

/// The uniform value returned to the caller: captured output or a
/// human-readable diagnostic, produced exactly once per request.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub outcome: Outcome,
    pub output: String,
}

impl ExecutionResult {
    pub fn new(outcome: Outcome, output: impl Into<String>) -> Self {
        Self {
            outcome,
            output: output.into(),
        }
    }
}

/// The harness boundary: resolves a strategy for each request and drives it
/// to a structured result.
///
/// Holds only read-only state, so one `Executor` serves concurrent callers
/// without locking; each compiled execution gets its own workspace.
pub struct Executor {
    registry: Registry,
    scratch_root: PathBuf,
    script_timeout: Duration,
    surface_partial_output: bool,
}

impl Executor {
    pub fn new(config: Config) -> Result<Self> {
        let scratch_root = match config.scratch_root {
            Some(path) => path,
            None => default_scratch_root()?,
        };
        std::fs::create_dir_all(&scratch_root).with_context(|| {
            format!("failed to create scratch root {}", scratch_root.display())
        })?;
        log::info!("executor ready, scratch root at {}", scratch_root.display());

        Ok(Self {
            registry: Registry::from_profiles(config.toolchains),
            scratch_root,
            script_timeout: Duration::from_secs(config.script_timeout_seconds),
            surface_partial_output: config.surface_partial_output,
        })
    }

    /// Sole boundary operation. Total: every failure below this point is
    /// converted into a structured result, nothing propagates to the caller.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionResult {
        let Some(strategy) = self.registry.resolve(&request.language) else {
            // No workspace, no subprocess: the request never leaves this fn
            return ExecutionResult::new(
                Outcome::UnsupportedLanguage,
                format!("unsupported language: {}", request.language),
            );
        };

        match strategy {
            Strategy::Restricted => {
                self.run_script(request.source_code, evaluate::restricted::evaluate)
                    .await
            }
            Strategy::Embedded => {
                self.run_script(request.source_code, evaluate::embedded::evaluate)
                    .await
            }
            Strategy::Compiled(profile) => {
                pipeline::compile_and_run(
                    profile,
                    &request.source_code,
                    &self.scratch_root,
                    self.surface_partial_output,
                )
                .await
            }
        }
    }

    /// Runs a script evaluator off the async runtime; a long cooperative
    /// deadline must not stall other executions.
    async fn run_script(
        &self,
        source_code: String,
        evaluate: fn(&str, Duration) -> ExecutionResult,
    ) -> ExecutionResult {
        let budget = self.script_timeout;
        match tokio::task::spawn_blocking(move || evaluate(&source_code, budget)).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("script evaluation task failed: {e}");
                ExecutionResult::new(
                    Outcome::InternalError,
                    format!("evaluation task failed: {e}"),
                )
            }
        }
    }
}

fn default_scratch_root() -> Result<PathBuf> {
    use directories::ProjectDirs;

    let proj_dirs = ProjectDirs::from("", "", "codecell")
        .ok_or_else(|| anyhow!("Unable to find user directory"))?;

    Ok(proj_dirs.cache_dir().join("workspaces"))
}
