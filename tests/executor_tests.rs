use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use pretty_assertions::assert_eq;

use codecell::config::{Config, ToolchainProfile};
use codecell::{ExecutionRequest, Executor, Outcome};

// Global counter to ensure unique scratch roots per test
static TEST_DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

fn test_scratch_root() -> PathBuf {
    let id = TEST_DIR_COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!("codecell-test-{}-{id}", std::process::id()))
}

/// Interpreted-from-source profile: runs the snippet with `sh`
fn shell_profile(timeout_seconds: u64) -> ToolchainProfile {
    ToolchainProfile {
        name: "sh".to_string(),
        file_extension: ".sh".to_string(),
        entry_point: "main".to_string(),
        compile_command: None,
        run_command: vec!["sh".to_string(), "%INPUT%".to_string()],
        timeout_seconds,
        compile_timeout_seconds: 30,
    }
}

/// Two-step profile: "compiles" by copying the source to the entry stem,
/// then runs the produced artifact. Exercises the full pipeline without
/// requiring a real compiler on the test host.
fn copy_compile_profile() -> ToolchainProfile {
    ToolchainProfile {
        name: "shc".to_string(),
        file_extension: ".sh".to_string(),
        entry_point: "main".to_string(),
        compile_command: Some(vec![
            "cp".to_string(),
            "%INPUT%".to_string(),
            "%OUTPUT%".to_string(),
        ]),
        run_command: vec!["sh".to_string(), "%OUTPUT%".to_string()],
        timeout_seconds: 5,
        compile_timeout_seconds: 30,
    }
}

fn build_executor(
    toolchains: Vec<ToolchainProfile>,
    scratch_root: &PathBuf,
    surface_partial_output: bool,
) -> Executor {
    let config = Config {
        scratch_root: Some(scratch_root.clone()),
        surface_partial_output,
        script_timeout_seconds: 5,
        toolchains,
    };
    Executor::new(config).expect("Failed to initialize executor")
}

fn request(language: &str, source_code: &str) -> ExecutionRequest {
    ExecutionRequest {
        source_code: source_code.to_string(),
        language: language.to_string(),
    }
}

fn assert_scratch_empty(scratch_root: &PathBuf) {
    let leftovers: Vec<_> = std::fs::read_dir(scratch_root)
        .expect("scratch root should exist")
        .map(|e| e.unwrap().path())
        .collect();
    assert!(leftovers.is_empty(), "leaked workspaces: {leftovers:?}");
}

#[tokio::test]
async fn run_success_captures_stdout() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(5)], &root, false);

    let result = executor.execute(request("sh", "echo 42")).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.output.trim(), "42");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn empty_output_on_zero_exit_is_success() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(5)], &root, false);

    let result = executor.execute(request("sh", "true")).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.output, "");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn compile_step_then_run_step() {
    let root = test_scratch_root();
    let executor = build_executor(vec![copy_compile_profile()], &root, false);

    let result = executor.execute(request("shc", "echo compiled")).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.output.trim(), "compiled");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn compile_failure_is_terminal() {
    let root = test_scratch_root();
    let marker = std::env::temp_dir().join(format!(
        "codecell-marker-{}-{}",
        std::process::id(),
        TEST_DIR_COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    let profile = ToolchainProfile {
        name: "broken".to_string(),
        file_extension: ".src".to_string(),
        entry_point: "main".to_string(),
        compile_command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo 'syntax error near line 1' >&2; exit 1".to_string(),
        ]),
        // Would leave a marker behind if the run step were ever attempted
        run_command: vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("touch {}", marker.display()),
        ],
        timeout_seconds: 5,
        compile_timeout_seconds: 30,
    };
    let executor = build_executor(vec![profile], &root, false);

    let result = executor.execute(request("broken", "whatever")).await;

    assert_eq!(result.outcome, Outcome::CompileError);
    assert!(
        result.output.contains("syntax error"),
        "missing compiler diagnostic: {}",
        result.output
    );
    assert!(!marker.exists(), "run step executed after a compile failure");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn runtime_error_reports_stderr() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(5)], &root, false);

    let result = executor.execute(request("sh", "echo bad >&2; exit 3")).await;

    assert_eq!(result.outcome, Outcome::RuntimeError);
    assert_eq!(result.output.trim(), "bad");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn runtime_error_falls_back_to_stdout() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(5)], &root, false);

    let result = executor.execute(request("sh", "echo oops; exit 1")).await;

    assert_eq!(result.outcome, Outcome::RuntimeError);
    assert_eq!(result.output.trim(), "oops");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn deadline_expiry_kills_the_run() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(1)], &root, false);

    let started = Instant::now();
    let result = executor.execute(request("sh", "sleep 30")).await;
    let elapsed = started.elapsed();

    assert_eq!(result.outcome, Outcome::Timeout);
    assert_eq!(result.output, "execution timed out");
    assert!(
        elapsed.as_secs() < 5,
        "timeout not enforced promptly: {elapsed:?}"
    );
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn compile_deadline_expiry_is_a_timeout() {
    let root = test_scratch_root();
    let marker = std::env::temp_dir().join(format!(
        "codecell-marker-{}-{}",
        std::process::id(),
        TEST_DIR_COUNTER.fetch_add(1, Ordering::SeqCst)
    ));
    let profile = ToolchainProfile {
        name: "slowc".to_string(),
        file_extension: ".src".to_string(),
        entry_point: "main".to_string(),
        compile_command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            "sleep 30".to_string(),
        ]),
        // Would leave a marker behind if the run step were ever attempted
        run_command: vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("touch {}", marker.display()),
        ],
        timeout_seconds: 5,
        compile_timeout_seconds: 1,
    };
    let executor = build_executor(vec![profile], &root, false);

    let started = Instant::now();
    let result = executor.execute(request("slowc", "whatever")).await;
    let elapsed = started.elapsed();

    assert_eq!(result.outcome, Outcome::Timeout);
    assert_eq!(result.output, "compilation timed out");
    assert!(
        elapsed.as_secs() < 5,
        "compile timeout not enforced promptly: {elapsed:?}"
    );
    assert!(!marker.exists(), "run step executed after a compile timeout");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn unspawnable_run_command_is_an_internal_error() {
    let root = test_scratch_root();
    let profile = ToolchainProfile {
        name: "ghost".to_string(),
        file_extension: ".src".to_string(),
        entry_point: "main".to_string(),
        compile_command: None,
        run_command: vec!["/nonexistent/definitely-not-here".to_string()],
        timeout_seconds: 5,
        compile_timeout_seconds: 30,
    };
    let executor = build_executor(vec![profile], &root, false);

    let result = executor.execute(request("ghost", "whatever")).await;

    assert_eq!(result.outcome, Outcome::InternalError);
    assert!(
        result.output.contains("failed to spawn"),
        "missing spawn diagnostic: {}",
        result.output
    );
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn partial_output_is_surfaced_when_configured() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(1)], &root, true);

    let result = executor.execute(request("sh", "echo partial; sleep 30")).await;

    assert_eq!(result.outcome, Outcome::Timeout);
    assert_eq!(result.output.trim(), "partial");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn unsupported_language_touches_nothing() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(5)], &root, false);

    let result = executor.execute(request("ruby", "puts 1")).await;

    assert_eq!(result.outcome, Outcome::UnsupportedLanguage);
    assert!(result.output.contains("ruby"));
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn concurrent_executions_are_isolated() {
    let root = test_scratch_root();
    let executor = build_executor(vec![shell_profile(5)], &root, false);

    let (one, two) = tokio::join!(
        executor.execute(request("sh", "echo one")),
        executor.execute(request("sh", "echo two")),
    );

    assert_eq!(one.outcome, Outcome::Success);
    assert_eq!(two.outcome, Outcome::Success);
    assert_eq!(one.output.trim(), "one");
    assert_eq!(two.output.trim(), "two");
    assert_scratch_empty(&root);
}

#[tokio::test]
async fn embedded_script_through_the_boundary() {
    let root = test_scratch_root();
    let executor = build_executor(vec![], &root, false);

    let result = executor.execute(request("rhai", "21 * 2")).await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.output, "42");
}

#[tokio::test]
async fn restricted_script_through_the_boundary() {
    let root = test_scratch_root();
    let executor = build_executor(vec![], &root, false);

    let result = executor
        .execute(request("rhai-restricted", r#"print("hi")"#))
        .await;

    assert_eq!(result.outcome, Outcome::Success);
    assert_eq!(result.output.trim(), "hi");
}
