//! In-process script evaluation strategies.
//!
//! Both strategies run on a fresh interpreter per request (no interpreter
//! state is shared between evaluations) and carry the same cooperative
//! deadline the compiled pipeline enforces on subprocesses.

pub mod embedded;
pub mod restricted;

use std::time::{Duration, Instant};

use rhai::{Dynamic, Engine, EvalAltResult};

use crate::executor::{ExecutionResult, Outcome};
use crate::pipeline::TIMEOUT_MESSAGE;

/// Reported when an evaluation succeeds without producing any text
pub const CONFIRMATION_MESSAGE: &str = "code executed successfully";

/// Installs a cooperative deadline on `engine`: the interpreter checks the
/// clock as it progresses and terminates the script once `budget` is spent.
fn arm_deadline(engine: &mut Engine, budget: Duration) {
    let deadline = Instant::now() + budget;
    engine.on_progress(move |_| {
        if Instant::now() >= deadline {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });
}

/// Folds an interpreter fault into a result: a deadline termination maps to
/// `Timeout`, everything else to `RuntimeError` with the fault text.
fn fault_to_result(err: Box<EvalAltResult>) -> ExecutionResult {
    if matches!(*err, EvalAltResult::ErrorTerminated(..)) {
        ExecutionResult::new(Outcome::Timeout, TIMEOUT_MESSAGE)
    } else {
        ExecutionResult::new(Outcome::RuntimeError, format!("Error: {err}"))
    }
}
