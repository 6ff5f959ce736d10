use std::time::Duration;

use rhai::{Dynamic, Engine};

use super::{CONFIRMATION_MESSAGE, arm_deadline, fault_to_result};
use crate::executor::{ExecutionResult, Outcome};

/// Evaluates a snippet on a boxed full-featured interpreter.
///
/// A fresh default engine per call with no host state registered: the
/// embedding boundary is the sandbox, so scripts cannot reach the host's
/// memory, filesystem or network. No compilation step, no workspace.
pub fn evaluate(code: &str, budget: Duration) -> ExecutionResult {
    let mut engine = Engine::new();
    arm_deadline(&mut engine, budget);

    match engine.eval::<Dynamic>(code) {
        Ok(value) => {
            let rendered = if value.is::<()>() {
                CONFIRMATION_MESSAGE.to_string()
            } else {
                value.to_string()
            };
            ExecutionResult::new(Outcome::Success, rendered)
        }
        Err(e) => {
            log::debug!("embedded evaluation fault: {e}");
            fault_to_result(e)
        }
    }
}
