use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rhai::packages::{CorePackage, Package};
use rhai::{Engine, EvalAltResult};

use super::{CONFIRMATION_MESSAGE, arm_deadline, fault_to_result};
use crate::executor::{ExecutionResult, Outcome};

/// Evaluates a snippet against an allow-listed set of builtins.
///
/// The engine starts raw and only gains the core operators plus the helpers
/// registered below; filesystem, network, process and host-introspection
/// capabilities simply do not exist inside it. `print` output is captured
/// explicitly, so callers get the printed text back rather than losing it to
/// stdout.
pub fn evaluate(code: &str, budget: Duration) -> ExecutionResult {
    let printed = Arc::new(Mutex::new(String::new()));

    let mut engine = build_engine(printed.clone());
    arm_deadline(&mut engine, budget);

    match engine.run(code) {
        Ok(()) => {
            let captured = printed.lock().clone();
            if captured.is_empty() {
                ExecutionResult::new(Outcome::Success, CONFIRMATION_MESSAGE)
            } else {
                ExecutionResult::new(Outcome::Success, captured)
            }
        }
        Err(e) => {
            log::debug!("restricted evaluation fault: {e}");
            fault_to_result(e)
        }
    }
}

/// Builds a fresh allow-listed engine for one evaluation.
///
/// The allow-list is printing, length and the basic type constructors:
/// `print` (captured), `len`, `to_string`, `to_int`, `to_float`. List and
/// map construction needs no builtin — `[..]` and `#{..}` literals are part
/// of the language itself.
fn build_engine(printed: Arc<Mutex<String>>) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(CorePackage::new().as_shared_module());

    // The builtin allow-list: length, string/number conversions, print
    engine.register_fn("len", |s: &str| s.chars().count() as i64);
    engine.register_fn("len", |a: rhai::Array| a.len() as i64);
    engine.register_fn("to_string", |v: rhai::Dynamic| v.to_string());
    engine.register_fn("to_int", |s: &str| -> Result<i64, Box<EvalAltResult>> {
        s.trim()
            .parse()
            .map_err(|e| format!("to_int: {e}").into())
    });
    engine.register_fn("to_float", |s: &str| -> Result<f64, Box<EvalAltResult>> {
        s.trim()
            .parse()
            .map_err(|e| format!("to_float: {e}").into())
    });

    engine.on_print(move |text| {
        let mut buffer = printed.lock();
        buffer.push_str(text);
        buffer.push('\n');
    });

    engine
}
