//! V8 runtime for one-shot evaluations
//!
//! Every call to [`V8Runtime::execute`] builds a fresh isolate with a heap
//! limit, runs a list of prelude scripts, then the main script, and tears the
//! isolate down. A watchdog thread terminates the isolate once the time budget
//! is spent, so an infinite loop in evaluated code ends as
//! [`ScriptOutcome::Terminated`] instead of hanging the worker thread.

#![warn(clippy::all, rust_2018_idioms)]

use anyhow::{anyhow, Result};
use std::pin::pin;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use super::console::{register_console, ConsoleCapture, ConsoleLine};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Maximum heap size in bytes (default: 128MB)
    pub max_heap_size_bytes: usize,

    /// Wall-clock budget for prelude plus main script (default: 5 seconds)
    pub timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_heap_size_bytes: 128 * 1024 * 1024,
            timeout: Duration::from_secs(5),
        }
    }
}

/// A script evaluated before the main script
#[derive(Debug, Clone)]
pub struct PreludeScript {
    pub name: String,
    pub source: std::sync::Arc<String>,
    /// A failing required script aborts the run with an error; others are noted
    pub required: bool,
}

impl PreludeScript {
    pub fn required(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: std::sync::Arc::new(source.into()),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, source: std::sync::Arc<String>) -> Self {
        Self {
            name: name.into(),
            source,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// Completion value; strings verbatim, everything else JSON encoded
    Completed(String),
    /// Uncaught exception, as `String(exception)`
    Threw(String),
    /// Killed by the watchdog
    Terminated,
}

#[derive(Debug, Clone)]
pub struct RealmRun {
    pub outcome: ScriptOutcome,
    pub console: Vec<ConsoleLine>,
    /// Optional prelude scripts that threw, with their messages
    pub prelude_failures: Vec<String>,
    pub execution_time_ms: u64,
}

pub struct V8Runtime {
    config: RuntimeConfig,
}

impl V8Runtime {
    pub fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run `prelude` in order, then `code`, in a fresh isolate.
    ///
    /// Blocking; call from `spawn_blocking` in async contexts.
    pub fn execute(&self, prelude: &[PreludeScript], code: &str) -> Result<RealmRun> {
        let start_time = Instant::now();

        // Declared before the isolate so it is dropped after it
        let capture = ConsoleCapture::new();

        let params = v8::CreateParams::default().heap_limits(0, self.config.max_heap_size_bytes);
        let mut isolate = v8::Isolate::new(params);

        let isolate_handle = isolate.thread_safe_handle();
        let timeout = self.config.timeout;
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let watchdog = thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) = done_rx.recv_timeout(timeout) {
                isolate_handle.terminate_execution();
            }
        });

        let mut prelude_failures = Vec::new();
        let outcome = {
            let scope = pin!(v8::HandleScope::new(&mut isolate));
            let scope = &mut scope.init();
            let context = v8::Context::new(scope, Default::default());
            let scope = &mut v8::ContextScope::new(scope, context);

            // The capture outlives the isolate, see declaration order above
            unsafe { register_console(scope, &capture) };

            let mut outcome = None;
            for script in prelude {
                match run_script(scope, &script.source) {
                    ScriptOutcome::Completed(_) => {}
                    ScriptOutcome::Terminated => {
                        outcome = Some(ScriptOutcome::Terminated);
                        break;
                    }
                    ScriptOutcome::Threw(message) if script.required => {
                        let _ = done_tx.send(());
                        let _ = watchdog.join();
                        return Err(anyhow!("Prelude script '{}' failed: {}", script.name, message));
                    }
                    ScriptOutcome::Threw(message) => {
                        log_warn!("Prelude script '{}' threw: {}", script.name, message);
                        prelude_failures.push(format!("{}: {}", script.name, message));
                    }
                }
            }

            outcome.unwrap_or_else(|| run_script(scope, code))
        };

        let _ = done_tx.send(());
        let _ = watchdog.join();

        Ok(RealmRun {
            outcome,
            console: capture.lines(),
            prelude_failures,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }
}

impl Default for V8Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Compile and run one script under its own TryCatch
fn run_script(
    scope: &mut v8::ContextScope<'_, '_, v8::HandleScope<'_>>,
    source: &str,
) -> ScriptOutcome {
    let Some(code) = v8::String::new(scope, source) else {
        return ScriptOutcome::Threw("Source is too large for a V8 string".to_string());
    };

    let scope = pin!(v8::TryCatch::new(scope));
    let scope = &mut scope.init();

    let result = match v8::Script::compile(scope, code, None) {
        Some(script) => script.run(scope),
        None => None,
    };

    let Some(value) = result else {
        if scope.has_terminated() {
            return ScriptOutcome::Terminated;
        }
        let message = match scope.exception() {
            Some(exception) => match exception.to_string(scope) {
                Some(text) => text.to_rust_string_lossy(scope),
                None => "Unknown JavaScript exception".to_string(),
            },
            None => "Unknown JavaScript exception".to_string(),
        };
        return ScriptOutcome::Threw(message);
    };

    if value.is_string() {
        let text = match value.to_string(scope) {
            Some(text) => text.to_rust_string_lossy(scope),
            None => String::new(),
        };
        return ScriptOutcome::Completed(text);
    }

    // JSON keeps objects readable; fall back to toString() for BigInt and cycles
    let text = match v8::json::stringify(scope, value) {
        Some(json) => json.to_rust_string_lossy(scope),
        None => match value.to_string(scope) {
            Some(text) => text.to_rust_string_lossy(scope),
            None => String::new(),
        },
    };
    ScriptOutcome::Completed(text)
}
