//! `console.*` capture for evaluated code
//!
//! Generated components log freely. Output is captured per evaluation and
//! returned as diagnostics alongside the execution result; nothing reaches the
//! host's stdout.

#![warn(clippy::all, rust_2018_idioms)]

use serde::Serialize;
use std::cell::RefCell;

/// Lines kept per evaluation; later output is dropped
const MAX_CONSOLE_LINES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    /// Indexed by the const parameter of the bound callback
    const BY_INDEX: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }

    fn from_index(index: u8) -> Self {
        Self::BY_INDEX
            .get(index as usize)
            .copied()
            .unwrap_or(ConsoleLevel::Log)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleLine {
    pub level: ConsoleLevel,
    pub text: String,
}

/// Console output of one evaluation
#[derive(Debug, Default)]
pub struct ConsoleCapture {
    lines: RefCell<Vec<ConsoleLine>>,
}

impl ConsoleCapture {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, level: ConsoleLevel, text: String) {
        let mut lines = self.lines.borrow_mut();
        if lines.len() < MAX_CONSOLE_LINES {
            lines.push(ConsoleLine { level, text });
        }
    }

    pub fn lines(&self) -> Vec<ConsoleLine> {
        self.lines.borrow().clone()
    }

    /// Everything logged at `error` level, newline separated
    pub fn errors(&self) -> String {
        self.lines
            .borrow()
            .iter()
            .filter(|line| line.level == ConsoleLevel::Error)
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Install a `console` object whose methods append to `capture`.
///
/// # Safety
///
/// The functions keep a raw pointer to `capture`. It must outlive every
/// context it is registered in; the runtime guarantees this by dropping the
/// capture only after the isolate.
pub unsafe fn register_console(
    scope: &mut v8::ContextScope<'_, '_, v8::HandleScope<'_>>,
    capture: &ConsoleCapture,
) {
    let global = scope.get_current_context().global(scope);
    let console = v8::Object::new(scope);

    let capture_ptr = capture as *const ConsoleCapture as *mut std::ffi::c_void;
    let data = v8::External::new(scope, capture_ptr);

    macro_rules! bind {
        ($name:literal, $level:literal) => {
            if let Some(function) = v8::Function::builder(console_callback::<$level>)
                .data(data.into())
                .build(scope)
            {
                if let Some(key) = v8::String::new(scope, $name) {
                    console.set(scope, key.into(), function.into());
                }
            }
        };
    }

    bind!("log", 0);
    bind!("info", 1);
    bind!("warn", 2);
    bind!("error", 3);
    bind!("debug", 4);

    if let Some(key) = v8::String::new(scope, "console") {
        global.set(scope, key.into(), console.into());
    }
}

fn console_callback<const LEVEL: u8>(
    scope: &mut v8::PinScope<'_, '_>,
    args: v8::FunctionCallbackArguments<'_>,
    _rv: v8::ReturnValue<'_>,
) {
    let Ok(external) = v8::Local::<v8::External>::try_from(args.data()) else {
        return;
    };
    // Registered by `register_console`, which guarantees the pointee outlives the context
    let capture = unsafe { &*(external.value() as *const ConsoleCapture) };

    let text = (0..args.length())
        .filter_map(|i| args.get(i).to_string(scope))
        .map(|s| s.to_rust_string_lossy(scope))
        .collect::<Vec<_>>()
        .join(" ");

    capture.push(ConsoleLevel::from_index(LEVEL), text);
}
