//! V8 JavaScript Engine Bindings
//!
//! Embedded V8 used by the in-realm execution strategy.
//!
//! # Architecture
//!
//! - **Platform**: Global V8 platform initialized once at startup
//! - **Runtime**: Per-execution isolate with heap limit and watchdog
//! - **Console**: `console.*` captured per execution
//!
//! # Usage
//!
//! ```no_run
//! use uiforge::app::v8_bindings::{initialize_v8_platform, V8Runtime};
//!
//! initialize_v8_platform().expect("Failed to initialize V8");
//! let run = V8Runtime::new().execute(&[], "1 + 1").unwrap();
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod console;
pub mod platform;
pub mod runtime;

pub use console::{register_console, ConsoleCapture, ConsoleLevel, ConsoleLine};
pub use platform::{initialize_v8_platform, is_v8_initialized};
pub use runtime::{PreludeScript, RealmRun, RuntimeConfig, ScriptOutcome, V8Runtime};
