//! uiforge - preview pipeline for generated React components
//!
//! Takes component source of unknown quality (usually straight from a language
//! model), prepares it and renders it under one of three isolation strategies,
//! turning every way the code can fail into a classified, recoverable error.
//!
//! # Pipeline
//!
//! ```text
//! raw text -> normalize -> extract modules -> load modules -> execute -> view
//!                               (CodeArtifact)   (resolver)   (strategy)
//! ```
//!
//! - [`app::normalizer`] strips markdown, module syntax and TypeScript
//! - [`app::shims`] is the fabricated component library generated code may use
//! - [`app::dependencies`] resolves and fetches the modules the code names
//! - [`app::execution`] holds the strategies: in-process V8, sandboxed iframe
//!   in a webview, hosted bundler
//! - [`app::orchestrator`] ties them together for one preview surface
//! - [`app::status`] is the event bus front ends subscribe to
//!
//! Generation ([`app::generation_client`]) and live sources ([`app::live`])
//! feed the same [`app::orchestrator::PreviewSurface::render`] path.

#![warn(clippy::all, rust_2018_idioms)]

// Include logging macros first
#[macro_use]
pub mod logging_macros;

pub mod app;

use once_cell::sync::OnceCell;
use tracing_subscriber::{reload, EnvFilter, Registry};

static TRACING_RELOAD_HANDLE: OnceCell<reload::Handle<EnvFilter, Registry>> = OnceCell::new();

/// Keep the filter handle so verbosity can change after startup
pub fn set_tracing_reload_handle(handle: reload::Handle<EnvFilter, Registry>) {
    let _ = TRACING_RELOAD_HANDLE.set(handle);
}

/// Replace the active log filter, e.g. `"uiforge=debug"`
pub fn set_log_filter(directives: &str) -> anyhow::Result<()> {
    let handle = TRACING_RELOAD_HANDLE
        .get()
        .ok_or_else(|| anyhow::anyhow!("Logging is not initialized"))?;
    let filter = EnvFilter::builder().parse(directives)?;
    handle.reload(filter)?;
    Ok(())
}
