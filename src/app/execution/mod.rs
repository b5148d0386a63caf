//! Execution strategies
//!
//! Three ways of turning a prepared artifact into a rendered preview, behind
//! one [`ExecutionStrategy`] trait:
//!
//! - [`InRealmStrategy`]: embedded V8, shims injected as function parameters,
//!   headless rendering to markup
//! - [`IframeStrategy`]: a generated HTML document in a sandboxed iframe inside
//!   a webview process, reporting back over the frame signal endpoint
//! - [`BundlerStrategy`]: a virtual project posted to a hosted bundler
//!
//! Every strategy runs under [`Executor`], which owns the time budget: each
//! attempt yields exactly one terminal [`ExecutionResult`], a timer firing
//! first included.
//!
//! ```text
//! Idle -> Preparing -> [LoadingDependencies] -> Executing -> Finished
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod bundler;
pub mod executor;
pub mod iframe;
pub mod in_realm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::artifact::CodeArtifact;
use super::dependencies::ModuleLoadReport;
use super::sandbox::FrameId;
use super::status::ErrorKind;

pub use bundler::{BundlerClient, BundlerError, BundlerStrategy, DefineApiClient, VirtualProject};
pub use executor::Executor;
pub use iframe::IframeStrategy;
pub use in_realm::InRealmStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    InRealm,
    #[default]
    Iframe,
    Bundler,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::InRealm => "in-realm",
            StrategyKind::Iframe => "iframe",
            StrategyKind::Bundler => "bundler",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in-realm" | "inrealm" | "realm" | "v8" => Ok(StrategyKind::InRealm),
            "iframe" | "frame" | "webview" => Ok(StrategyKind::Iframe),
            "bundler" | "sandbox" => Ok(StrategyKind::Bundler),
            other => Err(format!(
                "Unknown strategy '{}' (expected in-realm, iframe or bundler)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionPhase {
    Idle,
    Preparing,
    LoadingDependencies,
    Executing,
    Finished,
}

/// What a successful execution produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderedOutput {
    /// Static markup from the in-realm renderer
    Markup { html: String },
    /// Mounted in the sandboxed iframe of a webview
    Frame { frame_id: FrameId },
    /// Rendered by the hosted bundler
    Sandbox { sandbox_id: String, embed_url: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExecutionResult {
    Success {
        output: RenderedOutput,
        /// Console output and isolated render errors
        diagnostics: Vec<String>,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl ExecutionResult {
    pub fn success(output: RenderedOutput) -> Self {
        ExecutionResult::Success {
            output,
            diagnostics: Vec::new(),
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        ExecutionResult::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExecutionResult::Success { .. } => None,
            ExecutionResult::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Everything a strategy gets for one attempt
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub attempt: u64,
    pub artifact: Arc<CodeArtifact>,
    /// Completed dependency batch for the artifact
    pub modules: ModuleLoadReport,
    pub debug: bool,
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Wall-clock budget for one attempt
    fn budget(&self, debug: bool) -> Duration;

    /// Run one attempt to its terminal result.
    ///
    /// The future may be dropped when the budget runs out; implementations
    /// must release per-attempt resources on drop.
    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("in-realm".parse::<StrategyKind>(), Ok(StrategyKind::InRealm));
        assert_eq!(" IFRAME ".parse::<StrategyKind>(), Ok(StrategyKind::Iframe));
        assert_eq!("bundler".parse::<StrategyKind>(), Ok(StrategyKind::Bundler));
        assert!("docker".parse::<StrategyKind>().is_err());
        assert_eq!(StrategyKind::default(), StrategyKind::Iframe);
    }

    #[test]
    fn test_rendered_output_serialization() {
        let json = serde_json::to_value(RenderedOutput::Markup {
            html: "<div></div>".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "markup");
        assert_eq!(json["html"], "<div></div>");
    }
}
