//! In-realm execution
//!
//! Evaluates the artifact inside an embedded V8 isolate. Nothing from the
//! host leaks into the realm: the headless React runtime and the shim library
//! are evaluated as prelude scripts, and the component is built with
//! `new Function(...)` against the explicit injection list from
//! [`injection_names`]. Rendering produces static markup.
//!
//! Classification:
//!
//! | where it failed                     | kind           |
//! |-------------------------------------|----------------|
//! | transpiling or `new Function`       | `SyntaxError`  |
//! | top-level code, missing entry point | `RuntimeError` |
//! | the root component while rendering  | `RenderError`  |
//! | the isolate watchdog                | `Timeout`      |
//!
//! A subtree under the root that throws is replaced by an inline error panel
//! and reported as a diagnostic; the execution still succeeds.

#![warn(clippy::all, rust_2018_idioms)]

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::{ExecutionRequest, ExecutionResult, ExecutionStrategy, RenderedOutput, StrategyKind};
use crate::app::dependencies::table::BABEL_URL;
use crate::app::dependencies::{is_optional, ModuleFetcher};
use crate::app::normalizer::{entry_point, ENTRY_POINT};
use crate::app::shims::{injection_names, MINI_REACT_SOURCE, SHIM_SOURCE};
use crate::app::status::ErrorKind;
use crate::app::v8_bindings::{
    initialize_v8_platform, PreludeScript, RealmRun, RuntimeConfig, ScriptOutcome, V8Runtime,
};

const HARNESS_SOURCE: &str = include_str!("in_realm_harness.js");

/// UMD bundles look for one of these
const REALM_GLOBALS: &str = "var window = globalThis; var self = globalThis; var global = globalThis;";

/// Time on top of the isolate watchdog before the executor gives up
const BUDGET_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum HarnessReport {
    Ok { html: String, errors: Vec<String> },
    Syntax { message: String },
    Runtime { message: String },
    Render { message: String },
}

pub struct InRealmStrategy {
    config: RuntimeConfig,
    /// Source of the JSX/TypeScript transpiler; without it code runs as is
    transpiler: Option<Arc<dyn ModuleFetcher>>,
}

impl InRealmStrategy {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            transpiler: None,
        }
    }

    /// Fetch the standalone transpiler through `fetcher` before each run
    pub fn with_transpiler(mut self, fetcher: Arc<dyn ModuleFetcher>) -> Self {
        self.transpiler = Some(fetcher);
        self
    }

    async fn prelude(&self, request: &ExecutionRequest) -> Vec<PreludeScript> {
        let mut scripts = vec![
            PreludeScript::required("realm-globals", REALM_GLOBALS),
            PreludeScript::required("mini-react", MINI_REACT_SOURCE),
            PreludeScript::required("shims", SHIM_SOURCE),
            PreludeScript::required("harness", HARNESS_SOURCE),
        ];

        // Chart engines need a DOM; the shims fall back to placeholders
        for module in &request.modules.modules {
            if is_optional(&module.name) {
                continue;
            }
            scripts.push(PreludeScript::optional(
                module.name.clone(),
                module.source.clone(),
            ));
        }

        if let Some(fetcher) = &self.transpiler {
            match fetcher.fetch(BABEL_URL).await {
                Ok(source) => scripts.push(PreludeScript::optional("babel", source)),
                Err(e) => {
                    log_warn!("Transpiler unavailable, evaluating untranspiled: {}", e);
                }
            }
        }

        scripts
    }
}

#[async_trait]
impl ExecutionStrategy for InRealmStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InRealm
    }

    fn budget(&self, _debug: bool) -> Duration {
        self.config.timeout + BUDGET_GRACE
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        if let Err(e) = initialize_v8_platform() {
            return ExecutionResult::failure(
                ErrorKind::RuntimeError,
                format!("V8 platform unavailable: {}", e),
            );
        }

        let prelude = self.prelude(request).await;
        let entry = entry_point(&request.artifact.normalized).unwrap_or_else(|| ENTRY_POINT.to_string());
        let invocation = match harness_call(request.artifact.executable(), &entry) {
            Ok(call) => call,
            Err(e) => {
                return ExecutionResult::failure(
                    ErrorKind::RuntimeError,
                    format!("Failed to prepare evaluation: {}", e),
                )
            }
        };

        let config = self.config.clone();
        let joined = tokio::task::spawn_blocking(move || {
            V8Runtime::with_config(config).execute(&prelude, &invocation)
        })
        .await;

        match joined {
            Ok(Ok(run)) => classify(run),
            Ok(Err(e)) => ExecutionResult::failure(
                ErrorKind::RuntimeError,
                format!("Evaluation harness failed: {}", e),
            ),
            Err(e) => ExecutionResult::failure(
                ErrorKind::RuntimeError,
                format!("Evaluation thread failed: {}", e),
            ),
        }
    }
}

/// Main script: one call into the harness with every argument as a JSON literal
fn harness_call(code: &str, entry: &str) -> serde_json::Result<String> {
    Ok(format!(
        "__uiforgeRun({}, {}, {})",
        serde_json::to_string(code)?,
        serde_json::to_string(&injection_names())?,
        serde_json::to_string(entry)?
    ))
}

fn classify(run: RealmRun) -> ExecutionResult {
    let mut diagnostics: Vec<String> = run
        .prelude_failures
        .iter()
        .map(|failure| format!("[module] {}", failure))
        .collect();
    diagnostics.extend(
        run.console
            .iter()
            .map(|line| format!("[{}] {}", line.level.as_str(), line.text)),
    );

    let report = match run.outcome {
        ScriptOutcome::Terminated => {
            return ExecutionResult::failure(
                ErrorKind::Timeout,
                format!("Evaluation terminated after {} ms", run.execution_time_ms),
            )
        }
        ScriptOutcome::Threw(message) => {
            return ExecutionResult::failure(ErrorKind::RuntimeError, message)
        }
        ScriptOutcome::Completed(json) => match serde_json::from_str::<HarnessReport>(&json) {
            Ok(report) => report,
            Err(e) => {
                return ExecutionResult::failure(
                    ErrorKind::RuntimeError,
                    format!("Unreadable harness report: {}", e),
                )
            }
        },
    };

    match report {
        HarnessReport::Ok { html, errors } => {
            for error in &errors {
                log_warn!("Isolated render error: {}", error);
            }
            diagnostics.extend(errors.into_iter().map(|e| format!("[render] {}", e)));
            ExecutionResult::Success {
                output: RenderedOutput::Markup { html },
                diagnostics,
            }
        }
        HarnessReport::Syntax { message } => ExecutionResult::failure(ErrorKind::SyntaxError, message),
        HarnessReport::Runtime { message } => ExecutionResult::failure(ErrorKind::RuntimeError, message),
        HarnessReport::Render { message } => ExecutionResult::failure(ErrorKind::RenderError, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::artifact::CodeArtifact;
    use crate::app::dependencies::ModuleLoadReport;

    async fn run(code: &str) -> ExecutionResult {
        let strategy = InRealmStrategy::new(RuntimeConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        });
        let request = ExecutionRequest {
            attempt: 1,
            artifact: Arc::new(CodeArtifact::new(code)),
            modules: ModuleLoadReport::default(),
            debug: false,
        };
        strategy.execute(&request).await
    }

    fn html(result: &ExecutionResult) -> &str {
        match result {
            ExecutionResult::Success {
                output: RenderedOutput::Markup { html },
                ..
            } => html,
            other => panic!("expected markup, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_renders_shim_components() {
        let result = run(r#"
function GeneratedApp() {
  const [count] = useState(3);
  return React.createElement(Card, null,
    React.createElement(CardTitle, null, 'Counter'),
    React.createElement(Badge, { variant: 'secondary' }, 'Count: ' + count));
}
"#)
        .await;
        let html = html(&result);
        assert!(html.contains("Counter"));
        assert!(html.contains("Count: 3"));
        assert!(html.contains("data-shim=\"Card\""));
    }

    #[tokio::test]
    async fn test_user_declaration_shadows_injected_shim() {
        let result = run(r#"
const Card = (props) => React.createElement('section', { id: 'mine' }, props.children);
function GeneratedApp() { return React.createElement(Card, null, 'hi'); }
"#)
        .await;
        assert!(html(&result).contains("<section id=\"mine\">hi</section>"));
    }

    #[tokio::test]
    async fn test_charts_degrade_to_placeholders() {
        let result = run(r#"
function GeneratedApp() {
  const data = [{ v: 1 }, { v: 2 }];
  return React.createElement(ResponsiveContainer, null,
    React.createElement(LineChart, { data },
      React.createElement(Line, { dataKey: 'v' })));
}
"#)
        .await;
        assert!(html(&result).contains("[LineChart: 2 points, v]"));
    }

    #[tokio::test]
    async fn test_syntax_error_classified() {
        let result = run("function GeneratedApp() { return (; }").await;
        assert_eq!(result.error_kind(), Some(ErrorKind::SyntaxError));
    }

    #[tokio::test]
    async fn test_top_level_throw_is_runtime_error() {
        let result = run("undefinedHelper();\nfunction GeneratedApp() { return null; }").await;
        match result {
            ExecutionResult::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::RuntimeError);
                assert!(message.contains("undefinedHelper"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_entry_point_is_runtime_error() {
        let result = run("const value = 42;").await;
        assert_eq!(result.error_kind(), Some(ErrorKind::RuntimeError));
    }

    #[tokio::test]
    async fn test_root_throw_is_render_error() {
        let result = run("function GeneratedApp() { throw new Error('kaboom'); }").await;
        match result {
            ExecutionResult::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::RenderError);
                assert!(message.contains("kaboom"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_infinite_loop_times_out() {
        let result = run("while (true) {}\nfunction GeneratedApp() { return null; }").await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_console_output_becomes_diagnostics() {
        let result = run("console.warn('careful');\nfunction GeneratedApp() { return React.createElement('p', null, 'x'); }").await;
        match result {
            ExecutionResult::Success { diagnostics, .. } => {
                assert_eq!(diagnostics, vec!["[warn] careful".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
