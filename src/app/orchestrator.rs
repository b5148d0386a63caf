//! Preview orchestration
//!
//! [`PreviewSurface`] owns one preview pane: the current artifact, the current
//! result and the version history. Every way code reaches the pane (a
//! generation, a file edit, a revert) goes through [`PreviewSurface::render`].
//!
//! Each call takes a new attempt number. Results are applied only if their
//! attempt is still the latest when they finish; older attempts are dropped
//! regardless of completion order. In-process executions share one realm lock.
//!
//! The fallback component shown after a failed generation can be routed to a
//! separate executor (normally the in-process realm) so it renders even when
//! the active strategy needs the network.

#![warn(clippy::all, rust_2018_idioms)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::artifact::CodeArtifact;
use super::dependencies::{DependencyResolver, ModuleLoadReport};
use super::execution::{ExecutionPhase, ExecutionRequest, ExecutionResult, Executor, StrategyKind};
use super::generation_client::{fallback_component, GenerationClient};
use super::status::{PreviewError, PreviewEvent, PreviewView, StatusBus};
use super::transform::{Debouncer, PreviewHistory, TransformPass, DEFAULT_HISTORY_CAP};

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// This attempt's result is now the surface's result
    Current(ExecutionResult),
    /// A newer attempt started before this one finished
    Superseded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub attempt: u64,
    /// History version recorded for the code
    pub version: u64,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn result(&self) -> Option<&ExecutionResult> {
        match &self.outcome {
            AttemptOutcome::Current(result) => Some(result),
            AttemptOutcome::Superseded => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerateOutcome {
    pub description: Option<String>,
    /// Set when the model call failed and the fallback component was rendered
    pub transport_error: Option<String>,
    pub attempt: Attempt,
}

#[derive(Default)]
struct SurfaceState {
    artifact: Option<Arc<CodeArtifact>>,
    result: Option<ExecutionResult>,
}

pub struct PreviewSurface {
    executor: Executor,
    /// Renders the fallback component; `executor` when unset
    fallback: Option<Executor>,
    resolver: DependencyResolver,
    bus: StatusBus,
    transform: Option<Arc<dyn TransformPass>>,
    debug: bool,
    attempt: AtomicU64,
    realm_lock: tokio::sync::Mutex<()>,
    state: Mutex<SurfaceState>,
    history: Mutex<PreviewHistory>,
}

impl PreviewSurface {
    pub fn new(executor: Executor, resolver: DependencyResolver, bus: StatusBus) -> Self {
        Self {
            executor,
            fallback: None,
            resolver,
            bus,
            transform: None,
            debug: false,
            attempt: AtomicU64::new(0),
            realm_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(SurfaceState::default()),
            history: Mutex::new(PreviewHistory::new(DEFAULT_HISTORY_CAP)),
        }
    }

    pub fn with_transform(mut self, transform: Arc<dyn TransformPass>) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_fallback(mut self, executor: Executor) -> Self {
        self.fallback = Some(executor);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_history_cap(mut self, cap: usize) -> Self {
        self.history = Mutex::new(PreviewHistory::new(cap));
        self
    }

    pub fn bus(&self) -> &StatusBus {
        &self.bus
    }

    pub fn strategy(&self) -> StrategyKind {
        self.executor.kind()
    }

    pub fn current_artifact(&self) -> Option<Arc<CodeArtifact>> {
        self.state.lock().ok().and_then(|state| state.artifact.clone())
    }

    pub fn current_result(&self) -> Option<ExecutionResult> {
        self.state.lock().ok().and_then(|state| state.result.clone())
    }

    pub fn history_versions(&self) -> Vec<u64> {
        self.history.lock().map(|history| history.versions()).unwrap_or_default()
    }

    /// Record `raw` as a new version and render it
    pub async fn render(&self, raw: impl Into<String>) -> Attempt {
        let artifact = CodeArtifact::derive(raw, self.transform.as_deref());
        self.submit(artifact, &self.executor).await
    }

    /// Render a stored version again.
    ///
    /// The stored code is reissued as a new artifact and recorded as a new
    /// version. Returns `None` when the version has left the history.
    pub async fn revert(&self, version: u64) -> Option<Attempt> {
        let artifact = {
            let history = self.history.lock().ok()?;
            history.get(version)?.artifact.reissue(self.transform.as_deref())
        };
        log_info!("Reverting to version {} as {}", version, artifact.id);
        Some(self.submit(artifact, &self.executor).await)
    }

    /// Generate code for `prompt` and render it.
    ///
    /// A failed model call renders the fallback component carrying the error
    /// text instead, through the fallback executor when one is set.
    pub async fn generate(&self, client: &GenerationClient, prompt: &str) -> GenerateOutcome {
        match client.generate(prompt).await {
            Ok(generation) => {
                let attempt = self.render(generation.response.code).await;
                GenerateOutcome {
                    description: generation.response.description,
                    transport_error: None,
                    attempt,
                }
            }
            Err(e) => {
                let message = e.to_string();
                log_error!("Generation failed, rendering fallback: {}", message);
                self.bus.report_error(e.kind(), message.clone(), None);
                let artifact = CodeArtifact::derive(fallback_component(&message), None);
                let executor = self.fallback.as_ref().unwrap_or(&self.executor);
                let attempt = self.submit(artifact, executor).await;
                GenerateOutcome {
                    description: None,
                    transport_error: Some(message),
                    attempt,
                }
            }
        }
    }

    /// Debounced entry point for live edits
    pub fn live_updates(self: &Arc<Self>, quiet: Duration) -> Debouncer<String> {
        let surface = Arc::clone(self);
        Debouncer::spawn(quiet, move |code: String| {
            let surface = Arc::clone(&surface);
            async move {
                surface.render(code).await;
            }
        })
    }

    fn is_current(&self, attempt: u64) -> bool {
        self.attempt.load(Ordering::SeqCst) == attempt
    }

    fn phase(&self, attempt: u64, phase: ExecutionPhase) {
        self.bus.publish(PreviewEvent::Phase { attempt, phase });
    }

    async fn submit(&self, artifact: CodeArtifact, executor: &Executor) -> Attempt {
        let attempt = self.attempt.fetch_add(1, Ordering::SeqCst) + 1;
        let artifact = Arc::new(artifact);

        let version = match self.history.lock() {
            Ok(mut history) => history.push((*artifact).clone()),
            Err(_) => 0,
        };
        if let Ok(mut state) = self.state.lock() {
            state.artifact = Some(Arc::clone(&artifact));
            state.result = None;
        }

        log_info!(
            "Attempt {}: rendering {} (version {}, {} strategy)",
            attempt,
            artifact.id,
            version,
            executor.kind()
        );
        self.phase(attempt, ExecutionPhase::Preparing);
        self.bus.publish(PreviewEvent::View {
            attempt,
            view: PreviewView::Loading,
        });

        let modules = if artifact.dependencies.is_empty() {
            ModuleLoadReport::default()
        } else {
            self.phase(attempt, ExecutionPhase::LoadingDependencies);
            let deadline = tokio::time::Instant::now() + executor.budget(self.debug);
            self.resolver
                .load_modules(&artifact.dependencies, attempt, &self.bus, Some(deadline))
                .await
        };

        let outcome = self.execute(attempt, &artifact, modules, executor).await;
        Attempt {
            attempt,
            version,
            outcome,
        }
    }

    async fn execute(
        &self,
        attempt: u64,
        artifact: &Arc<CodeArtifact>,
        modules: ModuleLoadReport,
        executor: &Executor,
    ) -> AttemptOutcome {
        if !self.is_current(attempt) {
            trace_debug!("Attempt {} superseded before execution", attempt);
            return AttemptOutcome::Superseded;
        }

        let request = ExecutionRequest {
            attempt,
            artifact: Arc::clone(artifact),
            modules,
            debug: self.debug,
        };

        let result = if executor.kind() == StrategyKind::InRealm {
            let _realm = self.realm_lock.lock().await;
            if !self.is_current(attempt) {
                trace_debug!("Attempt {} superseded while waiting for the realm", attempt);
                return AttemptOutcome::Superseded;
            }
            self.phase(attempt, ExecutionPhase::Executing);
            executor.run(&request).await
        } else {
            self.phase(attempt, ExecutionPhase::Executing);
            executor.run(&request).await
        };

        if !self.is_current(attempt) {
            log_debug!("Discarding stale result of attempt {}", attempt);
            return AttemptOutcome::Superseded;
        }

        self.publish_result(attempt, &result);
        if let Ok(mut state) = self.state.lock() {
            state.result = Some(result.clone());
        }
        AttemptOutcome::Current(result)
    }

    fn publish_result(&self, attempt: u64, result: &ExecutionResult) {
        self.phase(attempt, ExecutionPhase::Finished);
        let view = match result {
            ExecutionResult::Success { output, diagnostics } => {
                for line in diagnostics {
                    trace_debug!("Attempt {} diagnostic: {}", attempt, line);
                }
                PreviewView::Rendered(output.clone())
            }
            ExecutionResult::Failure { kind, message } => {
                let error = PreviewError::new(*kind, message.clone(), Some(attempt));
                log_warn!("Attempt {} failed: {}", attempt, error);
                self.bus.publish(PreviewEvent::Error(error.clone()));
                PreviewView::Error(error)
            }
        };
        self.bus.publish(PreviewEvent::View { attempt, view });
    }
}
