//! Iframe sandbox execution
//!
//! Each attempt builds a frame document, mounts it under a fresh [`FrameId`]
//! and waits for that frame's one terminal message. The registration is held
//! for exactly as long as the attempt: when the executor's timer fires and
//! drops this future, the frame is retired and whatever it says afterwards
//! is discarded.

#![warn(clippy::all, rust_2018_idioms)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{ExecutionRequest, ExecutionResult, ExecutionStrategy, RenderedOutput, StrategyKind};
use crate::app::normalizer::{entry_point, ENTRY_POINT};
use crate::app::sandbox::{
    classify_frame_error, frame_document, host_page, DocumentModule, FrameDocumentOptions, FrameHost,
    FrameHostError, FrameId, FrameMessage, FrameRegistry,
};
use crate::app::status::ErrorKind;

pub const DEFAULT_FRAME_BUDGET: Duration = Duration::from_millis(5_000);
pub const DEFAULT_DEBUG_FRAME_BUDGET: Duration = Duration::from_millis(12_000);

pub struct IframeStrategy {
    registry: Arc<FrameRegistry>,
    host: Arc<dyn FrameHost>,
    budget: Duration,
    debug_budget: Duration,
    dependency_timeout: Duration,
}

impl IframeStrategy {
    pub fn new(registry: Arc<FrameRegistry>, host: Arc<dyn FrameHost>) -> Self {
        Self {
            registry,
            host,
            budget: DEFAULT_FRAME_BUDGET,
            debug_budget: DEFAULT_DEBUG_FRAME_BUDGET,
            dependency_timeout: FrameDocumentOptions::default().dependency_timeout,
        }
    }

    pub fn with_budgets(mut self, budget: Duration, debug_budget: Duration) -> Self {
        self.budget = budget;
        self.debug_budget = debug_budget;
        self
    }

    pub fn with_dependency_timeout(mut self, timeout: Duration) -> Self {
        self.dependency_timeout = timeout;
        self
    }
}

#[async_trait]
impl ExecutionStrategy for IframeStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Iframe
    }

    fn budget(&self, debug: bool) -> Duration {
        if debug {
            self.debug_budget
        } else {
            self.budget
        }
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let frame_id = FrameId::new();
        let mut registration = self.registry.register(frame_id);

        let artifact = &request.artifact;
        let entry = entry_point(&artifact.normalized).unwrap_or_else(|| ENTRY_POINT.to_string());
        let modules: Vec<DocumentModule> = request.modules.modules.iter().map(DocumentModule::from).collect();
        let options = FrameDocumentOptions {
            debug: request.debug,
            dependency_timeout: self.dependency_timeout,
        };

        let page = match frame_document(artifact.executable(), &entry, &modules, &options)
            .and_then(|document| host_page(&frame_id, &document))
        {
            Ok(page) => page,
            Err(e) => {
                return ExecutionResult::failure(
                    ErrorKind::RuntimeError,
                    format!("Failed to build preview document: {}", e),
                )
            }
        };

        trace_debug!(
            "Mounting frame {} for {} (attempt {}, {} bytes)",
            frame_id,
            artifact.id,
            request.attempt,
            page.len()
        );

        // Mounting kills and spawns webview processes
        let host = Arc::clone(&self.host);
        let mounted = tokio::task::spawn_blocking(move || host.mount(&frame_id, &page))
            .await
            .unwrap_or_else(|e| Err(FrameHostError::Unavailable(format!("mount task failed: {}", e))));
        if let Err(e) = mounted {
            log_error!("Frame {} could not be mounted: {}", frame_id, e);
            return ExecutionResult::failure(ErrorKind::RuntimeError, e.to_string());
        }

        match registration.recv().await {
            Some(FrameMessage::Success) => {
                log_info!("Frame {} rendered {}", frame_id, artifact.id);
                ExecutionResult::success(RenderedOutput::Frame { frame_id })
            }
            Some(FrameMessage::Error { message }) => {
                let (kind, message) = classify_frame_error(&message);
                log_warn!("Frame {} reported {}: {}", frame_id, kind, message);
                ExecutionResult::failure(kind, message)
            }
            None => ExecutionResult::failure(
                ErrorKind::RuntimeError,
                format!("Frame {} was retired before it reported", frame_id),
            ),
        }
    }
}
