//! Error & Status Surface
//!
//! One [`StatusBus`] per preview surface carries every observable change:
//! execution phase, module load progress, classified errors, the committed
//! preview view and live-update connectivity. The bus is an explicit handle
//! passed to whoever publishes; nothing here is process-global.
//!
//! [`StatusBoard`] folds the event stream into the current picture, which is
//! what a front end (the CLI, a webview panel) renders.

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tokio::sync::broadcast;

use super::dependencies::ModuleLoadStatus;
use super::execution::{ExecutionPhase, RenderedOutput};
use super::live::ConnectionState;

/// Error taxonomy shared by every strategy and the generation client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    SyntaxError,
    RuntimeError,
    RenderError,
    DependencyError,
    Timeout,
    TransportError,
}

/// How the front end should treat an error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Network or load problem, often transient; resubmitting may work
    Recoverable,
    /// The code itself is broken; only new code fixes it
    NeedsNewCode,
    /// Caught by the error boundary; confined to the preview pane
    Isolated,
}

impl ErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            ErrorKind::DependencyError | ErrorKind::TransportError | ErrorKind::Timeout => {
                ErrorClass::Recoverable
            }
            ErrorKind::SyntaxError | ErrorKind::RuntimeError => ErrorClass::NeedsNewCode,
            ErrorKind::RenderError => ErrorClass::Isolated,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RuntimeError => "RuntimeError",
            ErrorKind::RenderError => "RenderError",
            ErrorKind::DependencyError => "DependencyError",
            ErrorKind::Timeout => "Timeout",
            ErrorKind::TransportError => "TransportError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewError {
    pub kind: ErrorKind,
    pub message: String,
    /// Attempt the error belongs to, if it came from one
    pub attempt: Option<u64>,
    pub at: DateTime<Utc>,
}

impl PreviewError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, attempt: Option<u64>) -> Self {
        Self {
            kind,
            message: message.into(),
            attempt,
            at: Utc::now(),
        }
    }

    pub fn recoverable(&self) -> bool {
        self.kind.class() == ErrorClass::Recoverable
    }
}

impl fmt::Display for PreviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// What the preview pane shows. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PreviewView {
    Loading,
    Rendered(RenderedOutput),
    Error(PreviewError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PreviewEvent {
    Phase {
        attempt: u64,
        phase: ExecutionPhase,
    },
    Modules {
        attempt: u64,
        statuses: BTreeMap<String, ModuleLoadStatus>,
    },
    Error(PreviewError),
    View {
        attempt: u64,
        view: PreviewView,
    },
    Connectivity {
        source: String,
        state: ConnectionState,
    },
}

const DEFAULT_BUS_CAPACITY: usize = 256;

/// Broadcast channel for [`PreviewEvent`]s
#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<PreviewEvent>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PreviewEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: PreviewEvent) {
        let _ = self.tx.send(event);
    }

    pub fn report_error(&self, kind: ErrorKind, message: impl Into<String>, attempt: Option<u64>) {
        self.publish(PreviewEvent::Error(PreviewError::new(kind, message, attempt)));
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

const MAX_BOARD_ERRORS: usize = 20;

/// Current picture assembled from the event stream
#[derive(Debug, Clone, Serialize)]
pub struct StatusBoard {
    pub attempt: u64,
    pub phase: ExecutionPhase,
    pub modules: BTreeMap<String, ModuleLoadStatus>,
    pub view: PreviewView,
    /// Most recent errors, newest last
    pub errors: Vec<PreviewError>,
    pub connectivity: BTreeMap<String, ConnectionState>,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self {
            attempt: 0,
            phase: ExecutionPhase::Idle,
            modules: BTreeMap::new(),
            view: PreviewView::Loading,
            errors: Vec::new(),
            connectivity: BTreeMap::new(),
        }
    }
}

impl StatusBoard {
    pub fn apply(&mut self, event: &PreviewEvent) {
        match event {
            PreviewEvent::Phase { attempt, phase } => {
                if *attempt < self.attempt {
                    return;
                }
                if *attempt > self.attempt {
                    // New attempt: module map belongs to the previous artifact
                    self.attempt = *attempt;
                    self.modules.clear();
                    self.view = PreviewView::Loading;
                }
                self.phase = *phase;
            }
            PreviewEvent::Modules { attempt, statuses } => {
                if *attempt == self.attempt {
                    self.modules = statuses.clone();
                }
            }
            PreviewEvent::Error(error) => {
                if error.attempt.map_or(true, |a| a == self.attempt) {
                    self.errors.push(error.clone());
                    if self.errors.len() > MAX_BOARD_ERRORS {
                        self.errors.remove(0);
                    }
                }
            }
            PreviewEvent::View { attempt, view } => {
                if *attempt == self.attempt {
                    self.view = view.clone();
                }
            }
            PreviewEvent::Connectivity { source, state } => {
                self.connectivity.insert(source.clone(), *state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(ErrorKind::DependencyError.class(), ErrorClass::Recoverable);
        assert_eq!(ErrorKind::TransportError.class(), ErrorClass::Recoverable);
        assert_eq!(ErrorKind::SyntaxError.class(), ErrorClass::NeedsNewCode);
        assert_eq!(ErrorKind::RuntimeError.class(), ErrorClass::NeedsNewCode);
        assert_eq!(ErrorKind::RenderError.class(), ErrorClass::Isolated);
    }

    #[test]
    fn test_error_display() {
        let err = PreviewError::new(ErrorKind::Timeout, "no signal within 5000ms", Some(3));
        assert_eq!(err.to_string(), "Timeout: no signal within 5000ms");
        assert!(err.recoverable());
    }

    #[tokio::test]
    async fn test_bus_delivers_to_subscribers() {
        let bus = StatusBus::new();
        let mut rx = bus.subscribe();
        bus.report_error(ErrorKind::SyntaxError, "Unexpected token", Some(1));

        match rx.recv().await.unwrap() {
            PreviewEvent::Error(err) => {
                assert_eq!(err.kind, ErrorKind::SyntaxError);
                assert_eq!(err.attempt, Some(1));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let bus = StatusBus::new();
        bus.publish(PreviewEvent::Phase {
            attempt: 1,
            phase: ExecutionPhase::Preparing,
        });
    }

    #[test]
    fn test_board_ignores_stale_attempts() {
        let mut board = StatusBoard::default();
        board.apply(&PreviewEvent::Phase {
            attempt: 2,
            phase: ExecutionPhase::Executing,
        });
        board.apply(&PreviewEvent::View {
            attempt: 1,
            view: PreviewView::Error(PreviewError::new(ErrorKind::Timeout, "late", Some(1))),
        });
        board.apply(&PreviewEvent::Error(PreviewError::new(
            ErrorKind::Timeout,
            "late",
            Some(1),
        )));

        assert_eq!(board.view, PreviewView::Loading);
        assert!(board.errors.is_empty());

        board.apply(&PreviewEvent::View {
            attempt: 2,
            view: PreviewView::Rendered(RenderedOutput::Markup {
                html: "<div>ok</div>".into(),
            }),
        });
        assert!(matches!(board.view, PreviewView::Rendered(_)));
    }

    #[test]
    fn test_board_tracks_connectivity() {
        let mut board = StatusBoard::default();
        board.apply(&PreviewEvent::Connectivity {
            source: "http://localhost:9000/code".into(),
            state: ConnectionState::Disconnected,
        });
        assert_eq!(
            board.connectivity.get("http://localhost:9000/code"),
            Some(&ConnectionState::Disconnected)
        );
    }
}
