//! Frame identity and the cross-boundary message vocabulary
//!
//! Every iframe generation gets a fresh [`FrameId`]. The host page forwards
//! what its live iframe posts to the signal endpoint, tagged with that id, and
//! the [`FrameRegistry`] hands it to whichever attempt registered the id. Once
//! an attempt is over its registration is dropped, so late or replayed
//! messages for that frame go nowhere.

#![warn(clippy::all, rust_2018_idioms)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::app::status::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(Uuid);

impl FrameId {
    pub fn new() -> Self {
        FrameId(Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for FrameId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(FrameId)
    }
}

/// The only two things a frame can say
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FrameMessage {
    Success,
    Error { message: String },
}

/// Map a frame error message to the taxonomy.
///
/// The generated document tags its own reports with a `[tag]` prefix; uncaught
/// errors arrive untagged and are classified by their JS error name.
pub fn classify_frame_error(message: &str) -> (ErrorKind, String) {
    const TAGS: &[(&str, ErrorKind)] = &[
        ("[dependency]", ErrorKind::DependencyError),
        ("[render]", ErrorKind::RenderError),
        ("[syntax]", ErrorKind::SyntaxError),
        ("[runtime]", ErrorKind::RuntimeError),
        ("[timeout]", ErrorKind::Timeout),
    ];

    let trimmed = message.trim();
    for (tag, kind) in TAGS {
        if let Some(rest) = trimmed.strip_prefix(tag) {
            return (*kind, rest.trim().to_string());
        }
    }

    // Browsers prefix window.onerror messages with "Uncaught "
    let bare = trimmed.strip_prefix("Uncaught ").unwrap_or(trimmed);
    if bare.starts_with("SyntaxError") {
        return (ErrorKind::SyntaxError, trimmed.to_string());
    }
    (ErrorKind::RuntimeError, trimmed.to_string())
}

/// Outcome of handing a signal to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// No attempt is waiting on this frame (never existed, retired, or already answered)
    Inactive,
}

#[derive(Debug, Default)]
pub struct FrameRegistry {
    waiting: Mutex<HashMap<FrameId, oneshot::Sender<FrameMessage>>>,
}

impl FrameRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Start waiting on `frame_id`. Dropping the returned registration retires it.
    pub fn register(self: &Arc<Self>, frame_id: FrameId) -> FrameRegistration {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.insert(frame_id, tx);
        }
        FrameRegistration {
            frame_id,
            registry: Arc::clone(self),
            receiver: Some(rx),
        }
    }

    /// Hand a message to the attempt waiting on `frame_id`, at most once.
    pub fn deliver(&self, frame_id: &FrameId, message: FrameMessage) -> Delivery {
        let sender = match self.waiting.lock() {
            Ok(mut waiting) => waiting.remove(frame_id),
            Err(_) => None,
        };

        match sender.map(|tx| tx.send(message).is_ok()) {
            Some(true) => Delivery::Delivered,
            _ => {
                trace_debug!("Dropped signal for inactive frame {}", frame_id);
                Delivery::Inactive
            }
        }
    }

    pub fn retire(&self, frame_id: &FrameId) {
        if let Ok(mut waiting) = self.waiting.lock() {
            waiting.remove(frame_id);
        }
    }

    pub fn is_active(&self, frame_id: &FrameId) -> bool {
        self.waiting
            .lock()
            .map(|waiting| waiting.contains_key(frame_id))
            .unwrap_or(false)
    }

    pub fn active_count(&self) -> usize {
        self.waiting.lock().map(|waiting| waiting.len()).unwrap_or(0)
    }
}

/// One attempt's claim on a frame id
pub struct FrameRegistration {
    frame_id: FrameId,
    registry: Arc<FrameRegistry>,
    receiver: Option<oneshot::Receiver<FrameMessage>>,
}

impl FrameRegistration {
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Wait for the frame's terminal message; `None` if the frame was retired
    pub async fn recv(&mut self) -> Option<FrameMessage> {
        let receiver = self.receiver.take()?;
        receiver.await.ok()
    }
}

impl Drop for FrameRegistration {
    fn drop(&mut self) {
        self.registry.retire(&self.frame_id);
    }
}
