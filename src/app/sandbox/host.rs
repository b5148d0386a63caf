//! Where preview frames are mounted
//!
//! [`FrameHost`] is the seam between the iframe strategy and whatever shows
//! the host page. [`WebviewFrameHost`] runs each page in a webview subprocess
//! and keeps only the newest one alive.

#![warn(clippy::all, rust_2018_idioms)]

use std::fmt;
use std::process::Child;
use std::sync::Mutex;

use super::frames::FrameId;
use crate::app::webview::{spawn_webview_process_with_html, SignalEndpoint};

#[derive(Debug)]
pub enum FrameHostError {
    Spawn(std::io::Error),
    Unavailable(String),
}

impl fmt::Display for FrameHostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameHostError::Spawn(e) => write!(f, "Failed to start preview window: {}", e),
            FrameHostError::Unavailable(reason) => write!(f, "Preview host unavailable: {}", reason),
        }
    }
}

impl std::error::Error for FrameHostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameHostError::Spawn(e) => Some(e),
            FrameHostError::Unavailable(_) => None,
        }
    }
}

pub trait FrameHost: Send + Sync {
    /// Show `page` for `frame_id`, replacing whatever was shown before
    fn mount(&self, frame_id: &FrameId, page: &str) -> Result<(), FrameHostError>;
}

pub struct WebviewFrameHost {
    endpoint: SignalEndpoint,
    title: String,
    current: Mutex<Option<Child>>,
}

impl WebviewFrameHost {
    pub fn new(endpoint: SignalEndpoint, title: impl Into<String>) -> Self {
        Self {
            endpoint,
            title: title.into(),
            current: Mutex::new(None),
        }
    }

    fn close_current(current: &mut Option<Child>) {
        if let Some(mut child) = current.take() {
            if let Err(e) = child.kill() {
                trace_debug!("Previous preview window already gone: {}", e);
            }
            let _ = child.wait();
        }
    }
}

impl FrameHost for WebviewFrameHost {
    fn mount(&self, frame_id: &FrameId, page: &str) -> Result<(), FrameHostError> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| FrameHostError::Unavailable("preview window lock poisoned".to_string()))?;

        Self::close_current(&mut current);

        let child = spawn_webview_process_with_html(page, &self.title, &self.endpoint)
            .map_err(FrameHostError::Spawn)?;
        log_info!("Preview frame {} mounted in webview pid {}", frame_id, child.id());
        *current = Some(child);
        Ok(())
    }
}

impl Drop for WebviewFrameHost {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            Self::close_current(&mut current);
        }
    }
}
