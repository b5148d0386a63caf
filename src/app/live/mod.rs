//! Live-update sources
//!
//! A source produces new code text as it changes (an edited file, a polled
//! endpoint). [`run_source`] drives one source: it polls on an interval, hands
//! changed text to a sink (normally a [`Debouncer`]), and tracks the source's
//! [`ConnectionState`] on the status bus. A failed poll marks the source
//! disconnected and retries after a fixed backoff.
//!
//! [`Debouncer`]: crate::app::transform::Debouncer

#![warn(clippy::all, rust_2018_idioms)]

pub mod file;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use file::FileSource;
pub use http::HttpSource;

use crate::app::status::{PreviewEvent, StatusBus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

#[async_trait]
pub trait LiveUpdateSource: Send {
    /// Label used in logs and connectivity events
    fn name(&self) -> String;

    /// Check once for new text. `Ok(None)` means unchanged.
    async fn poll(&mut self) -> anyhow::Result<Option<String>>;
}

#[derive(Debug, Clone, Copy)]
pub struct FeedTiming {
    pub poll_interval: Duration,
    /// Fixed wait after a failed poll
    pub reconnect_backoff: Duration,
}

impl Default for FeedTiming {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }
}

/// Drive `source` until `cancel` fires
pub async fn run_source<S, F>(
    mut source: S,
    timing: FeedTiming,
    bus: StatusBus,
    cancel: CancellationToken,
    mut on_change: F,
) where
    S: LiveUpdateSource,
    F: FnMut(String) + Send,
{
    let name = source.name();
    let mut state: Option<ConnectionState> = None;

    let mut set_state = |next: ConnectionState| {
        if state != Some(next) {
            state = Some(next);
            bus.publish(PreviewEvent::Connectivity {
                source: name.clone(),
                state: next,
            });
        }
    };

    loop {
        let wait = match source.poll().await {
            Ok(change) => {
                set_state(ConnectionState::Connected);
                if let Some(text) = change {
                    trace_debug!("Live source {} changed ({} bytes)", source.name(), text.len());
                    on_change(text);
                }
                timing.poll_interval
            }
            Err(e) => {
                log_warn!(
                    "Live source {} unavailable, retrying in {:?}: {}",
                    source.name(),
                    timing.reconnect_backoff,
                    e
                );
                set_state(ConnectionState::Disconnected);
                timing.reconnect_backoff
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    log_info!("Live source {} stopped", source.name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedSource {
        script: VecDeque<anyhow::Result<Option<String>>>,
    }

    #[async_trait]
    impl LiveUpdateSource for ScriptedSource {
        fn name(&self) -> String {
            "scripted".to_string()
        }

        async fn poll(&mut self) -> anyhow::Result<Option<String>> {
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_then_reconnect_after_fixed_backoff() {
        let bus = StatusBus::new();
        let mut events = bus.subscribe();
        let cancel = CancellationToken::new();
        let changes = Arc::new(Mutex::new(Vec::new()));

        let source = ScriptedSource {
            script: VecDeque::from(vec![
                Err(anyhow::anyhow!("connection refused")),
                Err(anyhow::anyhow!("connection refused")),
                Ok(Some("function GeneratedApp() {}".to_string())),
                Ok(None),
            ]),
        };

        let sink = Arc::clone(&changes);
        let started = tokio::time::Instant::now();
        let task = tokio::spawn(run_source(
            source,
            FeedTiming {
                poll_interval: Duration::from_millis(100),
                reconnect_backoff: Duration::from_secs(3),
            },
            bus.clone(),
            cancel.clone(),
            move |text| sink.lock().unwrap().push(text),
        ));

        let first = events.recv().await.unwrap();
        assert_eq!(
            first,
            PreviewEvent::Connectivity {
                source: "scripted".into(),
                state: ConnectionState::Disconnected
            }
        );

        // Two failures, one event; reconnect after two fixed backoffs
        let second = events.recv().await.unwrap();
        assert_eq!(
            second,
            PreviewEvent::Connectivity {
                source: "scripted".into(),
                state: ConnectionState::Connected
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(6));

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(changes.lock().unwrap().as_slice(), ["function GeneratedApp() {}".to_string()]);
    }
}
