//! Debounced live update
//!
//! Holds at most one pending value. A value is applied once the quiet period
//! passes with no newer value; a newer value replaces the pending one and
//! restarts the wait.

#![warn(clippy::all, rust_2018_idioms)]

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Default quiet period before a pending change is applied
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

pub struct Debouncer<T> {
    tx: watch::Sender<Option<T>>,
    task: JoinHandle<()>,
}

impl<T: Clone + Send + Sync + 'static> Debouncer<T> {
    /// Spawn the debounce loop on the current tokio runtime.
    ///
    /// `apply` runs on the loop task, so applies never overlap. The channel
    /// keeps only the newest value; edits superseded before the loop sees
    /// them are dropped.
    pub fn spawn<F, Fut>(quiet: Duration, mut apply: F) -> Self
    where
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, mut rx) = watch::channel::<Option<T>>(None);

        let task = tokio::spawn(async move {
            let mut pending: Option<T> = None;
            loop {
                if pending.is_none() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                    pending = rx.borrow_and_update().clone();
                    continue;
                }

                tokio::select! {
                    changed = rx.changed() => match changed {
                        Ok(()) => pending = rx.borrow_and_update().clone(),
                        Err(_) => {
                            if let Some(value) = pending.take() {
                                apply(value).await;
                            }
                            break;
                        }
                    },
                    _ = tokio::time::sleep(quiet) => {
                        if let Some(value) = pending.take() {
                            trace_debug!("Debounce quiet period elapsed, applying change");
                            apply(value).await;
                        }
                    }
                }
            }
        });

        Self { tx, task }
    }

    /// Replace the pending change. Returns false if the loop has stopped.
    pub fn push(&self, value: T) -> bool {
        self.tx.send(Some(value)).is_ok()
    }

    /// Stop accepting changes, flush whatever is pending and wait for the loop
    pub async fn close(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl FnMut(u32) -> std::future::Ready<()> + Send + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v| {
            sink.lock().unwrap().push(v);
            std::future::ready(())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last_value() {
        let (seen, apply) = recorder();
        let debouncer = Debouncer::spawn(DEFAULT_DEBOUNCE, apply);

        debouncer.push(1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.push(2);
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.push(3);

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert!(seen.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(*seen.lock().unwrap(), vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_apply_separately() {
        let (seen, apply) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_millis(300), apply);

        debouncer.push(1);
        tokio::time::sleep(Duration::from_millis(400)).await;
        debouncer.push(2);
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_flushes_pending() {
        let (seen, apply) = recorder();
        let debouncer = Debouncer::spawn(Duration::from_secs(10), apply);

        debouncer.push(7);
        debouncer.close().await;

        assert_eq!(*seen.lock().unwrap(), vec![7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_edits_during_apply_collapse_to_newest() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let debouncer = Debouncer::spawn(Duration::from_millis(300), move |v: u32| {
            let sink = sink.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                sink.lock().unwrap().push(v);
            }
        });

        debouncer.push(1);
        tokio::time::sleep(Duration::from_millis(400)).await;
        // The loop is inside apply(1); none of these are observed until it returns
        for v in 2..=50 {
            assert!(debouncer.push(v));
        }
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(*seen.lock().unwrap(), vec![1, 50]);
    }
}
