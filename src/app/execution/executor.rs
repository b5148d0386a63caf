//! Time-bounded execution shared by every strategy

#![warn(clippy::all, rust_2018_idioms)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::{ExecutionRequest, ExecutionResult, ExecutionStrategy, StrategyKind};
use crate::app::status::ErrorKind;

/// Races a strategy against its budget.
///
/// When the timer wins the strategy future is dropped, so a late success or
/// error from that attempt has nowhere to go.
#[derive(Clone)]
pub struct Executor {
    strategy: Arc<dyn ExecutionStrategy>,
}

impl Executor {
    pub fn new(strategy: Arc<dyn ExecutionStrategy>) -> Self {
        Self { strategy }
    }

    pub fn kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    pub fn budget(&self, debug: bool) -> Duration {
        self.strategy.budget(debug)
    }

    pub async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        let budget = self.strategy.budget(request.debug);
        let started = Instant::now();

        match tokio::time::timeout(budget, self.strategy.execute(request)).await {
            Ok(result) => {
                trace_debug!(
                    "{} attempt {} finished in {:?}: success={}",
                    self.strategy.kind(),
                    request.attempt,
                    started.elapsed(),
                    result.is_success()
                );
                result
            }
            Err(_elapsed) => {
                log_warn!(
                    "{} attempt {} timed out after {} ms",
                    self.strategy.kind(),
                    request.attempt,
                    budget.as_millis()
                );
                ExecutionResult::failure(
                    ErrorKind::Timeout,
                    format!(
                        "Preview did not finish within {} ms ({} strategy)",
                        budget.as_millis(),
                        self.strategy.kind()
                    ),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::artifact::CodeArtifact;
    use crate::app::dependencies::ModuleLoadReport;
    use crate::app::execution::RenderedOutput;
    use async_trait::async_trait;

    struct SleepyStrategy {
        delay: Duration,
    }

    #[async_trait]
    impl ExecutionStrategy for SleepyStrategy {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Iframe
        }

        fn budget(&self, debug: bool) -> Duration {
            if debug {
                Duration::from_millis(12_000)
            } else {
                Duration::from_millis(5_000)
            }
        }

        async fn execute(&self, _request: &ExecutionRequest) -> ExecutionResult {
            tokio::time::sleep(self.delay).await;
            ExecutionResult::success(RenderedOutput::Markup { html: "ok".into() })
        }
    }

    fn request(debug: bool) -> ExecutionRequest {
        ExecutionRequest {
            attempt: 1,
            artifact: Arc::new(CodeArtifact::new("function GeneratedApp() { return null; }")),
            modules: ModuleLoadReport::default(),
            debug,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_budget() {
        let executor = Executor::new(Arc::new(SleepyStrategy {
            delay: Duration::from_millis(4_000),
        }));
        assert!(executor.run(&request(false)).await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_wins() {
        let executor = Executor::new(Arc::new(SleepyStrategy {
            delay: Duration::from_secs(60),
        }));
        let started = tokio::time::Instant::now();
        let result = executor.run(&request(false)).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(5_000), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(5_010), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_budget_is_longer() {
        let executor = Executor::new(Arc::new(SleepyStrategy {
            delay: Duration::from_millis(8_000),
        }));
        assert_eq!(executor.run(&request(false)).await.error_kind(), Some(ErrorKind::Timeout));
        assert!(executor.run(&request(true)).await.is_success());
    }
}
