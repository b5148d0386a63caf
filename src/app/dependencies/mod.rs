//! Dependency Resolver
//!
//! Two halves:
//!
//! - [`extract_modules`]: static, never fails. Unions `import … from '…'` and
//!   `require('…')` specifiers into a deduplicated [`DependencySet`].
//! - [`DependencyResolver::load_modules`]: sequential, failure tolerant. Each
//!   module is attempted in set order, the status map is published after every
//!   attempt, and a failure is recorded rather than aborting the batch.
//!
//! Failures of required modules go to the error channel as
//! `DependencyError`; failures of optional (chart) modules are only logged.

#![warn(clippy::all, rust_2018_idioms)]

pub mod fetcher;
pub mod table;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::time::Instant;

pub use fetcher::{FetchError, HttpModuleFetcher, ModuleFetcher, DEFAULT_FETCH_TIMEOUT};
pub use table::{is_optional, resolve, ModuleSpec, Resolution};

use crate::app::status::{ErrorKind, PreviewEvent, StatusBus};

const DEADLINE_REASON: &str = "dependency loading ran past the attempt budget";

/// Distinct module specifiers referenced by an artifact
pub type DependencySet = BTreeSet<String>;

static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(?:type\s+)?(?:[\w$*{}\s,]+?\s+from\s+)?['"]([^'"\n]+)['"]"#)
        .expect("Invalid regex pattern")
});

static REQUIRE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\brequire\(\s*['"]([^'"\n]+)['"]\s*\)"#).expect("Invalid regex pattern")
});

/// Statically extract referenced module names
pub fn extract_modules(code: &str) -> DependencySet {
    IMPORT_FROM
        .captures_iter(code)
        .chain(REQUIRE_CALL.captures_iter(code))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ModuleLoadStatus {
    Pending,
    Loaded,
    Failed { reason: String },
}

impl ModuleLoadStatus {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ModuleLoadStatus::Loaded)
    }
}

/// A module that resolved and needs to be made available to the strategy
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub name: String,
    pub url: &'static str,
    pub global: &'static str,
    /// Fetched UMD source
    pub source: Arc<String>,
}

/// Outcome of one batch. Authoritative only once the batch has completed.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoadReport {
    pub statuses: BTreeMap<String, ModuleLoadStatus>,
    /// CDN modules that loaded, in load order
    pub modules: Vec<LoadedModule>,
}

impl ModuleLoadReport {
    pub fn failed(&self) -> Vec<&str> {
        self.statuses
            .iter()
            .filter(|(_, status)| matches!(status, ModuleLoadStatus::Failed { .. }))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Failures that are surfaced to the user
    pub fn required_failures(&self) -> Vec<&str> {
        self.failed().into_iter().filter(|name| !is_optional(name)).collect()
    }
}

pub struct DependencyResolver {
    fetcher: Arc<dyn ModuleFetcher>,
}

impl DependencyResolver {
    pub fn new(fetcher: Arc<dyn ModuleFetcher>) -> Self {
        Self { fetcher }
    }

    /// Load every module of `names` in order.
    ///
    /// Publishes a [`PreviewEvent::Modules`] snapshot for `attempt` after each
    /// module and a [`PreviewEvent::Error`] for each required failure. Once
    /// `deadline` passes, the fetch in flight and every module after it are
    /// marked failed without further network traffic.
    pub async fn load_modules(
        &self,
        names: &DependencySet,
        attempt: u64,
        bus: &StatusBus,
        deadline: Option<Instant>,
    ) -> ModuleLoadReport {
        let mut report = ModuleLoadReport {
            statuses: names
                .iter()
                .map(|name| (name.clone(), ModuleLoadStatus::Pending))
                .collect(),
            modules: Vec::new(),
        };

        if names.is_empty() {
            return report;
        }

        bus.publish(PreviewEvent::Modules {
            attempt,
            statuses: report.statuses.clone(),
        });

        for name in names {
            let status = match resolve(name) {
                Resolution::Builtin(_) | Resolution::Shim => ModuleLoadStatus::Loaded,
                Resolution::Cdn(spec) => match self.fetch_before(spec.url, deadline).await {
                    Ok(source) => {
                        report.modules.push(LoadedModule {
                            name: name.clone(),
                            url: spec.url,
                            global: spec.global,
                            source,
                        });
                        ModuleLoadStatus::Loaded
                    }
                    Err(reason) => ModuleLoadStatus::Failed { reason },
                },
                Resolution::Local => ModuleLoadStatus::Failed {
                    reason: format!("Module '{}' is not in the resolution table", name),
                },
            };

            if let ModuleLoadStatus::Failed { reason } = &status {
                if is_optional(name) {
                    log_warn!("Optional module '{}' failed to load: {}", name, reason);
                } else {
                    log_error!("Module '{}' failed to load: {}", name, reason);
                    bus.report_error(
                        ErrorKind::DependencyError,
                        format!("Failed to load module '{}': {}", name, reason),
                        Some(attempt),
                    );
                }
            } else {
                trace_debug!("Module '{}' loaded", name);
            }

            report.statuses.insert(name.clone(), status);
            bus.publish(PreviewEvent::Modules {
                attempt,
                statuses: report.statuses.clone(),
            });
        }

        report
    }

    async fn fetch_before(&self, url: &str, deadline: Option<Instant>) -> Result<Arc<String>, String> {
        let Some(deadline) = deadline else {
            return self.fetcher.fetch(url).await.map_err(|e| e.to_string());
        };
        if Instant::now() >= deadline {
            return Err(DEADLINE_REASON.to_string());
        }
        match tokio::time::timeout_at(deadline, self.fetcher.fetch(url)).await {
            Ok(fetched) => fetched.map_err(|e| e.to_string()),
            Err(_elapsed) => Err(DEADLINE_REASON.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extracts_both_patterns_deduplicated() {
        let code = r#"
import React, { useState } from 'react';
import {
  Card,
  CardContent,
} from "@/components/ui/card";
import './styles.css';
const _ = require('lodash');
const again = require("lodash");
import type { Props } from './types';
"#;
        let names: Vec<_> = extract_modules(code).into_iter().collect();
        assert_eq!(
            names,
            vec!["./styles.css", "./types", "@/components/ui/card", "lodash", "react"]
        );
    }

    #[test]
    fn test_extraction_is_total() {
        assert!(extract_modules("").is_empty());
        assert!(extract_modules("import from '' require(").is_empty());

        let garbage: String = (0..5000u32)
            .map(|i| char::from_u32((i * 7919) % 0x2FFF).unwrap_or('?'))
            .collect();
        let _ = extract_modules(&garbage);

        let big = "import { a } from 'a';\nconst x = require('b');\n".repeat(5_000);
        let names = extract_modules(&big);
        assert_eq!(names.len(), 2);
    }

    /// Every fetch takes longer than any sane budget
    struct StalledFetcher {
        calls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl ModuleFetcher for StalledFetcher {
        async fn fetch(&self, url: &str) -> Result<Arc<String>, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            tokio::time::sleep(std::time::Duration::from_secs(8)).await;
            Ok(Arc::new(String::new()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_stops_at_deadline() {
        let fetcher = Arc::new(StalledFetcher {
            calls: std::sync::Mutex::new(Vec::new()),
        });
        let resolver = DependencyResolver::new(fetcher.clone());
        let bus = StatusBus::new();
        let mut events = bus.subscribe();
        let names: DependencySet = ["clsx", "date-fns", "lodash", "react"]
            .into_iter()
            .map(String::from)
            .collect();

        let started = Instant::now();
        let deadline = started + std::time::Duration::from_secs(5);
        let report = resolver.load_modules(&names, 1, &bus, Some(deadline)).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= std::time::Duration::from_secs(5), "{:?}", elapsed);
        assert!(elapsed < std::time::Duration::from_millis(5_010), "{:?}", elapsed);
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
        assert_eq!(report.failed(), vec!["clsx", "date-fns", "lodash"]);
        assert!(report.statuses["react"].is_loaded());
        for name in ["clsx", "date-fns", "lodash"] {
            assert_eq!(
                report.statuses[name],
                ModuleLoadStatus::Failed {
                    reason: DEADLINE_REASON.to_string()
                }
            );
        }

        let mut dependency_errors = 0;
        while let Ok(event) = events.try_recv() {
            if let PreviewEvent::Error(error) = event {
                assert_eq!(error.kind, ErrorKind::DependencyError);
                dependency_errors += 1;
            }
        }
        assert_eq!(dependency_errors, 3);
    }

    #[test]
    fn test_report_splits_required_and_optional() {
        let mut report = ModuleLoadReport::default();
        report.statuses.insert("react".into(), ModuleLoadStatus::Loaded);
        report.statuses.insert(
            "recharts".into(),
            ModuleLoadStatus::Failed { reason: "x".into() },
        );
        report.statuses.insert(
            "left-pad".into(),
            ModuleLoadStatus::Failed { reason: "x".into() },
        );

        assert_eq!(report.failed(), vec!["left-pad", "recharts"]);
        assert_eq!(report.required_failures(), vec!["left-pad"]);
    }
}
