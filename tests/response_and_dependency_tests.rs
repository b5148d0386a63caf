//! Response framing tolerance and dependency loading under partial failure.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use uiforge::app::artifact::CodeArtifact;
use uiforge::app::dependencies::{
    extract_modules, DependencyResolver, FetchError, ModuleFetcher, ModuleLoadStatus,
};
use uiforge::app::normalizer::normalize;
use uiforge::app::response_parser::{parse_response, ResponseShape};
use uiforge::app::status::{ErrorKind, PreviewEvent, StatusBus};

const COMPONENT: &str = "function GeneratedApp() {\n  return <Card>Hello</Card>;\n}";

#[test]
fn test_parser_accepts_full_framing() {
    let text = format!("DESCRIPTION: A greeting card.\n\nCODE:\n{}", COMPONENT);
    let parsed = parse_response(&text);
    assert_eq!(parsed.shape, ResponseShape::Framed);
    assert_eq!(parsed.description.as_deref(), Some("A greeting card."));
    assert_eq!(parsed.code, COMPONENT);
}

#[test]
fn test_parser_accepts_fence_without_description() {
    let text = format!("Sure! Here it is:\n\n```jsx\n{}\n```\n\nLet me know if you need changes.", COMPONENT);
    let parsed = parse_response(&text);
    assert_eq!(parsed.shape, ResponseShape::Fenced);
    assert_eq!(parsed.code, COMPONENT);
    assert_eq!(parsed.description.as_deref(), Some("Sure! Here it is:"));
}

#[test]
fn test_parser_accepts_bare_function() {
    let text = format!("The component below renders a card.\n\n{}", COMPONENT);
    let parsed = parse_response(&text);
    assert_eq!(parsed.shape, ResponseShape::BareFunction);
    assert_eq!(parsed.code, COMPONENT);
    assert_eq!(parsed.description.as_deref(), Some("The component below renders a card."));

    let arrow = parse_response("const GeneratedApp = () => <div/>;");
    assert_eq!(arrow.shape, ResponseShape::BareFunction);
}

#[test]
fn test_parser_never_fails() {
    for text in ["", "no code at all", "```", "DESCRIPTION:", "\u{0}\u{1}garbage\u{fffd}"] {
        let parsed = parse_response(text);
        assert_eq!(parsed.code, parsed.code.trim());
    }
    assert_eq!(parse_response("no code at all").shape, ResponseShape::Whole);
}

#[test]
fn test_markdown_wrapped_code_is_stripped_and_modules_kept() {
    let raw = "```tsx\nimport React from 'react';\nimport _ from 'lodash';\nfunction GeneratedApp(){return null;}\n```";
    let normalized = normalize(raw);
    assert!(!normalized.contains('`'));
    assert!(!normalized.lines().any(|line| line.starts_with("import")));
    assert_eq!(normalized, "function GeneratedApp(){return null;}");

    let artifact = CodeArtifact::new(raw);
    assert_eq!(artifact.normalized, normalized);
    assert!(artifact.dependencies.contains("lodash"));
    assert!(artifact.dependencies.contains("react"));
}

/// Serves canned sources by URL fragment and records the call order
struct CannedFetcher {
    available: Vec<(&'static str, &'static str)>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ModuleFetcher for CannedFetcher {
    async fn fetch(&self, url: &str) -> Result<Arc<String>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.available
            .iter()
            .find(|(fragment, _)| url.contains(fragment))
            .map(|(_, source)| Arc::new(source.to_string()))
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[tokio::test]
async fn test_partial_failure_loads_the_rest_of_the_batch() {
    let code = r#"
import React from 'react';
import _ from 'lodash';
import clsx from 'clsx';
import { format } from 'date-fns';
import { LineChart } from 'recharts';
import { Card } from '@/components/ui/card';
const pad = require('left-pad');
"#;
    let names = extract_modules(code);
    assert_eq!(names.len(), 7);

    let fetcher = Arc::new(CannedFetcher {
        available: vec![
            ("clsx", "var clsx = function () { return ''; };"),
            ("date-fns", "var dateFns = {};"),
        ],
        calls: Mutex::new(Vec::new()),
    });
    let resolver = DependencyResolver::new(fetcher.clone());
    let bus = StatusBus::new();
    let mut events = bus.subscribe();

    let report = resolver.load_modules(&names, 4, &bus, None).await;

    let summary: BTreeMap<&str, bool> = report
        .statuses
        .iter()
        .map(|(name, status)| (name.as_str(), status.is_loaded()))
        .collect();
    assert_eq!(
        summary,
        BTreeMap::from([
            ("@/components/ui/card", true),
            ("clsx", true),
            ("date-fns", true),
            ("left-pad", false),
            ("lodash", false),
            ("react", true),
            ("recharts", false),
        ])
    );
    assert_eq!(
        report.modules.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(),
        vec!["clsx", "date-fns"]
    );
    assert_eq!(report.required_failures(), vec!["left-pad", "lodash"]);

    // Only CDN modules hit the network, in set order
    let calls = fetcher.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 4);
    assert!(calls[0].contains("clsx"));
    assert!(calls[3].contains("recharts"));

    let mut snapshots = Vec::new();
    let mut dependency_errors = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            PreviewEvent::Modules { attempt, statuses } => {
                assert_eq!(attempt, 4);
                snapshots.push(statuses);
            }
            PreviewEvent::Error(error) => {
                assert_eq!(error.kind, ErrorKind::DependencyError);
                dependency_errors.push(error.message);
            }
            _ => {}
        }
    }

    // One pending snapshot, then one per module
    assert_eq!(snapshots.len(), 8);
    assert!(snapshots[0].values().all(|s| *s == ModuleLoadStatus::Pending));
    assert_eq!(snapshots.last(), Some(&report.statuses));

    // The chart library fails silently
    assert_eq!(dependency_errors.len(), 2);
    assert!(dependency_errors.iter().all(|m| !m.contains("recharts")));
}
