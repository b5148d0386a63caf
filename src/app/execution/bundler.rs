//! External bundler execution
//!
//! Fallback strategy. The artifact becomes a small multi-file React project
//! which is handed to a hosted bundling service; the service answers with a
//! sandbox id, or rejects the project. There is no finer signal than that: a
//! sandbox that builds but crashes in the browser still counts as a success
//! here.

#![warn(clippy::all, rust_2018_idioms)]

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{ExecutionRequest, ExecutionResult, ExecutionStrategy, RenderedOutput, StrategyKind};
use crate::app::artifact::CodeArtifact;
use crate::app::dependencies::{resolve, Resolution};
use crate::app::normalizer::{entry_point, ENTRY_POINT};
use crate::app::shims::{es_module_source, CATALOGUE, FRAMEWORK_NAMES};
use crate::app::status::ErrorKind;

pub const DEFAULT_DEFINE_URL: &str = "https://codesandbox.io/api/v1/sandboxes/define?json=1";
pub const DEFAULT_BUNDLER_BUDGET: Duration = Duration::from_secs(20);

/// Versions pinned into the generated package.json
const BASE_DEPENDENCIES: &[(&str, &str)] = &[
    ("react", "18.2.0"),
    ("react-dom", "18.2.0"),
    ("react-scripts", "5.0.1"),
    ("recharts", "2.12.7"),
];

static IMPORT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+[^;\n]*?\s+from\s+['"]([^'"\n]+)['"];?\s*$"#)
        .expect("Invalid regex pattern")
});

static DECLARED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:const|let|var|function|class)\s+([A-Za-z_$][\w$]*)").expect("Invalid regex pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundlerError {
    Rejected { status: u16, message: String },
    Network(String),
    InvalidResponse(String),
    InvalidUrl(String),
}

impl fmt::Display for BundlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundlerError::Rejected { status, message } => {
                write!(f, "Bundler rejected the project (HTTP {}): {}", status, message)
            }
            BundlerError::Network(message) => write!(f, "Bundler unreachable: {}", message),
            BundlerError::InvalidResponse(message) => {
                write!(f, "Bundler returned an unreadable response: {}", message)
            }
            BundlerError::InvalidUrl(url) => write!(f, "Invalid bundler URL: {}", url),
        }
    }
}

impl std::error::Error for BundlerError {}

/// Files of the generated project, keyed by path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualProject {
    pub files: BTreeMap<String, String>,
}

impl VirtualProject {
    pub fn from_artifact(artifact: &CodeArtifact) -> Self {
        let code = artifact.executable();
        let entry = entry_point(&artifact.normalized).unwrap_or_else(|| ENTRY_POINT.to_string());

        let mut dependencies: BTreeMap<String, String> = BASE_DEPENDENCIES
            .iter()
            .map(|(name, version)| (name.to_string(), version.to_string()))
            .collect();
        for name in &artifact.dependencies {
            if let Resolution::Cdn(spec) = resolve(name) {
                dependencies.entry(spec.name.to_string()).or_insert_with(|| "latest".to_string());
            }
        }

        let package = serde_json::json!({
            "name": "uiforge-preview",
            "version": "1.0.0",
            "private": true,
            "main": "src/index.js",
            "dependencies": dependencies,
        });

        let mut files = BTreeMap::new();
        files.insert(
            "package.json".to_string(),
            serde_json::to_string_pretty(&package).unwrap_or_default(),
        );
        files.insert(
            "public/index.html".to_string(),
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<script src=\"https://cdn.tailwindcss.com\"></script>\n</head>\n<body>\n<div id=\"root\"></div>\n</body>\n</html>\n".to_string(),
        );
        files.insert(
            "src/index.js".to_string(),
            "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nimport App from './App';\n\ncreateRoot(document.getElementById('root')).render(React.createElement(App));\n".to_string(),
        );
        files.insert("src/shims.js".to_string(), es_module_source());
        files.insert("src/App.js".to_string(), app_module(artifact, code, &entry));

        Self { files }
    }
}

/// Every name bound by a `const`/`let`/`var`/`function`/`class` declaration
fn declared_names(code: &str) -> HashSet<&str> {
    DECLARED_NAME
        .captures_iter(code)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// App.js: the normalized code with the imports it needs put back
fn app_module(artifact: &CodeArtifact, code: &str, entry: &str) -> String {
    let declared = declared_names(code);
    let hooks: Vec<&str> = FRAMEWORK_NAMES
        .iter()
        .copied()
        .filter(|name| !matches!(*name, "React" | "ReactDOM" | "document"))
        .filter(|name| !declared.contains(name))
        .collect();
    let shims: Vec<&str> = CATALOGUE
        .iter()
        .map(|entry| entry.name)
        .filter(|name| !declared.contains(name))
        .collect();

    // Imports of real packages survive as written; shim and React imports are replaced
    let preserved: Vec<&str> = IMPORT_LINE
        .captures_iter(&artifact.raw)
        .filter(|caps| {
            caps.get(1)
                .map(|m| matches!(resolve(m.as_str()), Resolution::Cdn(_)))
                .unwrap_or(false)
        })
        .filter_map(|caps| caps.get(0).map(|m| m.as_str().trim()))
        .collect();

    let mut module = String::new();
    module.push_str(&format!("import React, {{ {} }} from 'react';\n", hooks.join(", ")));
    module.push_str(&format!("import {{ {} }} from './shims';\n", shims.join(", ")));
    for line in preserved {
        module.push_str(line);
        module.push('\n');
    }
    module.push('\n');
    module.push_str(code);
    module.push_str(&format!("\n\nexport default {};\n", entry));
    module
}

/// A sandbox created by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxHandle {
    pub sandbox_id: String,
    pub embed_url: String,
}

#[async_trait]
pub trait BundlerClient: Send + Sync {
    async fn define(&self, project: &VirtualProject) -> Result<SandboxHandle, BundlerError>;
}

#[derive(Serialize)]
struct DefineFile<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct DefineResponse {
    sandbox_id: String,
}

/// Client for a "define" style sandbox API
pub struct DefineApiClient {
    client: reqwest::Client,
    define_url: url::Url,
}

impl DefineApiClient {
    pub fn new(define_url: &str, timeout: Duration) -> Result<Self, BundlerError> {
        let define_url =
            url::Url::parse(define_url).map_err(|_| BundlerError::InvalidUrl(define_url.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BundlerError::Network(e.to_string()))?;
        Ok(Self { client, define_url })
    }

    pub fn embed_url(&self, sandbox_id: &str) -> String {
        format!(
            "{}/embed/{}?view=preview&hidenavigation=1",
            self.define_url.origin().ascii_serialization(),
            sandbox_id
        )
    }

    fn request_body(project: &VirtualProject) -> serde_json::Value {
        let files: BTreeMap<&str, DefineFile<'_>> = project
            .files
            .iter()
            .map(|(path, content)| (path.as_str(), DefineFile { content }))
            .collect();
        serde_json::json!({ "files": files })
    }
}

#[async_trait]
impl BundlerClient for DefineApiClient {
    async fn define(&self, project: &VirtualProject) -> Result<SandboxHandle, BundlerError> {
        let response = self
            .client
            .post(self.define_url.clone())
            .json(&Self::request_body(project))
            .send()
            .await
            .map_err(|e| BundlerError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BundlerError::Rejected {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        let parsed: DefineResponse = response
            .json()
            .await
            .map_err(|e| BundlerError::InvalidResponse(e.to_string()))?;

        Ok(SandboxHandle {
            embed_url: self.embed_url(&parsed.sandbox_id),
            sandbox_id: parsed.sandbox_id,
        })
    }
}

pub struct BundlerStrategy {
    client: Arc<dyn BundlerClient>,
    budget: Duration,
}

impl BundlerStrategy {
    pub fn new(client: Arc<dyn BundlerClient>) -> Self {
        Self {
            client,
            budget: DEFAULT_BUNDLER_BUDGET,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }
}

#[async_trait]
impl ExecutionStrategy for BundlerStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Bundler
    }

    fn budget(&self, _debug: bool) -> Duration {
        self.budget
    }

    async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        let project = VirtualProject::from_artifact(&request.artifact);
        trace_debug!("Posting {} files for {}", project.files.len(), request.artifact.id);

        match self.client.define(&project).await {
            Ok(handle) => {
                log_info!("Sandbox {} created for {}", handle.sandbox_id, request.artifact.id);
                ExecutionResult::success(RenderedOutput::Sandbox {
                    sandbox_id: handle.sandbox_id,
                    embed_url: handle.embed_url,
                })
            }
            Err(e) => {
                log_warn!("Bundler failed for {}: {}", request.artifact.id, e);
                ExecutionResult::failure(ErrorKind::RuntimeError, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::dependencies::ModuleLoadReport;
    use std::sync::Mutex;

    const SOURCE: &str = r#"import React, { useState } from 'react';
import { Card } from '@/components/ui/card';
import _ from 'lodash';

const Badge = ({ children }) => <span>{children}</span>;

export default function GeneratedApp() {
  const [items] = useState(_.range(3));
  return <Card><Badge>{items.length}</Badge></Card>;
}
"#;

    struct StubClient {
        reply: Result<SandboxHandle, BundlerError>,
        seen: Mutex<Option<VirtualProject>>,
    }

    #[async_trait]
    impl BundlerClient for StubClient {
        async fn define(&self, project: &VirtualProject) -> Result<SandboxHandle, BundlerError> {
            *self.seen.lock().unwrap() = Some(project.clone());
            self.reply.clone()
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            attempt: 1,
            artifact: Arc::new(CodeArtifact::new(SOURCE)),
            modules: ModuleLoadReport::default(),
            debug: false,
        }
    }

    #[test]
    fn test_project_layout() {
        let project = VirtualProject::from_artifact(&CodeArtifact::new(SOURCE));
        let paths: Vec<&str> = project.files.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["package.json", "public/index.html", "src/App.js", "src/index.js", "src/shims.js"]
        );

        let package: serde_json::Value = serde_json::from_str(&project.files["package.json"]).unwrap();
        assert_eq!(package["dependencies"]["react"], "18.2.0");
        assert_eq!(package["dependencies"]["lodash"], "latest");
    }

    #[test]
    fn test_app_module_restores_imports() {
        let project = VirtualProject::from_artifact(&CodeArtifact::new(SOURCE));
        let app = &project.files["src/App.js"];

        assert!(app.contains("import _ from 'lodash';"));
        assert!(app.contains("from './shims';"));
        assert!(!app.contains("@/components/ui/card"));
        assert!(app.ends_with("export default GeneratedApp;\n"));

        let shim_import = app.lines().find(|line| line.contains("./shims")).unwrap();
        assert!(shim_import.contains(" Card,"));
        // Declared locally, so not imported
        assert!(!shim_import.contains(" Badge,"));
    }

    #[test]
    fn test_declared_names_match_whole_identifiers() {
        let code = "const Badges = [];\nfunction useStateful() {}\nclass Card {}\nlet $x = 1, y = 2;\n// const Alert";
        let declared = declared_names(code);
        assert!(declared.contains("Badges"));
        assert!(declared.contains("useStateful"));
        assert!(declared.contains("Card"));
        assert!(declared.contains("$x"));
        assert!(!declared.contains("Badge"));
        assert!(!declared.contains("useState"));

        let project = VirtualProject::from_artifact(&CodeArtifact::new(code));
        let app = &project.files["src/App.js"];
        let shim_import = app.lines().find(|line| line.contains("./shims")).unwrap();
        assert!(shim_import.contains(" Badge,"));
        assert!(!shim_import.contains(" Card,"));
        assert!(app.lines().next().unwrap().contains("useState,"));
    }

    #[test]
    fn test_embed_url_uses_service_origin() {
        let client = DefineApiClient::new(DEFAULT_DEFINE_URL, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.embed_url("abc123"),
            "https://codesandbox.io/embed/abc123?view=preview&hidenavigation=1"
        );
        assert!(DefineApiClient::new("not a url", Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_request_body_shape() {
        let project = VirtualProject::from_artifact(&CodeArtifact::new(SOURCE));
        let body = DefineApiClient::request_body(&project);
        assert!(body["files"]["src/App.js"]["content"].is_string());
        assert_eq!(body["files"].as_object().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_success_and_rejection() {
        let ok = BundlerStrategy::new(Arc::new(StubClient {
            reply: Ok(SandboxHandle {
                sandbox_id: "sb1".into(),
                embed_url: "https://example.test/embed/sb1".into(),
            }),
            seen: Mutex::new(None),
        }));
        assert_eq!(
            ok.execute(&request()).await,
            ExecutionResult::success(RenderedOutput::Sandbox {
                sandbox_id: "sb1".into(),
                embed_url: "https://example.test/embed/sb1".into(),
            })
        );

        let rejected = BundlerStrategy::new(Arc::new(StubClient {
            reply: Err(BundlerError::Rejected {
                status: 422,
                message: "bad package.json".into(),
            }),
            seen: Mutex::new(None),
        }));
        match rejected.execute(&request()).await {
            ExecutionResult::Failure { kind, message } => {
                assert_eq!(kind, ErrorKind::RuntimeError);
                assert!(message.contains("bad package.json"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
