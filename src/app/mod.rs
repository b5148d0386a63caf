//! Core modules of the preview pipeline.
//!
//! # Module Organization
//!
//! ## Preparation
//! - [`artifact`] - generated source and its derived forms
//! - [`normalizer`] - markdown, module syntax and TypeScript stripping
//! - [`transform`] - optional rewrite passes, debouncing, version history
//! - [`shims`] - the component catalogue injected into every strategy
//! - [`dependencies`] - module extraction, CDN table and loading
//!
//! ## Execution
//! - [`execution`] - the strategy trait, the shared executor and the three strategies
//! - [`v8_bindings`] - embedded V8 for the in-process strategy
//! - [`sandbox`] - iframe documents, frame identity and mounting
//! - [`webview`] - webview subprocess and the frame signal server
//!
//! ## Surface
//! - [`orchestrator`] - one preview pane: attempts, history, fallback
//! - [`status`] - error taxonomy and the event bus
//! - [`generation_client`] / [`response_parser`] - the model call
//! - [`live`] - file and HTTP live-update sources
//! - [`config`] - settings file and environment overrides

pub mod artifact;
pub mod config;
pub mod dependencies;
pub mod execution;
pub mod generation_client;
pub mod live;
pub mod normalizer;
pub mod orchestrator;
pub mod response_parser;
pub mod sandbox;
pub mod shims;
pub mod status;
pub mod transform;
pub mod v8_bindings;
pub mod webview;
