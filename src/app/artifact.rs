//! Code artifacts
//!
//! A [`CodeArtifact`] is one piece of generated source plus the forms derived
//! from it. Derived forms are computed once in the constructor from the raw
//! text and the transform that was active; nothing edits them afterwards. A new
//! generation produces a new artifact with a new [`ArtifactId`].

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::dependencies::{extract_modules, DependencySet};
use super::normalizer::normalize;
use super::transform::TransformPass;

static NEXT_ARTIFACT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing artifact identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub u64);

impl ArtifactId {
    fn next() -> Self {
        ArtifactId(NEXT_ARTIFACT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "artifact-{}", self.0)
    }
}

/// Generated source and its derived forms
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeArtifact {
    pub id: ArtifactId,
    /// Source exactly as received (LLM output, file contents, live update)
    pub raw: String,
    /// Markdown, module syntax and TypeScript stripped
    pub normalized: String,
    /// Output of the active transform pass, if one ran
    pub transformed: Option<String>,
    /// Name of the transform that produced `transformed`
    pub transform_name: Option<String>,
    /// Modules named by the raw source; normalization strips the imports
    pub dependencies: DependencySet,
    pub created_at: DateTime<Utc>,
}

impl CodeArtifact {
    /// Create an artifact with only the normalized form derived
    pub fn new(raw: impl Into<String>) -> Self {
        Self::derive(raw, None)
    }

    /// Create an artifact, running `transform` over the normalized form
    pub fn derive(raw: impl Into<String>, transform: Option<&dyn TransformPass>) -> Self {
        let raw = raw.into();
        let normalized = normalize(&raw);
        let dependencies = extract_modules(&raw);
        let (transformed, transform_name) = match transform {
            Some(pass) => (
                Some(pass.apply(&normalized)),
                Some(pass.name().to_string()),
            ),
            None => (None, None),
        };

        Self {
            id: ArtifactId::next(),
            raw,
            normalized,
            transformed,
            transform_name,
            dependencies,
            created_at: Utc::now(),
        }
    }

    /// Re-derive a fresh artifact from this one's raw text.
    ///
    /// Used when reverting: the stored code goes back through the same path as
    /// a new generation and gets a new identity.
    pub fn reissue(&self, transform: Option<&dyn TransformPass>) -> Self {
        Self::derive(self.raw.clone(), transform)
    }

    /// The form a strategy should execute
    pub fn executable(&self) -> &str {
        self.transformed.as_deref().unwrap_or(&self.normalized)
    }
}
