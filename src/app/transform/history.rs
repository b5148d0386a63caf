//! Versioned preview history
//!
//! Ring buffer of accepted changes. Versions start at 1 and increase by
//! exactly one per accepted change; eviction drops the oldest entry and never
//! renumbers.

#![warn(clippy::all, rust_2018_idioms)]

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use crate::app::artifact::CodeArtifact;

pub const DEFAULT_HISTORY_CAP: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct PreviewState {
    pub version: u64,
    pub artifact: CodeArtifact,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PreviewHistory {
    entries: VecDeque<PreviewState>,
    cap: usize,
    next_version: u64,
}

impl PreviewHistory {
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
            next_version: 1,
        }
    }

    /// Record an accepted change and return its version
    pub fn push(&mut self, artifact: CodeArtifact) -> u64 {
        let version = self.next_version;
        self.next_version += 1;

        if self.entries.len() == self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(PreviewState {
            version,
            artifact,
            timestamp: Utc::now(),
        });
        version
    }

    pub fn get(&self, version: u64) -> Option<&PreviewState> {
        // Versions are contiguous inside the buffer
        let first = self.entries.front()?.version;
        let index = version.checked_sub(first)? as usize;
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&PreviewState> {
        self.entries.back()
    }

    pub fn versions(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.version).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

impl Default for PreviewHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}
