//! Transform / live-update layer
//!
//! - [`TransformPass`] is the seam where a source-to-source rewrite runs in
//!   front of an execution strategy. [`ToyJsxTransform`] is the only pass
//!   shipped; a real transpiler would slot in behind the same trait.
//! - [`Debouncer`] coalesces bursts of edits into one apply.
//! - [`PreviewHistory`] keeps the bounded, versioned list of accepted changes.

#![warn(clippy::all, rust_2018_idioms)]

pub mod debounce;
pub mod history;
pub mod jsx;

pub use debounce::Debouncer;
pub use history::{PreviewHistory, PreviewState, DEFAULT_HISTORY_CAP};
pub use jsx::ToyJsxTransform;

/// A source-to-source rewrite applied to normalized code
pub trait TransformPass: Send + Sync {
    /// Stable name recorded on artifacts produced with this pass
    fn name(&self) -> &'static str;

    /// Rewrite `code`. Must not panic; untransformable input is returned as is.
    fn apply(&self, code: &str) -> String;
}
