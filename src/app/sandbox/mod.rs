//! Iframe sandbox plumbing
//!
//! Frame identity and message correlation ([`frames`]), the generated HTML
//! ([`document`]) and the window that hosts it ([`host`]).

#![warn(clippy::all, rust_2018_idioms)]

pub mod document;
pub mod frames;
pub mod host;

pub use document::{frame_document, host_page, script_literal, DocumentModule, FrameDocumentOptions};
pub use frames::{classify_frame_error, Delivery, FrameId, FrameMessage, FrameRegistration, FrameRegistry};
pub use host::{FrameHost, FrameHostError, WebviewFrameHost};
