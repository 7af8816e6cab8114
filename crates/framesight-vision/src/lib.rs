//! Client for the vision analysis backend.
//!
//! The pipeline talks to the backend only through the [`AnalysisDispatcher`]
//! trait. [`VisionClient`] implements it over HTTP against a Messages-style
//! API, returning either the complete answer or a stream of text chunks
//! decoded from server-sent events.

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod sse;
pub mod types;

pub use client::{VisionClient, VisionClientConfig};
pub use dispatcher::{AnalysisDispatcher, AnalysisOutput, AnalysisRequest};
pub use error::{VisionError, VisionResult};
