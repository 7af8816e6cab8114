//! Encoded image payloads.

use serde::{Deserialize, Serialize};

/// An image ready to be sent to the vision backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImage {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type of the encoded bytes
    pub media_type: String,
    /// Width in pixels after resizing
    pub width: u32,
    /// Height in pixels after resizing
    pub height: u32,
    /// Estimated token cost of the image
    pub estimated_tokens: u64,
}
