//! Listing blob serialization.
//!
//! A category listing is stored as one JSON blob so a reader always sees a
//! consistent snapshot of the whole ordering. A blob that fails to decode
//! is treated as a cache miss, never as a reader error.

use tracing::warn;

use crate::domain::posts::PostSummary;

/// Serialize an ordered listing into one blob.
pub fn encode_listing(items: &[PostSummary]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(items)
}

/// Deserialize a listing blob. Returns `None` on malformed input so the
/// caller falls through to its miss path.
pub fn decode_listing(bytes: &[u8]) -> Option<Vec<PostSummary>> {
    match serde_json::from_slice(bytes) {
        Ok(items) => Some(items),
        Err(err) => {
            warn!(error = %err, "cached listing blob failed to decode; treating as miss");
            None
        }
    }
}
