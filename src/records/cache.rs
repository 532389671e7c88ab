//! Tolerant reader for cached record blobs.
//!
//! Clients keep a JSON copy of the record list around between visits. The
//! blob may be stale, truncated or hand-edited, so reading it never fails:
//! anything that is not a well-formed list comes back empty.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One `{name, email}` entry from a cached blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedRecord {
    pub name: String,
    pub email: String,
}

/// Parse a cached JSON list of `{name, email}` objects.
///
/// Malformed content yields an empty list.
pub fn parse_cached_records(text: &str) -> Vec<CachedRecord> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Vec<CachedRecord>>(text) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "Discarding malformed cached records");
            Vec::new()
        }
    }
}
