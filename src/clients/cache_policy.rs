use serde::{Deserialize, Serialize};

use crate::models::chat::ChatMessage;

/// Upstream prompt-cache directive attached to a content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub control_type: String,
    pub ttl: String,
}

impl CacheControl {
    /// Ephemeral cache entry with a one-hour time-to-live.
    pub fn ephemeral() -> Self {
        CacheControl {
            control_type: "ephemeral".to_string(),
            ttl: "1h".to_string(),
        }
    }
}

/// Strategy deciding which transcript positions get a cache directive.
/// Swapping the policy never touches the relay loop; it only changes the
/// outbound request construction.
pub type CachePolicy = fn(&[ChatMessage], usize) -> Option<CacheControl>;

/// Marks the second-to-last message of the transcript. Together with the
/// always-cached system block this keeps the unchanged prefix of a growing
/// conversation cached across round trips. A cost/latency optimization
/// only; correctness does not depend on it.
pub fn trailing_prefix_policy(messages: &[ChatMessage], index: usize) -> Option<CacheControl> {
    if messages.len() >= 2 && index == messages.len() - 2 {
        Some(CacheControl::ephemeral())
    } else {
        None
    }
}

/// Disables prompt caching entirely.
pub fn no_cache_policy(_messages: &[ChatMessage], _index: usize) -> Option<CacheControl> {
    None
}
