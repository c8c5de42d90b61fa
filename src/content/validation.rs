use super::ContentDescriptor;
use serde::{Deserialize, Serialize};

/// Validation errors for content descriptors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DescriptorError {
    #[error("src is required")]
    MissingSource,
    #[error("src is too long ({len} bytes, limit {limit})")]
    SourceTooLong { len: usize, limit: usize },
    #[error("src must not contain whitespace or control characters")]
    InvalidSource,
    #[error("startAt must be positive, got {0}")]
    InvalidAnchor(i64),
    #[error("startAt is {ahead_ms}ms in the future (limit {limit_ms}ms)")]
    AnchorInFuture { ahead_ms: i64, limit_ms: i64 },
    #[error("durationHint must be a positive, finite number of seconds")]
    InvalidDurationHint,
}

/// What to do with an anchor that lies further in the future than the
/// allowed skew.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FutureAnchorPolicy {
    #[default]
    Reject,
    Clamp,
}

/// Limits applied to every descriptor before it is stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublishPolicy {
    /// Anchors up to this far ahead of the server clock are silently pulled
    /// back to "now"
    #[serde(default = "default_max_future_skew_ms")]
    pub max_future_skew_ms: i64,

    #[serde(default)]
    pub future_anchor_policy: FutureAnchorPolicy,

    #[serde(default = "default_max_source_len")]
    pub max_source_len: usize,
}

fn default_max_future_skew_ms() -> i64 {
    2_000
}

fn default_max_source_len() -> usize {
    2_048
}

impl Default for PublishPolicy {
    fn default() -> Self {
        Self {
            max_future_skew_ms: default_max_future_skew_ms(),
            future_anchor_policy: FutureAnchorPolicy::default(),
            max_source_len: default_max_source_len(),
        }
    }
}

/// Validates a descriptor against `policy` at server time `now_ms`.
///
/// Validation rules:
/// - `source_ref`: trimmed, non-empty, no whitespace or control characters,
///   at most `max_source_len` bytes
/// - `anchor_time_ms`: positive; never later than `now_ms` once accepted.
///   Anchors within `max_future_skew_ms` are clamped to `now_ms`, anchors
///   beyond it are rejected or clamped according to `future_anchor_policy`
/// - `duration_hint`: non-zero when present
///
/// Returns the normalized descriptor on success.
pub fn validate_descriptor(
    mut descriptor: ContentDescriptor,
    policy: &PublishPolicy,
    now_ms: i64,
) -> Result<ContentDescriptor, DescriptorError> {
    let trimmed = descriptor.source_ref.trim();
    if trimmed.is_empty() {
        return Err(DescriptorError::MissingSource);
    }
    if trimmed.len() > policy.max_source_len {
        return Err(DescriptorError::SourceTooLong {
            len: trimmed.len(),
            limit: policy.max_source_len,
        });
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(DescriptorError::InvalidSource);
    }
    if trimmed.len() != descriptor.source_ref.len() {
        descriptor.source_ref = trimmed.to_string();
    }

    if descriptor.anchor_time_ms <= 0 {
        return Err(DescriptorError::InvalidAnchor(descriptor.anchor_time_ms));
    }

    let ahead_ms = descriptor.anchor_time_ms - now_ms;
    if ahead_ms > 0 {
        if ahead_ms > policy.max_future_skew_ms
            && policy.future_anchor_policy == FutureAnchorPolicy::Reject
        {
            return Err(DescriptorError::AnchorInFuture {
                ahead_ms,
                limit_ms: policy.max_future_skew_ms,
            });
        }
        descriptor.anchor_time_ms = now_ms;
    }

    if matches!(descriptor.duration_hint, Some(d) if d.is_zero()) {
        return Err(DescriptorError::InvalidDurationHint);
    }

    Ok(descriptor)
}
