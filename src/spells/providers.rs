//! Asynchronous fact providers
//!
//! `#ihash`, `#video` and `#vauthor` may need data the caller has not
//! resolved yet: a perceptual image hash or video metadata. The engine asks a
//! [`Providers`] implementation for it through the shared
//! [`Scheduler`](super::scheduler::Scheduler).
//!
//! A provider that is being rate limited returns
//! [`ProviderError::Backoff`]; the scheduler then pauses all dispatch and
//! retries the lookup later instead of treating it as a failure.

use super::facts::{Attachment, VideoMetadata, VideoRef};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

/// How long dispatch should stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pause {
    /// Resume automatically after the duration
    For(Duration),
    /// Resume only on an explicit [`Scheduler::resume`](super::scheduler::Scheduler::resume)
    Indefinite,
}

/// Why a lookup produced no value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The lookup failed; the spell is treated as not matching
    Failed(String),
    /// No provider is configured for this lookup
    Unavailable,
    /// Stop dispatching and retry this lookup after the pause
    Backoff(Pause),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Failed(reason) => write!(f, "Lookup failed: {}", reason),
            ProviderError::Unavailable => write!(f, "No provider available"),
            ProviderError::Backoff(Pause::For(duration)) => {
                write!(f, "Provider asked to pause for {:?}", duration)
            }
            ProviderError::Backoff(Pause::Indefinite) => {
                write!(f, "Provider asked to pause until resumed")
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Lookups the asynchronous spells depend on
#[async_trait]
pub trait Providers: Send + Sync {
    /// Compute the 64-bit perceptual hash of an attachment
    async fn image_signature(&self, attachment: &Attachment) -> Result<u64, ProviderError>;

    /// Fetch title and author of a video
    async fn video_metadata(&self, video: &VideoRef) -> Result<VideoMetadata, ProviderError>;
}

/// Providers that never resolve anything
///
/// Spells needing a lookup only match on facts the caller already resolved.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProviders;

#[async_trait]
impl Providers for NoProviders {
    async fn image_signature(&self, _attachment: &Attachment) -> Result<u64, ProviderError> {
        Err(ProviderError::Unavailable)
    }

    async fn video_metadata(&self, _video: &VideoRef) -> Result<VideoMetadata, ProviderError> {
        Err(ProviderError::Unavailable)
    }
}
