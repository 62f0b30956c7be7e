use anyhow::Result;
use async_trait::async_trait;

use crate::retry::{is_transport_error, with_retry};

/// Additional attempts granted to an extraction call after its first failure.
pub const DEFAULT_OCR_RETRIES: u32 = 2;

/// Remote OCR document-extraction service.
///
/// The recognition itself happens server-side; the app points this at a
/// captured document image (passport page, visa sticker, training
/// certificate) and gets back the recognized text. Implementations own their
/// transport and its timeouts.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image_uri: &str) -> Result<String>;
}

/// Runs one extraction through the bounded transport-retry policy.
///
/// Only failures classified as transport errors are retried, up to
/// `max_retries` additional attempts; validation and authorization failures
/// surface immediately, unchanged. This is a foreground call — unlike a
/// queued mutation, a failed extraction is not staged for a later sync cycle.
pub async fn extract_with_retry(
    extractor: &dyn TextExtractor,
    image_uri: &str,
    max_retries: u32,
) -> Result<String> {
    with_retry(|| extractor.extract(image_uri), max_retries, is_transport_error).await
}
