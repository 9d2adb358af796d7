//! Width resolution: learn each image's natural pixel width.

use async_trait::async_trait;
use futures::future::try_join_all;

use imagerow_common::error::DecodeError;
use imagerow_layout_model::preview::{PreviewStore, PreviewUrl};

/// Determines the intrinsic width of the image behind a preview.
///
/// Implementations keep no per-call state, so one resolver can serve every
/// image of a batch concurrently.
#[async_trait]
pub trait WidthResolver: Send + Sync {
    /// Resolve the natural width in pixels. Never returns a default width:
    /// anything that cannot be measured is a [`DecodeError`].
    async fn resolve_width(&self, url: &PreviewUrl) -> Result<u32, DecodeError>;
}

/// Resolve every URL concurrently, returning widths in input order.
///
/// Fails fast: the first error aborts the whole set.
pub async fn resolve_all(
    resolver: &dyn WidthResolver,
    urls: &[PreviewUrl],
) -> Result<Vec<u32>, DecodeError> {
    try_join_all(urls.iter().map(|url| resolver.resolve_width(url))).await
}

/// Decodes images with the `image` crate on the blocking pool.
#[derive(Debug, Clone)]
pub struct ImageWidthResolver {
    store: PreviewStore,
}

impl ImageWidthResolver {
    pub fn new(store: PreviewStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl WidthResolver for ImageWidthResolver {
    async fn resolve_width(&self, url: &PreviewUrl) -> Result<u32, DecodeError> {
        let bytes = self
            .store
            .fetch(url)
            .ok_or_else(|| DecodeError::revoked(url.as_str()))?;

        let width = tokio::task::spawn_blocking(move || decode_width(&bytes))
            .await
            .map_err(|e| DecodeError::new(url.as_str(), format!("decode task failed: {e}")))?
            .map_err(|reason| DecodeError::new(url.as_str(), reason))?;

        tracing::debug!(preview = %url, width, "Resolved image width");
        Ok(width)
    }
}

/// Fully decode `bytes` and return the width. The pixels are dropped here.
fn decode_width(bytes: &[u8]) -> Result<u32, String> {
    let image = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    match image.width() {
        0 => Err("image has zero width".to_string()),
        width => Ok(width),
    }
}
