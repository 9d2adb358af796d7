//! Compositor: rasterizes placements onto a single canvas.
//!
//! The canvas is exactly `options.width` pixels wide. Placements are drawn
//! in list order at native size; anything they do not cover stays
//! transparent.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use imagerow_common::error::ExportError;
use imagerow_layout_model::layout::Placement;
use imagerow_layout_model::preview::PreviewStore;

/// MIME type of every composite produced here.
pub const PNG_MIME: &str = "image/png";

/// Canvas parameters for one composite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeOptions {
    /// Canvas width in pixels. Must equal the sum of placed widths.
    pub width: u64,

    /// Canvas height. `None` uses the tallest placed image; an override
    /// shorter than that is rejected.
    pub height: Option<u32>,

    /// Encoder quality in `(0.0, 1.0]`; `1.0` is maximum fidelity.
    pub quality: f32,
}

impl CompositeOptions {
    pub fn new(width: u64) -> Self {
        Self {
            width,
            height: None,
            quality: 1.0,
        }
    }
}

/// An encoded composite, ready for saving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: &'static str,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`, the shape a browser download link takes.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Rasterizes placements into an encoded image.
#[async_trait]
pub trait Compositor: Send + Sync {
    async fn composite(
        &self,
        placements: &[Placement],
        options: &CompositeOptions,
    ) -> Result<EncodedImage, ExportError>;
}

/// Default compositor backed by the `image` crate. Output is PNG.
#[derive(Debug, Clone)]
pub struct RasterCompositor {
    store: PreviewStore,
}

impl RasterCompositor {
    pub fn new(store: PreviewStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Compositor for RasterCompositor {
    async fn composite(
        &self,
        placements: &[Placement],
        options: &CompositeOptions,
    ) -> Result<EncodedImage, ExportError> {
        if options.width == 0 {
            return Err(ExportError::EmptyCanvas);
        }
        let width = u32::try_from(options.width).map_err(|_| {
            ExportError::encode(format!("canvas width {} is too large", options.width))
        })?;

        // Grab the bytes now: a preview revoked after this point no longer matters.
        let sources = placements
            .iter()
            .map(|placement| {
                self.store
                    .fetch(&placement.src)
                    .map(|bytes| (placement.clone(), bytes))
                    .ok_or_else(|| {
                        ExportError::unreadable(placement.src.as_str(), "preview has been revoked")
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let options = *options;
        let image = tokio::task::spawn_blocking(move || render(&sources, width, &options))
            .await
            .map_err(|e| ExportError::encode(format!("render task failed: {e}")))??;

        tracing::debug!(
            width = image.width,
            height = image.height,
            bytes = image.bytes.len(),
            "Composite encoded"
        );
        Ok(image)
    }
}

fn render(
    sources: &[(Placement, Arc<[u8]>)],
    width: u32,
    options: &CompositeOptions,
) -> Result<EncodedImage, ExportError> {
    let decoded = sources
        .iter()
        .map(|(placement, bytes)| {
            image::load_from_memory(bytes)
                .map(|image| (placement, image.to_rgba8()))
                .map_err(|e| ExportError::unreadable(placement.src.as_str(), e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tallest = decoded.iter().map(|(_, image)| image.height()).max().unwrap_or(0);
    let height = match options.height {
        // An override may only add space below; images are never cropped.
        Some(height) if height < tallest => {
            return Err(ExportError::CanvasTooShort { height, tallest });
        }
        Some(height) => height,
        None => tallest,
    };
    if height == 0 {
        return Err(ExportError::EmptyCanvas);
    }

    let mut canvas = RgbaImage::new(width, height);
    for (placement, image) in &decoded {
        // Placements never overlap, so a straight copy matches source-over.
        image::imageops::replace(&mut canvas, image, placement.x as i64, placement.y as i64);
    }

    let compression = if options.quality >= 1.0 {
        CompressionType::Best
    } else {
        CompressionType::Default
    };

    let mut bytes = Vec::new();
    PngEncoder::new_with_quality(Cursor::new(&mut bytes), compression, FilterType::Adaptive)
        .write_image(canvas.as_raw(), width, height, ExtendedColorType::Rgba8)
        .map_err(|e| ExportError::encode(e.to_string()))?;

    Ok(EncodedImage {
        mime: PNG_MIME,
        bytes,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use imagerow_layout_model::preview::PreviewHandle;
    use imagerow_layout_model::source::SourceFile;

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let mut buf = Vec::new();
        RgbaImage::from_pixel(width, height, Rgba(color))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn place(handle: &PreviewHandle, x: u64) -> Placement {
        Placement {
            src: handle.url().clone(),
            x,
            y: 0,
        }
    }

    #[tokio::test]
    async fn test_places_images_side_by_side() {
        let store = PreviewStore::new();
        let red = store.create(&SourceFile::new("red.png", png(3, 2, [255, 0, 0, 255])));
        let blue = store.create(&SourceFile::new("blue.png", png(5, 4, [0, 0, 255, 255])));
        let compositor = RasterCompositor::new(store);

        let encoded = compositor
            .composite(&[place(&red, 0), place(&blue, 3)], &CompositeOptions::new(8))
            .await
            .unwrap();
        assert_eq!(encoded.mime, PNG_MIME);
        assert_eq!((encoded.width, encoded.height), (8, 4));

        let canvas = image::load_from_memory(&encoded.bytes).unwrap().to_rgba8();
        assert_eq!(canvas.dimensions(), (8, 4));
        assert_eq!(canvas.get_pixel(0, 0), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 1), &Rgba([255, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(3, 0), &Rgba([0, 0, 255, 255]));
        assert_eq!(canvas.get_pixel(7, 3), &Rgba([0, 0, 255, 255]));
        // Below the shorter image nothing was drawn.
        assert_eq!(canvas.get_pixel(0, 3), &Rgba([0, 0, 0, 0]));
    }

    #[tokio::test]
    async fn test_output_is_deterministic() {
        let store = PreviewStore::new();
        let a = store.create(&SourceFile::new("a.png", png(6, 6, [1, 2, 3, 255])));
        let b = store.create(&SourceFile::new("b.png", png(2, 9, [9, 8, 7, 128])));
        let compositor = RasterCompositor::new(store);
        let placements = [place(&a, 0), place(&b, 6)];
        let options = CompositeOptions::new(8);

        let first = compositor.composite(&placements, &options).await.unwrap();
        let second = compositor.composite(&placements, &options).await.unwrap();
        assert_eq!(first.bytes, second.bytes);
    }

    #[tokio::test]
    async fn test_height_override() {
        let store = PreviewStore::new();
        let a = store.create(&SourceFile::new("a.png", png(2, 2, [0, 255, 0, 255])));
        let compositor = RasterCompositor::new(store);
        let options = CompositeOptions {
            height: Some(10),
            ..CompositeOptions::new(2)
        };

        let encoded = compositor.composite(&[place(&a, 0)], &options).await.unwrap();
        assert_eq!((encoded.width, encoded.height), (2, 10));
    }

    #[tokio::test]
    async fn test_height_override_shorter_than_image_is_rejected() {
        let store = PreviewStore::new();
        let tall = store.create(&SourceFile::new("tall.png", png(4, 8, [5, 5, 5, 255])));
        let compositor = RasterCompositor::new(store);
        let options = CompositeOptions {
            height: Some(2),
            ..CompositeOptions::new(4)
        };

        let err = compositor
            .composite(&[place(&tall, 0)], &options)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExportError::CanvasTooShort {
                height: 2,
                tallest: 8
            }
        );
    }

    #[tokio::test]
    async fn test_zero_width_is_empty_canvas() {
        let compositor = RasterCompositor::new(PreviewStore::new());
        let err = compositor
            .composite(&[], &CompositeOptions::new(0))
            .await
            .unwrap_err();
        assert_eq!(err, ExportError::EmptyCanvas);
    }

    #[tokio::test]
    async fn test_revoked_placement_is_unreadable() {
        let store = PreviewStore::new();
        let a = store.create(&SourceFile::new("a.png", png(2, 2, [0, 0, 0, 255])));
        let placement = place(&a, 0);
        drop(a);

        let compositor = RasterCompositor::new(store);
        let err = compositor
            .composite(&[placement], &CompositeOptions::new(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::UnreadablePlacement { .. }));
    }

    #[test]
    fn test_data_uri() {
        let encoded = EncodedImage {
            mime: PNG_MIME,
            bytes: vec![1, 2, 3],
            width: 1,
            height: 1,
        };
        assert_eq!(encoded.to_data_uri(), "data:image/png;base64,AQID");
    }
}
