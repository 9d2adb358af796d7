//! Horizontal row layout.
//!
//! Images are placed left to right in batch order with no gaps:
//! `x[0] = 0`, `x[i] = x[i-1] + w[i-1]`, and the canvas is exactly
//! `sum(w)` pixels wide.

use serde::{Deserialize, Serialize};

use crate::preview::PreviewUrl;

/// Errors raised while turning widths into a layout.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("Expected {expected} widths, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Image at position {index} has zero width")]
    ZeroWidth { index: usize },
}

/// Offsets and total width for one row of images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowLayout {
    /// Left edge of each image, in input order.
    pub offsets: Vec<u64>,

    /// Sum of all widths.
    pub canvas_width: u64,
}

/// Compute cumulative x offsets for `widths`, preserving their order.
///
/// Zero widths are rejected; a silent zero would shift every later image.
pub fn compute_offsets(widths: &[u32]) -> Result<RowLayout, LayoutError> {
    let mut offsets = Vec::with_capacity(widths.len());
    let mut cursor = 0u64;

    for (index, &width) in widths.iter().enumerate() {
        if width == 0 {
            return Err(LayoutError::ZeroWidth { index });
        }
        offsets.push(cursor);
        cursor += u64::from(width);
    }

    Ok(RowLayout {
        offsets,
        canvas_width: cursor,
    })
}

/// Where one image is drawn on the composite canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub src: PreviewUrl,
    pub x: u64,
    pub y: u64,
}

/// Everything the compositor needs for one export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// Placements in batch order.
    pub placements: Vec<Placement>,

    /// Exact canvas width in pixels.
    pub canvas_width: u64,
}
