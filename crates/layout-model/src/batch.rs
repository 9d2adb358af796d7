//! Batches: the items produced by one drop.
//!
//! A batch goes through two phases. [`PendingBatch`] holds previews whose
//! widths are still unknown. [`LaidOutBatch`] holds items with widths and
//! offsets, and only exists once every width in the batch is known.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::layout::{compute_offsets, ExportRequest, LayoutError, Placement};
use crate::preview::{PreviewHandle, PreviewStore, PreviewUrl};
use crate::source::SourceFile;

/// Sequence number of a drop. Later drops have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Synthetic identity of one batch entry.
///
/// Unique across batches, independent of file names, so dropping two
/// files called `image.png` yields two distinct items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId {
    pub batch: BatchId,
    pub index: usize,
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.batch, self.index)
    }
}

/// An accepted image whose width is not known yet.
#[derive(Debug)]
pub struct PendingItem {
    pub id: ItemId,
    pub name: String,
    pub preview: PreviewHandle,
}

/// A batch right after the drop, before width resolution.
#[derive(Debug)]
pub struct PendingBatch {
    id: BatchId,
    items: Vec<PendingItem>,
}

impl PendingBatch {
    /// Register a preview for every source, keeping drop order.
    pub fn new(id: BatchId, sources: &[SourceFile], store: &PreviewStore) -> Self {
        let items = sources
            .iter()
            .enumerate()
            .map(|(index, source)| PendingItem {
                id: ItemId { batch: id, index },
                name: source.name().to_string(),
                preview: store.create(source),
            })
            .collect();
        Self { id, items }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn items(&self) -> &[PendingItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Preview URLs in batch order, for handing to a width resolver.
    pub fn preview_urls(&self) -> Vec<PreviewUrl> {
        self.items.iter().map(|item| item.preview.url().clone()).collect()
    }

    /// Attach widths (in batch order) and compute offsets.
    ///
    /// Consumes the batch: previews move into the laid-out items. On error
    /// the batch is dropped and its previews are released.
    pub fn lay_out(self, widths: &[u32]) -> Result<LaidOutBatch, LayoutError> {
        if widths.len() != self.items.len() {
            return Err(LayoutError::LengthMismatch {
                expected: self.items.len(),
                actual: widths.len(),
            });
        }

        let layout = compute_offsets(widths)?;
        let items = self
            .items
            .into_iter()
            .zip(widths.iter().zip(layout.offsets.iter()))
            .map(|(pending, (&width, &x_offset))| ImageItem {
                id: pending.id,
                name: pending.name,
                preview: pending.preview,
                width,
                x_offset,
            })
            .collect();

        Ok(LaidOutBatch {
            id: self.id,
            items,
            canvas_width: layout.canvas_width,
        })
    }
}

/// An accepted image with its resolved width and placement.
#[derive(Debug)]
pub struct ImageItem {
    pub id: ItemId,
    pub name: String,
    pub preview: PreviewHandle,
    pub width: u32,
    pub x_offset: u64,
}

impl ImageItem {
    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            name: self.name.clone(),
            width: self.width,
            x_offset: self.x_offset,
        }
    }
}

/// Plain-data view of an [`ImageItem`], free of resource handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: ItemId,
    pub name: String,
    pub width: u32,
    pub x_offset: u64,
}

/// A complete batch with every width and offset known.
#[derive(Debug)]
pub struct LaidOutBatch {
    id: BatchId,
    items: Vec<ImageItem>,
    canvas_width: u64,
}

impl LaidOutBatch {
    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn canvas_width(&self) -> u64 {
        self.canvas_width
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.x_offset).collect()
    }

    pub fn summaries(&self) -> Vec<ItemSummary> {
        self.items.iter().map(ImageItem::summary).collect()
    }

    /// Placements in batch order, every image on the top edge.
    pub fn export_request(&self) -> ExportRequest {
        ExportRequest {
            placements: self
                .items
                .iter()
                .map(|item| Placement {
                    src: item.preview.url().clone(),
                    x: item.x_offset,
                    y: 0,
                })
                .collect(),
            canvas_width: self.canvas_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(names: &[&str]) -> Vec<SourceFile> {
        names
            .iter()
            .map(|name| SourceFile::new(*name, vec![0u8; 4]))
            .collect()
    }

    #[test]
    fn test_pending_batch_keeps_drop_order() {
        let store = PreviewStore::new();
        let batch = PendingBatch::new(BatchId(1), &sources(&["a", "b", "c"]), &store);

        let names: Vec<_> = batch.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(store.live_count(), 3);
    }

    #[test]
    fn test_duplicate_names_get_distinct_ids() {
        let store = PreviewStore::new();
        let batch = PendingBatch::new(BatchId(4), &sources(&["same.png", "same.png"]), &store);

        let ids: Vec<_> = batch.items().iter().map(|i| i.id).collect();
        assert_ne!(ids[0], ids[1]);
        assert_eq!(ids[1].to_string(), "4-1");
    }

    #[test]
    fn test_lay_out_builds_export_request() {
        let store = PreviewStore::new();
        let batch = PendingBatch::new(BatchId(1), &sources(&["A", "B", "C"]), &store);
        let urls = batch.preview_urls();

        let laid_out = batch.lay_out(&[100, 50, 200]).unwrap();
        assert_eq!(laid_out.offsets(), vec![0, 100, 150]);
        assert_eq!(laid_out.canvas_width(), 350);

        let request = laid_out.export_request();
        assert_eq!(request.canvas_width, 350);
        let triples: Vec<_> = request
            .placements
            .iter()
            .map(|p| (p.src.clone(), p.x, p.y))
            .collect();
        assert_eq!(
            triples,
            vec![
                (urls[0].clone(), 0, 0),
                (urls[1].clone(), 100, 0),
                (urls[2].clone(), 150, 0),
            ]
        );
    }

    #[test]
    fn test_lay_out_length_mismatch_releases_previews() {
        let store = PreviewStore::new();
        let batch = PendingBatch::new(BatchId(1), &sources(&["a", "b"]), &store);

        let err = batch.lay_out(&[10]).unwrap_err();
        assert_eq!(
            err,
            LayoutError::LengthMismatch {
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_dropping_laid_out_batch_releases_previews() {
        let store = PreviewStore::new();
        let batch = PendingBatch::new(BatchId(1), &sources(&["a", "b"]), &store);
        let laid_out = batch.lay_out(&[3, 4]).unwrap();
        assert_eq!(store.live_count(), 2);

        drop(laid_out);
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_summary_serializes() {
        let store = PreviewStore::new();
        let batch = PendingBatch::new(BatchId(2), &sources(&["x.png"]), &store);
        let laid_out = batch.lay_out(&[64]).unwrap();

        let json = serde_json::to_value(laid_out.summaries()).unwrap();
        assert_eq!(json[0]["name"], "x.png");
        assert_eq!(json[0]["width"], 64);
        assert_eq!(json[0]["x_offset"], 0);
        assert_eq!(json[0]["id"]["batch"], 2);
    }
}
