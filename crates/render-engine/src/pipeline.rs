//! Layout & export pipeline.
//!
//! ```text
//!          accept            all widths ok           export
//! Idle ───────────▶ Loading ───────────────▶ Ready ─────────▶ Exporting
//!   ▲                  │                      ▲                   │
//!   │                  │ any decode error     └───────────────────┘
//!   │                  ▼                        done or ExportError
//!   └─(empty drop)── Failed
//! ```
//!
//! A new drop may arrive in any state and replaces the current batch. The
//! pipeline lock is never held across an await; every suspension point
//! re-checks the batch id afterwards so a superseded batch can never write
//! into its successor's state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use imagerow_common::config::{AppConfig, DEFAULT_OUTPUT_NAME};
use imagerow_common::error::{DecodeError, ExportError};
use imagerow_layout_model::batch::{BatchId, ItemSummary, LaidOutBatch, PendingBatch};
use imagerow_layout_model::layout::{ExportRequest, LayoutError};
use imagerow_layout_model::preview::PreviewStore;
use imagerow_layout_model::source::SourceFile;

use crate::compositor::{CompositeOptions, Compositor, RasterCompositor};
use crate::resolver::{resolve_all, ImageWidthResolver, WidthResolver};
use crate::save::{DirectorySaver, SaveTarget, SavedExport};

/// Export parameters that stay fixed for the pipeline's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Name handed to the save target.
    pub output_name: String,

    /// Encoder quality; `1.0` is maximum fidelity.
    pub quality: f32,

    /// Canvas height override.
    pub height: Option<u32>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            quality: 1.0,
            height: None,
        }
    }
}

/// Layout of a ready batch, without any resource handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLayout {
    pub batch: BatchId,
    pub items: Vec<ItemSummary>,
    pub canvas_width: u64,
}

impl BatchLayout {
    fn of(batch: &LaidOutBatch) -> Self {
        Self {
            batch: batch.id(),
            items: batch.summaries(),
            canvas_width: batch.canvas_width(),
        }
    }

    pub fn offsets(&self) -> Vec<u64> {
        self.items.iter().map(|item| item.x_offset).collect()
    }
}

/// Observable pipeline state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Idle,
    Loading { batch: BatchId, items: usize },
    Ready(BatchLayout),
    Exporting(BatchLayout),
    Failed { batch: BatchId, error: DecodeError },
}

impl PipelineStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// How an `accept` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// Every width resolved; offsets are available.
    Ready(BatchLayout),

    /// A later drop replaced this batch before it finished; results dropped.
    Superseded,

    /// The drop contained no files. The previous batch was discarded.
    Empty,
}

/// How an `export` trigger ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved(SavedExport),

    /// Another export of this batch is still running. Nothing was done.
    InFlight,

    /// No ready batch to export. Nothing was done.
    Unavailable,
}

enum State {
    Idle,
    Loading(PendingBatch),
    Ready(LaidOutBatch),
    Exporting(LaidOutBatch),
    Failed { batch: BatchId, error: DecodeError },
}

impl State {
    fn status(&self) -> PipelineStatus {
        match self {
            State::Idle => PipelineStatus::Idle,
            State::Loading(pending) => PipelineStatus::Loading {
                batch: pending.id(),
                items: pending.len(),
            },
            State::Ready(batch) => PipelineStatus::Ready(BatchLayout::of(batch)),
            State::Exporting(batch) => PipelineStatus::Exporting(BatchLayout::of(batch)),
            State::Failed { batch, error } => PipelineStatus::Failed {
                batch: *batch,
                error: error.clone(),
            },
        }
    }
}

struct Inner {
    last_batch: u64,
    state: State,
}

/// Drives one session: accepts drops, lays them out, exports composites.
pub struct Pipeline {
    store: PreviewStore,
    resolver: Arc<dyn WidthResolver>,
    compositor: Arc<dyn Compositor>,
    saver: Arc<dyn SaveTarget>,
    settings: ExportSettings,
    inner: Mutex<Inner>,
}

impl Pipeline {
    pub fn new(
        store: PreviewStore,
        resolver: Arc<dyn WidthResolver>,
        compositor: Arc<dyn Compositor>,
        saver: Arc<dyn SaveTarget>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            store,
            resolver,
            compositor,
            saver,
            settings,
            inner: Mutex::new(Inner {
                last_batch: 0,
                state: State::Idle,
            }),
        }
    }

    /// Pipeline with the `image`-backed resolver and compositor, saving to
    /// the configured output directory.
    pub fn from_config(config: &AppConfig) -> Self {
        let store = PreviewStore::new();
        Self::new(
            store.clone(),
            Arc::new(ImageWidthResolver::new(store.clone())),
            Arc::new(RasterCompositor::new(store.clone())),
            Arc::new(DirectorySaver::new(config.export.output_dir.clone())),
            ExportSettings {
                output_name: config.export.output_name.clone(),
                quality: config.export.effective_quality(),
                height: config.export.height,
            },
        )
    }

    /// Registry holding this pipeline's previews.
    pub fn store(&self) -> &PreviewStore {
        &self.store
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Transitions are single assignments, so a poisoned lock is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> PipelineStatus {
        self.lock().state.status()
    }

    /// Layout of the current batch once its offsets are known.
    pub fn layout(&self) -> Option<BatchLayout> {
        match &self.lock().state {
            State::Ready(batch) | State::Exporting(batch) => Some(BatchLayout::of(batch)),
            _ => None,
        }
    }

    /// Accept one drop, replacing whatever batch came before.
    ///
    /// Widths resolve concurrently; offsets follow `sources` order. Any
    /// decode failure moves the batch to `Failed` and is returned.
    pub async fn accept(&self, sources: Vec<SourceFile>) -> Result<AcceptOutcome, DecodeError> {
        let (batch_id, urls, previous) = {
            let mut inner = self.lock();
            inner.last_batch += 1;
            let batch_id = BatchId(inner.last_batch);

            if sources.is_empty() {
                let previous = std::mem::replace(&mut inner.state, State::Idle);
                drop(inner);
                drop(previous);
                tracing::info!(batch = %batch_id, "Empty drop, pipeline idle");
                return Ok(AcceptOutcome::Empty);
            }

            let pending = PendingBatch::new(batch_id, &sources, &self.store);
            let urls = pending.preview_urls();
            let previous = std::mem::replace(&mut inner.state, State::Loading(pending));
            (batch_id, urls, previous)
        };
        // Releases the replaced batch's previews.
        drop(previous);

        tracing::info!(batch = %batch_id, items = urls.len(), "Accepted drop, resolving widths");
        let resolved = resolve_all(self.resolver.as_ref(), &urls).await;

        let mut inner = self.lock();
        let pending = match std::mem::replace(&mut inner.state, State::Idle) {
            State::Loading(pending) if pending.id() == batch_id => pending,
            other => {
                inner.state = other;
                tracing::debug!(batch = %batch_id, "Discarding widths of superseded batch");
                return Ok(AcceptOutcome::Superseded);
            }
        };

        // Preview URLs mean nothing to a user; name the file as well.
        let describe = |index: usize| match sources.get(index) {
            Some(source) => format!("{} ({})", source.name(), urls[index]),
            None => urls[index].to_string(),
        };
        let laid_out = resolved
            .map_err(|mut error| {
                if let Some(index) = urls.iter().position(|url| url.as_str() == error.descriptor) {
                    error.descriptor = describe(index);
                }
                error
            })
            .and_then(|widths| {
                pending.lay_out(&widths).map_err(|e| match e {
                    LayoutError::ZeroWidth { index } => {
                        DecodeError::new(describe(index), "image has zero width")
                    }
                    other => DecodeError::new(format!("batch {batch_id}"), other.to_string()),
                })
            });

        match laid_out {
            Ok(batch) => {
                let layout = BatchLayout::of(&batch);
                inner.state = State::Ready(batch);
                tracing::info!(
                    batch = %batch_id,
                    items = layout.items.len(),
                    canvas_width = layout.canvas_width,
                    "Batch ready"
                );
                Ok(AcceptOutcome::Ready(layout))
            }
            Err(error) => {
                inner.state = State::Failed {
                    batch: batch_id,
                    error: error.clone(),
                };
                tracing::warn!(batch = %batch_id, error = %error, "Batch failed");
                Err(error)
            }
        }
    }

    /// Composite the ready batch and hand it to the save target.
    ///
    /// At most one export runs at a time; a trigger during an export returns
    /// [`ExportOutcome::InFlight`] without touching the compositor. On
    /// [`ExportError`] the batch stays ready for a retry.
    pub async fn export(&self) -> Result<ExportOutcome, ExportError> {
        let (batch_id, request) = {
            let mut inner = self.lock();
            match std::mem::replace(&mut inner.state, State::Idle) {
                State::Ready(batch) => {
                    let request = batch.export_request();
                    let batch_id = batch.id();
                    inner.state = State::Exporting(batch);
                    (batch_id, request)
                }
                State::Exporting(batch) => {
                    inner.state = State::Exporting(batch);
                    tracing::debug!("Export already in flight, ignoring trigger");
                    return Ok(ExportOutcome::InFlight);
                }
                other => {
                    inner.state = other;
                    tracing::debug!("No ready batch, ignoring export trigger");
                    return Ok(ExportOutcome::Unavailable);
                }
            }
        };

        let _busy = ExportingGuard {
            pipeline: self,
            batch: batch_id,
        };

        tracing::info!(
            batch = %batch_id,
            placements = request.placements.len(),
            canvas_width = request.canvas_width,
            "Starting export"
        );

        match self.run_export(&request).await {
            Ok(saved) => Ok(ExportOutcome::Saved(saved)),
            Err(error) => {
                tracing::warn!(batch = %batch_id, error = %error, "Export failed");
                Err(error)
            }
        }
    }

    async fn run_export(&self, request: &ExportRequest) -> Result<SavedExport, ExportError> {
        let options = CompositeOptions {
            width: request.canvas_width,
            height: self.settings.height,
            quality: self.settings.quality,
        };
        let image = self
            .compositor
            .composite(&request.placements, &options)
            .await?;
        self.saver.save(&self.settings.output_name, &image).await
    }
}

/// Returns an exporting batch to `Ready` on every exit path, including a
/// dropped export future. A batch replaced mid-export is left alone.
struct ExportingGuard<'a> {
    pipeline: &'a Pipeline,
    batch: BatchId,
}

impl Drop for ExportingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.pipeline.lock();
        inner.state = match std::mem::replace(&mut inner.state, State::Idle) {
            State::Exporting(batch) if batch.id() == self.batch => State::Ready(batch),
            other => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use imagerow_layout_model::layout::Placement;
    use imagerow_layout_model::preview::PreviewUrl;

    use crate::compositor::{EncodedImage, PNG_MIME};

    /// Width = byte length of the source.
    struct LengthResolver {
        store: PreviewStore,
    }

    #[async_trait]
    impl WidthResolver for LengthResolver {
        async fn resolve_width(&self, url: &PreviewUrl) -> Result<u32, DecodeError> {
            let bytes = self
                .store
                .fetch(url)
                .ok_or_else(|| DecodeError::revoked(url.as_str()))?;
            Ok(bytes.len() as u32)
        }
    }

    struct EchoCompositor;

    #[async_trait]
    impl Compositor for EchoCompositor {
        async fn composite(
            &self,
            placements: &[Placement],
            options: &CompositeOptions,
        ) -> Result<EncodedImage, ExportError> {
            Ok(EncodedImage {
                mime: PNG_MIME,
                bytes: format!("{}:{}", placements.len(), options.width).into_bytes(),
                width: options.width as u32,
                height: 1,
            })
        }
    }

    struct NullSaver;

    #[async_trait]
    impl SaveTarget for NullSaver {
        async fn save(&self, name: &str, image: &EncodedImage) -> Result<SavedExport, ExportError> {
            Ok(SavedExport {
                location: name.into(),
                bytes_written: image.bytes.len(),
            })
        }
    }

    fn pipeline() -> Pipeline {
        let store = PreviewStore::new();
        Pipeline::new(
            store.clone(),
            Arc::new(LengthResolver { store }),
            Arc::new(EchoCompositor),
            Arc::new(NullSaver),
            ExportSettings::default(),
        )
    }

    fn source(name: &str, width: usize) -> SourceFile {
        SourceFile::new(name, vec![0u8; width])
    }

    #[tokio::test]
    async fn test_starts_idle_and_export_unavailable() {
        let pipeline = pipeline();
        assert_eq!(pipeline.status(), PipelineStatus::Idle);
        assert_eq!(pipeline.export().await.unwrap(), ExportOutcome::Unavailable);
    }

    #[tokio::test]
    async fn test_accept_then_export() {
        let pipeline = pipeline();
        let outcome = pipeline
            .accept(vec![source("a", 100), source("b", 50), source("c", 200)])
            .await
            .unwrap();

        let layout = match outcome {
            AcceptOutcome::Ready(layout) => layout,
            other => panic!("expected ready, got {other:?}"),
        };
        assert_eq!(layout.offsets(), vec![0, 100, 150]);
        assert_eq!(layout.canvas_width, 350);
        assert!(pipeline.status().is_ready());

        let saved = pipeline.export().await.unwrap();
        assert_eq!(
            saved,
            ExportOutcome::Saved(SavedExport {
                location: "download.png".into(),
                bytes_written: "3:350".len(),
            })
        );
        assert!(pipeline.status().is_ready());
    }

    #[tokio::test]
    async fn test_empty_drop_discards_previous_batch() {
        let pipeline = pipeline();
        pipeline.accept(vec![source("a", 10)]).await.unwrap();
        assert_eq!(pipeline.store().live_count(), 1);

        assert_eq!(pipeline.accept(Vec::new()).await.unwrap(), AcceptOutcome::Empty);
        assert_eq!(pipeline.status(), PipelineStatus::Idle);
        assert_eq!(pipeline.store().live_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_width_fails_batch() {
        let pipeline = pipeline();
        let err = pipeline
            .accept(vec![source("a", 10), source("empty", 0)])
            .await
            .unwrap_err();

        assert!(err.reason.contains("zero width"));
        assert!(err.descriptor.starts_with("empty (preview:"));
        assert!(matches!(pipeline.status(), PipelineStatus::Failed { .. }));
        assert_eq!(pipeline.store().live_count(), 0);
        assert_eq!(pipeline.export().await.unwrap(), ExportOutcome::Unavailable);
    }

    #[tokio::test]
    async fn test_layout_serializes_for_display() {
        let pipeline = pipeline();
        pipeline
            .accept(vec![source("a.png", 4), source("b.png", 6)])
            .await
            .unwrap();
        let layout = pipeline.layout().unwrap();

        let json = serde_json::to_value(&layout).unwrap();
        assert_eq!(json["batch"], 1);
        assert_eq!(json["canvas_width"], 10);
        assert_eq!(json["items"][1]["name"], "b.png");
        assert_eq!(json["items"][1]["x_offset"], 4);

        let back: BatchLayout = serde_json::from_value(json).unwrap();
        assert_eq!(back, layout);
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_settings() {
        let mut config = AppConfig::default();
        config.export.output_name = "row.png".to_string();
        config.export.quality = 7.0;
        config.export.height = Some(32);

        let pipeline = Pipeline::from_config(&config);
        assert_eq!(
            pipeline.settings(),
            &ExportSettings {
                output_name: "row.png".to_string(),
                quality: 1.0,
                height: Some(32),
            }
        );
    }
}
