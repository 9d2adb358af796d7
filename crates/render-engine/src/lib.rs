//! imagerow Render Engine
//!
//! Turns one drop of images into a single side-by-side composite.
//!
//! # Pipeline Architecture
//!
//! ```text
//! drop [a.png, b.png, c.png]
//!        │
//!        ├── PreviewStore::create  (one revocable handle per file)
//!        │
//!        ├── WidthResolver ×N      (concurrent, results kept in drop order)
//!        │
//!        ├── compute_offsets       x = [0, wa, wa+wb], canvas = wa+wb+wc
//!        │
//!        │   ... export trigger ...
//!        │
//!        ├── Compositor            placements + canvas width → PNG
//!        │
//!        ▼
//!   SaveTarget                    download.png
//! ```

pub mod compositor;
pub mod pipeline;
pub mod resolver;
pub mod save;

pub use compositor::{CompositeOptions, Compositor, EncodedImage, RasterCompositor};
pub use pipeline::*;
pub use resolver::{resolve_all, ImageWidthResolver, WidthResolver};
pub use save::{DirectorySaver, SaveTarget, SavedExport};
