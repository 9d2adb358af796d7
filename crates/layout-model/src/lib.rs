//! imagerow Layout Model
//!
//! Defines the core data contracts for a horizontal image strip:
//! - **Sources:** Named byte buffers delivered by a drop, in drop order
//! - **Previews:** Revocable handles through which the bytes are read
//! - **Batches:** One drop's items, first pending, then laid out
//! - **Layout:** Cumulative x offsets, placements, and the export request
//!
//! All coordinates are integer pixels in the output canvas. Every image
//! sits on the top edge (`y == 0`) at its native size.

pub mod batch;
pub mod layout;
pub mod preview;
pub mod source;

pub use batch::*;
pub use layout::*;
pub use preview::*;
pub use source::*;
