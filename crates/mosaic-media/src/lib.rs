// Media editing before publish: crop, filters, video trim.
//
// Nothing here re-encodes video; images are redrawn at their native size
// and written out as PNG.

pub mod crop;
pub mod filter;
pub mod pipeline;
pub mod video;

pub use crop::{AspectPreset, CropRect, CropSpec};
pub use filter::Filter;
pub use pipeline::{finalize, EditSession, EditStep, EditedImage, MediaBlob};
pub use video::{PlaybackCursor, TrimWindow, VideoDraft};
