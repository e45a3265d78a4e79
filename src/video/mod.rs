//! Frame encoding: wrapping a display surface and compressing it to JPEG.

pub mod encoder;
pub mod format;
pub mod frame;

pub use encoder::{JpegEncoder, JpegEncoderConfig};
pub use format::Resolution;
pub use frame::EncodedFrame;
