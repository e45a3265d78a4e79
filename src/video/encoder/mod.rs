//! JPEG frame encoding: a hardware fast path with a software fallback.

mod ffi;
pub mod jpeg;
pub mod traits;

pub use jpeg::JpegEncoder;
pub use traits::{Encoder, EncoderConfig as JpegEncoderConfig};
