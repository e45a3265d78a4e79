//! Encoder configuration and the narrow `Encoder` trait this crate needs.
//!
//! The teacher codebase this grew from juggled half a dozen codecs behind
//! this trait (H264, H265, VP8, VP9 in addition to JPEG); this pipeline only
//! ever produces JPEG, but the trait boundary is kept because the driver
//! replaces the encoder wholesale on a geometry change and a named seam
//! makes that swap explicit rather than implicit.

use crate::error::Result;
use crate::video::format::Resolution;
use crate::video::frame::EncodedFrame;
use crate::display::PixelBuffer;

#[derive(Debug, Clone, Copy)]
pub struct EncoderConfig {
    pub resolution: Resolution,
    /// 0.1..1.0, already clamped by the CLI layer.
    pub quality: f32,
}

pub trait Encoder: Send {
    fn config(&self) -> &EncoderConfig;

    /// Compress one surface. Implementations are responsible for falling
    /// back to software compression internally; callers only see the final
    /// JPEG bytes or a terminal failure.
    fn encode(&mut self, surface: &PixelBuffer<'_>, sequence: u64) -> Result<EncodedFrame>;
}
