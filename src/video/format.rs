//! Resolution, the one geometry type the capture/encode pipeline shares.
//!
//! The simulator's display surface is always 32-bit BGRA, premultiplied,
//! little-endian; there is no format negotiation in this pipeline, so unlike
//! the V4L2-era pixel format catalog this module used to carry, there is
//! nothing here to enumerate.

use std::fmt;

/// Width x height of a display surface or encoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl From<(u32, u32)> for Resolution {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        assert_eq!(Resolution::new(390, 844).to_string(), "390x844");
    }

    #[test]
    fn pixel_count() {
        assert_eq!(Resolution::new(100, 50).pixels(), 5000);
    }
}
