//! Color: the graphics state's stroke/fill color, always stored as RGB. Gray and
//! CMYK content-stream operators convert to RGB the moment they're applied (C9).

use serde_derive::{Deserialize, Serialize};

/// An RGB color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Rgb { r, g, b }
    }

    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    /// `DeviceGray` conversion: a single gray level replicated across channels.
    pub fn from_gray(gray: f32) -> Rgb {
        Rgb::new(gray, gray, gray)
    }

    /// `DeviceCMYK` conversion: `r=(1-c)(1-k), g=(1-m)(1-k), b=(1-y)(1-k)`.
    pub fn from_cmyk(c: f32, m: f32, y: f32, k: f32) -> Rgb {
        Rgb::new((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gray_replicates_across_channels() {
        let c = Rgb::from_gray(0.5);
        assert_eq!(c, Rgb::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn cmyk_full_black_is_black() {
        let c = Rgb::from_cmyk(0.0, 0.0, 0.0, 1.0);
        assert_eq!(c, Rgb::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn cmyk_no_ink_is_white() {
        let c = Rgb::from_cmyk(0.0, 0.0, 0.0, 0.0);
        assert_eq!(c, Rgb::new(1.0, 1.0, 1.0));
    }
}
