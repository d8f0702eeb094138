//! Text-fragment assembly: advance-width measurement and device-space placement for
//! every `Tj`/`TJ`/`'`/`"` the VM executes (C11).

use serde_derive::{Deserialize, Serialize};

use crate::matrix::Matrix;

/// One decoded string shown by `Tj`/`TJ`/`'`/`"`, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// Font size after text-matrix scaling (`fontSize * max(|a|, |d|)`).
    pub font_size: f64,
    /// User-space advance this fragment moved the text matrix by.
    pub advance: f64,
    pub font: String,
}

/// `fontSize * max(|TextMatrix.a|, |TextMatrix.d|)`.
pub fn effective_font_size(font_size: f64, text_matrix: &Matrix) -> f64 {
    let m = text_matrix.0;
    font_size * (m[0].abs() as f64).max(m[3].abs() as f64)
}

/// The fragment's device-space origin: `CTM * TextMatrix * (0, Rise)`.
pub fn device_origin(ctm: &Matrix, text_matrix: &Matrix, rise: f64) -> (f64, f64) {
    let combined = text_matrix.combine(*ctm);
    let (x, y) = combined.apply_to_point(0.0, rise as f32);
    (x as f64, y as f64)
}

/// `(w0 * fontSize + numChars * Tc + numSpaces * Tw) * Th/100`, where `w0` is the
/// glyph-width sum (thousandths of em) divided by 1000. When no width information is
/// available at all, falls back to `numChars * fontSize * Th/100`.
pub fn compute_advance(
    width_sum_per_mille: Option<f64>,
    num_chars: usize,
    num_spaces: usize,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horiz_scale_percent: f64,
) -> f64 {
    let th = horiz_scale_percent / 100.0;
    match width_sum_per_mille {
        Some(sum) => {
            let w0 = sum / 1000.0;
            (w0 * font_size + num_chars as f64 * char_spacing + num_spaces as f64 * word_spacing) * th
        }
        None => num_chars as f64 * font_size * th,
    }
}
