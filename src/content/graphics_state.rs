//! Graphics-state snapshot pushed/popped by `q`/`Q`: the CTM, text state, stroke/fill
//! color and line width a content-stream operator reads or mutates (C9).

use crate::color::Rgb;
use crate::matrix::Matrix;

/// Text-positioning and text-showing parameters. Only meaningful between `BT`/`ET`;
/// `text_matrix`/`text_line_matrix` reset to identity at `BT`, but the rest (font,
/// spacing, rise, ...) persists across text objects like every other graphics-state
/// field.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    pub font_name: Option<String>,
    pub font_size: f64,
    pub char_spacing: f64,
    pub word_spacing: f64,
    /// Horizontal scaling, percent (`Tz`); PDF default is 100.
    pub horiz_scale: f64,
    pub leading: f64,
    pub render_mode: i64,
    pub rise: f64,
    pub text_matrix: Matrix,
    pub text_line_matrix: Matrix,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            font_name: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horiz_scale: 100.0,
            leading: 0.0,
            render_mode: 0,
            rise: 0.0,
            text_matrix: Matrix::IDENTITY,
            text_line_matrix: Matrix::IDENTITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub text: TextState,
    pub stroke_color: Rgb,
    pub fill_color: Rgb,
    pub line_width: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        GraphicsState {
            ctm: Matrix::IDENTITY,
            text: TextState::default(),
            stroke_color: Rgb::BLACK,
            fill_color: Rgb::BLACK,
            line_width: 1.0,
        }
    }
}
