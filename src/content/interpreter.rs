//! Content-stream VM: a stack-based interpreter over the operator/operand token
//! stream produced by `Parser::next_content_token` (C9).
//!
//! The operand stack lives on the `Interpreter` value itself — there is no
//! module-level or thread-local stack anywhere in this file. Every public entry
//! point (`Interpreter::new`, `run`) is a plain call that owns its own state end to
//! end.

use std::collections::HashMap;

use crate::color::Rgb;
use crate::document::Reader;
use crate::errors::Result;
use crate::font::FontInfo;
use crate::glob_defines::*;
use crate::matrix::Matrix;
use crate::object::{Dictionary, Object};
use crate::parser::{ContentToken, Parser};
use crate::warning::Warning;

use super::graphics_state::GraphicsState;
use super::path::{classify_subpath, PathExtractor};
use super::text::{compute_advance, device_origin, effective_font_size, TextFragment};

pub struct Interpreter<'a> {
    reader: &'a Reader,
    fonts: HashMap<String, FontInfo>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    operands: Vec<Object>,
    current_path: Vec<Vec<(f64, f64)>>,
    pub text: Vec<TextFragment>,
    pub paths: PathExtractor,
}

impl<'a> Interpreter<'a> {
    /// Builds the font table from the page's `/Resources/Font` dictionary, if any.
    /// A font entry that fails to load is skipped with a warning rather than
    /// aborting the whole page.
    pub fn new(reader: &'a Reader, resources: Option<&Dictionary>) -> Result<Interpreter<'a>> {
        let mut fonts = HashMap::new();
        if let Some(res) = resources {
            if let Some(font_res) = res.get("Font") {
                if let Some(font_dict) = reader.resolve(font_res)?.as_dict() {
                    for (name, font_ref) in font_dict.iter() {
                        let resolved = match reader.resolve(font_ref) {
                            Ok(r) => r,
                            Err(_) => continue,
                        };
                        let Some(fd) = resolved.as_dict() else { continue };
                        match FontInfo::load(fd, reader) {
                            Ok(info) => {
                                fonts.insert(name.as_str().to_string(), info);
                            }
                            Err(e) => reader.push_warning(Warning::warn(
                                "content-stream",
                                format!("font {name} failed to load: {e}"),
                            )),
                        }
                    }
                }
            }
        }
        Ok(Interpreter {
            reader,
            fonts,
            state: GraphicsState::default(),
            stack: Vec::new(),
            operands: Vec::new(),
            current_path: Vec::new(),
            text: Vec::new(),
            paths: PathExtractor::default(),
        })
    }

    pub fn run(&mut self, content: &[u8]) -> Result<()> {
        let mut parser = Parser::new(content);
        loop {
            match parser.next_content_token()? {
                ContentToken::Eof => break,
                ContentToken::Operand(obj) => self.operands.push(obj),
                ContentToken::Operator(op) => self.dispatch(&op),
            }
        }
        Ok(())
    }

    fn warn(&self, message: impl Into<String>) {
        self.reader.push_warning(Warning::warn("content-stream", message.into()));
    }

    fn warn_arity(&self, op: &str) {
        self.warn(format!("operator {op} called with the wrong number of operands"));
    }

    fn dispatch(&mut self, op: &str) {
        let operands = std::mem::take(&mut self.operands);
        match op {
            OP_GS_SAVE => self.stack.push(self.state.clone()),
            OP_GS_RESTORE => match self.stack.pop() {
                Some(s) => self.state = s,
                None => self.warn("q/Q stack underflow on Q"),
            },
            OP_GS_CONCAT_MATRIX => match matrix6(&operands) {
                Some(m) => self.state.ctm = m.combine(self.state.ctm),
                None => self.warn_arity(op),
            },

            OP_PATH_STATE_SET_LINE_WIDTH => match last_n_f64(&operands, 1) {
                Some(v) => self.state.line_width = v[0],
                None => self.warn_arity(op),
            },
            OP_PATH_STATE_SET_LINE_JOIN
            | OP_PATH_STATE_SET_LINE_CAP
            | OP_PATH_STATE_SET_MITER_LIMIT
            | OP_PATH_STATE_SET_LINE_DASH
            | OP_PATH_STATE_SET_RENDERING_INTENT
            | OP_PATH_STATE_SET_FLATNESS_TOLERANCE
            | OP_PATH_STATE_SET_GS_FROM_PARAM_DICT => {
                // Recorded in real viewers but not read by the path extractor.
            }

            OP_COLOR_SET_STROKE_CS_DEVICERGB => match last_n_f64(&operands, 3) {
                Some(v) => self.state.stroke_color = rgb(&v),
                None => self.warn_arity(op),
            },
            OP_COLOR_SET_FILL_CS_DEVICERGB => match last_n_f64(&operands, 3) {
                Some(v) => self.state.fill_color = rgb(&v),
                None => self.warn_arity(op),
            },
            OP_COLOR_SET_STROKE_CS_DEVICEGRAY => match last_n_f64(&operands, 1) {
                Some(v) => self.state.stroke_color = Rgb::from_gray(v[0] as f32),
                None => self.warn_arity(op),
            },
            OP_COLOR_SET_FILL_CS_DEVICEGRAY => match last_n_f64(&operands, 1) {
                Some(v) => self.state.fill_color = Rgb::from_gray(v[0] as f32),
                None => self.warn_arity(op),
            },
            OP_COLOR_SET_STROKE_CS_DEVICECMYK => match last_n_f64(&operands, 4) {
                Some(v) => self.state.stroke_color = cmyk(&v),
                None => self.warn_arity(op),
            },
            OP_COLOR_SET_FILL_CS_DEVICECMYK => match last_n_f64(&operands, 4) {
                Some(v) => self.state.fill_color = cmyk(&v),
                None => self.warn_arity(op),
            },
            OP_COLOR_SET_STROKE_CS | OP_COLOR_SET_FILL_CS => {
                // Color-space selection; sc/scn below interpret by component count.
            }
            OP_COLOR_SET_STROKE_COLOR | OP_COLOR_SET_STROKE_COLOR_ICC => {
                match color_from_components(&operands) {
                    Some(c) => self.state.stroke_color = c,
                    None => self.warn_arity(op),
                }
            }
            OP_COLOR_SET_FILL_COLOR | OP_COLOR_SET_FILL_COLOR_ICC => {
                match color_from_components(&operands) {
                    Some(c) => self.state.fill_color = c,
                    None => self.warn_arity(op),
                }
            }

            OP_PATH_CONST_MOVE_TO => match last_n_f64(&operands, 2) {
                Some(v) => self.move_to(v[0], v[1]),
                None => self.warn_arity(op),
            },
            OP_PATH_CONST_LINE_TO => match last_n_f64(&operands, 2) {
                Some(v) => self.line_to(v[0], v[1]),
                None => self.warn_arity(op),
            },
            OP_PATH_CONST_4BEZIER => match last_n_f64(&operands, 6) {
                Some(v) => self.line_to(v[4], v[5]),
                None => self.warn_arity(op),
            },
            OP_PATH_CONST_3BEZIER_V1 => match last_n_f64(&operands, 4) {
                Some(v) => self.line_to(v[2], v[3]),
                None => self.warn_arity(op),
            },
            OP_PATH_CONST_3BEZIER_V2 => match last_n_f64(&operands, 4) {
                Some(v) => self.line_to(v[2], v[3]),
                None => self.warn_arity(op),
            },
            OP_PATH_CONST_RECT => match last_n_f64(&operands, 4) {
                Some(v) => self.rect(v[0], v[1], v[2], v[3]),
                None => self.warn_arity(op),
            },
            OP_PATH_CONST_CLOSE_SUBPATH => self.close_subpath(),
            OP_PATH_CONST_CLIP_NZ | OP_PATH_CONST_CLIP_EO => {
                // Clip intent is recorded by the next painting operator in real
                // viewers; the path extractor has no clip region to narrow against.
            }

            OP_PATH_PAINT_STROKE => self.paint(true, false),
            OP_PATH_PAINT_STROKE_CLOSE => {
                self.close_subpath();
                self.paint(true, false);
            }
            OP_PATH_PAINT_FILL_NZ | OP_PATH_PAINT_FILL_NZ_OLD | OP_PATH_PAINT_FILL_EO => {
                self.paint(false, true);
            }
            OP_PATH_PAINT_FILL_STROKE_NZ | OP_PATH_PAINT_FILL_STROKE_EO => self.paint(true, true),
            OP_PATH_PAINT_FILL_STROKE_CLOSE_NZ | OP_PATH_PAINT_FILL_STROKE_CLOSE_EO => {
                self.close_subpath();
                self.paint(true, true);
            }
            OP_PATH_PAINT_END => {
                self.current_path.clear();
            }

            OP_TEXT_BEGIN => {
                self.state.text.text_matrix = Matrix::IDENTITY;
                self.state.text.text_line_matrix = Matrix::IDENTITY;
            }
            OP_TEXT_END => {}

            OP_TEXT_STATE_SET_CHAR_SPACING => match last_n_f64(&operands, 1) {
                Some(v) => self.state.text.char_spacing = v[0],
                None => self.warn_arity(op),
            },
            OP_TEXT_STATE_SET_WORD_SPACING => match last_n_f64(&operands, 1) {
                Some(v) => self.state.text.word_spacing = v[0],
                None => self.warn_arity(op),
            },
            OP_TEXT_STATE_SET_HORIZ_SCALE => match last_n_f64(&operands, 1) {
                Some(v) => self.state.text.horiz_scale = v[0],
                None => self.warn_arity(op),
            },
            OP_TEXT_STATE_SET_LEADING => match last_n_f64(&operands, 1) {
                Some(v) => self.state.text.leading = v[0],
                None => self.warn_arity(op),
            },
            OP_TEXT_STATE_SET_RENDER_MODE => match last_n_f64(&operands, 1) {
                Some(v) => self.state.text.render_mode = v[0] as i64,
                None => self.warn_arity(op),
            },
            OP_TEXT_STATE_SET_RISE => match last_n_f64(&operands, 1) {
                Some(v) => self.state.text.rise = v[0],
                None => self.warn_arity(op),
            },
            OP_TEXT_STATE_SET_FONT => {
                let size = operands.iter().rev().find_map(|o| o.as_f64());
                let name = operands.iter().rev().find_map(|o| o.as_name().map(str::to_string));
                match (name, size) {
                    (Some(n), Some(s)) => {
                        self.state.text.font_name = Some(n);
                        self.state.text.font_size = s;
                    }
                    _ => self.warn_arity(op),
                }
            }

            OP_TEXT_POS_SET_MATRIX => match last_n_f64(&operands, 6) {
                Some(v) => {
                    let m = Matrix([v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32, v[4] as f32, v[5] as f32]);
                    self.state.text.text_matrix = m;
                    self.state.text.text_line_matrix = m;
                }
                None => self.warn_arity(op),
            },
            OP_TEXT_POS_NEXT_LINE_OFFSET => match last_n_f64(&operands, 2) {
                Some(v) => self.text_line_offset(v[0], v[1]),
                None => self.warn_arity(op),
            },
            OP_TEXT_POS_NEXT_LINE_OFFSET_LEADING => match last_n_f64(&operands, 2) {
                Some(v) => {
                    self.state.text.leading = -v[1];
                    self.text_line_offset(v[0], v[1]);
                }
                None => self.warn_arity(op),
            },
            OP_TEXT_POS_NEXT_LINE => {
                let leading = self.state.text.leading;
                self.text_line_offset(0.0, -leading);
            }

            OP_TEXT_SHOW => match operands.iter().rev().find_map(|o| o.as_string()) {
                Some(bytes) => self.show_text(bytes),
                None => self.warn_arity(op),
            },
            OP_TEXT_SHOW_ARRAY => match operands.iter().rev().find_map(|o| o.as_array()) {
                Some(items) => self.show_text_array(items),
                None => self.warn_arity(op),
            },
            OP_TEXT_NEXT_LINE_SHOW => {
                let leading = self.state.text.leading;
                self.text_line_offset(0.0, -leading);
                match operands.iter().rev().find_map(|o| o.as_string()) {
                    Some(bytes) => self.show_text(bytes),
                    None => self.warn_arity(op),
                }
            }
            OP_TEXT_NEXT_LINE_SHOW_SPACED => {
                let nums: Vec<f64> = operands.iter().filter_map(|o| o.as_f64()).collect();
                if nums.len() >= 2 {
                    self.state.text.word_spacing = nums[nums.len() - 2];
                    self.state.text.char_spacing = nums[nums.len() - 1];
                }
                let leading = self.state.text.leading;
                self.text_line_offset(0.0, -leading);
                match operands.iter().rev().find_map(|o| o.as_string()) {
                    Some(bytes) => self.show_text(bytes),
                    None => self.warn_arity(op),
                }
            }

            OP_XOBJECT_DO => {
                // Form/Image XObjects are outside the VM's required operator set.
            }

            _ => self.warn(format!("unknown content-stream operator '{op}'")),
        }
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.current_path.push(vec![(x, y)]);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        match self.current_path.last_mut() {
            Some(sub) => sub.push((x, y)),
            None => self.current_path.push(vec![(x, y)]),
        }
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        self.current_path.push(vec![
            (x, y),
            (x + w, y),
            (x + w, y + h),
            (x, y + h),
            (x, y),
        ]);
    }

    fn close_subpath(&mut self) {
        if let Some(sub) = self.current_path.last_mut() {
            if let Some(&start) = sub.first() {
                sub.push(start);
            }
        }
    }

    fn paint(&mut self, stroked: bool, filled: bool) {
        let ctm = self.state.ctm;
        let color = if filled { self.state.fill_color } else { self.state.stroke_color };
        let stroke_width = self.state.line_width;
        for sub in self.current_path.drain(..) {
            let device_pts: Vec<(f64, f64)> = sub
                .iter()
                .map(|&(x, y)| {
                    let (dx, dy) = ctm.apply_to_point(x as f32, y as f32);
                    (dx as f64, dy as f64)
                })
                .collect();
            let (rect, lines) = classify_subpath(&device_pts, stroked, filled, stroke_width, color);
            if let Some(r) = rect {
                self.paths.rectangles.push(r);
            }
            self.paths.lines.extend(lines);
        }
    }

    fn text_line_offset(&mut self, tx: f64, ty: f64) {
        let translate = Matrix::translation(tx as f32, ty as f32);
        let new_tlm = translate.combine(self.state.text.text_line_matrix);
        self.state.text.text_line_matrix = new_tlm;
        self.state.text.text_matrix = new_tlm;
    }

    fn codes_for(&self, bytes: &[u8], is_cid: bool) -> Vec<u32> {
        if is_cid {
            bytes
                .chunks(2)
                .map(|c| if c.len() == 2 { ((c[0] as u32) << 8) | c[1] as u32 } else { c[0] as u32 })
                .collect()
        } else {
            bytes.iter().map(|&b| b as u32).collect()
        }
    }

    fn show_text(&mut self, bytes: &[u8]) {
        let font_name = self.state.text.font_name.clone().unwrap_or_default();
        let ts = self.state.text.clone();

        let (decoded, advance) = match self.fonts.get(&font_name) {
            Some(font) => {
                let codes = self.codes_for(bytes, font.is_cid);
                let width_sum: f64 = codes.iter().map(|&c| font.width_for_code(c)).sum();
                let num_spaces = if font.is_cid {
                    0
                } else {
                    bytes.iter().filter(|&&b| b == b' ').count()
                };
                let advance = compute_advance(
                    Some(width_sum),
                    codes.len(),
                    num_spaces,
                    ts.font_size,
                    ts.char_spacing,
                    ts.word_spacing,
                    ts.horiz_scale,
                );
                (font.decode_text(bytes), advance)
            }
            None => {
                self.warn(format!("Tj with unknown font resource '{font_name}'"));
                let num_spaces = bytes.iter().filter(|&&b| b == b' ').count();
                let advance = compute_advance(
                    None,
                    bytes.len(),
                    num_spaces,
                    ts.font_size,
                    ts.char_spacing,
                    ts.word_spacing,
                    ts.horiz_scale,
                );
                (String::from_utf8_lossy(bytes).into_owned(), advance)
            }
        };

        let (x, y) = device_origin(&self.state.ctm, &ts.text_matrix, ts.rise);
        let font_size = effective_font_size(ts.font_size, &ts.text_matrix);

        self.text.push(TextFragment {
            text: decoded,
            x,
            y,
            font_size,
            advance,
            font: font_name,
        });

        let translate = Matrix::translation(advance as f32, 0.0);
        self.state.text.text_matrix = translate.combine(self.state.text.text_matrix);
    }

    fn show_text_array(&mut self, items: &[Object]) {
        for item in items {
            match item {
                Object::String(bytes) => self.show_text(bytes),
                Object::Integer(_) | Object::Real(_) => {
                    if let Some(k) = item.as_f64() {
                        let th = self.state.text.horiz_scale / 100.0;
                        let dx = -k / 1000.0 * self.state.text.font_size * th;
                        let translate = Matrix::translation(dx as f32, 0.0);
                        self.state.text.text_matrix = translate.combine(self.state.text.text_matrix);
                    }
                }
                _ => {}
            }
        }
    }
}

fn last_n_f64(ops: &[Object], n: usize) -> Option<Vec<f64>> {
    if ops.len() < n {
        return None;
    }
    let start = ops.len() - n;
    let mut out = Vec::with_capacity(n);
    for o in &ops[start..] {
        out.push(o.as_f64()?);
    }
    Some(out)
}

fn matrix6(ops: &[Object]) -> Option<Matrix> {
    let v = last_n_f64(ops, 6)?;
    Some(Matrix([v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32, v[4] as f32, v[5] as f32]))
}

fn rgb(v: &[f64]) -> Rgb {
    Rgb::new(v[0] as f32, v[1] as f32, v[2] as f32)
}

fn cmyk(v: &[f64]) -> Rgb {
    Rgb::from_cmyk(v[0] as f32, v[1] as f32, v[2] as f32, v[3] as f32)
}

fn color_from_components(ops: &[Object]) -> Option<Rgb> {
    let nums: Vec<f64> = ops.iter().filter_map(|o| o.as_f64()).collect();
    match nums.len() {
        1 => Some(Rgb::from_gray(nums[0] as f32)),
        3 => Some(rgb(&nums)),
        4 => Some(cmyk(&nums)),
        _ => None,
    }
}
