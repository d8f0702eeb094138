//! Font layer: glyph-code-to-Unicode decoding and advance widths (C8).
//!
//! Priority for text decoding: `/ToUnicode` CMap, then `/Encoding` (predefined table
//! or `/BaseEncoding` + `/Differences`), then identity (byte value as code point).

use std::collections::BTreeMap;

use crate::cmap::{get_to_unicode_cmap_from_font, ToUnicodeCMap};
use crate::document::Reader;
use crate::encodings::{glyph_name_to_unicode, BaseEncoding};
use crate::errors::Result;
use crate::object::{Dictionary, Object};

/// Standard (non-embedded) PDF fonts, identified by `/BaseFont` name; used when a
/// font dictionary supplies no `/Widths` array.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BuiltinFont {
    TimesRoman,
    TimesBold,
    TimesItalic,
    TimesBoldItalic,
    Helvetica,
    HelveticaBold,
    HelveticaOblique,
    HelveticaBoldOblique,
    Courier,
    CourierOblique,
    CourierBold,
    CourierBoldOblique,
    Symbol,
    ZapfDingbats,
}

impl BuiltinFont {
    pub fn from_base_font(name: &str) -> Option<BuiltinFont> {
        use BuiltinFont::*;
        // Subset tag prefixes ("ABCDEF+Helvetica") are stripped before matching.
        let name = name.splitn(2, '+').last().unwrap_or(name);
        Some(match name {
            "Times-Roman" => TimesRoman,
            "Times-Bold" => TimesBold,
            "Times-Italic" => TimesItalic,
            "Times-BoldItalic" => TimesBoldItalic,
            "Helvetica" => Helvetica,
            "Helvetica-Bold" => HelveticaBold,
            "Helvetica-Oblique" => HelveticaOblique,
            "Helvetica-BoldOblique" => HelveticaBoldOblique,
            "Courier" => Courier,
            "Courier-Oblique" => CourierOblique,
            "Courier-Bold" => CourierBold,
            "Courier-BoldOblique" => CourierBoldOblique,
            "Symbol" => Symbol,
            "ZapfDingbats" => ZapfDingbats,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        use BuiltinFont::*;
        match self {
            TimesRoman => "Times-Roman",
            TimesBold => "Times-Bold",
            TimesItalic => "Times-Italic",
            TimesBoldItalic => "Times-BoldItalic",
            Helvetica => "Helvetica",
            HelveticaBold => "Helvetica-Bold",
            HelveticaOblique => "Helvetica-Oblique",
            HelveticaBoldOblique => "Helvetica-BoldOblique",
            Courier => "Courier",
            CourierOblique => "Courier-Oblique",
            CourierBold => "Courier-Bold",
            CourierBoldOblique => "Courier-BoldOblique",
            Symbol => "Symbol",
            ZapfDingbats => "ZapfDingbats",
        }
    }

    /// Courier's 14 built-ins are the only monospace family; every glyph is 600/1000 em.
    /// The proportional families fall back to a flat Helvetica-ish average (556/1000)
    /// since no AFM metrics table is shipped with this crate.
    fn default_width(self) -> f64 {
        use BuiltinFont::*;
        match self {
            Courier | CourierOblique | CourierBold | CourierBoldOblique => 600.0,
            _ => 556.0,
        }
    }
}

enum WidthTable {
    Simple {
        first_char: i64,
        widths: Vec<f64>,
        missing_width: f64,
    },
    Composite {
        /// CID -> width, expanded from /W's range/array forms.
        widths: BTreeMap<u32, f64>,
        default_width: f64,
    },
    Builtin(BuiltinFont),
}

/// A decoded font resource: code-to-Unicode mapping plus advance widths, built once
/// per `/Font` resource entry and reused across every `Tj`/`TJ` in a content stream.
pub struct FontInfo {
    to_unicode: Option<ToUnicodeCMap>,
    base_encoding: Option<BaseEncoding>,
    differences: BTreeMap<u32, char>,
    widths: WidthTable,
    /// Type 3 glyph-space-to-text-space scale, applied on top of /Widths; identity
    /// (1.0) for all other font subtypes.
    font_matrix_scale: f64,
    pub is_cid: bool,
}

impl FontInfo {
    pub fn load(font_dict: &Dictionary, reader: &Reader) -> Result<FontInfo> {
        let subtype = font_dict.get("Subtype").and_then(|o| o.as_name());
        let is_cid = subtype == Some("Type0");

        let to_unicode = get_to_unicode_cmap_from_font(font_dict, reader).ok();

        let (base_encoding, differences) = parse_encoding(font_dict, reader)?;

        let font_matrix_scale = if subtype == Some("Type3") {
            font_dict
                .get("FontMatrix")
                .and_then(|o| o.as_array())
                .and_then(|a| a.first().and_then(|v| v.as_f64()))
                .unwrap_or(0.001)
                * 1000.0
        } else {
            1.0
        };

        let widths = if is_cid {
            load_composite_widths(font_dict, reader)?
        } else if let Some(w) = font_dict.get("Widths") {
            let first_char = font_dict.get("FirstChar").and_then(|o| o.as_i64()).unwrap_or(0);
            let missing_width = font_dict
                .get("MissingWidth")
                .and_then(|o| o.as_f64())
                .unwrap_or(0.0);
            let arr = reader.resolve(w)?;
            let widths = arr
                .as_array()
                .map(|items| items.iter().map(|o| o.as_f64().unwrap_or(missing_width)).collect())
                .unwrap_or_default();
            WidthTable::Simple {
                first_char,
                widths,
                missing_width,
            }
        } else {
            let base_font = font_dict.get("BaseFont").and_then(|o| o.as_name()).unwrap_or("");
            let builtin = BuiltinFont::from_base_font(base_font).unwrap_or(BuiltinFont::Helvetica);
            WidthTable::Builtin(builtin)
        };

        Ok(FontInfo {
            to_unicode,
            base_encoding,
            differences,
            widths,
            font_matrix_scale,
            is_cid,
        })
    }

    /// Decodes a content-stream string operand into Unicode text, using /ToUnicode
    /// first, falling back to /Encoding, falling back to identity.
    pub fn decode_text(&self, bytes: &[u8]) -> String {
        if let Some(cmap) = &self.to_unicode {
            let s = cmap.map_bytes(bytes);
            if !s.is_empty() {
                return s;
            }
        }
        let mut out = String::new();
        for &b in bytes {
            if let Some(ch) = self.differences.get(&(b as u32)) {
                out.push(*ch);
                continue;
            }
            if let Some(enc) = self.base_encoding {
                if let Some(ch) = enc.decode(b) {
                    out.push(ch);
                    continue;
                }
            }
            out.push(b as char);
        }
        out
    }

    /// Per-code advance width in thousandths of em (scaled for Type 3 fonts).
    pub fn width_for_code(&self, code: u32) -> f64 {
        let w = match &self.widths {
            WidthTable::Simple {
                first_char,
                widths,
                missing_width,
            } => {
                let idx = code as i64 - first_char;
                if idx >= 0 {
                    widths.get(idx as usize).copied().unwrap_or(*missing_width)
                } else {
                    *missing_width
                }
            }
            WidthTable::Composite { widths, default_width } => {
                widths.get(&code).copied().unwrap_or(*default_width)
            }
            WidthTable::Builtin(b) => b.default_width(),
        };
        w * self.font_matrix_scale
    }
}

fn parse_encoding(
    font_dict: &Dictionary,
    reader: &Reader,
) -> Result<(Option<BaseEncoding>, BTreeMap<u32, char>)> {
    let mut differences = BTreeMap::new();
    let encoding = match font_dict.get("Encoding") {
        Some(enc) => reader.resolve(enc)?,
        None => return Ok((None, differences)),
    };

    match &encoding {
        Object::Name(n) => Ok((BaseEncoding::from_name(n.as_str()), differences)),
        Object::Dictionary(d) => {
            let base = d
                .get("BaseEncoding")
                .and_then(|o| o.as_name())
                .and_then(BaseEncoding::from_name);
            if let Some(diffs) = d.get("Differences").and_then(|o| o.as_array()) {
                let mut current_code = 0u32;
                for item in diffs {
                    match item {
                        Object::Integer(n) => current_code = *n as u32,
                        Object::Real(r) => current_code = *r as u32,
                        Object::Name(n) => {
                            if let Some(ch) = glyph_name_to_unicode(n.as_str()) {
                                differences.insert(current_code, ch);
                            }
                            current_code += 1;
                        }
                        _ => {}
                    }
                }
            }
            Ok((base, differences))
        }
        _ => Ok((None, differences)),
    }
}

fn load_composite_widths(font_dict: &Dictionary, reader: &Reader) -> Result<WidthTable> {
    let descendants = font_dict
        .get("DescendantFonts")
        .map(|o| reader.resolve(o))
        .transpose()?;
    let descendant = descendants
        .as_ref()
        .and_then(|o| o.as_array())
        .and_then(|a| a.first());
    let descendant_dict = match descendant {
        Some(d) => reader.resolve(d)?.as_dict().cloned(),
        None => None,
    };

    let default_width = descendant_dict
        .as_ref()
        .and_then(|d| d.get("DW"))
        .and_then(|o| o.as_f64())
        .unwrap_or(1000.0);

    let mut widths = BTreeMap::new();
    if let Some(d) = &descendant_dict {
        if let Some(w_array) = d.get("W").map(|o| reader.resolve_deep(o)).transpose()? {
            if let Some(items) = w_array.as_array() {
                let mut i = 0usize;
                while i < items.len() {
                    let first = items[i].as_i64().unwrap_or(0) as u32;
                    i += 1;
                    if i >= items.len() {
                        break;
                    }
                    match &items[i] {
                        Object::Array(inner) => {
                            for (j, w) in inner.iter().enumerate() {
                                if let Some(w) = w.as_f64() {
                                    widths.insert(first + j as u32, w);
                                }
                            }
                            i += 1;
                        }
                        last => {
                            let last_code = last.as_i64().unwrap_or(first as i64) as u32;
                            i += 1;
                            if i >= items.len() {
                                break;
                            }
                            if let Some(w) = items[i].as_f64() {
                                for code in first..=last_code {
                                    widths.insert(code, w);
                                }
                            }
                            i += 1;
                        }
                    }
                }
            }
        }
    }

    Ok(WidthTable::Composite { widths, default_width })
}
