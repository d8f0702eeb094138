//! Content-stream VM: graphics state, the interpreter itself, and the two
//! extraction sinks (text fragments, path primitives) it feeds (C9, C10, C11).

mod graphics_state;
mod interpreter;
mod path;
mod text;

pub use graphics_state::{GraphicsState, TextState};
pub use interpreter::Interpreter;
pub use path::{ExtractedLine, ExtractedRectangle, PathExtractor};
pub use text::TextFragment;

use serde_derive::{Deserialize, Serialize};

use crate::document::Reader;
use crate::errors::Result;
use crate::filters::decode_stream;
use crate::object::Object;
use crate::page::Page;

/// Everything a page's content streams produced: text in execution order, plus the
/// classified path primitives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractResult {
    pub text: Vec<TextFragment>,
    pub lines: Vec<ExtractedLine>,
    pub rectangles: Vec<ExtractedRectangle>,
}

/// Concatenates a page's `/Contents` (a single stream, or an array of streams, per
/// the spec) into one filter-decoded byte buffer, separating adjacent streams with a
/// space so an operator split across stream boundaries can't glue onto its neighbor.
pub fn content_bytes(reader: &Reader, page: &Page) -> Result<Vec<u8>> {
    let contents = match page.dict.get("Contents") {
        Some(c) => reader.resolve(c)?,
        None => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    match &contents {
        Object::Stream(s) => out.extend(decode_stream(s)?),
        Object::Array(items) => {
            for item in items {
                let resolved = reader.resolve(item)?;
                if let Some(s) = resolved.as_stream() {
                    if !out.is_empty() {
                        out.push(b' ');
                    }
                    out.extend(decode_stream(s)?);
                }
            }
        }
        _ => {}
    }
    Ok(out)
}

/// Runs the VM over a page's content streams and returns the accumulated extraction
/// result.
pub fn extract(reader: &Reader, page: &Page) -> Result<ExtractResult> {
    let content = content_bytes(reader, page)?;
    let mut interp = Interpreter::new(reader, page.resources.as_ref())?;
    interp.run(&content)?;
    Ok(ExtractResult {
        text: interp.text,
        lines: interp.paths.lines,
        rectangles: interp.paths.rectangles,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{Dictionary, Name, Stream};

    const PAGE_WITH_RECT_CONTENT: &[u8] = concat!(
        "%PDF-1.4\n",
        "1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n",
        "2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>\nendobj\n",
        "3 0 obj\n<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << >> >>\nendobj\n",
        "4 0 obj\n<< /Length 43 >>\nstream\n100 100 m 300 100 l 300 200 l 100 200 l h f\nendstream\nendobj\n",
        "xref\n0 5\n",
        "0000000000 65535 f \n",
        "0000000009 00000 n \n",
        "0000000058 00000 n \n",
        "0000000139 00000 n \n",
        "0000000219 00000 n \n",
        "trailer\n<< /Size 5 /Root 1 0 R >>\n",
        "startxref\n312\n%%EOF"
    )
    .as_bytes();

    fn reader_with_page() -> (Reader, Page) {
        let reader = Reader::open(PAGE_WITH_RECT_CONTENT.to_vec()).unwrap();
        let root = reader.root().unwrap();
        let pages_ref = root.get("Pages").unwrap();
        let pages = reader.resolve(pages_ref).unwrap().as_dict().unwrap().clone();
        let page = crate::page::get_page(&reader, &pages, 0).unwrap();
        (reader, page)
    }

    #[test]
    fn extract_runs_a_pages_content_stream_end_to_end() {
        let (reader, page) = reader_with_page();
        let result = extract(&reader, &page).unwrap();
        assert_eq!(result.rectangles.len(), 1);
        assert!(result.text.is_empty());
    }

    #[test]
    fn extract_result_round_trips_through_json() {
        let (reader, page) = reader_with_page();
        let result = extract(&reader, &page).unwrap();
        let json = serde_json::to_string(&result).unwrap();
        let back: ExtractResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rectangles, result.rectangles);
    }

    fn minimal_reader() -> Reader {
        Reader::open(
            b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\nxref\n0 2\n0000000000 65535 f \n0000000009 00000 n \ntrailer\n<< /Size 2 /Root 1 0 R >>\nstartxref\n45\n%%EOF"
                .to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn content_bytes_returns_empty_when_page_has_no_contents() {
        let reader = minimal_reader();
        let mut dict = Dictionary::new();
        dict.insert(Name::new("Type"), Object::Name(Name::new("Page")));
        let page = Page {
            dict,
            media_box: None,
            crop_box: None,
            resources: None,
            rotate: 0,
        };
        assert!(content_bytes(&reader, &page).unwrap().is_empty());
    }

    #[test]
    fn content_bytes_joins_array_of_streams_with_a_separator() {
        let reader = minimal_reader();
        let mut dict = Dictionary::new();
        dict.insert(Name::new("Type"), Object::Name(Name::new("Page")));
        let s1 = Stream::new(Dictionary::new(), b"BT".to_vec());
        let s2 = Stream::new(Dictionary::new(), b"ET".to_vec());
        dict.insert(
            Name::new("Contents"),
            Object::Array(vec![Object::Stream(s1), Object::Stream(s2)]),
        );
        let page = Page {
            dict,
            media_box: None,
            crop_box: None,
            resources: None,
            rotate: 0,
        };
        assert_eq!(content_bytes(&reader, &page).unwrap(), b"BT ET");
    }
}
