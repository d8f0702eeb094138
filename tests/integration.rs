//! Black-box integration tests built from literal/dynamically-assembled PDF byte
//! strings, covering the concrete end-to-end scenarios and the round-trip/boundary
//! properties named for the core.

use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

use pdfcore::{content, get_page, page_count, Dictionary, Name, Object, Reader, Stream};

fn deflate(data: &[u8]) -> Vec<u8> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

/// Assembles a minimal single-revision PDF from a list of `(object number, body
/// bytes)` pairs (body excludes the `N 0 obj`/`endobj` wrapper) plus a classical
/// xref table covering object numbers `0..size`. Object numbers absent from
/// `bodies` are recorded as Free.
fn build_pdf(bodies: &[(u32, Vec<u8>)], root_num: u32, size: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = vec![None; size as usize];
    for (num, body) in bodies {
        offsets[*num as usize] = Some(out.len());
        out.extend_from_slice(format!("{num} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    for n in 0..size {
        match offsets[n as usize] {
            Some(off) => out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes()),
            None if n == 0 => out.extend_from_slice(b"0000000000 65535 f \n"),
            None => out.extend_from_slice(b"0000000000 00000 f \n"),
        }
    }
    out.extend_from_slice(
        format!("trailer\n<< /Size {size} /Root {root_num} 0 R >>\nstartxref\n{xref_offset}\n%%EOF")
            .as_bytes(),
    );
    out
}

fn stream_body(dict_extra: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("<< {dict_extra} /Length {} >>\nstream\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

/// A one-page document whose content stream is `content`, with a single
/// Helvetica-ish font `/F1` (flat 500/1000-em width for every code, WinAnsiEncoding).
fn one_page_pdf(content: &[u8]) -> Vec<u8> {
    let bodies: Vec<(u32, Vec<u8>)> = vec![
        (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
        (
            2,
            b"<< /Type /Pages /Kids [3 0 R] /Count 1 /MediaBox [0 0 612 792] >>".to_vec(),
        ),
        (
            3,
            b"<< /Type /Page /Parent 2 0 R /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
                .to_vec(),
        ),
        (4, stream_body("", content)),
        (
            5,
            b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding /FirstChar 0 /Widths [] /MissingWidth 500 >>"
                .to_vec(),
        ),
    ];
    build_pdf(&bodies, 1, 6)
}

fn first_page(reader: &Reader) -> pdfcore::Page {
    let root = reader.root().unwrap();
    let pages_ref = root.get("Pages").unwrap();
    let pages = reader.resolve(pages_ref).unwrap().as_dict().unwrap().clone();
    get_page(reader, &pages, 0).unwrap()
}

#[test]
fn s1_trivial_parse() {
    let bytes = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\nxref\n0 3\n0000000000 65535 f \n0000000009 00000 n \n0000000058 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n110\n%%EOF".to_vec();
    let reader = Reader::open(bytes).unwrap();
    assert_eq!(reader.version(), (1, 4));

    let root = reader.root().unwrap();
    let pages_ref = root.get("Pages").unwrap();
    let pages = reader.resolve(pages_ref).unwrap().as_dict().unwrap().clone();
    assert_eq!(page_count(&reader, &pages).unwrap(), 0);

    let catalog = reader.get_object(1).unwrap();
    assert_eq!(catalog.as_dict().unwrap().type_name(), Some("Catalog"));
}

#[test]
fn s2_text_fragment_extraction() {
    let bytes = one_page_pdf(b"BT /F1 12 Tf 72 720 Td (Hello) Tj ET");
    let reader = Reader::open(bytes).unwrap();
    let page = first_page(&reader);
    let result = content::extract(&reader, &page).unwrap();

    assert_eq!(result.text.len(), 1);
    let f = &result.text[0];
    assert_eq!(f.text, "Hello");
    assert_eq!(f.x, 72.0);
    assert_eq!(f.y, 720.0);
    assert_eq!(f.font_size, 12.0);
}

#[test]
fn s3_tj_kerning_advances_second_fragment() {
    let bytes = one_page_pdf(b"BT /F1 10 Tf 0 0 Td [(Hello) -250 (World)] TJ ET");
    let reader = Reader::open(bytes).unwrap();
    let page = first_page(&reader);
    let result = content::extract(&reader, &page).unwrap();

    assert_eq!(result.text.len(), 2);
    assert_eq!(result.text[0].text, "Hello");
    assert_eq!(result.text[1].text, "World");

    // Each glyph is 500/1000 em at font size 10 => 5.0 user-space units/char.
    let width_hello = 5.0 * 5.0;
    let expected_world_x = width_hello + 250.0 * 10.0 / 1000.0;
    assert!((result.text[1].x - expected_world_x).abs() < 1e-6);
}

#[test]
fn s4_rectangle_detection() {
    let bytes = one_page_pdf(b"100 100 200 150 re S");
    let reader = Reader::open(bytes).unwrap();
    let page = first_page(&reader);
    let result = content::extract(&reader, &page).unwrap();

    assert_eq!(result.rectangles.len(), 1);
    assert!(result.lines.is_empty());
    let r = &result.rectangles[0];
    assert_eq!((r.x0, r.y0, r.x1, r.y1), (100.0, 100.0, 300.0, 250.0));
    assert!(r.stroked);
}

#[test]
fn s5_path_closed_by_s_is_three_lines() {
    let bytes = one_page_pdf(b"0 0 m 100 0 l 50 100 l s");
    let reader = Reader::open(bytes).unwrap();
    let page = first_page(&reader);
    let result = content::extract(&reader, &page).unwrap();

    assert!(result.rectangles.is_empty());
    assert_eq!(result.lines.len(), 3);
    let last = &result.lines[2];
    assert_eq!((last.x0, last.y0, last.x1, last.y1), (50.0, 100.0, 0.0, 0.0));
}

#[test]
fn s6_incremental_update_overwrites_object() {
    let mut revision1 = build_pdf(
        &[
            (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
            (2, b"<< /Type /Pages /Kids [] /Count 0 >>".to_vec()),
            (5, b"<< /Revision (A) >>".to_vec()),
        ],
        1,
        6,
    );
    // `build_pdf`'s own trailer/startxref are for revision 1 alone; locate its xref
    // offset by re-deriving it the same way `build_pdf` computed it, so the appended
    // revision's /Prev can point back to it.
    let prev_xref_offset = revision1
        .windows(b"\nxref\n".len())
        .rposition(|w| w == b"\nxref\n")
        .unwrap()
        + 1;

    let obj5_offset = revision1.len();
    revision1.extend_from_slice(b"5 0 obj\n<< /Revision (B) >>\nendobj\n");
    let xref2_offset = revision1.len();
    revision1.extend_from_slice(b"xref\n5 1\n");
    revision1.extend_from_slice(format!("{obj5_offset:010} 00000 n \n").as_bytes());
    revision1.extend_from_slice(
        format!(
            "trailer\n<< /Size 6 /Root 1 0 R /Prev {prev_xref_offset} >>\nstartxref\n{xref2_offset}\n%%EOF"
        )
        .as_bytes(),
    );

    let reader = Reader::open(revision1).unwrap();
    let obj5 = reader.get_object(5).unwrap();
    assert_eq!(
        obj5.as_dict().unwrap().get("Revision").unwrap().as_string(),
        Some(b"B".as_slice())
    );
}

#[test]
fn s7_compressed_object_in_objstm() {
    // ObjStm (object 10) containing object 5 at index 0.
    let header = b"5 0 ";
    let body = b"<< /A 42 >>";
    let mut payload = header.to_vec();
    payload.extend_from_slice(body);
    let compressed = deflate(&payload);

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.5\n");
    let objstm_offset = out.len();
    out.extend_from_slice(
        format!(
            "10 0 obj\n<< /Type /ObjStm /N 1 /First {} /Filter /FlateDecode /Length {} >>\nstream\n",
            header.len(),
            compressed.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&compressed);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    let xref_stream_offset = out.len();
    let size: u32 = 12;
    // Entries for object numbers 0..size, [type(1) field1(4) field2(2)] each.
    let mut entries = Vec::new();
    for num in 0..size {
        let (ty, f1, f2): (u8, u32, u16) = match num {
            0 => (0, 0, 65535),
            10 => (1, objstm_offset as u32, 0),
            11 => (1, xref_stream_offset as u32, 0),
            5 => (2, 10, 0),
            _ => (0, 0, 0),
        };
        entries.push(ty);
        entries.extend_from_slice(&f1.to_be_bytes());
        entries.extend_from_slice(&f2.to_be_bytes());
    }
    let compressed_xref = deflate(&entries);
    out.extend_from_slice(
        format!(
            "11 0 obj\n<< /Type /XRef /Size {size} /W [1 4 2] /Index [0 {size}] /Root 1 0 R /Filter /FlateDecode /Length {} >>\nstream\n",
            compressed_xref.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&compressed_xref);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{xref_stream_offset}\n%%EOF").as_bytes());

    let reader = Reader::open(out).unwrap();
    let obj5 = reader.get_object(5).unwrap();
    assert_eq!(obj5.as_dict().unwrap().get("A").unwrap().as_i64(), Some(42));
    assert!(reader.objstm_cache_len() >= 1);
}

#[test]
fn every_page_has_a_four_real_effective_media_box() {
    let bytes = one_page_pdf(b"");
    let reader = Reader::open(bytes).unwrap();
    let root = reader.root().unwrap();
    let pages_ref = root.get("Pages").unwrap();
    let pages = reader.resolve(pages_ref).unwrap().as_dict().unwrap().clone();
    let count = page_count(&reader, &pages).unwrap();
    for i in 0..count {
        let page = get_page(&reader, &pages, i).unwrap();
        let bbox = page.effective_box();
        assert_eq!(bbox, Some([0.0, 0.0, 612.0, 792.0]));
    }
}

#[test]
fn whitespace_only_content_stream_yields_no_fragments() {
    let bytes = one_page_pdf(b"   \n\t  ");
    let reader = Reader::open(bytes).unwrap();
    let page = first_page(&reader);
    let result = content::extract(&reader, &page).unwrap();
    assert!(result.text.is_empty());
    assert!(result.lines.is_empty());
    assert!(result.rectangles.is_empty());
}

#[test]
fn q_without_matching_save_is_a_warning_not_a_failure() {
    let bytes = one_page_pdf(b"Q 1 0 0 1 5 5 cm");
    let reader = Reader::open(bytes).unwrap();
    let page = first_page(&reader);
    let result = content::extract(&reader, &page);
    assert!(result.is_ok());
    assert!(reader.warnings().iter().any(|w| w.component == "content-stream"));
}

#[test]
fn array_of_streams_is_joined_with_a_separator_before_interpretation() {
    let mut dict = Dictionary::new();
    dict.insert(Name::new("Type"), Object::Name(Name::new("Page")));
    let s1 = Stream::new(Dictionary::new(), b"q 1 0 0 1 10 10 cm".to_vec());
    let s2 = Stream::new(Dictionary::new(), b"Q".to_vec());
    dict.insert(
        Name::new("Contents"),
        Object::Array(vec![Object::Stream(s1), Object::Stream(s2)]),
    );
    let bytes = one_page_pdf(b"");
    let reader = Reader::open(bytes).unwrap();
    let joined = content::content_bytes(
        &reader,
        &pdfcore::Page {
            dict,
            media_box: None,
            crop_box: None,
            resources: None,
            rotate: 0,
        },
    )
    .unwrap();
    assert_eq!(joined, b"q 1 0 0 1 10 10 cm Q");
}
