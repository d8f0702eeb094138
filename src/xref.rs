//! Cross-reference engine: locates and merges classical XRef tables and PDF 1.5+
//! XRef streams across incremental updates (C5).

use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::filters::decode_stream;
use crate::object::{Dictionary, Object};
use crate::parser::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    Free { next_free: u32 },
    Uncompressed { offset: u64, gen: u16 },
    Compressed { stream_obj: u32, index: u32 },
}

#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    pub entries: HashMap<u32, XRefEntry>,
    pub trailer: Dictionary,
}

impl XRefTable {
    pub fn get(&self, obj_num: u32) -> Option<XRefEntry> {
        self.entries.get(&obj_num).copied()
    }

    /// Builds the merged table by locating `startxref`, parsing every section
    /// reachable through `/XRefStm` and `/Prev`, and overwriting entries
    /// oldest-first so later revisions win.
    pub fn build(bytes: &[u8]) -> Result<XRefTable> {
        let start = locate_startxref(bytes)?;
        let mut visited = std::collections::HashSet::new();
        let sections = collect_chain(bytes, start, &mut visited)?;

        let mut merged = XRefTable::default();
        for section in sections.into_iter().rev() {
            for (num, entry) in section.entries {
                merged.entries.insert(num, entry);
            }
            if merged.trailer.is_empty() {
                merged.trailer = section.trailer;
            } else {
                for (k, v) in section.trailer.iter() {
                    if !merged.trailer.contains_key(k.as_str()) {
                        merged.trailer.insert(k.clone(), v.clone());
                    }
                }
            }
        }

        if !merged.entries.contains_key(&0) {
            merged
                .entries
                .insert(0, XRefEntry::Free { next_free: 0 });
        }

        Ok(merged)
    }
}

struct Section {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
}

/// Parses the section at `offset`, then its hybrid `/XRefStm` companion (if any),
/// then its `/Prev` chain (if any), returning them newest-first. A section's own
/// entries come before its `/XRefStm` companion's in the returned order, so once
/// the caller merges oldest-first the classical table still wins over its
/// companion stream for any object number both describe; `/Prev` is walked
/// regardless of whether `/XRefStm` was present, so a hybrid file's older
/// revisions are never dropped.
fn collect_chain(
    bytes: &[u8],
    offset: u64,
    visited: &mut std::collections::HashSet<u64>,
) -> Result<Vec<Section>> {
    if !visited.insert(offset) {
        return Err(Error::XRef(format!(
            "/Prev chain loops back to offset {offset}"
        )));
    }
    let section = parse_section(bytes, offset)?;
    let prev = section
        .trailer
        .get("Prev")
        .and_then(|o| o.as_i64())
        .map(|v| v as u64);
    let xrefstm = section
        .trailer
        .get("XRefStm")
        .and_then(|o| o.as_i64())
        .map(|v| v as u64);

    let mut chain = vec![section];
    if let Some(xs) = xrefstm {
        chain.extend(collect_chain(bytes, xs, visited)?);
    }
    if let Some(p) = prev {
        chain.extend(collect_chain(bytes, p, visited)?);
    }
    Ok(chain)
}

fn locate_startxref(bytes: &[u8]) -> Result<u64> {
    let tail_start = bytes.len().saturating_sub(1024);
    let tail = &bytes[tail_start..];
    let marker = b"startxref";
    let pos = tail
        .windows(marker.len())
        .rposition(|w| w == marker)
        .ok_or_else(|| Error::XRef("missing 'startxref' marker".into()))?;
    let after = tail_start + pos + marker.len();
    let mut i = after;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    let start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    std::str::from_utf8(&bytes[start..i])
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| Error::XRef("startxref offset is not an integer".into()))
}

fn parse_section(bytes: &[u8], offset: u64) -> Result<Section> {
    let offset = offset as usize;
    if offset >= bytes.len() {
        return Err(Error::XRef(format!("xref offset {offset} past end of file")));
    }
    let mut probe = offset;
    while probe < bytes.len() && bytes[probe].is_ascii_whitespace() {
        probe += 1;
    }
    if bytes[probe..].starts_with(b"xref") {
        parse_classical_section(bytes, probe)
    } else {
        parse_xref_stream_section(bytes, offset)
    }
}

fn parse_classical_section(bytes: &[u8], offset: usize) -> Result<Section> {
    let mut pos = offset + 4; // skip "xref"
    let mut entries = HashMap::new();

    loop {
        skip_ws(bytes, &mut pos);
        if bytes[pos..].starts_with(b"trailer") {
            pos += "trailer".len();
            break;
        }
        let (first, pos2) = read_uint(bytes, pos)?;
        pos = pos2;
        skip_ws(bytes, &mut pos);
        let (count, pos3) = read_uint(bytes, pos)?;
        pos = pos3;
        skip_ws(bytes, &mut pos);

        for i in 0..count {
            if pos + 20 > bytes.len() {
                return Err(Error::XRef("truncated xref subsection".into()));
            }
            let line = &bytes[pos..pos + 20];
            let entry = parse_classical_entry(line)?;
            entries.insert((first + i) as u32, entry);
            pos += 20;
        }
    }

    skip_ws(bytes, &mut pos);
    let mut parser = Parser::at(bytes, pos);
    let trailer_obj = parser.parse_object()?;
    let trailer = trailer_obj
        .as_dict()
        .cloned()
        .ok_or_else(|| Error::XRef("trailer is not a dictionary".into()))?;

    Ok(Section { entries, trailer })
}

fn parse_classical_entry(line: &[u8]) -> Result<XRefEntry> {
    let offset_str = std::str::from_utf8(&line[0..10])
        .map_err(|_| Error::XRef("invalid xref entry offset field".into()))?;
    let gen_str = std::str::from_utf8(&line[11..16])
        .map_err(|_| Error::XRef("invalid xref entry generation field".into()))?;
    let flag = line[17];
    let offset: u64 = offset_str
        .trim()
        .parse()
        .map_err(|_| Error::XRef("xref entry offset is not an integer".into()))?;
    let gen: u16 = gen_str
        .trim()
        .parse()
        .map_err(|_| Error::XRef("xref entry generation is not an integer".into()))?;
    match flag {
        b'n' => Ok(XRefEntry::Uncompressed { offset, gen }),
        b'f' => Ok(XRefEntry::Free {
            next_free: offset as u32,
        }),
        other => Err(Error::XRef(format!(
            "xref entry has unknown in-use flag 0x{other:02x}"
        ))),
    }
}

fn parse_xref_stream_section(bytes: &[u8], offset: usize) -> Result<Section> {
    let mut parser = Parser::at(bytes, offset);
    let (_, obj) = parser.parse_indirect_object()?;
    let stream = obj
        .as_stream()
        .ok_or_else(|| Error::XRef("xref stream object is not a stream".into()))?;
    let dict = &stream.dict;
    if dict.type_name() != Some("XRef") {
        return Err(Error::XRef("xref stream dictionary missing /Type /XRef".into()));
    }

    let w: Vec<i64> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::XRef("xref stream missing /W".into()))?
        .iter()
        .map(|o| o.as_i64().unwrap_or(0))
        .collect();
    if w.len() != 3 {
        return Err(Error::XRef("xref stream /W must have 3 entries".into()));
    }
    let size = dict
        .get("Size")
        .and_then(|o| o.as_i64())
        .ok_or_else(|| Error::XRef("xref stream missing /Size".into()))?;
    let index: Vec<i64> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(items) => items.iter().map(|o| o.as_i64().unwrap_or(0)).collect(),
        None => vec![0, size],
    };

    let decoded = decode_stream(stream)?;
    let entry_len = (w[0] + w[1] + w[2]) as usize;
    let mut entries = HashMap::new();
    let mut pos = 0usize;
    let mut ranges = index.chunks(2);
    while let Some(chunk) = ranges.next() {
        let (first, count) = (chunk[0], *chunk.get(1).unwrap_or(&0));
        for i in 0..count {
            if pos + entry_len > decoded.len() {
                return Err(Error::XRef("xref stream truncated".into()));
            }
            let (f0, f1, f2) = read_fields(&decoded[pos..pos + entry_len], &w);
            pos += entry_len;
            let obj_num = (first + i) as u32;
            let typ = if w[0] == 0 { 1 } else { f0 };
            let entry = match typ {
                0 => XRefEntry::Free {
                    next_free: f1 as u32,
                },
                1 => XRefEntry::Uncompressed {
                    offset: f1,
                    gen: f2 as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_obj: f1 as u32,
                    index: f2 as u32,
                },
                other => {
                    return Err(Error::XRef(format!("unknown xref stream entry type {other}")))
                }
            };
            entries.insert(obj_num, entry);
        }
    }

    Ok(Section {
        entries,
        trailer: dict.clone(),
    })
}

fn read_fields(bytes: &[u8], w: &[i64]) -> (i64, u64, u64) {
    let mut pos = 0usize;
    let mut read = |width: i64| -> u64 {
        let width = width as usize;
        let mut v: u64 = 0;
        for &b in &bytes[pos..pos + width] {
            v = (v << 8) | b as u64;
        }
        pos += width;
        v
    };
    let f0 = read(w[0]) as i64;
    let f1 = read(w[1]);
    let f2 = read(w[2]);
    (f0, f1, f2)
}

fn skip_ws(bytes: &[u8], pos: &mut usize) {
    while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
}

fn read_uint(bytes: &[u8], mut pos: usize) -> Result<(u64, usize)> {
    let start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == start {
        return Err(Error::XRef("expected an integer in xref subsection header".into()));
    }
    let v = std::str::from_utf8(&bytes[start..pos])
        .unwrap()
        .parse()
        .map_err(|_| Error::XRef("malformed xref subsection integer".into()))?;
    Ok((v, pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const S1: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\nxref\n0 3\n0000000000 65535 f \n0000000009 00000 n \n0000000058 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n110\n%%EOF";

    #[test]
    fn locates_startxref_offset() {
        assert_eq!(locate_startxref(S1).unwrap(), 110);
    }

    #[test]
    fn parses_classical_table_and_trailer() {
        let table = XRefTable::build(S1).unwrap();
        assert_eq!(table.get(0), Some(XRefEntry::Free { next_free: 0 }));
        assert_eq!(
            table.get(1),
            Some(XRefEntry::Uncompressed { offset: 9, gen: 0 })
        );
        assert_eq!(
            table.get(2),
            Some(XRefEntry::Uncompressed { offset: 58, gen: 0 })
        );
        assert_eq!(table.trailer.get("Size").unwrap().as_i64(), Some(3));
    }

    #[test]
    fn missing_startxref_is_an_error() {
        assert!(locate_startxref(b"%PDF-1.4\nno xref here").is_err());
    }

    #[test]
    fn hybrid_xrefstm_merges_without_dropping_the_prev_chain() {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        fn deflate(data: &[u8]) -> Vec<u8> {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(data).unwrap();
            enc.finish().unwrap()
        }

        // Revision A: a complete, standalone classical-xref PDF. Object 8 is only
        // reachable by walking /Prev back to this revision.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"%PDF-1.4\n");
        let obj1_offset = bytes.len();
        bytes.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let obj8_offset = bytes.len();
        bytes.extend_from_slice(b"8 0 obj\n<< /Marker (A) >>\nendobj\n");
        let xref_a_offset = bytes.len();
        bytes.extend_from_slice(b"xref\n0 9\n");
        bytes.extend_from_slice(b"0000000000 65535 f \n");
        bytes.extend_from_slice(format!("{obj1_offset:010} 00000 n \n").as_bytes());
        for _ in 2..8 {
            bytes.extend_from_slice(b"0000000000 00000 f \n");
        }
        bytes.extend_from_slice(format!("{obj8_offset:010} 00000 n \n").as_bytes());
        bytes.extend_from_slice(
            format!("trailer\n<< /Size 9 /Root 1 0 R >>\nstartxref\n{xref_a_offset}\n%%EOF")
                .as_bytes(),
        );

        // Revision B: appended incremental update. Object 9 is described only by a
        // companion /XRefStm, never by the classical table.
        let obj9_offset = bytes.len();
        bytes.extend_from_slice(b"9 0 obj\n<< /Marker (B) >>\nendobj\n");

        let mut entries = Vec::new();
        entries.push(1u8);
        entries.extend_from_slice(&(obj9_offset as u32).to_be_bytes());
        entries.extend_from_slice(&0u16.to_be_bytes());
        let compressed = deflate(&entries);
        let xrefstm_offset = bytes.len();
        bytes.extend_from_slice(
            format!(
                "20 0 obj\n<< /Type /XRef /W [1 4 2] /Index [9 1] /Size 21 /Filter /FlateDecode /Length {} >>\nstream\n",
                compressed.len()
            )
            .as_bytes(),
        );
        bytes.extend_from_slice(&compressed);
        bytes.extend_from_slice(b"\nendstream\nendobj\n");

        let xref_b_offset = bytes.len();
        bytes.extend_from_slice(b"xref\n0 1\n0000000000 65535 f \n");
        bytes.extend_from_slice(
            format!(
                "trailer\n<< /Size 9 /Root 1 0 R /Prev {xref_a_offset} /XRefStm {xrefstm_offset} >>\nstartxref\n{xref_b_offset}\n%%EOF"
            )
            .as_bytes(),
        );

        let table = XRefTable::build(&bytes).unwrap();
        assert_eq!(
            table.get(8),
            Some(XRefEntry::Uncompressed { offset: obj8_offset as u64, gen: 0 }),
            "/Prev chain must still be walked when /XRefStm is also present"
        );
        assert_eq!(
            table.get(9),
            Some(XRefEntry::Uncompressed { offset: obj9_offset as u64, gen: 0 }),
            "/XRefStm entries must be merged in"
        );
    }
}
