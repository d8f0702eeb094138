//! Object stream decoding: objects packed and Flate-compressed inside another
//! object (compressed XRef entries, PDF 1.5+) (C6).

use crate::errors::{Error, Result};
use crate::filters::decode_stream;
use crate::object::{Object, Stream};
use crate::parser::Parser;

#[derive(Clone)]
pub struct ObjectStream {
    /// Decoded payload; object bodies start at `first`.
    data: Vec<u8>,
    /// (object number, offset-from-`first`) in header order.
    index: Vec<(u32, usize)>,
    first: usize,
}

impl ObjectStream {
    pub fn parse(stream: &Stream) -> Result<ObjectStream> {
        if stream.dict.type_name() != Some("ObjStm") {
            return Err(Error::ObjectStream("stream dictionary missing /Type /ObjStm".into()));
        }
        let n = stream
            .dict
            .get("N")
            .and_then(|o| o.as_i64())
            .ok_or_else(|| Error::ObjectStream("/ObjStm missing /N".into()))? as usize;
        let first = stream
            .dict
            .get("First")
            .and_then(|o| o.as_i64())
            .ok_or_else(|| Error::ObjectStream("/ObjStm missing /First".into()))? as usize;

        let data = decode_stream(stream)?;
        let header = &data[..first.min(data.len())];
        let mut lexer_pos = 0usize;
        let mut index = Vec::with_capacity(n);
        for _ in 0..n {
            let (num, next) = read_uint(header, lexer_pos)?;
            let (off, next2) = read_uint(header, next)?;
            index.push((num as u32, off as usize));
            lexer_pos = next2;
        }

        Ok(ObjectStream { data, index, first })
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Extracts the object at `index` (0-based), verifying it is the expected object
    /// number. Contained objects are never Streams or indirect references to their own
    /// header (generation is implicitly 0).
    pub fn extract(&self, index: usize) -> Result<(u32, Object)> {
        let (num, offset) = *self
            .index
            .get(index)
            .ok_or_else(|| Error::ObjectStream(format!("index {index} out of range")))?;
        let start = self.first + offset;
        let mut parser = Parser::at(&self.data, start);
        let obj = parser.parse_object()?;
        if matches!(obj, Object::Stream(_)) {
            return Err(Error::ObjectStream(
                "object stream entries cannot themselves be streams".into(),
            ));
        }
        Ok((num, obj))
    }

    pub fn find(&self, obj_num: u32) -> Option<usize> {
        self.index.iter().position(|(n, _)| *n == obj_num)
    }
}

fn read_uint(bytes: &[u8], mut pos: usize) -> Result<(u64, usize)> {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    let start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos == start {
        return Err(Error::ObjectStream(
            "expected an integer in object stream header".into(),
        ));
    }
    let v = std::str::from_utf8(&bytes[start..pos])
        .unwrap()
        .parse()
        .map_err(|_| Error::ObjectStream("malformed object stream header integer".into()))?;
    Ok((v, pos))
}
