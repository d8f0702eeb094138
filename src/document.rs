//! File-backed lazy object store: resolves references, caches objects and object
//! streams, decodes compressed entries (C6). Also owns header/version parsing and
//! the top-level `Reader` entry point.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::errors::{Error, Result};
use crate::object::{Dictionary, Object, Stream};
use crate::objstm::ObjectStream;
use crate::options::ReaderOptions;
use crate::parser::parse_indirect_object_at;
use crate::warning::Warning;
use crate::xref::{XRefEntry, XRefTable};

pub struct Reader {
    bytes: Vec<u8>,
    xref: XRefTable,
    version: (u8, u8),
    options: ReaderOptions,
    object_cache: RefCell<HashMap<u32, Object>>,
    objstm_cache: RefCell<HashMap<u32, ObjectStream>>,
    warnings: RefCell<Vec<Warning>>,
}

impl Reader {
    pub fn open(bytes: Vec<u8>) -> Result<Reader> {
        Reader::open_with_options(bytes, ReaderOptions::default())
    }

    pub fn open_with_options(bytes: Vec<u8>, options: ReaderOptions) -> Result<Reader> {
        let version = parse_header_version(&bytes)?;
        let xref = XRefTable::build(&bytes)?;
        Ok(Reader {
            bytes,
            xref,
            version,
            options,
            object_cache: RefCell::new(HashMap::new()),
            objstm_cache: RefCell::new(HashMap::new()),
            warnings: RefCell::new(Vec::new()),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.xref.trailer
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }

    pub fn push_warning(&self, w: Warning) {
        self.warnings.borrow_mut().push(w);
    }

    pub fn clear_cache(&self) {
        self.object_cache.borrow_mut().clear();
        self.objstm_cache.borrow_mut().clear();
    }

    /// Number of distinct object streams decoded and cached so far.
    pub fn objstm_cache_len(&self) -> usize {
        self.objstm_cache.borrow().len()
    }

    /// Root `/Catalog` dictionary, resolved via `/Root` in the trailer.
    pub fn root(&self) -> Result<Dictionary> {
        let root_ref = self
            .xref
            .trailer
            .get("Root")
            .ok_or_else(|| Error::XRef("trailer missing /Root".into()))?;
        let resolved = self.resolve(root_ref)?;
        resolved
            .as_dict()
            .cloned()
            .ok_or_else(|| Error::XRef("/Root does not resolve to a dictionary".into()))
    }

    /// Optional document-info dictionary (`/Info` in the trailer).
    pub fn info(&self) -> Option<Dictionary> {
        let info_ref = self.xref.trailer.get("Info")?;
        self.resolve(info_ref).ok()?.as_dict().cloned()
    }

    pub fn get_object(&self, num: u32) -> Result<Object> {
        if let Some(obj) = self.object_cache.borrow().get(&num) {
            return Ok(obj.clone());
        }
        let entry = self.xref.get(num).ok_or(Error::Reference(num))?;
        let obj = match entry {
            XRefEntry::Free { .. } => return Err(Error::NotInUse(num)),
            XRefEntry::Uncompressed { offset, .. } => {
                let (id, obj, warnings) = parse_indirect_object_at(&self.bytes, offset as usize)?;
                for w in warnings {
                    self.push_warning(w);
                }
                if id.num != num {
                    return Err(Error::Reference(num));
                }
                obj
            }
            XRefEntry::Compressed { stream_obj, index } => {
                let objstm = self.get_object_stream(stream_obj)?;
                let (found_num, obj) = objstm.extract(index as usize)?;
                if found_num != num {
                    return Err(Error::Reference(num));
                }
                obj
            }
        };
        self.cache_insert(num, obj.clone());
        Ok(obj)
    }

    fn get_object_stream(&self, stream_obj_num: u32) -> Result<ObjectStream> {
        if let Some(os) = self.objstm_cache.borrow().get(&stream_obj_num) {
            return Ok(os.clone());
        }
        let obj = self.get_object(stream_obj_num)?;
        let stream = obj
            .as_stream()
            .ok_or_else(|| Error::ObjectStream(format!("object {stream_obj_num} is not a stream")))?;
        let objstm = ObjectStream::parse(stream)?;
        self.objstm_cache
            .borrow_mut()
            .insert(stream_obj_num, objstm.clone());
        Ok(objstm)
    }

    fn cache_insert(&self, num: u32, obj: Object) {
        let mut cache = self.object_cache.borrow_mut();
        if let Some(budget) = self.options.object_cache_budget {
            if cache.len() >= budget {
                return;
            }
        }
        cache.insert(num, obj);
    }

    pub fn resolve(&self, obj: &Object) -> Result<Object> {
        match obj {
            Object::Reference(id) => self.get_object(id.num),
            other => Ok(other.clone()),
        }
    }

    pub fn resolve_deep(&self, obj: &Object) -> Result<Object> {
        self.resolve_deep_bounded(obj, 0)
    }

    fn resolve_deep_bounded(&self, obj: &Object, depth: usize) -> Result<Object> {
        if depth > self.options.max_resolve_depth {
            return Err(Error::Depth);
        }
        match obj {
            Object::Reference(id) => {
                let resolved = self.get_object(id.num)?;
                self.resolve_deep_bounded(&resolved, depth + 1)
            }
            Object::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_deep_bounded(item, depth + 1)?);
                }
                Ok(Object::Array(out))
            }
            Object::Dictionary(d) => {
                let mut nd = Dictionary::new();
                for (k, v) in d.iter() {
                    nd.insert(k.clone(), self.resolve_deep_bounded(v, depth + 1)?);
                }
                Ok(Object::Dictionary(nd))
            }
            Object::Stream(s) => {
                let mut nd = Dictionary::new();
                for (k, v) in s.dict.iter() {
                    nd.insert(k.clone(), self.resolve_deep_bounded(v, depth + 1)?);
                }
                Ok(Object::Stream(Stream::new(nd, s.data.clone())))
            }
            other => Ok(other.clone()),
        }
    }
}

fn parse_header_version(bytes: &[u8]) -> Result<(u8, u8)> {
    let scan_end = bytes.len().min(1024);
    let marker = b"%PDF-";
    let pos = bytes[..scan_end]
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or(Error::Header)?;
    let rest = &bytes[pos + marker.len()..];
    let end = rest
        .iter()
        .position(|&b| b == b'\n' || b == b'\r')
        .unwrap_or(rest.len())
        .min(3);
    let text = std::str::from_utf8(&rest[..end]).map_err(|_| Error::Header)?;
    let mut parts = text.splitn(2, '.');
    let major: u8 = parts.next().and_then(|s| s.parse().ok()).ok_or(Error::Header)?;
    let minor: u8 = parts.next().and_then(|s| s.parse().ok()).ok_or(Error::Header)?;
    Ok((major, minor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const S1: &[u8] = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\nxref\n0 3\n0000000000 65535 f \n0000000009 00000 n \n0000000058 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n110\n%%EOF";

    #[test]
    fn parses_version_from_header() {
        assert_eq!(parse_header_version(S1).unwrap(), (1, 4));
    }

    #[test]
    fn opens_and_resolves_catalog() {
        let reader = Reader::open(S1.to_vec()).unwrap();
        assert_eq!(reader.version(), (1, 4));
        let obj = reader.get_object(1).unwrap();
        assert_eq!(obj.as_dict().unwrap().type_name(), Some("Catalog"));
    }

    #[test]
    fn free_object_is_not_in_use_error() {
        let reader = Reader::open(S1.to_vec()).unwrap();
        assert!(matches!(reader.get_object(0), Err(Error::NotInUse(0))));
    }

    #[test]
    fn unknown_object_is_reference_error() {
        let reader = Reader::open(S1.to_vec()).unwrap();
        assert!(matches!(reader.get_object(99), Err(Error::Reference(99))));
    }

    #[test]
    fn resolve_deep_hydrates_references_inside_arrays() {
        let reader = Reader::open(S1.to_vec()).unwrap();
        let root = reader.get_object(1).unwrap();
        let deep = reader.resolve_deep(&root).unwrap();
        let pages = deep.as_dict().unwrap().get("Pages").unwrap();
        assert_eq!(pages.as_dict().unwrap().type_name(), Some("Pages"));
    }
}
