//! PDF object model: the eight primitive variants every other component builds on.

use std::collections::BTreeMap;
use std::fmt;

/// An opaque PDF name (the bytes after `/`, already `#XX`-unescaped).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(pub Vec<u8>);

impl Name {
    pub fn new<T: Into<Vec<u8>>>(bytes: T) -> Self {
        Name(bytes.into())
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == other.as_bytes()
    }
}

/// A pointer of the form `N G R` to the object numbered N generation G.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub num: u32,
    pub gen: u16,
}

impl ObjectId {
    pub fn new(num: u32, gen: u16) -> Self {
        ObjectId { num, gen }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} R", self.num, self.gen)
    }
}

/// A dictionary: Name keys, insertion order preserved for round-trip fidelity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    entries: Vec<(Name, Object)>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    pub fn insert(&mut self, key: Name, value: Object) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dictionary `/Type` name, if present.
    pub fn type_name(&self) -> Option<&str> {
        match self.get("Type") {
            Some(Object::Name(n)) => Some(n.as_str()),
            _ => None,
        }
    }
}

/// A stream: its dictionary plus the raw (possibly filtered) payload slice.
#[derive(Debug, Clone, PartialEq)]
pub struct Stream {
    pub dict: Dictionary,
    pub data: Vec<u8>,
}

impl Stream {
    pub fn new(dict: Dictionary, data: Vec<u8>) -> Self {
        Stream { dict, data }
    }
}

/// The closed, tagged union of PDF object variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    String(Vec<u8>),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    Stream(Stream),
    Reference(ObjectId),
}

impl Object {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            Object::Real(r) => Some(*r as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectId> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }
}

/// Compressed-CMap-style small map used for `/Differences` and width arrays;
/// a thin alias so call sites read as domain types rather than raw BTreeMaps.
pub type CodeMap = BTreeMap<u32, u32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionary_insert_overwrites_same_key() {
        let mut d = Dictionary::new();
        d.insert(Name::new("Type"), Object::Name(Name::new("Catalog")));
        d.insert(Name::new("Type"), Object::Name(Name::new("Pages")));
        assert_eq!(d.len(), 1);
        assert_eq!(d.type_name(), Some("Pages"));
    }

    #[test]
    fn name_hex_already_decoded_compares_as_plain_bytes() {
        let n = Name::new("Name With Spaces");
        assert_eq!(n, "Name With Spaces");
    }

    #[test]
    fn object_number_coercion() {
        assert_eq!(Object::Real(3.0).as_i64(), Some(3));
        assert_eq!(Object::Integer(5).as_f64(), Some(5.0));
    }
}
