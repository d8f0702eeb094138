//! Page tree walk: inherited-attribute resolution and index-based page lookup (C7).

use crate::document::Reader;
use crate::errors::{Error, Result};
use crate::object::{Dictionary, Object};

/// A page's directly-owned dictionary plus attributes inherited from ancestor
/// `/Pages` nodes where the leaf itself didn't supply them.
#[derive(Debug, Clone)]
pub struct Page {
    pub dict: Dictionary,
    pub media_box: Option<[f64; 4]>,
    pub crop_box: Option<[f64; 4]>,
    pub resources: Option<Dictionary>,
    pub rotate: i64,
}

impl Page {
    /// The box content extraction should use: `/CropBox` if present, else `/MediaBox`.
    pub fn effective_box(&self) -> Option<[f64; 4]> {
        self.crop_box.or(self.media_box)
    }
}

#[derive(Default, Clone)]
struct Inherited {
    media_box: Option<[f64; 4]>,
    crop_box: Option<[f64; 4]>,
    resources: Option<Dictionary>,
    rotate: Option<i64>,
}

impl Inherited {
    fn overlay(&self, dict: &Dictionary, reader: &Reader) -> Result<Inherited> {
        let mut next = self.clone();
        if let Some(mb) = dict.get("MediaBox") {
            if let Some(b) = parse_rect(&reader.resolve_deep(mb)?) {
                next.media_box = Some(b);
            }
        }
        if let Some(cb) = dict.get("CropBox") {
            if let Some(b) = parse_rect(&reader.resolve_deep(cb)?) {
                next.crop_box = Some(b);
            }
        }
        if let Some(res) = dict.get("Resources") {
            if let Some(d) = reader.resolve(res)?.as_dict() {
                next.resources = Some(d.clone());
            }
        }
        if let Some(rot) = dict.get("Rotate").and_then(|o| o.as_i64()) {
            next.rotate = Some(rot);
        }
        Ok(next)
    }
}

fn parse_rect(obj: &Object) -> Option<[f64; 4]> {
    let arr = obj.as_array()?;
    if arr.len() != 4 {
        return None;
    }
    let mut out = [0.0; 4];
    for (i, v) in arr.iter().enumerate() {
        out[i] = v.as_f64()?;
    }
    Some(out)
}

/// Total number of leaf pages reachable from `root`, per the root `/Pages` node's
/// `/Count` (not re-derived by walking, per the spec's Count-acceleration design).
pub fn page_count(reader: &Reader, pages_root: &Dictionary) -> Result<usize> {
    pages_root
        .get("Count")
        .and_then(|o| o.as_i64())
        .map(|c| c.max(0) as usize)
        .ok_or_else(|| Error::PageTree("/Pages root missing /Count".into()))
}

/// Finds the page at 0-based `index` via a pre-order walk that skips whole subtrees
/// using their `/Count`, descending only into the subtree that contains `index`.
pub fn get_page(reader: &Reader, pages_root: &Dictionary, index: usize) -> Result<Page> {
    let total = page_count(reader, pages_root)?;
    if index >= total {
        return Err(Error::PageTree(format!(
            "page index {index} out of range (document has {total} pages)"
        )));
    }
    let mut visited = std::collections::HashSet::new();
    walk(reader, pages_root, index, Inherited::default(), &mut visited)
}

fn walk(
    reader: &Reader,
    node: &Dictionary,
    mut remaining: usize,
    inherited: Inherited,
    visited: &mut std::collections::HashSet<(u32, u16)>,
) -> Result<Page> {
    let inherited = inherited.overlay(node, reader)?;

    match node.type_name() {
        Some("Page") => {
            if remaining != 0 {
                return Err(Error::PageTree(
                    "page tree /Count accounting reached a leaf early".into(),
                ));
            }
            return Ok(Page {
                dict: node.clone(),
                media_box: inherited.media_box,
                crop_box: inherited.crop_box,
                resources: inherited.resources,
                rotate: inherited.rotate.unwrap_or(0),
            });
        }
        _ => {}
    }

    let kids = node
        .get("Kids")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::PageTree("/Pages node missing /Kids".into()))?;

    for kid_ref in kids {
        let id = kid_ref
            .as_reference()
            .ok_or_else(|| Error::PageTree("/Kids entry is not a reference".into()))?;
        if !visited.insert((id.num, id.gen)) {
            return Err(Error::PageTree(format!(
                "cycle detected at object {id} while walking page tree"
            )));
        }
        let kid_obj = reader.resolve(kid_ref)?;
        let kid_dict = kid_obj
            .as_dict()
            .ok_or_else(|| Error::PageTree("/Kids entry does not resolve to a dictionary".into()))?;

        if kid_dict.type_name() == Some("Page") {
            if remaining == 0 {
                return walk(reader, kid_dict, 0, inherited, visited);
            }
            remaining -= 1;
            continue;
        }

        let kid_count = kid_dict
            .get("Count")
            .and_then(|o| o.as_i64())
            .ok_or_else(|| Error::PageTree("/Pages node missing /Count".into()))?
            .max(0) as usize;
        if remaining < kid_count {
            return walk(reader, kid_dict, remaining, inherited, visited);
        }
        remaining -= kid_count;
    }

    Err(Error::PageTree(
        "page tree /Count accounting overran all kids without finding the target leaf".into(),
    ))
}
