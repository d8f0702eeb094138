//! Filter pipeline: decodes chained stream filters on demand (C4).

mod ascii85;
mod ascii_hex;
mod ccitt;
mod flate;

use crate::errors::{Error, Result};
use crate::object::{Dictionary, Object, Stream};

/// Decodes a stream's payload by applying its `/Filter` chain (and matching
/// `/DecodeParms`) in order. Streams without a `/Filter` entry return their raw
/// bytes unchanged. Decoding only happens when this function is called — callers
/// control when the cost of decompression/decoding is paid.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let filters = filter_names(&stream.dict);
    let params = decode_params(&stream.dict, filters.len());

    let mut data = stream.data.clone();
    for (name, parms) in filters.iter().zip(params.iter()) {
        data = apply_one(name, &data, parms)?;
    }
    Ok(data)
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get("Filter") {
        Some(Object::Name(n)) => vec![n.as_str().to_string()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_params(dict: &Dictionary, count: usize) -> Vec<Option<Dictionary>> {
    match dict.get("DecodeParms").or_else(|| dict.get("DP")) {
        Some(Object::Dictionary(d)) => {
            let mut v = vec![None; count];
            if count > 0 {
                v[0] = Some(d.clone());
            }
            v
        }
        Some(Object::Array(items)) => {
            let mut v = Vec::with_capacity(count);
            for i in 0..count {
                v.push(items.get(i).and_then(|o| o.as_dict().cloned()));
            }
            v
        }
        _ => vec![None; count],
    }
}

fn apply_one(name: &str, data: &[u8], parms: &Option<Dictionary>) -> Result<Vec<u8>> {
    match name {
        "FlateDecode" | "Fl" => {
            let p = predictor_params(parms);
            flate::flate_decode(data, &p)
        }
        "ASCIIHexDecode" | "AHx" => ascii_hex::decode(data),
        "ASCII85Decode" | "A85" => ascii85::decode(data),
        "CCITTFaxDecode" | "CCF" => {
            let p = ccitt_params(parms);
            ccitt::decode(data, &p)
        }
        other => Err(Error::Filter(other.to_string())),
    }
}

fn predictor_params(parms: &Option<Dictionary>) -> flate::PredictorParams {
    let mut p = flate::PredictorParams::default();
    if let Some(d) = parms {
        if let Some(v) = d.get("Predictor").and_then(|o| o.as_i64()) {
            p.predictor = v;
        }
        if let Some(v) = d.get("Colors").and_then(|o| o.as_i64()) {
            p.colors = v;
        }
        if let Some(v) = d.get("BitsPerComponent").and_then(|o| o.as_i64()) {
            p.bits_per_component = v;
        }
        if let Some(v) = d.get("Columns").and_then(|o| o.as_i64()) {
            p.columns = v;
        }
    }
    p
}

fn ccitt_params(parms: &Option<Dictionary>) -> ccitt::CcittParams {
    let mut p = ccitt::CcittParams::default();
    if let Some(d) = parms {
        if let Some(v) = d.get("K").and_then(|o| o.as_i64()) {
            p.k = v;
        }
        if let Some(v) = d.get("Columns").and_then(|o| o.as_i64()) {
            p.columns = v;
        }
        if let Some(v) = d.get("Rows").and_then(|o| o.as_i64()) {
            p.rows = Some(v);
        }
        if let Some(Object::Boolean(b)) = d.get("BlackIs1") {
            p.black_is_1 = *b;
        }
    }
    p
}
