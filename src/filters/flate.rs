//! FlateDecode plus the TIFF/PNG predictor post-processing step (C4).

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::errors::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct PredictorParams {
    pub predictor: i64,
    pub colors: i64,
    pub bits_per_component: i64,
    pub columns: i64,
}

impl Default for PredictorParams {
    fn default() -> Self {
        PredictorParams {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

pub fn flate_decode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Filter(format!("FlateDecode: {e}")))?;
    if params.predictor > 1 {
        apply_predictor(&out, params)
    } else {
        Ok(out)
    }
}

fn apply_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let colors = params.colors.max(1) as usize;
    let bpc = params.bits_per_component.max(1) as usize;
    let columns = params.columns.max(1) as usize;

    if params.predictor == 2 {
        return apply_tiff_predictor(data, colors, bpc, columns);
    }
    if (10..=15).contains(&params.predictor) {
        return apply_png_predictor(data, colors, bpc, columns);
    }
    Err(Error::Filter(format!(
        "unsupported /Predictor value {}",
        params.predictor
    )))
}

fn apply_tiff_predictor(data: &[u8], colors: usize, bpc: usize, columns: usize) -> Result<Vec<u8>> {
    if bpc != 8 {
        return Err(Error::Filter(format!(
            "TIFF predictor: /BitsPerComponent {bpc} is not supported, only 8"
        )));
    }
    let row_bytes = columns * colors;
    if row_bytes == 0 || data.len() % row_bytes != 0 {
        return Err(Error::Filter(format!(
            "TIFF predictor: input length {} is not a multiple of row width {}",
            data.len(),
            row_bytes
        )));
    }
    let mut out = data.to_vec();
    for row in out.chunks_mut(row_bytes) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    Ok(out)
}

fn apply_png_predictor(data: &[u8], colors: usize, bpc: usize, columns: usize) -> Result<Vec<u8>> {
    let bpp = ((colors * bpc + 7) / 8).max(1);
    let row_bytes = (columns * colors * bpc + 7) / 8;
    let stride = row_bytes + 1;
    if stride == 0 || data.len() % stride != 0 {
        return Err(Error::Filter(format!(
            "PNG predictor: input length {} is not a multiple of row stride {}",
            data.len(),
            stride
        )));
    }
    let rows = data.len() / stride;
    let mut out = Vec::with_capacity(rows * row_bytes);
    let mut prev_row = vec![0u8; row_bytes];
    for r in 0..rows {
        let row_start = r * stride;
        let filter_byte = data[row_start];
        let raw = &data[row_start + 1..row_start + stride];
        let mut cur = vec![0u8; row_bytes];
        for i in 0..row_bytes {
            let a = if i >= bpp { cur[i - bpp] } else { 0 };
            let b = prev_row[i];
            let c = if i >= bpp { prev_row[i - bpp] } else { 0 };
            let x = raw[i];
            cur[i] = match filter_byte {
                0 => x,
                1 => x.wrapping_add(a),
                2 => x.wrapping_add(b),
                3 => x.wrapping_add(((a as u16 + b as u16) / 2) as u8),
                4 => x.wrapping_add(paeth(a, b, c)),
                other => {
                    return Err(Error::Filter(format!(
                        "unknown PNG row filter byte {other}"
                    )))
                }
            };
        }
        out.extend_from_slice(&cur);
        prev_row = cur;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i32, b as i32, c as i32);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn round_trips_without_predictor() {
        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let compressed = deflate(&original);
        let decoded = flate_decode(&compressed, &PredictorParams::default()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn png_up_predictor_recovers_original_rows() {
        // two 3-byte rows, Colors=1 Columns=3 BitsPerComponent=8, filter "Up" (2)
        let row0 = [10u8, 20, 30];
        let row1 = [11u8, 21, 31]; // encoded as delta from row0 -> [1,1,1]
        let mut raw = Vec::new();
        raw.push(0u8); // None
        raw.extend_from_slice(&row0);
        raw.push(2u8); // Up
        raw.extend_from_slice(&[1, 1, 1]);
        let out = apply_png_predictor(&raw, 1, 8, 3).unwrap();
        assert_eq!(out, [row0.to_vec(), row1.to_vec()].concat());
    }

    #[test]
    fn tiff_predictor_accumulates_left_neighbor() {
        // Colors=1, Columns=3: row deltas [10, 5, 5] -> absolute [10, 15, 20]
        let raw = vec![10u8, 5, 5];
        let out = apply_tiff_predictor(&raw, 1, 8, 3).unwrap();
        assert_eq!(out, vec![10, 15, 20]);
    }

    #[test]
    fn tiff_predictor_rejects_non_8_bit_components() {
        let raw = vec![0u8; 3];
        let err = apply_tiff_predictor(&raw, 1, 4, 3).unwrap_err();
        assert!(matches!(err, Error::Filter(_)));
    }
}
