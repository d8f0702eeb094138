//! ASCII85Decode (C4).

use crate::errors::{Error, Result};

pub fn decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() * 4 / 5);
    let mut group: Vec<u8> = Vec::with_capacity(5);

    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        if b == b'~' {
            break;
        }
        if b.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if b == b'z' {
            if !group.is_empty() {
                return Err(Error::Filter(
                    "ASCII85Decode: 'z' shorthand inside a group".into(),
                ));
            }
            out.extend_from_slice(&[0, 0, 0, 0]);
            i += 1;
            continue;
        }
        if !(b'!'..=b'u').contains(&b) {
            return Err(Error::Filter(format!(
                "ASCII85Decode: byte 0x{b:02x} out of range"
            )));
        }
        group.push(b - b'!');
        if group.len() == 5 {
            out.extend_from_slice(&decode_group(&group, 4));
            group.clear();
        }
        i += 1;
    }

    if !group.is_empty() {
        let n = group.len();
        if n == 1 {
            return Err(Error::Filter(
                "ASCII85Decode: final group has a single character".into(),
            ));
        }
        while group.len() < 5 {
            group.push(b'u' - b'!');
        }
        let decoded = decode_group(&group, n - 1);
        out.extend_from_slice(&decoded);
    }

    Ok(out)
}

fn decode_group(digits: &[u8], take: usize) -> Vec<u8> {
    let mut value: u32 = 0;
    for &d in digits {
        value = value.wrapping_mul(85).wrapping_add(d as u32);
    }
    let bytes = value.to_be_bytes();
    bytes[..take].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn z_shorthand_decodes_to_four_zero_bytes() {
        assert_eq!(decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn round_trips_man_example() {
        // "Man " encodes to the canonical ASCII85 example "9jqo^"
        let decoded = decode(b"9jqo^~>").unwrap();
        assert_eq!(decoded, b"Man ");
    }

    #[test]
    fn terminator_stops_decoding() {
        let decoded = decode(b"9jqo^~>garbage").unwrap();
        assert_eq!(decoded, b"Man ");
    }
}
