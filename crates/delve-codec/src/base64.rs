//! Plain base64: 64-symbol alphabet, `=` padding, strict decoding.
//!
//! Hand-written because the log format predates any particular library
//! and the decode side must produce this crate's typed errors on every
//! malformed input instead of a generic failure.

use crate::error::CodecError;

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';

/// Exact encoded length for `n` input bytes: `4 * ceil(n / 3)`.
pub fn encoded_len(n: usize) -> usize {
    n.div_ceil(3) * 4
}

/// Encode bytes to base64 text.
///
/// # Examples
///
/// ```
/// use delve_codec::base64;
///
/// assert_eq!(base64::encode(b"delve"), "ZGVsdmU=");
/// assert_eq!(base64::decode("ZGVsdmU=").unwrap(), b"delve");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(bytes.len()));
    let mut chunks = bytes.chunks_exact(3);
    for chunk in &mut chunks {
        let n = (chunk[0] as u32) << 16 | (chunk[1] as u32) << 8 | chunk[2] as u32;
        out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
        out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
        out.push(ALPHABET[(n >> 6) as usize & 0x3f] as char);
        out.push(ALPHABET[n as usize & 0x3f] as char);
    }
    match chunks.remainder() {
        [a] => {
            let n = (*a as u32) << 16;
            out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
            out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
            out.push(PAD as char);
            out.push(PAD as char);
        }
        [a, b] => {
            let n = (*a as u32) << 16 | (*b as u32) << 8;
            out.push(ALPHABET[(n >> 18) as usize & 0x3f] as char);
            out.push(ALPHABET[(n >> 12) as usize & 0x3f] as char);
            out.push(ALPHABET[(n >> 6) as usize & 0x3f] as char);
            out.push(PAD as char);
        }
        _ => {}
    }
    out
}

fn symbol_value(byte: u8) -> Result<u32, CodecError> {
    match byte {
        b'A'..=b'Z' => Ok((byte - b'A') as u32),
        b'a'..=b'z' => Ok((byte - b'a') as u32 + 26),
        b'0'..=b'9' => Ok((byte - b'0') as u32 + 52),
        b'+' => Ok(62),
        b'/' => Ok(63),
        _ => Err(CodecError::BadSymbol { byte }),
    }
}

/// Decode base64 text to bytes.
///
/// Strict: the length must be a multiple of 4 and padding may appear
/// only as the final one or two symbols.
pub fn decode(text: &str) -> Result<Vec<u8>, CodecError> {
    let bytes = text.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(CodecError::BadLength { len: bytes.len() });
    }
    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for (qi, quad) in bytes.chunks_exact(4).enumerate() {
        let last = qi + 1 == bytes.len() / 4;
        let pads = quad.iter().rev().take_while(|&&b| b == PAD).count();
        if pads > 0 && !last {
            return Err(CodecError::BadPadding);
        }
        if pads > 2 || quad[..4 - pads].contains(&PAD) {
            return Err(CodecError::BadPadding);
        }
        let mut n = 0u32;
        for &b in &quad[..4 - pads] {
            n = n << 6 | symbol_value(b)?;
        }
        n <<= 6 * pads as u32;
        out.push((n >> 16) as u8);
        if pads < 2 {
            out.push((n >> 8) as u8);
        }
        if pads < 1 {
            out.push(n as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_vectors() {
        assert_eq!(encode(b""), "");
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foob"), "Zm9vYg==");
        assert_eq!(encode(b"fooba"), "Zm9vYmE=");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn bad_length_rejected() {
        assert!(matches!(
            decode("Zm9"),
            Err(CodecError::BadLength { len: 3 })
        ));
    }

    #[test]
    fn bad_symbol_rejected() {
        assert!(matches!(
            decode("Zm9!"),
            Err(CodecError::BadSymbol { byte: b'!' })
        ));
    }

    #[test]
    fn interior_padding_rejected() {
        assert!(matches!(decode("Zg==Zg=="), Err(CodecError::BadPadding)));
        assert!(matches!(decode("Z=g="), Err(CodecError::BadPadding)));
        assert!(matches!(decode("Z==="), Err(CodecError::BadPadding)));
    }

    proptest! {
        #[test]
        fn roundtrip(data in prop::collection::vec(any::<u8>(), 0..512)) {
            let text = encode(&data);
            prop_assert_eq!(text.len(), encoded_len(data.len()));
            prop_assert_eq!(decode(&text).unwrap(), data);
        }
    }
}
