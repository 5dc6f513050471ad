//! The compression pre-pass: deflate-then-base64 behind a `$<len>$` prefix.
//!
//! `encode_packed` compresses its input and keeps the compressed form
//! only when the whole encoded result (prefix included) comes out
//! smaller than plain base64 of the raw bytes. `decode_packed` branches
//! on the presence of the prefix, so either shape decodes regardless of
//! which policy the encoder used.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::base64;
use crate::error::CodecError;

/// Longest `$<len>$` prefix we ever emit: `usize::MAX` is 20 decimal
/// digits, plus the two delimiters.
const MAX_PREFIX: usize = 22;

/// Conservative upper bound on the encoded length of `n` input bytes.
///
/// Callers pre-size line buffers with this; `encode_packed` never
/// produces more. The bound is plain base64 (`4/3·n` rounded up to the
/// padding quantum) plus the fixed prefix overhead.
pub fn encoded_len_bound(n: usize) -> usize {
    base64::encoded_len(n) + MAX_PREFIX
}

fn deflate(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes).ok()?;
    enc.finish().ok()
}

/// Encode bytes, compressing first when that wins.
///
/// # Examples
///
/// ```
/// use delve_codec::pack;
///
/// // Repetitive input compresses, so the packed form carries a prefix.
/// let packed = pack::encode_packed(&[7u8; 4096]);
/// assert!(packed.starts_with("$4096$"));
/// assert_eq!(pack::decode_packed(&packed).unwrap(), vec![7u8; 4096]);
///
/// // Tiny input does not; the prefix is omitted.
/// let plain = pack::encode_packed(b"ab");
/// assert!(!plain.starts_with('$'));
/// ```
pub fn encode_packed(bytes: &[u8]) -> String {
    if let Some(compressed) = deflate(bytes) {
        let packed = format!("${}${}", bytes.len(), base64::encode(&compressed));
        if packed.len() < base64::encoded_len(bytes.len()) {
            return packed;
        }
    }
    base64::encode(bytes)
}

/// Decode text produced by [`encode_packed`] (or plain [`base64::encode`]).
pub fn decode_packed(text: &str) -> Result<Vec<u8>, CodecError> {
    let Some(rest) = text.strip_prefix('$') else {
        return base64::decode(text);
    };
    let (len_text, payload) = rest.split_once('$').ok_or(CodecError::BadSizePrefix {
        detail: "missing closing '$'".into(),
    })?;
    let expected: usize = len_text.parse().map_err(|_| CodecError::BadSizePrefix {
        detail: format!("'{len_text}' is not a length"),
    })?;
    let compressed = base64::decode(payload)?;

    let mut out = Vec::with_capacity(expected);
    // Read one byte past the promised size so oversized payloads are
    // detected without inflating them fully.
    let mut decoder = ZlibDecoder::new(compressed.as_slice()).take(expected as u64 + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CodecError::Inflate {
            detail: e.to_string(),
        })?;
    if out.len() != expected {
        return Err(CodecError::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn repetitive_input_takes_compressed_path() {
        let data = vec![b'x'; 10_000];
        let packed = encode_packed(&data);
        assert!(packed.starts_with("$10000$"));
        assert!(packed.len() < base64::encoded_len(data.len()));
        assert_eq!(decode_packed(&packed).unwrap(), data);
    }

    #[test]
    fn tiny_input_takes_plain_path() {
        let packed = encode_packed(b"hi");
        assert!(!packed.starts_with('$'));
        assert_eq!(decode_packed(&packed).unwrap(), b"hi");
    }

    #[test]
    fn empty_input() {
        let packed = encode_packed(b"");
        assert_eq!(packed, "");
        assert_eq!(decode_packed(&packed).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn bound_holds_on_both_paths() {
        for data in [vec![b'x'; 10_000], (0..=255u8).cycle().take(997).collect()] {
            assert!(encode_packed(&data).len() <= encoded_len_bound(data.len()));
        }
    }

    #[test]
    fn missing_closing_dollar_rejected() {
        assert!(matches!(
            decode_packed("$123"),
            Err(CodecError::BadSizePrefix { .. })
        ));
    }

    #[test]
    fn non_numeric_prefix_rejected() {
        assert!(matches!(
            decode_packed("$abc$Zg=="),
            Err(CodecError::BadSizePrefix { .. })
        ));
    }

    #[test]
    fn lying_size_prefix_rejected() {
        let data = vec![b'x'; 1000];
        let packed = encode_packed(&data);
        assert!(packed.starts_with("$1000$"));
        let lied = packed.replacen("$1000$", "$999$", 1);
        assert!(matches!(
            decode_packed(&lied),
            Err(CodecError::SizeMismatch { expected: 999, .. })
        ));
    }

    #[test]
    fn garbage_compressed_payload_rejected() {
        // Valid base64, but not a zlib stream.
        let text = format!("${}${}", 8, base64::encode(b"notzlib!"));
        assert!(matches!(
            decode_packed(&text),
            Err(CodecError::Inflate { .. })
        ));
    }

    proptest! {
        // High-entropy input: compression loses, plain path round-trips.
        #[test]
        fn roundtrip_random(data in prop::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(decode_packed(&encode_packed(&data)).unwrap(), data);
        }

        // Low-entropy input: compression wins, packed path round-trips.
        #[test]
        fn roundtrip_repetitive(byte in any::<u8>(), len in 0usize..8192) {
            let data = vec![byte; len];
            prop_assert_eq!(decode_packed(&encode_packed(&data)).unwrap(), data);
        }
    }
}
