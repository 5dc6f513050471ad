//! The snapshot diff engine: SEEK/COPY/EDIT opcode streams.
//!
//! [`diff`] scans a new serialization of simulation state against the
//! previous one and emits a compact opcode stream; [`apply`] replays
//! the stream against the old buffer to reproduce the new one byte for
//! byte.
//!
//! # Opcode format
//!
//! Every opcode starts with a little-endian `u16`: a two-bit tag in the
//! high bits and a 14-bit length in the low bits.
//!
//! - `COPY(len)`: copy `len` bytes from the old buffer at the implicit
//!   read cursor, advancing it.
//! - `EDIT(len)`: the next `len` stream bytes are literals replacing
//!   `len` old bytes; the read cursor advances too.
//! - `SEEK`: a 4-byte little-endian absolute offset follows (the
//!   length field records the operand size, 4); the read cursor jumps
//!   there. Emitted only when an insertion or deletion shifts
//!   alignment.
//!
//! Runs longer than the 14-bit maximum split into consecutive opcodes.
//! Most state mutations between two commands touch a small, localized
//! region of the buffer, so COPY-dominated streams are the expected
//! case.

use crate::error::DiffError;

/// Longest run a single opcode can express.
pub const MAX_RUN: usize = (1 << 14) - 1;

const TAG_COPY: u16 = 0;
const TAG_EDIT: u16 = 1;
const TAG_SEEK: u16 = 2;

/// Matches shorter than this are folded into a surrounding EDIT run:
/// a COPY opcode costs two bytes, so tiny matches are not worth it.
const MIN_COPY: usize = 4;

/// Window compared when probing for re-alignment.
const PROBE_LEN: usize = 16;

/// How far either side of the cursor the re-alignment probe searches.
const PROBE_SPAN: usize = 4096;

/// Mismatch run length at which re-alignment probing starts.
const RESYNC_AFTER: usize = 32;

fn emit_op(out: &mut Vec<u8>, tag: u16, len: usize) {
    debug_assert!(len <= MAX_RUN);
    out.extend_from_slice(&(tag << 14 | len as u16).to_le_bytes());
}

fn emit_copy(out: &mut Vec<u8>, mut len: usize) {
    while len > MAX_RUN {
        emit_op(out, TAG_COPY, MAX_RUN);
        len -= MAX_RUN;
    }
    if len > 0 {
        emit_op(out, TAG_COPY, len);
    }
}

fn emit_edit(out: &mut Vec<u8>, literals: &[u8]) {
    for chunk in literals.chunks(MAX_RUN) {
        emit_op(out, TAG_EDIT, chunk.len());
        out.extend_from_slice(chunk);
    }
}

fn emit_seek(out: &mut Vec<u8>, offset: usize) {
    emit_op(out, TAG_SEEK, 4);
    out.extend_from_slice(&(offset as u32).to_le_bytes());
}

/// Length of the byte run where `old[op..]` and `new[np..]` agree.
fn run_len(old: &[u8], op: usize, new: &[u8], np: usize) -> usize {
    old.iter()
        .skip(op)
        .zip(new.iter().skip(np))
        .take_while(|(a, b)| a == b)
        .count()
}

/// Search near `op` for an old-buffer offset whose next [`PROBE_LEN`]
/// bytes match `new[np..]`. Returns the absolute offset on success.
fn probe(old: &[u8], op: usize, new: &[u8], np: usize) -> Option<usize> {
    if old.len() < PROBE_LEN || np + PROBE_LEN > new.len() {
        return None;
    }
    let window = &new[np..np + PROBE_LEN];
    let lo = op.saturating_sub(PROBE_SPAN);
    let hi = (op + PROBE_SPAN).min(old.len() - PROBE_LEN);
    (lo..=hi).find(|&q| q != op && &old[q..q + PROBE_LEN] == window)
}

/// Compute the opcode stream transforming `old` into `new`.
///
/// # Examples
///
/// ```
/// use delve_codec::{apply, diff};
///
/// let old = b"the dragon sleeps".to_vec();
/// let new = b"the dragon wakes!".to_vec();
/// let stream = diff(&old, &new);
/// assert_eq!(apply(&old, &stream).unwrap(), new);
/// ```
pub fn diff(old: &[u8], new: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut op = 0; // read cursor into old, aligned with np
    let mut np = 0; // scan position in new
    let mut lit_start = 0; // start of the pending EDIT run

    while np < new.len() {
        let m = run_len(old, op, new, np);
        let exact_tail = m > 0 && np + m == new.len() && op + m == old.len();
        if m >= MIN_COPY || exact_tail {
            emit_edit(&mut out, &new[lit_start..np]);
            emit_copy(&mut out, m);
            op += m;
            np += m;
            lit_start = np;
        } else if m > 0 {
            // Short match: cheaper as literals inside the edit run.
            op += m;
            np += m;
        } else {
            op += 1;
            np += 1;
            let mismatch = np - lit_start;
            if mismatch >= RESYNC_AFTER && mismatch % RESYNC_AFTER == 0 {
                if let Some(found) = probe(old, op, new, np) {
                    if run_len(old, found, new, np) >= MIN_COPY {
                        emit_edit(&mut out, &new[lit_start..np]);
                        emit_seek(&mut out, found);
                        op = found;
                        lit_start = np;
                    }
                }
            }
        }
    }
    emit_edit(&mut out, &new[lit_start..]);
    out
}

/// Apply an opcode stream to `old`, reproducing the new buffer.
///
/// Every opcode is validated: COPY and SEEK may not reach past the end
/// of `old`, and the stream may not end inside an opcode or operand.
pub fn apply(old: &[u8], stream: &[u8]) -> Result<Vec<u8>, DiffError> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    let mut pos = 0usize;

    while pos < stream.len() {
        if pos + 2 > stream.len() {
            return Err(DiffError::Truncated {
                detail: "stream ends inside an opcode header".into(),
            });
        }
        let word = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
        pos += 2;
        let len = (word & MAX_RUN as u16) as usize;
        match word >> 14 {
            TAG_COPY => {
                if cursor + len > old.len() {
                    return Err(DiffError::CopyOutOfRange {
                        cursor,
                        len,
                        old_len: old.len(),
                    });
                }
                out.extend_from_slice(&old[cursor..cursor + len]);
                cursor += len;
            }
            TAG_EDIT => {
                if pos + len > stream.len() {
                    return Err(DiffError::Truncated {
                        detail: format!("EDIT promises {len} literal bytes"),
                    });
                }
                out.extend_from_slice(&stream[pos..pos + len]);
                pos += len;
                // An EDIT replaces old bytes; the cursor may run past the
                // end of a shorter old buffer, which only a later COPY
                // would turn into an error.
                cursor = cursor.saturating_add(len);
            }
            TAG_SEEK => {
                if len != 4 {
                    return Err(DiffError::BadSeekOperand { len });
                }
                if pos + 4 > stream.len() {
                    return Err(DiffError::Truncated {
                        detail: "SEEK missing its offset operand".into(),
                    });
                }
                let offset = u32::from_le_bytes([
                    stream[pos],
                    stream[pos + 1],
                    stream[pos + 2],
                    stream[pos + 3],
                ]) as usize;
                pos += 4;
                if offset > old.len() {
                    return Err(DiffError::SeekOutOfRange {
                        offset,
                        old_len: old.len(),
                    });
                }
                cursor = offset;
            }
            _ => return Err(DiffError::UnknownOpcode),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tags_of(stream: &[u8]) -> Vec<u16> {
        let mut tags = Vec::new();
        let mut pos = 0;
        while pos < stream.len() {
            let word = u16::from_le_bytes([stream[pos], stream[pos + 1]]);
            pos += 2;
            let len = (word & MAX_RUN as u16) as usize;
            let tag = word >> 14;
            tags.push(tag);
            match tag {
                TAG_EDIT => pos += len,
                TAG_SEEK => pos += 4,
                _ => {}
            }
        }
        tags
    }

    #[test]
    fn identical_buffers_are_copy_only() {
        let data = b"unchanged state".to_vec();
        let stream = diff(&data, &data);
        assert_eq!(tags_of(&stream), vec![TAG_COPY]);
        assert_eq!(apply(&data, &stream).unwrap(), data);
    }

    #[test]
    fn identical_short_buffers_are_copy_only() {
        // Shorter than MIN_COPY: the exact-tail rule must still yield COPY.
        let data = b"ab".to_vec();
        let stream = diff(&data, &data);
        assert_eq!(tags_of(&stream), vec![TAG_COPY]);
    }

    #[test]
    fn empty_old_degenerates_to_edit() {
        let new = b"fresh game state".to_vec();
        let stream = diff(&[], &new);
        assert_eq!(tags_of(&stream), vec![TAG_EDIT]);
        assert_eq!(apply(&[], &stream).unwrap(), new);
    }

    #[test]
    fn empty_both_is_empty_stream() {
        assert!(diff(&[], &[]).is_empty());
        assert_eq!(apply(&[], &[]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn localized_change_is_mostly_copy() {
        let mut old = vec![0u8; 4000];
        for (i, b) in old.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut new = old.clone();
        new[2000] ^= 0xff; // one monster's hit points change
        let stream = diff(&old, &new);
        assert!(
            stream.len() < 64,
            "one-byte change produced a {}-byte stream",
            stream.len()
        );
        assert_eq!(apply(&old, &stream).unwrap(), new);
    }

    #[test]
    fn insertion_resynchronizes_with_seek() {
        let old: Vec<u8> = (0..200u8).cycle().take(2000).collect();
        let mut new = old.clone();
        // Insert a run near the front, shifting everything after it.
        new.splice(100..100, std::iter::repeat_n(0xee, 7));
        let stream = diff(&old, &new);
        assert!(
            tags_of(&stream).contains(&TAG_SEEK),
            "insertion should trigger re-alignment"
        );
        assert_eq!(apply(&old, &stream).unwrap(), new);
    }

    #[test]
    fn deletion_resynchronizes() {
        let old: Vec<u8> = (0..200u8).cycle().take(2000).collect();
        let mut new = old.clone();
        new.drain(300..311);
        let stream = diff(&old, &new);
        assert_eq!(apply(&old, &stream).unwrap(), new);
    }

    #[test]
    fn copy_past_old_end_rejected() {
        let mut stream = Vec::new();
        emit_copy(&mut stream, 10);
        assert!(matches!(
            apply(b"short", &stream),
            Err(DiffError::CopyOutOfRange {
                cursor: 0,
                len: 10,
                old_len: 5
            })
        ));
    }

    #[test]
    fn seek_past_old_end_rejected() {
        let mut stream = Vec::new();
        emit_seek(&mut stream, 100);
        assert!(matches!(
            apply(b"short", &stream),
            Err(DiffError::SeekOutOfRange {
                offset: 100,
                old_len: 5
            })
        ));
    }

    #[test]
    fn truncated_stream_rejected() {
        let mut stream = Vec::new();
        emit_edit(&mut stream, b"literal");
        stream.truncate(stream.len() - 3);
        assert!(matches!(
            apply(b"", &stream),
            Err(DiffError::Truncated { .. })
        ));
        // A lone header byte is also truncation.
        assert!(matches!(
            apply(b"", &[0x01]),
            Err(DiffError::Truncated { .. })
        ));
    }

    #[test]
    fn reserved_tag_rejected() {
        let word = (3u16 << 14).to_le_bytes();
        assert!(matches!(
            apply(b"", &word),
            Err(DiffError::UnknownOpcode)
        ));
    }

    #[test]
    fn runs_longer_than_max_split() {
        let old = vec![9u8; MAX_RUN * 2 + 10];
        let stream = diff(&old, &old);
        assert_eq!(tags_of(&stream), vec![TAG_COPY, TAG_COPY, TAG_COPY]);
        assert_eq!(apply(&old, &stream).unwrap(), old);
    }

    proptest! {
        #[test]
        fn roundtrip(
            old in prop::collection::vec(any::<u8>(), 0..1024),
            new in prop::collection::vec(any::<u8>(), 0..1024),
        ) {
            let stream = diff(&old, &new);
            prop_assert_eq!(apply(&old, &stream).unwrap(), new);
        }

        #[test]
        fn roundtrip_mutated(
            base in prop::collection::vec(any::<u8>(), 64..2048),
            edits in prop::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..16),
        ) {
            // The realistic case: new is old with a few localized edits.
            let mut new = base.clone();
            for (idx, byte) in &edits {
                let i = idx.index(new.len());
                new[i] = *byte;
            }
            let stream = diff(&base, &new);
            prop_assert_eq!(apply(&base, &stream).unwrap(), new);
        }

        #[test]
        fn noop_diff_is_copy_only(data in prop::collection::vec(any::<u8>(), 1..4096)) {
            let stream = diff(&data, &data);
            prop_assert!(tags_of(&stream).iter().all(|&t| t == TAG_COPY));
            prop_assert_eq!(apply(&data, &stream).unwrap(), data);
        }
    }
}
