// Chatstream Engine — SSE Frame Reassembly
//
// Converts a chunked, arbitrarily-fragmented byte transport into an ordered
// sequence of payload strings. Chunk boundaries carry no meaning: a frame
// delimiter, the `data: ` tag, or a multi-byte character may all be split
// across chunks and must reassemble losslessly.
//
// One `FrameReassembler` per in-flight request, never shared, discarded
// when the transport completes or the `[DONE]` sentinel is seen.

use crate::atoms::constants::{DATA_PREFIX, DONE_SENTINEL, FRAME_DELIMITER};

// ── Stateful UTF-8 decoding ────────────────────────────────────────────────

/// Incremental UTF-8 decoder carrying an incomplete multi-byte tail between
/// chunks. Malformed sequences decode to U+FFFD and are never an error —
/// decoding is tolerant by design.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    /// At most 3 bytes: the prefix of a character whose remainder has not
    /// arrived yet.
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, appending the resulting text to `out`.
    /// Bytes that form an incomplete trailing character are held back and
    /// prepended to the next chunk.
    pub fn push(&mut self, chunk: &[u8], out: &mut String) {
        self.pending.extend_from_slice(chunk);
        let mut input = std::mem::take(&mut self.pending);
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or_default());
                    match e.error_len() {
                        // Genuinely malformed bytes: replace and keep going.
                        Some(len) => {
                            out.push('\u{FFFD}');
                            rest = &rest[valid + len..];
                        }
                        // Incomplete trailing character: wait for more bytes.
                        None => {
                            rest = &rest[valid..];
                            break;
                        }
                    }
                }
            }
        }

        let keep = rest.len();
        let start = input.len() - keep;
        input.drain(..start);
        self.pending = input;
    }
}

// ── Frame reassembler ──────────────────────────────────────────────────────

/// Reassembles `data: `-tagged SSE frames out of a chunked byte stream.
///
/// Contract:
///   • `feed` returns every payload completed by the chunk, in order.
///   • Frames not starting with `data: ` are silently dropped.
///   • An empty payload (`data: \n\n`) is valid and emitted as `""`.
///   • The sentinel payload `[DONE]` halts emission permanently; later
///     `feed` calls are no-ops.
///   • A trailing frame with no delimiter is never emitted — if the
///     transport ends first, the fragment is discarded with the reassembler.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    decoder: Utf8Accumulator,
    /// Decoded text not yet consumed as complete frames. Invariant: holds
    /// at most one incomplete trailing frame; every complete frame found
    /// here has already been emitted and removed.
    buffer: String,
    done: bool,
}

impl FrameReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been observed. Natural stream
    /// end does NOT set this — it is reported separately by the transport
    /// loop.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one transport chunk, returning the payloads it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }

        self.decoder.push(chunk, &mut self.buffer);

        let mut payloads = Vec::new();
        while let Some(idx) = self.buffer.find(FRAME_DELIMITER) {
            let frame: String = self.buffer.drain(..idx + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..idx];

            let Some(payload) = frame.strip_prefix(DATA_PREFIX) else {
                // Unrecognized frame (comment, other field, noise) — drop.
                continue;
            };
            if payload == DONE_SENTINEL {
                self.done = true;
                break;
            }
            payloads.push(payload.to_string());
        }
        payloads
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(reasm: &mut FrameReassembler, chunks: &[&[u8]]) -> Vec<String> {
        let mut out = Vec::new();
        for c in chunks {
            out.extend(reasm.feed(c));
        }
        out
    }

    #[test]
    fn single_chunk_scenario() {
        let mut r = FrameReassembler::new();
        let payloads = r.feed(b"data: Hello\n\ndata: World\n\ndata: [DONE]\n\n");
        assert_eq!(payloads, vec!["Hello", "World"]);
        assert!(r.is_done());
    }

    #[test]
    fn split_mid_frame_and_mid_tag() {
        let mut r = FrameReassembler::new();
        let payloads = feed_all(&mut r, &[b"data: Hel", b"lo\n\nda", b"ta: [DONE]\n\n"]);
        assert_eq!(payloads, vec!["Hello"]);
        assert!(r.is_done());
    }

    #[test]
    fn split_inside_delimiter() {
        let mut r = FrameReassembler::new();
        assert!(r.feed(b"data: A\n").is_empty());
        assert_eq!(r.feed(b"\n"), vec!["A"]);
    }

    #[test]
    fn chunk_boundary_independence() {
        // Feeding T whole must equal feeding T split at every byte boundary.
        let text = "data: caf\u{e9}\n\nignored\n\ndata: \n\ndata: 日本\n\ndata: [DONE]\n\ndata: after\n\n";
        let bytes = text.as_bytes();

        let mut whole = FrameReassembler::new();
        let expected = whole.feed(bytes);

        let mut split = FrameReassembler::new();
        let mut got = Vec::new();
        for b in bytes {
            got.extend(split.feed(std::slice::from_ref(b)));
        }
        assert_eq!(got, expected);
        assert_eq!(split.is_done(), whole.is_done());
        assert!(split.is_done());
        assert_eq!(expected, vec!["caf\u{e9}", "", "日本"]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        // 'é' = 0xC3 0xA9, split between chunks
        let mut r = FrameReassembler::new();
        assert!(r.feed(b"data: caf\xC3").is_empty());
        assert_eq!(r.feed(b"\xA9\n\n"), vec!["café"]);
    }

    #[test]
    fn malformed_bytes_are_replaced_not_fatal() {
        let mut r = FrameReassembler::new();
        let payloads = r.feed(b"data: a\xFFb\n\n");
        assert_eq!(payloads, vec!["a\u{FFFD}b"]);
        assert!(!r.is_done());
    }

    #[test]
    fn unrecognized_frames_are_dropped() {
        let mut r = FrameReassembler::new();
        let payloads = r.feed(b": comment\n\nevent: ping\n\ndata: kept\n\n");
        assert_eq!(payloads, vec!["kept"]);
    }

    #[test]
    fn empty_payload_is_emitted() {
        let mut r = FrameReassembler::new();
        assert_eq!(r.feed(b"data: \n\n"), vec![""]);
    }

    #[test]
    fn no_partial_emission() {
        let mut r = FrameReassembler::new();
        assert!(r.feed(b"data: incomplete").is_empty());
        assert!(r.feed(b" still going").is_empty());
        assert!(!r.is_done());
    }

    #[test]
    fn sentinel_halts_emission() {
        let mut r = FrameReassembler::new();
        let payloads = r.feed(b"data: a\n\ndata: [DONE]\n\ndata: b\n\n");
        assert_eq!(payloads, vec!["a"]);
        assert!(r.is_done());
    }

    #[test]
    fn feed_after_done_is_noop() {
        let mut r = FrameReassembler::new();
        r.feed(b"data: [DONE]\n\n");
        assert!(r.is_done());
        assert!(r.feed(b"data: more\n\n").is_empty());
        assert!(r.feed(b"data: more\n\n").is_empty());
    }

    #[test]
    fn stream_end_without_sentinel_leaves_done_false() {
        let mut r = FrameReassembler::new();
        assert_eq!(r.feed(b"data: X\n\n"), vec!["X"]);
        // Transport end: nothing more is fed. The buffered nothing is
        // discarded with the reassembler; done stays false.
        assert!(!r.is_done());
    }

    #[test]
    fn trailing_fragment_is_never_emitted() {
        let mut r = FrameReassembler::new();
        let payloads = r.feed(b"data: full\n\ndata: dangling");
        assert_eq!(payloads, vec!["full"]);
        // Reassembler dropped here — "dangling" must not have surfaced.
    }

    #[test]
    fn sentinel_requires_exact_match() {
        let mut r = FrameReassembler::new();
        // "[DONE] " and "x[DONE]" are ordinary payloads, not sentinels.
        let payloads = r.feed(b"data: [DONE] \n\ndata: x[DONE]\n\n");
        assert_eq!(payloads, vec!["[DONE] ", "x[DONE]"]);
        assert!(!r.is_done());
    }

    #[test]
    fn utf8_accumulator_carries_four_byte_chars() {
        // U+1F600 = F0 9F 98 80, delivered one byte at a time
        let mut acc = Utf8Accumulator::new();
        let mut out = String::new();
        for b in "😀".as_bytes() {
            acc.push(std::slice::from_ref(b), &mut out);
        }
        assert_eq!(out, "😀");
    }
}
