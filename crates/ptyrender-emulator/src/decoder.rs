//! Incremental UTF-8 decoding with a single-byte fallback.

/// Longest UTF-8 sequence, in bytes.
const MAX_SEQUENCE: usize = 4;

/// Stateful UTF-8 normalizer for a byte stream delivered in arbitrary chunks.
///
/// Valid UTF-8 passes through unchanged. A multi-byte sequence split across
/// chunks is held back until its remaining bytes arrive. Every byte that
/// cannot start or continue a valid sequence is re-encoded as the Latin-1
/// code point of the same value, so the output is always valid UTF-8.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create a decoder with no carried-over bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes held back waiting for the rest of a sequence.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decode one chunk, returning valid UTF-8 bytes.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);

        let mut out = Vec::with_capacity(input.len());
        let mut rest = input.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.extend_from_slice(valid.as_bytes());
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.extend_from_slice(valid);

                    match err.error_len() {
                        Some(len) => {
                            for &byte in &after[..len] {
                                push_latin1(&mut out, byte);
                            }
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of input
                            if after.len() < MAX_SEQUENCE {
                                self.pending.extend_from_slice(after);
                            } else {
                                for &byte in after {
                                    push_latin1(&mut out, byte);
                                }
                            }
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush any held-back bytes using the single-byte fallback.
    pub fn finish(&mut self) -> Vec<u8> {
        let mut out = Vec::new();
        for byte in std::mem::take(&mut self.pending) {
            push_latin1(&mut out, byte);
        }
        out
    }
}

fn push_latin1(out: &mut Vec<u8>, byte: u8) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(char::from(byte).encode_utf8(&mut buf).as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"hello\r\n"), b"hello\r\n");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_split_multibyte() {
        let bytes = "é中".as_bytes();
        let mut decoder = Utf8Decoder::new();

        let mut out = decoder.decode(&bytes[..1]);
        assert!(out.is_empty());
        assert_eq!(decoder.pending_len(), 1);

        out.extend(decoder.decode(&bytes[1..3]));
        out.extend(decoder.decode(&bytes[3..]));
        assert_eq!(String::from_utf8(out).unwrap(), "é中");
    }

    #[test]
    fn test_invalid_byte_uses_latin1() {
        let mut decoder = Utf8Decoder::new();
        let out = decoder.decode(b"a\xffb\xe9");
        // 0xE9 could start a sequence; held back until more input arrives
        assert_eq!(String::from_utf8(out).unwrap(), "a\u{ff}b");

        let out = decoder.decode(b"c");
        assert_eq!(String::from_utf8(out).unwrap(), "\u{e9}c");
    }

    #[test]
    fn test_finish_flushes_pending() {
        let mut decoder = Utf8Decoder::new();
        assert!(decoder.decode(b"\xe4\xb8").is_empty());
        let out = decoder.finish();
        assert_eq!(String::from_utf8(out).unwrap(), "\u{e4}\u{b8}");
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_escape_sequences_untouched() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"\x1b[31mX\x1b[0m"), b"\x1b[31mX\x1b[0m");
    }
}
