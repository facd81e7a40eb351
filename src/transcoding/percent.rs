//! Percent-encoding of path variable values.
//!
//! Single-segment variables encode every byte outside `[-_.~0-9a-zA-Z]` and
//! decode every escape. Multi-segment variables also leave `/` unencoded, and
//! decoding keeps `%2F`/`%2f` as-is so an encoded slash stays distinguishable
//! from a real separator.

use crate::transcoding::error::{TranscodeError, TranscodeResult};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// How reserved escapes are treated while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Decode every escape.
    Full,
    /// Decode every escape except `%2F` and `%2f`.
    KeepEncodedSlash,
}

impl DecodeMode {
    /// Mode mandated for a variable of the given kind.
    pub fn for_variable(multi_segment: bool) -> Self {
        if multi_segment {
            DecodeMode::KeepEncodedSlash
        } else {
            DecodeMode::Full
        }
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

/// Encode a value for expansion into a URL path.
pub fn encode_segment(value: &str, multi_segment: bool) -> String {
    let mut out = String::with_capacity(value.len());
    for &b in value.as_bytes() {
        if is_unreserved(b) || (multi_segment && b == b'/') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
    out
}

/// Decode a captured path value according to its variable kind.
pub fn decode_segment(text: &str, multi_segment: bool) -> TranscodeResult<String> {
    decode_segment_with(text, DecodeMode::for_variable(multi_segment))
}

/// Decode with an explicit mode.
///
/// A `%` not followed by two hex digits is copied through unchanged.
pub fn decode_segment_with(text: &str, mode: DecodeMode) -> TranscodeResult<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                let decoded = (hi << 4) | lo;
                if decoded == b'/' && mode == DecodeMode::KeepEncodedSlash {
                    out.extend_from_slice(&bytes[i..i + 3]);
                } else {
                    out.push(decoded);
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).map_err(|_| TranscodeError::InvalidPercentEncoding(text.to_string()))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_encoding() {
        assert_eq!(encode_segment("abc-_.~09", false), "abc-_.~09");
        assert_eq!(encode_segment("a/b c", false), "a%2Fb%20c");
        assert_eq!(encode_segment("ü", false), "%C3%BC");
    }

    #[test]
    fn test_multi_segment_encoding_keeps_slash() {
        assert_eq!(encode_segment("shelves/1/books?x", true), "shelves/1/books%3Fx");
    }

    #[test]
    fn test_single_segment_round_trip() {
        for value in ["", "plain", "a/b", "100% sure", "日本語", "%2F", "?#[]@!$&'()*+,;="] {
            let encoded = encode_segment(value, false);
            assert_eq!(decode_segment(&encoded, false).unwrap(), value);
        }
    }

    #[test]
    fn test_multi_segment_keeps_encoded_slash() {
        assert_eq!(decode_segment("a%2Fb", true).unwrap(), "a%2Fb");
        assert_eq!(decode_segment("a%2fb", true).unwrap(), "a%2fb");
        assert_eq!(decode_segment("a%20b/c", true).unwrap(), "a b/c");
    }

    #[test]
    fn test_single_segment_decodes_slash() {
        assert_eq!(decode_segment("a%2Fb", false).unwrap(), "a/b");
        assert_eq!(decode_segment_with("a%2Fb", DecodeMode::Full).unwrap(), "a/b");
    }

    #[test]
    fn test_malformed_escapes_pass_through() {
        assert_eq!(decode_segment("100%", false).unwrap(), "100%");
        assert_eq!(decode_segment("%zz", false).unwrap(), "%zz");
        assert_eq!(decode_segment("%4", false).unwrap(), "%4");
    }

    #[test]
    fn test_invalid_utf8_is_an_error() {
        let err = decode_segment("%FF", false).unwrap_err();
        assert!(matches!(err, TranscodeError::InvalidPercentEncoding(_)));
    }
}
