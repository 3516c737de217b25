//! Text encodings for moving envelopes through text protocols
//!
//! Two forms are supported:
//! - standard base64 (with padding), safe for JSON and quoted shell arguments
//! - the same base64 string percent-encoded, safe as a URL query parameter
//!
//! Nothing here is cryptographic; a decoded transport string is just the raw
//! envelope bytes.

use base64::{Engine, engine::general_purpose::STANDARD};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

use crate::error::{ErrorCategory, ErrorKind, Result, TokensealError};

/// Characters escaped when placing a transport string in a URL component.
///
/// Everything except `A-Z a-z 0-9 - _ . ! ~ * ' ( )`, matching what web
/// clients produce for a URI component.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Encode an envelope as standard base64.
pub fn to_transport(envelope: &[u8]) -> String {
    STANDARD.encode(envelope)
}

/// Encode an envelope as base64, then percent-encode it for use in a URL.
pub fn to_url_transport(envelope: &[u8]) -> String {
    utf8_percent_encode(&to_transport(envelope), URI_COMPONENT).to_string()
}

/// Decode a base64 transport string back into envelope bytes.
///
/// Leading and trailing ASCII whitespace (e.g. a newline from a pasted value)
/// is ignored. Any other character outside the base64 alphabet is rejected.
pub fn from_transport(encoded: &str) -> Result<Vec<u8>> {
    STANDARD.decode(encoded.trim_ascii()).map_err(|e| {
        TokensealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::TransportDecode,
            format!("base64 decoding failed: {}", e),
            e,
        )
    })
}

/// Decode a percent-encoded base64 transport string back into envelope bytes.
pub fn from_url_transport(encoded: &str) -> Result<Vec<u8>> {
    check_percent_escapes(encoded)?;
    let unescaped = percent_decode_str(encoded).decode_utf8().map_err(|e| {
        TokensealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::TransportDecode,
            "percent-decoded input is not valid UTF-8",
            e,
        )
    })?;
    from_transport(&unescaped)
}

/// `percent_decode_str` passes malformed escapes through untouched; reject them instead.
fn check_percent_escapes(encoded: &str) -> Result<()> {
    let bytes = encoded.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !matches!(escape, Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit())
            {
                return Err(TokensealError::user(
                    ErrorKind::TransportDecode,
                    format!("malformed percent-escape at offset {}", i),
                ));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_bytes() {
        assert_eq!(to_transport(b""), "");
        assert_eq!(from_transport("").unwrap(), b"");
        assert_eq!(from_url_transport("").unwrap(), b"");
    }

    #[test]
    fn test_all_byte_values() {
        let bytes: Vec<u8> = (0..=255).collect();
        assert_eq!(from_transport(&to_transport(&bytes)).unwrap(), bytes);
        assert_eq!(
            from_url_transport(&to_url_transport(&bytes)).unwrap(),
            bytes
        );
    }

    #[test]
    fn test_standard_alphabet_with_padding() {
        // 0xfb 0xff 0xbf encodes to the two non-alphanumeric base64 symbols.
        let bytes = [0xfb, 0xff, 0xbf, 0xfb, 0xff, 0xbf, 0xfb, 0xff, 0xbf];
        assert_eq!(to_transport(&bytes), "+/+/+/+/+/+/");
        assert_eq!(to_transport(b"ab"), "YWI=");
    }

    #[test]
    fn test_url_transport_escapes_reserved_characters() {
        let bytes = [0xfb, 0xff, 0xbf, 0x61, 0x62];
        assert_eq!(to_transport(&bytes), "+/+/YWI=");

        let url = to_url_transport(&bytes);
        assert_eq!(url, "%2B%2F%2B%2FYWI%3D");
        assert!(!url.contains('+'));
        assert!(!url.contains('/'));
        assert!(!url.contains('='));
        assert_eq!(from_url_transport(&url).unwrap(), bytes);
    }

    #[test]
    fn test_url_transport_accepts_lowercase_escapes() {
        assert_eq!(
            from_url_transport("%2b%2f%2b%2fYWI%3d").unwrap(),
            [0xfbu8, 0xff, 0xbf, 0x61, 0x62]
        );
    }

    #[test]
    fn test_url_transport_accepts_unescaped_base64() {
        assert_eq!(from_url_transport("YWI=").unwrap(), b"ab");
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(from_transport("  YWI=\n").unwrap(), b"ab");
        assert_eq!(from_transport("\tYWI=\r\n").unwrap(), b"ab");
    }

    #[test]
    fn test_surrounding_unicode_whitespace_rejected() {
        for input in ["\u{3000}YWI=", "YWI=\u{2003}", "\u{a0}YWI=\u{a0}"] {
            let err = from_transport(input).expect_err("expected base64 decode error");
            assert_eq!(err.kind, Some(ErrorKind::TransportDecode));
        }
    }

    #[test]
    fn test_bad_base64() {
        let err = from_transport("bad$$").expect_err("expected base64 decode error");
        assert_eq!(err.kind, Some(ErrorKind::TransportDecode));
        assert_eq!(err.category, ErrorCategory::User);

        // URL-safe alphabet is not the transport alphabet.
        let err = from_transport("-_-_").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TransportDecode));
    }

    #[test]
    fn test_bad_percent_escapes() {
        for input in ["YWI%3", "%", "YWI%zz", "%G0YWI="] {
            let err = from_url_transport(input).expect_err("expected percent decode error");
            assert_eq!(
                err.kind,
                Some(ErrorKind::TransportDecode),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn test_percent_escape_to_invalid_utf8() {
        let err = from_url_transport("%FF%FE").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TransportDecode));
    }

    #[test]
    fn test_url_decoded_bad_base64() {
        let err = from_url_transport("%24%24").unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TransportDecode));
    }
}
