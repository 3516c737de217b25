//! Token encryption/decryption operations
//!
//! This module ties the envelope and transport layers together into the two
//! operations exposed on the command line: sealing a text into a token, and
//! opening a token back into text.

use serde::Serialize;

use crate::envelope;
use crate::error::{ErrorKind, Result, TokensealError};
use crate::passphrase::PassphraseReader;
use crate::transport;

/// Every representation of a freshly sealed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SealedToken {
    /// Raw envelope bytes as lowercase hex.
    pub envelope_hex: String,
    /// Standard base64 transport string.
    pub base64: String,
    /// Base64 transport string, percent-encoded for URLs.
    pub url_encoded: String,
}

impl SealedToken {
    fn from_envelope(envelope: &[u8]) -> Self {
        Self {
            envelope_hex: hex::encode(envelope),
            base64: transport::to_transport(envelope),
            url_encoded: transport::to_url_transport(envelope),
        }
    }
}

/// Encrypt `plaintext` with a passphrase from `passphrase_reader`.
pub fn seal_token(
    passphrase_reader: &mut dyn PassphraseReader,
    plaintext: &str,
) -> Result<SealedToken> {
    let passphrase = passphrase_reader.read_passphrase()?;
    let envelope = envelope::encrypt(&passphrase, plaintext.as_bytes())
        .map_err(|e| e.with_context("encryption failed"))?;
    Ok(SealedToken::from_envelope(&envelope))
}

/// Decrypt a token produced by [`seal_token`].
///
/// With `url_decode` set, `token` is expected in its percent-encoded form.
/// The transport string is decoded before the passphrase is read, so a
/// garbled token never prompts for a passphrase.
pub fn open_token(
    passphrase_reader: &mut dyn PassphraseReader,
    token: &str,
    url_decode: bool,
) -> Result<String> {
    let envelope = if url_decode {
        transport::from_url_transport(token)
    } else {
        transport::from_transport(token)
    }
    .map_err(|e| e.with_context("failed to decode token"))?;

    let passphrase = passphrase_reader.read_passphrase()?;
    let mut plaintext = envelope::decrypt(&passphrase, &envelope)
        .map_err(|e| e.with_context("failed to decrypt"))?;

    match String::from_utf8(std::mem::take(&mut *plaintext)) {
        Ok(text) => Ok(text),
        Err(e) => {
            // Put the bytes back so they are wiped along with the wrapper.
            *plaintext = e.into_bytes();
            Err(TokensealError::user(
                ErrorKind::InvalidPlaintext,
                "decrypted data is not valid UTF-8 text",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{HEADER_LEN, NONCE_LEN, TAG_LEN};
    use crate::kdf::SALT_LEN;
    use crate::passphrase::ConstantPassphraseReader;

    fn reader(passphrase: &str) -> ConstantPassphraseReader {
        ConstantPassphraseReader::new(passphrase.as_bytes().to_vec())
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let sealed = seal_token(&mut reader("correct horse"), "battery staple").unwrap();

        let envelope = hex::decode(&sealed.envelope_hex).unwrap();
        assert_eq!(
            envelope.len(),
            HEADER_LEN + "battery staple".len() + TAG_LEN
        );
        assert_eq!(transport::from_transport(&sealed.base64).unwrap(), envelope);

        let opened = open_token(&mut reader("correct horse"), &sealed.base64, false).unwrap();
        assert_eq!(opened, "battery staple");

        let opened = open_token(&mut reader("correct horse"), &sealed.url_encoded, true).unwrap();
        assert_eq!(opened, "battery staple");
    }

    #[test]
    fn test_open_with_wrong_passphrase() {
        let sealed = seal_token(&mut reader("correct horse"), "battery staple").unwrap();
        let err = open_token(&mut reader("wrong horse"), &sealed.base64, false)
            .expect_err("expected authentication failure");
        assert_eq!(err.kind, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(err.message(), "failed to decrypt");
    }

    #[test]
    fn test_open_empty_plaintext() {
        let sealed = seal_token(&mut reader("test"), "").unwrap();
        assert_eq!(sealed.envelope_hex.len(), 2 * (HEADER_LEN + TAG_LEN));
        assert_eq!(
            open_token(&mut reader("test"), &sealed.base64, false).unwrap(),
            ""
        );
    }

    #[test]
    fn test_open_truncated_token() {
        let token = transport::to_transport(&[0u8; HEADER_LEN - 1]);
        let err = open_token(&mut reader("test"), &token, false).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
    }

    #[test]
    fn test_open_garbled_token_does_not_read_passphrase() {
        struct PanickingReader;

        impl PassphraseReader for PanickingReader {
            fn read_passphrase(&mut self) -> Result<zeroize::Zeroizing<Vec<u8>>> {
                panic!("passphrase must not be read for undecodable input");
            }
        }

        let err = open_token(&mut PanickingReader, "not base64!", false).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TransportDecode));

        let err = open_token(&mut PanickingReader, "%zz", true).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::TransportDecode));
    }

    #[test]
    fn test_open_non_utf8_plaintext() {
        let envelope = envelope::encrypt_deterministic(
            b"test",
            &[0xff, 0xfe],
            &[9u8; SALT_LEN],
            &[8u8; NONCE_LEN],
        )
        .unwrap();
        let token = transport::to_transport(&envelope);

        let err = open_token(&mut reader("test"), &token, false).unwrap_err();
        assert_eq!(err.kind, Some(ErrorKind::InvalidPlaintext));
    }

    #[test]
    fn test_sealed_token_serializes_all_forms() {
        let sealed = seal_token(&mut reader("test"), "hello").unwrap();
        let json = serde_json::to_value(&sealed).unwrap();

        assert_eq!(json["envelope_hex"], sealed.envelope_hex.as_str());
        assert_eq!(json["base64"], sealed.base64.as_str());
        assert_eq!(json["url_encoded"], sealed.url_encoded.as_str());
    }
}
