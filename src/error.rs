use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// Use of Internal is never a guarantee the error is not, for example,
    /// due to a user error - merely that it cannot be confidently determined
    /// by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A required command line input (passphrase, text, project name) was absent.
    MissingArgument,
    /// More than one passphrase source was named on the command line.
    ConflictingArguments,
    /// The envelope is shorter than the fixed salt + nonce header.
    MalformedEnvelope,
    /// Authentication failed due to an incorrect passphrase or tampering
    /// or corruption. The two causes are deliberately not distinguished.
    AuthenticationFailed,
    /// Base64 or percent-decoding of a transport string failed.
    TransportDecode,
    /// Decrypted bytes were expected to be text but are not valid UTF-8.
    InvalidPlaintext,
    /// Passphrase could not be obtained from the configured source.
    PassphraseUnavailable,
    /// The project manifest is not shaped the way scaffolding expects.
    ManifestInvalid,
    /// AES-GCM refused to seal the plaintext.
    CipherFailure,
    /// Interaction with the filesystem, stdin/stdout, or other I/O failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct TokensealError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl TokensealError {
    /// Creates a new error with a required category and display message.
    pub fn new(category: ErrorCategory, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: None,
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that retains the originating source error.
    pub fn with_source(
        category: ErrorCategory,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: None,
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// Shorthand for the user-caused, kind-tagged errors that make up most of
    /// the failures surfaced by the command line tool.
    pub fn user(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, kind, msg)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }

    /// Renders the message followed by every source in the chain, separated by `": "`.
    pub fn display_chain(&self) -> String {
        let mut out = self.msg.clone();
        let mut next = StdError::source(self);
        while let Some(err) = next {
            out.push_str(": ");
            out.push_str(&err.to_string());
            next = err.source();
        }
        out
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TokensealError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_with_context_keeps_category_and_kind() {
        let err = TokensealError::user(ErrorKind::MalformedEnvelope, "envelope too short")
            .with_context("failed to decrypt");

        assert_eq!(err.category, ErrorCategory::User);
        assert_eq!(err.kind, Some(ErrorKind::MalformedEnvelope));
        assert_eq!(err.message(), "failed to decrypt");
        assert_eq!(
            err.source_error().map(|s| s.to_string()),
            Some("envelope too short".to_string())
        );
    }

    #[test]
    fn test_display_chain() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err = TokensealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            "failed to read package.json",
            io_err,
        )
        .with_context("init failed");

        assert_eq!(
            err.display_chain(),
            "init failed: failed to read package.json: no such file"
        );
    }

    #[test]
    fn test_new_has_no_kind() {
        let err = TokensealError::new(ErrorCategory::Internal, "boom");
        assert_eq!(err.kind, None);
        assert!(err.source_error().is_none());
        assert_eq!(err.to_string(), "boom");
    }
}
