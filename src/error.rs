//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout cexkit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// A size, round count, or description field is outside its valid
    /// domain (message describes which one).
    InvalidArgument(&'static str),
    /// The destination buffer is smaller than the contract requires.
    BufferTooShort { needed: usize, got: usize },
    /// On decrypt, the padding trailer is inconsistent.
    PaddingInvalid,
    /// The MAC tag did not match on authenticated decryption.
    AuthenticationFailed,
    /// The key store has no entry for the fingerprint, or denies access.
    KeyLookupFailed([u8; 16]),
    /// An underlying I/O operation failed.
    Io(io::Error),
    /// The progress callback requested cooperative cancellation.
    Cancelled,
    /// A state that should be unreachable was reached; treat as fatal.
    InternalInvariant(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(s) => write!(f, "invalid argument: {s}"),
            Error::BufferTooShort { needed, got } => {
                write!(f, "buffer too short: need {needed} bytes, got {got}")
            }
            Error::PaddingInvalid => write!(f, "inconsistent padding trailer"),
            Error::AuthenticationFailed => write!(f, "MAC verification failed"),
            Error::KeyLookupFailed(fp) => {
                write!(f, "no key material for fingerprint {}", hex::encode(fp))
            }
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Cancelled => write!(f, "cancelled by caller"),
            Error::InternalInvariant(s) => write!(f, "internal invariant violated: {s}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
