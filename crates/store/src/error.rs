//! The error values surfaced by the settings store API.

use thiserror::Error;

/// Everything a settings store call can report. All errors are returned by
/// value; nothing panics across the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SettingError {
    /// Empty key, oversized key, a reserved byte in a key or text value, or
    /// a raw permission byte outside the defined bits.
    #[error("invalid input")]
    InvalidInput,

    /// No entry is registered under the key.
    #[error("key not found")]
    KeyNotFound,

    /// Registration hit an occupied slot.
    #[error("key already registered")]
    KeyExists,

    /// The operation's type differs from the entry's type tag.
    #[error("type mismatch")]
    TypeMismatch,

    /// The string output buffer cannot hold the value plus one spare byte.
    #[error("output buffer too small")]
    InsufficientBufferSize,

    /// An I/O failure, checksum mismatch, or snapshot parse failure.
    #[error("settings filesystem failure")]
    Filesystem,

    /// Reserved. Never produced by this implementation, but callers must
    /// tolerate it.
    #[error("fatal error")]
    Fatal,
}
