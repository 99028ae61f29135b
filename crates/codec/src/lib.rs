//! # Codec — settings snapshot format
//!
//! Serializes the live settings set to a line-oriented text snapshot with a
//! CRC-32 trailer, and loads it back with a strict verify-then-ingest
//! discipline.
//!
//! ## Snapshot layout
//!
//! ```text
//! <key>\t<type ordinal>\t<value text>\n      (one line per entry)
//! ...
//! \r<crc32 decimal>\n                        (trailer, always last)
//! ```
//!
//! The leading `\r` is the sole marker of the trailer line and is forbidden
//! everywhere else. The checksum is the IEEE CRC-32 (reflected, init and
//! xorout `0xFFFFFFFF`) over every entry-line byte in written order,
//! including each terminating `\n` and excluding the trailer itself.
//!
//! Type ordinals: `0` = real (f64), `1` = integer (i64), `2` = text. Reals
//! render through `f64`'s shortest-roundtrip `Display`; integers as plain
//! signed decimal; text verbatim.
//!
//! ## Loading
//!
//! Loading is two passes over the stream:
//!
//! 1. [`verify_snapshot`] — checksum every entry line, parse the trailer
//!    (strictly unsigned decimal, strictly the final line) and compare.
//!    Nothing is ingested; a corrupt file is rejected before any state
//!    changes.
//! 2. [`read_records`] — reopen and parse each entry line into
//!    `(key, SettingValue)`, handing them to the caller's apply callback.
//!
//! ## Example
//!
//! ```rust
//! use codec::{read_records, verify_snapshot, MemFile, SettingValue, SnapshotWriter};
//!
//! let mut file = MemFile::new();
//! let mut w = SnapshotWriter::begin(&mut file).unwrap();
//! w.record("net/port", &SettingValue::Integer(8080)).unwrap();
//! w.finish().unwrap();
//!
//! verify_snapshot(&mut file).unwrap();
//! read_records(&mut file, |key, value| {
//!     assert_eq!(key, "net/port");
//!     assert_eq!(value, SettingValue::Integer(8080));
//!     Ok(())
//! })
//! .unwrap();
//! ```

mod file;

pub use file::{DiskFile, FileError, MemFile, OpenState, SettingsFile};

use crc32fast::Hasher;
use thiserror::Error;

/// Maximum accepted key length in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Errors surfaced by the snapshot codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The settings file failed underneath the codec.
    #[error("file error: {0}")]
    File(#[from] FileError),

    /// The snapshot violates the format.
    #[error("snapshot corrupt: {0}")]
    Corrupt(&'static str),

    /// The store rejected a record handed to it by the ingest callback.
    #[error("record rejected by the store")]
    Rejected,
}

/// The type tag of a setting, with its on-disk ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    Real = 0,
    Integer = 1,
    Text = 2,
}

impl SettingKind {
    /// The on-disk ordinal.
    #[must_use]
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Maps an on-disk ordinal back to a kind; anything outside `0..=2` is
    /// corruption.
    #[must_use]
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(SettingKind::Real),
            1 => Some(SettingKind::Integer),
            2 => Some(SettingKind::Text),
            _ => None,
        }
    }
}

/// A typed setting payload.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Real(f64),
    Integer(i64),
    Text(String),
}

impl SettingValue {
    /// The kind matching the live variant.
    #[must_use]
    pub fn kind(&self) -> SettingKind {
        match self {
            SettingValue::Real(_) => SettingKind::Real,
            SettingValue::Integer(_) => SettingKind::Integer,
            SettingValue::Text(_) => SettingKind::Text,
        }
    }

    /// The on-disk value text.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            SettingValue::Real(r) => format!("{r}"),
            SettingValue::Integer(i) => format!("{i}"),
            SettingValue::Text(t) => t.clone(),
        }
    }
}

/// Whether `key` is storable: non-empty, at most [`MAX_KEY_LEN`] bytes, and
/// free of the bytes the line format reserves (`\t`, `\n`) plus `\r`, which
/// marks the trailer and must not be forgeable by a key starting a line.
#[must_use]
pub fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= MAX_KEY_LEN && valid_text(key)
}

/// Whether a text value is storable: free of `\t`, `\n` and `\r`.
#[must_use]
pub fn valid_text(text: &str) -> bool {
    !text.bytes().any(|b| matches!(b, b'\t' | b'\n' | b'\r'))
}

/// Streams entry lines into a settings file, tracking the running CRC, and
/// seals the snapshot with the trailer on [`SnapshotWriter::finish`].
///
/// Dropping the writer without `finish` leaves the file open and the
/// snapshot trailerless (deliberately unloadable); the caller is expected to
/// close the handle and retry the whole save.
pub struct SnapshotWriter<'a, F: SettingsFile> {
    file: &'a mut F,
    crc: Hasher,
}

impl<'a, F: SettingsFile> SnapshotWriter<'a, F> {
    /// Opens the file for writing and starts a fresh snapshot.
    pub fn begin(file: &'a mut F) -> Result<Self, CodecError> {
        file.open_for_write()?;
        Ok(Self {
            file,
            crc: Hasher::new(),
        })
    }

    /// Appends one entry line.
    pub fn record(&mut self, key: &str, value: &SettingValue) -> Result<(), CodecError> {
        let line = format!("{key}\t{}\t{}\n", value.kind().ordinal(), value.render());
        self.crc.update(line.as_bytes());
        self.file.write(&line)?;
        Ok(())
    }

    /// Writes the trailer and closes the file.
    pub fn finish(self) -> Result<(), CodecError> {
        let trailer = format!("\r{}\n", self.crc.finalize());
        self.file.write(&trailer)?;
        self.file.close()?;
        Ok(())
    }
}

/// Pass 1: checks the snapshot's integrity without ingesting anything.
///
/// Opens for read, checksums every entry line, requires exactly one trailer
/// as the final line holding an unsigned decimal CRC, closes, and compares.
pub fn verify_snapshot<F: SettingsFile>(file: &mut F) -> Result<(), CodecError> {
    file.open_for_read()?;
    let verdict = checksum_lines(file);
    let closed = file.close();
    verdict?;
    closed.map_err(CodecError::from)
}

fn checksum_lines<F: SettingsFile>(file: &mut F) -> Result<(), CodecError> {
    let mut crc = Hasher::new();
    let mut expected: Option<u32> = None;
    let mut line = String::new();
    while file.read_line(&mut line)? {
        if expected.is_some() {
            return Err(CodecError::Corrupt("data after trailer"));
        }
        if line.starts_with('\r') {
            expected = Some(parse_trailer(&line)?);
        } else {
            crc.update(line.as_bytes());
        }
    }
    let expected = expected.ok_or(CodecError::Corrupt("missing trailer"))?;
    let computed = crc.finalize();
    if computed != expected {
        log::warn!("settings snapshot checksum mismatch: trailer {expected}, computed {computed}");
        return Err(CodecError::Corrupt("checksum mismatch"));
    }
    Ok(())
}

fn parse_trailer(line: &str) -> Result<u32, CodecError> {
    let digits = line[1..]
        .strip_suffix('\n')
        .ok_or(CodecError::Corrupt("unterminated trailer"))?;
    // strictly unsigned decimal: no sign, no blanks, no empty field
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::Corrupt("malformed trailer checksum"));
    }
    digits
        .parse::<u32>()
        .map_err(|_| CodecError::Corrupt("trailer checksum out of range"))
}

/// Pass 2: reopens the snapshot and hands every `(key, value)` record to
/// `apply` in file order. The trailer line is skipped.
///
/// A parse failure or an `apply` error stops the pass; records already
/// applied stay applied (the loader does not roll back).
pub fn read_records<F, A>(file: &mut F, mut apply: A) -> Result<(), CodecError>
where
    F: SettingsFile,
    A: FnMut(&str, SettingValue) -> Result<(), CodecError>,
{
    file.open_for_read()?;
    let verdict = ingest_lines(file, &mut apply);
    let closed = file.close();
    verdict?;
    closed.map_err(CodecError::from)
}

fn ingest_lines<F: SettingsFile>(
    file: &mut F,
    apply: &mut dyn FnMut(&str, SettingValue) -> Result<(), CodecError>,
) -> Result<(), CodecError> {
    let mut line = String::new();
    while file.read_line(&mut line)? {
        if line.starts_with('\r') {
            continue;
        }
        let (key, value) = parse_record(&line)?;
        apply(key, value)?;
    }
    Ok(())
}

/// Splits one entry line into its key and typed value.
fn parse_record(line: &str) -> Result<(&str, SettingValue), CodecError> {
    let body = line.strip_suffix('\n').unwrap_or(line);
    let (key, rest) = body
        .split_once('\t')
        .ok_or(CodecError::Corrupt("missing key separator"))?;
    if key.is_empty() {
        return Err(CodecError::Corrupt("empty key"));
    }
    let (ordinal, text) = rest
        .split_once('\t')
        .ok_or(CodecError::Corrupt("missing type separator"))?;
    if ordinal.is_empty() || !ordinal.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CodecError::Corrupt("malformed type ordinal"));
    }
    let kind = ordinal
        .parse::<u8>()
        .ok()
        .and_then(SettingKind::from_ordinal)
        .ok_or(CodecError::Corrupt("unknown value type"))?;
    if text.is_empty() {
        return Err(CodecError::Corrupt("empty value text"));
    }
    let value = match kind {
        SettingKind::Real => SettingValue::Real(
            text.parse::<f64>()
                .map_err(|_| CodecError::Corrupt("malformed real value"))?,
        ),
        SettingKind::Integer => SettingValue::Integer(
            text.parse::<i64>()
                .map_err(|_| CodecError::Corrupt("malformed integer value"))?,
        ),
        SettingKind::Text => SettingValue::Text(text.to_string()),
    };
    Ok((key, value))
}
