//! The byte-stream abstraction the snapshot codec reads and writes through.
//!
//! A [`SettingsFile`] is a single named stream that can be open for reading
//! *or* writing, never both. The codec drives it strictly in lines. Two
//! implementations ship here: [`DiskFile`] over `std::fs` for production use
//! and [`MemFile`], an in-memory stand-in with fault injection for tests.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by a [`SettingsFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FileError {
    /// The underlying storage failed.
    #[error("i/o failure")]
    Io,

    /// The operation is illegal in the current open state (e.g. reading a
    /// file that is open for writing, or opening an already-open file).
    #[error("operation illegal in the current open state")]
    InvalidState,

    /// The backing storage has no room left for the written bytes.
    #[error("backing storage exhausted")]
    EndOfFile,
}

/// The open-state machine every implementation enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Closed,
    OpenForRead,
    OpenForWrite,
}

/// A single reopenable byte stream, driven in whole lines.
pub trait SettingsFile {
    /// Opens the stream for reading from the start. The stream must be
    /// closed.
    fn open_for_read(&mut self) -> Result<(), FileError>;

    /// Opens the stream for writing, discarding any previous contents. The
    /// stream must be closed.
    fn open_for_write(&mut self) -> Result<(), FileError>;

    /// Replaces the contents of `line` with the next line, **including** its
    /// trailing `\n` when present (the final line may be unterminated).
    /// Returns `Ok(true)` when a line was read and `Ok(false)` at
    /// end-of-file, with `line` left empty.
    fn read_line(&mut self, line: &mut String) -> Result<bool, FileError>;

    /// Appends `data` to the stream.
    fn write(&mut self, data: &str) -> Result<(), FileError>;

    /// Closes the stream. The stream must be open.
    fn close(&mut self) -> Result<(), FileError>;

    /// Reports the current open state.
    fn open_state(&self) -> OpenState;
}

// -------------------- In-memory implementation --------------------

/// An in-memory [`SettingsFile`].
///
/// Beyond the plain backing buffer this carries two test affordances: an
/// optional capacity (writes past it return [`FileError::EndOfFile`], like a
/// full flash partition) and sticky per-operation forced errors for
/// exercising failure paths.
#[derive(Debug, Default)]
pub struct MemFile {
    data: Vec<u8>,
    pos: usize,
    state: Option<bool>, // None = closed, Some(false) = read, Some(true) = write
    capacity: Option<usize>,
    fail_open_read: Option<FileError>,
    fail_open_write: Option<FileError>,
    fail_read_line: Option<FileError>,
    fail_write: Option<FileError>,
    fail_close: Option<FileError>,
}

impl MemFile {
    /// An empty, closed in-memory file.
    pub fn new() -> Self {
        Self::default()
    }

    /// A closed in-memory file pre-seeded with `contents`.
    pub fn from_contents(contents: &str) -> Self {
        Self {
            data: contents.as_bytes().to_vec(),
            ..Self::default()
        }
    }

    /// Caps the backing buffer at `capacity` bytes; writes that would grow
    /// past it are truncated and reported as [`FileError::EndOfFile`].
    pub fn with_capacity(contents: &str, capacity: usize) -> Self {
        Self {
            data: contents.as_bytes().to_vec(),
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// The current backing bytes.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// The current backing bytes as UTF-8 text (lossy).
    pub fn contents_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }

    /// Forces every subsequent `open_for_read` to fail with `err`.
    pub fn force_open_read_error(&mut self, err: FileError) {
        self.fail_open_read = Some(err);
    }

    /// Forces every subsequent `open_for_write` to fail with `err`.
    pub fn force_open_write_error(&mut self, err: FileError) {
        self.fail_open_write = Some(err);
    }

    /// Forces every subsequent `read_line` to fail with `err`.
    pub fn force_read_line_error(&mut self, err: FileError) {
        self.fail_read_line = Some(err);
    }

    /// Forces every subsequent `write` to fail with `err`.
    pub fn force_write_error(&mut self, err: FileError) {
        self.fail_write = Some(err);
    }

    /// Forces every subsequent `close` to fail with `err`.
    pub fn force_close_error(&mut self, err: FileError) {
        self.fail_close = Some(err);
    }

    /// Clears every forced error.
    pub fn clear_forced_errors(&mut self) {
        self.fail_open_read = None;
        self.fail_open_write = None;
        self.fail_read_line = None;
        self.fail_write = None;
        self.fail_close = None;
    }
}

impl SettingsFile for MemFile {
    fn open_for_read(&mut self) -> Result<(), FileError> {
        if let Some(err) = self.fail_open_read {
            return Err(err);
        }
        if self.state.is_some() {
            return Err(FileError::InvalidState);
        }
        self.state = Some(false);
        self.pos = 0;
        Ok(())
    }

    fn open_for_write(&mut self) -> Result<(), FileError> {
        if let Some(err) = self.fail_open_write {
            return Err(err);
        }
        if self.state.is_some() {
            return Err(FileError::InvalidState);
        }
        self.state = Some(true);
        self.data.clear();
        self.pos = 0;
        Ok(())
    }

    fn read_line(&mut self, line: &mut String) -> Result<bool, FileError> {
        if let Some(err) = self.fail_read_line {
            return Err(err);
        }
        if self.state != Some(false) {
            return Err(FileError::InvalidState);
        }
        line.clear();
        if self.pos >= self.data.len() {
            return Ok(false);
        }
        let rest = &self.data[self.pos..];
        let end = match rest.iter().position(|b| *b == b'\n') {
            Some(i) => i + 1,
            None => rest.len(),
        };
        line.push_str(&String::from_utf8_lossy(&rest[..end]));
        self.pos += end;
        Ok(true)
    }

    fn write(&mut self, data: &str) -> Result<(), FileError> {
        if let Some(err) = self.fail_write {
            return Err(err);
        }
        if self.state != Some(true) {
            return Err(FileError::InvalidState);
        }
        let bytes = data.as_bytes();
        if let Some(capacity) = self.capacity {
            let room = capacity.saturating_sub(self.data.len());
            if bytes.len() > room {
                self.data.extend_from_slice(&bytes[..room]);
                return Err(FileError::EndOfFile);
            }
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> Result<(), FileError> {
        if let Some(err) = self.fail_close {
            return Err(err);
        }
        if self.state.is_none() {
            return Err(FileError::InvalidState);
        }
        self.state = None;
        Ok(())
    }

    fn open_state(&self) -> OpenState {
        match self.state {
            None => OpenState::Closed,
            Some(false) => OpenState::OpenForRead,
            Some(true) => OpenState::OpenForWrite,
        }
    }
}

// -------------------- On-disk implementation --------------------

enum Backing {
    Closed,
    Reader(BufReader<File>),
    Writer(File),
}

/// A [`SettingsFile`] over a path on the local filesystem.
///
/// The file is created on the first `open_for_write` and truncated on every
/// subsequent one; a save is always a complete rewrite.
pub struct DiskFile {
    path: PathBuf,
    backing: Backing,
}

impl DiskFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            backing: Backing::Closed,
        }
    }

    /// The path this handle reads and writes.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SettingsFile for DiskFile {
    fn open_for_read(&mut self) -> Result<(), FileError> {
        if !matches!(self.backing, Backing::Closed) {
            return Err(FileError::InvalidState);
        }
        let file = File::open(&self.path).map_err(|_| FileError::Io)?;
        self.backing = Backing::Reader(BufReader::new(file));
        Ok(())
    }

    fn open_for_write(&mut self) -> Result<(), FileError> {
        if !matches!(self.backing, Backing::Closed) {
            return Err(FileError::InvalidState);
        }
        let file = File::create(&self.path).map_err(|_| FileError::Io)?;
        self.backing = Backing::Writer(file);
        Ok(())
    }

    fn read_line(&mut self, line: &mut String) -> Result<bool, FileError> {
        let reader = match &mut self.backing {
            Backing::Reader(r) => r,
            _ => return Err(FileError::InvalidState),
        };
        line.clear();
        let n = reader.read_line(line).map_err(|_| FileError::Io)?;
        Ok(n > 0)
    }

    fn write(&mut self, data: &str) -> Result<(), FileError> {
        let writer = match &mut self.backing {
            Backing::Writer(w) => w,
            _ => return Err(FileError::InvalidState),
        };
        writer.write_all(data.as_bytes()).map_err(|_| FileError::Io)
    }

    fn close(&mut self) -> Result<(), FileError> {
        match std::mem::replace(&mut self.backing, Backing::Closed) {
            Backing::Closed => Err(FileError::InvalidState),
            Backing::Reader(_) => Ok(()),
            Backing::Writer(file) => file.sync_all().map_err(|_| FileError::Io),
        }
    }

    fn open_state(&self) -> OpenState {
        match self.backing {
            Backing::Closed => OpenState::Closed,
            Backing::Reader(_) => OpenState::OpenForRead,
            Backing::Writer(_) => OpenState::OpenForWrite,
        }
    }
}
