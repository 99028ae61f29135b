//! # Store — the Moorings typed settings registry
//!
//! A concurrent, prefix-indexed registry of typed settings with single-file
//! persistence, built from the workspace's leaf crates:
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │               SETTINGS STORAGE                   │
//! │                                                  │
//! │ register/put/get ──► RwTree (readers/writer) ──► │
//! │                          Art<SettingEntry>       │
//! │                                                  │
//! │ list/restore ──► prefix walk + permission filter │
//! │                                                  │
//! │ save ──► SnapshotWriter (lines + CRC trailer)    │
//! │ load ──► verify pass, then ingest pass           │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Components register typed settings (with a default value and a permission
//! mask) through callbacks run once at construction; afterwards any thread
//! reads and writes them by key through the typed accessors. Settings are
//! listed by key prefix with one of four permission filters, restored to
//! their defaults by the same selection, and serialized in key order to a
//! caller-provided [`SettingsFile`].
//!
//! ## Example
//!
//! ```rust
//! use osal::StdOs;
//! use store::{MemFile, Permissions, SettingsStorage};
//!
//! fn register_network(s: &SettingsStorage<StdOs, MemFile>) {
//!     let _ = s.register_setting_as_int("net/port", Permissions::ADMIN, 8080);
//!     let _ = s.register_setting_as_string("net/host", Permissions::ADMIN, "localhost");
//! }
//!
//! let (storage, built) = SettingsStorage::new(&StdOs, &[register_network], None);
//! assert!(built.is_ok());
//! assert_eq!(
//!     storage.get_setting_as_int("net/port"),
//!     Ok((8080, Permissions::ADMIN))
//! );
//! ```

mod atomic;
mod entry;
mod error;
mod permissions;

pub use atomic::{RwTree, MUTEX_TIMEOUT_MS};
pub use codec::{
    DiskFile, FileError, MemFile, OpenState, SettingKind, SettingValue, SettingsFile, MAX_KEY_LEN,
};
pub use entry::SettingEntry;
pub use error::SettingError;
pub use permissions::{
    permissions_to_string, FilterMode, Permissions, ALL_PERMISSIONS, ALL_PERMISSIONS_VOLATILE,
    NO_PERMISSIONS, PERMISSION_STRING_SIZE,
};

use std::cell::Cell;

use codec::{read_records, verify_snapshot, CodecError, SnapshotWriter};
use osal::{Mutex, Os};

/// A registration hook run once during construction. Each component installs
/// its settings through the typed `register_setting_as_*` calls.
pub type RegisterSettingsCallback<O, F> = fn(&SettingsStorage<O, F>);

/// The settings store facade.
///
/// All key-indexed operations take `&self` and are safe from any thread; the
/// trie is shared through the bounded-wait readers/writer wrapper. Saving
/// and loading take `&mut self`, which makes overlapping them impossible —
/// the settings file is a single stream that cannot be open for reading and
/// writing at once.
pub struct SettingsStorage<O: Os, F: SettingsFile> {
    settings: RwTree<SettingEntry, O>,
    /// Guards `persistent_enabled`.
    lifecycle_mutex: O::Mutex,
    persistent_enabled: Cell<bool>,
    file: Option<F>,
}

// `persistent_enabled` is only touched under `lifecycle_mutex`; everything
// else is either Sync itself or reached through `&mut self`.
unsafe impl<O: Os, F: SettingsFile + Sync> Sync for SettingsStorage<O, F> {}

impl<O: Os, F: SettingsFile> SettingsStorage<O, F> {
    /// Builds the store: creates the empty registry, runs every registration
    /// callback in order, then — when a file is supplied — enables
    /// persistence and loads the snapshot.
    ///
    /// The store is always returned usable. When the load fails, every
    /// setting is restored to its registered default and the error rides
    /// alongside the store, so the caller can decide whether to keep going
    /// on defaults or give up.
    pub fn new(
        os: &O,
        callbacks: &[RegisterSettingsCallback<O, F>],
        file: Option<F>,
    ) -> (Self, Result<(), SettingError>) {
        let mut storage = Self {
            settings: RwTree::new(os),
            lifecycle_mutex: os.create_mutex(),
            persistent_enabled: Cell::new(false),
            file: None,
        };

        for callback in callbacks {
            callback(&storage);
        }

        let file = if cfg!(feature = "force-disable-persistent-storage") {
            None
        } else {
            file
        };

        let result = match file {
            Some(f) => {
                storage.file = Some(f);
                storage.persistent_enabled.set(true);
                match storage.load_settings_from_persistent_storage() {
                    Ok(()) => Ok(()),
                    Err(err) => {
                        log::warn!("settings snapshot rejected at construction; running on defaults");
                        let _ = storage.restore_default_settings(
                            "",
                            ALL_PERMISSIONS_VOLATILE,
                            FilterMode::MatchAny,
                        );
                        Err(err)
                    }
                }
            }
            None => Ok(()),
        };
        (storage, result)
    }

    /// Whether saves currently go to the settings file. `false` when the
    /// lifecycle mutex could not be taken within the bound.
    #[must_use]
    pub fn is_persistent_storage_enabled(&self) -> bool {
        if !self.lifecycle_mutex.wait(MUTEX_TIMEOUT_MS) {
            return false;
        }
        let enabled = self.persistent_enabled.get();
        self.lifecycle_mutex.signal();
        enabled
    }

    /// Stops future saves from touching the settings file. Returns `false`
    /// when the lifecycle mutex could not be taken within the bound.
    pub fn disable_persistent_storage(&self) -> bool {
        if !self.lifecycle_mutex.wait(MUTEX_TIMEOUT_MS) {
            return false;
        }
        self.persistent_enabled.set(false);
        self.lifecycle_mutex.signal();
        true
    }

    /// The number of registered settings (volatile ones included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Whether the registry holds no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    /// The settings file handle, when one was supplied.
    #[must_use]
    pub fn file(&self) -> Option<&F> {
        self.file.as_ref()
    }

    // -------------------- registration --------------------

    /// Registers an integer setting with its default value.
    pub fn register_setting_as_int(
        &self,
        key: &str,
        permissions: Permissions,
        default: i64,
    ) -> Result<(), SettingError> {
        Self::register_value(&self.settings, key, permissions, SettingValue::Integer(default))
    }

    /// Registers a real setting with its default value.
    pub fn register_setting_as_real(
        &self,
        key: &str,
        permissions: Permissions,
        default: f64,
    ) -> Result<(), SettingError> {
        Self::register_value(&self.settings, key, permissions, SettingValue::Real(default))
    }

    /// Registers a string setting with its default value.
    pub fn register_setting_as_string(
        &self,
        key: &str,
        permissions: Permissions,
        default: &str,
    ) -> Result<(), SettingError> {
        Self::register_value(
            &self.settings,
            key,
            permissions,
            SettingValue::Text(default.to_string()),
        )
    }

    // -------------------- writes --------------------

    /// Overwrites the live value of an integer setting.
    pub fn put_setting_value_as_int(&self, key: &str, value: i64) -> Result<(), SettingError> {
        Self::put_value(&self.settings, key, SettingValue::Integer(value))
    }

    /// Overwrites the live value of a real setting.
    pub fn put_setting_value_as_real(&self, key: &str, value: f64) -> Result<(), SettingError> {
        Self::put_value(&self.settings, key, SettingValue::Real(value))
    }

    /// Overwrites the live value of a string setting. The previous buffer is
    /// released and a fresh copy of `value` installed; the default is never
    /// touched.
    pub fn put_setting_value_as_string(&self, key: &str, value: &str) -> Result<(), SettingError> {
        Self::put_value(&self.settings, key, SettingValue::Text(value.to_string()))
    }

    // -------------------- reads --------------------

    /// Reads the live value of an integer setting with its permissions.
    pub fn get_setting_as_int(&self, key: &str) -> Result<(i64, Permissions), SettingError> {
        self.read_value(key, false, |value| match value {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        })
    }

    /// Reads the live value of a real setting with its permissions.
    pub fn get_setting_as_real(&self, key: &str) -> Result<(f64, Permissions), SettingError> {
        self.read_value(key, false, |value| match value {
            SettingValue::Real(r) => Some(*r),
            _ => None,
        })
    }

    /// Copies the live value of a string setting into `out`, returning the
    /// copied length and the entry's permissions.
    ///
    /// The buffer must be able to hold the value plus one spare byte
    /// (`value.len() < out.len()`), else `InsufficientBufferSize`.
    pub fn get_setting_as_string(
        &self,
        key: &str,
        out: &mut [u8],
    ) -> Result<(usize, Permissions), SettingError> {
        self.read_string(key, false, out)
    }

    /// Reads the registered default of an integer setting.
    pub fn get_default_setting_as_int(
        &self,
        key: &str,
    ) -> Result<(i64, Permissions), SettingError> {
        self.read_value(key, true, |value| match value {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        })
    }

    /// Reads the registered default of a real setting.
    pub fn get_default_setting_as_real(
        &self,
        key: &str,
    ) -> Result<(f64, Permissions), SettingError> {
        self.read_value(key, true, |value| match value {
            SettingValue::Real(r) => Some(*r),
            _ => None,
        })
    }

    /// Copies the registered default of a string setting into `out`, with
    /// the same buffer contract as [`SettingsStorage::get_setting_as_string`].
    pub fn get_default_setting_as_string(
        &self,
        key: &str,
        out: &mut [u8],
    ) -> Result<(usize, Permissions), SettingError> {
        self.read_string(key, true, out)
    }

    // -------------------- listing & restore --------------------

    /// Lists, in lexicographic order, every key that starts with `prefix`
    /// (empty prefix: all keys) and whose permissions pass the filter.
    pub fn list_settings_keys(
        &self,
        prefix: &str,
        permissions: Permissions,
        mode: FilterMode,
    ) -> Result<Vec<String>, SettingError> {
        let mut keys = Vec::new();
        // an expired wait degrades to "no result": the empty list
        let _ = self.settings.read(|tree| {
            tree.for_each_prefix(prefix.as_bytes(), |key, entry: &SettingEntry| {
                if mode.selects(entry.permissions(), permissions) {
                    keys.push(String::from_utf8_lossy(key).into_owned());
                }
                0
            })
        });
        Ok(keys)
    }

    /// Restores the default value of every setting selected by the same
    /// prefix and filter arguments as [`SettingsStorage::list_settings_keys`].
    pub fn restore_default_settings(
        &self,
        prefix: &str,
        permissions: Permissions,
        mode: FilterMode,
    ) -> Result<(), SettingError> {
        let keys = self.list_settings_keys(prefix, permissions, mode)?;
        if keys.is_empty() {
            return Ok(());
        }
        let _ = self.settings.write(|tree| {
            for key in &keys {
                if let Some(entry) = tree.get_mut(key.as_bytes()) {
                    entry.restore_default();
                }
            }
        });
        Ok(())
    }

    // -------------------- persistence --------------------

    /// Serializes every non-volatile setting, in key order, to the settings
    /// file, sealing the snapshot with the CRC trailer. A save is always a
    /// complete rewrite.
    pub fn store_settings_in_persistent_storage(&mut self) -> Result<(), SettingError> {
        if !self.is_persistent_storage_enabled() {
            return Err(SettingError::Filesystem);
        }
        let settings = &self.settings;
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(SettingError::Filesystem),
        };
        let result = Self::write_snapshot(settings, file);
        if result.is_err() && file.open_state() != OpenState::Closed {
            let _ = file.close();
        }
        result
    }

    /// Loads the snapshot from the settings file: a verify pass (checksum
    /// and trailer) followed by an ingest pass. Keys present in the file but
    /// not registered become volatile entries; a mid-file failure leaves the
    /// records ingested so far applied.
    pub fn load_settings_from_persistent_storage(&mut self) -> Result<(), SettingError> {
        let settings = &self.settings;
        let file = match self.file.as_mut() {
            Some(file) => file,
            None => return Err(SettingError::Filesystem),
        };
        if let Err(err) = verify_snapshot(file) {
            log::warn!("settings snapshot failed verification: {err}");
            return Err(SettingError::Filesystem);
        }
        let ingested = read_records(file, |key, value| {
            Self::ingest_record(settings, key, value).map_err(|_| CodecError::Rejected)
        });
        match ingested {
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("settings snapshot failed ingestion: {err}");
                Err(SettingError::Filesystem)
            }
        }
    }

    // -------------------- internals --------------------

    fn register_value(
        settings: &RwTree<SettingEntry, O>,
        key: &str,
        permissions: Permissions,
        default: SettingValue,
    ) -> Result<(), SettingError> {
        if !codec::valid_key(key) {
            return Err(SettingError::InvalidInput);
        }
        if let SettingValue::Text(text) = &default {
            if !codec::valid_text(text) {
                return Err(SettingError::InvalidInput);
            }
        }
        let entry = SettingEntry::new(default, permissions);
        match settings.write(|tree| tree.insert_if_absent(key.as_bytes(), entry)) {
            // an expired wait degrades registration to a silent no-op
            None => Ok(()),
            Some(Ok(())) => Ok(()),
            Some(Err(_)) => {
                log::warn!("setting {key:?} is already registered; keeping the first one");
                Err(SettingError::KeyExists)
            }
        }
    }

    fn put_value(
        settings: &RwTree<SettingEntry, O>,
        key: &str,
        value: SettingValue,
    ) -> Result<(), SettingError> {
        if key.is_empty() {
            return Err(SettingError::InvalidInput);
        }
        if let SettingValue::Text(text) = &value {
            if !codec::valid_text(text) {
                return Err(SettingError::InvalidInput);
            }
        }
        let outcome = settings.write(|tree| match tree.get_mut(key.as_bytes()) {
            None => Err(SettingError::KeyNotFound),
            Some(entry) => {
                if entry.kind() != value.kind() {
                    return Err(SettingError::TypeMismatch);
                }
                entry.set_current(value);
                Ok(())
            }
        });
        // an expired wait degrades to the failed lookup
        outcome.unwrap_or(Err(SettingError::KeyNotFound))
    }

    fn read_value<T>(
        &self,
        key: &str,
        use_default: bool,
        extract: impl Fn(&SettingValue) -> Option<T>,
    ) -> Result<(T, Permissions), SettingError> {
        if key.is_empty() {
            return Err(SettingError::InvalidInput);
        }
        let outcome = self.settings.read(|tree| match tree.get(key.as_bytes()) {
            None => Err(SettingError::KeyNotFound),
            Some(entry) => {
                let value = if use_default {
                    entry.default_value()
                } else {
                    entry.current()
                };
                match extract(value) {
                    Some(extracted) => Ok((extracted, entry.permissions())),
                    None => Err(SettingError::TypeMismatch),
                }
            }
        });
        outcome.unwrap_or(Err(SettingError::KeyNotFound))
    }

    fn read_string(
        &self,
        key: &str,
        use_default: bool,
        out: &mut [u8],
    ) -> Result<(usize, Permissions), SettingError> {
        if key.is_empty() {
            return Err(SettingError::InvalidInput);
        }
        let outcome = self.settings.read(|tree| match tree.get(key.as_bytes()) {
            None => Err(SettingError::KeyNotFound),
            Some(entry) => {
                let value = if use_default {
                    entry.default_value()
                } else {
                    entry.current()
                };
                let text = match value {
                    SettingValue::Text(text) => text,
                    _ => return Err(SettingError::TypeMismatch),
                };
                let bytes = text.as_bytes();
                if bytes.len() >= out.len() {
                    return Err(SettingError::InsufficientBufferSize);
                }
                out[..bytes.len()].copy_from_slice(bytes);
                Ok((bytes.len(), entry.permissions()))
            }
        });
        outcome.unwrap_or(Err(SettingError::KeyNotFound))
    }

    fn write_snapshot(
        settings: &RwTree<SettingEntry, O>,
        file: &mut F,
    ) -> Result<(), SettingError> {
        let mut writer = match SnapshotWriter::begin(file) {
            Ok(writer) => writer,
            Err(_) => return Err(SettingError::Filesystem),
        };
        let mut failed = false;
        let walked = settings.read(|tree| {
            tree.for_each(|key, entry: &SettingEntry| {
                if entry.permissions().contains(Permissions::VOLATILE) {
                    return 0;
                }
                let key = String::from_utf8_lossy(key);
                if writer.record(&key, entry.current()).is_err() {
                    failed = true;
                    return 1;
                }
                0
            })
        });
        if walked.is_none() || failed {
            return Err(SettingError::Filesystem);
        }
        writer.finish().map_err(|_| SettingError::Filesystem)
    }

    /// The loader's per-record action: overwrite a registered entry of the
    /// same kind, or synthesize a volatile entry for an unknown key.
    fn ingest_record(
        settings: &RwTree<SettingEntry, O>,
        key: &str,
        value: SettingValue,
    ) -> Result<(), SettingError> {
        match Self::put_value(settings, key, value.clone()) {
            Err(SettingError::KeyNotFound) => {
                Self::register_value(settings, key, Permissions::VOLATILE, value)
            }
            other => other,
        }
    }
}

impl<O: Os, F: SettingsFile> std::fmt::Debug for SettingsStorage<O, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStorage")
            .field("entries", &self.settings.len())
            .field("persistent_enabled", &self.is_persistent_storage_enabled())
            .field("has_file", &self.file.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests;
