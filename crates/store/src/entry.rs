//! The owned record stored under each key.

use codec::{SettingKind, SettingValue};

use crate::permissions::Permissions;

/// A registered setting: its live value, the immutable default it was
/// registered with, and its permission mask.
///
/// The kind of `current` and `default` is fixed at registration and always
/// identical; typed accessors enforce it on every read and write. For text
/// settings the two values own disjoint buffers, so restoring the default is
/// always a deep copy.
#[derive(Debug, Clone)]
pub struct SettingEntry {
    current: SettingValue,
    default: SettingValue,
    permissions: Permissions,
}

impl SettingEntry {
    /// Builds an entry whose current value starts equal to its default.
    pub(crate) fn new(default: SettingValue, permissions: Permissions) -> Self {
        Self {
            current: default.clone(),
            default,
            permissions,
        }
    }

    /// The type tag fixed at registration.
    #[must_use]
    pub fn kind(&self) -> SettingKind {
        self.default.kind()
    }

    /// The live value.
    #[must_use]
    pub fn current(&self) -> &SettingValue {
        &self.current
    }

    /// The registered default.
    #[must_use]
    pub fn default_value(&self) -> &SettingValue {
        &self.default
    }

    /// The permission mask.
    #[must_use]
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Overwrites the live value. The caller has already checked the kind.
    pub(crate) fn set_current(&mut self, value: SettingValue) {
        debug_assert_eq!(value.kind(), self.kind());
        self.current = value;
    }

    /// Copies the default back over the live value.
    pub(crate) fn restore_default(&mut self) {
        self.current = self.default.clone();
    }
}
