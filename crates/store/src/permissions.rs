//! The four-bit permission model and its filter engine.
//!
//! Every setting carries a bitmask over `SYSTEM`, `ADMIN`, `USER` and
//! `VOLATILE`. The first three grade who may touch a setting; `VOLATILE`
//! marks an entry as in-memory only, invisible to persistence. Listing and
//! restore share the same four filter predicates over these masks.

use bitflags::bitflags;

bitflags! {
    /// Permission bits attached to a setting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u8 {
        /// Critical for the system; not meant to change after provisioning.
        const SYSTEM = 0x01;
        /// Needs human configuration but is off-limits to end users.
        const ADMIN = 0x02;
        /// Freely changeable by the end user.
        const USER = 0x04;
        /// Exists only in memory; skipped by the serializer.
        const VOLATILE = 0x08;
    }
}

/// Every access grade, without the volatile marker.
pub const ALL_PERMISSIONS: Permissions = Permissions::SYSTEM
    .union(Permissions::ADMIN)
    .union(Permissions::USER);

/// Every defined bit.
pub const ALL_PERMISSIONS_VOLATILE: Permissions = ALL_PERMISSIONS.union(Permissions::VOLATILE);

/// The empty mask.
pub const NO_PERMISSIONS: Permissions = Permissions::empty();

/// How a permission filter argument is compared against an entry's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Entry mask equals the filter mask exactly.
    MatchAll,
    /// Entry mask shares at least one bit with the filter mask.
    MatchAny,
    /// Entry mask differs from the filter mask.
    ExcludeAll,
    /// Entry mask shares no bit with the filter mask.
    ExcludeAny,
}

impl FilterMode {
    /// Whether an entry with mask `entry` passes this filter for `wanted`.
    #[must_use]
    pub fn selects(self, entry: Permissions, wanted: Permissions) -> bool {
        match self {
            FilterMode::MatchAll => entry == wanted,
            FilterMode::MatchAny => entry.intersects(wanted),
            FilterMode::ExcludeAll => entry != wanted,
            FilterMode::ExcludeAny => !entry.intersects(wanted),
        }
    }
}

/// Minimum byte length of the buffer handed to [`permissions_to_string`]:
/// the 32 rendered characters plus one spare byte for consumers that append
/// a terminator.
pub const PERMISSION_STRING_SIZE: usize = 33;

/// Renders `permissions` as four fixed-width ` | `-separated fields into
/// `buf`, returning the rendered text.
///
/// The full mask renders as `SYSTEM | ADMIN | USER | VOLATILE`; cleared bits
/// render as spaces of identical width, so columns line up across rows.
/// Returns `None` without touching `buf` when it is shorter than
/// [`PERMISSION_STRING_SIZE`].
pub fn permissions_to_string(permissions: Permissions, buf: &mut [u8]) -> Option<&str> {
    if buf.len() < PERMISSION_STRING_SIZE {
        return None;
    }
    let fields = [
        if permissions.contains(Permissions::SYSTEM) {
            "SYSTEM | "
        } else {
            "       | "
        },
        if permissions.contains(Permissions::ADMIN) {
            "ADMIN | "
        } else {
            "      | "
        },
        if permissions.contains(Permissions::USER) {
            "USER | "
        } else {
            "     | "
        },
        if permissions.contains(Permissions::VOLATILE) {
            "VOLATILE"
        } else {
            "        "
        },
    ];
    let mut at = 0;
    for field in fields {
        buf[at..at + field.len()].copy_from_slice(field.as_bytes());
        at += field.len();
    }
    std::str::from_utf8(&buf[..at]).ok()
}
