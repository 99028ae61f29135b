use crate::*;
use osal::StdOs;

pub type TestStorage = SettingsStorage<StdOs, MemFile>;

/// The worked three-entry snapshot: the demo registrations below, saved.
/// CRC of the three entry lines is 1874197929.
pub const THREE_ENTRY_SNAPSHOT: &str =
    "menu1/setting1\t0\t1.23\nmenu1/setting2\t1\t45\nmenu2/setting3\t2\tstring3\n\r1874197929\n";

/// An empty but well-formed snapshot (just the trailer).
pub const EMPTY_SNAPSHOT: &str = "\r0\n";

pub fn register_demo(s: &TestStorage) {
    s.register_setting_as_real("menu1/setting1", Permissions::USER, 1.23)
        .unwrap();
    s.register_setting_as_int("menu1/setting2", Permissions::USER, 45)
        .unwrap();
    s.register_setting_as_string("menu2/setting3", Permissions::USER, "string3")
        .unwrap();
}

/// Demo storage without persistence.
pub fn demo_storage() -> TestStorage {
    let (storage, built) = SettingsStorage::new(&StdOs, &[register_demo], None);
    built.unwrap();
    storage
}

/// Demo storage over the given file contents; returns the construction
/// result alongside.
pub fn demo_storage_with_file(contents: &str) -> (TestStorage, Result<(), SettingError>) {
    SettingsStorage::new(
        &StdOs,
        &[register_demo],
        Some(MemFile::from_contents(contents)),
    )
}
