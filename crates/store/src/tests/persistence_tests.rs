use super::helpers::*;
use crate::*;
use osal::StdOs;

// -------------------- Save --------------------

#[test]
fn save_writes_the_worked_snapshot_byte_for_byte() {
    let (mut storage, built) = demo_storage_with_file(EMPTY_SNAPSHOT);
    built.unwrap();
    storage.store_settings_in_persistent_storage().unwrap();
    assert_eq!(
        storage.file().unwrap().contents_str(),
        THREE_ENTRY_SNAPSHOT
    );
}

#[test]
fn two_saves_are_byte_identical() {
    let (mut storage, built) = demo_storage_with_file(EMPTY_SNAPSHOT);
    built.unwrap();
    storage.store_settings_in_persistent_storage().unwrap();
    let first = storage.file().unwrap().contents().to_vec();
    storage.store_settings_in_persistent_storage().unwrap();
    assert_eq!(storage.file().unwrap().contents(), &first[..]);
}

#[test]
fn save_skips_volatile_entries() {
    let (mut storage, built) = demo_storage_with_file(EMPTY_SNAPSHOT);
    built.unwrap();
    storage
        .register_setting_as_string("scratch/session", Permissions::VOLATILE, "tmp")
        .unwrap();
    storage
        .register_setting_as_int("scratch/mixed", Permissions::USER | Permissions::VOLATILE, 3)
        .unwrap();
    storage.store_settings_in_persistent_storage().unwrap();
    let saved = storage.file().unwrap().contents_str().into_owned();
    assert!(!saved.contains("scratch/"));
    assert_eq!(saved, THREE_ENTRY_SNAPSHOT);
}

#[test]
fn save_without_a_file_is_a_filesystem_error() {
    let mut storage = demo_storage();
    assert_eq!(
        storage.store_settings_in_persistent_storage(),
        Err(SettingError::Filesystem)
    );
}

#[test]
fn save_after_disabling_persistence_is_rejected() {
    let (mut storage, built) = demo_storage_with_file(EMPTY_SNAPSHOT);
    built.unwrap();
    assert!(storage.is_persistent_storage_enabled());
    assert!(storage.disable_persistent_storage());
    assert_eq!(
        storage.store_settings_in_persistent_storage(),
        Err(SettingError::Filesystem)
    );
    // nothing was written
    assert_eq!(storage.file().unwrap().contents_str(), EMPTY_SNAPSHOT);
}

#[test]
fn save_surfaces_write_failures_and_closes_the_file() {
    // the capped backing buffer has no room for even the first entry line
    let (mut storage, built) = SettingsStorage::new(
        &StdOs,
        &[register_demo],
        Some(MemFile::with_capacity(EMPTY_SNAPSHOT, 4)),
    );
    built.unwrap();
    assert_eq!(
        storage.store_settings_in_persistent_storage(),
        Err(SettingError::Filesystem)
    );
    assert_eq!(storage.file().unwrap().open_state(), OpenState::Closed);
}

// -------------------- Load --------------------

#[test]
fn load_applies_saved_values_over_registered_defaults() {
    // menu1/setting1 = 9.99, menu1/setting2 = -3, menu2/setting3 = "updated"
    let snapshot = "menu1/setting1\t0\t9.99\nmenu1/setting2\t1\t-3\nmenu2/setting3\t2\tupdated\n\r2146862389\n";
    let (storage, built) = demo_storage_with_file(snapshot);
    built.unwrap();

    assert_eq!(
        storage.get_setting_as_real("menu1/setting1"),
        Ok((9.99, Permissions::USER))
    );
    assert_eq!(
        storage.get_setting_as_int("menu1/setting2"),
        Ok((-3, Permissions::USER))
    );
    let mut buf = [0u8; 16];
    let (len, _) = storage.get_setting_as_string("menu2/setting3", &mut buf).unwrap();
    assert_eq!(&buf[..len], b"updated");

    // defaults are untouched by the load
    assert_eq!(storage.get_default_setting_as_int("menu1/setting2").unwrap().0, 45);
}

#[test]
fn unknown_keys_become_volatile_entries() {
    // no registration callbacks at all: every key in the file is unknown
    let (storage, built) = SettingsStorage::<StdOs, MemFile>::new(
        &StdOs,
        &[],
        Some(MemFile::from_contents(THREE_ENTRY_SNAPSHOT)),
    );
    built.unwrap();

    assert_eq!(
        storage
            .list_settings_keys("", Permissions::VOLATILE, FilterMode::MatchAny)
            .unwrap(),
        vec!["menu1/setting1", "menu1/setting2", "menu2/setting3"]
    );
    assert!(storage
        .list_settings_keys("", ALL_PERMISSIONS, FilterMode::MatchAny)
        .unwrap()
        .is_empty());

    // loader-born entries carry the loaded value as both current and default
    assert_eq!(
        storage.get_setting_as_int("menu1/setting2"),
        Ok((45, Permissions::VOLATILE))
    );
}

#[test]
fn volatile_entries_vanish_on_the_next_save() {
    let (mut storage, built) = SettingsStorage::<StdOs, MemFile>::new(
        &StdOs,
        &[],
        Some(MemFile::from_contents(THREE_ENTRY_SNAPSHOT)),
    );
    built.unwrap();
    storage.store_settings_in_persistent_storage().unwrap();
    assert_eq!(storage.file().unwrap().contents_str(), "\r0\n");
}

#[test]
fn roundtrip_through_a_fresh_store_preserves_non_volatile_state() {
    let (mut first, built) = demo_storage_with_file(EMPTY_SNAPSHOT);
    built.unwrap();
    first.put_setting_value_as_int("menu1/setting2", 1000).unwrap();
    first.put_setting_value_as_string("menu2/setting3", "carried").unwrap();
    first
        .register_setting_as_int("scratch/gone", Permissions::VOLATILE, 1)
        .unwrap();
    first.store_settings_in_persistent_storage().unwrap();
    let saved = first.file().unwrap().contents_str().into_owned();

    let (second, built) = demo_storage_with_file(&saved);
    built.unwrap();
    assert_eq!(second.get_setting_as_int("menu1/setting2").unwrap().0, 1000);
    let mut buf = [0u8; 16];
    let (len, _) = second.get_setting_as_string("menu2/setting3", &mut buf).unwrap();
    assert_eq!(&buf[..len], b"carried");
    assert_eq!(
        second.get_setting_as_int("scratch/gone"),
        Err(SettingError::KeyNotFound)
    );
}

// -------------------- Corruption --------------------

#[test]
fn corrupted_snapshot_leaves_the_registered_defaults() {
    let corrupted = THREE_ENTRY_SNAPSHOT.replace("45", "46");
    let (storage, built) = demo_storage_with_file(&corrupted);
    assert_eq!(built, Err(SettingError::Filesystem));

    // the store is alive, populated only by the registration callbacks
    assert_eq!(storage.get_setting_as_real("menu1/setting1").unwrap().0, 1.23);
    assert_eq!(storage.get_setting_as_int("menu1/setting2").unwrap().0, 45);
    assert_eq!(
        storage
            .list_settings_keys("", ALL_PERMISSIONS_VOLATILE, FilterMode::MatchAny)
            .unwrap()
            .len(),
        3
    );
    // persistence stays enabled; the next save overwrites the bad file
    assert!(storage.is_persistent_storage_enabled());
}

#[test]
fn type_conflict_in_the_snapshot_fails_the_load() {
    // menu1/setting2 is registered as an integer; the file claims real
    let snapshot = "menu1/setting2\t0\t9.5\n\r1131743240\n";
    let (storage, built) = demo_storage_with_file(snapshot);
    assert_eq!(built, Err(SettingError::Filesystem));
    // the registered entry still reads back with its default
    assert_eq!(storage.get_setting_as_int("menu1/setting2").unwrap().0, 45);
}

#[test]
fn mid_file_failure_keeps_earlier_records_applied() {
    // first record is fine, the second carries an oversized key the
    // registration path rejects; the loader does not roll back
    let long_key = "k".repeat(129);
    let snapshot = format!("alpha\t1\t7\n{long_key}\t1\t9\n\r2276741446\n");

    fn register(s: &TestStorage) {
        s.register_setting_as_int("alpha", Permissions::USER, 1).unwrap();
    }
    let (mut storage, built) = SettingsStorage::new(
        &StdOs,
        &[register as RegisterSettingsCallback<StdOs, MemFile>],
        Some(MemFile::from_contents(&snapshot)),
    );
    assert_eq!(built, Err(SettingError::Filesystem));
    // construction restored defaults after the failed load
    assert_eq!(storage.get_setting_as_int("alpha").unwrap().0, 1);

    // driving the loader directly shows the partial application
    storage.put_setting_value_as_int("alpha", 0).unwrap();
    assert_eq!(
        storage.load_settings_from_persistent_storage(),
        Err(SettingError::Filesystem)
    );
    assert_eq!(storage.get_setting_as_int("alpha").unwrap().0, 7);
}

#[test]
fn text_value_with_a_tab_fails_the_load() {
    // CRC-valid bytes, but the text value smuggles a reserved byte
    let snapshot = "menu2/setting3\t2\ta\tb\n\r1473007266\n";
    let (_storage, built) = demo_storage_with_file(snapshot);
    assert_eq!(built, Err(SettingError::Filesystem));
}

#[test]
fn empty_file_fails_verification() {
    let (storage, built) = demo_storage_with_file("");
    assert_eq!(built, Err(SettingError::Filesystem));
    assert_eq!(storage.len(), 3);
}

#[test]
fn reload_at_runtime_overwrites_put_values() {
    let (mut storage, built) = demo_storage_with_file(THREE_ENTRY_SNAPSHOT);
    built.unwrap();
    storage.put_setting_value_as_int("menu1/setting2", 0).unwrap();
    storage.load_settings_from_persistent_storage().unwrap();
    assert_eq!(storage.get_setting_as_int("menu1/setting2").unwrap().0, 45);
}
