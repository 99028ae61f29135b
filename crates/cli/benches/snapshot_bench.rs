use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use osal::StdOs;
use store::{MemFile, Permissions, SettingsStorage};

const N_SETTINGS: usize = 1_000;

type BenchStore = SettingsStorage<StdOs, MemFile>;

fn register_many(s: &BenchStore) {
    for i in 0..N_SETTINGS {
        let key = format!("bench/group{}/setting{}", i % 16, i);
        match i % 3 {
            0 => s.register_setting_as_int(&key, Permissions::USER, i as i64),
            1 => s.register_setting_as_real(&key, Permissions::USER, i as f64 / 7.0),
            _ => s.register_setting_as_string(&key, Permissions::USER, "a medium sized value"),
        }
        .unwrap();
    }
}

fn populated_store(contents: &str) -> BenchStore {
    let (mut storage, _) = SettingsStorage::new(
        &StdOs,
        &[register_many],
        Some(MemFile::from_contents(contents)),
    );
    let _ = storage.store_settings_in_persistent_storage();
    storage
}

fn snapshot_save_benchmark(c: &mut Criterion) {
    c.bench_function("snapshot_save_1k", |b| {
        b.iter_batched(
            || populated_store("\r0\n"),
            |mut storage| {
                storage.store_settings_in_persistent_storage().unwrap();
                storage
            },
            BatchSize::SmallInput,
        );
    });
}

fn snapshot_load_benchmark(c: &mut Criterion) {
    // build one saved snapshot, then measure verify + ingest over it
    let saved = {
        let storage = populated_store("\r0\n");
        storage.file().unwrap().contents_str().into_owned()
    };
    c.bench_function("snapshot_load_1k", |b| {
        b.iter_batched(
            || {
                let (storage, _) = SettingsStorage::new(
                    &StdOs,
                    &[register_many],
                    Some(MemFile::from_contents(&saved)),
                );
                storage
            },
            |mut storage| {
                storage.load_settings_from_persistent_storage().unwrap();
                storage
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, snapshot_save_benchmark, snapshot_load_benchmark);
criterion_main!(benches);
