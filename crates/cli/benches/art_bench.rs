use art::Art;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

const N_KEYS: usize = 10_000;

fn keyset() -> Vec<String> {
    (0..N_KEYS).map(|i| format!("menu{}/setting{}", i % 64, i)).collect()
}

fn build_tree(keys: &[String]) -> Art<u64> {
    let mut tree = Art::new();
    for (i, key) in keys.iter().enumerate() {
        tree.insert(key.as_bytes(), i as u64);
    }
    tree
}

fn art_insert_benchmark(c: &mut Criterion) {
    let keys = keyset();
    c.bench_function("art_insert_10k", |b| {
        b.iter_batched(
            || keys.clone(),
            |keys| build_tree(&keys),
            BatchSize::SmallInput,
        );
    });
}

fn art_get_hit_benchmark(c: &mut Criterion) {
    let keys = keyset();
    let tree = build_tree(&keys);
    c.bench_function("art_get_hit_10k", |b| {
        b.iter(|| {
            let mut found = 0u64;
            for key in &keys {
                if tree.get(key.as_bytes()).is_some() {
                    found += 1;
                }
            }
            found
        });
    });
}

fn art_prefix_walk_benchmark(c: &mut Criterion) {
    let keys = keyset();
    let tree = build_tree(&keys);
    c.bench_function("art_prefix_walk", |b| {
        b.iter(|| {
            let mut visited = 0u64;
            tree.for_each_prefix(b"menu17/", |_, _| {
                visited += 1;
                0
            });
            visited
        });
    });
}

criterion_group!(
    benches,
    art_insert_benchmark,
    art_get_hit_benchmark,
    art_prefix_walk_benchmark
);
criterion_main!(benches);
