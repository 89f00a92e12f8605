use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use storefwd_core::store::{MemoryConnectionManager, StoreClient, StoredObject};
use storefwd_core::DatabaseConfig;

fn client() -> StoreClient<MemoryConnectionManager> {
    StoreClient::connect(MemoryConnectionManager::new(), &DatabaseConfig::default()).unwrap()
}

fn sample(owner: &str) -> StoredObject {
    StoredObject::new(owner, vec![0u8; 256], "bench-v1")
}

fn bench_store(c: &mut Criterion) {
    let client = client();

    c.bench_function("store_object", |b| {
        b.iter_batched(
            || sample("svc-bench"),
            |object| black_box(client.store(object).unwrap()),
            BatchSize::SmallInput,
        )
    });
}

fn bench_retrieve(c: &mut Criterion) {
    let mut group = c.benchmark_group("retrieve_owner");

    for count in [10usize, 100, 1000] {
        let client = client();
        for _ in 0..count {
            client.store(sample("svc-bench")).unwrap();
        }

        group.bench_function(format!("{}_objects", count), |b| {
            b.iter(|| black_box(client.retrieve("svc-bench").unwrap()))
        });
    }

    group.finish();
}

fn bench_update_owner_change(c: &mut Criterion) {
    let client = client();
    let mut object = sample("svc-a");
    client.store(object.clone()).unwrap();

    c.bench_function("update_owner_change", |b| {
        b.iter(|| {
            object.app_service_key = if object.app_service_key == "svc-a" {
                "svc-b".to_string()
            } else {
                "svc-a".to_string()
            };
            client.update(object.clone()).unwrap();
        })
    });
}

criterion_group!(benches, bench_store, bench_retrieve, bench_update_owner_change);
criterion_main!(benches);
