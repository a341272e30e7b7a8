//! Benchmarks for enforcement throughput

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use warden_rs::{Enforcer, EnforcerConfig, MemoryAdapter, Model, RequestValues};

const RBAC_MODEL: &str = "
[request_definition]
r = sub, obj, act
[policy_definition]
p = sub, obj, act
[role_definition]
g = _, _
[policy_effect]
e = some(where (p.eft == allow))
[matchers]
m = g(r.sub, p.sub) && keyMatch2(r.obj, p.obj) && r.act == p.act
";

/// Policy with `roles` roles, each granted one resource, and one user per role
fn create_policy(roles: usize) -> String {
    let mut policy = String::new();
    for i in 0..roles {
        policy.push_str(&format!("p, role{}, /data{}/:id, read\n", i, i));
        policy.push_str(&format!("g, user{}, role{}\n", i, i));
    }
    policy
}

fn create_enforcer(roles: usize, cached: bool) -> Enforcer {
    let mut config = EnforcerConfig::default();
    config.cache.enabled = cached;
    let model = Model::from_text(RBAC_MODEL).unwrap();
    let mut e = Enforcer::with_config(model, config).unwrap();
    e.set_adapter(MemoryAdapter::from_csv_str(&create_policy(roles)).unwrap());
    e.load_policy().unwrap();
    e
}

/// Same request repeated (decision cache hot path)
fn bench_enforce_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforce_cached");

    for roles in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(roles), &roles, |b, &roles| {
            let e = create_enforcer(roles, true);
            let last = roles - 1;
            let request = RequestValues::from(vec![
                format!("user{}", last),
                format!("/data{}/7", last),
                "read".to_string(),
            ]);
            b.iter(|| black_box(e.enforce(request.clone()).unwrap()));
        });
    }

    group.finish();
}

/// Scan of every rule without the decision cache
fn bench_enforce_uncached(c: &mut Criterion) {
    let mut group = c.benchmark_group("enforce_uncached");

    for roles in [10, 100, 1_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(roles), &roles, |b, &roles| {
            let e = create_enforcer(roles, false);
            let last = roles - 1;
            let request = RequestValues::from(vec![
                format!("user{}", last),
                format!("/data{}/7", last),
                "read".to_string(),
            ]);
            b.iter(|| black_box(e.enforce(request.clone()).unwrap()));
        });
    }

    group.finish();
}

fn bench_parallel_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_batch_enforce");
    let e = create_enforcer(100, false);
    let requests: Vec<RequestValues> = (0..1_000)
        .map(|i| {
            RequestValues::from(vec![
                format!("user{}", i % 100),
                format!("/data{}/{}", i % 100, i),
                "read".to_string(),
            ])
        })
        .collect();

    group.throughput(Throughput::Elements(requests.len() as u64));
    group.bench_function("serial", |b| {
        b.iter(|| black_box(e.batch_enforce(requests.iter().cloned()).unwrap()))
    });
    group.bench_function("parallel", |b| {
        b.iter(|| black_box(e.parallel_batch_enforce(&requests).unwrap()))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_enforce_cached,
    bench_enforce_uncached,
    bench_parallel_batch
);
criterion_main!(benches);
