use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgrepo::builder::{build_insert, build_update};
use pgrepo::NamedSql;

/// Builder keys for `n` marked columns.
fn insert_keys(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("@Col{i}")).collect()
}

/// One unmarked identifying key followed by `n` marked columns.
fn update_keys(n: usize) -> Vec<String> {
    let mut keys = vec!["Id".to_string()];
    keys.extend(insert_keys(n));
    keys
}

fn bench_build_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_text/build_insert");

    for n in [1, 5, 10, 50] {
        let keys = insert_keys(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &keys, |b, keys| {
            b.iter(|| black_box(build_insert(keys, r#"public."Person""#)));
        });
    }

    group.finish();
}

fn bench_build_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_text/build_update");

    for n in [1, 5, 10, 50] {
        let keys = update_keys(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &keys, |b, keys| {
            b.iter(|| black_box(build_update(keys, r#"public."Person""#, r#""Id" = @Id"#)));
        });
    }

    group.finish();
}

fn bench_parse_named(c: &mut Criterion) {
    let mut group = c.benchmark_group("sql_text/parse_named");

    for n in [1, 5, 10, 50] {
        let keys = update_keys(n);
        let sql = build_update(&keys, r#"public."Person""#, r#""Id" = @Id"#)
            .expect("valid update");
        group.bench_with_input(BenchmarkId::from_parameter(n), &sql, |b, sql| {
            b.iter(|| black_box(NamedSql::parse(sql)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_insert, bench_build_update, bench_parse_named);
criterion_main!(benches);
