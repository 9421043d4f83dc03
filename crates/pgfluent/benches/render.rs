use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pgfluent::{Executor, Filter, Rows, SqlResult, Value};

/// Executor that never runs anything; only `build()` is measured.
struct NoopExecutor;

impl Executor for NoopExecutor {
    async fn execute(&self, _sql: &str, _args: &[Value]) -> SqlResult<u64> {
        Ok(0)
    }

    async fn query(&self, _sql: &str, _args: &[Value]) -> SqlResult<Rows> {
        Ok(Rows::new(Vec::new()))
    }
}

/// SELECT col0, col1, ... FROM t WHERE col0 = $1 AND col1 = $2 ...
fn bench_select_conditions(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/select_conditions");
    let db = NoopExecutor;

    for n in [1, 5, 10, 50, 100] {
        let columns: Vec<String> = (0..n).map(|i| format!("col{i}")).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &columns, |b, columns| {
            b.iter(|| {
                let fields: Vec<&str> = columns.iter().map(String::as_str).collect();
                let mut q = db.select().table("t").unwrap().select(&fields).unwrap();
                for (i, col) in columns.iter().enumerate() {
                    q = q.where_(&format!("{col} = ?"), [i as i64]);
                }
                black_box(q.build().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_where_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/where_in");
    let db = NoopExecutor;

    for n in [5, 20, 100, 500] {
        let values: Vec<i64> = (0..n).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &values, |b, values| {
            b.iter(|| {
                let q = db
                    .select()
                    .table("t")
                    .unwrap()
                    .where_in("id", values.iter().copied())
                    .unwrap();
                black_box(q.build().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_insert_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("render/insert_rows");
    let db = NoopExecutor;

    for n in [1, 10, 100] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut q = db
                    .insert()
                    .table("events")
                    .unwrap()
                    .columns(&["kind", "payload", "weight"])
                    .unwrap();
                for i in 0..n {
                    q = q.values(("click", format!("row-{i}"), i as i64));
                }
                black_box(q.build().unwrap());
            });
        });
    }

    group.finish();
}

fn bench_validation(c: &mut Criterion) {
    c.bench_function("render/validate_field_expression", |b| {
        b.iter(|| {
            black_box(pgfluent::validate_field_expression("COUNT(o.id) as order_count").is_ok());
            black_box(pgfluent::validate_field_expression("u.created_at").is_ok());
            black_box(pgfluent::validate_field_expression("id; DROP TABLE users").is_err());
        });
    });
}

criterion_group!(
    benches,
    bench_select_conditions,
    bench_where_in,
    bench_insert_rows,
    bench_validation
);
criterion_main!(benches);
