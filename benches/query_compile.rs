//! Benchmarks for expression compilation.

use std::hint::black_box;

use charcoal::query::{
    Direction, Expression, Filter, FilterSpec, ModelMetadata, Operand, Operator, Order,
    Pagination, PropertyDef, SqlCompiler, SqlType,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

fn metadata() -> ModelMetadata {
    ModelMetadata::new("bench/news", "news")
        .property(PropertyDef::localized("title", SqlType::Varchar(255), &["en", "fr", "de"]))
        .property(PropertyDef::new("position", SqlType::Integer))
}

/// Benchmark filter compilation.
fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_compile");

    group.bench_function("predicate_inline", |b| {
        let filter = Filter::predicate("position", Operator::Lt, 10);
        b.iter(|| black_box(filter.sql().unwrap()))
    });

    for size in [10usize, 100] {
        group.bench_with_input(BenchmarkId::new("in_list_bound", size), &size, |b, &size| {
            let filter = Filter::predicate(
                "position",
                Operator::In,
                (0..size as i64).collect::<Vec<_>>(),
            );
            b.iter(|| {
                let mut compiler = SqlCompiler::bound().with_table_alias("objTable");
                black_box(filter.compile(&mut compiler).unwrap())
            })
        });
    }

    group.bench_function("nested_groups_localized", |b| {
        let metadata = metadata();
        let filter = Filter::group([
            Filter::group([
                Filter::predicate("title", Operator::Like, "%rust%").operand(Operand::Or),
                Filter::predicate("title", Operator::Like, "%sql%"),
            ]),
            Filter::predicate("position", Operator::Gte, 1),
            Filter::raw("`objTable`.`active` = 1"),
        ]);
        b.iter(|| {
            let mut compiler = SqlCompiler::bound()
                .with_table_alias("objTable")
                .with_metadata(&metadata);
            black_box(filter.compile(&mut compiler).unwrap())
        })
    });

    group.bench_function("from_json", |b| {
        let json = serde_json::json!({
            "filters": [
                { "property": "position", "operator": ">=", "value": 1 },
                { "property": "title", "operator": "LIKE", "value": "%a%", "operand": "or" },
                { "condition": "1 = 1" }
            ]
        });
        b.iter(|| {
            let spec: FilterSpec = serde_json::from_value(json.clone()).unwrap();
            black_box(Filter::try_from(spec).unwrap())
        })
    });

    group.finish();
}

/// Benchmark order and pagination compilation.
fn bench_orders(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_compile");

    group.bench_function("field_group", |b| {
        let order = Order::group([
            Order::by("position", Direction::Desc),
            Order::asc("title"),
        ]);
        b.iter(|| black_box(order.sql().unwrap()))
    });

    group.bench_function("values", |b| {
        let order = Order::values("position", (0..50).rev().collect::<Vec<i64>>());
        b.iter(|| black_box(order.sql().unwrap()))
    });

    group.bench_function("pagination", |b| {
        let pagination = Pagination::paged(42, 25);
        b.iter(|| black_box(pagination.sql().unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_filters, bench_orders);
criterion_main!(benches);
