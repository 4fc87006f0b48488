use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use spatio_keyspace::curve::Z3Sfc;
use spatio_keyspace::prelude::*;

fn benchmark_encode(c: &mut Criterion) {
    let sfc = Z3Sfc::for_period(TimePeriod::Week);
    c.bench_function("z3_encode", |b| {
        let mut t = 0i64;
        b.iter(|| {
            t = (t + 37) % TimePeriod::Week.max_offset();
            sfc.encode(black_box(-74.006), black_box(40.7128), black_box(t))
                .unwrap()
        })
    });
}

fn benchmark_decompose(c: &mut Criterion) {
    let mut group = c.benchmark_group("z3_ranges");
    let sfc = Z3Sfc::for_period(TimePeriod::Week);
    let city = [GeometryExtent::new(-74.3, 40.5, -73.7, 40.9)];
    let day = [(86_400, 2 * 86_400)];

    for target in [10usize, 100, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("city_day", target), &target, |b, &target| {
            b.iter(|| sfc.decompose_ranges(black_box(&city), black_box(&day), 63, target))
        });
    }

    let world = [GeometryExtent::world()];
    let week = [(0, TimePeriod::Week.max_offset())];
    group.bench_function("world_week", |b| {
        b.iter(|| sfc.decompose_ranges(black_box(&world), black_box(&week), 63, 2_000))
    });

    group.finish();
}

fn benchmark_plan(c: &mut Criterion) {
    let schema = Schema::parse("tracks", "dtg:Date,*geom:Point").unwrap();
    let planner = QueryPlanner::new(PlannerConfig::default(), MemoryStore::new(4)).unwrap();
    let start = Utc.with_ymd_and_hms(2017, 1, 3, 0, 0, 0).unwrap();
    let filter = Filter::and(vec![
        Filter::bbox("geom", -10.0, -10.0, 10.0, 10.0),
        Filter::between("dtg", start, start + Duration::weeks(3)),
    ]);

    c.bench_function("plan_bbox_three_weeks", |b| {
        b.iter(|| {
            planner
                .plan_query(&schema, black_box(&filter), &QueryHints::default())
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark_encode, benchmark_decompose, benchmark_plan);
criterion_main!(benches);
