use chrono::{DateTime, Duration, TimeZone, Utc};
use spatio_keyspace::filter::{CompareOp, Expr};
use spatio_keyspace::prelude::*;
use spatio_keyspace::{IndexKind, Z3IndexKey};
use std::collections::BTreeSet;

fn schema() -> Schema {
    Schema::parse("tracks", "name:String,dtg:Date,*geom:Point").unwrap()
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn planner() -> QueryPlanner<MemoryStore> {
    QueryPlanner::new(PlannerConfig::default(), MemoryStore::new(1)).unwrap()
}

fn bins_of(plan: &QueryPlan) -> BTreeSet<i16> {
    plan.ranges
        .iter()
        .filter_map(|r| match r {
            ScanRange::Bounded { lower, .. } => Z3IndexKey::from_bytes(lower).map(|k| k.bin),
            ScanRange::Unbounded => None,
        })
        .collect()
}

#[test]
fn test_bbox_and_between_plan() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
        Filter::between("dtg", "2017-01-01T00:00:00Z", "2017-01-02T00:00:00Z"),
    ]);
    let plan = planner()
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    assert_eq!(plan.strategy, StrategyKind::Z3);
    assert!(plan.precise);
    assert!(!plan.ranges.is_empty());
    assert!(plan.ranges.iter().all(|r| !r.is_unbounded()));
    // ranges are coarser than the box, so rows are still checked
    assert_eq!(plan.residual_filter.as_ref(), Some(&filter));
}

#[test]
fn test_three_week_interval_spans_three_bins() {
    let start = date(2017, 1, 3);
    let end = start + Duration::weeks(2) + Duration::days(1);
    let filter = Filter::and(vec![
        Filter::bbox("geom", -10.0, -10.0, 10.0, 10.0),
        Filter::between("dtg", start, end),
    ]);
    let plan = planner()
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    let period = TimePeriod::Week;
    let first = period.to_binned_time(&start).unwrap().bin;
    let expected: BTreeSet<i16> = (first..first + 3).collect();
    assert_eq!(bins_of(&plan), expected);
}

#[test]
fn test_disjoint_filter_plans_nothing() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
        Filter::gt("dtg", date(2017, 1, 5)),
        Filter::lt("dtg", date(2017, 1, 2)),
    ]);
    let plan = planner()
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    assert!(plan.is_empty());
    assert!(!plan.requires_residual());
}

#[test]
fn test_full_scan_guard() {
    let planner = planner();

    let err = planner
        .plan_query(&schema(), &Filter::Include, &QueryHints::default())
        .unwrap_err();
    assert!(matches!(err, KeyspaceError::FullScanBlocked { ref type_name } if type_name == "tracks"));

    // attribute-only filters cannot use the Z3 index either
    let by_name = Filter::eq("name", "alpha");
    assert!(planner.plan_query(&schema(), &by_name, &QueryHints::default()).is_err());

    let plan = planner
        .plan_query(&schema(), &Filter::Include, &QueryHints::allow_full_scan())
        .unwrap();
    assert_eq!(plan.strategy, StrategyKind::FullTable);
    assert_eq!(plan.ranges, vec![ScanRange::Unbounded]);
    assert_eq!(plan.strategy_cost, u64::MAX);
    assert!(!plan.requires_residual());

    let plan = planner
        .plan_query(&schema(), &by_name, &QueryHints::allow_full_scan())
        .unwrap();
    assert_eq!(plan.residual_filter, Some(by_name));
}

#[test]
fn test_full_scan_allowed_by_config() {
    let config = PlannerConfig::default().with_block_full_table_scans(false);
    let planner = QueryPlanner::new(config, MemoryStore::new(1)).unwrap();
    let plan = planner
        .plan_query(&schema(), &Filter::Include, &QueryHints::default())
        .unwrap();
    assert_eq!(plan.strategy, StrategyKind::FullTable);
}

#[test]
fn test_schema_without_date() {
    let points = Schema::parse("places", "name:String,*geom:Point").unwrap();
    let filter = Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0);
    let planner = planner();

    // falls back to a full scan, which is still guarded
    assert!(matches!(
        planner.plan_query(&points, &filter, &QueryHints::default()),
        Err(KeyspaceError::FullScanBlocked { .. })
    ));
    let plan = planner
        .plan_query(&points, &filter, &QueryHints::allow_full_scan())
        .unwrap();
    assert_eq!(plan.strategy, StrategyKind::FullTable);

    let z3 = QueryHints::allow_full_scan().with_index(IndexKind::Z3);
    assert!(matches!(
        planner.plan_query(&points, &filter, &z3),
        Err(KeyspaceError::Schema(_))
    ));
}

#[test]
fn test_imprecise_extraction_keeps_residual() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
        Filter::not(Filter::Compare {
            op: CompareOp::Gt,
            left: Expr::function("abs", vec![Expr::property("dtg")]),
            right: Expr::literal(5i64),
        }),
    ]);
    let config = PlannerConfig::default().with_allow_approximate(true);
    let planner = QueryPlanner::new(config, MemoryStore::new(1)).unwrap();
    let plan = planner
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    assert_eq!(plan.strategy, StrategyKind::Z3);
    assert!(!plan.precise);
    assert!(plan.requires_residual());
}

#[test]
fn test_range_budget() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", -180.0, -90.0, 180.0, 90.0),
        Filter::during("dtg", date(2017, 1, 5), date(2017, 1, 6)),
    ]);
    let hints = QueryHints::default().with_target_ranges(10);
    let plan = planner().plan_query(&schema(), &filter, &hints).unwrap();
    assert!(!plan.ranges.is_empty());
    assert!(plan.ranges.len() <= 10, "{} ranges", plan.ranges.len());
}

#[test]
fn test_antimeridian_bbox_plans_both_sides() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", 179.0, -1.0, -179.0, 1.0),
        Filter::during("dtg", date(2017, 1, 5), date(2017, 1, 6)),
    ]);
    let planner = planner();
    let plan = planner
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    let keyspace = planner.keyspace(&schema()).unwrap();
    for lon in [179.5, -179.5] {
        let record = Record::new("r")
            .with("geom", Point::new(lon, 0.0))
            .with("dtg", date(2017, 1, 5) + Duration::hours(12));
        let key = keyspace.row_key(&record, &[]).unwrap();
        assert!(plan.ranges.iter().any(|r| r.contains(&key)), "{} not covered", lon);
    }
}

#[test]
fn test_ranges_emitted_per_shard() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
        Filter::during("dtg", date(2017, 1, 5), date(2017, 1, 6)),
    ]);
    let unsharded = planner()
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();
    let sharded = QueryPlanner::new(PlannerConfig::default(), MemoryStore::new(4))
        .unwrap()
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    assert_eq!(sharded.ranges.len(), unsharded.ranges.len() * 4);
}

#[test]
fn test_open_ended_time_uses_bin_spans() {
    let filter = Filter::and(vec![
        Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
        Filter::after("dtg", date(2017, 1, 5)),
    ]);
    let plan = planner()
        .plan_query(&schema(), &filter, &QueryHints::default())
        .unwrap();

    assert_eq!(plan.ranges.len(), 1);
    let far_future = Z3IndexKey::new(i16::MAX, 0).row_key(&[], "x");
    assert!(plan.ranges[0].contains(&far_future));
}
