//! Run statistics: counting, merging, timings and reports.

use rowflow::*;
use std::time::Duration;

fn rejection(category: RejectionCategory, step: &str) -> Rejection {
    let mut r = Rejection::new("because", category);
    r.step = Some(step.to_string());
    r
}

#[test]
fn rejections_are_counted_per_category_and_step() {
    let mut stats = LoadStatistic::new("people");
    stats.reject(&rejection(RejectionCategory::IgnoreRow, "filter()"));
    stats.reject(&rejection(RejectionCategory::IgnoreRow, "filter()"));
    stats.reject(&rejection(RejectionCategory::IgnoreRow, "unique(id)"));
    stats.reject(&rejection(RejectionCategory::InvalidFormat, "asInt(age)"));

    assert_eq!(stats.rejections(), 4);
    assert_eq!(stats.rejections_in(RejectionCategory::IgnoreRow), 3);
    assert_eq!(stats.rejections_at(RejectionCategory::IgnoreRow, "filter()"), 2);
    assert_eq!(stats.rejections_in(RejectionCategory::ResourceNotFound), 0);
}

#[test]
fn average_needs_processed_rows() {
    let mut stats = LoadStatistic::new("people");
    stats.record_timing("trim()", Duration::from_millis(10));
    assert_eq!(stats.avg("trim()"), None);
    assert_eq!(stats.avg("unknown"), None);

    stats.increment_loaded();
    stats.reject(&rejection(RejectionCategory::Rejection, "trim()"));
    assert_eq!(stats.avg("trim()"), Some(Duration::from_millis(5)));
}

#[test]
fn timings_accumulate() {
    let mut stats = LoadStatistic::new("people");
    stats.record_timing("a", Duration::from_millis(2));
    stats.record_timing("a", Duration::from_millis(3));
    let doubled = stats.timed("b", || 21 * 2);
    assert_eq!(doubled, 42);
    assert_eq!(stats.step_timings()["a"], Duration::from_millis(5));
    assert!(stats.step_timings().contains_key("b"));
}

#[test]
fn copy_adds_rejections_and_fills_missing_timings() {
    let mut upstream = LoadStatistic::new("upstream");
    upstream.mark_start();
    upstream.increment_loaded();
    upstream.reject(&rejection(RejectionCategory::IgnoreRow, "filter()"));
    upstream.record_timing("filter()", Duration::from_millis(7));
    upstream.record_timing("shared", Duration::from_millis(100));

    let mut downstream = LoadStatistic::new("downstream");
    downstream.reject(&rejection(RejectionCategory::IgnoreRow, "filter()"));
    downstream.record_timing("shared", Duration::from_millis(1));
    downstream.copy(&upstream);

    assert_eq!(downstream.start(), upstream.start());
    assert_eq!(downstream.loaded(), 0);
    assert_eq!(downstream.rejections_at(RejectionCategory::IgnoreRow, "filter()"), 2);
    assert_eq!(downstream.step_timings()["filter()"], Duration::from_millis(7));
    assert_eq!(downstream.step_timings()["shared"], Duration::from_millis(1));
}

#[test]
fn json_report_uses_category_names() {
    let mut stats = LoadStatistic::new("people");
    stats.increment_loaded();
    stats.reject(&rejection(RejectionCategory::InvalidFormat, "asInt(age)"));
    stats.record_timing("asInt(age)", Duration::from_millis(4));

    let json = stats.to_json();
    assert_eq!(json["name"], "people");
    assert_eq!(json["loaded"], 1);
    assert_eq!(json["rejections"]["INVALID_FORMAT"]["asInt(age)"], 1);
    assert_eq!(json["step_timings"]["asInt(age)"], 4.0);
}

#[test]
fn text_report_lists_timings_and_rejections() {
    let mut stats = LoadStatistic::new("people");
    stats.record_timing("never", Duration::from_millis(1));
    let report = stats.to_string();
    assert!(report.contains("never: n/a"), "{report}");
    assert!(report.contains("took n/a"), "{report}");
    assert!(!report.contains("Rejections by category"), "{report}");

    stats.reject(&rejection(RejectionCategory::IgnoreRow, "unique(id)"));
    let report = stats.to_string();
    assert!(report.contains("Rejections by category"), "{report}");
    assert!(report.contains("IGNORE_ROW: 1"), "{report}");
    assert!(report.contains("\tunique(id): 1"), "{report}");
    assert!(report.contains("==> people"), "{report}");
    assert!(report.contains("rejected 1"), "{report}");
}

#[test]
fn pipeline_run_fills_statistic() -> anyhow::Result<()> {
    let stats = from_rows(vec![row! { "a" => " x " }]).trim().go()?;
    assert!(stats.start().is_some());
    assert!(stats.end().is_some());
    assert!(stats.duration().is_some());
    assert!(stats.step_timings().contains_key(DONE_CALLBACKS));
    assert!(stats.avg("trim()").is_some());
    Ok(())
}
