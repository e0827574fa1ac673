use std::path::PathBuf;

use chrono::NaiveDate;
use slareport_core::config::{PipelineConfig, TableSource};
use slareport_core::error::PipelineError;
use slareport_core::join::DedupPolicy;
use slareport_core::pipeline::SlaPipeline;
use slareport_core::report;
use slareport_core::sla::{MATCHED_COLUMN, SLA_CATEGORY_COLUMN, SLA_HOURS_COLUMN};
use slareport_core::timestamps::naive_to_micros;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/data")
        .join(path)
}

fn source(path: &str) -> TableSource {
    TableSource {
        path: fixture(path),
        sheet: "Sheet1".to_string(),
    }
}

fn config() -> PipelineConfig {
    PipelineConfig {
        master: source("master.csv"),
        primary: source("prescreening.csv"),
        secondary: source("slik.csv"),
        master_id_column: "APPID_ONEME_PRESCREEN".to_string(),
        appid_column: "APPID".to_string(),
        created_at_column: "CREATED_AT".to_string(),
        completed_at_column: "Timedone Hit SLIK".to_string(),
        extra_secondary_timestamps: vec!["Tanggal Hit SLIK".to_string()],
        primary_columns: Vec::new(),
        secondary_columns: Vec::new(),
        collision_suffix: "SLIK".to_string(),
        dedup: DedupPolicy::EarliestByBoth,
        status_filter: None,
        flag_negative_elapsed: false,
    }
}

fn micros(day: u32, hour: u32, minute: u32) -> i64 {
    naive_to_micros(
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap(),
    )
}

fn row_for_appid(detail: &polars::prelude::DataFrame, appid: i64) -> usize {
    let ids = detail.column("APPID").unwrap().i64().unwrap();
    (0..detail.height())
        .find(|idx| ids.get(*idx) == Some(appid))
        .unwrap_or_else(|| panic!("appid {appid} not found in detail output"))
}

#[test]
fn dedup_run_matches_the_reference_scenario() {
    let mut pipeline = SlaPipeline::new(config());
    let run = pipeline.run().expect("pipeline run failed");
    let detail = &run.detail;

    // 101 and 102 survive; 103 has no primary row and never appears.
    assert_eq!(detail.height(), 2);
    assert!(run.warnings.is_empty());

    let idx_101 = row_for_appid(detail, 101);
    let idx_102 = row_for_appid(detail, 102);

    let created = detail.column("CREATED_AT").unwrap().datetime().unwrap();
    let completed = detail.column(&run.completed_column).unwrap().datetime().unwrap();
    let matched = detail.column(MATCHED_COLUMN).unwrap().bool().unwrap();
    let hours = detail.column(SLA_HOURS_COLUMN).unwrap().f64().unwrap();
    let categories = detail.column(SLA_CATEGORY_COLUMN).unwrap().str().unwrap();

    // Earliest intake and earliest completion were kept for 101.
    assert_eq!(created.get(idx_101), Some(micros(1, 0, 0)));
    assert_eq!(completed.get(idx_101), Some(micros(1, 0, 45)));
    assert_eq!(matched.get(idx_101), Some(true));
    assert_eq!(hours.get(idx_101), Some(0.75));
    assert_eq!(categories.get(idx_101), Some("≤ 1 Jam"));

    assert_eq!(matched.get(idx_102), Some(false));
    assert_eq!(hours.get(idx_102), None);
    assert_eq!(categories.get(idx_102), Some("No Data"));

    // matched is derived from completion presence on every row.
    for idx in 0..detail.height() {
        assert_eq!(matched.get(idx), Some(completed.get(idx).is_some()));
    }

    // The secondary CABANG landed under the collision suffix.
    let cabang_slik = detail.column("CABANG_SLIK").unwrap().str().unwrap();
    assert_eq!(cabang_slik.get(idx_101), Some("JKT01"));
    assert_eq!(cabang_slik.get(idx_102), None);

    let d = &run.diagnostics;
    assert_eq!(d.master_ids, 3);
    assert_eq!(d.primary_raw_rows, 4);
    assert_eq!(d.primary_in_master_rows, 3);
    assert_eq!(d.primary_after_status_rows, 3);
    assert_eq!(d.primary_join_rows, 2);
    assert_eq!(d.master_ids_without_primary, 1);
    assert_eq!(d.primary_duplicate_ids, vec![101]);
    assert_eq!(d.secondary_raw_rows, 3);
    assert_eq!(d.secondary_join_rows, 1);
    assert_eq!(d.secondary_duplicate_ids, vec![101]);
    assert_eq!(d.matched_rows, 1);
    assert_eq!(d.unmatched_rows, 1);
}

#[test]
fn no_dedup_run_fans_out_matching_rows() {
    let mut cfg = config();
    cfg.dedup = DedupPolicy::None;
    let mut pipeline = SlaPipeline::new(cfg);
    let run = pipeline.run().expect("pipeline run failed");

    // Two primary rows for 101, each matching two secondary rows, plus the
    // single unmatched 102 row.
    assert_eq!(run.detail.height(), 5);
    let ids = run.detail.column("APPID").unwrap().i64().unwrap();
    let count_101 = (0..run.detail.height())
        .filter(|idx| ids.get(*idx) == Some(101))
        .count();
    assert_eq!(count_101, 4);

    assert_eq!(run.diagnostics.matched_rows, 4);
    assert_eq!(run.diagnostics.unmatched_rows, 1);
    assert_eq!(run.diagnostics.primary_join_rows, 3);
    assert_eq!(run.diagnostics.secondary_join_rows, 2);
}

#[test]
fn status_filter_narrows_and_empty_result_warns() {
    let mut cfg = config();
    cfg.status_filter = Some(slareport_core::config::StatusFilter {
        column: "STATUS".to_string(),
        contains_any: vec!["APPROVED".to_string()],
    });
    let mut pipeline = SlaPipeline::new(cfg);
    let run = pipeline.run().expect("pipeline run failed");
    assert_eq!(run.diagnostics.primary_after_status_rows, 3);
    assert!(run.warnings.is_empty());

    let mut cfg = config();
    cfg.status_filter = Some(slareport_core::config::StatusFilter {
        column: "STATUS".to_string(),
        contains_any: vec!["REJECTED".to_string()],
    });
    let mut pipeline = SlaPipeline::new(cfg);
    let run = pipeline.run().expect("pipeline run failed");

    assert_eq!(run.detail.height(), 0);
    assert_eq!(run.warnings.len(), 1);
    let slareport_core::diagnostics::PipelineWarning::EmptyStatusFilter { column, observed } =
        &run.warnings[0];
    assert_eq!(column, "STATUS");
    assert_eq!(observed, &vec!["APPROVED".to_string()]);
}

#[test]
fn missing_master_file_names_the_source() {
    let mut cfg = config();
    cfg.master.path = fixture("does-not-exist.csv");
    let mut pipeline = SlaPipeline::new(cfg);
    let err = pipeline.run().unwrap_err();
    match err {
        PipelineError::MissingInputFile { role, path } => {
            assert_eq!(role.as_str(), "master");
            assert!(path.ends_with("does-not-exist.csv"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_completion_column_is_fatal() {
    let mut cfg = config();
    // Point the secondary at a sheet that has no completion column.
    cfg.secondary = source("prescreening.csv");
    let mut pipeline = SlaPipeline::new(cfg);
    let err = pipeline.run().unwrap_err();
    match err {
        PipelineError::MissingColumn { column, available } => {
            assert_eq!(column, "Timedone Hit SLIK");
            assert!(available.contains(&"CREATED_AT".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn reruns_produce_byte_identical_exports() {
    let mut first = SlaPipeline::new(config());
    let run_a = first.run().expect("first run failed");
    let mut second = SlaPipeline::new(config());
    let run_b = second.run().expect("second run failed");

    assert_eq!(
        report::detail_csv(&run_a, first.config()).unwrap(),
        report::detail_csv(&run_b, second.config()).unwrap()
    );
    assert_eq!(
        report::summary_csv(&run_a, "CABANG").unwrap(),
        report::summary_csv(&run_b, "CABANG").unwrap()
    );

    assert_eq!(
        run_a.diagnostics.as_entries(),
        run_b.diagnostics.as_entries()
    );
}

#[test]
fn summary_covers_only_valid_matched_rows() {
    let mut pipeline = SlaPipeline::new(config());
    let run = pipeline.run().expect("pipeline run failed");

    let summary = report::summary_by_group(&run, "CABANG").unwrap();
    // Only 101 (JAKARTA) is matched with a valid duration.
    assert_eq!(summary.height(), 1);
    assert_eq!(
        summary.column("CABANG").unwrap().str().unwrap().get(0),
        Some("JAKARTA")
    );
    assert_eq!(
        summary.column("Total_Record").unwrap().i64().unwrap().get(0),
        Some(1)
    );
    assert_eq!(
        summary.column("Avg_SLA_Jam").unwrap().f64().unwrap().get(0),
        Some(0.75)
    );
}

#[test]
fn unknown_group_column_fails_before_any_bytes_are_produced() {
    let mut pipeline = SlaPipeline::new(config());
    let run = pipeline.run().expect("pipeline run failed");

    let err = report::summary_csv(&run, "NO_SUCH_COLUMN").unwrap_err();
    match err {
        PipelineError::MissingColumn { column, .. } => {
            assert_eq!(column, "NO_SUCH_COLUMN");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn primary_allowlist_narrows_detail_columns() {
    let mut cfg = config();
    cfg.primary_columns = vec![
        "APPID".to_string(),
        "CREATED_AT".to_string(),
        "CABANG".to_string(),
        "NOT_IN_SHEET".to_string(),
    ];
    let mut pipeline = SlaPipeline::new(cfg);
    let run = pipeline.run().expect("pipeline run failed");

    let names: Vec<String> = run
        .detail
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert!(!names.contains(&"USER_NAM".to_string()));
    assert!(names.contains(&"CABANG".to_string()));
}
