// crates/slareport-core/src/report.rs

use std::collections::BTreeMap;

use polars::df;
use polars::prelude::*;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::loader::{ensure_column, has_column};
use crate::pipeline::PipelineRun;
use crate::sla::{
    self, MATCHED_COLUMN, SLA_CATEGORY_COLUMN, SLA_HOURS_COLUMN, SLA_MINUTES_COLUMN,
};

/// Descriptive columns the detail export carries when present, between the
/// id/timestamps and the computed columns.
const DETAIL_DESCRIPTIVE_COLUMNS: [&str; 8] = [
    "USER_NAM",
    "CABANG",
    "PRODUK",
    "STATUS",
    "MID",
    "EngineScoring",
    "StatusMa",
    "Flag",
];

/// One row per joined record, narrowed to the export column selection.
/// Listed-but-absent columns are skipped, same as the loader allowlist.
pub fn detail_frame(run: &PipelineRun, config: &PipelineConfig) -> Result<DataFrame> {
    let mut wanted: Vec<String> = vec![
        config.appid_column.clone(),
        config.created_at_column.clone(),
    ];
    wanted.extend(DETAIL_DESCRIPTIVE_COLUMNS.iter().map(|s| s.to_string()));
    wanted.push(run.completed_column.clone());
    wanted.extend(
        [
            SLA_HOURS_COLUMN,
            SLA_MINUTES_COLUMN,
            SLA_CATEGORY_COLUMN,
            MATCHED_COLUMN,
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    let present: Vec<&str> = wanted
        .iter()
        .map(|name| name.as_str())
        .filter(|name| has_column(&run.detail, name))
        .collect();
    Ok(run.detail.select(present)?)
}

/// Rows usable for aggregate statistics: matched, with a non-null,
/// non-negative elapsed duration.
pub fn valid_rows(run: &PipelineRun) -> Result<DataFrame> {
    let matched = run.detail.column(MATCHED_COLUMN)?.bool()?;
    let hours = run.detail.column(SLA_HOURS_COLUMN)?.f64()?;

    let mut flags = Vec::with_capacity(run.detail.height());
    for idx in 0..run.detail.height() {
        let ok = matched.get(idx).unwrap_or(false)
            && hours.get(idx).is_some_and(|value| value >= 0.0);
        flags.push(ok);
    }
    let mask = BooleanChunked::from_slice("valid_sla".into(), &flags);
    Ok(run.detail.filter(&mask)?)
}

/// Category counts over the full detail table, in display order.
pub fn category_counts(run: &PipelineRun) -> Result<Vec<(&'static str, usize)>> {
    let categories = run.detail.column(SLA_CATEGORY_COLUMN)?.str()?;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in categories.into_iter().flatten() {
        *counts.entry(value).or_insert(0) += 1;
    }
    Ok(sla::SlaCategory::ORDER
        .iter()
        .map(|category| {
            let label = category.as_str();
            (label, counts.get(label).copied().unwrap_or(0))
        })
        .collect())
}

struct GroupStats {
    key: String,
    count: usize,
    mean: f64,
    median: f64,
    min: f64,
    max: f64,
    within_one: usize,
}

/// Per-group SLA statistics over the valid rows, sorted by mean hours
/// descending (ties broken by key for stable exports).
pub fn summary_by_group(run: &PipelineRun, group_column: &str) -> Result<DataFrame> {
    let valid = valid_rows(run)?;
    ensure_column(&valid, group_column)?;

    let keys = valid.column(group_column)?.str()?;
    let hours = valid.column(SLA_HOURS_COLUMN)?.f64()?;

    let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for idx in 0..valid.height() {
        if let (Some(key), Some(value)) = (keys.get(idx), hours.get(idx)) {
            groups.entry(key.to_string()).or_default().push(value);
        }
    }

    let mut stats: Vec<GroupStats> = groups
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            let count = values.len();
            let sum: f64 = values.iter().sum();
            let within_one = values.iter().filter(|v| **v <= 1.0).count();
            GroupStats {
                key,
                count,
                mean: round2(sum / count as f64),
                median: round2(median_of_sorted(&values)),
                min: round2(values[0]),
                max: round2(values[count - 1]),
                within_one,
            }
        })
        .collect();

    stats.sort_by(|a, b| {
        b.mean
            .total_cmp(&a.mean)
            .then_with(|| a.key.cmp(&b.key))
    });

    let keys: Vec<String> = stats.iter().map(|s| s.key.clone()).collect();
    let counts: Vec<i64> = stats.iter().map(|s| s.count as i64).collect();
    let means: Vec<f64> = stats.iter().map(|s| s.mean).collect();
    let medians: Vec<f64> = stats.iter().map(|s| s.median).collect();
    let mins: Vec<f64> = stats.iter().map(|s| s.min).collect();
    let maxs: Vec<f64> = stats.iter().map(|s| s.max).collect();
    let within_one: Vec<i64> = stats.iter().map(|s| s.within_one as i64).collect();
    let pct_within_one: Vec<f64> = stats
        .iter()
        .map(|s| round1(s.within_one as f64 / s.count as f64 * 100.0))
        .collect();

    let df = df![
        group_column => keys,
        "Total_Record" => counts,
        "Avg_SLA_Jam" => means,
        "Median_SLA_Jam" => medians,
        "Min_SLA_Jam" => mins,
        "Max_SLA_Jam" => maxs,
        "SLA_≤1Jam" => within_one,
        "%_≤1Jam" => pct_within_one,
    ]?;
    Ok(df)
}

/// The detail export as CSV bytes.
pub fn detail_csv(run: &PipelineRun, config: &PipelineConfig) -> Result<Vec<u8>> {
    write_csv(&mut detail_frame(run, config)?)
}

/// The per-group summary export as CSV bytes.
pub fn summary_csv(run: &PipelineRun, group_column: &str) -> Result<Vec<u8>> {
    write_csv(&mut summary_by_group(run, group_column)?)
}

/// Serializes a frame as delimited text. Output is deterministic for
/// unchanged input frames.
pub fn write_csv(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .finish(df)?;
    Ok(buffer)
}

fn median_of_sorted(values: &[f64]) -> f64 {
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        (values[mid - 1] + values[mid]) / 2.0
    }
}

fn round2(value: f64) -> f64 {
    sla::round_to(value, 2)
}

fn round1(value: f64) -> f64 {
    sla::round_to(value, 1)
}
