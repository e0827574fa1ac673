// crates/slareport-core/src/sla.rs

use std::fmt;

use polars::prelude::*;

use crate::error::Result;
use crate::loader::ensure_column;

pub const MATCHED_COLUMN: &str = "Matched";
pub const SLA_HOURS_COLUMN: &str = "SLA_Hours";
pub const SLA_MINUTES_COLUMN: &str = "SLA_Minutes";
pub const SLA_CATEGORY_COLUMN: &str = "SLA_Category";

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// Service-level buckets, upper-inclusive on each boundary. "Jam" is the
/// label the downstream reports use for hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlaCategory {
    WithinOneHour,
    OneToThreeHours,
    ThreeToSixHours,
    SixToTwentyFourHours,
    OverTwentyFourHours,
    Invalid,
    NoData,
}

impl SlaCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlaCategory::WithinOneHour => "≤ 1 Jam",
            SlaCategory::OneToThreeHours => "1–3 Jam",
            SlaCategory::ThreeToSixHours => "3–6 Jam",
            SlaCategory::SixToTwentyFourHours => "6–24 Jam",
            SlaCategory::OverTwentyFourHours => "> 24 Jam",
            SlaCategory::Invalid => "Invalid",
            SlaCategory::NoData => "No Data",
        }
    }

    /// Display order for breakdowns.
    pub const ORDER: [SlaCategory; 7] = [
        SlaCategory::WithinOneHour,
        SlaCategory::OneToThreeHours,
        SlaCategory::ThreeToSixHours,
        SlaCategory::SixToTwentyFourHours,
        SlaCategory::OverTwentyFourHours,
        SlaCategory::Invalid,
        SlaCategory::NoData,
    ];
}

impl fmt::Display for SlaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Buckets an elapsed duration. Negative hours fall into "≤ 1 Jam" unless
/// `flag_negative_elapsed` routes the data-quality artifact to "Invalid".
pub fn categorize(hours: Option<f64>, flag_negative_elapsed: bool) -> SlaCategory {
    match hours {
        None => SlaCategory::NoData,
        Some(h) if h < 0.0 && flag_negative_elapsed => SlaCategory::Invalid,
        Some(h) if h <= 1.0 => SlaCategory::WithinOneHour,
        Some(h) if h <= 3.0 => SlaCategory::OneToThreeHours,
        Some(h) if h <= 6.0 => SlaCategory::ThreeToSixHours,
        Some(h) if h <= 24.0 => SlaCategory::SixToTwentyFourHours,
        Some(_) => SlaCategory::OverTwentyFourHours,
    }
}

/// Half-to-even rounding, matching how the upstream reports round their
/// exported figures. Ties only trigger on exactly representable halves.
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    let floor = scaled.floor();
    let rounded = if scaled - floor == 0.5 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / factor
}

/// Appends the computed columns to the joined frame: `Matched`, `SLA_Hours`
/// (2 dp), `SLA_Minutes` (1 dp, derived from the same unrounded duration),
/// and `SLA_Category`. Null timestamps degrade to null hours / "No Data".
pub fn apply_sla(
    df: &DataFrame,
    created_column: &str,
    completed_column: &str,
    flag_negative_elapsed: bool,
) -> Result<DataFrame> {
    ensure_column(df, created_column)?;
    ensure_column(df, completed_column)?;

    let len = df.height();
    let created = df.column(created_column)?.datetime()?;
    let completed = df.column(completed_column)?.datetime()?;

    let mut matched = Vec::with_capacity(len);
    let mut hours: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut minutes: Vec<Option<f64>> = Vec::with_capacity(len);
    let mut categories: Vec<&'static str> = Vec::with_capacity(len);

    for idx in 0..len {
        let done = completed.get(idx);
        matched.push(done.is_some());

        let raw_hours = match (created.get(idx), done) {
            (Some(start), Some(end)) => Some((end - start) as f64 / MICROS_PER_HOUR),
            _ => None,
        };

        let rounded_hours = raw_hours.map(|h| round_to(h, 2));
        hours.push(rounded_hours);
        minutes.push(raw_hours.map(|h| round_to(h * 60.0, 1)));
        categories.push(categorize(rounded_hours, flag_negative_elapsed).as_str());
    }

    let mut output = df.clone();
    output.hstack_mut(&mut [
        Series::new(MATCHED_COLUMN.into(), matched).into(),
        Series::new(SLA_HOURS_COLUMN.into(), hours).into(),
        Series::new(SLA_MINUTES_COLUMN.into(), minutes).into(),
        Series::new(SLA_CATEGORY_COLUMN.into(), categories).into(),
    ])?;
    Ok(output)
}
