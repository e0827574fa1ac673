// crates/slareport-core/src/timestamps.rs

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// One candidate reading of a raw timestamp column.
///
/// The upstream extracts mix export styles within a single file set, so a
/// column is interpreted by trying each candidate in order and committing to
/// the first one that parses at least one value. The meridiem variants accept
/// a trailing AM/PM marker but keep the 24-hour field authoritative, matching
/// how the exports were produced.
#[derive(Debug, Clone, Copy)]
enum Interpretation {
    FreeForm,
    Format { fmt: &'static str, meridiem: bool },
}

const INTERPRETATIONS: [Interpretation; 5] = [
    Interpretation::FreeForm,
    Interpretation::Format {
        fmt: "%Y-%m-%d %H:%M:%S%.f",
        meridiem: true,
    },
    Interpretation::Format {
        fmt: "%Y-%m-%d %H:%M:%S%.f",
        meridiem: false,
    },
    Interpretation::Format {
        fmt: "%Y-%m-%d %H:%M:%S",
        meridiem: true,
    },
    Interpretation::Format {
        fmt: "%Y-%m-%d %H:%M:%S",
        meridiem: false,
    },
];

/// Parses a whole column of raw timestamp strings into nullable instants,
/// preserving length and order. Individual failures under the selected
/// interpretation become `None`; this never errors.
pub fn parse_timestamp_column(values: &[Option<&str>]) -> Vec<Option<NaiveDateTime>> {
    for interpretation in INTERPRETATIONS {
        let parsed: Vec<Option<NaiveDateTime>> = values
            .iter()
            .map(|value| value.and_then(|raw| apply(interpretation, raw)))
            .collect();
        if parsed.iter().any(|v| v.is_some()) {
            return parsed;
        }
    }

    // Nothing parsed under any interpretation: best-effort free-form pass
    // whose failures stay null. Downstream treats null as "no data".
    values
        .iter()
        .map(|value| value.and_then(parse_free_form))
        .collect()
}

fn apply(interpretation: Interpretation, raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match interpretation {
        Interpretation::FreeForm => parse_free_form(trimmed),
        Interpretation::Format { fmt, meridiem } => {
            let text = if meridiem {
                strip_meridiem(trimmed)?
            } else {
                trimmed
            };
            NaiveDateTime::parse_from_str(text, fmt).ok()
        }
    }
}

fn strip_meridiem(text: &str) -> Option<&str> {
    let lower = text.to_ascii_lowercase();
    if lower.ends_with(" am") || lower.ends_with(" pm") {
        Some(text[..text.len() - 3].trim_end())
    } else {
        None
    }
}

/// Free-form parsing accepts a trailing AM/PM marker on any layout, so a
/// column mixing marked and unmarked values resolves under one pass.
fn parse_free_form(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(base) = strip_meridiem(trimmed) {
        if let Some(parsed) = parse_known_layouts(base) {
            return Some(parsed);
        }
    }
    parse_known_layouts(trimmed)
}

fn parse_known_layouts(trimmed: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%d/%m/%Y %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d/%m/%Y") {
        return date.and_hms_opt(0, 0, 0);
    }
    None
}

pub fn naive_to_micros(value: NaiveDateTime) -> i64 {
    let dt_utc = value.and_utc();
    dt_utc.timestamp() * 1_000_000 + i64::from(dt_utc.timestamp_subsec_nanos() / 1_000)
}

/// Builds a `Datetime(Microseconds)` series from parsed values.
pub fn datetime_series(name: &str, parsed: &[Option<NaiveDateTime>]) -> PolarsResult<Series> {
    let micros: Vec<Option<i64>> = parsed
        .iter()
        .map(|value| value.map(naive_to_micros))
        .collect();
    Series::new(name.into(), micros).cast(&DataType::Datetime(TimeUnit::Microseconds, None))
}
