// crates/slareport-core/src/join.rs

use std::collections::{BTreeSet, HashMap, HashSet};

use polars::prelude::*;
use serde::Deserialize;

use crate::error::Result;
use crate::loader::{ensure_column, has_column};

/// How rows sharing one application id collapse before the join.
///
/// The reporting variants in production disagreed on this: the main report
/// deduplicated both sides (earliest intake, earliest completion) while the
/// audit view joined everything and exposed duplicates instead. Both are
/// configurations of the same engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    None,
    EarliestByPrimary,
    EarliestBySecondary,
    #[default]
    EarliestByBoth,
}

impl DedupPolicy {
    pub fn dedups_primary(&self) -> bool {
        matches!(self, DedupPolicy::EarliestByPrimary | DedupPolicy::EarliestByBoth)
    }

    pub fn dedups_secondary(&self) -> bool {
        matches!(self, DedupPolicy::EarliestBySecondary | DedupPolicy::EarliestByBoth)
    }
}

/// Drops rows whose id is null. Unparsable ids are excluded from every join.
pub fn drop_null_ids(df: &DataFrame, id_column: &str) -> Result<DataFrame> {
    ensure_column(df, id_column)?;
    let ids = df.column(id_column)?.i64()?;
    let flags: Vec<bool> = ids.into_iter().map(|id| id.is_some()).collect();
    let mask = BooleanChunked::from_slice("non_null_id".into(), &flags);
    Ok(df.filter(&mask)?)
}

/// Sorts ascending by `sort_column` (nulls last) and keeps the first row per
/// id, so the representative row carries the smallest value. Null-id rows
/// are dropped.
pub fn keep_earliest(df: &DataFrame, id_column: &str, sort_column: &str) -> Result<DataFrame> {
    ensure_column(df, id_column)?;
    ensure_column(df, sort_column)?;

    let sorted = df
        .clone()
        .lazy()
        .sort(
            [sort_column],
            SortMultipleOptions::default()
                .with_nulls_last(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let ids = sorted.column(id_column)?.i64()?;
    let mut seen: HashSet<i64> = HashSet::new();
    let mut flags = Vec::with_capacity(sorted.height());
    for idx in 0..sorted.height() {
        let keep = match ids.get(idx) {
            Some(id) => seen.insert(id),
            None => false,
        };
        flags.push(keep);
    }
    let mask = BooleanChunked::from_slice("first_per_id".into(), &flags);
    Ok(sorted.filter(&mask)?)
}

/// Rows beyond the first per id, plus the distinct ids that repeat.
pub fn duplicate_ids(df: &DataFrame, id_column: &str) -> Result<(usize, Vec<i64>)> {
    ensure_column(df, id_column)?;
    let ids = df.column(id_column)?.i64()?;

    let mut counts: HashMap<i64, usize> = HashMap::new();
    for id in ids.into_iter().flatten() {
        *counts.entry(id).or_insert(0) += 1;
    }

    let mut extra_rows = 0usize;
    let mut duplicated: BTreeSet<i64> = BTreeSet::new();
    for (id, count) in counts {
        if count > 1 {
            extra_rows += count - 1;
            duplicated.insert(id);
        }
    }
    Ok((extra_rows, duplicated.into_iter().collect()))
}

/// Left-outer join of primary with secondary on the id column. Secondary
/// columns whose names collide with the primary table are renamed with the
/// given suffix first; nothing is silently overwritten.
pub fn left_join_on_appid(
    primary: &DataFrame,
    secondary: &DataFrame,
    id_column: &str,
    suffix: &str,
) -> Result<DataFrame> {
    ensure_column(primary, id_column)?;
    ensure_column(secondary, id_column)?;

    let secondary = rename_collisions(primary, secondary, id_column, suffix)?;

    let joined = primary
        .clone()
        .lazy()
        .join(
            secondary.lazy(),
            [col(id_column)],
            [col(id_column)],
            JoinArgs::new(JoinType::Left),
        )
        .collect()?;
    Ok(joined)
}

fn rename_collisions(
    primary: &DataFrame,
    secondary: &DataFrame,
    id_column: &str,
    suffix: &str,
) -> Result<DataFrame> {
    let collisions: Vec<String> = secondary
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .filter(|name| name != id_column && has_column(primary, name))
        .collect();

    let mut renamed = secondary.clone();
    for name in collisions {
        let replacement = format!("{name}_{suffix}");
        renamed.rename(&name, replacement.as_str().into())?;
    }
    Ok(renamed)
}
