// crates/slareport-core/src/pipeline.rs

use std::collections::BTreeSet;

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::{PipelineConfig, SourceRole, StatusFilter};
use crate::diagnostics::{PipelineDiagnostics, PipelineWarning};
use crate::error::Result;
use crate::join;
use crate::loader::{self, ensure_column, has_column, TableCache, TableSpec};
use crate::master::MasterIdSet;
use crate::sla;

/// Output of one pipeline run: the joined+computed detail table plus the
/// stage counters. Each run is a full recomputation from the three sources.
#[derive(Debug)]
pub struct PipelineRun {
    pub detail: DataFrame,
    pub diagnostics: PipelineDiagnostics,
    pub warnings: Vec<PipelineWarning>,
    /// Name of the completion column in `detail`, after any collision
    /// renaming applied during the join.
    pub completed_column: String,
}

/// Row/column overview of one loaded source, for `inspect`.
#[derive(Debug)]
pub struct TableSummary {
    pub role: SourceRole,
    pub rows: usize,
    pub columns: Vec<String>,
    /// Distinct values of the status column, primary table only.
    pub distinct_status: Vec<String>,
}

pub struct SlaPipeline {
    config: PipelineConfig,
    cache: TableCache,
}

impl SlaPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cache: TableCache::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
    }

    fn master_spec(&self) -> TableSpec {
        TableSpec::default()
    }

    fn primary_spec(&self) -> TableSpec {
        TableSpec {
            id_column: Some(self.config.appid_column.clone()),
            timestamp_columns: vec![self.config.created_at_column.clone()],
            keep_columns: self.config.primary_columns.clone(),
        }
    }

    fn secondary_spec(&self) -> TableSpec {
        let mut timestamp_columns = vec![self.config.completed_at_column.clone()];
        timestamp_columns.extend(self.config.extra_secondary_timestamps.iter().cloned());
        TableSpec {
            id_column: Some(self.config.appid_column.clone()),
            timestamp_columns,
            keep_columns: self.config.secondary_columns.clone(),
        }
    }

    /// Runs the full reconciliation: master filter, status filter, dedup,
    /// left join, SLA computation. Fails fast on missing files/columns; no
    /// partial output is produced.
    pub fn run(&mut self) -> Result<PipelineRun> {
        let config = self.config.clone();
        let appid = config.appid_column.as_str();
        let mut diagnostics = PipelineDiagnostics::default();
        let mut warnings = Vec::new();

        let master_df = loader::load_table(
            SourceRole::Master,
            &config.master,
            &self.master_spec(),
            &mut self.cache,
        )?;
        let master = MasterIdSet::from_column(&master_df, &config.master_id_column)?;
        diagnostics.master_ids = master.len();
        info!(master_ids = master.len(), "master id set loaded");

        let primary_raw = loader::load_table(
            SourceRole::Primary,
            &config.primary,
            &self.primary_spec(),
            &mut self.cache,
        )?;
        ensure_column(&primary_raw, &config.created_at_column)?;
        diagnostics.primary_raw_rows = primary_raw.height();

        let primary_in_master = master.filter_frame(&primary_raw, appid)?;
        diagnostics.primary_in_master_rows = primary_in_master.height();
        diagnostics.master_ids_without_primary = master
            .ids_missing_from(&primary_in_master, appid)?
            .len();

        let primary_filtered = match &config.status_filter {
            Some(filter) => {
                let (filtered, warning) = apply_status_filter(&primary_in_master, filter)?;
                if let Some(warning) = warning {
                    warnings.push(warning);
                }
                filtered
            }
            None => primary_in_master,
        };
        diagnostics.primary_after_status_rows = primary_filtered.height();

        let (_, primary_dups) = join::duplicate_ids(&primary_filtered, appid)?;
        diagnostics.primary_duplicate_ids = primary_dups;

        let primary_base = if config.dedup.dedups_primary() {
            join::keep_earliest(&primary_filtered, appid, &config.created_at_column)?
        } else {
            join::drop_null_ids(&primary_filtered, appid)?
        };
        diagnostics.primary_join_rows = primary_base.height();

        let secondary_raw = loader::load_table(
            SourceRole::Secondary,
            &config.secondary,
            &self.secondary_spec(),
            &mut self.cache,
        )?;
        ensure_column(&secondary_raw, &config.completed_at_column)?;
        diagnostics.secondary_raw_rows = secondary_raw.height();

        let (_, secondary_dups) = join::duplicate_ids(&secondary_raw, appid)?;
        diagnostics.secondary_duplicate_ids = secondary_dups;

        let secondary_base = if config.dedup.dedups_secondary() {
            join::keep_earliest(&secondary_raw, appid, &config.completed_at_column)?
        } else {
            join::drop_null_ids(&secondary_raw, appid)?
        };
        diagnostics.secondary_join_rows = secondary_base.height();

        let joined = join::left_join_on_appid(
            &primary_base,
            &secondary_base,
            appid,
            &config.collision_suffix,
        )?;
        debug!(rows = joined.height(), "join complete");

        // The completion column moves under the collision suffix when the
        // primary table also carries a column of the same name.
        let completed_column = if has_column(&primary_base, &config.completed_at_column) {
            format!(
                "{}_{}",
                config.completed_at_column, config.collision_suffix
            )
        } else {
            config.completed_at_column.clone()
        };

        let detail = sla::apply_sla(
            &joined,
            &config.created_at_column,
            &completed_column,
            config.flag_negative_elapsed,
        )?;

        let matched = detail.column(sla::MATCHED_COLUMN)?.bool()?;
        diagnostics.matched_rows = matched.into_iter().flatten().filter(|m| *m).count();
        diagnostics.unmatched_rows = detail.height() - diagnostics.matched_rows;

        info!(
            rows = detail.height(),
            matched = diagnostics.matched_rows,
            unmatched = diagnostics.unmatched_rows,
            "pipeline run complete"
        );

        Ok(PipelineRun {
            detail,
            diagnostics,
            warnings,
            completed_column,
        })
    }

    /// Loads and normalizes the three sources without computing anything,
    /// reporting shapes and the distinct primary status values.
    pub fn inspect(&mut self) -> Result<Vec<TableSummary>> {
        let config = self.config.clone();
        let mut summaries = Vec::with_capacity(3);

        let master = loader::load_table(
            SourceRole::Master,
            &config.master,
            &self.master_spec(),
            &mut self.cache,
        )?;
        summaries.push(table_summary(SourceRole::Master, &master, None));

        let primary = loader::load_table(
            SourceRole::Primary,
            &config.primary,
            &self.primary_spec(),
            &mut self.cache,
        )?;
        let status_column = config
            .status_filter
            .as_ref()
            .map(|filter| filter.column.clone())
            .or_else(|| has_column(&primary, "STATUS").then(|| "STATUS".to_string()));
        summaries.push(table_summary(
            SourceRole::Primary,
            &primary,
            status_column.as_deref(),
        ));

        let secondary = loader::load_table(
            SourceRole::Secondary,
            &config.secondary,
            &self.secondary_spec(),
            &mut self.cache,
        )?;
        summaries.push(table_summary(SourceRole::Secondary, &secondary, None));

        Ok(summaries)
    }
}

fn table_summary(role: SourceRole, df: &DataFrame, status_column: Option<&str>) -> TableSummary {
    let distinct_status = status_column
        .filter(|name| has_column(df, name))
        .map(|name| distinct_strings(df, name).unwrap_or_default())
        .unwrap_or_default();
    TableSummary {
        role,
        rows: df.height(),
        columns: df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
        distinct_status,
    }
}

fn distinct_strings(df: &DataFrame, column: &str) -> Result<Vec<String>> {
    let values = df.column(column)?.str()?;
    let distinct: BTreeSet<String> = values
        .into_iter()
        .flatten()
        .map(|value| value.to_string())
        .collect();
    Ok(distinct.into_iter().collect())
}

/// Keeps rows whose status text contains any of the configured substrings
/// (case-insensitive). An empty result is a warning, not an error.
fn apply_status_filter(
    df: &DataFrame,
    filter: &StatusFilter,
) -> Result<(DataFrame, Option<PipelineWarning>)> {
    ensure_column(df, &filter.column)?;
    let statuses = df.column(&filter.column)?.str()?;
    let patterns: Vec<String> = filter
        .contains_any
        .iter()
        .map(|p| p.to_uppercase())
        .collect();

    let flags: Vec<bool> = statuses
        .into_iter()
        .map(|status| {
            status.is_some_and(|value| {
                let upper = value.to_uppercase();
                patterns.iter().any(|pattern| upper.contains(pattern))
            })
        })
        .collect();
    let mask = BooleanChunked::from_slice("status_match".into(), &flags);
    let filtered = df.filter(&mask)?;

    let warning = if filtered.height() == 0 && df.height() > 0 {
        Some(PipelineWarning::EmptyStatusFilter {
            column: filter.column.clone(),
            observed: distinct_strings(df, &filter.column)?,
        })
    } else {
        None
    };
    Ok((filtered, warning))
}
