// crates/slareport-core/src/diagnostics.rs

use std::fmt;

use serde::Serialize;

/// Row counts observed at each pipeline stage, for transparency and audit.
/// Pure data; filled in by the pipeline as stages complete.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineDiagnostics {
    /// Distinct ids in the master extract.
    pub master_ids: usize,
    /// Primary rows as loaded, before any filtering.
    pub primary_raw_rows: usize,
    /// Primary rows whose id belongs to the master set.
    pub primary_in_master_rows: usize,
    /// Primary rows surviving the optional status filter.
    pub primary_after_status_rows: usize,
    /// Primary rows feeding the join (post-dedup under a dedup policy).
    pub primary_join_rows: usize,
    /// Master ids with no primary row at all.
    pub master_ids_without_primary: usize,
    /// Distinct primary ids that appeared on more than one row.
    pub primary_duplicate_ids: Vec<i64>,
    /// Secondary rows as loaded.
    pub secondary_raw_rows: usize,
    /// Secondary rows feeding the join (post-dedup under a dedup policy).
    pub secondary_join_rows: usize,
    /// Distinct secondary ids that appeared on more than one row.
    pub secondary_duplicate_ids: Vec<i64>,
    /// Output rows with a completion match.
    pub matched_rows: usize,
    /// Output rows with no completion match.
    pub unmatched_rows: usize,
}

impl PipelineDiagnostics {
    /// Flat stage-name → count view for renderers.
    pub fn as_entries(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("master_ids", self.master_ids as i64),
            ("primary_raw_rows", self.primary_raw_rows as i64),
            ("primary_in_master_rows", self.primary_in_master_rows as i64),
            (
                "primary_after_status_rows",
                self.primary_after_status_rows as i64,
            ),
            ("primary_join_rows", self.primary_join_rows as i64),
            (
                "master_ids_without_primary",
                self.master_ids_without_primary as i64,
            ),
            (
                "primary_duplicate_ids",
                self.primary_duplicate_ids.len() as i64,
            ),
            ("secondary_raw_rows", self.secondary_raw_rows as i64),
            ("secondary_join_rows", self.secondary_join_rows as i64),
            (
                "secondary_duplicate_ids",
                self.secondary_duplicate_ids.len() as i64,
            ),
            ("matched_rows", self.matched_rows as i64),
            ("unmatched_rows", self.unmatched_rows as i64),
        ]
    }
}

/// Non-fatal findings surfaced alongside the run.
#[derive(Debug, Clone, Serialize)]
pub enum PipelineWarning {
    /// The status filter removed every row. Carries the distinct raw values
    /// observed so a typo'd allowlist is easy to spot.
    EmptyStatusFilter {
        column: String,
        observed: Vec<String>,
    },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::EmptyStatusFilter { column, observed } => write!(
                f,
                "status filter on '{column}' matched no rows; observed values: {observed:?}"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expose_every_stage_once() {
        let diagnostics = PipelineDiagnostics {
            master_ids: 3,
            matched_rows: 1,
            primary_duplicate_ids: vec![101, 102],
            ..Default::default()
        };
        let entries = diagnostics.as_entries();

        assert_eq!(entries.len(), 12);
        assert!(entries.contains(&("master_ids", 3)));
        assert!(entries.contains(&("primary_duplicate_ids", 2)));
        assert!(entries.contains(&("matched_rows", 1)));
    }
}
