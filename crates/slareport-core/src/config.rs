// crates/slareport-core/src/config.rs

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Result;
use crate::join::DedupPolicy;

/// Which of the three configured extracts a table plays in the pipeline.
/// Mostly used to make file-level errors name the offending source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    Master,
    Primary,
    Secondary,
}

impl SourceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::Master => "master",
            SourceRole::Primary => "primary",
            SourceRole::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file + sheet reference. The sheet name is ignored for `.csv` inputs.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSource {
    pub path: PathBuf,
    #[serde(default = "default_sheet")]
    pub sheet: String,
}

/// Optional substring allowlist on a primary-table text column, e.g. keep
/// only rows whose STATUS contains "APPROVED" or "DENIED".
#[derive(Debug, Clone, Deserialize)]
pub struct StatusFilter {
    pub column: String,
    pub contains_any: Vec<String>,
}

/// Everything the pipeline needs, passed in explicitly. Field defaults
/// mirror the extract layout this tool was built around: an ESCORE master
/// list, a One Me pre-screening sheet, and a SLIK completion log.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub master: TableSource,
    pub primary: TableSource,
    pub secondary: TableSource,

    #[serde(default = "default_master_id_column")]
    pub master_id_column: String,
    #[serde(default = "default_appid_column")]
    pub appid_column: String,
    #[serde(default = "default_created_at_column")]
    pub created_at_column: String,
    #[serde(default = "default_completed_at_column")]
    pub completed_at_column: String,
    /// Secondary timestamp columns parsed in addition to the completion one.
    #[serde(default = "default_extra_secondary_timestamps")]
    pub extra_secondary_timestamps: Vec<String>,

    /// Column allowlists. Listed-but-absent columns are silently omitted;
    /// an empty list keeps every column.
    #[serde(default = "default_primary_columns")]
    pub primary_columns: Vec<String>,
    #[serde(default = "default_secondary_columns")]
    pub secondary_columns: Vec<String>,

    /// Suffix appended to secondary columns whose names collide with the
    /// primary table before the join.
    #[serde(default = "default_collision_suffix")]
    pub collision_suffix: String,

    #[serde(default)]
    pub dedup: DedupPolicy,
    #[serde(default)]
    pub status_filter: Option<StatusFilter>,

    /// When set, negative elapsed hours (completion recorded before intake)
    /// get their own "Invalid" category instead of falling into "≤ 1 Jam".
    #[serde(default)]
    pub flag_negative_elapsed: bool,
}

impl PipelineConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&raw)?;
        Ok(config)
    }
}

fn default_sheet() -> String {
    "Sheet1".to_string()
}

fn default_master_id_column() -> String {
    "APPID_ONEME_PRESCREEN".to_string()
}

fn default_appid_column() -> String {
    "APPID".to_string()
}

fn default_created_at_column() -> String {
    "CREATED_AT".to_string()
}

fn default_completed_at_column() -> String {
    "Timedone Hit SLIK".to_string()
}

fn default_extra_secondary_timestamps() -> Vec<String> {
    vec!["Tanggal Hit SLIK".to_string()]
}

fn default_collision_suffix() -> String {
    "SLIK".to_string()
}

pub const DEFAULT_PRIMARY_COLUMNS: [&str; 15] = [
    "APPID",
    "APPID ESCORE",
    "NIP_USER",
    "USER_NAM",
    "STATUS",
    "CREATED_AT",
    "REASON",
    "CABANG",
    "PRODUK",
    "NIP_CMO",
    "NAMA_COM",
    "PisahHarta",
    "namadealer",
    "FACT_HISTORICAL_ONE_ME.jenis_cluster",
    "sales_type",
];

pub const DEFAULT_SECONDARY_COLUMNS: [&str; 15] = [
    "APPID",
    "MID",
    "CABANG",
    "NIK",
    "Product",
    "EngineScoring",
    "MOName",
    "HitBiroKredit",
    "HitBiroKreditKonsumen",
    "Tanggal Hit SLIK",
    "Timedone Hit SLIK",
    "Flag",
    "DataEntryProced",
    "StatusMa",
    "MaritalStatus",
];

fn default_primary_columns() -> Vec<String> {
    DEFAULT_PRIMARY_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_secondary_columns() -> Vec<String> {
    DEFAULT_SECONDARY_COLUMNS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_fills_defaults() {
        let raw = r#"
            [master]
            path = "escore.xlsx"

            [primary]
            path = "oneme.xlsx"
            sheet = "all raw"

            [secondary]
            path = "slik.csv"
        "#;
        let config: PipelineConfig = toml::from_str(raw).expect("config parse failed");

        assert_eq!(config.master.sheet, "Sheet1");
        assert_eq!(config.primary.sheet, "all raw");
        assert_eq!(config.master_id_column, "APPID_ONEME_PRESCREEN");
        assert_eq!(config.appid_column, "APPID");
        assert_eq!(config.completed_at_column, "Timedone Hit SLIK");
        assert_eq!(config.collision_suffix, "SLIK");
        assert_eq!(config.dedup, DedupPolicy::EarliestByBoth);
        assert!(config.status_filter.is_none());
        assert!(!config.flag_negative_elapsed);
        assert_eq!(config.primary_columns.len(), 15);
    }

    #[test]
    fn dedup_policy_parses_from_snake_case() {
        let raw = r#"
            dedup = "earliest_by_secondary"

            [master]
            path = "escore.xlsx"

            [primary]
            path = "oneme.xlsx"

            [secondary]
            path = "slik.csv"
        "#;
        let config: PipelineConfig = toml::from_str(raw).expect("config parse failed");
        assert_eq!(config.dedup, DedupPolicy::EarliestBySecondary);
    }
}
