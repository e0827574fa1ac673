// crates/slareport-core/src/loader.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use tracing::debug;

use crate::config::{SourceRole, TableSource};
use crate::error::{PipelineError, Result};
use crate::timestamps;

/// How a loaded sheet gets normalized: which column carries the application
/// id, which columns hold timestamps, and the optional column allowlist.
#[derive(Debug, Clone, Default)]
pub struct TableSpec {
    pub id_column: Option<String>,
    pub timestamp_columns: Vec<String>,
    /// Empty keeps every column. Listed-but-absent columns are omitted.
    pub keep_columns: Vec<String>,
}

/// Read-through memo for loaded tables, keyed by (path, sheet). A hit
/// returns the normalized frame as stored; a miss loads and stores it.
#[derive(Debug, Default)]
pub struct TableCache {
    entries: HashMap<(PathBuf, String), DataFrame>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, key: &(PathBuf, String)) -> Option<DataFrame> {
        self.entries.get(key).cloned()
    }

    pub fn invalidate(&mut self, path: &Path, sheet: &str) {
        self.entries.remove(&(path.to_path_buf(), sheet.to_string()));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Loads one extract into a normalized DataFrame: trimmed column names, the
/// id column coerced to Int64 (unparsable values become null), timestamp
/// columns parsed to `Datetime(Microseconds)`, and the frame narrowed to the
/// allowlist when one is configured.
pub fn load_table(
    role: SourceRole,
    source: &TableSource,
    spec: &TableSpec,
    cache: &mut TableCache,
) -> Result<DataFrame> {
    let key = (source.path.clone(), source.sheet.clone());
    if let Some(df) = cache.get(&key) {
        debug!(role = %role, path = %source.path.display(), "table cache hit");
        return Ok(df);
    }

    if !source.path.exists() {
        return Err(PipelineError::MissingInputFile {
            role,
            path: source.path.clone(),
        });
    }

    let raw = read_raw(source)?;
    debug!(
        role = %role,
        path = %source.path.display(),
        rows = raw.height(),
        "loaded raw table"
    );
    let df = normalize(raw, spec)?;
    cache.entries.insert(key, df.clone());
    Ok(df)
}

fn read_raw(source: &TableSource) -> Result<DataFrame> {
    let is_csv = source
        .path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        read_csv(&source.path)
    } else {
        read_sheet(&source.path, &source.sheet)
    }
}

/// Everything comes in as strings; numeric/timestamp coercion happens in
/// `normalize` so CSV and spreadsheet inputs go through the same path.
fn read_csv(path: &Path) -> Result<DataFrame> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn read_sheet(path: &Path, sheet: &str) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range(sheet)
        .map_err(|err| PipelineError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;

    let mut rows = range.rows();
    let header_row = match rows.next() {
        Some(row) => row,
        None => return Ok(DataFrame::empty()),
    };

    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| {
            let name = cell_to_string(cell).unwrap_or_default();
            if name.is_empty() {
                format!("column_{idx}")
            } else {
                name
            }
        })
        .collect();

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (idx, column) in columns.iter_mut().enumerate() {
            column.push(row.get(idx).and_then(cell_to_string));
        }
    }

    let series: Vec<Column> = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name.as_str().into(), values).into())
        .collect();

    Ok(DataFrame::new(series)?)
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                Some(format!("{}", *f as i64))
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|naive| naive.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        Data::Error(_) => None,
    }
}

fn normalize(mut df: DataFrame, spec: &TableSpec) -> Result<DataFrame> {
    let trimmed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.as_str().trim().to_string())
        .collect();
    df.set_column_names(trimmed.iter().map(|s| s.as_str()))?;

    if let Some(id_column) = &spec.id_column {
        coerce_id_column(&mut df, id_column)?;
    }

    for name in &spec.timestamp_columns {
        if !has_column(&df, name) {
            continue;
        }
        let series = {
            let column = df.column(name)?;
            if !matches!(column.dtype(), DataType::String) {
                continue;
            }
            let values: Vec<Option<&str>> = column.str()?.into_iter().collect();
            let parsed = timestamps::parse_timestamp_column(&values);
            timestamps::datetime_series(name, &parsed)?
        };
        df.with_column(series)?;
    }

    if !spec.keep_columns.is_empty() {
        let keep: Vec<&str> = spec
            .keep_columns
            .iter()
            .map(|s| s.as_str())
            .filter(|name| has_column(&df, name))
            .collect();
        df = df.select(keep)?;
    }

    Ok(df)
}

/// Int64 coercion via Float64 so values exported as "12345.0" still land on
/// the integer id they represent.
fn coerce_id_column(df: &mut DataFrame, name: &str) -> Result<()> {
    ensure_column(df, name)?;
    let coerced = df
        .column(name)?
        .cast(&DataType::Float64)?
        .cast(&DataType::Int64)?;
    df.with_column(coerced.take_materialized_series().with_name(name.into()))?;
    Ok(())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names()
        .iter()
        .any(|column| column.as_str() == name)
}

pub fn ensure_column(df: &DataFrame, column: &str) -> Result<()> {
    if has_column(df, column) {
        return Ok(());
    }
    Err(PipelineError::MissingColumn {
        column: column.to_string(),
        available: df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
    })
}
