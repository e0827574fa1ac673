// crates/slareport-core/src/master.rs

use std::collections::BTreeSet;

use polars::prelude::*;

use crate::error::Result;
use crate::loader::ensure_column;

/// The universe of application ids in scope for a run. Derived from one
/// column of the master extract; immutable once built.
#[derive(Debug, Clone)]
pub struct MasterIdSet {
    ids: BTreeSet<i64>,
}

impl MasterIdSet {
    /// Collects the successfully coerced, non-null ids from the named
    /// column. Duplicates collapse naturally.
    pub fn from_column(df: &DataFrame, column: &str) -> Result<Self> {
        ensure_column(df, column)?;
        let coerced = df
            .column(column)?
            .cast(&DataType::Float64)?
            .cast(&DataType::Int64)?;
        let ids: BTreeSet<i64> = coerced.i64()?.into_iter().flatten().collect();
        Ok(Self { ids })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.ids.iter().copied()
    }

    /// Keeps only rows whose id column value belongs to this set. Null ids
    /// never match.
    pub fn filter_frame(&self, df: &DataFrame, id_column: &str) -> Result<DataFrame> {
        ensure_column(df, id_column)?;
        let ids = df.column(id_column)?.i64()?;
        let flags: Vec<bool> = ids
            .into_iter()
            .map(|id| id.is_some_and(|value| self.contains(value)))
            .collect();
        let mask = BooleanChunked::from_slice("in_master".into(), &flags);
        Ok(df.filter(&mask)?)
    }

    /// Ids in this set with no row in the given frame. Reported as the
    /// "not found in primary" diagnostic.
    pub fn ids_missing_from(&self, df: &DataFrame, id_column: &str) -> Result<Vec<i64>> {
        ensure_column(df, id_column)?;
        let present: BTreeSet<i64> = df.column(id_column)?.i64()?.into_iter().flatten().collect();
        Ok(self
            .ids
            .difference(&present)
            .copied()
            .collect())
    }
}
