//! Bulk maintenance over every table.

use crate::schema::TABLES;
use crate::{Store, StoreError};
use rusqlite::Connection;

/// Row count for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

fn counts(conn: &Connection) -> Result<Vec<TableCount>, StoreError> {
    TABLES
        .iter()
        .map(|&table| -> Result<TableCount, StoreError> {
            let rows = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(TableCount { table, rows })
        })
        .collect()
}

impl Store {
    /// Row counts for every table, children first.
    pub fn table_counts(&self) -> Result<Vec<TableCount>, StoreError> {
        self.with_conn(counts)
    }

    /// Delete every row from every table, keeping the structure.
    ///
    /// Returns the counts observed before deletion.
    pub fn clear_all(&self) -> Result<Vec<TableCount>, StoreError> {
        let before = self.with_conn(|conn| {
            let before = counts(conn)?;
            for table in TABLES {
                conn.execute(&format!("DELETE FROM {table}"), [])?;
            }
            Ok(before)
        })?;

        let removed: i64 = before.iter().map(|c| c.rows).sum();
        tracing::warn!(removed, "all records deleted");
        Ok(before)
    }
}
