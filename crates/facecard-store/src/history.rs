//! Append-only points transactions.

use crate::error::{sql_label, ParseEnumError};
use crate::{format_timestamp, StoreError};
use chrono::Utc;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earn,
    Redeem,
    Expire,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Earn => "earn",
            TransactionKind::Redeem => "redeem",
            TransactionKind::Expire => "expire",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earn" => Ok(TransactionKind::Earn),
            "redeem" => Ok(TransactionKind::Redeem),
            "expire" => Ok(TransactionKind::Expire),
            other => Err(ParseEnumError::new("transaction type", other)),
        }
    }
}

sql_label!(TransactionKind);

/// One row of `points_history`.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub business_name: Option<String>,
    pub points_change: i64,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub transaction_date: Option<String>,
}

pub(crate) fn record(
    conn: &Connection,
    user_id: i64,
    business_name: Option<&str>,
    points_change: i64,
    kind: TransactionKind,
    description: &str,
) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO points_history
            (user_id, business_name, points_change, transaction_type, description, transaction_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            business_name,
            points_change,
            kind,
            description,
            format_timestamp(Utc::now())
        ],
    )?;
    tracing::debug!(user_id, points_change, kind = %kind, "points transaction recorded");
    Ok(())
}

pub(crate) fn for_user(conn: &Connection, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, business_name, points_change, transaction_type, description, transaction_date
         FROM points_history WHERE user_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map([user_id], |row| {
        Ok(Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            business_name: row.get(2)?,
            points_change: row.get(3)?,
            kind: row.get(4)?,
            description: row.get(5)?,
            transaction_date: row.get(6)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

impl crate::Store {
    /// A user's transactions, oldest first.
    pub fn transactions(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        self.with_conn(|conn| for_user(conn, user_id))
    }
}
