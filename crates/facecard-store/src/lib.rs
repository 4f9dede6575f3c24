//! facecard-store — SQLite persistence.
//!
//! Every operation opens a fresh connection to the database file and closes it
//! before returning. There is no pool and no transaction spanning operations.

pub mod admin;
pub mod cards;
pub mod catalog;
pub mod error;
pub mod history;
pub mod identities;
pub mod report;
pub mod rewards;
pub mod schema;
pub mod tier;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub use admin::TableCount;
pub use cards::LoyaltyCard;
pub use catalog::Catalog;
pub use error::{ParseEnumError, StoreError};
pub use history::{Transaction, TransactionKind};
pub use identities::{NewIdentity, Profile};
pub use rewards::{Claim, ClaimStatus, OfferedReward, Reward, RewardKind, RewardsOverview, SeedSummary};
pub use tier::Tier;

/// Timestamp format used for every TEXT date column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Handle to the SQLite database file.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new connection for a single operation.
    ///
    /// Foreign keys are declared in the schema but not enforced: reseeding
    /// rewards and recreating the users table must succeed while claims,
    /// cards and history still reference the old rows.
    pub fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "foreign_keys", false)?;
        Ok(conn)
    }

    pub(crate) fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self.connect()?;
        f(&conn)
    }
}

/// Format a timestamp the way it is stored.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored timestamp (UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
