//! Table definitions and bootstrapping.

use crate::{Store, StoreError};
use rusqlite::Connection;

const USERS_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        age INTEGER NOT NULL,
        email TEXT,
        phone TEXT,
        registered_date TEXT DEFAULT CURRENT_TIMESTAMP,
        image_path TEXT,
        face_encoding BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_name ON users(name);
    CREATE INDEX IF NOT EXISTS idx_email ON users(email);
";

const LOYALTY_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS loyalty_cards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        business_name TEXT NOT NULL,
        card_number TEXT UNIQUE,
        points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
        tier_status TEXT NOT NULL DEFAULT 'Bronze',
        registration_date TEXT,
        last_used TEXT,
        FOREIGN KEY (user_id) REFERENCES users (id)
    );

    CREATE TABLE IF NOT EXISTS rewards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        type TEXT NOT NULL,
        business_name TEXT,
        name TEXT NOT NULL,
        description TEXT,
        points_required INTEGER NOT NULL DEFAULT 0,
        tier_required TEXT,
        active INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE IF NOT EXISTS user_rewards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        reward_id INTEGER NOT NULL,
        claim_date TEXT,
        expiry_date TEXT,
        status TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users (id),
        FOREIGN KEY (reward_id) REFERENCES rewards (id)
    );

    CREATE TABLE IF NOT EXISTS points_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        business_name TEXT,
        points_change INTEGER NOT NULL,
        transaction_type TEXT NOT NULL,
        description TEXT,
        transaction_date TEXT,
        FOREIGN KEY (user_id) REFERENCES users (id)
    );
";

/// Every table, children before parents (safe deletion order).
pub const TABLES: [&str; 5] = [
    "points_history",
    "user_rewards",
    "loyalty_cards",
    "rewards",
    "users",
];

pub(crate) fn create_all(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(USERS_TABLE)?;
    conn.execute_batch(LOYALTY_TABLES)?;
    Ok(())
}

impl Store {
    /// Create any missing table. Idempotent.
    pub fn init_schema(&self) -> Result<(), StoreError> {
        self.with_conn(create_all)?;
        tracing::info!(path = %self.path().display(), "schema ready");
        Ok(())
    }

    /// Drop and recreate the users table, discarding every identity.
    pub fn reset_identities(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute_batch("DROP TABLE IF EXISTS users;")?;
            conn.execute_batch(USERS_TABLE)?;
            Ok(())
        })?;
        tracing::warn!(path = %self.path().display(), "users table recreated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support;

    fn table_names(store: &crate::Store) -> Vec<String> {
        let conn = store.connect().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_init_creates_every_table() {
        let (_dir, store) = test_support::store();
        let mut expected: Vec<String> = super::TABLES.iter().map(|t| t.to_string()).collect();
        expected.sort();
        assert_eq!(table_names(&store), expected);
    }

    #[test]
    fn test_init_is_idempotent() {
        let (_dir, store) = test_support::store();
        test_support::register(&store, "Ada", &[0.0, 0.0]);
        store.init_schema().unwrap();
        assert_eq!(store.list_profiles().unwrap().len(), 1);
    }

    #[test]
    fn test_reset_identities_empties_users() {
        let (_dir, store) = test_support::store();
        test_support::register(&store, "Ada", &[0.0, 0.0]);
        store.reset_identities().unwrap();
        assert!(store.list_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_reset_identities_with_loyalty_data() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0, 0.0]);
        store.add_card(ada, "FitLife", "F1", 75).unwrap();
        store.earn_points(ada, "FitLife", 25, None).unwrap();

        store.reset_identities().unwrap();
        assert!(store.list_profiles().unwrap().is_empty());
        test_support::register(&store, "Grace", &[1.0, 1.0]);
        assert_eq!(store.list_profiles().unwrap().len(), 1);
    }
}
