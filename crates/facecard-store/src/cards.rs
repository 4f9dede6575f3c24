//! Loyalty cards and point balances.

use crate::history::{self, TransactionKind};
use crate::identities::ensure_exists;
use crate::{format_timestamp, Store, StoreError, Tier};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoyaltyCard {
    pub id: i64,
    #[serde(skip)]
    pub user_id: i64,
    pub business_name: String,
    pub card_number: String,
    pub points: i64,
    pub tier_status: Tier,
    pub registration_date: Option<String>,
    pub last_used: Option<String>,
}

const CARD_COLUMNS: &str =
    "id, user_id, business_name, card_number, points, tier_status, registration_date, last_used";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<LoyaltyCard> {
    Ok(LoyaltyCard {
        id: row.get(0)?,
        user_id: row.get(1)?,
        business_name: row.get(2)?,
        card_number: row.get(3)?,
        points: row.get(4)?,
        tier_status: row.get(5)?,
        registration_date: row.get(6)?,
        last_used: row.get(7)?,
    })
}

fn card_by_id(conn: &Connection, id: i64) -> Result<LoyaltyCard, StoreError> {
    Ok(conn.query_row(
        &format!("SELECT {CARD_COLUMNS} FROM loyalty_cards WHERE id = ?1"),
        [id],
        card_from_row,
    )?)
}

pub(crate) fn total_points(conn: &Connection, user_id: i64) -> Result<i64, StoreError> {
    let sum: Option<i64> = conn.query_row(
        "SELECT SUM(points) FROM loyalty_cards WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(sum.unwrap_or(0))
}

fn non_empty(field: &'static str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::Invalid {
            field,
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

impl Store {
    /// Issue a card for `user_id` at `business`, starting at `initial_points`
    /// and Bronze.
    pub fn add_card(
        &self,
        user_id: i64,
        business: &str,
        card_number: &str,
        initial_points: i64,
    ) -> Result<LoyaltyCard, StoreError> {
        non_empty("business_name", business)?;
        non_empty("card_number", card_number)?;

        let card = self.with_conn(|conn| {
            ensure_exists(conn, user_id)?;

            let taken = conn
                .query_row(
                    "SELECT 1 FROM loyalty_cards WHERE card_number = ?1",
                    [card_number],
                    |_| Ok(()),
                )
                .optional()?;
            if taken.is_some() {
                return Err(StoreError::DuplicateCard(card_number.to_string()));
            }

            let inserted = conn.execute(
                "INSERT INTO loyalty_cards
                    (user_id, business_name, card_number, points, tier_status, registration_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user_id,
                    business,
                    card_number,
                    initial_points.max(0),
                    Tier::Bronze,
                    format_timestamp(Utc::now()),
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    return Err(StoreError::DuplicateCard(card_number.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
            card_by_id(conn, conn.last_insert_rowid())
        })?;

        tracing::info!(user_id, business, card_id = card.id, points = card.points, "loyalty card added");
        Ok(card)
    }

    /// A user's cards, most recently registered first.
    pub fn list_cards(&self, user_id: i64) -> Result<Vec<LoyaltyCard>, StoreError> {
        self.with_conn(|conn| {
            ensure_exists(conn, user_id)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {CARD_COLUMNS} FROM loyalty_cards
                 WHERE user_id = ?1 ORDER BY registration_date DESC, id DESC"
            ))?;
            let rows = stmt.query_map([user_id], card_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Sum of points across every card the user holds.
    pub fn total_points(&self, user_id: i64) -> Result<i64, StoreError> {
        self.with_conn(|conn| total_points(conn, user_id))
    }

    /// Credit `points` to the user's card at `business`.
    ///
    /// Logs an `earn` transaction, stamps `last_used`, and re-derives the tier
    /// label on every card the user holds. Returns the updated card and tier.
    pub fn earn_points(
        &self,
        user_id: i64,
        business: &str,
        points: i64,
        description: Option<&str>,
    ) -> Result<(LoyaltyCard, Tier), StoreError> {
        if points <= 0 {
            return Err(StoreError::Invalid {
                field: "points",
                reason: format!("must be positive, got {points}"),
            });
        }

        let (card, tier) = self.with_conn(|conn| {
            ensure_exists(conn, user_id)?;
            let card_id: i64 = conn
                .query_row(
                    "SELECT id FROM loyalty_cards WHERE user_id = ?1 AND business_name = ?2 ORDER BY id LIMIT 1",
                    params![user_id, business],
                    |row| row.get(0),
                )
                .optional()?
                .ok_or_else(|| StoreError::CardNotFound {
                    user_id,
                    business: business.to_string(),
                })?;

            conn.execute(
                "UPDATE loyalty_cards SET points = points + ?1, last_used = ?2 WHERE id = ?3",
                params![points, format_timestamp(Utc::now()), card_id],
            )?;

            let description = description
                .map(str::to_string)
                .unwrap_or_else(|| format!("Earned at {business}"));
            history::record(conn, user_id, Some(business), points, TransactionKind::Earn, &description)?;

            let tier = Tier::from_points(total_points(conn, user_id)?);
            conn.execute(
                "UPDATE loyalty_cards SET tier_status = ?1 WHERE user_id = ?2",
                params![tier, user_id],
            )?;

            Ok((card_by_id(conn, card_id)?, tier))
        })?;

        tracing::info!(user_id, business, points, balance = card.points, tier = %tier, "points earned");
        Ok((card, tier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn test_add_card_sets_initial_points() {
        let (_dir, store) = test_support::store();
        let user = test_support::register(&store, "Ada", &[0.0]);
        let card = store.add_card(user, "TechHub", "TH-001", 200).unwrap();
        assert_eq!(card.points, 200);
        assert_eq!(card.tier_status, Tier::Bronze);
        assert_eq!(card.user_id, user);
        assert!(card.registration_date.is_some());
        assert!(card.last_used.is_none());
    }

    #[test]
    fn test_add_card_unknown_user() {
        let (_dir, store) = test_support::store();
        let err = store.add_card(42, "FitLife", "FL-1", 75).unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(42)));
    }

    #[test]
    fn test_duplicate_card_number_rejected() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0]);
        let bob = test_support::register(&store, "Bob", &[1.0]);
        store.add_card(ada, "FreshMart", "SAME", 50).unwrap();
        let err = store.add_card(bob, "GameZone", "SAME", 100).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCard(n) if n == "SAME"));
    }

    #[test]
    fn test_blank_card_number_rejected() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0]);
        let err = store.add_card(ada, "FreshMart", "  ", 50).unwrap_err();
        assert!(matches!(err, StoreError::Invalid { field: "card_number", .. }));
    }

    #[test]
    fn test_list_cards_newest_first() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0]);
        store.add_card(ada, "FreshMart", "A", 50).unwrap();
        store.add_card(ada, "GameZone", "B", 100).unwrap();

        let numbers: Vec<String> = store
            .list_cards(ada)
            .unwrap()
            .into_iter()
            .map(|c| c.card_number)
            .collect();
        assert_eq!(numbers, vec!["B", "A"]);
        assert_eq!(store.total_points(ada).unwrap(), 150);
    }

    #[test]
    fn test_list_cards_unknown_user() {
        let (_dir, store) = test_support::store();
        assert!(matches!(store.list_cards(3), Err(StoreError::UserNotFound(3))));
    }

    #[test]
    fn test_total_points_without_cards_is_zero() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0]);
        assert_eq!(store.total_points(ada).unwrap(), 0);
    }

    #[test]
    fn test_earn_points_promotes_every_card() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0]);
        store.add_card(ada, "FreshMart", "A", 50).unwrap();
        store.add_card(ada, "GameZone", "B", 100).unwrap();

        let (card, tier) = store.earn_points(ada, "GameZone", 900, None).unwrap();
        assert_eq!(card.points, 1_000);
        assert!(card.last_used.is_some());
        assert_eq!(tier, Tier::Silver);
        assert!(store
            .list_cards(ada)
            .unwrap()
            .iter()
            .all(|c| c.tier_status == Tier::Silver));

        let txs = store.transactions(ada).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Earn);
        assert_eq!(txs[0].points_change, 900);
        assert_eq!(txs[0].description.as_deref(), Some("Earned at GameZone"));
    }

    #[test]
    fn test_earn_points_validation() {
        let (_dir, store) = test_support::store();
        let ada = test_support::register(&store, "Ada", &[0.0]);
        assert!(matches!(
            store.earn_points(ada, "FitLife", 0, None),
            Err(StoreError::Invalid { field: "points", .. })
        ));
        assert!(matches!(
            store.earn_points(ada, "FitLife", 10, None),
            Err(StoreError::CardNotFound { .. })
        ));
    }
}
