//! Read-only views used by `facecard view`.

use crate::cards::LoyaltyCard;
use crate::{Store, StoreError};
use rusqlite::Connection;

/// Rows shown per section of the transaction log.
pub const RECENT_TRANSACTIONS: usize = 10;

/// A user's cards, grouped for display.
#[derive(Debug, Clone)]
pub struct CardGroup {
    pub user_id: i64,
    /// `None` when the card's owner no longer exists.
    pub user_name: Option<String>,
    pub cards: Vec<LoyaltyCard>,
}

#[derive(Debug, Clone)]
pub struct ClaimRow {
    pub user_name: String,
    pub reward_name: String,
    pub claim_date: Option<String>,
    pub expiry_date: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct TransactionRow {
    pub user_name: String,
    pub business_name: Option<String>,
    pub points_change: i64,
    pub kind: String,
    pub transaction_date: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessStats {
    pub business_name: String,
    pub cards: i64,
    pub total_points: i64,
    pub average_points: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub users: i64,
    pub users_with_cards: i64,
    pub businesses: Vec<BusinessStats>,
}

fn collect<T>(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
    f: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, f)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

impl Store {
    /// Every card, grouped by owner (ascending id), newest card first.
    pub fn cards_by_user(&self) -> Result<Vec<CardGroup>, StoreError> {
        self.with_conn(|conn| {
            let rows = collect(
                conn,
                "SELECT lc.id, lc.user_id, lc.business_name, lc.card_number, lc.points,
                        lc.tier_status, lc.registration_date, lc.last_used, u.name
                 FROM loyalty_cards lc
                 LEFT JOIN users u ON lc.user_id = u.id
                 ORDER BY lc.user_id, lc.registration_date DESC, lc.id DESC",
                [],
                |row| {
                    let card = LoyaltyCard {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        business_name: row.get(2)?,
                        card_number: row.get(3)?,
                        points: row.get(4)?,
                        tier_status: row.get(5)?,
                        registration_date: row.get(6)?,
                        last_used: row.get(7)?,
                    };
                    Ok((card, row.get::<_, Option<String>>(8)?))
                },
            )?;

            let mut groups: Vec<CardGroup> = Vec::new();
            for (card, user_name) in rows {
                match groups.last_mut() {
                    Some(group) if group.user_id == card.user_id => group.cards.push(card),
                    _ => groups.push(CardGroup {
                        user_id: card.user_id,
                        user_name,
                        cards: vec![card],
                    }),
                }
            }
            Ok(groups)
        })
    }

    /// Every claim with user and reward names, latest claim first.
    pub fn claimed_rewards(&self) -> Result<Vec<ClaimRow>, StoreError> {
        self.with_conn(|conn| {
            collect(
                conn,
                "SELECT u.name, r.name, ur.claim_date, ur.expiry_date, ur.status
                 FROM user_rewards ur
                 JOIN users u ON ur.user_id = u.id
                 JOIN rewards r ON ur.reward_id = r.id
                 ORDER BY ur.claim_date DESC, ur.id DESC",
                [],
                |row| {
                    Ok(ClaimRow {
                        user_name: row.get(0)?,
                        reward_name: row.get(1)?,
                        claim_date: row.get(2)?,
                        expiry_date: row.get(3)?,
                        status: row.get(4)?,
                    })
                },
            )
        })
    }

    /// The most recent `limit` transactions and the total count.
    pub fn recent_transactions(&self, limit: usize) -> Result<(Vec<TransactionRow>, i64), StoreError> {
        self.with_conn(|conn| {
            let total = conn.query_row("SELECT COUNT(*) FROM points_history", [], |row| row.get(0))?;
            let rows = collect(
                conn,
                "SELECT u.name, ph.business_name, ph.points_change, ph.transaction_type,
                        ph.transaction_date, ph.description
                 FROM points_history ph
                 JOIN users u ON ph.user_id = u.id
                 ORDER BY ph.transaction_date DESC, ph.id DESC
                 LIMIT ?1",
                [limit as i64],
                |row| {
                    Ok(TransactionRow {
                        user_name: row.get(0)?,
                        business_name: row.get(1)?,
                        points_change: row.get(2)?,
                        kind: row.get(3)?,
                        transaction_date: row.get(4)?,
                        description: row.get(5)?,
                    })
                },
            )?;
            Ok((rows, total))
        })
    }

    /// Card counts and point totals per business.
    pub fn statistics(&self) -> Result<Statistics, StoreError> {
        self.with_conn(|conn| {
            let users = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            let users_with_cards = conn.query_row(
                "SELECT COUNT(DISTINCT user_id) FROM loyalty_cards",
                [],
                |row| row.get(0),
            )?;
            let businesses = collect(
                conn,
                "SELECT business_name, COUNT(*), SUM(points), AVG(points)
                 FROM loyalty_cards GROUP BY business_name ORDER BY business_name",
                [],
                |row| {
                    Ok(BusinessStats {
                        business_name: row.get(0)?,
                        cards: row.get(1)?,
                        total_points: row.get(2)?,
                        average_points: row.get(3)?,
                    })
                },
            )?;
            Ok(Statistics {
                users,
                users_with_cards,
                businesses,
            })
        })
    }
}
