//! Reward catalog, eligibility and claims.

use crate::cards::total_points;
use crate::catalog::Catalog;
use crate::error::{sql_label, ParseEnumError};
use crate::history::{self, TransactionKind};
use crate::identities::ensure_exists;
use crate::{format_timestamp, Store, StoreError, Tier};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How long a claim (or a pre-granted reward) stays active.
pub const CLAIM_VALIDITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardKind {
    Birthday,
    Milestone,
    Tier,
    Points,
}

impl RewardKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RewardKind::Birthday => "birthday",
            RewardKind::Milestone => "milestone",
            RewardKind::Tier => "tier",
            RewardKind::Points => "points",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            RewardKind::Birthday => "🎂",
            RewardKind::Milestone => "🎯",
            RewardKind::Tier => "⭐",
            RewardKind::Points => "💰",
        }
    }
}

impl fmt::Display for RewardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birthday" => Ok(RewardKind::Birthday),
            "milestone" => Ok(RewardKind::Milestone),
            "tier" => Ok(RewardKind::Tier),
            "points" => Ok(RewardKind::Points),
            other => Err(ParseEnumError::new("reward type", other)),
        }
    }
}

sql_label!(RewardKind);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Available,
    Claimed,
    Used,
    Expired,
}

impl ClaimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Available => "available",
            ClaimStatus::Claimed => "claimed",
            ClaimStatus::Used => "used",
            ClaimStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClaimStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ClaimStatus::Available),
            "claimed" => Ok(ClaimStatus::Claimed),
            "used" => Ok(ClaimStatus::Used),
            "expired" => Ok(ClaimStatus::Expired),
            other => Err(ParseEnumError::new("claim status", other)),
        }
    }
}

sql_label!(ClaimStatus);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reward {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: RewardKind,
    pub business_name: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub points_required: i64,
    pub tier_required: Option<Tier>,
    #[serde(skip)]
    pub active: bool,
}

/// A reward as offered to a particular user.
#[derive(Debug, Clone, Serialize)]
pub struct OfferedReward {
    #[serde(flatten)]
    pub reward: Reward,
    pub status: ClaimStatus,
    pub icon: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct RewardsOverview {
    pub total_points: i64,
    #[serde(rename = "current_tier")]
    pub tier: Tier,
    pub points_value: f64,
    pub rewards: Vec<OfferedReward>,
}

/// A recorded claim.
#[derive(Debug, Clone, Serialize)]
pub struct Claim {
    pub user_id: i64,
    pub reward_id: i64,
    pub claim_date: String,
    pub expiry_date: String,
    pub status: ClaimStatus,
}

/// Counts reported after seeding the catalog.
#[derive(Debug, Clone, Default)]
pub struct SeedSummary {
    pub total: usize,
    /// `None` groups general rewards.
    pub by_business: Vec<(Option<String>, usize)>,
    /// `None` groups rewards without a tier requirement.
    pub by_tier: Vec<(Option<String>, usize)>,
}

/// Whether a user at `tier` holding `total_points` may claim `reward`.
pub fn is_eligible(reward: &Reward, tier: Tier, total_points: i64, has_active_claim: bool) -> bool {
    reward.active
        && reward.tier_required.map_or(true, |required| required <= tier)
        && reward.points_required <= total_points
        && !has_active_claim
}

const REWARD_COLUMNS: &str =
    "id, type, business_name, name, description, points_required, tier_required, active";

fn reward_from_row(row: &Row<'_>) -> rusqlite::Result<Reward> {
    Ok(Reward {
        id: row.get(0)?,
        kind: row.get(1)?,
        business_name: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        points_required: row.get(5)?,
        tier_required: row.get(6)?,
        active: row.get(7)?,
    })
}

/// A claim is active while claimed or used and not yet past its expiry.
fn has_active_claim(
    conn: &Connection,
    user_id: i64,
    reward_id: i64,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM user_rewards
             WHERE user_id = ?1 AND reward_id = ?2
               AND status IN (?3, ?4) AND expiry_date > ?5",
            params![
                user_id,
                reward_id,
                ClaimStatus::Claimed,
                ClaimStatus::Used,
                format_timestamp(now)
            ],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn active_rewards(conn: &Connection) -> Result<Vec<Reward>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REWARD_COLUMNS} FROM rewards WHERE active = 1 ORDER BY id"
    ))?;
    let rows = stmt.query_map([], reward_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn grouped_counts(conn: &Connection, column: &str) -> Result<Vec<(Option<String>, usize)>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {column}, COUNT(*) FROM rewards GROUP BY {column} ORDER BY {column}"
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, Option<String>>(0)?, row.get::<_, i64>(1)? as usize))
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

impl Store {
    /// Every active reward.
    pub fn list_rewards(&self) -> Result<Vec<Reward>, StoreError> {
        self.with_conn(active_rewards)
    }

    /// Total points, tier, point value and the rewards the user may claim now.
    pub fn rewards_overview(&self, user_id: i64) -> Result<RewardsOverview, StoreError> {
        let now = Utc::now();
        self.with_conn(|conn| {
            ensure_exists(conn, user_id)?;
            let total_points = total_points(conn, user_id)?;
            let tier = Tier::from_points(total_points);

            let mut rewards = Vec::new();
            for reward in active_rewards(conn)? {
                let claimed = has_active_claim(conn, user_id, reward.id, now)?;
                if is_eligible(&reward, tier, total_points, claimed) {
                    let icon = reward.kind.icon();
                    rewards.push(OfferedReward {
                        reward,
                        status: ClaimStatus::Available,
                        icon,
                    });
                }
            }

            Ok(RewardsOverview {
                total_points,
                tier,
                points_value: tier.point_value(total_points),
                rewards,
            })
        })
    }

    /// Claim `reward_id` for `user_id`.
    ///
    /// An outstanding `available` grant is promoted to `claimed`; otherwise a
    /// new claim row is inserted. Claiming a `points` reward logs a `redeem`
    /// transaction but leaves card balances untouched.
    pub fn claim_reward(&self, user_id: i64, reward_id: i64) -> Result<Claim, StoreError> {
        let now = Utc::now();
        let claim = self.with_conn(|conn| {
            let reward = conn
                .query_row(
                    &format!("SELECT {REWARD_COLUMNS} FROM rewards WHERE id = ?1 AND active = 1"),
                    [reward_id],
                    reward_from_row,
                )
                .optional()?
                .ok_or(StoreError::RewardNotFound(reward_id))?;
            ensure_exists(conn, user_id)?;

            if has_active_claim(conn, user_id, reward_id, now)? {
                return Err(StoreError::AlreadyClaimed(reward_id));
            }

            let points = total_points(conn, user_id)?;
            let tier = Tier::from_points(points);
            if !is_eligible(&reward, tier, points, false) {
                return Err(StoreError::NotEligible {
                    reward_id,
                    tier,
                    points,
                });
            }

            let claim = Claim {
                user_id,
                reward_id,
                claim_date: format_timestamp(now),
                expiry_date: format_timestamp(now + Duration::days(CLAIM_VALIDITY_DAYS)),
                status: ClaimStatus::Claimed,
            };

            let grant: Option<i64> = conn
                .query_row(
                    "SELECT id FROM user_rewards
                     WHERE user_id = ?1 AND reward_id = ?2 AND status = ?3
                     ORDER BY id DESC LIMIT 1",
                    params![user_id, reward_id, ClaimStatus::Available],
                    |row| row.get(0),
                )
                .optional()?;
            match grant {
                Some(grant_id) => {
                    conn.execute(
                        "UPDATE user_rewards SET status = ?1, claim_date = ?2, expiry_date = ?3 WHERE id = ?4",
                        params![claim.status, claim.claim_date, claim.expiry_date, grant_id],
                    )?;
                }
                None => {
                    conn.execute(
                        "INSERT INTO user_rewards (user_id, reward_id, claim_date, expiry_date, status)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![user_id, reward_id, claim.claim_date, claim.expiry_date, claim.status],
                    )?;
                }
            }

            if reward.kind == RewardKind::Points {
                history::record(
                    conn,
                    user_id,
                    reward.business_name.as_deref(),
                    -reward.points_required,
                    TransactionKind::Redeem,
                    &format!("Claimed reward: {}", reward.name),
                )?;
            }
            Ok(claim)
        })?;

        tracing::info!(user_id, reward_id, expiry = %claim.expiry_date, "reward claimed");
        Ok(claim)
    }

    /// Replace the rewards table with `catalog`'s entries.
    ///
    /// Existing claims are left in place and may reference rewards that no
    /// longer exist.
    pub fn seed_rewards(&self, catalog: &Catalog) -> Result<SeedSummary, StoreError> {
        let summary = self.with_conn(|conn| {
            conn.execute("DELETE FROM rewards", [])?;
            let mut stmt = conn.prepare(
                "INSERT INTO rewards
                    (type, business_name, name, description, points_required, tier_required, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in &catalog.rewards {
                stmt.execute(params![
                    r.kind,
                    r.business,
                    r.name,
                    r.description,
                    r.points_required,
                    r.tier_required,
                    r.active
                ])?;
            }

            let total: i64 = conn.query_row("SELECT COUNT(*) FROM rewards", [], |row| row.get(0))?;
            Ok(SeedSummary {
                total: total as usize,
                by_business: grouped_counts(conn, "business_name")?,
                by_tier: grouped_counts(conn, "tier_required")?,
            })
        })?;

        tracing::info!(rewards = summary.total, "reward catalog seeded");
        Ok(summary)
    }

    /// Pre-grant every birthday reward to `user_id` as `available`. Returns the
    /// number of grants written.
    pub fn grant_birthday_rewards(&self, user_id: i64) -> Result<usize, StoreError> {
        let now = Utc::now();
        let granted = self.with_conn(|conn| {
            ensure_exists(conn, user_id)?;
            Ok(conn.execute(
                "INSERT INTO user_rewards (user_id, reward_id, claim_date, expiry_date, status)
                 SELECT ?1, id, ?2, ?3, ?4 FROM rewards WHERE type = ?5",
                params![
                    user_id,
                    format_timestamp(now),
                    format_timestamp(now + Duration::days(CLAIM_VALIDITY_DAYS)),
                    ClaimStatus::Available,
                    RewardKind::Birthday
                ],
            )?)
        })?;

        tracing::info!(user_id, granted, "birthday rewards granted");
        Ok(granted)
    }
}
