//! Loyalty tiers derived from accumulated points.

use crate::error::{sql_label, ParseEnumError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Total points at which a user reaches Silver.
pub const SILVER_THRESHOLD: i64 = 1_000;
/// Total points at which a user reaches Gold.
pub const GOLD_THRESHOLD: i64 = 5_000;

/// Ordered loyalty status: Bronze < Silver < Gold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
}

impl Tier {
    /// Tier for a user holding `total_points` across all cards.
    pub fn from_points(total_points: i64) -> Self {
        if total_points >= GOLD_THRESHOLD {
            Tier::Gold
        } else if total_points >= SILVER_THRESHOLD {
            Tier::Silver
        } else {
            Tier::Bronze
        }
    }

    /// Points needed for one unit of currency at this tier.
    pub fn points_per_unit(self) -> i64 {
        match self {
            Tier::Bronze => 100,
            Tier::Silver => 80,
            Tier::Gold => 50,
        }
    }

    /// Monetary value of `points` at this tier.
    pub fn point_value(self, points: i64) -> f64 {
        points as f64 / self.points_per_unit() as f64
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "Bronze",
            Tier::Silver => "Silver",
            Tier::Gold => "Gold",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Bronze" => Ok(Tier::Bronze),
            "Silver" => Ok(Tier::Silver),
            "Gold" => Ok(Tier::Gold),
            other => Err(ParseEnumError::new("tier", other)),
        }
    }
}

sql_label!(Tier);
