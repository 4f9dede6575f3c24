//! Reward catalog and partner businesses, loaded from TOML.
//!
//! The default catalog is embedded at compile time from `catalog/rewards.toml`.

use crate::rewards::RewardKind;
use crate::{StoreError, Tier};
use serde::Deserialize;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../catalog/rewards.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "business")]
    pub businesses: Vec<Business>,
    #[serde(default, rename = "reward")]
    pub rewards: Vec<CatalogReward>,
}

/// A partner business and the points a new card starts with.
#[derive(Debug, Clone, Deserialize)]
pub struct Business {
    pub name: String,
    #[serde(default)]
    pub initial_points: i64,
}

/// One `[[reward]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogReward {
    #[serde(rename = "type")]
    pub kind: RewardKind,
    /// Absent for general rewards.
    pub business: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub points_required: i64,
    pub tier_required: Option<Tier>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Catalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Result<Self, StoreError> {
        Self::parse(BUILTIN_CATALOG)
    }

    pub fn parse(src: &str) -> Result<Self, StoreError> {
        Ok(toml::from_str(src)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    /// Points credited to a new card for `business`; unknown businesses start at 0.
    pub fn initial_points(&self, business: &str) -> i64 {
        self.businesses
            .iter()
            .find(|b| b.name == business)
            .map(|b| b.initial_points)
            .unwrap_or(0)
    }
}
