use facecard_core::{DescriptorError, GalleryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed descriptor for identity {id}: {source}")]
    Descriptor {
        id: i64,
        #[source]
        source: DescriptorError,
    },
    #[error("identity {id} does not fit the gallery: {source}")]
    Gallery {
        id: i64,
        #[source]
        source: GalleryError,
    },
    #[error("user {0} not found")]
    UserNotFound(i64),
    #[error("no {business} card for user {user_id}")]
    CardNotFound { user_id: i64, business: String },
    #[error("card number {0} is already registered")]
    DuplicateCard(String),
    #[error("reward {0} not found or inactive")]
    RewardNotFound(i64),
    #[error("reward {0} already claimed")]
    AlreadyClaimed(i64),
    #[error("reward {reward_id} requires more than tier {tier} with {points} points")]
    NotEligible {
        reward_id: i64,
        tier: crate::Tier,
        points: i64,
    },
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Parse(#[from] ParseEnumError),
    #[error("catalog: {0}")]
    Catalog(#[from] toml::de::Error),
}

/// A stored label did not name a known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Implements `FromSql`/`ToSql` for a label enum via `FromStr` and `as_str`.
macro_rules! sql_label {
    ($ty:ty) => {
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: $crate::error::ParseEnumError| {
                        rusqlite::types::FromSqlError::Other(Box::new(e))
                    })
            }
        }
    };
}

pub(crate) use sql_label;
