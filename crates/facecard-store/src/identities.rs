//! Known identities and the gallery loader.

use crate::{format_timestamp, Store, StoreError};
use chrono::Utc;
use facecard_core::{Descriptor, Gallery};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

/// Identity metadata returned on a successful identification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub age: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub registered_date: Option<String>,
    pub image_path: Option<String>,
}

/// A new identity to persist.
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub name: String,
    pub age: i64,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub image_path: Option<String>,
    pub descriptor: Descriptor,
}

const PROFILE_COLUMNS: &str = "id, name, age, email, phone, registered_date, image_path";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        age: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        registered_date: row.get(5)?,
        image_path: row.get(6)?,
    })
}

pub(crate) fn exists(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let found = conn
        .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn ensure_exists(conn: &Connection, id: i64) -> Result<(), StoreError> {
    if exists(conn, id)? {
        Ok(())
    } else {
        Err(StoreError::UserNotFound(id))
    }
}

impl Store {
    /// Persist a new identity and return its id. No de-duplication is done.
    pub fn insert_identity(&self, identity: &NewIdentity) -> Result<i64, StoreError> {
        let id = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (name, age, email, phone, registered_date, image_path, face_encoding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    identity.name,
                    identity.age,
                    identity.email,
                    identity.phone,
                    format_timestamp(Utc::now()),
                    identity.image_path,
                    identity.descriptor.to_le_bytes(),
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        tracing::info!(id, name = %identity.name, "identity registered");
        Ok(id)
    }

    pub fn identity_exists(&self, id: i64) -> Result<bool, StoreError> {
        self.with_conn(|conn| exists(conn, id))
    }

    /// Every identity's metadata, in storage order.
    pub fn list_profiles(&self) -> Result<Vec<Profile>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {PROFILE_COLUMNS} FROM users ORDER BY id"))?;
            let rows = stmt.query_map([], profile_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    /// Load every identity into an index-aligned gallery, in storage order.
    ///
    /// A descriptor blob that is not exactly `dimension` little-endian `f64`
    /// values aborts the load.
    pub fn load_gallery(&self, dimension: usize) -> Result<Gallery<Profile>, StoreError> {
        let gallery = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PROFILE_COLUMNS}, face_encoding FROM users ORDER BY id"
            ))?;
            let mut rows = stmt.query([])?;

            let mut gallery = Gallery::new(dimension);
            while let Some(row) = rows.next()? {
                let profile = profile_from_row(row)?;
                let blob: Vec<u8> = row.get(7)?;
                let id = profile.id;

                let descriptor = Descriptor::from_le_bytes(&blob, dimension)
                    .map_err(|source| StoreError::Descriptor { id, source })?;
                gallery
                    .push(descriptor, profile)
                    .map_err(|source| StoreError::Gallery { id, source })?;
            }
            Ok(gallery)
        })?;

        tracing::info!(identities = gallery.len(), dimension, "gallery loaded");
        Ok(gallery)
    }
}
