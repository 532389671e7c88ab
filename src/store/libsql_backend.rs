//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file, in-memory and remote (sqld / Turso) databases. A
//! remote database is how several service instances share one store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{ComponentDefinition, ComponentType, Page, UserRecord};
use crate::records::ContactRecord;
use crate::store::migrations;
use crate::store::traits::Database;

/// Key in `layout_state` marking that a layout was saved at least once.
const LAYOUT_SAVED_KEY: &str = "assignments_saved";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        Self::from_database(db).await
    }

    /// Connect to a remote libSQL server.
    pub async fn new_remote(url: &str, auth_token: &SecretString) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.expose_secret().to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to connect to {url}: {e}")))?;

        let backend = Self::from_database(db).await?;
        info!(url, "Remote database connected");
        Ok(backend)
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_date(s: Option<String>) -> Option<NaiveDate> {
    s.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok())
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_uuid(s: &str, entity: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s)
        .map_err(|e| DatabaseError::Serialization(format!("bad {entity} id {s:?}: {e}")))
}

fn row_to_user(row: &libsql::Row) -> Result<UserRecord, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("user row parse: {e}"));

    let id_str: String = row.get(0).map_err(read)?;
    let email: String = row.get(1).map_err(read)?;
    let password_hash: String = row.get(2).map_err(read)?;
    let current_step: i64 = row.get(3).map_err(read)?;
    let created_str: String = row.get(10).map_err(read)?;
    let updated_str: String = row.get(11).map_err(read)?;

    Ok(UserRecord {
        id: parse_uuid(&id_str, "user")?,
        email,
        password_hash,
        // Out-of-range values read back as 0, which labels as "Unknown".
        current_step: u8::try_from(current_step).unwrap_or(0),
        about_me: row.get(4).ok(),
        street_address: row.get(5).ok(),
        city: row.get(6).ok(),
        state: row.get(7).ok(),
        zip: row.get(8).ok(),
        birthdate: parse_date(row.get(9).ok()),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

fn row_to_component(row: &libsql::Row) -> Result<ComponentDefinition, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("assignment row parse: {e}"));

    let id: String = row.get(0).map_err(read)?;
    let type_str: String = row.get(1).map_err(read)?;
    let page: i64 = row.get(2).map_err(read)?;
    let is_active: i64 = row.get(3).map_err(read)?;

    let component_type: ComponentType = type_str
        .parse()
        .map_err(|e| DatabaseError::Serialization(format!("{e}")))?;
    let page_number =
        Page::try_from(page).map_err(|e| DatabaseError::Serialization(format!("{e}")))?;

    Ok(ComponentDefinition {
        id,
        component_type,
        page_number,
        is_active: is_active != 0,
    })
}

fn row_to_contact(row: &libsql::Row) -> Result<ContactRecord, DatabaseError> {
    let read = |e: libsql::Error| DatabaseError::Query(format!("contact row parse: {e}"));

    let id_str: String = row.get(0).map_err(read)?;
    let created_str: String = row.get(3).map_err(read)?;
    Ok(ContactRecord {
        id: parse_uuid(&id_str, "contact")?,
        name: row.get(1).map_err(read)?,
        email: row.get(2).map_err(read)?,
        created_at: parse_datetime(&created_str),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const USER_COLUMNS: &str = "id, email, password_hash, current_step, about_me, street_address, city, state, zip, birthdate, created_at, updated_at";

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn save_user(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        let birthdate = user.birthdate.map(|d| d.format("%Y-%m-%d").to_string());
        self.conn()
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    user.id.to_string(),
                    user.email.as_str(),
                    user.password_hash.as_str(),
                    i64::from(user.current_step),
                    opt_text(user.about_me.as_deref()),
                    opt_text(user.street_address.as_deref()),
                    opt_text(user.city.as_deref()),
                    opt_text(user.state.as_deref()),
                    opt_text(user.zip.as_deref()),
                    opt_text(birthdate.as_deref()),
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_user: {e}")))?;

        debug!(user_id = %user.id, step = user.current_step, "User saved");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users: {e}")))?;

        let mut users = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users: {e}")))?
        {
            users.push(row_to_user(&row)?);
        }
        Ok(users)
    }

    // ── Component layout ────────────────────────────────────────────

    async fn load_assignments(&self) -> Result<Option<Vec<ComponentDefinition>>, DatabaseError> {
        let conn = self.conn();
        let mut marker = conn
            .query(
                "SELECT value FROM layout_state WHERE key = ?1",
                params![LAYOUT_SAVED_KEY],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_assignments: {e}")))?;
        let saved = marker
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_assignments: {e}")))?
            .is_some();
        if !saved {
            return Ok(None);
        }

        let mut rows = conn
            .query(
                "SELECT id, component_type, page_number, is_active FROM component_assignments ORDER BY position",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_assignments: {e}")))?;

        let mut components = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("load_assignments: {e}")))?
        {
            components.push(row_to_component(&row)?);
        }
        Ok(Some(components))
    }

    async fn save_assignments(
        &self,
        components: &[ComponentDefinition],
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("save_assignments begin: {e}")))?;

        tx.execute("DELETE FROM component_assignments", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("save_assignments clear: {e}")))?;

        for (position, component) in components.iter().enumerate() {
            tx.execute(
                "INSERT INTO component_assignments (id, component_type, page_number, is_active, position) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    component.id.as_str(),
                    component.component_type.to_string(),
                    i64::from(component.page_number),
                    i64::from(component.is_active),
                    position as i64,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_assignments insert: {e}")))?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO layout_state (key, value, updated_at) VALUES (?1, '1', ?2)",
            params![LAYOUT_SAVED_KEY, Utc::now().to_rfc3339()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("save_assignments marker: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("save_assignments commit: {e}")))?;

        debug!(count = components.len(), "Component layout saved");
        Ok(())
    }

    // ── Contact records ─────────────────────────────────────────────

    async fn insert_contact(&self, name: &str, email: &str) -> Result<ContactRecord, DatabaseError> {
        let record = ContactRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO contacts (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    name,
                    email,
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_contact: {e}")))?;

        Ok(record)
    }

    async fn insert_contacts(
        &self,
        entries: &[(&str, &str)],
    ) -> Result<Vec<ContactRecord>, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_contacts begin: {e}")))?;

        let mut records = Vec::with_capacity(entries.len());
        for (name, email) in entries {
            let record = ContactRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: email.to_string(),
                created_at: Utc::now(),
            };
            tx.execute(
                "INSERT INTO contacts (id, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.id.to_string(),
                    *name,
                    *email,
                    record.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_contacts insert: {e}")))?;
            records.push(record);
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_contacts commit: {e}")))?;

        debug!(count = records.len(), "Contact records imported");
        Ok(records)
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, name, email, created_at FROM contacts ORDER BY created_at DESC, rowid DESC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_contacts: {e}")))?;

        let mut contacts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_contacts: {e}")))?
        {
            contacts.push(row_to_contact(&row)?);
        }
        Ok(contacts)
    }
}
