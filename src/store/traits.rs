//! Unified `Database` trait: single async interface for all persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{ComponentDefinition, UserRecord};
use crate::records::ContactRecord;

/// Backend-agnostic database trait covering onboarding users, the component
/// layout and the contact record store.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert or replace a user record.
    async fn save_user(&self, user: &UserRecord) -> Result<(), DatabaseError>;

    /// Get a user by ID.
    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    /// All users, newest first.
    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError>;

    // ── Component layout ────────────────────────────────────────────

    /// The saved layout, or `None` if it was never saved.
    async fn load_assignments(&self) -> Result<Option<Vec<ComponentDefinition>>, DatabaseError>;

    /// Replace the saved layout.
    async fn save_assignments(&self, components: &[ComponentDefinition])
    -> Result<(), DatabaseError>;

    // ── Contact records ─────────────────────────────────────────────

    /// Create a `{name, email}` record.
    async fn insert_contact(&self, name: &str, email: &str)
    -> Result<ContactRecord, DatabaseError>;

    /// Create several records at once. Either every entry is stored or none is.
    async fn insert_contacts(
        &self,
        entries: &[(&str, &str)],
    ) -> Result<Vec<ContactRecord>, DatabaseError>;

    /// All contact records, newest first.
    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, DatabaseError>;
}
