//! In-memory `Database` for tests and throwaway runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{ComponentDefinition, UserRecord};
use crate::records::ContactRecord;
use crate::store::traits::Database;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    assignments: Option<Vec<ComponentDefinition>>,
    contacts: Vec<ContactRecord>,
}

/// Everything lives in a `HashMap` behind a mutex. Cloning shares the data.
#[derive(Clone, Debug, Default)]
pub struct MemoryDatabase {
    tables: Arc<Mutex<Tables>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail with a query error until switched back off.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self, op: &str) -> Result<(), DatabaseError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DatabaseError::Query(format!("{op}: writes disabled")));
        }
        Ok(())
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, Tables>, DatabaseError> {
        self.tables
            .lock()
            .map_err(|_| DatabaseError::Pool("memory database mutex poisoned".to_string()))
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn save_user(&self, user: &UserRecord) -> Result<(), DatabaseError> {
        self.check_write("save_user")?;
        self.tables()?.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        Ok(self.tables()?.users.get(&id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let mut users: Vec<UserRecord> = self.tables()?.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn load_assignments(&self) -> Result<Option<Vec<ComponentDefinition>>, DatabaseError> {
        Ok(self.tables()?.assignments.clone())
    }

    async fn save_assignments(
        &self,
        components: &[ComponentDefinition],
    ) -> Result<(), DatabaseError> {
        self.check_write("save_assignments")?;
        self.tables()?.assignments = Some(components.to_vec());
        Ok(())
    }

    async fn insert_contact(&self, name: &str, email: &str) -> Result<ContactRecord, DatabaseError> {
        self.check_write("insert_contact")?;
        let record = ContactRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        self.tables()?.contacts.push(record.clone());
        Ok(record)
    }

    async fn insert_contacts(
        &self,
        entries: &[(&str, &str)],
    ) -> Result<Vec<ContactRecord>, DatabaseError> {
        self.check_write("insert_contacts")?;
        let records: Vec<ContactRecord> = entries
            .iter()
            .map(|(name, email)| ContactRecord {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: email.to_string(),
                created_at: Utc::now(),
            })
            .collect();
        self.tables()?.contacts.extend(records.iter().cloned());
        Ok(records)
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRecord>, DatabaseError> {
        let mut contacts = self.tables()?.contacts.clone();
        contacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(contacts)
    }
}
