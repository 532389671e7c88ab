//! OnboardingManager: owns the live sessions and the component layout and
//! serialises access to both.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use super::assignment::{PagesOverview, StepAssignmentStore};
use super::model::{CompletionSummary, ComponentDefinition, ComponentType, FieldsPatch, UserRecord};
use super::session::{OnboardingSession, RegistrationForm, StepView};
use crate::config::SessionLimits;
use crate::error::OnboardingError;
use crate::store::Database;

/// Partial update for one component from the admin editor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComponentUpdate {
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Admin view of the layout.
#[derive(Debug, Clone, Serialize)]
pub struct LayoutView {
    pub components: Vec<ComponentDefinition>,
    pub pages: PagesOverview,
    pub has_changes: bool,
}

impl LayoutView {
    fn from_store(store: &StepAssignmentStore) -> Self {
        Self {
            components: store.components().to_vec(),
            pages: store.pages_overview(),
            has_changes: store.has_changes(),
        }
    }
}

/// A stored user with a human-readable progress label.
#[derive(Debug, Clone, Serialize)]
pub struct UserListing {
    #[serde(flatten)]
    pub user: UserRecord,
    pub step_label: &'static str,
}

/// A live session plus when it was last used, in milliseconds since the
/// manager started.
struct SessionSlot {
    session: Arc<Mutex<OnboardingSession>>,
    touched_ms: AtomicU64,
}

impl SessionSlot {
    fn touched(&self) -> u64 {
        self.touched_ms.load(Ordering::Relaxed)
    }
}

/// Coordinates onboarding sessions against a shared component layout.
///
/// Each session sits behind its own async mutex. Operations take it with
/// `try_lock`, so a second submission while one is in flight gets
/// [`OnboardingError::SessionBusy`] instead of queueing.
///
/// Sessions live in memory only. Idle ones are swept after
/// `idle_timeout`, and at `max_sessions` the least recently used is dropped
/// to make room.
pub struct OnboardingManager {
    db: Arc<dyn Database>,
    assignments: Arc<RwLock<StepAssignmentStore>>,
    sessions: RwLock<HashMap<Uuid, Arc<SessionSlot>>>,
    limits: SessionLimits,
    epoch: Instant,
}

impl OnboardingManager {
    pub fn new(db: Arc<dyn Database>, assignments: StepAssignmentStore) -> Self {
        Self {
            db,
            assignments: Arc::new(RwLock::new(assignments)),
            sessions: RwLock::new(HashMap::new()),
            limits: SessionLimits::default(),
            epoch: Instant::now(),
        }
    }

    pub fn with_limits(mut self, limits: SessionLimits) -> Self {
        self.limits = limits;
        self
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Build a manager with the layout read from the database.
    pub async fn load(db: Arc<dyn Database>) -> Result<Self, OnboardingError> {
        let assignments = StepAssignmentStore::load(db.as_ref()).await?;
        Ok(Self::new(db, assignments))
    }

    async fn lock_session(
        &self,
        id: Uuid,
    ) -> Result<OwnedMutexGuard<OnboardingSession>, OnboardingError> {
        let slot = self
            .sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(OnboardingError::SessionNotFound(id))?;
        slot.touched_ms.store(self.now_ms(), Ordering::Relaxed);
        slot.session.clone().try_lock_owned().map_err(|_| {
            debug!(session = %id, "Rejected submission while another is in flight");
            OnboardingError::SessionBusy(id)
        })
    }

    /// Snapshot of the layout, so long operations don't hold the lock.
    async fn layout(&self) -> StepAssignmentStore {
        self.assignments.read().await.clone()
    }

    // ── Sessions ────────────────────────────────────────────────────

    /// Drop every session in `sessions` untouched for the idle timeout.
    fn evict_idle(&self, sessions: &mut HashMap<Uuid, Arc<SessionSlot>>) -> usize {
        let now = self.now_ms();
        let timeout_ms = u64::try_from(self.limits.idle_timeout.as_millis()).unwrap_or(u64::MAX);
        let before = sessions.len();
        sessions.retain(|_, slot| now.saturating_sub(slot.touched()) < timeout_ms);
        before - sessions.len()
    }

    pub async fn create_session(&self) -> StepView {
        let session = OnboardingSession::new();
        let view = session.step_view(&*self.assignments.read().await);

        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions);
        while sessions.len() >= self.limits.max_sessions {
            let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, slot)| slot.touched())
                .map(|(id, _)| *id)
            else {
                break;
            };
            sessions.remove(&oldest);
            debug!(session = %oldest, "Evicted least recently used session");
        }
        sessions.insert(
            session.id(),
            Arc::new(SessionSlot {
                session: Arc::new(Mutex::new(session)),
                touched_ms: AtomicU64::new(self.now_ms()),
            }),
        );
        info!(session = %view.session_id, live = sessions.len(), "Onboarding session started");
        view
    }

    /// Drop idle sessions. Returns how many were removed.
    pub async fn sweep_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_idle(&mut sessions)
    }

    pub async fn session_view(&self, id: Uuid) -> Result<StepView, OnboardingError> {
        let session = self.lock_session(id).await?;
        Ok(session.step_view(&*self.assignments.read().await))
    }

    pub async fn register(
        &self,
        id: Uuid,
        form: &RegistrationForm,
    ) -> Result<StepView, OnboardingError> {
        let mut session = self.lock_session(id).await?;
        session.register(form, self.db.as_ref()).await?;
        Ok(session.step_view(&*self.assignments.read().await))
    }

    pub async fn update_fields(
        &self,
        id: Uuid,
        patch: FieldsPatch,
    ) -> Result<StepView, OnboardingError> {
        let mut session = self.lock_session(id).await?;
        session.update_fields(patch)?;
        Ok(session.step_view(&*self.assignments.read().await))
    }

    pub async fn advance(&self, id: Uuid, step: u8) -> Result<StepView, OnboardingError> {
        let mut session = self.lock_session(id).await?;
        let layout = self.layout().await;
        session.advance(step, &layout, self.db.as_ref()).await?;
        Ok(session.step_view(&layout))
    }

    pub async fn go_back(&self, id: Uuid) -> Result<StepView, OnboardingError> {
        let mut session = self.lock_session(id).await?;
        session.go_back();
        Ok(session.step_view(&*self.assignments.read().await))
    }

    pub async fn restart(&self, id: Uuid) -> Result<StepView, OnboardingError> {
        let mut session = self.lock_session(id).await?;
        session.restart();
        Ok(session.step_view(&*self.assignments.read().await))
    }

    /// Completion summary. Only available once the session has finished.
    pub async fn summary(&self, id: Uuid) -> Result<CompletionSummary, OnboardingError> {
        let session = self.lock_session(id).await?;
        session
            .completion_summary()
            .ok_or_else(|| OnboardingError::InvalidTransition {
                action: "view summary".to_string(),
                step: session.current_step().number(),
            })
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    // ── Admin ───────────────────────────────────────────────────────

    pub async fn layout_view(&self) -> LayoutView {
        LayoutView::from_store(&*self.assignments.read().await)
    }

    pub async fn pages(&self) -> PagesOverview {
        self.assignments.read().await.pages_overview()
    }

    /// Apply a page move and/or visibility change to one component.
    ///
    /// Both parts apply together or not at all.
    pub async fn update_component(
        &self,
        component: &str,
        update: ComponentUpdate,
    ) -> Result<LayoutView, OnboardingError> {
        let component_type: ComponentType = component.parse()?;
        let mut store = self.assignments.write().await;

        let mut draft = store.clone();
        if let Some(page) = update.page_number {
            draft.reassign_component(component_type, page)?;
        }
        if let Some(active) = update.is_active {
            draft.set_active(component_type, active)?;
        }
        *store = draft;
        Ok(LayoutView::from_store(&store))
    }

    pub async fn apply_preset(&self, name: &str) -> Result<LayoutView, OnboardingError> {
        let mut store = self.assignments.write().await;
        store.apply_preset(name)?;
        Ok(LayoutView::from_store(&store))
    }

    /// Persist the layout. Unsaved edits survive a failed save.
    ///
    /// A snapshot is written so the layout stays readable and editable while
    /// the write is in flight; edits made meanwhile keep `has_changes` set.
    pub async fn save_layout(&self) -> Result<LayoutView, OnboardingError> {
        let mut snapshot = self.layout().await;
        snapshot.save(self.db.as_ref()).await?;

        let mut store = self.assignments.write().await;
        store.mark_saved(snapshot.components());
        Ok(LayoutView::from_store(&store))
    }

    // ── Data review ─────────────────────────────────────────────────

    pub async fn list_users(&self) -> Result<Vec<UserListing>, OnboardingError> {
        let users = self.db.list_users().await?;
        Ok(users
            .into_iter()
            .map(|user| UserListing {
                step_label: user.step_label(),
                user,
            })
            .collect())
    }
}

/// Spawn a background task that periodically drops idle sessions.
pub fn spawn_session_sweeper(manager: Arc<OnboardingManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = manager.sweep_idle().await;
            if removed > 0 {
                let live = manager.session_count().await;
                info!(removed, live, "Swept idle sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::onboarding::state::WizardStep;
    use crate::store::MemoryDatabase;

    fn manager(db: &MemoryDatabase) -> OnboardingManager {
        OnboardingManager::new(Arc::new(db.clone()), StepAssignmentStore::default())
    }

    fn patch(value: serde_json::Value) -> FieldsPatch {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        let err = manager.session_view(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OnboardingError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn busy_session_rejects_second_submission() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        let id = manager.create_session().await.session_id;

        let _held = manager.lock_session(id).await.unwrap();
        let err = manager.go_back(id).await.unwrap_err();
        assert!(matches!(err, OnboardingError::SessionBusy(_)));
    }

    #[tokio::test]
    async fn full_walk_with_all_on_page_two() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        manager.apply_preset("all_page_2").await.unwrap();

        let id = manager.create_session().await.session_id;
        let view = manager
            .register(id, &RegistrationForm::new("a@b.com", "secret1", "secret1"))
            .await
            .unwrap();
        assert_eq!(view.title, "Personal & Address Information");
        assert_eq!(view.components.len(), 3);

        manager
            .update_fields(
                id,
                patch(serde_json::json!({
                    "about_me": "Hi",
                    "street_address": "1 Main St",
                    "city": "Austin",
                    "state": "TX",
                    "zip": "78701",
                    "birthdate": "1990-05-17"
                })),
            )
            .await
            .unwrap();
        let view = manager.advance(id, 2).await.unwrap();
        assert_eq!(view.step, WizardStep::Details(crate::onboarding::model::Page::Three));
        assert!(view.components.is_empty());

        let view = manager.advance(id, 3).await.unwrap();
        assert_eq!(view.step, WizardStep::Complete);

        let summary = manager.summary(id).await.unwrap();
        assert_eq!(summary.location.as_deref(), Some("Austin, TX"));

        let users = manager.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].step_label, "Completed");
    }

    #[tokio::test]
    async fn summary_before_completion_is_rejected() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        let id = manager.create_session().await.session_id;
        let err = manager.summary(id).await.unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn component_update_applies_both_parts_or_neither() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);

        let moved = manager
            .update_component(
                "address",
                ComponentUpdate {
                    page_number: Some(2),
                    is_active: Some(true),
                },
            )
            .await
            .unwrap();
        assert!(moved.has_changes);
        assert_eq!(moved.pages.page_2.len(), 2);

        let before = manager.layout_view().await.components;
        let err = manager
            .update_component(
                "about_me",
                ComponentUpdate {
                    page_number: Some(5),
                    is_active: Some(false),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidPage(5)));
        assert_eq!(manager.layout_view().await.components, before);
    }

    #[tokio::test]
    async fn unknown_component_name_is_rejected() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        let err = manager
            .update_component("avatar", ComponentUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::UnknownComponent(_)));
    }

    #[tokio::test]
    async fn saved_layout_is_loaded_by_new_manager() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        manager.apply_preset("personal_address_first").await.unwrap();
        let saved = manager.save_layout().await.unwrap();
        assert!(!saved.has_changes);

        let reloaded = OnboardingManager::load(Arc::new(db.clone())).await.unwrap();
        assert_eq!(reloaded.layout_view().await.components, saved.components);
    }

    #[tokio::test]
    async fn failed_layout_save_keeps_edits() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        manager.apply_preset("all_page_2").await.unwrap();

        db.fail_writes(true);
        let err = manager.save_layout().await.unwrap_err();
        assert!(matches!(err, OnboardingError::Persistence(_)));
        assert!(manager.layout_view().await.has_changes);
        assert_eq!(manager.pages().await.page_2.len(), 3);
    }

    #[tokio::test]
    async fn layout_save_clears_changes_and_edits_stay_editable() {
        let db = MemoryDatabase::new();
        let manager = manager(&db);
        manager.apply_preset("all_page_2").await.unwrap();

        let saved = manager.save_layout().await.unwrap();
        assert!(!saved.has_changes);
        assert_eq!(db.load_assignments().await.unwrap().unwrap(), saved.components);

        manager.apply_preset("default").await.unwrap();
        assert!(manager.layout_view().await.has_changes);
    }

    #[tokio::test]
    async fn session_count_stays_under_the_cap() {
        let db = MemoryDatabase::new();
        let manager = manager(&db).with_limits(SessionLimits {
            max_sessions: 50,
            ..SessionLimits::default()
        });

        for _ in 0..1000 {
            let view = manager.create_session().await;
            manager.restart(view.session_id).await.unwrap();
        }
        assert_eq!(manager.session_count().await, 50);
    }

    #[tokio::test]
    async fn cap_evicts_the_least_recently_used_session() {
        let db = MemoryDatabase::new();
        let manager = manager(&db).with_limits(SessionLimits {
            max_sessions: 2,
            ..SessionLimits::default()
        });

        let first = manager.create_session().await.session_id;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = manager.create_session().await.session_id;
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.session_view(first).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let third = manager.create_session().await.session_id;
        assert_eq!(manager.session_count().await, 2);
        assert!(manager.session_view(first).await.is_ok());
        assert!(manager.session_view(third).await.is_ok());
        let err = manager.session_view(second).await.unwrap_err();
        assert!(matches!(err, OnboardingError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn sweep_drops_idle_sessions() {
        let db = MemoryDatabase::new();
        let manager = manager(&db).with_limits(SessionLimits {
            idle_timeout: Duration::from_millis(20),
            ..SessionLimits::default()
        });

        let stale = manager.create_session().await.session_id;
        tokio::time::sleep(Duration::from_millis(40)).await;
        let fresh = manager.create_session().await.session_id;
        assert_eq!(manager.session_count().await, 1);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(manager.sweep_idle().await, 1);
        assert_eq!(manager.session_count().await, 0);
        for id in [stale, fresh] {
            let err = manager.session_view(id).await.unwrap_err();
            assert!(matches!(err, OnboardingError::SessionNotFound(_)));
        }
    }
}
