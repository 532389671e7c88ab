//! OnboardingSession: drives one user through registration, the two
//! configurable detail steps and completion.
//!
//! Every transition validates first, then persists, and only then moves the
//! cursor. A failure at any point leaves the session as it was.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::assignment::StepAssignmentStore;
use super::model::{
    CompletionSummary, ComponentDefinition, ComponentType, FieldsPatch, Page, StepFields,
    UserRecord,
};
use super::password::hash_password;
use super::state::{Progress, SessionPhase, WizardStep};
use crate::error::OnboardingError;
use crate::store::Database;

/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Step-one form submission.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationForm {
    pub email: String,
    #[serde(deserialize_with = "secret_string")]
    pub password: SecretString,
    #[serde(deserialize_with = "secret_string")]
    pub confirm_password: SecretString,
}

fn secret_string<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl RegistrationForm {
    pub fn new(email: &str, password: &str, confirm_password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: SecretString::from(password),
            confirm_password: SecretString::from(confirm_password),
        }
    }

    /// Check the form without side effects.
    pub fn validate(&self) -> Result<(), OnboardingError> {
        if self.email.trim().is_empty() {
            return Err(OnboardingError::Validation("Email is required".to_string()));
        }
        let password = self.password.expose_secret();
        if password != self.confirm_password.expose_secret() {
            return Err(OnboardingError::Validation(
                "Passwords do not match".to_string(),
            ));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(OnboardingError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_CHARS} characters long"
            )));
        }
        Ok(())
    }
}

/// Everything a client needs to render the session's current screen.
#[derive(Debug, Clone, Serialize)]
pub struct StepView {
    pub session_id: Uuid,
    pub step: WizardStep,
    pub phase: SessionPhase,
    pub title: String,
    pub components: Vec<ComponentDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_label: Option<&'static str>,
    pub can_go_back: bool,
    pub progress: Progress,
    pub fields: StepFields,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<CompletionSummary>,
}

/// Screen title for a configurable step, chosen from the components on it.
pub fn step_title(step: u8, components: &[ComponentDefinition]) -> String {
    let has = |ty: ComponentType| components.iter().any(|c| c.component_type == ty);
    if has(ComponentType::AboutMe) && has(ComponentType::Address) {
        "Personal & Address Information".to_string()
    } else if has(ComponentType::AboutMe) {
        "Tell Us About Yourself".to_string()
    } else if has(ComponentType::Address) {
        "Address Information".to_string()
    } else if has(ComponentType::Birthdate) {
        "Personal Details".to_string()
    } else {
        format!("Step {step}")
    }
}

/// One user's walk through the wizard.
#[derive(Debug, Clone)]
pub struct OnboardingSession {
    id: Uuid,
    step: WizardStep,
    user: Option<UserRecord>,
    fields: StepFields,
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: WizardStep::Registration,
            user: None,
            fields: StepFields::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The step currently displayed.
    pub fn current_step(&self) -> WizardStep {
        self.step
    }

    pub fn phase(&self) -> SessionPhase {
        self.step.phase()
    }

    pub fn user(&self) -> Option<&UserRecord> {
        self.user.as_ref()
    }

    pub fn fields(&self) -> &StepFields {
        &self.fields
    }

    /// Step 1 → 2: validate the form, create and persist the user.
    pub async fn register(
        &mut self,
        form: &RegistrationForm,
        db: &dyn Database,
    ) -> Result<&UserRecord, OnboardingError> {
        if self.step != WizardStep::Registration {
            return Err(OnboardingError::InvalidTransition {
                action: "register".to_string(),
                step: self.step.number(),
            });
        }
        form.validate()?;

        let hash = hash_password(form.password.expose_secret())
            .map_err(OnboardingError::Validation)?;
        let record = UserRecord::new(form.email.trim(), hash);

        if let Err(e) = db.save_user(&record).await {
            warn!(session = %self.id, error = %e, "Failed to create user");
            return Err(e.into());
        }

        info!(session = %self.id, user = %record.id, "User registered");
        self.fields = StepFields::from_record(&record);
        self.step = WizardStep::Details(Page::Two);
        Ok(self.user.insert(record))
    }

    /// Merge draft values for the fields on the current step.
    pub fn update_fields(&mut self, patch: FieldsPatch) -> Result<(), OnboardingError> {
        if self.phase() != SessionPhase::Collecting {
            return Err(OnboardingError::InvalidTransition {
                action: "edit fields".to_string(),
                step: self.step.number(),
            });
        }
        self.fields.merge(patch);
        Ok(())
    }

    /// Field names still needed before `step` can be left.
    pub fn missing_fields(&self, step: u8, store: &StepAssignmentStore) -> Vec<String> {
        store
            .list_components_for_step(step)
            .iter()
            .flat_map(|c| self.fields.missing_for(c.component_type))
            .map(String::from)
            .collect()
    }

    /// Whether every active component on `step` has its field filled.
    pub fn is_step_valid(&self, step: u8, store: &StepAssignmentStore) -> bool {
        self.missing_fields(step, store).is_empty()
    }

    /// Leave detail step `step` for the next one.
    ///
    /// A step with no active components passes straight through. Otherwise
    /// the step must be valid; its fields are merged into the user record,
    /// saved, and only then is the cursor moved.
    pub async fn advance(
        &mut self,
        step: u8,
        store: &StepAssignmentStore,
        db: &dyn Database,
    ) -> Result<WizardStep, OnboardingError> {
        if self.step.number() != step {
            return Err(OnboardingError::StepMismatch {
                current: self.step.number(),
                requested: step,
            });
        }
        let (WizardStep::Details(_), Some(user)) = (self.step, self.user.as_ref()) else {
            return Err(OnboardingError::InvalidTransition {
                action: "advance".to_string(),
                step,
            });
        };
        let Some(next) = self.step.next() else {
            return Err(OnboardingError::InvalidTransition {
                action: "advance".to_string(),
                step,
            });
        };

        let components = store.list_components_for_step(step);
        if components.is_empty() {
            debug!(session = %self.id, step, "No components on step, passing through");
        }

        let missing = self.missing_fields(step, store);
        if !missing.is_empty() {
            return Err(OnboardingError::IncompleteStep { step, missing });
        }

        let mut candidate = user.clone();
        for component in &components {
            self.fields.apply_to(component.component_type, &mut candidate);
        }
        candidate.current_step = candidate.current_step.max(next.number());
        candidate.updated_at = Utc::now();

        if let Err(e) = db.save_user(&candidate).await {
            warn!(session = %self.id, step, error = %e, "Failed to save step");
            return Err(e.into());
        }

        info!(session = %self.id, user = %candidate.id, from = step, to = %next, "Step completed");
        self.user = Some(candidate);
        self.step = next;
        Ok(next)
    }

    /// Show the previous step. Stored values and stored progress are untouched.
    pub fn go_back(&mut self) -> WizardStep {
        self.step = self.step.previous();
        self.step
    }

    /// Re-enter registration. The session forgets its user and drafts; the
    /// stored record is left as it is.
    pub fn restart(&mut self) {
        info!(session = %self.id, "Session restarted");
        self.step = WizardStep::Registration;
        self.user = None;
        self.fields = StepFields::default();
    }

    /// Read-only summary for the completion screen.
    pub fn completion_summary(&self) -> Option<CompletionSummary> {
        if !self.step.is_terminal() {
            return None;
        }
        self.user.as_ref().map(CompletionSummary::from_record)
    }

    pub fn step_view(&self, store: &StepAssignmentStore) -> StepView {
        let step = self.step.number();
        let components = store.list_components_for_step(step);
        let (title, action_label) = match self.step {
            WizardStep::Registration => ("Create Your Account".to_string(), None),
            WizardStep::Details(page) => {
                let label = if page == Page::Three { "Complete" } else { "Next" };
                (step_title(step, &components), Some(label))
            }
            WizardStep::Complete => ("Congratulations!".to_string(), None),
        };
        StepView {
            session_id: self.id,
            step: self.step,
            phase: self.phase(),
            title,
            components,
            action_label,
            can_go_back: self.step != WizardStep::Registration,
            progress: self.step.progress(),
            fields: self.fields.clone(),
            user: self.user.clone(),
            summary: self.completion_summary(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::onboarding::password::verify_password;
    use crate::store::MemoryDatabase;

    fn form(email: &str, password: &str, confirm: &str) -> RegistrationForm {
        RegistrationForm::new(email, password, confirm)
    }

    async fn registered(db: &MemoryDatabase) -> OnboardingSession {
        let mut session = OnboardingSession::new();
        session
            .register(&form("a@b.com", "secret1", "secret1"), db)
            .await
            .unwrap();
        session
    }

    fn patch(value: serde_json::Value) -> FieldsPatch {
        serde_json::from_value(value).unwrap()
    }

    fn validation_message(err: OnboardingError) -> String {
        match err {
            OnboardingError::Validation(msg) => msg,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn mismatched_passwords_create_nothing() {
        let db = MemoryDatabase::new();
        let mut session = OnboardingSession::new();

        let err = session
            .register(&form("a@b.com", "secret1", "secret2"), &db)
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "Passwords do not match");
        assert_eq!(session.current_step(), WizardStep::Registration);
        assert!(session.user().is_none());
        assert!(db.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn password_length_boundary() {
        let db = MemoryDatabase::new();
        let mut session = OnboardingSession::new();

        let err = session
            .register(&form("a@b.com", "five5", "five5"), &db)
            .await
            .unwrap_err();
        assert_eq!(
            validation_message(err),
            "Password must be at least 6 characters long"
        );
        assert_eq!(session.current_step().number(), 1);

        session
            .register(&form("a@b.com", "six666", "six666"), &db)
            .await
            .unwrap();
        assert_eq!(session.current_step().number(), 2);
    }

    #[tokio::test]
    async fn blank_email_is_rejected() {
        let db = MemoryDatabase::new();
        let mut session = OnboardingSession::new();
        let err = session
            .register(&form("   ", "secret1", "secret1"), &db)
            .await
            .unwrap_err();
        assert_eq!(validation_message(err), "Email is required");
    }

    #[tokio::test]
    async fn registration_creates_hashed_record_on_step_two() {
        let db = MemoryDatabase::new();
        let session = registered(&db).await;

        let user = session.user().unwrap();
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.current_step, 2);
        assert!(verify_password("secret1", &user.password_hash).unwrap());

        let stored = db.get_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.current_step, 2);
    }

    #[tokio::test]
    async fn register_twice_is_refused() {
        let db = MemoryDatabase::new();
        let mut session = registered(&db).await;
        let err = session
            .register(&form("c@d.com", "secret1", "secret1"), &db)
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidTransition { step: 2, .. }));
    }

    #[tokio::test]
    async fn end_to_end_walk() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;
        assert_eq!(session.phase(), SessionPhase::Collecting);

        session
            .update_fields(patch(serde_json::json!({ "about_me": "I build things" })))
            .unwrap();
        let next = session.advance(2, &store, &db).await.unwrap();
        assert_eq!(next, WizardStep::Details(Page::Three));

        session
            .update_fields(patch(serde_json::json!({
                "street_address": "123 Main St",
                "state": "NY",
                "zip": "10001",
                "birthdate": "1990-05-15"
            })))
            .unwrap();
        let err = session.advance(3, &store, &db).await.unwrap_err();
        match err {
            OnboardingError::IncompleteStep { step, missing } => {
                assert_eq!(step, 3);
                assert_eq!(missing, vec!["city".to_string()]);
            }
            other => panic!("expected incomplete step, got {other:?}"),
        }
        assert_eq!(session.current_step().number(), 3);

        session
            .update_fields(patch(serde_json::json!({ "city": "New York" })))
            .unwrap();
        let done = session.advance(3, &store, &db).await.unwrap();
        assert_eq!(done, WizardStep::Complete);
        assert_eq!(session.phase(), SessionPhase::Completed);

        let stored = db
            .get_user(session.user().unwrap().id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.current_step, 4);
        assert_eq!(stored.about_me.as_deref(), Some("I build things"));
        assert_eq!(stored.city.as_deref(), Some("New York"));
        assert_eq!(stored.birthdate, NaiveDate::from_ymd_opt(1990, 5, 15));

        let summary = session.completion_summary().unwrap();
        assert_eq!(summary.location.as_deref(), Some("New York, NY"));
    }

    #[tokio::test]
    async fn empty_step_passes_through() {
        let db = MemoryDatabase::new();
        let mut store = StepAssignmentStore::default();
        store.apply_preset("all_page_2").unwrap();

        let mut session = registered(&db).await;
        session
            .update_fields(patch(serde_json::json!({
                "about_me": "hi",
                "street_address": "1 Elm",
                "city": "Austin",
                "state": "TX",
                "zip": "73301",
                "birthdate": "2000-01-01"
            })))
            .unwrap();
        session.advance(2, &store, &db).await.unwrap();

        // Page 3 has nothing on it: advance needs no input.
        assert!(store.list_components_for_step(3).is_empty());
        assert!(session.is_step_valid(3, &store));
        assert_eq!(
            session.advance(3, &store, &db).await.unwrap(),
            WizardStep::Complete
        );
    }

    #[tokio::test]
    async fn empty_step_two_skips_without_input() {
        let db = MemoryDatabase::new();
        let mut store = StepAssignmentStore::default();
        store.reassign_component(ComponentType::AboutMe, 3).unwrap();

        let mut session = registered(&db).await;
        assert_eq!(
            session.advance(2, &store, &db).await.unwrap(),
            WizardStep::Details(Page::Three)
        );
        assert_eq!(session.user().unwrap().current_step, 3);
    }

    #[tokio::test]
    async fn step_validity_follows_assignment() {
        let db = MemoryDatabase::new();
        let mut store = StepAssignmentStore::default();
        let mut session = registered(&db).await;

        session
            .update_fields(patch(serde_json::json!({
                "street_address": "1 Elm",
                "city": "Austin",
                "state": "TX",
                "zip": ""
            })))
            .unwrap();
        store.reassign_component(ComponentType::Address, 2).unwrap();
        assert!(!session.is_step_valid(2, &store));

        session
            .update_fields(patch(serde_json::json!({ "zip": "73301", "about_me": "x" })))
            .unwrap();
        assert!(session.is_step_valid(2, &store));

        // Hiding birthdate makes step 3 trivially valid.
        assert!(!session.is_step_valid(3, &store));
        store.set_active(ComponentType::Birthdate, false).unwrap();
        assert!(session.is_step_valid(3, &store));
    }

    #[tokio::test]
    async fn whitespace_about_me_is_incomplete() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;
        session
            .update_fields(patch(serde_json::json!({ "about_me": "   " })))
            .unwrap();
        assert!(matches!(
            session.advance(2, &store, &db).await,
            Err(OnboardingError::IncompleteStep { step: 2, .. })
        ));
    }

    #[tokio::test]
    async fn advance_requires_current_step() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;

        let err = session.advance(3, &store, &db).await.unwrap_err();
        assert!(matches!(
            err,
            OnboardingError::StepMismatch {
                current: 2,
                requested: 3
            }
        ));

        let mut fresh = OnboardingSession::new();
        let err = fresh.advance(1, &store, &db).await.unwrap_err();
        assert!(matches!(err, OnboardingError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn failed_save_leaves_session_unchanged() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;
        session
            .update_fields(patch(serde_json::json!({ "about_me": "hello" })))
            .unwrap();

        db.fail_writes(true);
        let err = session.advance(2, &store, &db).await.unwrap_err();
        assert!(matches!(err, OnboardingError::Persistence(_)));
        assert_eq!(session.current_step().number(), 2);
        assert!(session.user().unwrap().about_me.is_none());

        db.fail_writes(false);
        session.advance(2, &store, &db).await.unwrap();
        assert_eq!(session.current_step().number(), 3);
    }

    #[tokio::test]
    async fn failed_registration_save_stays_on_step_one() {
        let db = MemoryDatabase::new();
        db.fail_writes(true);
        let mut session = OnboardingSession::new();
        let err = session
            .register(&form("a@b.com", "secret1", "secret1"), &db)
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::Persistence(_)));
        assert_eq!(session.current_step(), WizardStep::Registration);
        assert!(session.user().is_none());
    }

    #[tokio::test]
    async fn go_back_keeps_stored_progress() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;
        session
            .update_fields(patch(serde_json::json!({ "about_me": "hello" })))
            .unwrap();
        session.advance(2, &store, &db).await.unwrap();

        assert_eq!(session.go_back().number(), 2);
        assert_eq!(session.user().unwrap().current_step, 3);
        assert_eq!(session.fields().about_me, "hello");
        assert_eq!(session.go_back().number(), 1);
        assert_eq!(session.go_back().number(), 1);
    }

    #[tokio::test]
    async fn revisiting_a_step_never_lowers_stored_progress() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;
        session
            .update_fields(patch(serde_json::json!({ "about_me": "hello" })))
            .unwrap();
        session.advance(2, &store, &db).await.unwrap();
        session.go_back();
        session.advance(2, &store, &db).await.unwrap();
        assert_eq!(session.user().unwrap().current_step, 3);
    }

    #[tokio::test]
    async fn restart_keeps_stored_record() {
        let db = MemoryDatabase::new();
        let store = StepAssignmentStore::default();
        let mut session = registered(&db).await;
        session
            .update_fields(patch(serde_json::json!({ "about_me": "hello" })))
            .unwrap();
        session.advance(2, &store, &db).await.unwrap();
        let user_id = session.user().unwrap().id;

        session.restart();
        assert_eq!(session.current_step(), WizardStep::Registration);
        assert!(session.user().is_none());
        assert_eq!(session.fields(), &StepFields::default());

        let stored = db.get_user(user_id).await.unwrap().unwrap();
        assert_eq!(stored.about_me.as_deref(), Some("hello"));
        assert_eq!(stored.current_step, 3);
    }

    #[test]
    fn fields_are_locked_outside_detail_steps() {
        let mut session = OnboardingSession::new();
        assert!(session.update_fields(FieldsPatch::default()).is_err());
    }

    #[tokio::test]
    async fn step_view_titles_and_labels() {
        let db = MemoryDatabase::new();
        let mut store = StepAssignmentStore::default();
        let session = registered(&db).await;

        let view = session.step_view(&store);
        assert_eq!(view.title, "Tell Us About Yourself");
        assert_eq!(view.action_label, Some("Next"));
        assert_eq!(view.progress.label, "Step 2 of 4");
        assert!(view.can_go_back);
        assert!(view.summary.is_none());

        store.apply_preset("personal_address_first").unwrap();
        assert_eq!(
            session.step_view(&store).title,
            "Personal & Address Information"
        );
    }

    #[test]
    fn titles_by_components() {
        let store = StepAssignmentStore::default();
        assert_eq!(
            step_title(3, &store.list_components_for_step(3)),
            "Address Information"
        );
        let birth_only = vec![ComponentDefinition::new(
            "3",
            ComponentType::Birthdate,
            Page::Three,
        )];
        assert_eq!(step_title(3, &birth_only), "Personal Details");
        assert_eq!(step_title(3, &[]), "Step 3");
    }
}
