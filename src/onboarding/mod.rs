//! Onboarding wizard: registration, two configurable detail steps and a
//! completion screen.
//!
//! Which fields appear on steps 2 and 3 is not fixed: an administrator
//! places each component (About Me, Address, Birthdate) on page 2 or 3
//! through the [`StepAssignmentStore`], and every [`OnboardingSession`]
//! renders and validates against that layout.

pub mod assignment;
pub mod manager;
pub mod model;
pub mod password;
pub mod preset;
pub mod routes;
pub mod session;
pub mod state;

pub use assignment::{PagesOverview, StepAssignmentStore};
pub use manager::{
    ComponentUpdate, LayoutView, OnboardingManager, UserListing, spawn_session_sweeper,
};
pub use model::{ComponentDefinition, ComponentType, FieldsPatch, Page, UserRecord};
pub use preset::Preset;
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use session::{OnboardingSession, RegistrationForm, StepView};
pub use state::{SessionPhase, WizardStep};
