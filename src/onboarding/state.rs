//! Wizard state machine: which step a session is on.

use serde::{Deserialize, Serialize};

use super::model::Page;

/// Number of screens in the wizard.
pub const TOTAL_STEPS: u8 = 4;

/// Coarse phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Registering,
    Collecting,
    Completed,
}

/// One screen of the wizard.
///
/// Progresses linearly: Registration → Details(2) → Details(3) → Complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WizardStep {
    #[default]
    Registration,
    Details(Page),
    Complete,
}

impl WizardStep {
    pub fn number(&self) -> u8 {
        match self {
            Self::Registration => 1,
            Self::Details(page) => page.number(),
            Self::Complete => TOTAL_STEPS,
        }
    }

    pub fn from_number(step: u8) -> Option<Self> {
        match step {
            1 => Some(Self::Registration),
            2 => Some(Self::Details(Page::Two)),
            3 => Some(Self::Details(Page::Three)),
            4 => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        match self {
            Self::Registration => SessionPhase::Registering,
            Self::Details(_) => SessionPhase::Collecting,
            Self::Complete => SessionPhase::Completed,
        }
    }

    /// Whether this step is terminal (onboarding is done).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The step after this one, if any.
    pub fn next(&self) -> Option<WizardStep> {
        Self::from_number(self.number() + 1)
    }

    /// The step before this one; registration is the floor.
    pub fn previous(&self) -> WizardStep {
        Self::from_number(self.number().saturating_sub(1)).unwrap_or(Self::Registration)
    }

    /// `"Step N of 4"` and the rounded completion percentage.
    pub fn progress(&self) -> Progress {
        let n = self.number();
        Progress {
            label: format!("Step {n} of {TOTAL_STEPS}"),
            percent: ((f64::from(n) / f64::from(TOTAL_STEPS)) * 100.0).round() as u8,
        }
    }
}

impl TryFrom<u8> for WizardStep {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("No such step: {value}"))
    }
}

impl From<WizardStep> for u8 {
    fn from(step: WizardStep) -> Self {
        step.number()
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Progress indicator data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub label: String,
    pub percent: u8,
}
