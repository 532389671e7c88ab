//! Onboarding data models: component definitions, pages and user records.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OnboardingError;

/// Kind of profile input a component collects.
///
/// Declaration order is the display order within a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    AboutMe,
    Address,
    Birthdate,
}

impl ComponentType {
    pub const ALL: [ComponentType; 3] = [Self::AboutMe, Self::Address, Self::Birthdate];

    /// Human-readable label for the admin surface.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AboutMe => "About Me",
            Self::Address => "Address",
            Self::Birthdate => "Birthdate",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::AboutMe => "Textarea for personal information",
            Self::Address => "Street, city, state, and ZIP inputs",
            Self::Birthdate => "Date picker for birth date",
        }
    }
}

impl std::fmt::Display for ComponentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::AboutMe => "about_me",
            Self::Address => "address",
            Self::Birthdate => "birthdate",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ComponentType {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "about_me" => Ok(Self::AboutMe),
            "address" => Ok(Self::Address),
            "birthdate" => Ok(Self::Birthdate),
            other => Err(OnboardingError::UnknownComponent(other.to_string())),
        }
    }
}

/// A page that can host components. Pages 1 and 4 are fixed
/// (registration and completion), so only 2 and 3 exist here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Page {
    Two,
    Three,
}

impl Page {
    pub fn number(&self) -> u8 {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

impl TryFrom<i64> for Page {
    type Error = OnboardingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::Two),
            3 => Ok(Self::Three),
            other => Err(OnboardingError::InvalidPage(other)),
        }
    }
}

impl From<Page> for i64 {
    fn from(page: Page) -> Self {
        i64::from(page.number())
    }
}

impl std::fmt::Display for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Placement of one component on a configurable page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    pub id: String,
    pub component_type: ComponentType,
    pub page_number: Page,
    pub is_active: bool,
}

impl ComponentDefinition {
    pub fn new(id: &str, component_type: ComponentType, page_number: Page) -> Self {
        Self {
            id: id.to_string(),
            component_type,
            page_number,
            is_active: true,
        }
    }
}

/// A user going through onboarding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    /// Argon2id PHC string. Never leaves the service.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub current_step: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about_me: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// A freshly registered user, parked on the first configurable step.
    pub fn new(email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash,
            current_step: 2,
            about_me: None,
            street_address: None,
            city: None,
            state: None,
            zip: None,
            birthdate: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Badge label used by the data-review listing.
    pub fn step_label(&self) -> &'static str {
        match self.current_step {
            1 => "Registration",
            2 => "Step 2",
            3 => "Step 3",
            4 => "Completed",
            _ => "Unknown",
        }
    }
}

/// Draft field values collected by a session before they are saved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepFields {
    #[serde(default)]
    pub about_me: String,
    #[serde(default)]
    pub street_address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub birthdate: Option<NaiveDate>,
}

impl StepFields {
    /// Seed drafts from what is already stored for the user.
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            about_me: record.about_me.clone().unwrap_or_default(),
            street_address: record.street_address.clone().unwrap_or_default(),
            city: record.city.clone().unwrap_or_default(),
            state: record.state.clone().unwrap_or_default(),
            zip: record.zip.clone().unwrap_or_default(),
            birthdate: record.birthdate,
        }
    }

    /// Names of the fields `component` still needs.
    pub fn missing_for(&self, component: ComponentType) -> Vec<&'static str> {
        let blank = |s: &str| s.trim().is_empty();
        match component {
            ComponentType::AboutMe => {
                if blank(&self.about_me) {
                    vec!["about_me"]
                } else {
                    Vec::new()
                }
            }
            ComponentType::Address => [
                ("street_address", &self.street_address),
                ("city", &self.city),
                ("state", &self.state),
                ("zip", &self.zip),
            ]
            .into_iter()
            .filter(|(_, value)| blank(value))
            .map(|(name, _)| name)
            .collect(),
            ComponentType::Birthdate => {
                if self.birthdate.is_none() {
                    vec!["birthdate"]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Copy the values owned by `component` onto `record`.
    pub fn apply_to(&self, component: ComponentType, record: &mut UserRecord) {
        match component {
            ComponentType::AboutMe => record.about_me = Some(self.about_me.clone()),
            ComponentType::Address => {
                record.street_address = Some(self.street_address.clone());
                record.city = Some(self.city.clone());
                record.state = Some(self.state.clone());
                record.zip = Some(self.zip.clone());
            }
            ComponentType::Birthdate => record.birthdate = self.birthdate,
        }
    }

    /// Merge a partial update; absent fields keep their draft value.
    pub fn merge(&mut self, patch: FieldsPatch) {
        if let Some(v) = patch.about_me {
            self.about_me = v;
        }
        if let Some(v) = patch.street_address {
            self.street_address = v;
        }
        if let Some(v) = patch.city {
            self.city = v;
        }
        if let Some(v) = patch.state {
            self.state = v;
        }
        if let Some(v) = patch.zip {
            self.zip = v;
        }
        if let Some(v) = patch.birthdate {
            self.birthdate = v;
        }
    }
}

/// Partial update for [`StepFields`].
///
/// `birthdate: Some(None)` clears the date, `None` leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldsPatch {
    pub about_me: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub birthdate: Option<Option<NaiveDate>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<NaiveDate>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<NaiveDate>::deserialize(deserializer).map(Some)
}

/// What the completion screen shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<NaiveDate>,
}

const ABOUT_PREVIEW_CHARS: usize = 50;

impl CompletionSummary {
    pub fn from_record(record: &UserRecord) -> Self {
        let about = record
            .about_me
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| format!("{}...", s.chars().take(ABOUT_PREVIEW_CHARS).collect::<String>()));
        let location = record
            .city
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|city| format!("{}, {}", city, record.state.as_deref().unwrap_or_default()));
        Self {
            email: record.email.clone(),
            about,
            location,
            birthdate: record.birthdate,
        }
    }
}
