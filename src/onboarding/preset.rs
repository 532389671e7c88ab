//! Named component layouts the administrator can apply in one action.

use serde::{Deserialize, Serialize};

use super::model::{ComponentDefinition, ComponentType, Page};
use crate::error::OnboardingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// About Me on page 2; Address and Birthdate on page 3.
    Default,
    /// About Me and Address on page 2; Birthdate on page 3.
    PersonalAddressFirst,
    /// Everything on page 2, page 3 left empty.
    #[serde(rename = "all_page_2")]
    AllPage2,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Self::Default, Self::PersonalAddressFirst, Self::AllPage2];

    fn pages(&self) -> [Page; 3] {
        match self {
            Self::Default => [Page::Two, Page::Three, Page::Three],
            Self::PersonalAddressFirst => [Page::Two, Page::Two, Page::Three],
            Self::AllPage2 => [Page::Two, Page::Two, Page::Two],
        }
    }

    /// The full definition set this preset stands for.
    pub fn definitions(&self) -> Vec<ComponentDefinition> {
        ComponentType::ALL
            .into_iter()
            .zip(self.pages())
            .enumerate()
            .map(|(i, (ty, page))| ComponentDefinition::new(&(i + 1).to_string(), ty, page))
            .collect()
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Default => "default",
            Self::PersonalAddressFirst => "personal_address_first",
            Self::AllPage2 => "all_page_2",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Preset {
    type Err = OnboardingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_string() == s)
            .ok_or_else(|| OnboardingError::UnknownPreset(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_of(defs: &[ComponentDefinition], ty: ComponentType) -> Page {
        defs.iter()
            .find(|d| d.component_type == ty)
            .map(|d| d.page_number)
            .unwrap()
    }

    #[test]
    fn every_preset_has_three_active_components() {
        for preset in Preset::ALL {
            let defs = preset.definitions();
            assert_eq!(defs.len(), 3, "{preset}");
            assert!(defs.iter().all(|d| d.is_active));
            let ids: Vec<&str> = defs.iter().map(|d| d.id.as_str()).collect();
            assert_eq!(ids, ["1", "2", "3"]);
        }
    }

    #[test]
    fn preset_pages() {
        use ComponentType::*;

        let defs = Preset::Default.definitions();
        assert_eq!(page_of(&defs, AboutMe), Page::Two);
        assert_eq!(page_of(&defs, Address), Page::Three);
        assert_eq!(page_of(&defs, Birthdate), Page::Three);

        let defs = Preset::PersonalAddressFirst.definitions();
        assert_eq!(page_of(&defs, AboutMe), Page::Two);
        assert_eq!(page_of(&defs, Address), Page::Two);
        assert_eq!(page_of(&defs, Birthdate), Page::Three);

        let defs = Preset::AllPage2.definitions();
        assert!(defs.iter().all(|d| d.page_number == Page::Two));
    }

    #[test]
    fn names_round_trip() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
            let json = serde_json::to_string(&preset).unwrap();
            assert_eq!(json, format!("\"{preset}\""));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "everything_on_3".parse::<Preset>().unwrap_err();
        assert!(matches!(err, OnboardingError::UnknownPreset(name) if name == "everything_on_3"));
    }
}
