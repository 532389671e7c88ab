//! StepAssignmentStore: which onboarding component appears on which page.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::model::{ComponentDefinition, ComponentType, Page};
use super::preset::Preset;
use crate::error::OnboardingError;
use crate::store::Database;

/// Components grouped by the page they currently sit on.
#[derive(Debug, Clone, Serialize)]
pub struct PagesOverview {
    pub page_2: Vec<ComponentDefinition>,
    pub page_3: Vec<ComponentDefinition>,
}

/// In-memory component layout.
///
/// Edits stay local until [`StepAssignmentStore::save`] succeeds.
#[derive(Debug, Clone)]
pub struct StepAssignmentStore {
    components: Vec<ComponentDefinition>,
    has_changes: bool,
}

impl Default for StepAssignmentStore {
    fn default() -> Self {
        Self {
            components: Preset::Default.definitions(),
            has_changes: false,
        }
    }
}

impl StepAssignmentStore {
    /// Build a store from an explicit definition set.
    pub fn with_components(components: Vec<ComponentDefinition>) -> Result<Self, OnboardingError> {
        validate(&components)?;
        Ok(Self {
            components,
            has_changes: false,
        })
    }

    /// Load the persisted layout, or the `default` preset if none is stored.
    pub async fn load(db: &dyn Database) -> Result<Self, OnboardingError> {
        match db.load_assignments().await? {
            Some(components) => {
                debug!(count = components.len(), "Loaded component assignments");
                Self::with_components(components)
            }
            None => {
                info!("No stored component assignments, using default preset");
                Ok(Self::default())
            }
        }
    }

    /// All definitions, active or not, in insertion order.
    pub fn components(&self) -> &[ComponentDefinition] {
        &self.components
    }

    /// Whether there are edits not yet saved.
    pub fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Active components on `step`, in display order.
    ///
    /// Steps 1 and 4 never host components, so they always come back empty.
    pub fn list_components_for_step(&self, step: u8) -> Vec<ComponentDefinition> {
        let mut found: Vec<ComponentDefinition> = self
            .components
            .iter()
            .filter(|c| c.is_active && c.page_number.number() == step)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.component_type);
        found
    }

    pub fn pages_overview(&self) -> PagesOverview {
        PagesOverview {
            page_2: self.list_components_for_step(Page::Two.number()),
            page_3: self.list_components_for_step(Page::Three.number()),
        }
    }

    /// Index of the definition an edit to `component_type` applies to: the
    /// active copy if there is one, otherwise the first.
    fn target_index(&self, component_type: ComponentType) -> Result<usize, OnboardingError> {
        self.components
            .iter()
            .position(|c| c.component_type == component_type && c.is_active)
            .or_else(|| {
                self.components
                    .iter()
                    .position(|c| c.component_type == component_type)
            })
            .ok_or_else(|| OnboardingError::UnknownComponent(component_type.to_string()))
    }

    /// Move one component to another page.
    pub fn reassign_component(
        &mut self,
        component_type: ComponentType,
        new_page: i64,
    ) -> Result<(), OnboardingError> {
        let page = Page::try_from(new_page)?;
        let index = self.target_index(component_type)?;
        let component = &mut self.components[index];

        if component.page_number != page {
            info!(component = %component_type, from = %component.page_number, to = %page, "Component reassigned");
            component.page_number = page;
            self.has_changes = true;
        }
        Ok(())
    }

    /// Replace the whole layout with a named preset.
    pub fn apply_preset(&mut self, preset_name: &str) -> Result<Preset, OnboardingError> {
        let preset: Preset = preset_name.parse()?;
        self.replace_all(preset.definitions())?;
        info!(preset = %preset, "Preset applied");
        Ok(preset)
    }

    /// Replace the whole layout. Rejected without change if two active
    /// definitions share a component type.
    pub fn replace_all(&mut self, components: Vec<ComponentDefinition>) -> Result<(), OnboardingError> {
        validate(&components)?;
        self.components = components;
        self.has_changes = true;
        Ok(())
    }

    /// Show or hide a component without removing it.
    ///
    /// Hiding applies to every copy of the type; showing applies to one.
    pub fn set_active(
        &mut self,
        component_type: ComponentType,
        active: bool,
    ) -> Result<(), OnboardingError> {
        let index = self.target_index(component_type)?;
        let mut next = self.components.clone();
        if active {
            next[index].is_active = true;
        } else {
            for component in next.iter_mut().filter(|c| c.component_type == component_type) {
                component.is_active = false;
            }
        }
        validate(&next)?;
        if next != self.components {
            self.components = next;
            self.has_changes = true;
        }
        Ok(())
    }

    /// Persist the current layout.
    pub async fn save(&mut self, db: &dyn Database) -> Result<(), OnboardingError> {
        if let Err(e) = db.save_assignments(&self.components).await {
            warn!(error = %e, "Failed to save component assignments");
            return Err(e.into());
        }
        self.has_changes = false;
        info!(count = self.components.len(), "Component assignments saved");
        Ok(())
    }

    /// Record that `saved` reached storage. Edits made since the snapshot
    /// was taken keep the store dirty.
    pub fn mark_saved(&mut self, saved: &[ComponentDefinition]) {
        if self.components == saved {
            self.has_changes = false;
        }
    }
}

fn validate(components: &[ComponentDefinition]) -> Result<(), OnboardingError> {
    let mut seen = HashSet::new();
    for component in components.iter().filter(|c| c.is_active) {
        if !seen.insert(component.component_type) {
            return Err(OnboardingError::DuplicateComponent(
                component.component_type.to_string(),
            ));
        }
    }
    Ok(())
}
