//! Unit-of-measure reference data
//!
//! UOMs live on the historian system, independent of any tag or database.
//! The fetch returns everything the system knows, soft-deleted entries
//! included; display paths filter those out.

use serde::{Deserialize, Serialize};

/// One unit-of-measure entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfMeasure {
    /// Full name ("degree Celsius")
    pub name: String,
    /// Short form ("°C")
    pub abbreviation: String,
    /// Classification ("Temperature")
    pub class: String,
    /// Optional free-form description
    #[serde(default)]
    pub description: String,
    /// Soft-delete marker; excluded from display lists
    #[serde(default)]
    pub deleted: bool,
}

impl UnitOfMeasure {
    pub fn new(
        name: impl Into<String>,
        abbreviation: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            abbreviation: abbreviation.into(),
            class: class.into(),
            description: String::new(),
            deleted: false,
        }
    }

    /// Builder method: set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder method: mark the entry soft-deleted
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }
}

/// Filter a raw UOM set down to the displayable entries
pub fn display_units(units: &[UnitOfMeasure]) -> Vec<&UnitOfMeasure> {
    units.iter().filter(|u| !u.deleted).collect()
}
