//! The custom stat catalog.

use serde::{Deserialize, Serialize};

use crate::{ModelError, ModelResult};

/// UI grouping for stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    /// Temperament traits (empathy, logic, ...).
    Personality,
    /// Skill or RPG-style attributes.
    Secondary,
}

impl std::fmt::Display for StatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatKind::Personality => write!(f, "Personality"),
            StatKind::Secondary => write!(f, "Secondary"),
        }
    }
}

/// A catalog entry defining a stat's name, starting value and category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomStat {
    /// Lower-case alphanumeric slug, unique within the catalog.
    pub name: String,
    pub initial_value: i32,
    #[serde(rename = "type")]
    pub kind: StatKind,
}

impl CustomStat {
    /// Create a stat, slugifying the raw name.
    pub fn new(raw_name: &str, initial_value: i32, kind: StatKind) -> ModelResult<Self> {
        Ok(Self {
            name: slugify_stat_name(raw_name)?,
            initial_value,
            kind,
        })
    }

    /// Name with the first letter capitalised, for display.
    pub fn display_name(&self) -> String {
        let mut chars = self.name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Normalise a user-entered stat name into a catalog key.
///
/// Trims, lower-cases and drops everything outside `[a-z0-9]`.
pub fn slugify_stat_name(raw: &str) -> ModelResult<String> {
    let slug: String = raw
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();

    if slug.is_empty() {
        return Err(ModelError::EmptyStatName);
    }
    Ok(slug)
}

/// Whether a catalog already holds a stat with this slug.
pub fn catalog_contains(catalog: &[CustomStat], name: &str) -> bool {
    catalog.iter().any(|s| s.name == name)
}

/// Stats of the given kind, in catalog order.
pub fn stats_of_kind(catalog: &[CustomStat], kind: StatKind) -> Vec<&CustomStat> {
    catalog.iter().filter(|s| s.kind == kind).collect()
}

/// The built-in catalog installed for a story with no stat configuration.
pub fn default_stat_catalog() -> Vec<CustomStat> {
    const PERSONALITY: [&str; 6] = [
        "discipline",
        "empathy",
        "logic",
        "impulse",
        "loyalty",
        "skepticism",
    ];
    const SECONDARY: [&str; 4] = ["strength", "dexterity", "charm", "power"];

    let personality = PERSONALITY.iter().map(|n| (n, StatKind::Personality));
    let secondary = SECONDARY.iter().map(|n| (n, StatKind::Secondary));

    personality
        .chain(secondary)
        .map(|(name, kind)| CustomStat {
            name: (*name).to_string(),
            initial_value: 5,
            kind,
        })
        .collect()
}
