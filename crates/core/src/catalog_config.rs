//! Declarative achievement catalog.
//!
//! The catalog is a JSON document of achievement definitions keyed by a stable
//! `key`, plus dependency edges expressed between keys. Each entry is checked
//! on its own; a bad entry is reported and skipped, never fatal.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::achievement::DependencyKind;
use crate::criteria::Criteria;
use crate::error::CoreError;

/// Maximum length of an achievement key.
pub const MAX_KEY_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

/// Achievements are kept as raw JSON until [`CatalogConfig::check`] so that
/// one malformed entry (an unknown category, say) rejects only itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub achievements: Vec<serde_json::Value>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDefinition>,
}

/// One achievement as written in the catalog. Also the upsert payload for
/// catalog stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub points: i32,
    #[serde(default, alias = "is_hidden")]
    pub hidden: bool,
    pub criteria: Criteria,
}

fn default_kind() -> DependencyKind {
    DependencyKind::Required
}

/// An edge between two catalog keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDefinition {
    pub achievement: String,
    pub prerequisite: String,
    #[serde(default = "default_kind")]
    pub kind: DependencyKind,
}

// ---------------------------------------------------------------------------
// Load report
// ---------------------------------------------------------------------------

/// An entry that was not applied, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedEntry {
    pub item: String,
    pub reason: String,
}

impl RejectedEntry {
    pub fn new(item: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            item: item.into(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of applying a catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigLoadReport {
    /// Keys that were inserted or updated.
    pub loaded: Vec<String>,
    pub rejected: Vec<RejectedEntry>,
    pub dependencies_added: usize,
    pub dependencies_rejected: Vec<RejectedEntry>,
}

impl ConfigLoadReport {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.dependencies_rejected.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parsing and checks
// ---------------------------------------------------------------------------

impl CatalogConfig {
    /// Build a catalog from typed definitions.
    pub fn new(
        achievements: impl IntoIterator<Item = AchievementDefinition>,
        dependencies: impl IntoIterator<Item = DependencyDefinition>,
    ) -> Self {
        Self {
            achievements: achievements
                .into_iter()
                .filter_map(|a| serde_json::to_value(a).ok())
                .collect(),
            dependencies: dependencies.into_iter().collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::Configuration(format!("invalid catalog document: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self, CoreError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Configuration(format!("cannot read catalog {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Split the achievements into valid definitions and rejections.
    ///
    /// Later duplicates of a key are rejected; the first occurrence wins.
    pub fn check(&self) -> (Vec<AchievementDefinition>, Vec<RejectedEntry>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();
        let mut seen = HashSet::new();

        for (index, raw) in self.achievements.iter().enumerate() {
            let label = raw
                .get("key")
                .and_then(|k| k.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("achievements[{index}]"));
            let definition: AchievementDefinition = match serde_json::from_value(raw.clone()) {
                Ok(definition) => definition,
                Err(e) => {
                    rejected.push(RejectedEntry::new(label, e));
                    continue;
                }
            };
            match definition.validate() {
                Ok(valid) => {
                    if seen.insert(valid.key.clone()) {
                        accepted.push(valid);
                    } else {
                        rejected.push(RejectedEntry::new(
                            valid.key.clone(),
                            "duplicate key in catalog",
                        ));
                    }
                }
                Err(e) => rejected.push(RejectedEntry::new(label, e)),
            }
        }
        (accepted, rejected)
    }
}

impl AchievementDefinition {
    /// Check the definition and normalise its key and criteria.
    pub fn validate(mut self) -> Result<Self, CoreError> {
        self.key = self.key.trim().to_string();
        if self.key.is_empty() {
            return Err(CoreError::Configuration("key must not be empty".into()));
        }
        if self.key.len() > MAX_KEY_LEN {
            return Err(CoreError::Configuration(format!(
                "key must be at most {MAX_KEY_LEN} characters"
            )));
        }
        if !self
            .key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(CoreError::Configuration(format!(
                "key '{}' may only contain letters, digits, '_' and '-'",
                self.key
            )));
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::Configuration(format!(
                "achievement '{}' has no name",
                self.key
            )));
        }
        if self.points < 0 {
            return Err(CoreError::Configuration(format!(
                "achievement '{}' has negative points",
                self.key
            )));
        }
        self.criteria = self.criteria.validate()?;
        Ok(self)
    }
}

impl DependencyDefinition {
    /// Human-readable label used in load reports.
    pub fn label(&self) -> String {
        format!(
            "{} -> {} ({})",
            self.achievement,
            self.prerequisite,
            self.kind.as_str()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::CriteriaCategory;
    use assert_matches::assert_matches;

    const DOC: &str = r#"{
        "achievements": [
            { "key": "first_win", "name": "First Blood", "description": "Win a game",
              "points": 10, "criteria": { "category": "win_count" } },
            { "key": "ten_wins", "name": "Veteran", "points": 50,
              "criteria": { "category": "win_count", "target": 10, "game_type": "Pool" } },
            { "key": "nail_biter", "name": "Nail Biter",
              "criteria": { "category": "close_game" } },
            { "key": "first_win", "name": "Again",
              "criteria": { "category": "game_count" } },
            { "key": "mystery", "name": "Mystery",
              "criteria": { "category": "moon_landing" } }
        ],
        "dependencies": [
            { "achievement": "ten_wins", "prerequisite": "first_win" },
            { "achievement": "nail_biter", "prerequisite": "first_win", "kind": "unlocks" }
        ]
    }"#;

    #[test]
    fn parses_document_with_defaults() {
        let config = CatalogConfig::from_json(DOC).unwrap();
        assert_eq!(config.achievements.len(), 5);
        assert_eq!(config.dependencies[0].kind, DependencyKind::Required);
        assert_eq!(config.dependencies[1].kind, DependencyKind::Unlocks);
    }

    #[test]
    fn check_rejects_only_bad_entries() {
        let config = CatalogConfig::from_json(DOC).unwrap();
        let (accepted, rejected) = config.check();

        let keys: Vec<_> = accepted.iter().map(|a| a.key.as_str()).collect();
        assert_eq!(keys, vec!["first_win", "ten_wins"]);
        assert_eq!(accepted[1].criteria.game_type.as_deref(), Some("pool"));

        assert_eq!(rejected.len(), 3);
        assert_eq!(rejected[0].item, "nail_biter");
        assert!(rejected[0].reason.contains("parameter"));
        assert!(rejected[1].reason.contains("duplicate"));
        assert_eq!(rejected[2].item, "mystery");
    }

    #[test]
    fn invalid_document_is_configuration_error() {
        assert_matches!(
            CatalogConfig::from_json("{ not json"),
            Err(CoreError::Configuration(_))
        );
        assert_matches!(
            CatalogConfig::from_json(r#"{"achievements": {}}"#),
            Err(CoreError::Configuration(_))
        );
    }

    #[test]
    fn key_rules() {
        let def = AchievementDefinition {
            key: "bad key!".into(),
            name: "Bad".into(),
            description: String::new(),
            icon: None,
            points: 0,
            hidden: false,
            criteria: Criteria::new(CriteriaCategory::WinCount, 1),
        };
        assert_matches!(def.clone().validate(), Err(CoreError::Configuration(_)));

        let trimmed = AchievementDefinition {
            key: "  good_key ".into(),
            ..def
        };
        assert_eq!(trimmed.validate().unwrap().key, "good_key");
    }

    #[test]
    fn missing_file_is_configuration_error() {
        assert_matches!(
            CatalogConfig::from_path(Path::new("/definitely/not/here.json")),
            Err(CoreError::Configuration(_))
        );
    }
}
