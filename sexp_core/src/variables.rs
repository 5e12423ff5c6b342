//! Named, typed mission variables and their persistence policy.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::name_key;
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableType {
    Number,
    String,
}

impl VariableType {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableType::Number => "number",
            VariableType::String => "string",
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceScope {
    /// Reset every mission.
    #[default]
    Local,
    /// Carried across missions for one pilot.
    PlayerPersistent,
    /// Carried across missions within one campaign.
    CampaignPersistent,
}

impl PersistenceScope {
    pub fn is_persistent(self) -> bool {
        !matches!(self, PersistenceScope::Local)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Number(f64),
    String(String),
}

impl VariableValue {
    pub fn value_type(&self) -> VariableType {
        match self {
            VariableValue::Number(_) => VariableType::Number,
            VariableValue::String(_) => VariableType::String,
        }
    }

    /// Textual form used by the persistence triples.
    pub fn to_text(&self) -> String {
        match self {
            VariableValue::Number(n) => n.to_string(),
            VariableValue::String(text) => text.clone(),
        }
    }

    pub fn from_text(value_type: VariableType, text: &str) -> Option<Self> {
        match value_type {
            VariableType::Number => text
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(VariableValue::Number),
            VariableType::String => Some(VariableValue::String(text.to_string())),
        }
    }

    /// Converts an evaluation result into a storable value. `Unknown` has no
    /// storable form.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(VariableValue::Number(*n)),
            Value::Text(text) => Some(VariableValue::String(text.clone())),
            Value::Unknown => None,
        }
    }
}

impl From<VariableValue> for Value {
    fn from(value: VariableValue) -> Self {
        match value {
            VariableValue::Number(n) => Value::Number(n),
            VariableValue::String(text) => Value::Text(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value_type: VariableType,
    pub value: VariableValue,
    pub default_value: VariableValue,
    pub scope: PersistenceScope,
}

/// One `(name, type_tag, value)` triple of a pilot or campaign save record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedVariable {
    pub name: String,
    #[serde(rename = "type")]
    pub type_tag: VariableType,
    pub value: String,
}

/// Persistent entries extracted at mission end, grouped by scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceSnapshot {
    pub player: Vec<PersistedVariable>,
    pub campaign: Vec<PersistedVariable>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum VariableError {
    #[error("variable '{0}' is not declared")]
    Undeclared(String),
    #[error("variable '{name}' holds {expected} values, got {found}")]
    TypeMismatch {
        name: String,
        expected: VariableType,
        found: &'static str,
    },
    #[error("variable '{name}' already declared as {existing}")]
    Redeclared {
        name: String,
        existing: VariableType,
    },
}

/// Flat, case-insensitive variable table for one mission.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    entries: HashMap<String, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable. Declaring an existing name with the same type
    /// updates its default and scope and keeps the current value.
    pub fn declare(
        &mut self,
        name: &str,
        value_type: VariableType,
        default_value: VariableValue,
        scope: PersistenceScope,
    ) -> Result<(), VariableError> {
        if default_value.value_type() != value_type {
            return Err(VariableError::TypeMismatch {
                name: name.to_string(),
                expected: value_type,
                found: default_value.value_type().as_str(),
            });
        }
        if let Some(existing) = self.entries.get_mut(&name_key(name)) {
            if existing.value_type != value_type {
                return Err(VariableError::Redeclared {
                    name: name.to_string(),
                    existing: existing.value_type,
                });
            }
            existing.default_value = default_value;
            existing.scope = scope;
            return Ok(());
        }
        self.entries.insert(
            name_key(name),
            Variable {
                name: name.to_string(),
                value_type,
                value: default_value.clone(),
                default_value,
                scope,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&VariableValue> {
        self.entries.get(&name_key(name)).map(|entry| &entry.value)
    }

    pub fn entry(&self, name: &str) -> Option<&Variable> {
        self.entries.get(&name_key(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name_key(name))
    }

    pub fn set(&mut self, name: &str, value: VariableValue) -> Result<(), VariableError> {
        let entry = self
            .entries
            .get_mut(&name_key(name))
            .ok_or_else(|| VariableError::Undeclared(name.to_string()))?;
        if entry.value_type != value.value_type() {
            return Err(VariableError::TypeMismatch {
                name: entry.name.clone(),
                expected: entry.value_type,
                found: value.value_type().as_str(),
            });
        }
        entry.value = value;
        Ok(())
    }

    /// Stores an evaluation result, rejecting `Unknown` as a type mismatch.
    pub fn set_value(&mut self, name: &str, value: &Value) -> Result<(), VariableError> {
        match VariableValue::from_value(value) {
            Some(stored) => self.set(name, stored),
            None => {
                let entry = self
                    .entry(name)
                    .ok_or_else(|| VariableError::Undeclared(name.to_string()))?;
                Err(VariableError::TypeMismatch {
                    name: entry.name.clone(),
                    expected: entry.value_type,
                    found: value.kind_name(),
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.entries.values()
    }

    /// Overwrites the defaults (and current values) of declared variables with
    /// matching persisted entries. Returns how many entries were applied.
    ///
    /// Undeclared names are ignored; a persisted entry whose type disagrees
    /// with the declaration is skipped and logged.
    pub fn apply_persisted(&mut self, persisted: &[PersistedVariable]) -> usize {
        let mut applied = 0;
        for saved in persisted {
            let Some(entry) = self.entries.get_mut(&name_key(&saved.name)) else {
                continue;
            };
            if !entry.scope.is_persistent() {
                continue;
            }
            if entry.value_type != saved.type_tag {
                tracing::warn!(
                    target: "sexp::variables",
                    name = %saved.name,
                    declared = %entry.value_type,
                    saved = %saved.type_tag,
                    "variables.persisted_type_mismatch"
                );
                continue;
            }
            let Some(value) = VariableValue::from_text(saved.type_tag, &saved.value) else {
                tracing::warn!(
                    target: "sexp::variables",
                    name = %saved.name,
                    value = %saved.value,
                    "variables.persisted_value_invalid"
                );
                continue;
            };
            entry.default_value = value.clone();
            entry.value = value;
            applied += 1;
        }
        applied
    }

    /// Restores every variable to its default value.
    pub fn reset_to_defaults(&mut self) {
        for entry in self.entries.values_mut() {
            entry.value = entry.default_value.clone();
        }
    }

    /// Persistent entries in `scope`, sorted by name.
    pub fn persisted(&self, scope: PersistenceScope) -> Vec<PersistedVariable> {
        let mut entries: Vec<PersistedVariable> = self
            .entries
            .values()
            .filter(|entry| entry.scope == scope && scope.is_persistent())
            .map(|entry| PersistedVariable {
                name: entry.name.clone(),
                type_tag: entry.value_type,
                value: entry.value.to_text(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Mission-end transition: extracts persistent entries and discards the
    /// mission-local ones.
    pub fn end_mission(&mut self) -> PersistenceSnapshot {
        let snapshot = PersistenceSnapshot {
            player: self.persisted(PersistenceScope::PlayerPersistent),
            campaign: self.persisted(PersistenceScope::CampaignPersistent),
        };
        self.entries.retain(|_, entry| entry.scope.is_persistent());
        snapshot
    }
}
