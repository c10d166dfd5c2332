//! The food resource and its field-level validation.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use validator::{ValidationError, ValidationErrors};

/// Maximum title length in bytes.
pub const MAX_TITLE_BYTES: usize = 500;
/// Maximum number of types a food can carry.
pub const MAX_TYPES: usize = 5;

/// A persisted food record.
///
/// `version` starts at 1 and is incremented by exactly one on every
/// successful update; it is the only thing that decides whether a write
/// raced with another one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    /// Seconds since the Unix epoch.
    pub created_at: u64,
    pub title: String,
    pub types: Vec<String>,
    pub version: i32,
}

/// Fields supplied by a client when creating a food.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewFood {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub types: Vec<String>,
}

/// Partial update: absent fields leave the record unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FoodPatch {
    pub title: Option<String>,
    pub types: Option<Vec<String>>,
}

impl FoodPatch {
    pub fn apply(self, food: &mut Food) {
        if let Some(title) = self.title {
            food.title = title;
        }
        if let Some(types) = self.types {
            food.types = types;
        }
    }
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Validate a title.
pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        return Err(error("required", "must be provided"));
    }
    if title.len() > MAX_TITLE_BYTES {
        return Err(error("length", "must not be more than 500 bytes long"));
    }
    Ok(())
}

/// Validate the list of types.
pub fn validate_types(types: &[String]) -> Result<(), ValidationError> {
    if types.is_empty() {
        return Err(error("required", "must contain at least 1 type"));
    }
    if types.len() > MAX_TYPES {
        return Err(error("length", "must not contain more than 5 types"));
    }
    if types.iter().any(|t| t.trim().is_empty()) {
        return Err(error("blank", "must not contain empty types"));
    }
    let mut seen = HashSet::with_capacity(types.len());
    if !types.iter().all(|t| seen.insert(t.as_str())) {
        return Err(error("unique", "must not contain duplicate values"));
    }
    Ok(())
}

fn collect(title: &str, types: &[String]) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Err(err) = validate_title(title) {
        errors.add("title", err);
    }
    if let Err(err) = validate_types(types) {
        errors.add("types", err);
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl NewFood {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        collect(&self.title, &self.types)
    }
}

impl Food {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        collect(&self.title, &self.types)
    }
}
