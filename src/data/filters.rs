//! Listing filters, sorting and pagination metadata.

use serde::Serialize;
use validator::{ValidationError, ValidationErrors};

/// Sort keys clients may ask for. A leading `-` means descending.
pub const SORT_SAFELIST: [&str; 4] = ["id", "title", "-id", "-title"];

pub const MAX_PAGE: u64 = 10_000_000;
pub const MAX_PAGE_SIZE: u64 = 100;

/// What to match when listing foods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoodFilter {
    /// Case-insensitive substring of the title; empty matches everything.
    pub title: String,
    /// Every listed type must be present on the record.
    pub types: Vec<String>,
}

/// Pagination and ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: u64,
    pub page_size: u64,
    pub sort: String,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: "id".to_string(),
        }
    }
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

impl Filters {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.page == 0 {
            errors.add("page", error("range", "must be greater than zero"));
        } else if self.page > MAX_PAGE {
            errors.add("page", error("range", "must be a maximum of 10 million"));
        }
        if self.page_size == 0 {
            errors.add("page_size", error("range", "must be greater than zero"));
        } else if self.page_size > MAX_PAGE_SIZE {
            errors.add("page_size", error("range", "must be a maximum of 100"));
        }
        if !SORT_SAFELIST.contains(&self.sort.as_str()) {
            errors.add("sort", error("safelist", "invalid sort value"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Column to order by. Only ever returns a safelisted column name.
    pub fn sort_column(&self) -> &'static str {
        match self.sort.trim_start_matches('-') {
            "title" => "title",
            _ => "id",
        }
    }

    pub fn sort_direction(&self) -> &'static str {
        if self.sort.starts_with('-') {
            "DESC"
        } else {
            "ASC"
        }
    }

    pub fn limit(&self) -> u64 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// Pagination metadata returned with a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: u64,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl Metadata {
    pub fn calculate(total_records: u64, page: u64, page_size: u64) -> Self {
        if total_records == 0 {
            return Self::default();
        }
        Self {
            current_page: page,
            page_size,
            first_page: 1,
            last_page: total_records.div_ceil(page_size),
            total_records,
        }
    }
}
