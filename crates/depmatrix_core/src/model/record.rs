//! Persisted matrix record and create/edit requests.
//!
//! # Responsibility
//! - Define the stored document shape (`id`, info fields, `data`, `sharedWith`).
//! - Validate admin-supplied create and info-edit input.
//!
//! # Invariants
//! - `title` and `keyword` are never blank on a stored record.
//! - `data` satisfies `Matrix::validate()` whenever the record is persisted.
//! - Updates replace the whole document; there is no version token.

use crate::model::matrix::Matrix;
use crate::model::user::UserId;
use crate::model::validation::{require_non_empty, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable matrix identifier.
pub type MatrixId = Uuid;

/// Stored matrix document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRecord {
    pub id: MatrixId,
    pub title: String,
    pub description: String,
    /// Shared secret gating non-admin access.
    pub keyword: String,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub data: Matrix,
    /// Users that unlocked this matrix. Derived from access grants on read.
    #[serde(default)]
    pub shared_with: Vec<UserId>,
}

impl MatrixRecord {
    /// Builds a record from a validated create request.
    pub fn from_request(request: NewMatrix, created_by: UserId) -> Result<Self, ValidationError> {
        request.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            title: request.title.trim().to_string(),
            description: request.description.trim().to_string(),
            keyword: request.keyword,
            created_at: Utc::now(),
            created_by,
            data: request.data.unwrap_or_else(Matrix::default_seed),
            shared_with: Vec::new(),
        })
    }

    /// Re-checks required info fields before a whole-document save.
    pub fn validate_info(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)?;
        require_non_empty("keyword", &self.keyword)?;
        Ok(())
    }

    /// Keyword-free view used by list screens.
    pub fn summary(&self) -> MatrixSummary {
        MatrixSummary {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            created_by: self.created_by,
            attribute_count: self.data.rows().len(),
        }
    }
}

/// Matrix list entry. Never carries the access keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixSummary {
    pub id: MatrixId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub attribute_count: usize,
}

/// Admin create request: `{title, description, keyword, data?}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewMatrix {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub keyword: String,
    /// Seeded with `Matrix::default_seed()` when absent.
    #[serde(default)]
    pub data: Option<Matrix>,
}

impl NewMatrix {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        keyword: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            keyword: keyword.into(),
            data: None,
        }
    }

    /// # Errors
    /// - `RequiredFieldMissing` for blank `title` or `keyword`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("title", &self.title)?;
        require_non_empty("keyword", &self.keyword)?;
        if let Some(data) = &self.data {
            data.validate().map_err(|err| ValidationError::InvalidValue {
                field: "data",
                reason: err.to_string(),
            })?;
        }
        Ok(())
    }
}

/// Partial edit of the descriptive fields. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixInfoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keyword: Option<String>,
}

impl MatrixInfoUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.keyword.is_none()
    }

    /// Applies the edit in place, rejecting blank title or keyword.
    pub fn apply_to(&self, record: &mut MatrixRecord) -> Result<(), ValidationError> {
        let title = self
            .title
            .as_deref()
            .map(|title| require_non_empty("title", title))
            .transpose()?;
        if let Some(keyword) = &self.keyword {
            require_non_empty("keyword", keyword)?;
        }

        if let Some(title) = title {
            record.title = title.to_string();
        }
        if let Some(keyword) = &self.keyword {
            record.keyword = keyword.clone();
        }
        if let Some(description) = &self.description {
            record.description = description.trim().to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MatrixInfoUpdate, MatrixRecord, NewMatrix};
    use crate::model::validation::ValidationError;
    use uuid::Uuid;

    #[test]
    fn create_requires_title_and_keyword() {
        let missing_title = NewMatrix::new("  ", "desc", "secret");
        assert_eq!(
            missing_title.validate().unwrap_err(),
            ValidationError::RequiredFieldMissing { field: "title" }
        );

        let missing_keyword = NewMatrix::new("Tug selection", "desc", "");
        assert_eq!(
            missing_keyword.validate().unwrap_err(),
            ValidationError::RequiredFieldMissing { field: "keyword" }
        );
    }

    #[test]
    fn from_request_seeds_default_rows() {
        let request = NewMatrix::new("Tug selection", "", "secret");
        let record = MatrixRecord::from_request(request, Uuid::new_v4()).unwrap();
        let ids: Vec<_> = record.data.rows().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(record.data.dependencies().is_empty());
        assert!(record.shared_with.is_empty());
    }

    #[test]
    fn record_uses_camel_case_wire_fields() {
        let request = NewMatrix::new("Tug selection", "", "secret");
        let record = MatrixRecord::from_request(request, Uuid::new_v4()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("createdBy").is_some());
        assert!(json.get("sharedWith").is_some());
        assert!(json["data"]["dependencies"].as_object().unwrap().is_empty());

        let summary = serde_json::to_value(record.summary()).unwrap();
        assert!(summary.get("keyword").is_none());
    }

    #[test]
    fn info_update_rejects_blank_keyword_and_keeps_other_fields() {
        let mut record =
            MatrixRecord::from_request(NewMatrix::new("Old", "d", "secret"), Uuid::new_v4())
                .unwrap();
        let blank = MatrixInfoUpdate {
            keyword: Some(" ".to_string()),
            ..MatrixInfoUpdate::default()
        };
        assert!(blank.apply_to(&mut record).is_err());
        assert_eq!(record.keyword, "secret");

        let rename = MatrixInfoUpdate {
            title: Some(" New ".to_string()),
            ..MatrixInfoUpdate::default()
        };
        rename.apply_to(&mut record).unwrap();
        assert_eq!(record.title, "New");
        assert_eq!(record.description, "d");
    }

    #[test]
    fn info_update_is_all_or_nothing() {
        let mut record =
            MatrixRecord::from_request(NewMatrix::new("Old", "d", "secret"), Uuid::new_v4())
                .unwrap();
        let update = MatrixInfoUpdate {
            title: Some("New".to_string()),
            keyword: Some(String::new()),
            ..MatrixInfoUpdate::default()
        };
        assert!(update.apply_to(&mut record).is_err());
        assert_eq!(record.title, "Old");
    }
}
