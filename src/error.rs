use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind};
use serde::Serialize;
use serde_json::json;

/// Per-field validation messages, rendered as `{"errors": {field: [..]}}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, format!("The {} field is required.", humanize(field)));
        } else if value.chars().count() > 255 {
            self.add(
                field,
                format!("The {} may not be greater than 255 characters.", humanize(field)),
            );
        }
    }

    pub fn invalid_reference(&mut self, field: &str) {
        self.add(field, format!("The selected {} is invalid.", humanize(field)));
    }

    /// `Ok(())` when nothing was recorded.
    pub fn finish(self) -> Result<(), ServiceError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self))
        }
    }
}

pub fn humanize(field: &str) -> String {
    field.replace('_', " ")
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unauthenticated.")]
    Unauthenticated,

    #[error("This action is unauthorized.")]
    Forbidden,

    #[error("Not found.")]
    NotFound,

    #[error("The given data was invalid.")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("The record is still referenced by {0}.")]
    Conflict(String),

    #[error("The search service is not available")]
    SearchUnavailable,

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::SearchUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) | Self::Database(_) | Self::Pool(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Maps a failed delete: a foreign-key violation means other rows still
    /// point at the record.
    pub fn from_delete(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Conflict(info.table_name().unwrap_or("other records").to_owned())
            }
            other => other.into(),
        }
    }
}

impl From<diesel::result::Error> for ServiceError {
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::Error;

        match err {
            Error::NotFound => Self::NotFound,
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let field = constraint_field(info.as_ref(), "_key");
                Self::Validation(ValidationErrors::single(
                    &field,
                    format!("The {} has already been taken.", humanize(&field)),
                ))
            }
            Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                let field = constraint_field(info.as_ref(), "_fkey");
                let mut errors = ValidationErrors::new();
                errors.invalid_reference(&field);
                Self::Validation(errors)
            }
            Error::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                let field = constraint_field(info.as_ref(), "_range");
                Self::Validation(ValidationErrors::single(
                    &field,
                    format!("The {} is out of range.", humanize(&field)),
                ))
            }
            other => Self::Database(other),
        }
    }
}

// Constraints are named `<table>_<column>_key`, `_fkey` or `_range`.
fn constraint_field(info: &dyn DatabaseErrorInformation, suffix: &str) -> String {
    let constraint = info.constraint_name().unwrap_or_default();
    let table = info.table_name().unwrap_or_default();

    constraint
        .strip_suffix(suffix)
        .map(|rest| {
            rest.strip_prefix(table)
                .and_then(|rest| rest.strip_prefix('_'))
                .unwrap_or(rest)
        })
        .filter(|field| !field.is_empty())
        .unwrap_or("id")
        .to_owned()
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            log::error!("{}", self);
        }

        let body = match self {
            Self::Validation(errors) => json!({
                "message": "The given data was invalid.",
                "errors": errors,
            }),
            Self::Storage(_) | Self::Database(_) | Self::Pool(_) | Self::Internal(_) => json!({
                "message": "The server has encountered an internal error",
            }),
            other => json!({ "message": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_messages_group_by_field() {
        let mut errors = ValidationErrors::new();
        errors.required("name", "  ");
        errors.invalid_reference("depot_id");
        errors.add("depot_id", "second");

        assert_eq!(
            errors.get("name"),
            Some(&["The name field is required.".to_owned()][..])
        );
        assert_eq!(errors.get("depot_id").map(<[String]>::len), Some(2));
        assert!(matches!(errors.finish(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn empty_errors_pass() {
        let mut errors = ValidationErrors::new();
        errors.required("name", "Depot Zagreb");
        assert!(errors.finish().is_ok());
    }

    #[test]
    fn overlong_values_are_rejected() {
        let mut errors = ValidationErrors::new();
        errors.required("name", &"x".repeat(256));
        assert!(!errors.is_empty());
    }

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ServiceError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ServiceError::Validation(ValidationErrors::new()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::from(diesel::result::Error::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::SearchUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
