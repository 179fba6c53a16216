//! `multipart/form-data` bodies with one file part and plain text fields.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::api::{ServiceError, ValidationErrors};

#[derive(Debug)]
pub struct UploadedFile {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct FormData {
    fields: HashMap<String, Vec<String>>,
    pub file: Option<UploadedFile>,
}

impl FormData {
    /// Collects every part; the part named `file_field` is kept as the file.
    pub async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, ServiceError> {
        let mut form = FormData::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| ServiceError::BadRequest(err.body_text()))?
        {
            let name = field.name().unwrap_or_default().trim_end_matches("[]").to_owned();

            if name == file_field {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ServiceError::BadRequest(err.body_text()))?;
                if !bytes.is_empty() {
                    form.file = Some(UploadedFile {
                        bytes: bytes.to_vec(),
                    });
                }
            } else {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ServiceError::BadRequest(err.body_text()))?;
                form.fields.entry(name).or_default().push(value);
            }
        }

        Ok(form)
    }

    #[cfg(test)]
    pub fn from_fields(fields: &[(&str, &str)]) -> Self {
        let mut form = FormData::default();
        for (name, value) in fields {
            form.fields
                .entry(name.to_string())
                .or_default()
                .push(value.to_string());
        }
        form
    }

    /// Last non-empty value of a text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.last())
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// All values of a repeated id field; each value may itself be a
    /// comma-separated list.
    pub fn ids(&self, name: &str, errors: &mut ValidationErrors) -> Vec<i32> {
        let mut ids = Vec::new();
        for value in self.fields.get(name).into_iter().flatten() {
            for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                match part.parse() {
                    Ok(id) => ids.push(id),
                    Err(_) => {
                        errors.invalid_reference(name);
                        return Vec::new();
                    }
                }
            }
        }
        ids
    }

    pub fn id(&self, name: &str, errors: &mut ValidationErrors) -> Option<i32> {
        let value = self.text(name)?;
        match value.parse() {
            Ok(id) => Some(id),
            Err(_) => {
                errors.invalid_reference(name);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_and_comma_separated_ids_are_merged() {
        let form = FormData::from_fields(&[
            ("freight_wagon_ids", "3"),
            ("freight_wagon_ids", "4, 7"),
        ]);
        let mut errors = ValidationErrors::new();
        assert_eq!(form.ids("freight_wagon_ids", &mut errors), vec![3, 4, 7]);
        assert!(form.ids("tractive_unit_ids", &mut errors).is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn malformed_ids_are_reported() {
        let form = FormData::from_fields(&[("passenger_wagon_id", "coach")]);
        let mut errors = ValidationErrors::new();
        assert_eq!(form.id("passenger_wagon_id", &mut errors), None);
        assert!(errors.get("passenger_wagon_id").is_some());
    }

    #[test]
    fn blank_text_is_absent() {
        let form = FormData::from_fields(&[("title", "  ")]);
        assert_eq!(form.text("title"), None);
    }
}
