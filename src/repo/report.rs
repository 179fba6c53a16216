//! Incident reports filed by passengers.

use chrono::NaiveDateTime;
use diesel::prelude::*;

use crate::error::ValidationErrors;
use crate::repo::{PageRequest, Paged, PER_PAGE};
use crate::schema::passenger_reports;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = passenger_reports)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PassengerReport {
    pub id: i32,
    pub email: String,
    pub problem_description: String,
    pub passenger_wagon_id: Option<i32>,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Default, Insertable)]
#[diesel(table_name = passenger_reports)]
pub struct NewPassengerReport {
    pub email: String,
    pub problem_description: String,
    pub passenger_wagon_id: Option<i32>,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
}

/// Fields staff may correct after intake; the attachment is never replaced.
#[derive(Debug, Clone, serde::Deserialize, AsChangeset)]
#[diesel(table_name = passenger_reports, treat_none_as_null = true)]
pub struct PassengerReportForm {
    pub email: String,
    pub problem_description: String,
    pub passenger_wagon_id: Option<i32>,
}

pub fn validate_fields(email: &str, problem_description: &str) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.required("email", email);
    if !email.trim().is_empty() && !email.contains('@') {
        errors.add("email", "The email must be a valid email address.");
    }
    if problem_description.trim().is_empty() {
        errors.add("problem_description", "The problem description field is required.");
    }
    errors
}

pub fn list(conn: &mut PgConnection, page: PageRequest) -> QueryResult<Paged<PassengerReport>> {
    let total = passenger_reports::table.count().get_result(conn)?;
    let items = passenger_reports::table
        .order(passenger_reports::id)
        .select(PassengerReport::as_select())
        .limit(PER_PAGE)
        .offset(page.offset())
        .load(conn)?;

    Ok(Paged {
        items,
        total,
        page: Some(page),
    })
}

pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<PassengerReport> {
    passenger_reports::table
        .find(id)
        .select(PassengerReport::as_select())
        .first(conn)
}

pub fn create(conn: &mut PgConnection, report: &NewPassengerReport) -> QueryResult<PassengerReport> {
    diesel::insert_into(passenger_reports::table)
        .values(report)
        .returning(PassengerReport::as_returning())
        .get_result(conn)
}

pub fn update(
    conn: &mut PgConnection,
    id: i32,
    form: &PassengerReportForm,
) -> QueryResult<PassengerReport> {
    diesel::update(passenger_reports::table.find(id))
        .set((form, passenger_reports::updated_at.eq(diesel::dsl::now)))
        .returning(PassengerReport::as_returning())
        .get_result(conn)
}

/// Deletes the row and returns it so the caller can remove the attachment.
pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<PassengerReport> {
    diesel::delete(passenger_reports::table.find(id))
        .returning(PassengerReport::as_returning())
        .get_result(conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_an_at_sign() {
        let errors = validate_fields("passenger.example.com", "Broken heating in coach 5");
        assert_eq!(
            errors.get("email"),
            Some(&["The email must be a valid email address.".to_owned()][..])
        );
    }

    #[test]
    fn description_is_required() {
        let errors = validate_fields("a@b.hr", " ");
        assert!(errors.get("problem_description").is_some());
        assert!(errors.get("email").is_none());
    }
}
