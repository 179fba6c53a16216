use std::collections::HashMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ValidationErrors};
use crate::repo::{PageRequest, Paged, PER_PAGE};
use crate::schema::{freight_wagon_types, passenger_wagon_types};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = freight_wagon_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FreightWagonType {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = freight_wagon_types, treat_none_as_null = true)]
pub struct FreightWagonTypeForm {
    pub name: String,
    pub description: Option<String>,
}

impl FreightWagonTypeForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        errors.finish()
    }
}

/// Wagon type of a passenger coach; `repair_valid_for` is the length of a repair
/// certification in months.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = passenger_wagon_types)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PassengerWagonType {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub repair_valid_for: i32,
    pub passenger_interior_type_id: i32,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = passenger_wagon_types, treat_none_as_null = true)]
pub struct PassengerWagonTypeForm {
    pub name: String,
    pub description: Option<String>,
    pub repair_valid_for: i32,
    pub passenger_interior_type_id: i32,
}

/// Longest repair validity a passenger wagon type may declare, in months.
pub const MAX_REPAIR_VALID_FOR: i32 = 1200;

impl PassengerWagonTypeForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        if self.repair_valid_for < 1 {
            errors.add("repair_valid_for", "The repair valid for must be at least 1.");
        } else if self.repair_valid_for > MAX_REPAIR_VALID_FOR {
            errors.add(
                "repair_valid_for",
                format!(
                    "The repair valid for may not be greater than {}.",
                    MAX_REPAIR_VALID_FOR
                ),
            );
        }
        errors.finish()
    }
}

pub mod freight {
    use super::*;

    pub fn list(
        conn: &mut PgConnection,
        page: Option<PageRequest>,
    ) -> QueryResult<Paged<FreightWagonType>> {
        let query = freight_wagon_types::table
            .order(freight_wagon_types::id)
            .select(FreightWagonType::as_select());

        match page {
            None => Ok(Paged::all(query.load(conn)?)),
            Some(page) => Ok(Paged {
                total: freight_wagon_types::table.count().get_result(conn)?,
                items: query.limit(PER_PAGE).offset(page.offset()).load(conn)?,
                page: Some(page),
            }),
        }
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<FreightWagonType> {
        freight_wagon_types::table
            .find(id)
            .select(FreightWagonType::as_select())
            .first(conn)
    }

    pub fn find_many(
        conn: &mut PgConnection,
        ids: &[i32],
    ) -> QueryResult<HashMap<i32, FreightWagonType>> {
        let rows = freight_wagon_types::table
            .filter(freight_wagon_types::id.eq_any(ids))
            .select(FreightWagonType::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }

    pub fn create(
        conn: &mut PgConnection,
        form: &FreightWagonTypeForm,
    ) -> QueryResult<FreightWagonType> {
        diesel::insert_into(freight_wagon_types::table)
            .values(form)
            .returning(FreightWagonType::as_returning())
            .get_result(conn)
    }

    pub fn update(
        conn: &mut PgConnection,
        id: i32,
        form: &FreightWagonTypeForm,
    ) -> QueryResult<FreightWagonType> {
        diesel::update(freight_wagon_types::table.find(id))
            .set((form, freight_wagon_types::updated_at.eq(diesel::dsl::now)))
            .returning(FreightWagonType::as_returning())
            .get_result(conn)
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(freight_wagon_types::table.find(id)).execute(conn)
    }
}

pub mod passenger {
    use super::*;

    pub fn list(
        conn: &mut PgConnection,
        page: Option<PageRequest>,
    ) -> QueryResult<Paged<PassengerWagonType>> {
        let query = passenger_wagon_types::table
            .order(passenger_wagon_types::id)
            .select(PassengerWagonType::as_select());

        match page {
            None => Ok(Paged::all(query.load(conn)?)),
            Some(page) => Ok(Paged {
                total: passenger_wagon_types::table.count().get_result(conn)?,
                items: query.limit(PER_PAGE).offset(page.offset()).load(conn)?,
                page: Some(page),
            }),
        }
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<PassengerWagonType> {
        passenger_wagon_types::table
            .find(id)
            .select(PassengerWagonType::as_select())
            .first(conn)
    }

    pub fn find_many(
        conn: &mut PgConnection,
        ids: &[i32],
    ) -> QueryResult<HashMap<i32, PassengerWagonType>> {
        let rows = passenger_wagon_types::table
            .filter(passenger_wagon_types::id.eq_any(ids))
            .select(PassengerWagonType::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }

    pub fn create(
        conn: &mut PgConnection,
        form: &PassengerWagonTypeForm,
    ) -> QueryResult<PassengerWagonType> {
        diesel::insert_into(passenger_wagon_types::table)
            .values(form)
            .returning(PassengerWagonType::as_returning())
            .get_result(conn)
    }

    pub fn update(
        conn: &mut PgConnection,
        id: i32,
        form: &PassengerWagonTypeForm,
    ) -> QueryResult<PassengerWagonType> {
        diesel::update(passenger_wagon_types::table.find(id))
            .set((form, passenger_wagon_types::updated_at.eq(diesel::dsl::now)))
            .returning(PassengerWagonType::as_returning())
            .get_result(conn)
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(passenger_wagon_types::table.find(id)).execute(conn)
    }
}
