use chrono::{NaiveDate, NaiveDateTime};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::Deserialize;

use crate::error::{ServiceError, ValidationErrors};
use crate::repo::{PageRequest, Paged, PER_PAGE};
use crate::rolling_stock;
use crate::schema::repairs;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = repairs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Repair {
    pub id: i32,
    pub repairable_type: i16,
    pub repairable_id: i32,
    pub repair_type_id: i32,
    pub repair_workshop_id: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = repairs, treat_none_as_null = true)]
pub struct RepairForm {
    pub repairable_type: i16,
    pub repairable_id: i32,
    pub repair_type_id: i32,
    pub repair_workshop_id: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
}

impl RepairForm {
    /// Needs a connection: the repaired vehicle must exist in the table its
    /// type points at.
    pub fn validate(&self, conn: &mut PgConnection) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();

        rolling_stock::validate_reference(
            conn,
            &mut errors,
            "repairable",
            self.repairable_type,
            self.repairable_id,
        )?;
        if self.end_date.is_some_and(|end| end < self.start_date) {
            errors.add(
                "end_date",
                "The end date must be a date after or equal to start date.",
            );
        }
        errors.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepairFilter {
    pub repairable_type: Option<i16>,
    pub repair_workshop_id: Option<i32>,
}

fn filtered<'a>(filter: &RepairFilter) -> repairs::BoxedQuery<'a, Pg> {
    let mut query = repairs::table.into_boxed();
    if let Some(code) = filter.repairable_type {
        query = query.filter(repairs::repairable_type.eq(code));
    }
    if let Some(id) = filter.repair_workshop_id {
        query = query.filter(repairs::repair_workshop_id.eq(id));
    }
    query
}

pub fn list(
    conn: &mut PgConnection,
    filter: &RepairFilter,
    page: PageRequest,
) -> QueryResult<Paged<Repair>> {
    let total = filtered(filter).count().get_result(conn)?;
    let items = filtered(filter)
        .order(repairs::id)
        .select(Repair::as_select())
        .limit(PER_PAGE)
        .offset(page.offset())
        .load(conn)?;

    Ok(Paged {
        items,
        total,
        page: Some(page),
    })
}

pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Repair> {
    repairs::table.find(id).select(Repair::as_select()).first(conn)
}

pub fn create(conn: &mut PgConnection, form: &RepairForm) -> QueryResult<Repair> {
    diesel::insert_into(repairs::table)
        .values(form)
        .returning(Repair::as_returning())
        .get_result(conn)
}

pub fn update(conn: &mut PgConnection, id: i32, form: &RepairForm) -> QueryResult<Repair> {
    diesel::update(repairs::table.find(id))
        .set((form, repairs::updated_at.eq(diesel::dsl::now)))
        .returning(Repair::as_returning())
        .get_result(conn)
}

pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
    diesel::delete(repairs::table.find(id)).execute(conn)
}
