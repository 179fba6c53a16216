//! Timetables, the trains running under them and their daily compositions.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::pg::Pg;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ValidationErrors};
use crate::repo::{PageRequest, Paged, PER_PAGE};
use crate::rolling_stock;
use crate::schema::{rolling_stock_trains, timetables, trains};

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = timetables)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Timetable {
    pub id: i32,
    pub name: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(serialize_with = "crate::dates::serialize_timestamp")]
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = timetables)]
pub struct TimetableForm {
    pub name: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

impl TimetableForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        if self.valid_to < self.valid_from {
            errors.add(
                "valid_to",
                "The valid to must be a date after or equal to valid from.",
            );
        }
        errors.finish()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = trains)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Train {
    pub id: i32,
    pub number: String,
    pub name: Option<String>,
    pub timetable_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = trains, treat_none_as_null = true)]
pub struct TrainForm {
    pub number: String,
    pub name: Option<String>,
    pub timetable_id: i32,
}

impl TrainForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("number", &self.number);
        if self.number.chars().count() > 16 {
            errors.add("number", "The number may not be greater than 16 characters.");
        }
        errors.finish()
    }
}

/// One vehicle at one position of a train on a given day.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = rolling_stock_trains)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct RollingStockTrain {
    pub id: i32,
    pub train_id: i32,
    pub position: i32,
    pub date: NaiveDate,
    pub trainable_type: i16,
    pub trainable_id: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = rolling_stock_trains)]
pub struct RollingStockTrainForm {
    pub train_id: i32,
    pub position: i32,
    pub date: NaiveDate,
    pub trainable_type: i16,
    pub trainable_id: i32,
}

impl RollingStockTrainForm {
    pub fn validate(&self, conn: &mut PgConnection) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();

        if self.position < 1 {
            errors.add("position", "The position must be at least 1.");
        }
        rolling_stock::validate_reference(
            conn,
            &mut errors,
            "trainable",
            self.trainable_type,
            self.trainable_id,
        )?;
        errors.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RollingStockTrainFilter {
    pub train_id: Option<i32>,
    pub date: Option<NaiveDate>,
    pub trainable_type: Option<i16>,
}

pub mod timetable {
    use super::*;

    pub fn list(conn: &mut PgConnection, page: Option<PageRequest>) -> QueryResult<Paged<Timetable>> {
        let query = timetables::table
            .order(timetables::id)
            .select(Timetable::as_select());

        match page {
            None => Ok(Paged::all(query.load(conn)?)),
            Some(page) => Ok(Paged {
                total: timetables::table.count().get_result(conn)?,
                items: query.limit(PER_PAGE).offset(page.offset()).load(conn)?,
                page: Some(page),
            }),
        }
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Timetable> {
        timetables::table.find(id).select(Timetable::as_select()).first(conn)
    }

    pub fn find_many(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<HashMap<i32, Timetable>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = timetables::table
            .filter(timetables::id.eq_any(ids))
            .select(Timetable::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }

    pub fn create(conn: &mut PgConnection, form: &TimetableForm) -> QueryResult<Timetable> {
        diesel::insert_into(timetables::table)
            .values(form)
            .returning(Timetable::as_returning())
            .get_result(conn)
    }

    pub fn update(conn: &mut PgConnection, id: i32, form: &TimetableForm) -> QueryResult<Timetable> {
        diesel::update(timetables::table.find(id))
            .set((form, timetables::updated_at.eq(diesel::dsl::now)))
            .returning(Timetable::as_returning())
            .get_result(conn)
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(timetables::table.find(id)).execute(conn)
    }
}

pub mod train {
    use super::*;

    pub fn list(conn: &mut PgConnection, page: Option<PageRequest>) -> QueryResult<Paged<Train>> {
        let query = trains::table.order(trains::id).select(Train::as_select());

        match page {
            None => Ok(Paged::all(query.load(conn)?)),
            Some(page) => Ok(Paged {
                total: trains::table.count().get_result(conn)?,
                items: query.limit(PER_PAGE).offset(page.offset()).load(conn)?,
                page: Some(page),
            }),
        }
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Train> {
        trains::table.find(id).select(Train::as_select()).first(conn)
    }

    pub fn find_many(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<HashMap<i32, Train>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = trains::table
            .filter(trains::id.eq_any(ids))
            .select(Train::as_select())
            .load(conn)?;
        Ok(rows.into_iter().map(|row| (row.id, row)).collect())
    }

    /// Rows for `ids` in the given order; unknown ids are skipped.
    pub fn find_ordered(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<Vec<Train>> {
        let mut by_id = find_many(conn, ids)?;
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    pub fn all(conn: &mut PgConnection) -> QueryResult<Vec<Train>> {
        trains::table.order(trains::id).select(Train::as_select()).load(conn)
    }

    pub fn create(conn: &mut PgConnection, form: &TrainForm) -> QueryResult<Train> {
        diesel::insert_into(trains::table)
            .values(form)
            .returning(Train::as_returning())
            .get_result(conn)
    }

    pub fn update(conn: &mut PgConnection, id: i32, form: &TrainForm) -> QueryResult<Train> {
        diesel::update(trains::table.find(id))
            .set((form, trains::updated_at.eq(diesel::dsl::now)))
            .returning(Train::as_returning())
            .get_result(conn)
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(trains::table.find(id)).execute(conn)
    }
}

pub mod composition {
    use super::*;

    fn filtered<'a>(filter: &RollingStockTrainFilter) -> rolling_stock_trains::BoxedQuery<'a, Pg> {
        let mut query = rolling_stock_trains::table.into_boxed();
        if let Some(id) = filter.train_id {
            query = query.filter(rolling_stock_trains::train_id.eq(id));
        }
        if let Some(date) = filter.date {
            query = query.filter(rolling_stock_trains::date.eq(date));
        }
        if let Some(code) = filter.trainable_type {
            query = query.filter(rolling_stock_trains::trainable_type.eq(code));
        }
        query
    }

    pub fn list(
        conn: &mut PgConnection,
        filter: &RollingStockTrainFilter,
        page: PageRequest,
    ) -> QueryResult<Paged<RollingStockTrain>> {
        let total = filtered(filter).count().get_result(conn)?;
        let items = filtered(filter)
            .order((rolling_stock_trains::position, rolling_stock_trains::id))
            .select(RollingStockTrain::as_select())
            .limit(PER_PAGE)
            .offset(page.offset())
            .load(conn)?;

        Ok(Paged {
            items,
            total,
            page: Some(page),
        })
    }

    pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<RollingStockTrain> {
        rolling_stock_trains::table
            .find(id)
            .select(RollingStockTrain::as_select())
            .first(conn)
    }

    pub fn create(
        conn: &mut PgConnection,
        form: &RollingStockTrainForm,
    ) -> QueryResult<RollingStockTrain> {
        diesel::insert_into(rolling_stock_trains::table)
            .values(form)
            .returning(RollingStockTrain::as_returning())
            .get_result(conn)
    }

    pub fn update(
        conn: &mut PgConnection,
        id: i32,
        form: &RollingStockTrainForm,
    ) -> QueryResult<RollingStockTrain> {
        diesel::update(rolling_stock_trains::table.find(id))
            .set((form, rolling_stock_trains::updated_at.eq(diesel::dsl::now)))
            .returning(RollingStockTrain::as_returning())
            .get_result(conn)
    }

    pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
        diesel::delete(rolling_stock_trains::table.find(id)).execute(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn timetable_range_must_not_be_inverted() {
        let form = TimetableForm {
            name: "Winter 2024".to_owned(),
            valid_from: date(2024, 12, 15),
            valid_to: date(2024, 12, 14),
        };
        let Err(ServiceError::Validation(errors)) = form.validate() else {
            panic!("expected validation failure");
        };
        assert!(errors.get("valid_to").is_some());

        let same_day = TimetableForm {
            valid_to: date(2024, 12, 15),
            ..form
        };
        assert!(same_day.validate().is_ok());
    }

    #[test]
    fn train_numbers_are_required() {
        let form = TrainForm {
            number: String::new(),
            name: None,
            timetable_id: 1,
        };
        assert!(form.validate().is_err());
    }
}
