//! Passenger wagons, freight wagons and tractive units.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::Deserialize;

use crate::error::{ServiceError, ValidationErrors};
use crate::number;
use crate::repo::reference::{depot, owner, repair_workshop, status};
use crate::schema::{freight_wagons, passenger_wagons, tractive_units};

/// Columns every fleet table shares.
pub trait FleetRow {
    fn id(&self) -> i32;
    fn number(&self) -> &str;
    fn owner_id(&self) -> i32;
    fn status_id(&self) -> i32;
    fn depot_id(&self) -> Option<i32>;
    fn repair_workshop_id(&self) -> Option<i32>;
}

macro_rules! impl_fleet_row {
    ($row:ty) => {
        impl FleetRow for $row {
            fn id(&self) -> i32 {
                self.id
            }

            fn number(&self) -> &str {
                &self.number
            }

            fn owner_id(&self) -> i32 {
                self.owner_id
            }

            fn status_id(&self) -> i32 {
                self.status_id
            }

            fn depot_id(&self) -> Option<i32> {
                self.depot_id
            }

            fn repair_workshop_id(&self) -> Option<i32> {
                self.repair_workshop_id
            }
        }
    };
}

/// Owners, statuses, depots and workshops referenced by a batch of fleet rows.
#[derive(Debug, Default)]
pub struct Lookups {
    pub owners: HashMap<i32, owner::Row>,
    pub statuses: HashMap<i32, status::Row>,
    pub depots: HashMap<i32, depot::Row>,
    pub repair_workshops: HashMap<i32, repair_workshop::Row>,
}

impl Lookups {
    pub fn load<R: FleetRow>(conn: &mut PgConnection, rows: &[R]) -> QueryResult<Self> {
        let owner_ids: Vec<i32> = rows.iter().map(FleetRow::owner_id).collect();
        let status_ids: Vec<i32> = rows.iter().map(FleetRow::status_id).collect();
        let depot_ids: Vec<i32> = rows.iter().filter_map(FleetRow::depot_id).collect();
        let workshop_ids: Vec<i32> = rows
            .iter()
            .filter_map(FleetRow::repair_workshop_id)
            .collect();

        Ok(Self {
            owners: owner::find_many(conn, &owner_ids)?,
            statuses: status::find_many(conn, &status_ids)?,
            depots: depot::find_many(conn, &depot_ids)?,
            repair_workshops: repair_workshop::find_many(conn, &workshop_ids)?,
        })
    }
}

fn validate_number(errors: &mut ValidationErrors, value: &str) {
    if value.is_empty() {
        errors.add("number", "The number field is required.");
    } else if !number::is_valid(value) {
        errors.add("number", "The number must be 12 digits.");
    }
}

/// Restores the order of `ids` on rows fetched with `eq_any`.
fn in_order<R: FleetRow>(ids: &[i32], rows: Vec<R>) -> Vec<R> {
    let mut by_id: HashMap<i32, R> = rows.into_iter().map(|row| (row.id(), row)).collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = passenger_wagons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PassengerWagon {
    pub id: i32,
    pub number: String,
    pub type_id: i32,
    pub owner_id: i32,
    pub status_id: i32,
    pub depot_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    pub repair_date: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl_fleet_row!(PassengerWagon);

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = passenger_wagons, treat_none_as_null = true)]
pub struct PassengerWagonForm {
    pub number: String,
    pub type_id: i32,
    pub owner_id: i32,
    pub status_id: i32,
    pub depot_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    pub repair_date: Option<NaiveDate>,
    pub note: Option<String>,
}

impl PassengerWagonForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        validate_number(&mut errors, &self.number);
        errors.finish()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = freight_wagons)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct FreightWagon {
    pub id: i32,
    pub number: String,
    pub type_id: i32,
    pub owner_id: i32,
    pub status_id: i32,
    pub depot_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    pub repair_valid_until: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl_fleet_row!(FreightWagon);

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = freight_wagons, treat_none_as_null = true)]
pub struct FreightWagonForm {
    pub number: String,
    pub type_id: i32,
    pub owner_id: i32,
    pub status_id: i32,
    pub depot_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    pub repair_valid_until: Option<NaiveDate>,
    pub note: Option<String>,
}

impl FreightWagonForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        validate_number(&mut errors, &self.number);
        errors.finish()
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = tractive_units)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TractiveUnit {
    pub id: i32,
    pub number: String,
    pub name: Option<String>,
    pub owner_id: i32,
    pub status_id: i32,
    pub depot_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    pub repair_valid_until: Option<NaiveDate>,
    pub max_speed: Option<i32>,
    pub power_output: Option<i32>,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl_fleet_row!(TractiveUnit);

#[derive(Debug, Clone, Deserialize, Insertable, AsChangeset)]
#[diesel(table_name = tractive_units, treat_none_as_null = true)]
pub struct TractiveUnitForm {
    pub number: String,
    pub name: Option<String>,
    pub owner_id: i32,
    pub status_id: i32,
    pub depot_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    pub repair_valid_until: Option<NaiveDate>,
    pub max_speed: Option<i32>,
    pub power_output: Option<i32>,
    pub note: Option<String>,
}

impl TractiveUnitForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        validate_number(&mut errors, &self.number);
        for (field, value) in [("max_speed", self.max_speed), ("power_output", self.power_output)] {
            if value.is_some_and(|v| v < 0) {
                errors.add(field, format!("The {} must be at least 0.", field.replace('_', " ")));
            }
        }
        errors.finish()
    }
}

/// Generates the query functions shared by the three fleet tables.
macro_rules! fleet_queries {
    ($row:ty, $form:ty, $table:ident) => {
        pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<$row> {
            $table::table.find(id).select(<$row>::as_select()).first(conn)
        }

        pub fn exists(conn: &mut PgConnection, id: i32) -> QueryResult<bool> {
            diesel::select(diesel::dsl::exists($table::table.find(id))).get_result(conn)
        }

        pub fn find_many(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<Vec<$row>> {
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            $table::table
                .filter($table::id.eq_any(ids))
                .select(<$row>::as_select())
                .load(conn)
        }

        /// Rows for `ids` in the given order; unknown ids are skipped.
        pub fn find_ordered(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<Vec<$row>> {
            Ok(super::in_order(ids, find_many(conn, ids)?))
        }

        /// `(id, number)` of every row, by id.
        pub fn all_numbers(conn: &mut PgConnection) -> QueryResult<Vec<(i32, String)>> {
            $table::table
                .select(($table::id, $table::number))
                .order($table::id)
                .load(conn)
        }

        pub fn create(conn: &mut PgConnection, form: &$form) -> QueryResult<$row> {
            diesel::insert_into($table::table)
                .values(form)
                .returning(<$row>::as_returning())
                .get_result(conn)
        }

        pub fn update(conn: &mut PgConnection, id: i32, form: &$form) -> QueryResult<$row> {
            diesel::update($table::table.find(id))
                .set((form, $table::updated_at.eq(diesel::dsl::now)))
                .returning(<$row>::as_returning())
                .get_result(conn)
        }

        pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
            diesel::delete($table::table.find(id)).execute(conn)
        }
    };
}

pub mod passenger {
    use diesel::dsl::sql;
    use diesel::pg::Pg;
    use diesel::sql_types::{Bool, Date};

    use super::*;
    use crate::repo::filter::{apply_common, order_by_number, FleetFilter};
    use crate::repo::{PageRequest, Paged, PER_PAGE};

    // Repair date shifted by the type's validity; Postgres clamps month ends
    // the same way `dates::add_months` does.
    const VALID_UNTIL: &str = "(passenger_wagons.repair_date + make_interval(months => \
        (SELECT passenger_wagon_types.repair_valid_for FROM passenger_wagon_types \
        WHERE passenger_wagon_types.id = passenger_wagons.type_id)))::date";

    fleet_queries!(PassengerWagon, PassengerWagonForm, passenger_wagons);

    fn filtered<'a>(filter: &FleetFilter, today: NaiveDate) -> passenger_wagons::BoxedQuery<'a, Pg> {
        let mut query = apply_common!(passenger_wagons::table.into_boxed(), passenger_wagons, filter);

        if let Some(id) = filter.type_id {
            query = query.filter(passenger_wagons::type_id.eq(id));
        }
        if let Some((first, last)) = filter.repair_window(today) {
            query = query
                .filter(sql::<Bool>(&format!("{} >= ", VALID_UNTIL)).bind::<Date, _>(first))
                .filter(sql::<Bool>(&format!("{} <= ", VALID_UNTIL)).bind::<Date, _>(last));
        }
        query
    }

    pub fn list(
        conn: &mut PgConnection,
        filter: &FleetFilter,
        page: PageRequest,
        today: NaiveDate,
    ) -> QueryResult<Paged<PassengerWagon>> {
        let total = filtered(filter, today).count().get_result(conn)?;
        let items = order_by_number!(filtered(filter, today), passenger_wagons, filter.sort)
            .select(PassengerWagon::as_select())
            .limit(PER_PAGE)
            .offset(page.offset())
            .load(conn)?;

        Ok(Paged {
            items,
            total,
            page: Some(page),
        })
    }
}

pub mod freight {
    use diesel::pg::Pg;

    use super::*;
    use crate::repo::filter::{apply_common, order_by_number, FleetFilter};
    use crate::repo::{PageRequest, Paged, PER_PAGE};

    fleet_queries!(FreightWagon, FreightWagonForm, freight_wagons);

    fn filtered<'a>(filter: &FleetFilter, today: NaiveDate) -> freight_wagons::BoxedQuery<'a, Pg> {
        let mut query = apply_common!(freight_wagons::table.into_boxed(), freight_wagons, filter);

        if let Some(id) = filter.type_id {
            query = query.filter(freight_wagons::type_id.eq(id));
        }
        if let Some((first, last)) = filter.repair_window(today) {
            query = query.filter(freight_wagons::repair_valid_until.between(first, last));
        }
        query
    }

    pub fn list(
        conn: &mut PgConnection,
        filter: &FleetFilter,
        page: PageRequest,
        today: NaiveDate,
    ) -> QueryResult<Paged<FreightWagon>> {
        let total = filtered(filter, today).count().get_result(conn)?;
        let items = order_by_number!(filtered(filter, today), freight_wagons, filter.sort)
            .select(FreightWagon::as_select())
            .limit(PER_PAGE)
            .offset(page.offset())
            .load(conn)?;

        Ok(Paged {
            items,
            total,
            page: Some(page),
        })
    }
}

pub mod tractive {
    use diesel::pg::Pg;

    use super::*;
    use crate::repo::filter::{apply_common, order_by_number, FleetFilter};
    use crate::repo::{PageRequest, Paged, PER_PAGE};

    fleet_queries!(TractiveUnit, TractiveUnitForm, tractive_units);

    // Tractive units have no type table, so `type_id` does not apply.
    fn filtered<'a>(filter: &FleetFilter, today: NaiveDate) -> tractive_units::BoxedQuery<'a, Pg> {
        let mut query = apply_common!(tractive_units::table.into_boxed(), tractive_units, filter);

        if let Some((first, last)) = filter.repair_window(today) {
            query = query.filter(tractive_units::repair_valid_until.between(first, last));
        }
        query
    }

    pub fn list(
        conn: &mut PgConnection,
        filter: &FleetFilter,
        page: PageRequest,
        today: NaiveDate,
    ) -> QueryResult<Paged<TractiveUnit>> {
        let total = filtered(filter, today).count().get_result(conn)?;
        let items = order_by_number!(filtered(filter, today), tractive_units, filter.sort)
            .select(TractiveUnit::as_select())
            .limit(PER_PAGE)
            .offset(page.offset())
            .load(conn)?;

        Ok(Paged {
            items,
            total,
            page: Some(page),
        })
    }
}
