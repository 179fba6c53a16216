//! Lookup tables that consist of nothing but a name.

macro_rules! reference_table {
    ($(#[$meta:meta])* $module:ident, $table:ident) => {
        $(#[$meta])*
        pub mod $module {
            use std::collections::HashMap;

            use chrono::NaiveDateTime;
            use diesel::prelude::*;
            use serde::Serialize;

            use crate::repo::{PageRequest, Paged, PER_PAGE};
            use crate::schema::$table;

            #[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
            #[diesel(table_name = $table)]
            #[diesel(check_for_backend(diesel::pg::Pg))]
            pub struct Row {
                pub id: i32,
                pub name: String,
                #[serde(serialize_with = "crate::dates::serialize_timestamp")]
                pub created_at: NaiveDateTime,
                #[serde(serialize_with = "crate::dates::serialize_timestamp")]
                pub updated_at: NaiveDateTime,
            }

            pub fn list(
                conn: &mut PgConnection,
                page: Option<PageRequest>,
            ) -> QueryResult<Paged<Row>> {
                let query = $table::table.order($table::id).select(Row::as_select());

                match page {
                    None => Ok(Paged::all(query.load(conn)?)),
                    Some(page) => {
                        let total = $table::table.count().get_result(conn)?;
                        let items = query.limit(PER_PAGE).offset(page.offset()).load(conn)?;
                        Ok(Paged {
                            items,
                            total,
                            page: Some(page),
                        })
                    }
                }
            }

            pub fn find(conn: &mut PgConnection, id: i32) -> QueryResult<Row> {
                $table::table.find(id).select(Row::as_select()).first(conn)
            }

            pub fn find_many(conn: &mut PgConnection, ids: &[i32]) -> QueryResult<HashMap<i32, Row>> {
                if ids.is_empty() {
                    return Ok(HashMap::new());
                }

                let rows = $table::table
                    .filter($table::id.eq_any(ids))
                    .select(Row::as_select())
                    .load(conn)?;
                Ok(rows.into_iter().map(|row| (row.id, row)).collect())
            }

            pub fn create(conn: &mut PgConnection, name: &str) -> QueryResult<Row> {
                diesel::insert_into($table::table)
                    .values($table::name.eq(name))
                    .returning(Row::as_returning())
                    .get_result(conn)
            }

            pub fn update(conn: &mut PgConnection, id: i32, name: &str) -> QueryResult<Row> {
                diesel::update($table::table.find(id))
                    .set(($table::name.eq(name), $table::updated_at.eq(diesel::dsl::now)))
                    .returning(Row::as_returning())
                    .get_result(conn)
            }

            pub fn delete(conn: &mut PgConnection, id: i32) -> QueryResult<usize> {
                diesel::delete($table::table.find(id)).execute(conn)
            }
        }
    };
}

reference_table!(
    /// Home depots of the rolling stock.
    depot,
    depots
);
reference_table!(owner, owners);
reference_table!(
    /// Operational states such as "in service" or "stored".
    status,
    statuses
);
reference_table!(repair_workshop, repair_workshops);
reference_table!(repair_type, repair_types);
reference_table!(passenger_interior_type, passenger_interior_types);
