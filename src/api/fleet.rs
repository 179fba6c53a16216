//! Passenger wagons, freight wagons and tractive units.
//!
//! The three resources share one handler set generated by `fleet_api!`; they
//! differ only in how a row is presented.

use chrono::NaiveDate;
use diesel::PgConnection;
use serde::Serialize;

use crate::api::wagon_type::PassengerWagonTypeResource;
use crate::dates;
use crate::error::ServiceError;
use crate::number::{self, NumberStyle};
use crate::repo::fleet::{FleetRow, FreightWagon, Lookups, PassengerWagon, TractiveUnit};
use crate::repo::reference::{depot, owner, passenger_interior_type, repair_workshop, status};
use crate::repo::wagon_type::{self, FreightWagonType};
use crate::rolling_stock::{RollingStock, RollingStockKind};

/// Display forms of a vehicle number.
#[derive(Debug, Serialize)]
pub struct Numbers {
    pub number: String,
    pub stylized_number: String,
    pub short_stylized_number: String,
}

impl Numbers {
    pub fn new(number: &str, style: NumberStyle) -> Self {
        Numbers {
            number: number.to_owned(),
            stylized_number: number::stylize(number, style),
            short_stylized_number: number::stylize_short(number, style),
        }
    }
}

/// Compact form of a resolved polymorphic target.
#[derive(Debug, Serialize)]
pub struct VehicleSummary {
    pub id: i32,
    #[serde(rename = "type")]
    pub kind: RollingStockKind,
    #[serde(flatten)]
    pub numbers: Numbers,
}

impl VehicleSummary {
    pub fn of(vehicle: &RollingStock) -> Self {
        VehicleSummary {
            id: vehicle.id(),
            kind: vehicle.kind(),
            numbers: Numbers::new(vehicle.number(), vehicle.kind().number_style()),
        }
    }
}

/// Reference rows every vehicle points at.
#[derive(Debug, Serialize)]
pub struct Placement {
    pub owner: Option<owner::Row>,
    pub status: Option<status::Row>,
    pub depot: Option<depot::Row>,
    pub repair_workshop: Option<repair_workshop::Row>,
}

impl Placement {
    fn of<R: FleetRow>(lookups: &Lookups, row: &R) -> Self {
        Placement {
            owner: lookups.owners.get(&row.owner_id()).cloned(),
            status: lookups.statuses.get(&row.status_id()).cloned(),
            depot: row.depot_id().and_then(|id| lookups.depots.get(&id).cloned()),
            repair_workshop: row
                .repair_workshop_id()
                .and_then(|id| lookups.repair_workshops.get(&id).cloned()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PassengerWagonResource {
    pub id: i32,
    #[serde(flatten)]
    pub numbers: Numbers,
    #[serde(rename = "type")]
    pub wagon_type: Option<PassengerWagonTypeResource>,
    #[serde(flatten)]
    pub placement: Placement,
    pub repair_date: Option<NaiveDate>,
    /// Derived from the repair date and the type's validity period.
    pub repair_valid_until: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct FreightWagonResource {
    pub id: i32,
    #[serde(flatten)]
    pub numbers: Numbers,
    #[serde(rename = "type")]
    pub wagon_type: Option<FreightWagonType>,
    #[serde(flatten)]
    pub placement: Placement,
    pub repair_valid_until: Option<NaiveDate>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct TractiveUnitResource {
    pub id: i32,
    #[serde(flatten)]
    pub numbers: Numbers,
    pub name: Option<String>,
    #[serde(flatten)]
    pub placement: Placement,
    pub repair_valid_until: Option<NaiveDate>,
    pub max_speed: Option<i32>,
    pub power_output: Option<i32>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn present_passenger_wagons(
    conn: &mut PgConnection,
    rows: Vec<PassengerWagon>,
) -> Result<Vec<PassengerWagonResource>, ServiceError> {
    let lookups = Lookups::load(conn, &rows)?;
    let type_ids: Vec<i32> = rows.iter().map(|row| row.type_id).collect();
    let types = wagon_type::passenger::find_many(conn, &type_ids)?;
    let interior_ids: Vec<i32> = types
        .values()
        .map(|t| t.passenger_interior_type_id)
        .collect();
    let interiors = passenger_interior_type::find_many(conn, &interior_ids)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let wagon_type = types.get(&row.type_id).cloned();
            let repair_valid_until = wagon_type.as_ref().and_then(|t| {
                dates::passenger_repair_valid_until(row.repair_date, t.repair_valid_for)
            });
            let style = RollingStockKind::PassengerWagon.number_style();

            PassengerWagonResource {
                id: row.id,
                numbers: Numbers::new(&row.number, style),
                placement: Placement::of(&lookups, &row),
                wagon_type: wagon_type.map(|t| PassengerWagonTypeResource {
                    passenger_interior_type: interiors.get(&t.passenger_interior_type_id).cloned(),
                    row: t,
                }),
                repair_date: row.repair_date,
                repair_valid_until,
                note: row.note,
                created_at: dates::format_timestamp(&row.created_at),
                updated_at: dates::format_timestamp(&row.updated_at),
            }
        })
        .collect())
}

pub fn present_freight_wagons(
    conn: &mut PgConnection,
    rows: Vec<FreightWagon>,
) -> Result<Vec<FreightWagonResource>, ServiceError> {
    let lookups = Lookups::load(conn, &rows)?;
    let type_ids: Vec<i32> = rows.iter().map(|row| row.type_id).collect();
    let types = wagon_type::freight::find_many(conn, &type_ids)?;

    Ok(rows
        .into_iter()
        .map(|row| FreightWagonResource {
            id: row.id,
            numbers: Numbers::new(&row.number, RollingStockKind::FreightWagon.number_style()),
            placement: Placement::of(&lookups, &row),
            wagon_type: types.get(&row.type_id).cloned(),
            repair_valid_until: row.repair_valid_until,
            note: row.note,
            created_at: dates::format_timestamp(&row.created_at),
            updated_at: dates::format_timestamp(&row.updated_at),
        })
        .collect())
}

pub fn present_tractive_units(
    conn: &mut PgConnection,
    rows: Vec<TractiveUnit>,
) -> Result<Vec<TractiveUnitResource>, ServiceError> {
    let lookups = Lookups::load(conn, &rows)?;

    Ok(rows
        .into_iter()
        .map(|row| TractiveUnitResource {
            id: row.id,
            numbers: Numbers::new(&row.number, RollingStockKind::TractiveUnit.number_style()),
            placement: Placement::of(&lookups, &row),
            name: row.name,
            repair_valid_until: row.repair_valid_until,
            max_speed: row.max_speed,
            power_output: row.power_output,
            note: row.note,
            created_at: dates::format_timestamp(&row.created_at),
            updated_at: dates::format_timestamp(&row.updated_at),
        })
        .collect())
}

macro_rules! fleet_api {
    (
        $module:ident,
        resource: $resource:ident,
        table: $table:ident,
        form: $form:ty,
        view: $view:ty,
        present: $present:ident,
        index: $index:ident,
        kind: $kind:ident
    ) => {
        pub mod $module {
            use axum::extract::{FromRef, Path, Query, State};
            use axum::http::StatusCode;
            use axum::response::IntoResponse;
            use axum::{routing, Json, Router};
            use diesel::PgConnection;

            use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError};
            use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
            use crate::repo::filter::FleetFilter;
            use crate::repo::fleet::$table;
            use crate::repo::{PageRequest, Repo};
            use crate::rolling_stock::RollingStockKind;
            use crate::search::{self, SearchClient, SearchIndex};

            const RESOURCE: Resource = Resource::$resource;
            const KIND: RollingStockKind = RollingStockKind::$kind;

            pub fn build_router<S>() -> Router<S>
            where
                S: Send + Sync + Clone + 'static,
                AuthRwLock: FromRef<S>,
                Repo: FromRef<S>,
                SearchClient: FromRef<S>,
            {
                Router::new()
                    .route("/", routing::get(index).post(store))
                    .route(
                        "/:id",
                        routing::get(show).put(update).patch(update).delete(destroy),
                    )
            }

            fn present_one(conn: &mut PgConnection, id: i32) -> Result<$view, ServiceError> {
                let row = $table::find(conn, id)?;
                super::$present(conn, vec![row])?
                    .pop()
                    .ok_or(ServiceError::NotFound)
            }

            async fn index(
                principal: Principal,
                State(repo): State<Repo>,
                Query(page): Query<PageQuery>,
                Query(filter): Query<FleetFilter>,
            ) -> ListResult<$view> {
                authorize(&principal, RESOURCE, Action::ViewAny)?;

                let page = PageRequest::new(page.page);
                let today = chrono::Local::now().date_naive();
                let rows = repo
                    .run(move |conn| {
                        $table::list(conn, &filter, page, today)?
                            .try_map_items(|rows| super::$present(conn, rows))
                    })
                    .await?;
                Ok(api::list(rows))
            }

            async fn show(
                principal: Principal,
                State(repo): State<Repo>,
                Path(id): Path<i32>,
            ) -> ApiResult<$view> {
                authorize(&principal, RESOURCE, Action::View)?;

                let row = repo.run(move |conn| present_one(conn, id)).await?;
                Ok(api::ok(row))
            }

            async fn store(
                principal: Principal,
                State(repo): State<Repo>,
                State(search): State<SearchClient>,
                Json(form): Json<$form>,
            ) -> Result<impl IntoResponse, ServiceError> {
                authorize(&principal, RESOURCE, Action::Create)?;
                form.validate()?;

                let view = repo
                    .run(move |conn| {
                        let row = $table::create(conn, &form)?;
                        present_one(conn, row.id)
                    })
                    .await?;
                search
                    .upsert(
                        SearchIndex::$index,
                        search::vehicle_document(view.id, &view.numbers.number, KIND.number_style()),
                    )
                    .await;
                Ok(api::created(view))
            }

            async fn update(
                principal: Principal,
                State(repo): State<Repo>,
                State(search): State<SearchClient>,
                Path(id): Path<i32>,
                Json(form): Json<$form>,
            ) -> ApiResult<$view> {
                authorize(&principal, RESOURCE, Action::Update)?;
                form.validate()?;

                let view = repo
                    .run(move |conn| {
                        $table::update(conn, id, &form)?;
                        present_one(conn, id)
                    })
                    .await?;
                search
                    .upsert(
                        SearchIndex::$index,
                        search::vehicle_document(view.id, &view.numbers.number, KIND.number_style()),
                    )
                    .await;
                Ok(api::ok(view))
            }

            async fn destroy(
                principal: Principal,
                State(repo): State<Repo>,
                State(search): State<SearchClient>,
                Path(id): Path<i32>,
            ) -> Result<StatusCode, ServiceError> {
                authorize(&principal, RESOURCE, Action::Delete)?;

                let deleted = repo
                    .run(move |conn| $table::delete(conn, id).map_err(ServiceError::from_delete))
                    .await?;
                if deleted == 0 {
                    return Err(ServiceError::NotFound);
                }

                search.remove(SearchIndex::$index, id).await;
                Ok(StatusCode::NO_CONTENT)
            }
        }
    };
}

fleet_api!(
    passenger_wagon,
    resource: PassengerWagon,
    table: passenger,
    form: crate::repo::fleet::PassengerWagonForm,
    view: super::PassengerWagonResource,
    present: present_passenger_wagons,
    index: PassengerWagons,
    kind: PassengerWagon
);

fleet_api!(
    freight_wagon,
    resource: FreightWagon,
    table: freight,
    form: crate::repo::fleet::FreightWagonForm,
    view: super::FreightWagonResource,
    present: present_freight_wagons,
    index: FreightWagons,
    kind: FreightWagon
);

fleet_api!(
    tractive_unit,
    resource: TractiveUnit,
    table: tractive,
    form: crate::repo::fleet::TractiveUnitForm,
    view: super::TractiveUnitResource,
    present: present_tractive_units,
    index: TractiveUnits,
    kind: TractiveUnit
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_use_the_kind_style() {
        let numbers = Numbers::new("845266510708", NumberStyle::Freight);
        let json = serde_json::to_value(&numbers).unwrap();
        assert_eq!(json["stylized_number"], "84 52 6651 070-8");
        assert_eq!(json["short_stylized_number"], "6651 070-8");

        let numbers = Numbers::new("615629700234", NumberStyle::Passenger);
        assert_eq!(numbers.stylized_number, "61 56 29-70 023-4");
    }
}
