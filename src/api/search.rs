//! `POST /<resource>-search`: ranked lookups through the search engine.

use axum::extract::{FromRef, State};
use axum::{routing, Json, Router};
use serde::Deserialize;

use crate::api::fleet::{
    present_freight_wagons, present_passenger_wagons, present_tractive_units,
    FreightWagonResource, PassengerWagonResource, TractiveUnitResource,
};
use crate::api::train::{present_trains, TrainResource};
use crate::api::{self, ApiResult, ServiceError, ValidationErrors};
use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
use crate::repo::fleet;
use crate::repo::train::train;
use crate::repo::Repo;
use crate::rolling_stock::RollingStockKind;
use crate::search::{self, SearchClient, SearchIndex};

pub fn build_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
    SearchClient: FromRef<S>,
{
    Router::new()
        .route("/passenger-wagons-search", routing::post(passenger_wagons))
        .route("/freight-wagons-search", routing::post(freight_wagons))
        .route("/tractive-units-search", routing::post(tractive_units))
        .route("/trains-search", routing::post(trains))
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub search: String,
}

impl SearchRequest {
    fn query(&self) -> Result<&str, ServiceError> {
        let query = self.search.trim();
        if query.is_empty() {
            return Err(ServiceError::Validation(ValidationErrors::single(
                "search",
                "The search field is required.",
            )));
        }
        Ok(query)
    }
}

async fn passenger_wagons(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Vec<PassengerWagonResource>> {
    authorize(&principal, Resource::PassengerWagon, Action::ViewAny)?;

    let ids = search.search(SearchIndex::PassengerWagons, request.query()?).await?;
    let rows = repo
        .run(move |conn| {
            let rows = fleet::passenger::find_ordered(conn, &ids)?;
            present_passenger_wagons(conn, rows)
        })
        .await?;
    Ok(api::ok(rows))
}

async fn freight_wagons(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Vec<FreightWagonResource>> {
    authorize(&principal, Resource::FreightWagon, Action::ViewAny)?;

    let ids = search.search(SearchIndex::FreightWagons, request.query()?).await?;
    let rows = repo
        .run(move |conn| {
            let rows = fleet::freight::find_ordered(conn, &ids)?;
            present_freight_wagons(conn, rows)
        })
        .await?;
    Ok(api::ok(rows))
}

async fn tractive_units(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Vec<TractiveUnitResource>> {
    authorize(&principal, Resource::TractiveUnit, Action::ViewAny)?;

    let ids = search.search(SearchIndex::TractiveUnits, request.query()?).await?;
    let rows = repo
        .run(move |conn| {
            let rows = fleet::tractive::find_ordered(conn, &ids)?;
            present_tractive_units(conn, rows)
        })
        .await?;
    Ok(api::ok(rows))
}

async fn trains(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Vec<TrainResource>> {
    authorize(&principal, Resource::Train, Action::ViewAny)?;

    let ids = search.search(SearchIndex::Trains, request.query()?).await?;
    let rows = repo
        .run(move |conn| {
            let rows = train::find_ordered(conn, &ids)?;
            present_trains(conn, rows)
        })
        .await?;
    Ok(api::ok(rows))
}

/// Pushes every searchable record to the engine, e.g. after it was reset.
pub async fn reindex(repo: &Repo, search: &SearchClient) -> Result<(), ServiceError> {
    if !search.is_enabled() {
        return Ok(());
    }

    let (passenger, freight, tractive, trains) = repo
        .run(|conn| {
            Ok((
                fleet::passenger::all_numbers(conn)?,
                fleet::freight::all_numbers(conn)?,
                fleet::tractive::all_numbers(conn)?,
                train::all(conn)?,
            ))
        })
        .await?;

    let vehicles = |kind: RollingStockKind, rows: Vec<(i32, String)>| {
        rows.into_iter()
            .map(|(id, number)| search::vehicle_document(id, &number, kind.number_style()))
            .collect::<Vec<_>>()
    };
    search
        .upsert_many(
            SearchIndex::PassengerWagons,
            vehicles(RollingStockKind::PassengerWagon, passenger),
        )
        .await;
    search
        .upsert_many(
            SearchIndex::FreightWagons,
            vehicles(RollingStockKind::FreightWagon, freight),
        )
        .await;
    search
        .upsert_many(
            SearchIndex::TractiveUnits,
            vehicles(RollingStockKind::TractiveUnit, tractive),
        )
        .await;
    search
        .upsert_many(
            SearchIndex::Trains,
            trains
                .iter()
                .map(|row| search::train_document(row.id, &row.number, row.name.as_deref()))
                .collect(),
        )
        .await;

    log::info!("search indexes rebuilt");
    Ok(())
}
