use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use diesel::PgConnection;
use serde::Serialize;

use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError};
use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
use crate::repo::reference::passenger_interior_type;
use crate::repo::wagon_type::{
    self, FreightWagonType, FreightWagonTypeForm, PassengerWagonType, PassengerWagonTypeForm,
};
use crate::repo::{Paged, Repo};

pub fn build_freight_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(freight_index).post(freight_store))
        .route(
            "/:id",
            routing::get(freight_show)
                .put(freight_update)
                .patch(freight_update)
                .delete(freight_destroy),
        )
}

pub fn build_passenger_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(passenger_index).post(passenger_store))
        .route(
            "/:id",
            routing::get(passenger_show)
                .put(passenger_update)
                .patch(passenger_update)
                .delete(passenger_destroy),
        )
}

fn deleted(count: usize) -> Result<StatusCode, ServiceError> {
    match count {
        0 => Err(ServiceError::NotFound),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

async fn freight_index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(query): Query<PageQuery>,
) -> ListResult<FreightWagonType> {
    authorize(&principal, Resource::FreightWagonType, Action::ViewAny)?;

    let page = query.page_or_all();
    let rows = repo
        .run(move |conn| Ok(wagon_type::freight::list(conn, page)?))
        .await?;
    Ok(api::list(rows))
}

async fn freight_show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<FreightWagonType> {
    authorize(&principal, Resource::FreightWagonType, Action::View)?;

    let row = repo
        .run(move |conn| Ok(wagon_type::freight::find(conn, id)?))
        .await?;
    Ok(api::ok(row))
}

async fn freight_store(
    principal: Principal,
    State(repo): State<Repo>,
    Json(form): Json<FreightWagonTypeForm>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::FreightWagonType, Action::Create)?;
    form.validate()?;

    let row = repo
        .run(move |conn| Ok(wagon_type::freight::create(conn, &form)?))
        .await?;
    Ok(api::created(row))
}

async fn freight_update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<FreightWagonTypeForm>,
) -> ApiResult<FreightWagonType> {
    authorize(&principal, Resource::FreightWagonType, Action::Update)?;
    form.validate()?;

    let row = repo
        .run(move |conn| Ok(wagon_type::freight::update(conn, id, &form)?))
        .await?;
    Ok(api::ok(row))
}

async fn freight_destroy(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::FreightWagonType, Action::Delete)?;

    deleted(
        repo.run(move |conn| {
            wagon_type::freight::delete(conn, id).map_err(ServiceError::from_delete)
        })
        .await?,
    )
}

/// Passenger wagon type with its interior type inlined.
#[derive(Debug, Serialize)]
pub struct PassengerWagonTypeResource {
    #[serde(flatten)]
    pub row: PassengerWagonType,
    pub passenger_interior_type: Option<passenger_interior_type::Row>,
}

fn with_interiors(
    conn: &mut PgConnection,
    rows: Paged<PassengerWagonType>,
) -> Result<Paged<PassengerWagonTypeResource>, ServiceError> {
    let ids: Vec<i32> = rows
        .items
        .iter()
        .map(|row| row.passenger_interior_type_id)
        .collect();
    let interiors = passenger_interior_type::find_many(conn, &ids)?;

    Ok(rows.map(|row| PassengerWagonTypeResource {
        passenger_interior_type: interiors.get(&row.passenger_interior_type_id).cloned(),
        row,
    }))
}

fn with_interior(
    conn: &mut PgConnection,
    row: PassengerWagonType,
) -> Result<PassengerWagonTypeResource, ServiceError> {
    let mut paged = with_interiors(conn, Paged::all(vec![row]))?;
    paged.items.pop().ok_or(ServiceError::NotFound)
}

async fn passenger_index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(query): Query<PageQuery>,
) -> ListResult<PassengerWagonTypeResource> {
    authorize(&principal, Resource::PassengerWagonType, Action::ViewAny)?;

    let page = query.page_or_all();
    let rows = repo
        .run(move |conn| {
            let rows = wagon_type::passenger::list(conn, page)?;
            with_interiors(conn, rows)
        })
        .await?;
    Ok(api::list(rows))
}

async fn passenger_show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<PassengerWagonTypeResource> {
    authorize(&principal, Resource::PassengerWagonType, Action::View)?;

    let row = repo
        .run(move |conn| {
            let row = wagon_type::passenger::find(conn, id)?;
            with_interior(conn, row)
        })
        .await?;
    Ok(api::ok(row))
}

async fn passenger_store(
    principal: Principal,
    State(repo): State<Repo>,
    Json(form): Json<PassengerWagonTypeForm>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::PassengerWagonType, Action::Create)?;
    form.validate()?;

    let row = repo
        .run(move |conn| {
            let row = wagon_type::passenger::create(conn, &form)?;
            with_interior(conn, row)
        })
        .await?;
    Ok(api::created(row))
}

async fn passenger_update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<PassengerWagonTypeForm>,
) -> ApiResult<PassengerWagonTypeResource> {
    authorize(&principal, Resource::PassengerWagonType, Action::Update)?;
    form.validate()?;

    let row = repo
        .run(move |conn| {
            let row = wagon_type::passenger::update(conn, id, &form)?;
            with_interior(conn, row)
        })
        .await?;
    Ok(api::ok(row))
}

async fn passenger_destroy(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::PassengerWagonType, Action::Delete)?;

    deleted(
        repo.run(move |conn| {
            wagon_type::passenger::delete(conn, id).map_err(ServiceError::from_delete)
        })
        .await?,
    )
}
