use axum::extract::{FromRef, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use chrono::NaiveDate;
use diesel::PgConnection;
use serde::Serialize;

use crate::api::fleet::VehicleSummary;
use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError};
use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
use crate::dates;
use crate::repo::reference::{repair_type, repair_workshop};
use crate::repo::repair::{self, Repair, RepairFilter, RepairForm};
use crate::repo::Repo;
use crate::rolling_stock::{self, RollingStockKind};

pub fn build_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(index).post(store))
        .route(
            "/:id",
            routing::get(show).put(update).patch(update).delete(destroy),
        )
}

#[derive(Debug, Serialize)]
pub struct RepairResource {
    pub id: i32,
    /// Label of the repaired vehicle's kind; `None` for a stored code outside 1..=3.
    pub repairable_type: Option<RollingStockKind>,
    pub repairable_id: i32,
    pub repairable: Option<VehicleSummary>,
    pub repair_type: Option<repair_type::Row>,
    pub repair_workshop: Option<repair_workshop::Row>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn present(conn: &mut PgConnection, rows: Vec<Repair>) -> Result<Vec<RepairResource>, ServiceError> {
    let targets: Vec<(i16, i32)> = rows
        .iter()
        .map(|row| (row.repairable_type, row.repairable_id))
        .collect();
    let vehicles = rolling_stock::resolve_many(conn, &targets)?;

    let type_ids: Vec<i32> = rows.iter().map(|row| row.repair_type_id).collect();
    let workshop_ids: Vec<i32> = rows.iter().map(|row| row.repair_workshop_id).collect();
    let types = repair_type::find_many(conn, &type_ids)?;
    let workshops = repair_workshop::find_many(conn, &workshop_ids)?;

    Ok(rows
        .into_iter()
        .zip(vehicles)
        .map(|(row, vehicle)| RepairResource {
            id: row.id,
            repairable_type: RollingStockKind::from_code(row.repairable_type),
            repairable_id: row.repairable_id,
            repairable: vehicle.as_ref().map(VehicleSummary::of),
            repair_type: types.get(&row.repair_type_id).cloned(),
            repair_workshop: workshops.get(&row.repair_workshop_id).cloned(),
            start_date: row.start_date,
            end_date: row.end_date,
            description: row.description,
            created_at: dates::format_timestamp(&row.created_at),
            updated_at: dates::format_timestamp(&row.updated_at),
        })
        .collect())
}

fn present_one(conn: &mut PgConnection, id: i32) -> Result<RepairResource, ServiceError> {
    let row = repair::find(conn, id)?;
    present(conn, vec![row])?.pop().ok_or(ServiceError::NotFound)
}

async fn index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<RepairFilter>,
) -> ListResult<RepairResource> {
    authorize(&principal, Resource::Repair, Action::ViewAny)?;

    let page = page.page();
    let rows = repo
        .run(move |conn| repair::list(conn, &filter, page)?.try_map_items(|rows| present(conn, rows)))
        .await?;
    Ok(api::list(rows))
}

async fn show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<RepairResource> {
    authorize(&principal, Resource::Repair, Action::View)?;

    let row = repo.run(move |conn| present_one(conn, id)).await?;
    Ok(api::ok(row))
}

async fn store(
    principal: Principal,
    State(repo): State<Repo>,
    Json(form): Json<RepairForm>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::Repair, Action::Create)?;

    let row = repo
        .run(move |conn| {
            form.validate(conn)?;
            let row = repair::create(conn, &form)?;
            present_one(conn, row.id)
        })
        .await?;
    Ok(api::created(row))
}

async fn update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<RepairForm>,
) -> ApiResult<RepairResource> {
    authorize(&principal, Resource::Repair, Action::Update)?;

    let row = repo
        .run(move |conn| {
            form.validate(conn)?;
            repair::update(conn, id, &form)?;
            present_one(conn, id)
        })
        .await?;
    Ok(api::ok(row))
}

async fn destroy(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::Repair, Action::Delete)?;

    match repo.run(move |conn| Ok(repair::delete(conn, id)?)).await? {
        0 => Err(ServiceError::NotFound),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}
