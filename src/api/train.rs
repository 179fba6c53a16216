//! Timetables, trains and the rolling stock assigned to them.

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
use crate::repo::train::{
    composition, timetable, train, RollingStockTrain, RollingStockTrainFilter,
    RollingStockTrainForm, Timetable, TimetableForm, Train, TrainForm,
};
use crate::repo::Repo;
use crate::rolling_stock::{self, RollingStockKind};
use crate::search::{self, SearchClient, SearchIndex};

fn deleted(count: usize) -> Result<StatusCode, ServiceError> {
    match count {
        0 => Err(ServiceError::NotFound),
        _ => Ok(StatusCode::NO_CONTENT),
    }
}

pub fn build_timetable_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(timetable_index).post(timetable_store))
        .route(
            "/:id",
            routing::get(timetable_show)
                .put(timetable_update)
                .patch(timetable_update)
                .delete(timetable_destroy),
        )
}

async fn timetable_index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(query): Query<PageQuery>,
) -> ListResult<Timetable> {
    authorize(&principal, Resource::Timetable, Action::ViewAny)?;

    let page = query.page_or_all();
    let rows = repo.run(move |conn| Ok(timetable::list(conn, page)?)).await?;
    Ok(api::list(rows))
}

async fn timetable_show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<Timetable> {
    authorize(&principal, Resource::Timetable, Action::View)?;

    let row = repo.run(move |conn| Ok(timetable::find(conn, id)?)).await?;
    Ok(api::ok(row))
}

async fn timetable_store(
    principal: Principal,
    State(repo): State<Repo>,
    Json(form): Json<TimetableForm>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::Timetable, Action::Create)?;
    form.validate()?;

    let row = repo.run(move |conn| Ok(timetable::create(conn, &form)?)).await?;
    Ok(api::created(row))
}

async fn timetable_update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<TimetableForm>,
) -> ApiResult<Timetable> {
    authorize(&principal, Resource::Timetable, Action::Update)?;
    form.validate()?;

    let row = repo
        .run(move |conn| Ok(timetable::update(conn, id, &form)?))
        .await?;
    Ok(api::ok(row))
}

async fn timetable_destroy(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::Timetable, Action::Delete)?;

    deleted(
        repo.run(move |conn| timetable::delete(conn, id).map_err(ServiceError::from_delete))
            .await?,
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainResource {
    pub id: i32,
    pub number: String,
    pub name: Option<String>,
    pub timetable: Option<Timetable>,
    pub created_at: String,
    pub updated_at: String,
}

pub fn present_trains(
    conn: &mut PgConnection,
    rows: Vec<Train>,
) -> Result<Vec<TrainResource>, ServiceError> {
    let timetable_ids: Vec<i32> = rows.iter().map(|row| row.timetable_id).collect();
    let timetables = timetable::find_many(conn, &timetable_ids)?;

    Ok(rows
        .into_iter()
        .map(|row| TrainResource {
            id: row.id,
            timetable: timetables.get(&row.timetable_id).cloned(),
            number: row.number,
            name: row.name,
            created_at: dates::format_timestamp(&row.created_at),
            updated_at: dates::format_timestamp(&row.updated_at),
        })
        .collect())
}

fn present_train(conn: &mut PgConnection, id: i32) -> Result<TrainResource, ServiceError> {
    let row = train::find(conn, id)?;
    present_trains(conn, vec![row])?
        .pop()
        .ok_or(ServiceError::NotFound)
}

pub fn build_train_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
    SearchClient: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(train_index).post(train_store))
        .route(
            "/:id",
            routing::get(train_show)
                .put(train_update)
                .patch(train_update)
                .delete(train_destroy),
        )
}

async fn train_index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(query): Query<PageQuery>,
) -> ListResult<TrainResource> {
    authorize(&principal, Resource::Train, Action::ViewAny)?;

    let page = query.page_or_all();
    let rows = repo
        .run(move |conn| train::list(conn, page)?.try_map_items(|rows| present_trains(conn, rows)))
        .await?;
    Ok(api::list(rows))
}

async fn train_show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<TrainResource> {
    authorize(&principal, Resource::Train, Action::View)?;

    let row = repo.run(move |conn| present_train(conn, id)).await?;
    Ok(api::ok(row))
}

async fn train_store(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Json(form): Json<TrainForm>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::Train, Action::Create)?;
    form.validate()?;

    let row = repo
        .run(move |conn| {
            let row = train::create(conn, &form)?;
            present_train(conn, row.id)
        })
        .await?;
    search
        .upsert(
            SearchIndex::Trains,
            search::train_document(row.id, &row.number, row.name.as_deref()),
        )
        .await;
    Ok(api::created(row))
}

async fn train_update(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Path(id): Path<i32>,
    Json(form): Json<TrainForm>,
) -> ApiResult<TrainResource> {
    authorize(&principal, Resource::Train, Action::Update)?;
    form.validate()?;

    let row = repo
        .run(move |conn| {
            train::update(conn, id, &form)?;
            present_train(conn, id)
        })
        .await?;
    search
        .upsert(
            SearchIndex::Trains,
            search::train_document(row.id, &row.number, row.name.as_deref()),
        )
        .await;
    Ok(api::ok(row))
}

async fn train_destroy(
    principal: Principal,
    State(repo): State<Repo>,
    State(search): State<SearchClient>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::Train, Action::Delete)?;

    let status = deleted(
        repo.run(move |conn| train::delete(conn, id).map_err(ServiceError::from_delete))
            .await?,
    )?;
    search.remove(SearchIndex::Trains, id).await;
    Ok(status)
}

#[derive(Debug, Serialize)]
pub struct RollingStockTrainResource {
    pub id: i32,
    pub train: Option<TrainResource>,
    pub position: i32,
    pub date: NaiveDate,
    pub trainable_type: Option<RollingStockKind>,
    pub trainable_id: i32,
    pub trainable: Option<VehicleSummary>,
    pub created_at: String,
    pub updated_at: String,
}

fn present_compositions(
    conn: &mut PgConnection,
    rows: Vec<RollingStockTrain>,
) -> Result<Vec<RollingStockTrainResource>, ServiceError> {
    let targets: Vec<(i16, i32)> = rows
        .iter()
        .map(|row| (row.trainable_type, row.trainable_id))
        .collect();
    let vehicles = rolling_stock::resolve_many(conn, &targets)?;

    let train_ids: Vec<i32> = rows.iter().map(|row| row.train_id).collect();
    let trains = train::find_ordered(conn, &train_ids)?;
    let trains: std::collections::HashMap<i32, TrainResource> = present_trains(conn, trains)?
        .into_iter()
        .map(|train| (train.id, train))
        .collect();

    Ok(rows
        .into_iter()
        .zip(vehicles)
        .map(|(row, vehicle)| RollingStockTrainResource {
            id: row.id,
            train: trains.get(&row.train_id).cloned(),
            position: row.position,
            date: row.date,
            trainable_type: RollingStockKind::from_code(row.trainable_type),
            trainable_id: row.trainable_id,
            trainable: vehicle.as_ref().map(VehicleSummary::of),
            created_at: dates::format_timestamp(&row.created_at),
            updated_at: dates::format_timestamp(&row.updated_at),
        })
        .collect())
}

fn present_composition(
    conn: &mut PgConnection,
    id: i32,
) -> Result<RollingStockTrainResource, ServiceError> {
    let row = composition::find(conn, id)?;
    present_compositions(conn, vec![row])?
        .pop()
        .ok_or(ServiceError::NotFound)
}

pub fn build_rolling_stock_train_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(composition_index).post(composition_store))
        .route(
            "/:id",
            routing::get(composition_show)
                .put(composition_update)
                .patch(composition_update)
                .delete(composition_destroy),
        )
}

async fn composition_index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(page): Query<PageQuery>,
    Query(filter): Query<RollingStockTrainFilter>,
) -> ListResult<RollingStockTrainResource> {
    authorize(&principal, Resource::RollingStockTrain, Action::ViewAny)?;

    let page = page.page();
    let rows = repo
        .run(move |conn| {
            composition::list(conn, &filter, page)?
                .try_map_items(|rows| present_compositions(conn, rows))
        })
        .await?;
    Ok(api::list(rows))
}

async fn composition_show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<RollingStockTrainResource> {
    authorize(&principal, Resource::RollingStockTrain, Action::View)?;

    let row = repo.run(move |conn| present_composition(conn, id)).await?;
    Ok(api::ok(row))
}

async fn composition_store(
    principal: Principal,
    State(repo): State<Repo>,
    Json(form): Json<RollingStockTrainForm>,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::RollingStockTrain, Action::Create)?;

    let row = repo
        .run(move |conn| {
            form.validate(conn)?;
            let row = composition::create(conn, &form)?;
            present_composition(conn, row.id)
        })
        .await?;
    Ok(api::created(row))
}

async fn composition_update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<RollingStockTrainForm>,
) -> ApiResult<RollingStockTrainResource> {
    authorize(&principal, Resource::RollingStockTrain, Action::Update)?;

    let row = repo
        .run(move |conn| {
            form.validate(conn)?;
            composition::update(conn, id, &form)?;
            present_composition(conn, id)
        })
        .await?;
    Ok(api::ok(row))
}

async fn composition_destroy(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::RollingStockTrain, Action::Delete)?;

    deleted(repo.run(move |conn| Ok(composition::delete(conn, id)?)).await?)
}
