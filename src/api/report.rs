//! Passenger incident reports. Filing one needs no account.

use axum::extract::{FromRef, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use diesel::PgConnection;
use serde::Serialize;

use crate::api::fleet::{Numbers, VehicleSummary};
use crate::api::upload::FormData;
use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError, ValidationErrors};
use crate::auth::policy::{authorize_subject, Subject};
use crate::auth::{authorize, Action, AuthRwLock, OptionalPrincipal, Principal, Resource};
use crate::dates;
use crate::repo::fleet;
use crate::repo::report::{self, NewPassengerReport, PassengerReport, PassengerReportForm};
use crate::repo::Repo;
use crate::rolling_stock::RollingStockKind;
use crate::storage::{FileStorage, ImageUpload, StoredFile, UNSUPPORTED_IMAGE};

pub fn build_router<S>() -> Router<S>
where
    S: Send + Sync + Clone + 'static,
    AuthRwLock: FromRef<S>,
    Repo: FromRef<S>,
    FileStorage: FromRef<S>,
{
    Router::new()
        .route("/", routing::get(index).post(store))
        .route(
            "/:id",
            routing::get(show).put(update).patch(update).delete(destroy),
        )
}

#[derive(Debug, Serialize)]
pub struct PassengerReportResource {
    pub id: i32,
    pub email: String,
    pub problem_description: String,
    pub passenger_wagon_id: Option<i32>,
    pub passenger_wagon: Option<VehicleSummary>,
    pub image_path: Option<String>,
    pub thumbnail_path: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn present(
    conn: &mut PgConnection,
    rows: Vec<PassengerReport>,
) -> Result<Vec<PassengerReportResource>, ServiceError> {
    let wagon_ids: Vec<i32> = rows.iter().filter_map(|row| row.passenger_wagon_id).collect();
    let wagons = fleet::passenger::find_many(conn, &wagon_ids)?;
    let style = RollingStockKind::PassengerWagon.number_style();

    Ok(rows
        .into_iter()
        .map(|row| {
            let passenger_wagon = row.passenger_wagon_id.and_then(|id| {
                wagons.iter().find(|wagon| wagon.id == id).map(|wagon| VehicleSummary {
                    id: wagon.id,
                    kind: RollingStockKind::PassengerWagon,
                    numbers: Numbers::new(&wagon.number, style),
                })
            });

            PassengerReportResource {
                id: row.id,
                email: row.email,
                problem_description: row.problem_description,
                passenger_wagon_id: row.passenger_wagon_id,
                passenger_wagon,
                image_path: row.image_path,
                thumbnail_path: row.thumbnail_path,
                created_at: dates::format_timestamp(&row.created_at),
                updated_at: dates::format_timestamp(&row.updated_at),
            }
        })
        .collect())
}

fn present_one(
    conn: &mut PgConnection,
    row: PassengerReport,
) -> Result<PassengerReportResource, ServiceError> {
    present(conn, vec![row])?.pop().ok_or(ServiceError::NotFound)
}

fn check_wagon(
    conn: &mut PgConnection,
    errors: &mut ValidationErrors,
    passenger_wagon_id: Option<i32>,
) -> Result<(), ServiceError> {
    if let Some(id) = passenger_wagon_id {
        if !fleet::passenger::exists(conn, id)? {
            errors.invalid_reference("passenger_wagon_id");
        }
    }
    Ok(())
}

async fn index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(query): Query<PageQuery>,
) -> ListResult<PassengerReportResource> {
    authorize(&principal, Resource::PassengerReport, Action::ViewAny)?;

    let page = query.page();
    let rows = repo
        .run(move |conn| report::list(conn, page)?.try_map_items(|rows| present(conn, rows)))
        .await?;
    Ok(api::list(rows))
}

async fn show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<PassengerReportResource> {
    authorize(&principal, Resource::PassengerReport, Action::View)?;

    let row = repo
        .run(move |conn| {
            let row = report::find(conn, id)?;
            present_one(conn, row)
        })
        .await?;
    Ok(api::ok(row))
}

async fn store(
    OptionalPrincipal(principal): OptionalPrincipal,
    State(repo): State<Repo>,
    State(storage): State<FileStorage>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    authorize_subject(
        principal.as_ref(),
        Resource::PassengerReport,
        Action::Create,
        Subject::default(),
    )?;

    let mut form = FormData::read(multipart, "image").await?;
    let email = form.text("email").unwrap_or_default().to_owned();
    let problem_description = form.text("problem_description").unwrap_or_default().to_owned();
    let mut errors = report::validate_fields(&email, &problem_description);
    let passenger_wagon_id = form.id("passenger_wagon_id", &mut errors);
    let upload = match form.file.take() {
        Some(file) => {
            let upload = ImageUpload::decode(file.bytes).await?;
            if upload.is_none() {
                errors.add("image", UNSUPPORTED_IMAGE);
            }
            upload
        }
        None => None,
    };

    repo.run(move |conn| {
        check_wagon(conn, &mut errors, passenger_wagon_id)?;
        errors.finish()
    })
    .await?;

    let stored = match upload {
        Some(upload) => Some(storage.store_image(upload).await?),
        None => None,
    };
    let new_report = NewPassengerReport {
        email,
        problem_description,
        passenger_wagon_id,
        image_path: stored.as_ref().map(|file| file.path.clone()),
        thumbnail_path: stored.as_ref().and_then(|file| file.thumbnail_path.clone()),
    };
    let result = repo
        .run(move |conn| {
            let row = report::create(conn, &new_report)?;
            present_one(conn, row)
        })
        .await;

    match result {
        Ok(row) => Ok(api::created(row)),
        Err(err) => {
            if let Some(StoredFile {
                path,
                thumbnail_path,
            }) = stored
            {
                if let Err(cleanup) = storage.delete(&path, thumbnail_path.as_deref()).await {
                    log::warn!("could not remove {}: {}", path, cleanup);
                }
            }
            Err(err)
        }
    }
}

async fn update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<PassengerReportForm>,
) -> ApiResult<PassengerReportResource> {
    authorize(&principal, Resource::PassengerReport, Action::Update)?;

    let row = repo
        .run(move |conn| {
            report::find(conn, id)?;
            let mut errors = report::validate_fields(&form.email, &form.problem_description);
            check_wagon(conn, &mut errors, form.passenger_wagon_id)?;
            errors.finish()?;

            let row = report::update(conn, id, &form)?;
            present_one(conn, row)
        })
        .await?;
    Ok(api::ok(row))
}

async fn destroy(
    principal: Principal,
    State(repo): State<Repo>,
    State(storage): State<FileStorage>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ServiceError> {
    authorize(&principal, Resource::PassengerReport, Action::Delete)?;

    let removed = repo.run(move |conn| Ok(report::delete(conn, id)?)).await?;

    if let Some(path) = removed.image_path.as_deref() {
        storage
            .delete(path, removed.thumbnail_path.as_deref())
            .await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
