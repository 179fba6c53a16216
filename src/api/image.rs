//! Photos attached to vehicles.

use axum::extract::{FromRef, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{routing, Json, Router};
use diesel::PgConnection;
use serde::{Deserialize, Serialize};

use crate::api::upload::FormData;
use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError, ValidationErrors};
use crate::auth::policy::{authorize_subject, Subject};
use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
use crate::dates;
use crate::repo::image::{self, Image, ImageLinks, NewImage};
use crate::repo::Repo;
use crate::storage::{FileStorage, ImageUpload, UNSUPPORTED_IMAGE};

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
pub struct ImageResource {
    pub id: i32,
    pub title: Option<String>,
    pub path: String,
    pub thumbnail_path: Option<String>,
    pub user_id: Option<i32>,
    pub passenger_wagon_ids: Vec<i32>,
    pub freight_wagon_ids: Vec<i32>,
    pub tractive_unit_ids: Vec<i32>,
    pub created_at: String,
    pub updated_at: String,
}

fn present(conn: &mut PgConnection, rows: Vec<Image>) -> Result<Vec<ImageResource>, ServiceError> {
    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let mut links = image::links_of(conn, &ids)?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let ImageLinks {
                passenger_wagon_ids,
                freight_wagon_ids,
                tractive_unit_ids,
            } = links.remove(&row.id).unwrap_or_default();

            ImageResource {
                id: row.id,
                title: row.title,
                path: row.path,
                thumbnail_path: row.thumbnail_path,
                user_id: row.user_id,
                passenger_wagon_ids,
                freight_wagon_ids,
                tractive_unit_ids,
                created_at: dates::format_timestamp(&row.created_at),
                updated_at: dates::format_timestamp(&row.updated_at),
            }
        })
        .collect())
}

fn present_one(conn: &mut PgConnection, row: Image) -> Result<ImageResource, ServiceError> {
    present(conn, vec![row])?.pop().ok_or(ServiceError::NotFound)
}

fn validate_title(errors: &mut ValidationErrors, title: Option<&str>) {
    if title.is_some_and(|title| title.chars().count() > 255) {
        errors.add("title", "The title may not be greater than 255 characters.");
    }
}

async fn index(
    principal: Principal,
    State(repo): State<Repo>,
    Query(query): Query<PageQuery>,
) -> ListResult<ImageResource> {
    authorize(&principal, Resource::Image, Action::ViewAny)?;

    let page = query.page();
    let rows = repo
        .run(move |conn| image::list(conn, page)?.try_map_items(|rows| present(conn, rows)))
        .await?;
    Ok(api::list(rows))
}

async fn show(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
) -> ApiResult<ImageResource> {
    authorize(&principal, Resource::Image, Action::View)?;

    let row = repo
        .run(move |conn| {
            let row = image::find(conn, id)?;
            present_one(conn, row)
        })
        .await?;
    Ok(api::ok(row))
}

async fn store(
    principal: Principal,
    State(repo): State<Repo>,
    State(storage): State<FileStorage>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ServiceError> {
    authorize(&principal, Resource::Image, Action::Create)?;

    let mut form = FormData::read(multipart, "image").await?;
    let mut errors = ValidationErrors::new();
    let title = form.text("title").map(str::to_owned);
    validate_title(&mut errors, title.as_deref());
    let links = ImageLinks {
        passenger_wagon_ids: form.ids("passenger_wagon_ids", &mut errors),
        freight_wagon_ids: form.ids("freight_wagon_ids", &mut errors),
        tractive_unit_ids: form.ids("tractive_unit_ids", &mut errors),
    };
    let Some(file) = form.file.take() else {
        errors.add("image", "The image field is required.");
        return Err(ServiceError::Validation(errors));
    };
    let Some(upload) = ImageUpload::decode(file.bytes).await? else {
        errors.add("image", UNSUPPORTED_IMAGE);
        return Err(ServiceError::Validation(errors));
    };

    let checked = links.clone();
    repo.run(move |conn| {
        checked.validate(conn, &mut errors)?;
        errors.finish()
    })
    .await?;

    let stored = storage.store_image(upload).await?;
    let new_image = NewImage {
        title,
        path: stored.path.clone(),
        thumbnail_path: stored.thumbnail_path.clone(),
        user_id: Some(principal.user.id),
    };
    let result = repo
        .run(move |conn| {
            let row = image::create(conn, &new_image, &links)?;
            present_one(conn, row)
        })
        .await;

    match result {
        Ok(row) => Ok(api::created(row)),
        Err(err) => {
            // The row never made it in, so the files are orphans.
            if let Err(cleanup) = storage
                .delete(&stored.path, stored.thumbnail_path.as_deref())
                .await
            {
                log::warn!("could not remove {}: {}", stored.path, cleanup);
            }
            Err(err)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ImageUpdate {
    pub title: Option<String>,
    #[serde(default)]
    pub passenger_wagon_ids: Vec<i32>,
    #[serde(default)]
    pub freight_wagon_ids: Vec<i32>,
    #[serde(default)]
    pub tractive_unit_ids: Vec<i32>,
}

async fn update(
    principal: Principal,
    State(repo): State<Repo>,
    Path(id): Path<i32>,
    Json(form): Json<ImageUpdate>,
) -> ApiResult<ImageResource> {
    let row = repo
        .run(move |conn| {
            let existing = image::find(conn, id)?;
            authorize_subject(
                Some(&principal),
                Resource::Image,
                Action::Update,
                Subject {
                    owner_id: existing.user_id,
                },
            )?;

            let title = form
                .title
                .as_deref()
                .map(str::trim)
                .filter(|title| !title.is_empty());
            let links = ImageLinks {
                passenger_wagon_ids: form.passenger_wagon_ids,
                freight_wagon_ids: form.freight_wagon_ids,
                tractive_unit_ids: form.tractive_unit_ids,
            };
            let mut errors = ValidationErrors::new();
            validate_title(&mut errors, title);
            links.validate(conn, &mut errors)?;
            errors.finish()?;

            let row = image::update(conn, id, title, &links)?;
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
    let removed = repo
        .run(move |conn| {
            let existing = image::find(conn, id)?;
            authorize_subject(
                Some(&principal),
                Resource::Image,
                Action::Delete,
                Subject {
                    owner_id: existing.user_id,
                },
            )?;
            Ok(image::delete(conn, id)?)
        })
        .await?;

    storage
        .delete(&removed.path, removed.thumbnail_path.as_deref())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
