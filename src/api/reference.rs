//! Name-only lookup resources: depots, owners, statuses, workshops, repair and
//! interior types.

use serde::Deserialize;

use crate::error::{ServiceError, ValidationErrors};

#[derive(Debug, Deserialize)]
pub struct NameForm {
    pub name: String,
}

impl NameForm {
    pub fn validate(&self) -> Result<(), ServiceError> {
        let mut errors = ValidationErrors::new();
        errors.required("name", &self.name);
        errors.finish()
    }
}

macro_rules! reference_api {
    ($module:ident, $resource:ident) => {
        pub mod $module {
            use axum::extract::{FromRef, Path, Query, State};
            use axum::http::StatusCode;
            use axum::response::IntoResponse;
            use axum::{routing, Json, Router};

            use super::NameForm;
            use crate::api::{self, ApiResult, ListResult, PageQuery, ServiceError};
            use crate::auth::{authorize, Action, AuthRwLock, Principal, Resource};
            use crate::repo::reference::$module::{self as table, Row};
            use crate::repo::Repo;

            const RESOURCE: Resource = Resource::$resource;

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

            async fn index(
                principal: Principal,
                State(repo): State<Repo>,
                Query(query): Query<PageQuery>,
            ) -> ListResult<Row> {
                authorize(&principal, RESOURCE, Action::ViewAny)?;

                let page = query.page_or_all();
                let rows = repo.run(move |conn| Ok(table::list(conn, page)?)).await?;
                Ok(api::list(rows))
            }

            async fn show(
                principal: Principal,
                State(repo): State<Repo>,
                Path(id): Path<i32>,
            ) -> ApiResult<Row> {
                authorize(&principal, RESOURCE, Action::View)?;

                let row = repo.run(move |conn| Ok(table::find(conn, id)?)).await?;
                Ok(api::ok(row))
            }

            async fn store(
                principal: Principal,
                State(repo): State<Repo>,
                Json(form): Json<NameForm>,
            ) -> Result<impl IntoResponse, ServiceError> {
                authorize(&principal, RESOURCE, Action::Create)?;
                form.validate()?;

                let row = repo
                    .run(move |conn| Ok(table::create(conn, form.name.trim())?))
                    .await?;
                Ok(api::created(row))
            }

            async fn update(
                principal: Principal,
                State(repo): State<Repo>,
                Path(id): Path<i32>,
                Json(form): Json<NameForm>,
            ) -> ApiResult<Row> {
                authorize(&principal, RESOURCE, Action::Update)?;
                form.validate()?;

                let row = repo
                    .run(move |conn| Ok(table::update(conn, id, form.name.trim())?))
                    .await?;
                Ok(api::ok(row))
            }

            async fn destroy(
                principal: Principal,
                State(repo): State<Repo>,
                Path(id): Path<i32>,
            ) -> Result<StatusCode, ServiceError> {
                authorize(&principal, RESOURCE, Action::Delete)?;

                let deleted = repo
                    .run(move |conn| table::delete(conn, id).map_err(ServiceError::from_delete))
                    .await?;
                match deleted {
                    0 => Err(ServiceError::NotFound),
                    _ => Ok(StatusCode::NO_CONTENT),
                }
            }
        }
    };
}

reference_api!(depot, Depot);
reference_api!(owner, Owner);
reference_api!(status, Status);
reference_api!(repair_workshop, RepairWorkshop);
reference_api!(repair_type, RepairType);
reference_api!(passenger_interior_type, PassengerInteriorType);
