pub mod api;
pub mod auth;
pub mod config;
pub mod dates;
pub mod error;
pub mod number;
pub mod repo;
pub mod rolling_stock;
pub mod schema;
pub mod search;
pub mod storage;

use axum::extract::{DefaultBodyLimit, FromRef};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthRwLock;
use crate::repo::Repo;
use crate::search::SearchClient;
use crate::storage::FileStorage;

/// Largest accepted request body; uploads are the only big ones.
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub repo: Repo,
    pub auth: AuthRwLock,
    pub search: SearchClient,
    pub storage: FileStorage,
}

pub fn build_router(state: AppState) -> Router {
    use api::{reference, train, user, wagon_type};

    Router::new()
        .nest("/depots", reference::depot::build_router())
        .nest("/owners", reference::owner::build_router())
        .nest("/statuses", reference::status::build_router())
        .nest("/repair-workshops", reference::repair_workshop::build_router())
        .nest("/repair-types", reference::repair_type::build_router())
        .nest(
            "/passenger-interior-types",
            reference::passenger_interior_type::build_router(),
        )
        .nest("/freight-wagon-types", wagon_type::build_freight_router())
        .nest("/passenger-wagon-types", wagon_type::build_passenger_router())
        .nest("/passenger-wagons", api::fleet::passenger_wagon::build_router())
        .nest("/freight-wagons", api::fleet::freight_wagon::build_router())
        .nest("/tractive-units", api::fleet::tractive_unit::build_router())
        .nest("/repairs", api::repair::build_router())
        .nest("/timetables", train::build_timetable_router())
        .nest("/trains", train::build_train_router())
        .nest("/rolling-stock-trains", train::build_rolling_stock_train_router())
        .nest("/images", api::image::build_router())
        .nest("/passenger-reports", api::report::build_router())
        .nest("/users", user::users::build_router())
        .nest("/roles", user::roles::build_router())
        .nest("/permissions", user::permissions::build_router())
        .merge(api::search::build_router())
        .merge(auth::service::build_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
