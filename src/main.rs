use std::env;

use fleet_server::auth::{self, AuthRwLock};
use fleet_server::config::Config;
use fleet_server::repo::Repo;
use fleet_server::search::SearchClient;
use fleet_server::storage::FileStorage;
use fleet_server::{api, build_router, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "fleet_server=info,tower_http=debug");
    }

    env_logger::init();

    let config = Config::from_env().expect("configuration");
    let repo = Repo::connect(&config.database_url).expect("DATABASE_URL");
    repo.run_migrations().expect("migrations");

    if let Some(admin_pass) = &config.admin_pass {
        auth::service::bootstrap_admin(&repo, &config.admin_email, admin_pass)
            .await
            .expect("administrator account");
    }

    let search = match &config.search_url {
        Some(url) => SearchClient::new(url, config.search_key.clone()).expect("SEARCH_URL"),
        None => {
            log::info!("SEARCH_URL is not set, search endpoints are disabled");
            SearchClient::disabled()
        }
    };
    if let Err(err) = api::search::reindex(&repo, &search).await {
        log::warn!("could not rebuild search indexes: {}", err);
    }

    let state = AppState {
        repo,
        auth: AuthRwLock::new(),
        search,
        storage: FileStorage::new(config.storage_root.clone()),
    };
    let app = build_router(state);

    let listen_addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .expect("listen address");
    log::info!("listening on {}", listen_addr);

    axum::serve(listener, app).await.expect("server");
}
