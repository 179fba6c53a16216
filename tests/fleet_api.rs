//! End-to-end checks against a real Postgres database.
//!
//! Set `DATABASE_URL` to a scratch database to run them; every test wipes all
//! tables first. Without it the tests print a notice and pass.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Local, Months};
use diesel::RunQueryDsl;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use fleet_server::auth::{self, AuthRwLock, Claim};
use fleet_server::repo::user::user;
use fleet_server::repo::Repo;
use fleet_server::search::SearchClient;
use fleet_server::storage::FileStorage;
use fleet_server::{build_router, AppState};

static DATABASE: Mutex<()> = Mutex::new(());

const BOUNDARY: &str = "fleet-test-boundary";

struct TestApp {
    app: Router,
    token: String,
    storage: TempDir,
    _guard: MutexGuard<'static, ()>,
}

async fn setup() -> Option<TestApp> {
    setup_with(SearchClient::disabled()).await
}

async fn setup_with(search: SearchClient) -> Option<TestApp> {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    };
    let guard = DATABASE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let repo = Repo::connect(&database_url).unwrap();
    repo.run_migrations().unwrap();
    repo.run(|conn| {
        diesel::sql_query(
            "TRUNCATE depots, owners, statuses, repair_workshops, repair_types, \
             passenger_interior_types, freight_wagon_types, passenger_wagon_types, \
             passenger_wagons, freight_wagons, tractive_units, repairs, timetables, trains, \
             rolling_stock_trains, users, roles, permissions, permission_role, role_user, \
             images, imageables, passenger_reports RESTART IDENTITY CASCADE",
        )
        .execute(conn)?;
        Ok(())
    })
    .await
    .unwrap();

    auth::service::bootstrap_admin(&repo, "admin@fleet.test", "administrator")
        .await
        .unwrap();
    let admin = repo
        .run(|conn| Ok(user::find_by_email(conn, "admin@fleet.test")?))
        .await
        .unwrap()
        .unwrap();

    let lock = AuthRwLock::new();
    let token = Claim::for_user(admin.id).to_token(&lock).unwrap();
    let storage = tempfile::tempdir().unwrap();
    let app = build_router(AppState {
        repo,
        auth: lock,
        search,
        storage: FileStorage::new(storage.path()),
    });

    Some(TestApp {
        app,
        token,
        storage,
        _guard: guard,
    })
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

impl TestApp {
    async fn call_as(
        &self,
        token: Option<&str>,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        };

        read(self.app.clone().oneshot(request.unwrap()).await.unwrap()).await
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.call_as(Some(&self.token), method, uri, body).await
    }

    async fn create(&self, uri: &str, body: Value) -> Value {
        let (status, body) = self.call(Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {}: {}", uri, body);
        body["data"].clone()
    }

    async fn upload(
        &self,
        token: Option<&str>,
        uri: &str,
        fields: &[(&str, &str)],
        file: Option<(&str, Vec<u8>)>,
    ) -> (StatusCode, Value) {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: image/png\r\n\r\n",
                    BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(&bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = request.body(Body::from(body)).unwrap();
        read(self.app.clone().oneshot(request).await.unwrap()).await
    }

    /// Owner and status every vehicle needs.
    async fn placement(&self) -> (i64, i64) {
        let owner = self.create("/owners", json!({ "name": "HŽ Cargo" })).await;
        let status = self.create("/statuses", json!({ "name": "In service" })).await;
        (owner["id"].as_i64().unwrap(), status["id"].as_i64().unwrap())
    }

    fn stored(&self, relative: &str) -> bool {
        self.storage.path().join(relative).exists()
    }

    /// Uploaded originals on disk.
    fn stored_images(&self) -> usize {
        std::fs::read_dir(self.storage.path().join("images"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|entry| entry.path().is_file())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Logs in a fresh user whose only role grants `permissions`.
    async fn user_with(&self, email: &str, permissions: &[&str]) -> String {
        let mut ids = Vec::new();
        for name in permissions {
            let permission = self.create("/permissions", json!({ "name": name })).await;
            ids.push(permission["id"].clone());
        }
        let role = self
            .create(
                "/roles",
                json!({ "name": format!("Role of {}", email), "permissions": ids }),
            )
            .await;
        self.create(
            "/users",
            json!({
                "name": "Marko Horvat",
                "email": email,
                "password": "depot-worker",
                "roles": [role["id"]],
            }),
        )
        .await;

        let (status, login) = self
            .call_as(
                None,
                Method::POST,
                "/login",
                Some(json!({ "email": email, "password": "depot-worker" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", login);
        login["data"]["token"].as_str().unwrap().to_owned()
    }
}

/// Search engine double: answers train searches with a fixed ranking and
/// accepts index writes.
async fn stub_search_engine() -> SearchClient {
    let router = Router::new()
        .route(
            "/indexes/trains/search",
            post(|Json(body): Json<Value>| async move {
                let hits = match body["q"].as_str() {
                    Some("Podravka") => json!([
                        { "id": 6 }, { "id": 2 }, { "id": 5 }, { "id": 1 }, { "id": 3 }, { "id": 4 },
                    ]),
                    _ => json!([{ "id": 99 }, { "id": 4 }]),
                };
                Json(json!({ "hits": hits }))
            }),
        )
        .route(
            "/indexes/trains/documents",
            post(|| async { StatusCode::ACCEPTED }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    SearchClient::new(&format!("http://{}", addr), None).unwrap()
}

fn png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(64, 48, image::Rgb([10, 120, 200]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

fn numbers(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["number"].as_str().unwrap().to_owned())
        .collect()
}

#[tokio::test]
async fn freight_wagon_is_created_with_stylized_number() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    let wagon_type = t.create("/freight-wagon-types", json!({ "name": "Eanos" })).await;

    let (status, body) = t
        .call(
            Method::POST,
            "/freight-wagons",
            Some(json!({
                "number": "845266510708",
                "type_id": wagon_type["id"],
                "owner_id": owner_id,
                "status_id": status_id,
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["number"], "845266510708");
    assert_eq!(body["data"]["stylized_number"], "84 52 6651 070-8");
    assert_eq!(body["data"]["short_stylized_number"], "6651 070-8");
    assert_eq!(body["data"]["type"]["name"], "Eanos");

    let (status, body) = t
        .call(
            Method::POST,
            "/freight-wagons",
            Some(json!({
                "number": "845266510708",
                "type_id": wagon_type["id"],
                "owner_id": owner_id,
                "status_id": status_id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["number"].is_array(), "{}", body);
}

#[tokio::test]
async fn fleet_lists_filter_by_depot_and_sort_by_number() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    let wagon_type = t.create("/freight-wagon-types", json!({ "name": "Habbins" })).await;
    let north = t.create("/depots", json!({ "name": "Zagreb" })).await;
    let south = t.create("/depots", json!({ "name": "Split" })).await;
    let empty = t.create("/depots", json!({ "name": "Osijek" })).await;

    for (number, depot) in [
        ("315527450012", &north),
        ("315527450038", &south),
        ("315527450020", &north),
    ] {
        t.create(
            "/freight-wagons",
            json!({
                "number": number,
                "type_id": wagon_type["id"],
                "owner_id": owner_id,
                "status_id": status_id,
                "depot_id": depot["id"],
            }),
        )
        .await;
    }

    let (status, body) = t
        .call(Method::GET, &format!("/freight-wagons?depot_id={}", north["id"]), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 2);
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .all(|row| row["depot"]["id"] == north["id"]));

    let (_, body) = t
        .call(Method::GET, &format!("/freight-wagons?depot_id={}", empty["id"]), None)
        .await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = t.call(Method::GET, "/freight-wagons?sort=desc", None).await;
    assert_eq!(
        numbers(&body),
        ["315527450038", "315527450020", "315527450012"]
    );

    let (_, body) = t
        .call(
            Method::GET,
            &format!("/freight-wagons?sort=asc&depot_id={}", north["id"]),
            None,
        )
        .await;
    assert_eq!(numbers(&body), ["315527450012", "315527450020"]);
}

#[tokio::test]
async fn no_pagination_returns_every_reference_row() {
    let Some(t) = setup().await else { return };
    for i in 1..=11 {
        t.create("/depots", json!({ "name": format!("Depot {}", i) })).await;
    }

    let (_, paged) = t.call(Method::GET, "/depots", None).await;
    assert_eq!(paged["data"].as_array().unwrap().len(), 10);
    assert_eq!(paged["meta"]["total"], 11);
    assert_eq!(paged["meta"]["last_page"], 2);

    let (_, second) = t.call(Method::GET, "/depots?page=2", None).await;
    assert_eq!(second["data"].as_array().unwrap().len(), 1);

    let (_, all) = t.call(Method::GET, "/depots?no-pagination=1", None).await;
    assert_eq!(all["data"].as_array().unwrap().len(), 11);
    assert!(all.get("meta").is_none());

    for uri in [
        "/depots?page=9223372036854775807",
        "/freight-wagons?page=9223372036854775807",
    ] {
        let (status, far) = t.call(Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{}: {}", uri, far);
        assert!(far["data"].as_array().unwrap().is_empty());
    }
}

#[tokio::test]
async fn granting_the_permission_lifts_the_denial() {
    let Some(t) = setup().await else { return };
    let permission = t.create("/permissions", json!({ "name": "depot-create" })).await;
    let role = t
        .create("/roles", json!({ "name": "Dispatcher", "permissions": [] }))
        .await;
    t.create(
        "/users",
        json!({
            "name": "Ivana Kovač",
            "email": "ivana@fleet.test",
            "password": "dispatcher",
            "roles": [role["id"]],
        }),
    )
    .await;

    let (status, login) = t
        .call_as(
            None,
            Method::POST,
            "/login",
            Some(json!({ "email": "ivana@fleet.test", "password": "dispatcher" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", login);
    let token = login["data"]["token"].as_str().unwrap().to_owned();

    let depot = json!({ "name": "Rijeka" });
    let (status, _) = t
        .call_as(Some(&token), Method::POST, "/depots", Some(depot.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t
        .call(
            Method::PUT,
            &format!("/roles/{}", role["id"]),
            Some(json!({ "name": "Dispatcher", "permissions": [permission["id"]] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .call_as(Some(&token), Method::POST, "/depots", Some(depot))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Only the granted action opens up.
    let (status, _) = t.call_as(Some(&token), Method::GET, "/depots", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, me) = t.call_as(Some(&token), Method::GET, "/me", None).await;
    assert_eq!(me["data"]["permissions"], json!(["depot-create"]));
}

#[tokio::test]
async fn wrong_password_does_not_log_in() {
    let Some(t) = setup().await else { return };

    let (status, body) = t
        .call_as(
            None,
            Method::POST,
            "/login",
            Some(json!({ "email": "admin@fleet.test", "password": "guess" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["email"].is_array());
}

#[tokio::test]
async fn repairs_and_train_slots_resolve_their_vehicle() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    let unit = t
        .create(
            "/tractive-units",
            json!({
                "number": "915320440154",
                "name": "Pantograph",
                "owner_id": owner_id,
                "status_id": status_id,
            }),
        )
        .await;
    let repair_type = t.create("/repair-types", json!({ "name": "Overhaul" })).await;
    let workshop = t.create("/repair-workshops", json!({ "name": "TŽV Gredelj" })).await;

    let repair = t
        .create(
            "/repairs",
            json!({
                "repairable_type": 3,
                "repairable_id": unit["id"],
                "repair_type_id": repair_type["id"],
                "repair_workshop_id": workshop["id"],
                "start_date": "2024-03-01",
                "end_date": "2024-03-20",
            }),
        )
        .await;
    assert_eq!(repair["repairable_type"], "tractive_unit");
    assert_eq!(repair["repairable"]["id"], unit["id"]);
    assert_eq!(repair["repairable"]["stylized_number"], "91 53 2044 015-4");

    // Id of a tractive unit, but typed as a passenger wagon.
    let (status, body) = t
        .call(
            Method::POST,
            "/repairs",
            Some(json!({
                "repairable_type": 1,
                "repairable_id": unit["id"],
                "repair_type_id": repair_type["id"],
                "repair_workshop_id": workshop["id"],
                "start_date": "2024-03-01",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["repairable_id"].is_array(), "{}", body);

    let (_, listed) = t.call(Method::GET, "/repairs?repairable_type=2", None).await;
    assert!(listed["data"].as_array().unwrap().is_empty());

    let timetable = t
        .create(
            "/timetables",
            json!({ "name": "2024", "valid_from": "2023-12-10", "valid_to": "2024-12-14" }),
        )
        .await;
    let train = t
        .create(
            "/trains",
            json!({ "number": "1204", "name": "Podravka", "timetable_id": timetable["id"] }),
        )
        .await;
    let slot = t
        .create(
            "/rolling-stock-trains",
            json!({
                "train_id": train["id"],
                "position": 1,
                "date": "2024-05-02",
                "trainable_type": 3,
                "trainable_id": unit["id"],
            }),
        )
        .await;
    assert_eq!(slot["trainable_type"], "tractive_unit");
    assert_eq!(slot["trainable"]["number"], "915320440154");
    assert_eq!(slot["train"]["number"], "1204");
}

#[tokio::test]
async fn passenger_validity_is_derived_from_the_wagon_type() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    let interior = t
        .create("/passenger-interior-types", json!({ "name": "Open saloon" }))
        .await;

    let (status, body) = t
        .call(
            Method::POST,
            "/passenger-wagon-types",
            Some(json!({
                "name": "Forever",
                "repair_valid_for": 2147483647,
                "passenger_interior_type_id": interior["id"],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["repair_valid_for"].is_array(), "{}", body);
    let wagon_type = t
        .create(
            "/passenger-wagon-types",
            json!({
                "name": "Bmz",
                "repair_valid_for": 12,
                "passenger_interior_type_id": interior["id"],
            }),
        )
        .await;

    let today = Local::now().date_naive();
    let due = today.checked_sub_months(Months::new(12)).unwrap();
    for (number, repair_date) in [("505520700014", due), ("505520700022", today)] {
        t.create(
            "/passenger-wagons",
            json!({
                "number": number,
                "type_id": wagon_type["id"],
                "owner_id": owner_id,
                "status_id": status_id,
                "repair_date": repair_date,
            }),
        )
        .await;
    }

    let (status, body) = t
        .call(Method::GET, "/passenger-wagons?repair_valid_until_this_month=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(numbers(&body), ["505520700014"]);
    let wagon = &body["data"][0];
    assert_eq!(wagon["stylized_number"], "50 55 20-70 001-4");
    assert_eq!(
        wagon["repair_valid_until"],
        json!(due.checked_add_months(Months::new(12)).unwrap())
    );
    assert_eq!(wagon["type"]["passenger_interior_type"]["name"], "Open saloon");
}

#[tokio::test]
async fn deleting_an_image_removes_its_files() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    let wagon_type = t.create("/freight-wagon-types", json!({ "name": "Sgns" })).await;
    let wagon = t
        .create(
            "/freight-wagons",
            json!({
                "number": "335545760019",
                "type_id": wagon_type["id"],
                "owner_id": owner_id,
                "status_id": status_id,
            }),
        )
        .await;
    let wagon_id = wagon["id"].to_string();

    let (status, body) = t
        .upload(
            Some(&t.token),
            "/images",
            &[("title", "Side view"), ("freight_wagon_ids[]", &wagon_id)],
            Some(("side.png", png())),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let image = &body["data"];
    assert_eq!(image["freight_wagon_ids"], json!([wagon["id"]]));
    let path = image["path"].as_str().unwrap().to_owned();
    let thumbnail = image["thumbnail_path"].as_str().unwrap().to_owned();
    assert!(t.stored(&path));
    assert!(t.stored(&thumbnail));

    let (status, _) = t
        .call(Method::DELETE, &format!("/images/{}", image["id"]), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!t.stored(&path));
    assert!(!t.stored(&thumbnail));

    let (status, _) = t
        .call(Method::GET, &format!("/images/{}", image["id"]), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn guests_file_reports_and_deleting_one_removes_the_photo() {
    let Some(t) = setup().await else { return };

    let (status, body) = t
        .upload(
            None,
            "/passenger-reports",
            &[("email", "putnik@example.com"), ("passenger_wagon_id", "999")],
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["problem_description"].is_array());
    assert!(body["errors"]["passenger_wagon_id"].is_array());

    let (status, body) = t
        .upload(
            None,
            "/passenger-reports",
            &[
                ("email", "putnik@example.com"),
                ("problem_description", "Broken window"),
            ],
            Some(("window.png", b"#!/bin/sh\necho hello\n".to_vec())),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["image"].is_array(), "{}", body);
    assert_eq!(t.stored_images(), 0);

    let (status, body) = t
        .upload(
            None,
            "/passenger-reports",
            &[
                ("email", "putnik@example.com"),
                ("problem_description", "Heating does not work in coach 5"),
            ],
            Some(("coach.png", png())),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let report = &body["data"];
    let path = report["image_path"].as_str().unwrap().to_owned();
    assert!(t.stored(&path));
    assert!(Path::new(report["thumbnail_path"].as_str().unwrap())
        .starts_with("images/thumbnails"));

    // Reading reports is staff-only.
    let (status, _) = t.call_as(None, Method::GET, "/passenger-reports", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = t
        .call(
            Method::DELETE,
            &format!("/passenger-reports/{}", report["id"]),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!t.stored(&path));
}

#[tokio::test]
async fn referenced_rows_cannot_be_deleted() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    t.create(
        "/tractive-units",
        json!({ "number": "925320440012", "owner_id": owner_id, "status_id": status_id }),
    )
    .await;

    let (status, _) = t
        .call(Method::DELETE, &format!("/owners/{}", owner_id), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn stored_validity_filters_freight_wagons_and_tractive_units() {
    let Some(t) = setup().await else { return };
    let (owner_id, status_id) = t.placement().await;
    let wagon_type = t.create("/freight-wagon-types", json!({ "name": "Zacns" })).await;

    let today = Local::now().date_naive();
    let later = today.checked_add_months(Months::new(2)).unwrap();
    for (number, valid_until) in [
        ("315527450012", Some(today)),
        ("315527450020", Some(later)),
        ("315527450038", None),
    ] {
        t.create(
            "/freight-wagons",
            json!({
                "number": number,
                "type_id": wagon_type["id"],
                "owner_id": owner_id,
                "status_id": status_id,
                "repair_valid_until": valid_until,
            }),
        )
        .await;
    }
    for (number, valid_until) in [("915320440154", today), ("925320440012", later)] {
        t.create(
            "/tractive-units",
            json!({
                "number": number,
                "owner_id": owner_id,
                "status_id": status_id,
                "repair_valid_until": valid_until,
            }),
        )
        .await;
    }

    let (status, body) = t
        .call(Method::GET, "/freight-wagons?repair_valid_until_this_month=1", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(numbers(&body), ["315527450012"]);
    assert_eq!(body["data"][0]["repair_valid_until"], json!(today));

    let (status, body) = t
        .call(Method::GET, "/tractive-units?repair_valid_until_this_month", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(numbers(&body), ["915320440154"]);

    let (_, body) = t
        .call(Method::GET, "/tractive-units?repair_valid_until_this_month=0", None)
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn uploaders_manage_only_their_own_images() {
    let Some(t) = setup().await else { return };
    let token = t.user_with("fotograf@fleet.test", &["image-create"]).await;

    let (status, own) = t
        .upload(Some(&token), "/images", &[("title", "Front")], Some(("front.png", png())))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", own);
    let (status, foreign) = t
        .upload(Some(&t.token), "/images", &[("title", "Depot")], Some(("depot.png", png())))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", foreign);

    let own_uri = format!("/images/{}", own["data"]["id"]);
    let foreign_uri = format!("/images/{}", foreign["data"]["id"]);

    let (status, body) = t
        .call_as(
            Some(&token),
            Method::PATCH,
            &own_uri,
            Some(json!({ "title": "Front, cleaned" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["title"], "Front, cleaned");

    let (status, _) = t
        .call_as(
            Some(&token),
            Method::PATCH,
            &foreign_uri,
            Some(json!({ "title": "Mine now" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = t
        .call_as(Some(&token), Method::DELETE, &foreign_uri, None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = t.call(Method::GET, &foreign_uri, None).await;
    assert_eq!(body["data"]["title"], "Depot");

    let (status, _) = t.call_as(Some(&token), Method::DELETE, &own_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(t.stored_images(), 1);
}

#[tokio::test]
async fn train_search_follows_engine_ranking() {
    let Some(t) = setup_with(stub_search_engine().await).await else { return };
    let timetable = t
        .create(
            "/timetables",
            json!({ "name": "2024", "valid_from": "2023-12-10", "valid_to": "2024-12-14" }),
        )
        .await;
    for i in 1..=6 {
        t.create(
            "/trains",
            json!({
                "number": format!("120{}", i),
                "name": "Podravka",
                "timetable_id": timetable["id"],
            }),
        )
        .await;
    }

    let (status, body) = t
        .call(Method::POST, "/trains-search", Some(json!({ "search": "Podravka" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(numbers(&body), ["1206", "1202", "1205", "1201", "1203"]);

    // Hits the database no longer knows are dropped.
    let (_, body) = t
        .call(Method::POST, "/trains-search", Some(json!({ "search": "1204" })))
        .await;
    assert_eq!(numbers(&body), ["1204"]);

    let (status, _) = t
        .call(Method::POST, "/trains-search", Some(json!({ "search": "  " })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
