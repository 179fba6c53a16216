//! Client for the external full-text search engine.
//!
//! The engine speaks the Meilisearch HTTP API: one index per searchable
//! resource, documents keyed by `id`, and ranked `POST /indexes/{uid}/search`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ServiceError;
use crate::number::{self, NumberStyle};

/// Most hits a search endpoint returns.
pub const SEARCH_LIMIT: usize = 5;

/// Documents sent per indexing request.
pub const INDEX_BATCH: usize = 500;

const MAX_RESPONSE_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchIndex {
    PassengerWagons,
    FreightWagons,
    TractiveUnits,
    Trains,
}

impl SearchIndex {
    pub fn uid(self) -> &'static str {
        match self {
            SearchIndex::PassengerWagons => "passenger_wagons",
            SearchIndex::FreightWagons => "freight_wagons",
            SearchIndex::TractiveUnits => "tractive_units",
            SearchIndex::Trains => "trains",
        }
    }
}

/// Index document for a vehicle: the number in every form users type it.
pub fn vehicle_document(id: i32, number: &str, style: NumberStyle) -> Value {
    json!({
        "id": id,
        "number": number,
        "stylized_number": number::stylize(number, style),
        "short_stylized_number": number::stylize_short(number, style),
    })
}

pub fn train_document(id: i32, number: &str, name: Option<&str>) -> Value {
    json!({
        "id": id,
        "number": number,
        "name": name,
    })
}

struct Engine {
    client: Client<HttpConnector, Body>,
    uri: Uri,
    key: Option<String>,
}

/// Cheap to clone; a client without a URL reports every search as unavailable.
#[derive(Clone)]
pub struct SearchClient(Option<Arc<Engine>>);

#[derive(Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    id: i32,
}

impl SearchClient {
    pub fn new(url: &str, key: Option<String>) -> Result<Self, ServiceError> {
        let uri: Uri = url
            .parse()
            .map_err(|_| ServiceError::Internal(format!("invalid search URL {}", url)))?;
        if uri.scheme().is_none() || uri.authority().is_none() {
            return Err(ServiceError::Internal(format!("invalid search URL {}", url)));
        }

        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(SearchClient(Some(Arc::new(Engine { client, uri, key }))))
    }

    pub fn disabled() -> Self {
        SearchClient(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    fn endpoint(engine: &Engine, path: &str) -> Result<Uri, ServiceError> {
        let base = engine.uri.path().trim_end_matches('/');
        let authority = engine
            .uri
            .authority()
            .ok_or(ServiceError::SearchUnavailable)?;

        Uri::builder()
            .scheme(engine.uri.scheme_str().unwrap_or("http"))
            .authority(authority.as_str())
            .path_and_query(format!("{}{}", base, path))
            .build()
            .map_err(|_| ServiceError::SearchUnavailable)
    }

    async fn send(
        engine: &Engine,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, axum::body::Bytes), ServiceError> {
        let mut request = Request::builder()
            .method(method)
            .uri(Self::endpoint(engine, path)?)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(key) = &engine.key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let request = request
            .body(body)
            .map_err(|_| ServiceError::SearchUnavailable)?;

        let response: hyper::Response<hyper::body::Incoming> = engine
            .client
            .request(request)
            .await
            .map_err(|_| ServiceError::SearchUnavailable)?;
        let status = response.status();
        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_RESPONSE_BYTES)
            .await
            .map_err(|_| ServiceError::SearchUnavailable)?;

        Ok((status, bytes))
    }

    /// Ids of the best matches, best first.
    pub async fn search(&self, index: SearchIndex, query: &str) -> Result<Vec<i32>, ServiceError> {
        let engine = self.0.as_ref().ok_or(ServiceError::SearchUnavailable)?;

        let (status, bytes) = Self::send(
            engine,
            Method::POST,
            &format!("/indexes/{}/search", index.uid()),
            Some(json!({ "q": query, "limit": SEARCH_LIMIT })),
        )
        .await?;
        if !status.is_success() {
            log::warn!("search in {} failed with {}", index.uid(), status);
            return Err(ServiceError::SearchUnavailable);
        }

        let response: SearchResponse =
            serde_json::from_slice(&bytes).map_err(|_| ServiceError::SearchUnavailable)?;
        Ok(response
            .hits
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|hit| hit.id)
            .collect())
    }

    /// Adds or replaces a document. Failures are logged, not returned.
    pub async fn upsert(&self, index: SearchIndex, document: Value) {
        self.upsert_many(index, vec![document]).await
    }

    pub async fn upsert_many(&self, index: SearchIndex, documents: Vec<Value>) {
        let Some(engine) = self.0.as_ref() else {
            return;
        };

        let path = format!("/indexes/{}/documents", index.uid());
        for batch in documents.chunks(INDEX_BATCH) {
            let body = Value::Array(batch.to_vec());
            match Self::send(engine, Method::POST, &path, Some(body)).await {
                Ok((status, _)) if status.is_success() => {}
                Ok((status, _)) => log::warn!("indexing into {} returned {}", index.uid(), status),
                Err(err) => log::warn!("indexing into {} failed: {}", index.uid(), err),
            }
        }
    }

    /// Removes a document. Failures are logged, not returned.
    pub async fn remove(&self, index: SearchIndex, id: i32) {
        let Some(engine) = self.0.as_ref() else {
            return;
        };

        let path = format!("/indexes/{}/documents/{}", index.uid(), id);
        match Self::send(engine, Method::DELETE, &path, None).await {
            Ok((status, _)) if status.is_success() => {}
            Ok((status, _)) => log::warn!("removing from {} returned {}", index.uid(), status),
            Err(err) => log::warn!("removing from {} failed: {}", index.uid(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    async fn stub_engine(router: Router) -> SearchClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        SearchClient::new(&format!("http://{}", addr), Some(String::from("master"))).unwrap()
    }

    #[test]
    fn vehicle_documents_carry_every_number_form() {
        let doc = vehicle_document(3, "845266510708", NumberStyle::Freight);
        assert_eq!(
            doc,
            json!({
                "id": 3,
                "number": "845266510708",
                "stylized_number": "84 52 6651 070-8",
                "short_stylized_number": "6651 070-8",
            })
        );
    }

    #[test]
    fn endpoints_keep_the_base_path() {
        let client = SearchClient::new("http://search.local:7700/meili/", None).unwrap();
        let engine = client.0.as_ref().unwrap();
        let uri = SearchClient::endpoint(engine, "/indexes/trains/search").unwrap();
        assert_eq!(uri.to_string(), "http://search.local:7700/meili/indexes/trains/search");
    }

    #[test]
    fn urls_need_scheme_and_host() {
        assert!(SearchClient::new("search.local", None).is_err());
    }

    #[tokio::test]
    async fn disabled_client_reports_unavailable() {
        let client = SearchClient::disabled();
        assert!(matches!(
            client.search(SearchIndex::Trains, "1204").await,
            Err(ServiceError::SearchUnavailable)
        ));
        // Index maintenance is a no-op without an engine.
        client.remove(SearchIndex::Trains, 1).await;
    }

    #[tokio::test]
    async fn search_keeps_engine_order_and_limit() {
        let router = Router::new().route(
            "/indexes/trains/search",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["q"], "12");
                assert_eq!(body["limit"], SEARCH_LIMIT);
                Json(json!({
                    "hits": [
                        { "id": 9 }, { "id": 2 }, { "id": 7 }, { "id": 1 },
                        { "id": 4 }, { "id": 3 }, { "id": 8 },
                    ]
                }))
            }),
        );
        let client = stub_engine(router).await;

        let ids = client.search(SearchIndex::Trains, "12").await.unwrap();
        assert_eq!(ids, [9, 2, 7, 1, 4]);
    }

    #[tokio::test]
    async fn engine_errors_surface_as_unavailable() {
        let router = Router::new().route(
            "/indexes/trains/search",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let client = stub_engine(router).await;

        assert!(matches!(
            client.search(SearchIndex::Trains, "12").await,
            Err(ServiceError::SearchUnavailable)
        ));
    }

    #[tokio::test]
    async fn documents_are_sent_in_batches() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let seen = batches.clone();
        let router = Router::new().route(
            "/indexes/freight_wagons/documents",
            post(move |Json(body): Json<Vec<Value>>| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(body.len());
                    StatusCode::ACCEPTED
                }
            }),
        );
        let client = stub_engine(router).await;

        let documents = (1..=INDEX_BATCH as i32 * 2 + 1)
            .map(|id| vehicle_document(id, "845266510708", NumberStyle::Freight))
            .collect();
        client.upsert_many(SearchIndex::FreightWagons, documents).await;
        client.upsert_many(SearchIndex::FreightWagons, Vec::new()).await;

        assert_eq!(*batches.lock().unwrap(), [INDEX_BATCH, INDEX_BATCH, 1]);
    }
}
