//! HTTP surface: one router per resource, merged in `crate::build_router`.

pub mod fleet;
pub mod image;
pub mod reference;
pub mod repair;
pub mod report;
pub mod search;
pub mod train;
pub mod upload;
pub mod user;
pub mod wagon_type;

use axum::http::StatusCode;
use axum::Json;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub use crate::error::{ServiceError, ValidationErrors};
use crate::repo::{PageRequest, Paged, PER_PAGE};

/// The `{"data": ...}` envelope around every successful body.
#[derive(Debug, Serialize)]
pub struct Data<T> {
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Data<T>> {
    Json(Data { data })
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Data<T>>) {
    (StatusCode::CREATED, ok(data))
}

pub type ApiResult<T> = Result<Json<Data<T>>, ServiceError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub current_page: i64,
    pub from: Option<i64>,
    pub last_page: i64,
    pub per_page: i64,
    pub to: Option<i64>,
    pub total: i64,
}

impl PageMeta {
    pub fn new(page: PageRequest, count: usize, total: i64) -> Self {
        let (from, to) = if count == 0 {
            (None, None)
        } else {
            let from = page.offset().saturating_add(1);
            (Some(from), Some(from.saturating_add(count as i64 - 1)))
        };

        PageMeta {
            current_page: page.page,
            from,
            last_page: ((total + PER_PAGE - 1) / PER_PAGE).max(1),
            per_page: PER_PAGE,
            to,
            total,
        }
    }
}

/// A listing body; `meta` is present only for paginated listings.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T> From<Paged<T>> for ListResponse<T> {
    fn from(paged: Paged<T>) -> Self {
        let meta = paged
            .page
            .map(|page| PageMeta::new(page, paged.items.len(), paged.total));

        ListResponse {
            data: paged.items,
            meta,
        }
    }
}

pub type ListResult<T> = Result<Json<ListResponse<T>>, ServiceError>;

pub fn list<T>(paged: Paged<T>) -> Json<ListResponse<T>> {
    Json(paged.into())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    #[serde(rename = "no-pagination", default, deserialize_with = "deserialize_flag")]
    pub no_pagination: bool,
}

impl PageQuery {
    pub fn page(&self) -> PageRequest {
        PageRequest::new(self.page)
    }

    /// `None` when the caller asked for the whole table.
    pub fn page_or_all(&self) -> Option<PageRequest> {
        (!self.no_pagination).then(|| self.page())
    }
}

/// Query-string boolean. A bare `?flag` counts as set; `0`/`false`/`off`/`no`
/// switch it off.
pub fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;

    match value.to_ascii_lowercase().as_str() {
        "" | "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => Err(de::Error::invalid_value(
            de::Unexpected::Str(other),
            &"a boolean flag",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_query(query: &str) -> PageQuery {
        let uri: axum::http::Uri = format!("/depots?{}", query).parse().unwrap();
        axum::extract::Query::<PageQuery>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    #[test]
    fn no_pagination_flag_disables_paging() {
        assert_eq!(page_query("no-pagination=1").page_or_all(), None);
        assert_eq!(
            page_query("no-pagination=0&page=2").page_or_all(),
            Some(PageRequest { page: 2 })
        );
        assert_eq!(page_query("no-pagination").page_or_all(), None);
        assert_eq!(page_query("").page_or_all(), Some(PageRequest { page: 1 }));
    }

    #[test]
    fn out_of_range_pages_stay_in_range() {
        let page = page_query("page=9223372036854775807").page();
        assert_eq!(page.page, crate::repo::MAX_PAGE);

        let meta = PageMeta::new(page, 0, 3);
        assert_eq!(meta.current_page, crate::repo::MAX_PAGE);
        assert_eq!(meta.from, None);
        assert_eq!(meta.last_page, 1);
    }

    #[test]
    fn meta_describes_the_page() {
        let meta = PageMeta::new(PageRequest { page: 2 }, 1, 11);
        assert_eq!(
            meta,
            PageMeta {
                current_page: 2,
                from: Some(11),
                last_page: 2,
                per_page: 10,
                to: Some(11),
                total: 11,
            }
        );

        let empty = PageMeta::new(PageRequest { page: 1 }, 0, 0);
        assert_eq!(empty.from, None);
        assert_eq!(empty.last_page, 1);
    }

    #[test]
    fn unpaginated_lists_have_no_meta() {
        let body = serde_json::to_value(ListResponse::from(Paged::all(vec![1, 2, 3]))).unwrap();
        assert_eq!(body, serde_json::json!({ "data": [1, 2, 3] }));
    }
}
