//! Query-string filters for the fleet listings.
//!
//! Every field is an independent predicate: a present parameter narrows the
//! listing, an absent one is a no-op, and all present predicates are ANDed.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::dates;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FleetFilter {
    pub depot_id: Option<i32>,
    pub status_id: Option<i32>,
    pub owner_id: Option<i32>,
    pub type_id: Option<i32>,
    pub repair_workshop_id: Option<i32>,
    /// Orders by vehicle number; listings fall back to id order without it.
    pub sort: Option<SortDirection>,
    #[serde(default, deserialize_with = "crate::api::deserialize_flag")]
    pub repair_valid_until_this_month: bool,
}

impl FleetFilter {
    /// Inclusive date range the repair validity must fall into, if requested.
    pub fn repair_window(&self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        self.repair_valid_until_this_month
            .then(|| dates::month_bounds(today))
    }
}

/// Applies the filters shared by all three fleet tables to a boxed query.
macro_rules! apply_common {
    ($query:expr, $table:ident, $filter:expr) => {{
        let mut query = $query;
        if let Some(id) = $filter.depot_id {
            query = query.filter($table::depot_id.eq(id));
        }
        if let Some(id) = $filter.status_id {
            query = query.filter($table::status_id.eq(id));
        }
        if let Some(id) = $filter.owner_id {
            query = query.filter($table::owner_id.eq(id));
        }
        if let Some(id) = $filter.repair_workshop_id {
            query = query.filter($table::repair_workshop_id.eq(id));
        }
        query
    }};
}

macro_rules! order_by_number {
    ($query:expr, $table:ident, $sort:expr) => {
        match $sort {
            Some($crate::repo::filter::SortDirection::Asc) => {
                $query.order(($table::number.asc(), $table::id.asc()))
            }
            Some($crate::repo::filter::SortDirection::Desc) => {
                $query.order(($table::number.desc(), $table::id.asc()))
            }
            None => $query.order($table::id.asc()),
        }
    };
}

pub(crate) use apply_common;
pub(crate) use order_by_number;

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> FleetFilter {
        let uri: axum::http::Uri = format!("/freight-wagons?{}", query).parse().unwrap();
        axum::extract::Query::<FleetFilter>::try_from_uri(&uri)
            .unwrap()
            .0
    }

    #[test]
    fn absent_parameters_leave_filter_empty() {
        let filter = parse("");
        assert_eq!(filter.depot_id, None);
        assert_eq!(filter.sort, None);
        assert!(!filter.repair_valid_until_this_month);
    }

    #[test]
    fn parameters_are_independent() {
        let filter = parse("depot_id=3&owner_id=7&sort=desc&repair_valid_until_this_month=1");
        assert_eq!(filter.depot_id, Some(3));
        assert_eq!(filter.owner_id, Some(7));
        assert_eq!(filter.status_id, None);
        assert_eq!(filter.sort, Some(SortDirection::Desc));
        assert!(filter.repair_valid_until_this_month);
    }

    #[test]
    fn repair_window_spans_current_month() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let filter = parse("repair_valid_until_this_month=true");

        assert_eq!(
            filter.repair_window(today),
            Some((
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
            ))
        );
        assert_eq!(parse("repair_valid_until_this_month=0").repair_window(today), None);
    }
}
