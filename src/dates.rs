use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::Serializer;

/// Rendering of `created_at`/`updated_at` columns.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %I:%M:%S";

/// Adds whole calendar months, clamping to the last day of a shorter month
/// (Jan 31 + 1 month is Feb 28, or Feb 29 in a leap year).
///
/// Postgres `date + interval 'n months'` clamps the same way, so the list filter
/// and the serialized value agree.
pub fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(months))
}

/// Expiry of a passenger wagon's repair certification: the repair date shifted
/// by the validity configured on the wagon's type.
pub fn passenger_repair_valid_until(
    repair_date: Option<NaiveDate>,
    repair_valid_for: i32,
) -> Option<NaiveDate> {
    let months = u32::try_from(repair_valid_for).ok()?;
    add_months(repair_date?, months)
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = day.with_day(1).unwrap_or(day);
    let last = add_months(first, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(day);
    (first, last)
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn serialize_timestamp<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adding_months_clamps_to_month_end() {
        assert_eq!(add_months(date(2023, 1, 31), 1), Some(date(2023, 2, 28)));
        assert_eq!(add_months(date(2024, 1, 31), 1), Some(date(2024, 2, 29)));
        assert_eq!(add_months(date(2023, 3, 31), 1), Some(date(2023, 4, 30)));
        assert_eq!(add_months(date(2023, 8, 31), 6), Some(date(2024, 2, 29)));
    }

    #[test]
    fn adding_months_crosses_years() {
        assert_eq!(add_months(date(2022, 11, 15), 24), Some(date(2024, 11, 15)));
        assert_eq!(add_months(date(2022, 12, 1), 1), Some(date(2023, 1, 1)));
        assert_eq!(add_months(date(2022, 12, 1), 0), Some(date(2022, 12, 1)));
    }

    #[test]
    fn passenger_validity_uses_type_duration() {
        assert_eq!(
            passenger_repair_valid_until(Some(date(2021, 1, 31)), 36),
            Some(date(2024, 1, 31))
        );
        assert_eq!(
            passenger_repair_valid_until(Some(date(2023, 1, 31)), 1),
            Some(date(2023, 2, 28))
        );
        assert_eq!(passenger_repair_valid_until(None, 12), None);
        assert_eq!(passenger_repair_valid_until(Some(date(2023, 1, 1)), -1), None);
    }

    #[test]
    fn month_bounds_cover_whole_month() {
        assert_eq!(month_bounds(date(2024, 2, 14)), (date(2024, 2, 1), date(2024, 2, 29)));
        assert_eq!(month_bounds(date(2023, 12, 31)), (date(2023, 12, 1), date(2023, 12, 31)));
        assert_eq!(month_bounds(date(2023, 4, 1)), (date(2023, 4, 1), date(2023, 4, 30)));
    }

    #[test]
    fn timestamps_use_day_first_format() {
        let value = date(2024, 3, 7).and_hms_opt(15, 4, 9).unwrap();
        assert_eq!(format_timestamp(&value), "07.03.2024 03:04:09");
    }
}
