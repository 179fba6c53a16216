//! Display formatting of 12-digit UIC vehicle numbers.
//!
//! Numbers are stored as bare digits. For display they are cut into fixed
//! groups: passenger wagons as `AB CD EF-GH XYZ-K`, freight wagons and tractive
//! units as `AB CD EFGH XYZ-K`. The short forms drop the first two groups
//! (country and owner code).
//!
//! Formatting never validates; a shorter input simply yields fewer groups.

/// Grouping scheme of a vehicle number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberStyle {
    Passenger,
    Freight,
}

impl NumberStyle {
    fn groups(self) -> &'static [(usize, &'static str)] {
        // (width, separator placed before the group); the first group's separator is never used
        match self {
            NumberStyle::Passenger => &[(2, ""), (2, " "), (2, " "), (2, "-"), (3, " "), (1, "-")],
            NumberStyle::Freight => &[(2, ""), (2, " "), (4, " "), (3, " "), (1, "-")],
        }
    }
}

/// Full display form, e.g. `84 52 6651 070-8`.
pub fn stylize(number: &str, style: NumberStyle) -> String {
    format_groups(number, style.groups())
}

/// Display form without country and owner code, e.g. `6651 070-8`.
pub fn stylize_short(number: &str, style: NumberStyle) -> String {
    let skipped: usize = style.groups()[..2].iter().map(|(width, _)| width).sum();
    let rest: String = number.chars().skip(skipped).collect();

    format_groups(&rest, &style.groups()[2..])
}

/// Strips every separator that [`stylize`] may insert.
pub fn normalize(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect()
}

/// `true` for exactly twelve ASCII digits.
pub fn is_valid(number: &str) -> bool {
    number.len() == 12 && number.bytes().all(|b| b.is_ascii_digit())
}

fn format_groups(number: &str, groups: &[(usize, &str)]) -> String {
    let mut chars = number.chars();
    let mut out = String::with_capacity(number.len() + groups.len());

    for &(width, separator) in groups {
        let group: String = chars.by_ref().take(width).collect();
        if group.is_empty() {
            break;
        }
        if !out.is_empty() {
            out.push_str(separator);
        }
        out.push_str(&group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freight_number_is_grouped() {
        assert_eq!(
            stylize("845266510708", NumberStyle::Freight),
            "84 52 6651 070-8"
        );
    }

    #[test]
    fn passenger_number_is_grouped() {
        assert_eq!(
            stylize("615629700234", NumberStyle::Passenger),
            "61 56 29-70 023-4"
        );
    }

    #[test]
    fn short_forms_drop_country_and_owner() {
        assert_eq!(
            stylize_short("845266510708", NumberStyle::Freight),
            "6651 070-8"
        );
        assert_eq!(
            stylize_short("615629700234", NumberStyle::Passenger),
            "29-70 023-4"
        );
    }

    #[test]
    fn digits_survive_formatting() {
        for number in ["000000000000", "999999999999", "505620801234", "918101234560"] {
            for style in [NumberStyle::Passenger, NumberStyle::Freight] {
                assert_eq!(normalize(&stylize(number, style)), number);
            }
        }
    }

    #[test]
    fn only_passenger_style_splits_the_serial_block() {
        let passenger = stylize("123456789012", NumberStyle::Passenger);
        let freight = stylize("123456789012", NumberStyle::Freight);

        assert_eq!(&passenger[6..11], "56-78");
        assert!(freight.contains("5678"));
        assert_eq!(passenger.matches('-').count(), 2);
        assert_eq!(freight.matches('-').count(), 1);
    }

    #[test]
    fn short_input_does_not_panic() {
        assert_eq!(stylize("8452", NumberStyle::Freight), "84 52");
        assert_eq!(stylize("", NumberStyle::Passenger), "");
        assert_eq!(stylize_short("84", NumberStyle::Freight), "");
    }

    #[test]
    fn validity_requires_twelve_digits() {
        assert!(is_valid("845266510708"));
        assert!(!is_valid("84526651070"));
        assert!(!is_valid("84526651070a"));
        assert!(!is_valid("84 52 6651 070-8"));
    }
}
