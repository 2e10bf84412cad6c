//! `SCOPE-YYYYMMDD-NNNN` booking references. The format is a durable
//! contract for issued numbers.

use chrono::NaiveDate;

pub const MAX_SERIAL: u32 = 9999;

pub fn booking_prefix(scope_code: &str, date: NaiveDate) -> String {
    format!("{}-{}", scope_code, date.format("%Y%m%d"))
}

/// `None` when the serial does not fit in four digits.
pub fn format_booking_number(scope_code: &str, date: NaiveDate, serial: u32) -> Option<String> {
    if serial == 0 || serial > MAX_SERIAL {
        return None;
    }
    Some(format!("{}-{:04}", booking_prefix(scope_code, date), serial))
}

/// Serial of a number issued under `prefix`, if it is one.
pub fn parse_serial(booking_number: &str, prefix: &str) -> Option<u32> {
    let rest = booking_number.strip_prefix(prefix)?.strip_prefix('-')?;
    if rest.len() != 4 || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// One past the highest serial already issued for (scope, date).
pub fn next_serial<'a, I>(issued: I, scope_code: &str, date: NaiveDate) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = booking_prefix(scope_code, date);
    issued
        .into_iter()
        .filter_map(|n| parse_serial(n, &prefix))
        .max()
        .unwrap_or(0)
        + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jan10() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    #[test]
    fn formats_with_padding() {
        assert_eq!(format_booking_number("D1", jan10(), 1).as_deref(), Some("D1-20240110-0001"));
        assert_eq!(format_booking_number("D1", jan10(), 9999).as_deref(), Some("D1-20240110-9999"));
        assert_eq!(format_booking_number("D1", jan10(), 10000), None);
        assert_eq!(format_booking_number("D1", jan10(), 0), None);
    }

    #[test]
    fn next_serial_ignores_other_scopes_and_days() {
        let issued = [
            "D1-20240110-0001",
            "D1-20240110-0007",
            "D10-20240110-0042",
            "D1-20240111-0050",
            "CLN-20240110-0099",
        ];
        assert_eq!(next_serial(issued.iter().copied(), "D1", jan10()), 8);
        assert_eq!(next_serial(std::iter::empty(), "D1", jan10()), 1);
    }

    #[test]
    fn scope_prefix_must_match_exactly() {
        // "D1" must not pick up serials issued to "D1X" or "D10"
        assert_eq!(parse_serial("D10-20240110-0042", "D1-20240110"), None);
        assert_eq!(parse_serial("D1-20240110-0042", "D1-20240110"), Some(42));
    }
}
