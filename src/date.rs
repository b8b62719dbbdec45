//! Conversions between the date shapes providers send and the canonical
//! `YYYYMMDD` integer used for sorting and range filtering.

use chrono::{Datelike, NaiveDate, Utc};

/// A calendar date packed as `YYYYMMDD`.
pub type DateNumber = u32;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Inclusive bounds of a date slider, either side may be unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DateRange {
    pub min: Option<DateNumber>,
    pub max: Option<DateNumber>,
}

pub fn date_to_date_number(date: NaiveDate) -> DateNumber {
    date.year() as u32 * 10_000 + date.month() * 100 + date.day()
}

pub fn date_number_to_date(num: DateNumber) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt((num / 10_000) as i32, (num / 100) % 100, num % 100)
}

/// `20240101` -> `2024-01-01`
pub fn date_number_to_iso(num: DateNumber) -> String {
    format!("{:04}-{:02}-{:02}", num / 10_000, (num / 100) % 100, num % 100)
}

/// `2024-01-01` -> `20240101`
pub fn iso_to_date_number(iso: &str) -> Option<DateNumber> {
    let date = NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d").ok()?;
    Some(date_to_date_number(date))
}

/// `20240101` -> `01/01/2024`, the form used inside identity keys.
pub fn date_number_to_display(num: DateNumber) -> String {
    format!("{:02}/{:02}/{:04}", num % 100, (num / 100) % 100, num / 10_000)
}

/// Midnight UTC of the date, in seconds.
pub fn date_number_to_epoch_seconds(num: DateNumber) -> Option<i64> {
    let date = date_number_to_date(num)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
}

/// Parse the loosely formatted dates found in provider calendars.
///
/// Accepts `/` or `-` separators, day-first (`15/Mar/2024`, `14/03/25`) or
/// year-first (`2025-05-18`, `2025-May-18`) ordering and three-letter month
/// names. Missing trailing parts default to the current year, January and the
/// 1st. Two-digit years are taken as `2000 + year`.
///
/// When the numeric month exceeds 12 the day and month are swapped, because
/// some providers emit `MM/DD/YYYY` in a `DD/MM/YYYY` column. A genuine
/// `MM/DD` date with a day of 12 or less cannot be told apart and is read
/// day-first.
pub fn parse_loose_date(text: &str) -> Option<DateNumber> {
    parse_loose_date_with_year(text, Utc::now().year())
}

pub(crate) fn parse_loose_date_with_year(text: &str, current_year: i32) -> Option<DateNumber> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let tokens: Vec<&str> = text.split(['/', '-']).map(str::trim).collect();

    let year_first = tokens
        .first()
        .map(|t| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);

    let (year, month, day) = if year_first {
        let mut it = tokens.into_iter();
        (it.next(), it.next(), it.next())
    } else {
        let mut it = tokens.into_iter().rev();
        (it.next(), it.next(), it.next())
    };

    let year = match year {
        Some(y) => parse_year(y)?,
        None => current_year,
    };
    let (mut month, month_is_numeric) = match month {
        Some(m) => parse_month(m)?,
        None => (1, false),
    };
    let mut day: u32 = match day {
        Some(d) => d.parse().ok()?,
        None => 1,
    };

    if month_is_numeric && month > 12 {
        std::mem::swap(&mut day, &mut month);
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date_to_date_number(date))
}

/// Two-digit years are `20xx`; anything but two or four digits is rejected.
fn parse_year(token: &str) -> Option<i32> {
    if !token.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let year: i32 = token.parse().ok()?;
    match token.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

fn parse_month(token: &str) -> Option<(u32, bool)> {
    if let Ok(m) = token.parse::<u32>() {
        return Some((m, true));
    }
    let lower = token.to_lowercase();
    MONTHS
        .iter()
        .position(|m| lower.starts_with(m))
        .map(|i| (i as u32 + 1, false))
}

/// Fractional position of `date` inside `range`.
pub fn date_to_ratio(date: DateNumber, range: DateRange) -> f64 {
    let (Some(min), Some(max)) = (range.min, range.max) else {
        return 0.5;
    };
    if date == 0 || min == max {
        return 0.0;
    }
    let (Some(min_ts), Some(max_ts), Some(date_ts)) = (
        date_number_to_epoch_seconds(min),
        date_number_to_epoch_seconds(max),
        date_number_to_epoch_seconds(date),
    ) else {
        return 0.0;
    };
    (date_ts - min_ts) as f64 / (max_ts - min_ts) as f64
}

/// Inverse of [`date_to_ratio`]; unbounded ranges map to `0`.
pub fn ratio_to_date(ratio: f64, range: DateRange) -> DateNumber {
    let (Some(min), Some(max)) = (range.min, range.max) else {
        return 0;
    };
    let (Some(min_ts), Some(max_ts)) = (
        date_number_to_epoch_seconds(min),
        date_number_to_epoch_seconds(max),
    ) else {
        return 0;
    };
    let ts = min_ts + (ratio * (max_ts - min_ts) as f64) as i64;
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| date_to_date_number(dt.date_naive()))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_abbreviation() {
        assert_eq!(parse_loose_date("15/Mar/2024"), Some(20240315));
        assert_eq!(parse_loose_date("2025-May-18"), Some(20250518));
    }

    #[test]
    fn test_year_first_dashed() {
        assert_eq!(parse_loose_date("2025-05-18"), Some(20250518));
        assert_eq!(parse_loose_date("2024/03/15"), Some(20240315));
    }

    #[test]
    fn test_swap_only_when_month_exceeds_twelve() {
        assert_eq!(parse_loose_date("13/05/2024"), Some(20240513));
        assert_eq!(parse_loose_date("25/12/2024"), Some(20241225));
        assert_eq!(parse_loose_date("05/13/2024"), Some(20240513));
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(parse_loose_date("14/03/25"), Some(20250314));
    }

    #[test]
    fn test_missing_parts_default() {
        assert_eq!(parse_loose_date_with_year("Mar/2024", 2030), Some(20240301));
        assert_eq!(parse_loose_date_with_year("2024", 2030), Some(20240101));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_loose_date(""), None);
        assert_eq!(parse_loose_date("TBC"), None);
        assert_eq!(parse_loose_date("31/02/2024"), None);
        assert_eq!(parse_loose_date("15/Foo/2024"), None);
        assert_eq!(parse_loose_date("15/03/202"), None);
        assert_eq!(parse_loose_date("15/03/20245"), None);
        assert_eq!(parse_loose_date("15/03/5"), None);
    }

    #[test]
    fn test_display_round_trip() {
        let mut date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        while date <= end {
            let n = date_to_date_number(date);
            assert_eq!(parse_loose_date(&date_number_to_display(n)), Some(n), "{n}");
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_iso_is_zero_padded() {
        assert_eq!(date_number_to_iso(20240105), "2024-01-05");
        assert_eq!(iso_to_date_number("2024-01-05"), Some(20240105));
        assert_eq!(date_number_to_display(20240105), "05/01/2024");
    }

    #[test]
    fn test_epoch_seconds() {
        assert_eq!(date_number_to_epoch_seconds(19700101), Some(0));
        assert_eq!(date_number_to_epoch_seconds(20240315), Some(1_710_460_800));
    }

    #[test]
    fn test_ratio() {
        let range = DateRange {
            min: Some(20240101),
            max: Some(20240111),
        };
        assert_eq!(date_to_ratio(20240106, range), 0.5);
        assert_eq!(ratio_to_date(0.5, range), 20240106);
        assert_eq!(date_to_ratio(20240106, DateRange::default()), 0.5);
        assert_eq!(ratio_to_date(0.5, DateRange::default()), 0);
        assert_eq!(date_to_ratio(0, range), 0.0);
    }
}
