//! Timeframe string parsing.
//!
//! Tasks can carry a named planning window instead of explicit date
//! constraints. Supported forms:
//! - `2025`: full year
//! - `2025q3`: calendar quarter
//! - `2025h2`: calendar half
//! - `2025-03`: month
//! - `2025w07`: ISO week (Monday through Sunday)

use chrono::{Days, NaiveDate, Weekday};

/// Parse a timeframe string to a closed `(start, end)` interval. Returns
/// `None` for anything unparseable.
pub fn parse_timeframe(input: &str) -> Option<(NaiveDate, NaiveDate)> {
    let s = input.trim().to_ascii_lowercase();
    let bytes = s.as_bytes();

    if s.len() == 4 {
        let year: i32 = s.parse().ok()?;
        return Some((
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
        ));
    }

    // Month: 2025-03
    if s.len() == 7 && bytes[4] == b'-' {
        let year: i32 = s[..4].parse().ok()?;
        let month: u32 = s[5..].parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        return Some((NaiveDate::from_ymd_opt(year, month, 1)?, month_end(year, month)?));
    }

    if s.len() < 6 {
        return None;
    }
    let year: i32 = s[..4].parse().ok()?;
    let rest = &s[5..];

    match bytes[4] {
        b'q' => {
            let quarter: u32 = rest.parse().ok()?;
            if !(1..=4).contains(&quarter) {
                return None;
            }
            let start_month = (quarter - 1) * 3 + 1;
            Some((
                NaiveDate::from_ymd_opt(year, start_month, 1)?,
                month_end(year, start_month + 2)?,
            ))
        }
        b'h' => {
            let half: u32 = rest.parse().ok()?;
            if !(1..=2).contains(&half) {
                return None;
            }
            let start_month = (half - 1) * 6 + 1;
            Some((
                NaiveDate::from_ymd_opt(year, start_month, 1)?,
                month_end(year, start_month + 5)?,
            ))
        }
        b'w' => {
            let week: u32 = rest.parse().ok()?;
            let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
            Some((monday, monday.checked_add_days(Days::new(6))?))
        }
        _ => None,
    }
}

/// Last day of the given month.
fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}
