use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use regex::Regex;

use crate::error::AggregateError;

const MONTHS: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

static TIME_LOCAL_RE: OnceLock<Regex> = OnceLock::new();

fn time_local_re() -> &'static Regex {
    TIME_LOCAL_RE.get_or_init(|| {
        Regex::new(r"^(\d{2})/([A-Za-z]{3})/(\d{4}):(\d{2}):(\d{2}):(\d{2}) ([+-])(\d{2})(\d{2})$").expect("static regex")
    })
}

/// 1-based month number for an nginx month abbreviation.
pub fn month_number(abbr: &str) -> Option<u32> { MONTHS.iter().position(|m| *m == abbr).map(|i| i as u32 + 1) }

/// Parses nginx `$time_local` (`DD/Mon/YYYY:HH:MM:SS +HHMM`), keeping the logged UTC offset.
pub fn parse(text: &str) -> Result<DateTime<FixedOffset>, AggregateError> {
    let bad = || AggregateError::TimeParse(text.to_string());
    let caps = time_local_re().captures(text.trim()).ok_or_else(bad)?;
    let num = |i: usize| caps[i].parse::<u32>().map_err(|_| bad());
    let month = month_number(&caps[2]).ok_or_else(bad)?;
    let year = caps[3].parse::<i32>().map_err(|_| bad())?;
    let sign = if &caps[7] == "+" { 1 } else { -1 };
    let offset_minutes = sign * (num(8)? as i32 * 60 + num(9)? as i32);
    let offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(bad)?;
    let (day, hour, minute, second) = (num(1)?, num(4)?, num(5)?, num(6)?);
    let naive = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, minute, second))
        .ok_or_else(bad)?;
    offset.from_local_datetime(&naive).single().ok_or_else(bad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_fields_and_offset() {
        let t = parse("25/Jun/2014:06:26:42 +0200").unwrap();
        assert_eq!((t.day(), t.month(), t.year()), (25, 6, 2014));
        assert_eq!((t.hour(), t.minute(), t.second()), (6, 26, 42));
        assert_eq!(t.offset().local_minus_utc(), 120 * 60);
    }

    #[test]
    fn negative_offset_with_minutes() {
        let t = parse("01/Dec/2023:23:59:59 -0330").unwrap();
        assert_eq!(t.month(), 12);
        assert_eq!(t.offset().local_minus_utc(), -(3 * 60 + 30) * 60);
    }

    #[test]
    fn every_month_resolves() {
        for (i, m) in MONTHS.iter().enumerate() {
            let t = parse(&format!("10/{}/2020:00:00:00 +0000", m)).unwrap();
            assert_eq!(t.month() as usize, i + 1);
        }
        assert_eq!(month_number("Dev"), None);
        assert_eq!(month_number("jun"), None);
    }

    #[test]
    fn rejects_malformed_values() {
        for s in ["", "25/Jun/2014 06:26:42 +0200", "25/June/2014:06:26:42 +0200", "31/Feb/2014:06:26:42 +0000", "25/Jun/2014:25:00:00 +0000", "25/Jun/2014:06:26:42"] {
            assert!(matches!(parse(s), Err(AggregateError::TimeParse(_))), "{}", s);
        }
    }

    #[test]
    fn comparison_uses_the_instant() {
        let a = parse("25/Jun/2014:06:00:00 +0200").unwrap();
        let b = parse("25/Jun/2014:05:30:00 +0000").unwrap();
        assert!(a < b);
    }
}
