use std::sync::OnceLock;

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::Serialize;

use crate::error::AggregateError;
use crate::pattern::LogEntry;

/// Inclusive time bounds; `None` leaves that side open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub from: Option<DateTime<FixedOffset>>,
    pub to: Option<DateTime<FixedOffset>>,
}

impl TimeWindow {
    pub fn is_unbounded(&self) -> bool { self.from.is_none() && self.to.is_none() }

    pub fn contains(&self, t: &DateTime<FixedOffset>) -> bool {
        self.from.is_none_or(|f| *t >= f) && self.to.is_none_or(|u| *t <= u)
    }
}

/// Drops entries whose `time_local` falls outside `window`.
///
/// Entries without `time_local` always stay. When the window has a bound, an entry whose
/// `time_local` cannot be parsed is logged and left out, since it can't be placed in the window.
pub fn filter(entries: Vec<LogEntry>, window: &TimeWindow) -> Vec<LogEntry> {
    if window.is_unbounded() { return entries; }
    if let (Some(f), Some(t)) = (window.from, window.to) && f > t {
        log::warn!("Time window starts ({}) after it ends ({}); no dated entries can match", f, t);
    }
    let total = entries.len();
    let mut unparsed = 0usize;
    let kept: Vec<LogEntry> = entries.into_iter().filter(|e| {
        let Some(raw) = e.get("time_local") else { return true };
        match crate::time_local::parse(raw) {
            Ok(t) => window.contains(&t),
            Err(err) => { log::warn!("{}; entry excluded from time window", err); unparsed += 1; false }
        }
    }).collect();
    if unparsed > 0 { log::info!("{} entries had an unreadable $time_local and were excluded", unparsed); }
    log::info!("Time window kept {} of {} entries", kept.len(), total);
    kept
}

static AGO_RE: OnceLock<Regex> = OnceLock::new();

fn local_fixed(naive: &NaiveDateTime) -> Option<DateTime<FixedOffset>> {
    Local.from_local_datetime(naive).earliest().map(|d| d.fixed_offset())
}

/// Resolves a configured `from`/`to` string into a timestamp relative to `now`.
pub fn resolve_bound(text: &str, now: DateTime<Local>) -> Result<DateTime<FixedOffset>, AggregateError> {
    let s = text.trim();
    let bad = || AggregateError::ConfigValidation(format!("cannot understand time {:?}", text));
    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).and_then(|n| local_fixed(&n));
    match s.to_ascii_lowercase().as_str() {
        "now" => return Ok(now.fixed_offset()),
        "today" => return midnight(now.date_naive()).ok_or_else(bad),
        "yesterday" => return now.date_naive().pred_opt().and_then(midnight).ok_or_else(bad),
        _ => {}
    }
    let ago = AGO_RE.get_or_init(|| Regex::new(r"(?i)^(\d+)\s*(minute|min|hour|day|week)s?\s+ago$").expect("static regex"));
    if let Some(c) = ago.captures(s) {
        let n: i64 = c[1].parse().map_err(|_| bad())?;
        let d = match c[2].to_ascii_lowercase().as_str() {
            "minute" | "min" => Duration::try_minutes(n),
            "hour" => Duration::try_hours(n),
            "day" => Duration::try_days(n),
            _ => Duration::try_weeks(n),
        }.ok_or_else(bad)?;
        return now.checked_sub_signed(d).map(|t| t.fixed_offset()).ok_or_else(bad);
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(s) { return Ok(t); }
    for f in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, f) { return local_fixed(&n).ok_or_else(bad); }
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") { return midnight(d).ok_or_else(bad); }
    crate::time_local::parse(s).map_err(|_| bad())
}
