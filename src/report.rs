use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use serde_yaml::Value;

use crate::pattern::LogEntry;
use crate::ranking::ProblemRecord;
use crate::scanner::ScanStats;
use crate::window::TimeWindow;

/// Everything the renderer gets to see.
#[derive(Clone, Debug, Serialize)]
pub struct ReportData {
    pub configuration: String,
    pub generated_at: DateTime<FixedOffset>,
    pub window: TimeWindow,
    pub stats: ScanStats,
    pub problematic_entries: Vec<LogEntry>,
    pub top_problems: Vec<ProblemRecord>,
    pub config: BTreeMap<String, Value>,
}

#[derive(Clone, Debug)]
pub struct RunInfo {
    pub configuration: String,
    pub generated_at: DateTime<FixedOffset>,
    pub window: TimeWindow,
    pub stats: ScanStats,
}

pub fn assemble(entries: Vec<LogEntry>, top_problems: Vec<ProblemRecord>, passthrough: BTreeMap<String, Value>, run: RunInfo) -> ReportData {
    ReportData {
        configuration: run.configuration,
        generated_at: run.generated_at,
        window: run.window,
        stats: run.stats,
        problematic_entries: entries,
        top_problems,
        config: passthrough,
    }
}
