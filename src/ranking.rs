use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::pattern::LogEntry;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RankingConfig {
    /// Maximum records to emit; `None` means no limit.
    pub limit: Option<usize>,
    /// Smallest group that qualifies; `None` means every group does.
    pub min_count: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProblemRecord {
    pub request: String,
    pub total: usize,
    /// `(status, count)` ascending by status.
    pub statuses: Vec<(u16, usize)>,
}

impl ProblemRecord {
    /// Renders the breakdown as `HTTP/404:2, HTTP/500:1`.
    pub fn codes_summary(&self) -> String {
        self.statuses.iter().map(|(code, n)| format!("HTTP/{}:{}", code, n)).collect::<Vec<_>>().join(", ")
    }
}

/// Groups entries by `request`, most frequent first, and returns the qualifying groups.
///
/// Ties keep first-seen order. Groups under `min_count` are skipped and do not use up `limit`;
/// otherwise exactly `limit` records come back when that many groups qualify.
pub fn rank(entries: &[LogEntry], cfg: &RankingConfig) -> Vec<ProblemRecord> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<&LogEntry>)> = vec![];
    for e in entries {
        let key = e.get("request").unwrap_or("");
        let slot = *index.entry(key).or_insert_with(|| { groups.push((key, vec![])); groups.len() - 1 });
        groups[slot].1.push(e);
    }
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
    let mut out: Vec<ProblemRecord> = vec![];
    for (request, members) in groups {
        if cfg.limit.is_some_and(|l| out.len() >= l) { break; }
        if cfg.min_count.is_some_and(|m| members.len() < m) { continue; }
        let mut by_code: BTreeMap<u16, usize> = BTreeMap::new();
        for e in &members {
            if let Some(code) = e.status() { *by_code.entry(code).or_insert(0) += 1; }
        }
        out.push(ProblemRecord { request: request.to_string(), total: members.len(), statuses: by_code.into_iter().collect() });
    }
    log::debug!("Ranked {} problem request(s) from {} entries", out.len(), entries.len());
    out
}
