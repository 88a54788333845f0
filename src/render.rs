use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use comfy_table::{ContentArrangement, Table};
use regex::{Captures, Regex};
use serde_yaml::Value;

use crate::error::AggregateError;
use crate::ranking::ProblemRecord;
use crate::report::ReportData;

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

pub fn load_template(path: &str) -> Result<String, AggregateError> {
    std::fs::read_to_string(path).map_err(|e| AggregateError::TemplateLoad { path: path.to_string(), reason: e.to_string() })
}

fn fmt_time(t: Option<DateTime<FixedOffset>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S %z").to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn problems_table(problems: &[ProblemRecord]) -> String {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Disabled);
    table.set_header(vec!["URI", "Count", "Codes"]);
    for p in problems { table.add_row(vec![p.request.clone(), p.total.to_string(), p.codes_summary()]); }
    table.to_string()
}

pub fn problems_list(problems: &[ProblemRecord]) -> String {
    problems.iter().map(|p| format!("{} ({}): {}", p.request, p.total, p.codes_summary())).collect::<Vec<_>>().join("\n")
}

pub fn entries_list(rep: &ReportData) -> String {
    rep.problematic_entries.iter()
        .map(|e| e.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn scalar(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lookup(name: &str, rep: &ReportData) -> Option<String> {
    let v = match name {
        "configuration" => rep.configuration.clone(),
        "generated_at" => rep.generated_at.format("%Y-%m-%d %H:%M").to_string(),
        "from" => fmt_time(rep.window.from),
        "to" => fmt_time(rep.window.to),
        "entry_count" => rep.problematic_entries.len().to_string(),
        "problem_count" => rep.top_problems.len().to_string(),
        "files_scanned" => rep.stats.files_scanned.to_string(),
        "files_failed" => rep.stats.files_failed.to_string(),
        "top_problems" => problems_table(&rep.top_problems),
        "top_problems_list" => problems_list(&rep.top_problems),
        "problematic_entries" => entries_list(rep),
        other => return rep.config.get(other).and_then(scalar),
    };
    Some(v)
}

/// Fills `{{ name }}` placeholders in `template` from the report.
pub fn render_text(template: &str, rep: &ReportData) -> String {
    let re = PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z0-9_-]+)\s*\}\}").expect("static regex"));
    re.replace_all(template, |c: &Captures| {
        lookup(&c[1], rep).unwrap_or_else(|| { log::debug!("template placeholder {{{{{}}}}} has no value", &c[1]); String::new() })
    }).into_owned()
}

pub fn write_csv(path: &str, rep: &ReportData) -> Result<(), std::io::Error> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["uri", "total", "codes"])?;
    for p in &rep.top_problems { wtr.write_record([p.request.clone(), p.total.to_string(), p.codes_summary()])?; }
    wtr.flush()?;
    Ok(())
}
