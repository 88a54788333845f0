use regex::Regex;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::AggregateError;

/// Compiled nginx `log_format`: one capture group per `$token`, everything else literal.
#[derive(Clone, Debug)]
pub struct LogPattern {
    fields: Vec<String>,
    regex: Regex,
}

/// Field values pulled out of one matching log line, kept in slot order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogEntry {
    fields: Vec<(String, String)>,
}

fn is_name_char(c: char) -> bool { c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' }

impl LogPattern {
    pub fn compile(format: &str) -> Result<Self, AggregateError> {
        let mut fields: Vec<String> = vec![];
        let mut source = String::with_capacity(format.len() * 2);
        let mut literal = String::new();
        let mut chars = format.char_indices().peekable();
        while let Some((offset, c)) = chars.next() {
            if c != '$' { literal.push(c); continue; }
            let mut name = String::new();
            while let Some(&(_, n)) = chars.peek() {
                if !is_name_char(n) { break; }
                name.push(n);
                chars.next();
            }
            if name.is_empty() {
                return Err(AggregateError::PatternCompile(format!("'$' at offset {} is not followed by a variable name", offset)));
            }
            source.push_str(&regex::escape(&literal));
            literal.clear();
            source.push_str("(.*)");
            if fields.contains(&name) { log::warn!("log format repeats ${}; only its first occurrence is used", name); }
            fields.push(name);
        }
        source.push_str(&regex::escape(&literal));
        if fields.is_empty() {
            return Err(AggregateError::PatternCompile(format!("format {:?} contains no $variables", format)));
        }
        let regex = Regex::new(&source).map_err(|e| AggregateError::PatternCompile(e.to_string()))?;
        log::debug!("compiled log format into {} with {} fields", regex.as_str(), fields.len());
        Ok(Self { fields, regex })
    }

    /// Field names in slot order; index `i` names capture group `i + 1`.
    pub fn fields(&self) -> &[String] { &self.fields }

    /// Matches a single line and returns its fields, or `None` when the line doesn't fit the format.
    pub fn extract(&self, line: &str) -> Option<LogEntry> {
        let caps = self.regex.captures(line)?;
        let mut entry = LogEntry::default();
        for (i, name) in self.fields.iter().enumerate() {
            let value = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
            entry.insert(name, value);
        }
        Some(entry)
    }
}

impl LogEntry {
    /// Adds a field unless the name is already present.
    pub fn insert(&mut self, name: &str, value: &str) {
        if self.get(name).is_some() { return; }
        self.fields.push((name.to_string(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn status(&self) -> Option<u16> { self.get("status").and_then(|s| s.trim().parse().ok()) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> { self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())) }
}

impl<const N: usize> From<[(&str, &str); N]> for LogEntry {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut entry = LogEntry::default();
        for (k, v) in pairs { entry.insert(k, v); }
        entry
    }
}

impl Serialize for LogEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields { map.serialize_entry(k, v)?; }
        map.end()
    }
}
