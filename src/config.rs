use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::AggregateError;
use crate::ranking::RankingConfig;
use crate::window::TimeWindow;

pub const DEFAULT_CFG_NAME: &str = "default";
pub const DEFAULT_CFG_FILE: &str = "config.yml";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    One(String),
    Many(Vec<String>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLocalConfig {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub top_problems: Option<usize>,
    pub min_count: Option<usize>,
}

/// One resolved configuration, after layering over `default`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub format: String,
    pub template: String,
    pub source: Source,
    pub time_local: Option<TimeLocalConfig>,
    pub limits: Option<LimitsConfig>,
}

#[derive(Clone, Debug)]
pub struct Selected {
    pub name: String,
    pub profile: Profile,
    /// Every string-keyed top-level value of the layered configuration, handed to the renderer.
    pub passthrough: BTreeMap<String, Value>,
}

impl Profile {
    pub fn from_mapping(name: &str, m: &Mapping) -> Result<Self, AggregateError> {
        serde_yaml::from_value(Value::Mapping(m.clone())).map_err(|e| AggregateError::ConfigValidation(format!("configuration {}: {}", name, e)))
    }

    pub fn sources(&self) -> Vec<String> {
        match &self.source { Source::One(s) => vec![s.clone()], Source::Many(v) => v.clone() }
    }

    pub fn ranking(&self) -> RankingConfig {
        let l = self.limits.clone().unwrap_or_default();
        RankingConfig { limit: l.top_problems, min_count: l.min_count }
    }

    pub fn window(&self, now: DateTime<Local>) -> Result<TimeWindow, AggregateError> {
        let t = self.time_local.clone().unwrap_or_default();
        let from = t.from.as_deref().map(|s| crate::window::resolve_bound(s, now)).transpose()?;
        let to = t.to.as_deref().map(|s| crate::window::resolve_bound(s, now)).transpose()?;
        Ok(TimeWindow { from, to })
    }
}

/// Reads the YAML document holding every named configuration.
pub fn load_document(path: &str) -> Result<Mapping, AggregateError> {
    let load_err = |reason: String| AggregateError::ConfigLoad { path: path.to_string(), reason };
    let text = std::fs::read_to_string(path).map_err(|e| load_err(e.to_string()))?;
    let doc: Value = serde_yaml::from_str(&text).map_err(|e| load_err(e.to_string()))?;
    let Value::Mapping(m) = doc else { return Err(AggregateError::ConfigValidation(format!("{} must map configuration names to settings", path))) };
    if !matches!(m.get(DEFAULT_CFG_NAME), Some(Value::Mapping(_))) {
        return Err(AggregateError::ConfigValidation(format!("no '{}' configuration found in {}", DEFAULT_CFG_NAME, path)));
    }
    log::debug!("Loaded {} configuration(s) from {}", m.len(), path);
    Ok(m)
}

/// Layers configuration `name` over `default`: top-level keys replace, nested values are not merged.
pub fn select(doc: &Mapping, name: &str) -> Result<Selected, AggregateError> {
    let Some(Value::Mapping(base)) = doc.get(DEFAULT_CFG_NAME) else {
        return Err(AggregateError::ConfigValidation(format!("no '{}' configuration", DEFAULT_CFG_NAME)));
    };
    let mut merged = base.clone();
    if name != DEFAULT_CFG_NAME {
        match doc.get(name) {
            Some(Value::Mapping(named)) => { for (k, v) in named { merged.insert(k.clone(), v.clone()); } }
            Some(_) => return Err(AggregateError::ConfigValidation(format!("configuration {} is not a mapping", name))),
            None => {
                let mut names: Vec<String> = doc.keys().filter_map(|k| k.as_str().map(str::to_string)).collect();
                names.sort();
                return Err(AggregateError::ConfigValidation(format!("no configuration named {}, available configurations are:\n{}", name, names.join("\n"))));
            }
        }
    }
    let profile = Profile::from_mapping(name, &merged)?;
    let passthrough = merged.into_iter().filter_map(|(k, v)| k.as_str().map(|s| (s.to_string(), v))).collect();
    Ok(Selected { name: name.to_string(), profile, passthrough })
}
