/// Failures raised while building a report.
///
/// `ConfigLoad`, `ConfigValidation`, `PatternCompile` and `TemplateLoad` end the run.
/// `FileScan` and `TimeParse` are logged where they happen and the run carries on.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("failed to load configuration {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("cannot compile log format: {0}")]
    PatternCompile(String),

    #[error("failed to scan file {path}: {reason}")]
    FileScan { path: String, reason: String },

    #[error("time: {0} is not a valid nginx $time_local string")]
    TimeParse(String),

    #[error("failed to load output template {path}: {reason}")]
    TemplateLoad { path: String, reason: String },
}
