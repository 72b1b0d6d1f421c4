//! Logger setup on top of `env_logger`
//!
//! Library code only talks to the `log` facade; the binary calls [`init`]
//! once at startup. `RUST_LOG`, when set, is parsed after the configured
//! level so it can refine it per module.

use crate::config::{LogFormat, LoggingConfig};
use std::io::Write;

/// Install the global logger. Returns false when a logger was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.level);
    if let Ok(directives) = std::env::var("RUST_LOG") {
        builder.parse_filters(&directives);
    }

    builder.format_timestamp_millis().format_module_path(false);
    if config.format == LogFormat::Json {
        builder.format(|buf, record| writeln!(buf, "{}", format_json(record)));
    }

    builder.try_init().is_ok()
}

/// One JSON object per line, for log shippers
pub fn format_json(record: &log::Record<'_>) -> String {
    let mut json = serde_json::Map::new();
    json.insert(
        "timestamp".to_string(),
        serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
    );
    json.insert("level".to_string(), serde_json::Value::String(record.level().to_string()));
    json.insert("target".to_string(), serde_json::Value::String(record.target().to_string()));
    json.insert("message".to_string(), serde_json::Value::String(record.args().to_string()));

    serde_json::to_string(&json).unwrap_or_else(|_| "Failed to serialize log entry".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Record};

    #[test]
    fn test_json_line_fields() {
        let line = format_json(
            &Record::builder()
                .args(format_args!("user {} logged in", 7))
                .level(Level::Warn)
                .target("marquee_core::accounts")
                .build(),
        );

        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["target"], "marquee_core::accounts");
        assert_eq!(value["message"], "user 7 logged in");
        assert!(value["timestamp"].as_str().is_some());
    }
}
