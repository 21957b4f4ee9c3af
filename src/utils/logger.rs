use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Field names whose values are credentials and never reach the log output.
const REDACTED_FIELDS: [&str; 6] = [
    "token",
    "access_token",
    "refresh_token",
    "id_token",
    "authorization",
    "code_verifier",
];

const REDACTED: &str = "[redacted]";

fn scrub(name: &str, value: Value) -> Value {
    if REDACTED_FIELDS.iter().any(|f| name.eq_ignore_ascii_case(f)) {
        Value::from(REDACTED)
    } else {
        value
    }
}

/// Collects event fields into a JSON map, scrubbing credentials on the way in.
#[derive(Default)]
struct Attributes(Map<String, Value>);

impl Attributes {
    fn put(&mut self, field: &Field, value: impl Into<Value>) {
        let name = field.name();
        self.0.insert(name.to_string(), scrub(name, value.into()));
    }
}

impl Visit for Attributes {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value);
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value);
    }

    // f64 and everything else land here.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

/// One JSON object per event, laid out after the OpenTelemetry log data model.
#[derive(Clone)]
struct OtelJsonEventFormatter {
    service_name: String,
    service_version: String,
}

fn severity_number(level: &Level) -> u8 {
    match *level {
        Level::TRACE => 1,
        Level::DEBUG => 5,
        Level::INFO => 9,
        Level::WARN => 13,
        Level::ERROR => 17,
    }
}

impl<S, N> FormatEvent<S, N> for OtelJsonEventFormatter
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    N: for<'writer> FormatFields<'writer> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        let mut attributes = Attributes::default();
        event.record(&mut attributes);
        let mut attributes = attributes.0;

        let body = match attributes.remove("message") {
            Some(Value::String(message)) => message,
            _ => meta.name().to_string(),
        };
        attributes.insert("code.target".into(), meta.target().into());
        if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
            attributes.insert("code.filepath".into(), file.into());
            attributes.insert("code.lineno".into(), line.into());
        }

        let record = json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "severity_text": meta.level().as_str(),
            "severity_number": severity_number(meta.level()),
            "body": body,
            "resource": {
                "service.name": self.service_name,
                "service.version": self.service_version,
            },
            "attributes": attributes,
        });
        writeln!(writer, "{}", record)
    }
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    let level = level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => level
            .parse::<LevelFilter>()
            .map_err(|e| e.to_string()),
        _ => Err(format!(
            "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
            level
        )),
    }
}

/// Installs the global subscriber. `RUST_LOG` directives are layered on top of
/// the configured level.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::builder()
        .with_default_directive(parse_level(&logging_config.level)?.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if logging_config.format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().event_format(OtelJsonEventFormatter {
                service_name: logging_config.service_name.clone(),
                service_version: logging_config.service_version.clone(),
            }))
            .try_init()
    } else {
        registry.with(fmt::layer().pretty()).try_init()
    };
    installed.map_err(|e| format!("Failed to install tracing subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_scrubbed() {
        assert_eq!(scrub("access_token", Value::from("eyJ...")), Value::from(REDACTED));
        assert_eq!(scrub("Authorization", Value::from("Bearer x")), Value::from(REDACTED));
        assert_eq!(scrub("username", Value::from("alice")), Value::from("alice"));
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(" Debug ").unwrap(), LevelFilter::DEBUG);
        assert!(parse_level("verbose").is_err());
        assert!(parse_level("off").is_err());
    }
}
