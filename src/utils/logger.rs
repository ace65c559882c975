use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Write as _;
use tracing::field::{Field, Visit};

/// Event fields that may carry an authorization code, a token or a password.
const SECRET_FIELDS: &[&str] = &["code", "access_token", "token", "password"];

/// Our structured field names and the OTel attribute each one is exported as.
const ATTRIBUTE_NAMES: &[(&str, &str)] = &[
    ("uid", "enduser.id"),
    ("provider", "auth.provider"),
    ("owner", "wishtree.tree_owner"),
    ("message_id", "wishtree.message_id"),
];

const REDACTED: &str = "[redacted]";

fn attribute_name(field: &str) -> &str {
    ATTRIBUTE_NAMES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, attribute)| *attribute)
        .unwrap_or(field)
}

#[derive(Default)]
struct AttributeVisitor {
    message: Option<String>,
    attributes: Map<String, Value>,
}

impl AttributeVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        let name = field.name();
        if name == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
            return;
        }
        let value = if SECRET_FIELDS.contains(&name) {
            Value::from(REDACTED)
        } else {
            value
        };
        self.attributes
            .insert(attribute_name(name).to_string(), value);
    }
}

impl Visit for AttributeVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, Value::from(format!("{:?}", value)));
    }
}

#[derive(Serialize)]
struct Resource<'a> {
    #[serde(rename = "service.name")]
    service_name: &'a str,
    #[serde(rename = "service.version")]
    service_version: &'a str,
}

/// One OTel log record, serialized as a single JSON line.
#[derive(Serialize)]
struct LogRecord<'a> {
    timestamp: String,
    severity_text: &'static str,
    severity_number: u8,
    body: String,
    resource: Resource<'a>,
    attributes: Map<String, Value>,
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

#[derive(Clone)]
struct OtelJsonEventFormatter {
    service_name: String,
    service_version: String,
}

impl OtelJsonEventFormatter {
    fn record(&self, event: &Event<'_>) -> LogRecord<'_> {
        let metadata = event.metadata();
        let mut visitor = AttributeVisitor::default();
        event.record(&mut visitor);

        let mut attributes = visitor.attributes;
        if let Some(file) = metadata.file() {
            attributes.insert("code.filepath".to_string(), Value::from(file));
        }
        if let Some(line) = metadata.line() {
            attributes.insert("code.lineno".to_string(), Value::from(line));
        }
        attributes.insert("code.target".to_string(), Value::from(metadata.target()));

        LogRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            severity_text: metadata.level().as_str(),
            severity_number: severity_number(metadata.level()),
            body: visitor
                .message
                .unwrap_or_else(|| metadata.name().to_string()),
            resource: Resource {
                service_name: &self.service_name,
                service_version: &self.service_version,
            },
            attributes,
        }
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
        let serialized =
            serde_json::to_string(&self.record(event)).map_err(|_| std::fmt::Error)?;
        writer.write_str(&serialized)?;
        writer.write_char('\n')
    }
}

fn level_filter(level: &str) -> Result<LevelFilter, String> {
    match level.trim().to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => Err(format!(
            "Invalid logging.level '{}'. Valid values: trace, debug, info, warn, error",
            level
        )),
    }
}

/// Installs the global subscriber. Fails on an unknown level so a typo in the
/// config does not silently drop all login diagnostics.
pub fn init_logging(logging_config: &LoggingConfig) -> Result<(), String> {
    // RUST_LOG directives still apply on top of the configured level.
    let filter_layer =
        EnvFilter::from_default_env().add_directive(level_filter(&logging_config.level)?.into());

    let result = match logging_config.format.to_lowercase().as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().event_format(OtelJsonEventFormatter {
                service_name: logging_config.service_name.clone(),
                service_version: logging_config.service_version.clone(),
            }))
            .try_init(),
        // Unknown formats fall back to console output.
        _ => tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().pretty())
            .try_init(),
    };
    result.map_err(|e| format!("Failed to install tracing subscriber: {}", e))
}
