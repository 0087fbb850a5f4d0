use anyhow::Result;
use serde_json::Value as JsonValue;
use std::io::{self, Write};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Yaml,
    Json,
    Raw,
}

pub fn emit_data(fmt: &OutputFormat, data: &JsonValue) -> Result<()> {
    match fmt {
        OutputFormat::Yaml => {
            let s = serde_yaml::to_string(data)?;
            println!("{}", s.trim_end());
        }
        OutputFormat::Json => {
            let s = serde_json::to_string_pretty(data)?;
            println!("{}", s);
        }
        OutputFormat::Raw => {
            let mut out = io::stdout().lock();
            if let Some(s) = data.as_str() {
                write!(out, "{}", s)?;
            } else {
                write!(out, "{}", serde_json::to_string(data)?)?;
            }
            out.flush()?;
        }
    }
    Ok(())
}

/// Structured error map, serialized into the error message so `emit_error` can recover it.
pub fn error_payload(kind: &str, message: &str, detail: &str) -> anyhow::Error {
    let mut map = serde_json::Map::new();
    map.insert("error".into(), JsonValue::String(kind.to_string()));
    map.insert("message".into(), JsonValue::String(message.to_string()));
    map.insert("detail".into(), JsonValue::String(detail.to_string()));
    let obj = JsonValue::Object(map);
    anyhow::anyhow!(serde_yaml::to_string(&obj).unwrap_or_else(|_| format!("{kind}: {message}")))
}

pub fn emit_error(err: &anyhow::Error) -> Result<()> {
    let obj = render_error(err);
    let s = serde_yaml::to_string(&obj)?;
    let _ = writeln!(io::stderr(), "{}", s.trim_end());
    Ok(())
}

// Structured payloads pass through; anything else is wrapped with its context chain.
pub fn render_error(err: &anyhow::Error) -> JsonValue {
    if let Ok(val) = serde_yaml::from_str::<JsonValue>(&err.to_string()) {
        if val.get("error").is_some_and(JsonValue::is_string) {
            return val;
        }
    }
    let mut map = serde_json::Map::new();
    map.insert("error".into(), JsonValue::String(format!("{:#}", err)));
    JsonValue::Object(map)
}
