//! Rendering of `{ "ok": ... }` envelopes and errors

use anyhow::Result;
use owo_colors::OwoColorize;
use serde_json::{Map, Value};
use undu_engine::Error;

/// Print a success envelope; object fields are merged next to `"ok": true`
pub fn success(fields: Value) -> Result<()> {
    let mut envelope = Map::new();
    envelope.insert("ok".to_string(), Value::Bool(true));
    match fields {
        Value::Object(map) => envelope.extend(map),
        Value::Null => {}
        other => {
            envelope.insert("value".to_string(), other);
        }
    }
    println!("{}", serde_json::to_string_pretty(&Value::Object(envelope))?);
    Ok(())
}

/// Short machine-checkable code for any error reaching the top level
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<Error>().map_or("error", Error::code)
}

pub fn failure(err: &anyhow::Error, json: bool) {
    if json {
        let envelope = serde_json::json!({
            "ok": false,
            "error": error_code(err),
            "message": format!("{err:#}"),
        });
        println!("{envelope:#}");
    } else {
        eprintln!("{} {:#}", "error:".red().bold(), err);
    }
}
