//! CLI command handlers.

pub mod auth;
pub mod categories;
pub mod config;
pub mod contact;
pub mod messages;
pub mod posts;

use chrono::{DateTime, Local, Utc};
use serde_json::Value;

/// Prints the server's `message` field, or `fallback`.
fn print_message(payload: &Value, fallback: &str) {
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(fallback);
    println!("{message}");
}

fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map_or_else(
        || "unknown".to_string(),
        |ts| ts.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}
