//! Classification of sample values
//!
//! Documents are JSON trees in which scalar types JSON cannot express natively
//! use Extended JSON wrappers (`{"$oid": ...}`, `{"$date": ...}`,
//! `{"$binary": ...}`). Wrappers are classified as scalars; anything else
//! keyed only by `$`-prefixed names, or a malformed wrapper, is unsupported
//! and classified as `Mixed`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::Primitive;

static OBJECT_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

const UUID_SUBTYPE: u8 = 4;

/// Classify a sample value into its type tag
pub fn classify(value: &Value) -> Primitive {
    match value {
        Value::Null => Primitive::Null,
        Value::Bool(_) => Primitive::Boolean,
        Value::Number(_) => Primitive::Number,
        Value::String(_) => Primitive::String,
        Value::Array(_) => Primitive::Array,
        Value::Object(map) => classify_object(map),
    }
}

fn classify_object(map: &Map<String, Value>) -> Primitive {
    if map.is_empty() || !map.keys().all(|k| k.starts_with('$')) {
        return Primitive::Object;
    }

    if let Some(oid) = wrapped(map, "$oid") {
        return match oid.as_str() {
            Some(hex) if OBJECT_ID_PATTERN.is_match(hex) => Primitive::ObjectId,
            _ => Primitive::Mixed,
        };
    }

    if let Some(date) = wrapped(map, "$date") {
        return if date_millis(date).is_some() {
            Primitive::Date
        } else {
            Primitive::Mixed
        };
    }

    if map.contains_key("$binary") || map.contains_key("$uuid") {
        return if binary_parts(map).is_some() {
            Primitive::Binary
        } else {
            Primitive::Mixed
        };
    }

    for key in ["$numberInt", "$numberLong", "$numberDouble", "$numberDecimal"] {
        if let Some(inner) = wrapped(map, key) {
            return if wrapped_number(key, inner).is_some() {
                Primitive::Number
            } else {
                Primitive::Mixed
            };
        }
    }

    Primitive::Mixed
}

/// The single value of a one-key wrapper object
fn wrapped<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if map.len() == 1 { map.get(key) } else { None }
}

fn wrapped_number<'a>(key: &str, inner: &'a Value) -> Option<&'a str> {
    let text = inner.as_str()?.trim();
    let valid = match key {
        "$numberInt" | "$numberLong" => text.parse::<i64>().is_ok(),
        "$numberDouble" => {
            matches!(text, "Infinity" | "-Infinity" | "NaN") || text.parse::<f64>().is_ok()
        }
        _ => !text.is_empty(),
    };
    valid.then_some(text)
}

/// Milliseconds since the epoch for a `$date` payload
fn date_millis(date: &Value) -> Option<i64> {
    match date {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.timestamp_millis()),
        Value::Number(n) => n.as_i64(),
        Value::Object(inner) => wrapped(inner, "$numberLong")?
            .as_str()?
            .trim()
            .parse()
            .ok(),
        _ => None,
    }
}

/// Decoded payload and subtype of a binary wrapper
fn binary_parts(map: &Map<String, Value>) -> Option<(Vec<u8>, u8)> {
    if let Some(uuid) = wrapped(map, "$uuid") {
        let uuid = Uuid::parse_str(uuid.as_str()?).ok()?;
        return Some((uuid.as_bytes().to_vec(), UUID_SUBTYPE));
    }

    let (payload, subtype) = match map.get("$binary")? {
        // Canonical form: {"$binary": {"base64": "...", "subType": "xx"}}
        Value::Object(inner) if map.len() == 1 => {
            (inner.get("base64")?.as_str()?, inner.get("subType")?.as_str()?)
        }
        // Legacy form: {"$binary": "...", "$type": "xx"}
        Value::String(payload) if map.len() == 2 => (payload.as_str(), map.get("$type")?.as_str()?),
        _ => return None,
    };

    let bytes = STANDARD.decode(payload).ok()?;
    let subtype = u8::from_str_radix(subtype, 16).ok()?;
    Some((bytes, subtype))
}

/// Length in bytes of a binary sample
pub fn binary_len(value: &Value) -> Option<usize> {
    match value {
        Value::Object(map) => binary_parts(map).map(|(bytes, _)| bytes.len()),
        _ => None,
    }
}

/// Canonical string form of a value, used to compare identifiers that may
/// have several equivalent representations
pub fn canonical_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Object(map) => match classify_object(map) {
            Primitive::ObjectId => map
                .get("$oid")
                .and_then(Value::as_str)
                .map(str::to_ascii_lowercase)
                .unwrap_or_default(),
            Primitive::Date => map
                .get("$date")
                .and_then(date_millis)
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_default(),
            Primitive::Binary => match binary_parts(map) {
                Some((bytes, UUID_SUBTYPE)) if bytes.len() == 16 => Uuid::from_slice(&bytes)
                    .map(|u| u.hyphenated().to_string())
                    .unwrap_or_default(),
                Some((bytes, _)) => format!("base64:{}", STANDARD.encode(bytes)),
                None => value.to_string(),
            },
            Primitive::Number => map
                .iter()
                .next()
                .and_then(|(key, inner)| wrapped_number(key, inner))
                .map(str::to_string)
                .unwrap_or_default(),
            _ => value.to_string(),
        },
        _ => value.to_string(),
    }
}
