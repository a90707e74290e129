//! Percent-encoding for query strings and urlencoded form bodies.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{Map, Value};

/// Characters left alone by `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

pub fn pair(key: &str, value: &str) -> String {
    format!("{}={}", component(key), component(value))
}

/// Flatten a JSON value into `key=value` pairs. Nested objects use
/// `outer[inner]`, arrays use `key[index]`.
pub fn flatten(value: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Value::Object(map) = value {
        for (key, value) in map {
            flatten_into(key.clone(), value, &mut pairs);
        }
    }
    pairs
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(format!("{prefix}[{key}]"), value, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten_into(format!("{prefix}[{index}]"), value, out);
            }
        }
        Value::Null => out.push((prefix, String::new())),
        Value::String(s) => out.push((prefix, s.clone())),
        other => out.push((prefix, other.to_string())),
    }
}

/// Serialize an object as `application/x-www-form-urlencoded`.
pub fn form(value: &Value) -> String {
    flatten(value)
        .iter()
        .map(|(key, value)| pair(key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a urlencoded body into a JSON object. Repeated keys become arrays.
pub fn parse_form(body: &[u8]) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(map)
}
