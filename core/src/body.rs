//! Request payloads and how successive `send` calls combine.

use bytes::Bytes;
use serde_json::Value;

use crate::media;

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured value, serialized at dispatch by content type.
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl Payload {
    /// Combine a newly sent value with what is already buffered.
    ///
    /// Objects merge key by key, later keys winning. Strings concatenate,
    /// joined by `&` for urlencoded bodies. A change of shape replaces.
    pub fn merge(existing: Option<Payload>, incoming: Value, content_type: Option<&str>) -> Payload {
        match (existing, incoming) {
            (Some(Payload::Json(Value::Object(mut current))), Value::Object(incoming)) => {
                for (key, value) in incoming {
                    current.insert(key, value);
                }
                Payload::Json(Value::Object(current))
            }
            (Some(Payload::Text(current)), Value::String(incoming)) => {
                let joined = if content_type.is_some_and(media::is_form) && !current.is_empty() {
                    format!("{current}&{incoming}")
                } else {
                    current + &incoming
                };
                Payload::Text(joined)
            }
            (_, Value::String(incoming)) => Payload::Text(incoming),
            (_, incoming) => Payload::Json(incoming),
        }
    }

    /// Content type implied by the first `send` when none was set.
    pub fn default_type(&self) -> &'static str {
        match self {
            Payload::Json(_) => media::JSON,
            Payload::Text(_) => media::FORM,
            Payload::Binary(_) => media::OCTET_STREAM,
        }
    }
}
