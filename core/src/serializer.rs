//! Process-wide registry of body serializers keyed by media type.
//!
//! Consulted at dispatch time, so a serializer registered after a request
//! was built still applies to it. A per-request serializer installed with
//! `Request::serialize_with` takes precedence over the registry.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::encode;
use crate::error::BoxError;
use crate::media;

pub type Serializer = Arc<dyn Fn(&Value) -> Result<String, BoxError> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<String, Serializer>>> = Lazy::new(|| {
    let mut map: HashMap<String, Serializer> = HashMap::new();
    map.insert(
        media::JSON.to_string(),
        Arc::new(|value: &Value| -> Result<String, BoxError> {
            Ok(serde_json::to_string(value)?)
        }),
    );
    map.insert(
        media::FORM.to_string(),
        Arc::new(|value: &Value| -> Result<String, BoxError> { Ok(encode::form(value)) }),
    );
    RwLock::new(map)
});

/// Install or replace the serializer for `media_type`.
pub fn register<F>(media_type: &str, serializer: F)
where
    F: Fn(&Value) -> Result<String, BoxError> + Send + Sync + 'static,
{
    REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(media::essence(media_type), Arc::new(serializer));
}

/// Serializer for a content type. Parameters are ignored, and any `+json`
/// type falls back to the JSON serializer.
pub fn lookup(content_type: &str) -> Option<Serializer> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry.get(&media::essence(content_type)).cloned().or_else(|| {
        media::is_json(content_type)
            .then(|| registry.get(media::JSON).cloned())
            .flatten()
    })
}
