//! Ordered, mergeable query parameters.
//!
//! Pairs keep the order in which their key first appeared. A later pair
//! with the same key overrides the value in place. Raw strings such as
//! `search=Manny` are split on `&` and take part in the same override, but
//! each segment is sent exactly as written.

use serde_json::Value;
use url::form_urlencoded;

use crate::encode;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    key: String,
    value: String,
    /// Segment text as given to `push_raw`, sent verbatim.
    raw: Option<String>,
}

impl Entry {
    fn encode(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => encode::pair(&self.key, &self.value),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    entries: Vec<Entry>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn upsert(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|existing| existing.key == entry.key) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn merge_pair(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.upsert(Entry {
            key: key.into(),
            value: value.into(),
            raw: None,
        });
    }

    pub fn merge<I, K, V>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in pairs {
            self.merge_pair(key, value);
        }
    }

    /// Merge the flattened pairs of a JSON object.
    pub fn merge_value(&mut self, value: &Value) {
        self.merge(encode::flatten(value));
    }

    pub fn push_raw(&mut self, raw: impl Into<String>) {
        let raw = raw.into();
        for segment in raw.trim_start_matches('?').split('&').filter(|s| !s.is_empty()) {
            let (key, value) = form_urlencoded::parse(segment.as_bytes())
                .next()
                .map(|(key, value)| (key.into_owned(), value.into_owned()))
                .unwrap_or_default();
            self.upsert(Entry {
                key,
                value,
                raw: Some(segment.to_string()),
            });
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(Entry::encode)
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Append to whatever query string the URL already carries.
    pub fn apply(&self, url: &mut url::Url) {
        if self.is_empty() {
            return;
        }
        let encoded = self.encode();
        let combined = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{existing}&{encoded}"),
            _ => encoded,
        };
        url.set_query(Some(&combined));
    }
}
