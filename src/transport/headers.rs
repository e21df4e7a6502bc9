//! Message headers.
//!
//! Headers are a multi-map: each key holds an ordered list of values.
//! Keys are matched exactly (no case folding), like the bus they travel on.

use std::collections::hash_map::{self, HashMap};

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Minimal get/set/keys capability over any header container.
///
/// `set` overwrites the whole value list for the key.
pub trait HeaderStore {
    fn get(&self, key: &str) -> Option<&str>;
    fn set(&mut self, key: &str, value: String);
    fn keys(&self) -> Vec<&str>;
}

/// Header multi-map carried by every bus message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(HashMap<String, Vec<String>>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values for `key`, in insertion order. Empty if absent.
    pub fn values(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace all values for `key` with a single value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), vec![value.into()]);
    }

    /// Replace all values for `key`.
    pub fn insert_all(&mut self, key: impl Into<String>, values: Vec<String>) {
        self.0.insert(key.into(), values);
    }

    /// Add a value after any existing ones.
    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }
}

impl From<HashMap<String, Vec<String>>> for Headers {
    fn from(map: HashMap<String, Vec<String>>) -> Self {
        Self(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k, v);
        }
        headers
    }
}

impl HeaderStore for Headers {
    fn get(&self, key: &str) -> Option<&str> {
        Headers::get(self, key)
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key, value);
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

impl HeaderStore for HashMap<String, Vec<String>> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    fn set(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), vec![value]);
    }

    fn keys(&self) -> Vec<&str> {
        HashMap::keys(self).map(String::as_str).collect()
    }
}

impl HeaderStore for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|v| v.to_str().ok())
    }

    fn set(&mut self, key: &str, value: String) {
        // Names or values HTTP cannot carry are dropped.
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            self.insert(name, value);
        }
    }

    fn keys(&self) -> Vec<&str> {
        HeaderMap::keys(self).map(HeaderName::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_values_keep_order() {
        let mut headers = Headers::new();
        headers.append("X-Tag", "a");
        headers.append("X-Tag", "b");
        assert_eq!(headers.get("X-Tag"), Some("a"));
        assert_eq!(headers.values("X-Tag"), ["a", "b"]);
        assert!(headers.values("missing").is_empty());
    }

    #[test]
    fn test_keys_are_exact() {
        let headers: Headers = [("X-Request-ID", "1")].into_iter().collect();
        assert_eq!(headers.get("X-Request-ID"), Some("1"));
        assert_eq!(headers.get("x-request-id"), None);
    }

    #[test]
    fn test_store_set_overwrites() {
        let mut headers: Headers = [("traceparent", "old"), ("traceparent", "older")]
            .into_iter()
            .collect();
        HeaderStore::set(&mut headers, "traceparent", "new".to_string());
        assert_eq!(headers.values("traceparent"), ["new"]);
    }

    #[test]
    fn test_header_map_store() {
        let mut map = HeaderMap::new();
        HeaderStore::set(&mut map, "traceparent", "00-abc-def-01".to_string());
        HeaderStore::set(&mut map, "bad header", "x".to_string());
        assert_eq!(HeaderStore::get(&map, "traceparent"), Some("00-abc-def-01"));
        assert_eq!(HeaderStore::keys(&map), vec!["traceparent"]);
    }
}
