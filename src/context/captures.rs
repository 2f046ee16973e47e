//! Named capture groups collected while matching.

use std::collections::HashMap;
use std::str::FromStr;

use crate::error::CaptureError;

/// String-keyed map of capture-group values written by matchers.
///
/// Later writes for the same name overwrite earlier ones, so a request that
/// passes through nested matchers reusing a group name sees the innermost value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    values: HashMap<String, String>,
}

impl Captures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parse a capture into `T`.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, CaptureError> {
        let value = self
            .get(name)
            .ok_or_else(|| CaptureError::Missing(name.to_string()))?;
        value.trim().parse::<T>().map_err(|_| CaptureError::Invalid {
            name: name.to_string(),
            value: value.to_string(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn get_int(&self, name: &str) -> Result<i64, CaptureError> {
        self.parse(name)
    }

    pub fn get_uint(&self, name: &str) -> Result<u64, CaptureError> {
        self.parse(name)
    }

    pub fn get_float(&self, name: &str) -> Result<f64, CaptureError> {
        self.parse(name)
    }

    /// Copy every named group of a successful match.
    pub(crate) fn record(&mut self, regex: &regex::Regex, caps: &regex::Captures<'_>) {
        for name in regex.capture_names().flatten() {
            let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
            self.set(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_helpers() {
        let mut caps = Captures::new();
        caps.set("id", "5");
        caps.set("ratio", "0.25");
        caps.set("title", "test");

        assert_eq!(caps.get_int("id"), Ok(5));
        assert_eq!(caps.get_uint("id"), Ok(5));
        assert_eq!(caps.get_float("ratio"), Ok(0.25));
        assert_eq!(caps.get("title"), Some("test"));
    }

    #[test]
    fn test_malformed_value_is_error() {
        let mut caps = Captures::new();
        caps.set("id", "five");

        let err = caps.get_int("id").unwrap_err();
        assert!(matches!(err, CaptureError::Invalid { ref name, .. } if name == "id"));
        assert_eq!(
            caps.get_uint("missing"),
            Err(CaptureError::Missing("missing".into()))
        );
    }

    #[test]
    fn test_last_writer_wins() {
        let mut caps = Captures::new();
        caps.set("name", "outer");
        caps.set("name", "inner");
        assert_eq!(caps.get("name"), Some("inner"));
        assert_eq!(caps.len(), 1);
    }

    #[test]
    fn test_record_named_groups() {
        let re = regex::Regex::new(r"^/(?P<title>[a-z]+)-(?P<id>\d+)(?P<ext>\.html)?$").unwrap();
        let path = "/test-5";
        let m = re.captures(path).unwrap();

        let mut caps = Captures::new();
        caps.record(&re, &m);

        assert_eq!(caps.get("title"), Some("test"));
        assert_eq!(caps.get("id"), Some("5"));
        // Unmatched optional groups are recorded empty.
        assert_eq!(caps.get("ext"), Some(""));
    }
}
