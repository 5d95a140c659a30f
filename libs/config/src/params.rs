//! Actor parameters
//!
//! Each actor entry carries a free-form `params` map. Actors parse it once,
//! at construction, into their own `#[derive(Deserialize)]` struct via
//! [`Params::parse`]. Options coming from environment variables or hand
//! written configs are often strings, so the [`lenient`] helpers accept
//! `5` and `"5"` (or `true` and `"true"`) alike.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Parameter parsing failures, always naming the actor
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("actor '{actor}': missing required parameter '{key}'")]
    Missing { actor: String, key: String },

    #[error("actor '{actor}': invalid parameters: {reason}")]
    Invalid { actor: String, reason: String },
}

impl ParamsError {
    pub fn invalid(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            actor: actor.into(),
            reason: reason.into(),
        }
    }
}

/// String-keyed map of option values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Option rendered as a string; numbers and booleans are stringified
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Required string option
    pub fn require_str(&self, actor: &str, key: &str) -> Result<String, ParamsError> {
        self.get_str(key).ok_or_else(|| ParamsError::Missing {
            actor: actor.to_string(),
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Parse into a typed parameter struct
    pub fn parse<T: DeserializeOwned>(&self, actor: &str) -> Result<T, ParamsError> {
        let object = Value::Object(self.0.clone().into_iter().collect());
        serde_json::from_value(object).map_err(|e| ParamsError::invalid(actor, e.to_string()))
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Deserializers accepting native values or their string spelling
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use std::fmt::Display;
    use std::str::FromStr;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NativeOrText<T> {
        Native(T),
        Text(String),
    }

    /// `5` or `"5"`, `true` or `"true"`
    pub fn value<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + Deserialize<'de>,
        T::Err: Display,
    {
        match NativeOrText::<T>::deserialize(deserializer)? {
            NativeOrText::Native(v) => Ok(v),
            NativeOrText::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
        }
    }

    /// Optional variant of [`value`]; use with `#[serde(default)]`
    pub fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr + Deserialize<'de>,
        T::Err: Display,
    {
        match Option::<NativeOrText<T>>::deserialize(deserializer)? {
            None => Ok(None),
            Some(NativeOrText::Native(v)) => Ok(Some(v)),
            Some(NativeOrText::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct ThrottleLike {
        #[serde(deserialize_with = "lenient::value")]
        rps: u64,
        #[serde(default)]
        msgkey: Option<String>,
        #[serde(default, deserialize_with = "lenient::option")]
        silent: Option<bool>,
    }

    #[test]
    fn test_parse_native_values() {
        let params = Params::new().with("rps", 10).with("silent", true);
        let parsed: ThrottleLike = params.parse("t").unwrap();
        assert_eq!(parsed.rps, 10);
        assert_eq!(parsed.silent, Some(true));
        assert_eq!(parsed.msgkey, None);
    }

    #[test]
    fn test_parse_string_values() {
        let params = Params::new()
            .with("rps", "25")
            .with("silent", "true")
            .with("msgkey", "tenant");
        let parsed: ThrottleLike = params.parse("t").unwrap();
        assert_eq!(parsed.rps, 25);
        assert_eq!(parsed.silent, Some(true));
        assert_eq!(parsed.msgkey.as_deref(), Some("tenant"));
    }

    #[test]
    fn test_parse_error_names_actor() {
        let err = Params::new().parse::<ThrottleLike>("limiter").unwrap_err();
        let text = err.to_string();
        assert!(text.contains("limiter"), "{text}");
        assert!(text.contains("rps"), "{text}");

        let err = Params::new()
            .with("rps", "fast")
            .parse::<ThrottleLike>("limiter")
            .unwrap_err();
        assert!(matches!(err, ParamsError::Invalid { .. }));
    }

    #[test]
    fn test_get_str_stringifies() {
        let params = Params::new().with("bind", "tcp://x:1").with("level", 6);
        assert_eq!(params.get_str("bind").as_deref(), Some("tcp://x:1"));
        assert_eq!(params.get_str("level").as_deref(), Some("6"));
        assert!(params.require_str("a", "missing").is_err());
    }
}
