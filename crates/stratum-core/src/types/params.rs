//! Key-value strategy parameters with typed, defaulted getters.
//!
//! Values arrive from TOML config tables and from `key=value` strings on the
//! command line, so every getter also accepts a textual representation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::EngineError;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ParameterValue {
    /// Interpret a raw string, preferring bool, then integer, then float.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(b) = raw.parse::<bool>() {
            ParameterValue::Bool(b)
        } else if let Ok(i) = raw.parse::<i64>() {
            ParameterValue::Integer(i)
        } else if let Ok(f) = raw.parse::<f64>() {
            ParameterValue::Float(f)
        } else {
            ParameterValue::Text(raw.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Integer(i) => Some(*i as f64),
            ParameterValue::Float(f) => Some(*f),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            ParameterValue::Bool(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Integer(i) => Some(*i),
            ParameterValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            ParameterValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            ParameterValue::Integer(i) => Some(*i != 0),
            ParameterValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            },
            ParameterValue::Float(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterValue::Bool(b) => write!(f, "{b}"),
            ParameterValue::Integer(i) => write!(f, "{i}"),
            ParameterValue::Float(x) => write!(f, "{x}"),
            ParameterValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ParameterValue {
    fn from(v: bool) -> Self {
        ParameterValue::Bool(v)
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Integer(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::Text(v.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(v: String) -> Self {
        ParameterValue::Text(v)
    }
}

/// Named parameters in sorted key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters(BTreeMap<String, ParameterValue>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParameterValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    /// Later values win.
    pub fn merge(&mut self, other: &Parameters) {
        for (k, v) in other.iter() {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Parse a `key=value` assignment.
    pub fn parse_assignment(raw: &str) -> Result<(String, ParameterValue), EngineError> {
        let (key, value) = raw.split_once('=').ok_or_else(|| EngineError::InvalidParameter {
            key: raw.to_string(),
            reason: "expected key=value".to_string(),
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(EngineError::InvalidParameter {
                key: raw.to_string(),
                reason: "empty key".to_string(),
            });
        }
        Ok((key.to_string(), ParameterValue::parse(value)))
    }

    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, EngineError> {
        self.typed(key, default, ParameterValue::as_f64, "a number")
    }

    pub fn get_i64(&self, key: &str, default: i64) -> Result<i64, EngineError> {
        self.typed(key, default, ParameterValue::as_i64, "an integer")
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, EngineError> {
        let value = self.get_i64(key, default as i64)?;
        usize::try_from(value).map_err(|_| invalid(key, "a non-negative integer"))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, EngineError> {
        self.typed(key, default, ParameterValue::as_bool, "a boolean")
    }

    /// Text value, or the display form of a non-text value.
    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// Comma-separated list, trimmed, empty items dropped.
    pub fn get_list(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(v) => v
                .to_string()
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn typed<T>(
        &self,
        key: &str,
        default: T,
        convert: impl Fn(&ParameterValue) -> Option<T>,
        expected: &str,
    ) -> Result<T, EngineError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => convert(v).ok_or_else(|| invalid(key, expected)),
        }
    }
}

fn invalid(key: &str, expected: &str) -> EngineError {
    EngineError::InvalidParameter {
        key: key.to_string(),
        reason: format!("expected {expected}"),
    }
}

impl FromIterator<(String, ParameterValue)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, ParameterValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
