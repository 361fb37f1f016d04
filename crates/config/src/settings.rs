//! Flat key→value settings.
//!
//! Every knob the controller understands is a dotted key (`max_steps`,
//! `tools.shell`, `flow.max_iterations`) mapped to a scalar. Settings from
//! different sources are layered with [`Settings::merged_over`]: the
//! receiver's keys win, anything it lacks falls back to the base.

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::ConfigError;

/// A scalar setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl SettingValue {
    /// Infer a value from command-line text: bool, then integer, then float,
    /// otherwise string.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(b) = trimmed.parse::<bool>() {
            return SettingValue::Bool(b);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return SettingValue::Integer(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return SettingValue::Float(f);
        }
        SettingValue::String(raw.to_string())
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Integer(i) => write!(f, "{i}"),
            SettingValue::Float(x) => write!(f, "{x}"),
            SettingValue::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Integer(value)
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        SettingValue::Integer(i64::from(value))
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

/// An ordered, flat mapping of dotted keys to scalar values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
    values: BTreeMap<String, SettingValue>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overlay `other` onto `self`; keys present in `other` win.
    pub fn extend(&mut self, other: &Settings) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    /// A new settings map holding `base` overlaid with `self`.
    pub fn merged_over(&self, base: &Settings) -> Settings {
        let mut merged = base.clone();
        merged.extend(self);
        merged
    }

    /// Parse a `key=value` assignment (as given on the command line).
    pub fn parse_assignment(assignment: &str) -> Result<(String, SettingValue), ConfigError> {
        let (key, value) = assignment.split_once('=').ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "expected key=value, got '{assignment}'"
            ))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "empty key in '{assignment}'"
            )));
        }
        Ok((key.to_string(), SettingValue::infer(value)))
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.to_string())
    }

    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };
        match value {
            SettingValue::Bool(b) => Ok(Some(*b)),
            SettingValue::Integer(0) => Ok(Some(false)),
            SettingValue::Integer(1) => Ok(Some(true)),
            SettingValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(Some(true)),
                "false" | "no" | "off" | "0" => Ok(Some(false)),
                _ => Err(invalid(key, value, "a boolean")),
            },
            _ => Err(invalid(key, value, "a boolean")),
        }
    }

    pub fn get_u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };
        match value {
            SettingValue::Integer(i) if *i >= 0 => Ok(Some(*i as u64)),
            SettingValue::String(s) => s
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| invalid(key, value, "a non-negative integer")),
            _ => Err(invalid(key, value, "a non-negative integer")),
        }
    }

    pub fn get_u32(&self, key: &str) -> Result<Option<u32>, ConfigError> {
        match self.get_u64(key)? {
            Some(v) => u32::try_from(v)
                .map(Some)
                .map_err(|_| invalid(key, &SettingValue::Integer(v as i64), "a 32-bit integer")),
            None => Ok(None),
        }
    }

    pub fn get_usize(&self, key: &str) -> Result<Option<usize>, ConfigError> {
        Ok(self.get_u64(key)?.map(|v| v as usize))
    }

    pub fn get_f32(&self, key: &str) -> Result<Option<f32>, ConfigError> {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };
        match value {
            SettingValue::Float(f) => Ok(Some(*f as f32)),
            SettingValue::Integer(i) => Ok(Some(*i as f32)),
            SettingValue::String(s) => s
                .trim()
                .parse::<f32>()
                .map(Some)
                .map_err(|_| invalid(key, value, "a number")),
            SettingValue::Bool(_) => Err(invalid(key, value, "a number")),
        }
    }

    /// Parse a value with its `FromStr` impl (enums like tool choice).
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.values.get(key) else {
            return Ok(None);
        };
        value
            .to_string()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    /// A comma-separated list value, trimmed, empty items dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.values.get(key).map(|v| {
            v.to_string()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}

fn invalid(key: &str, value: &SettingValue, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: format!("expected {expected}"),
    }
}

impl FromIterator<(String, SettingValue)> for Settings {
    fn from_iter<I: IntoIterator<Item = (String, SettingValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Nested form accepted on input: `[tools] shell = true` and
/// `"tools.shell" = true` both land on the key `tools.shell`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Scalar(SettingValue),
    Table(BTreeMap<String, RawValue>),
}

fn flatten_into(
    prefix: &str,
    table: BTreeMap<String, RawValue>,
    out: &mut BTreeMap<String, SettingValue>,
) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            RawValue::Scalar(v) => {
                out.insert(full, v);
            }
            RawValue::Table(nested) => flatten_into(&full, nested, out),
        }
    }
}

impl<'de> Deserialize<'de> for Settings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, RawValue>::deserialize(deserializer)?;
        let mut values = BTreeMap::new();
        flatten_into("", raw, &mut values);
        Ok(Self { values })
    }
}
