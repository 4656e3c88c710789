// Tool option surface
//
// Options arrive as a flat key -> string map (config file, environment,
// command line). Each tool turns its map into a typed config once, at
// construction; malformed values fall back to the documented default.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::warn;

/// Option key shared by every tool
pub const TIMEOUT_KEY: &str = "timeout";

/// Default tool timeout (5 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Documented option: key, default value and human-readable description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDescriptor {
    pub key: &'static str,
    pub default: &'static str,
    pub description: &'static str,
}

pub const TIMEOUT_OPTION: OptionDescriptor = OptionDescriptor {
    key: TIMEOUT_KEY,
    default: "300",
    description: "Seconds to wait for the tool before killing it.",
};

/// Flat option map for one tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionSet(BTreeMap<String, String>);

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single option (overwrites any earlier value)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Overlay `other` on top of self, last write wins per key
    pub fn merge(&mut self, other: &OptionSet) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// String option, or the default when absent
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.get(key) else {
            return default;
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key = %key, value = %raw, default, "Invalid boolean option, using default");
                default
            }
        }
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        let Some(raw) = self.get(key) else {
            return default;
        };
        raw.trim().parse().unwrap_or_else(|_| {
            warn!(key = %key, value = %raw, default, "Invalid integer option, using default");
            default
        })
    }

    /// Tool timeout, at least one second
    pub fn timeout(&self) -> Duration {
        let secs = self.get_i64(TIMEOUT_KEY, DEFAULT_TIMEOUT_SECS as i64).max(1);
        Duration::from_secs(secs as u64)
    }

    /// Keys not listed in `known`
    pub fn unknown_keys<'a>(&'a self, known: &[OptionDescriptor]) -> Vec<&'a str> {
        self.0
            .keys()
            .map(String::as_str)
            .filter(|key| !known.iter().any(|d| d.key == *key))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OptionSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Aggression level, always within `[MIN, MAX]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Aggression(u8);

impl Aggression {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;
    pub const DEFAULT: Aggression = Aggression(1);

    /// Clamp to range
    pub fn clamped(level: i64) -> Self {
        Self(level.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    /// Parse an option value; out-of-range values clamp, garbage gives the default
    pub fn from_option(raw: &str) -> Self {
        match raw.trim().parse::<i64>() {
            Ok(level) => Self::clamped(level),
            Err(_) => {
                warn!(value = %raw, "Invalid aggression level, using default");
                Self::DEFAULT
            }
        }
    }

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for Aggression {
    fn default() -> Self {
        Self::DEFAULT
    }
}
