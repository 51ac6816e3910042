use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::video::types::Frame;

/// Core trait that every frame filter implements
///
/// A filter is an immutable value: `apply` is pure, total and deterministic, and
/// returns a new frame with the same index and timestamp as its input.
pub trait Filter: Send + Sync + fmt::Debug {
    /// Returns the unique name of this filter
    fn name(&self) -> &str;

    /// Returns a human-readable description of this filter
    fn description(&self) -> &str {
        ""
    }

    /// Produce the filtered copy of `frame`
    fn apply(&self, frame: &Frame) -> Frame;

    /// Whether `apply` returns its input unchanged
    ///
    /// Lets composition drop neutral elements instead of copying frames through them.
    fn is_identity(&self) -> bool {
        false
    }

    /// Get filter-specific metadata
    fn metadata(&self) -> FilterMetadata {
        FilterMetadata::default()
    }
}

/// Filters are shared by reference between preview, background and export
pub type SharedFilter = Arc<dyn Filter>;

/// Configuration for building a filter
///
/// Common intensity plus a free-form parameter map each filter reads its own keys from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Strength of the effect (0.0 = none, 1.0 = full)
    pub intensity: f32,

    /// Filter-specific parameters
    #[serde(default)]
    pub parameters: HashMap<String, ConfigValue>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            parameters: HashMap::new(),
        }
    }
}

impl FilterConfig {
    /// Create a new config with the given intensity
    pub fn with_intensity(intensity: f32) -> Self {
        Self {
            intensity: intensity.clamp(0.0, 1.0),
            parameters: HashMap::new(),
        }
    }

    /// Set a parameter value
    pub fn set<K: Into<String>, V: Into<ConfigValue>>(mut self, key: K, value: V) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn get_f32(&self, key: &str) -> Option<f32> {
        self.parameters.get(key).and_then(|v| v.as_f32())
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).and_then(|v| v.as_i64())
    }

    pub fn get_f32_or(&self, key: &str, default: f32) -> f32 {
        self.get_f32(key).unwrap_or(default)
    }

    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }
}

/// Flexible configuration value that can hold different types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Integer(i64),
    Float(f32),
    Bool(bool),
    String(String),
}

impl ConfigValue {
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            ConfigValue::Float(f) => Some(*f as i64),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Integer(i) => write!(f, "{}", i),
            ConfigValue::Float(v) => write!(f, "{}", v),
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<f32> for ConfigValue {
    fn from(value: f32) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        ConfigValue::Integer(value as i64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

/// Metadata about a filter's parameters and cost
#[derive(Debug, Clone, Default)]
pub struct FilterMetadata {
    /// Estimated cost per frame (0.0 = minimal, 1.0 = heavy)
    pub performance_impact: f32,

    /// Parameters read from [`FilterConfig`], with descriptions
    pub parameters: Vec<(String, String)>,
}
