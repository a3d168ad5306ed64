//! Style configuration: category maps, color maps, bucket rules and color ramps.
//!
//! Loaded once at startup (built-in defaults, optionally merged with a user
//! TOML file) and then only borrowed by the pipeline stages.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::Context;
use tracing::debug;

use crate::error::{ParcelError, Result};
use crate::palette::{ColorMap, ColorRamp};

const DEFAULTS: &str = include_str!("defaults.toml");

/// Raw code → human-readable label
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap(BTreeMap<String, String>);

impl CategoryMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.0.get(code).map(String::as_str)
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.0.values().any(|v| v == label)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// When a bucket rule applies
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    Null,
    Lt { value: f64 },
    Le { value: f64 },
    Gt { value: f64 },
    Ge { value: f64 },
    Otherwise,
}

impl Condition {
    /// Numeric conditions never match a missing value
    pub fn matches(&self, value: Option<f64>) -> bool {
        match (self, value) {
            (Condition::Otherwise, _) => true,
            (Condition::Null, v) => v.is_none(),
            (Condition::Lt { value: t }, Some(v)) => v < *t,
            (Condition::Le { value: t }, Some(v)) => v <= *t,
            (Condition::Gt { value: t }, Some(v)) => v > *t,
            (Condition::Ge { value: t }, Some(v)) => v >= *t,
            (_, None) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BucketRule {
    pub label: String,
    #[serde(flatten)]
    pub condition: Condition,
}

impl BucketRule {
    pub fn new(condition: Condition, label: impl Into<String>) -> Self {
        Self { label: label.into(), condition }
    }
}

/// Ordered rules, first match wins, terminated by `otherwise`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<BucketRule>")]
pub struct BucketRules {
    rules: Vec<BucketRule>,
}

impl TryFrom<Vec<BucketRule>> for BucketRules {
    type Error = ParcelError;

    fn try_from(rules: Vec<BucketRule>) -> Result<Self> {
        BucketRules::new(rules)
    }
}

impl BucketRules {
    pub fn new(rules: Vec<BucketRule>) -> Result<Self> {
        match rules.last() {
            None => Err(ParcelError::InvalidRules("rule list is empty".to_string())),
            Some(last) if last.condition != Condition::Otherwise => Err(ParcelError::InvalidRules(
                format!("last rule ('{}') must be 'otherwise'", last.label),
            )),
            Some(_) => Ok(Self { rules }),
        }
    }

    /// Label of the first matching rule
    pub fn classify(&self, value: Option<f64>) -> &str {
        self.rules
            .iter()
            .find(|r| r.condition.matches(value))
            .map(|r| r.label.as_str())
            // Unreachable: construction guarantees a trailing `otherwise`
            .unwrap_or_default()
    }

    pub fn rules(&self) -> &[BucketRule] {
        &self.rules
    }

    pub fn labels(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.label.as_str()).collect()
    }
}

/// All named lookup data the pipeline can reference
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleConfig {
    #[serde(default)]
    pub category_maps: HashMap<String, CategoryMap>,
    #[serde(default)]
    pub color_maps: HashMap<String, ColorMap>,
    #[serde(default)]
    pub bucket_rules: HashMap<String, BucketRules>,
    #[serde(default)]
    pub ramps: HashMap<String, ColorRamp>,
}

impl StyleConfig {
    /// The defaults shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_toml(DEFAULTS)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Built-in defaults, overlaid with the file at `path` if given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = Self::builtin().context("Built-in style defaults are invalid")?;
        if let Some(path) = path {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config '{}'", path.display()))?;
            let user = Self::from_toml(&text)
                .with_context(|| format!("Failed to parse config '{}'", path.display()))?;
            config.merge(user);
            debug!(path = %path.display(), "merged user style config");
        }
        Ok(config)
    }

    /// Entries in `other` replace same-named entries in `self`
    pub fn merge(&mut self, other: StyleConfig) {
        self.category_maps.extend(other.category_maps);
        self.color_maps.extend(other.color_maps);
        self.bucket_rules.extend(other.bucket_rules);
        self.ramps.extend(other.ramps);
    }

    pub fn category_map(&self, name: &str) -> Result<&CategoryMap> {
        self.category_maps.get(name).ok_or_else(|| unknown("category map", name))
    }

    pub fn color_map(&self, name: &str) -> Option<&ColorMap> {
        self.color_maps.get(name)
    }

    pub fn bucket_rules(&self, name: &str) -> Result<&BucketRules> {
        self.bucket_rules.get(name).ok_or_else(|| unknown("bucket rule set", name))
    }

    pub fn ramp(&self, name: &str) -> Result<&ColorRamp> {
        self.ramps.get(name).ok_or_else(|| unknown("color ramp", name))
    }
}

fn unknown(kind: &'static str, name: &str) -> ParcelError {
    ParcelError::UnknownConfigEntry { kind, name: name.to_string() }
}
