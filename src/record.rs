//! Metric records: identity labels plus numeric metric values
//!
//! A record is one parsed observation of one run. Records are immutable
//! once built; the tree only ever moves them into leaves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of a dimension, inferred from its values
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DimensionKind {
    /// Unordered labels (toolchain, optimization level, machine)
    #[default]
    Categorical,
    /// Numeric, monotonically meaningful labels (core/thread count)
    Ordinal,
}

impl fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimensionKind::Categorical => write!(f, "categorical"),
            DimensionKind::Ordinal => write!(f, "ordinal"),
        }
    }
}

/// One dimension value at one tree depth
///
/// Ordinal values sort numerically, categorical values lexicographically.
/// A schema never mixes both kinds at one depth.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimValue {
    Ordinal(u64),
    Categorical(String),
}

impl DimValue {
    pub fn kind(&self) -> DimensionKind {
        match self {
            DimValue::Ordinal(_) => DimensionKind::Ordinal,
            DimValue::Categorical(_) => DimensionKind::Categorical,
        }
    }

    /// Numeric scale for ordinal values
    pub fn as_scale(&self) -> Option<u64> {
        match self {
            DimValue::Ordinal(v) => Some(*v),
            DimValue::Categorical(_) => None,
        }
    }
}

impl fmt::Display for DimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DimValue::Ordinal(v) => write!(f, "{}", v),
            DimValue::Categorical(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for DimValue {
    fn from(value: &str) -> Self {
        DimValue::Categorical(value.to_string())
    }
}

impl From<u64> for DimValue {
    fn from(value: u64) -> Self {
        DimValue::Ordinal(value)
    }
}

/// Named dimension value, e.g. `toolchain=gcc`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label {
    pub dimension: String,
    pub value: DimValue,
}

impl Label {
    pub fn new(dimension: impl Into<String>, value: impl Into<DimValue>) -> Self {
        Self {
            dimension: dimension.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.dimension, self.value)
    }
}

/// Ordered labels locating a record in the category tree
pub type Identity = Vec<Label>;

/// Numeric metric value as reported by a log
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
}

impl MetricValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            MetricValue::Int(v) => *v as f64,
            MetricValue::Float(v) => *v,
        }
    }

    /// Parse a textual number, preferring integers
    pub fn parse(text: &str) -> Option<Self> {
        if let Ok(v) = text.parse::<i64>() {
            return Some(MetricValue::Int(v));
        }
        text.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(MetricValue::Float)
    }
}

/// Metric name → value
pub type Metrics = BTreeMap<String, MetricValue>;

/// One parsed observation of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    identity: Identity,
    metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl MetricRecord {
    pub fn new(identity: Identity, metrics: Metrics) -> Self {
        Self {
            identity,
            metrics,
            source: None,
        }
    }

    /// Tag the record with the log it came from
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn identity(&self) -> &[Label] {
        &self.identity
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).map(MetricValue::as_f64)
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}
