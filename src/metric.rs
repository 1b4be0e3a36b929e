//! Metric data model.
//!
//! A [`MetricPoint`] is one typed, timestamped observation produced by a
//! collector. The value is a [`MetricValue`] enum, so exactly one value is
//! always populated and its tag always matches. On the wire a point is a flat
//! record (`type`, `value_type`, `<kind>_value`, `unit`, `timestamp`,
//! `labels`) with unset value fields, an empty unit and empty labels omitted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::error::MetricError;

/// Dimension labels attached to a metric point.
pub type Labels = HashMap<String, String>;

/// The measured quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "cpu.usage")]
    CpuUsage,
    #[serde(rename = "cpu.model")]
    CpuModel,
    #[serde(rename = "cpu.count_physical")]
    CpuCountPhysical,
    #[serde(rename = "cpu.count_logical")]
    CpuCountLogical,
    #[serde(rename = "cpu.temperature")]
    CpuTemperature,
    #[serde(rename = "memory.usage")]
    MemoryUsage,
    #[serde(rename = "memory.total")]
    MemoryTotal,
    #[serde(rename = "memory.free")]
    MemoryFree,
    #[serde(rename = "disk.usage")]
    DiskUsage,
    #[serde(rename = "disk.used")]
    DiskUsed,
    #[serde(rename = "disk.free")]
    DiskFree,
    #[serde(rename = "disk.total")]
    DiskTotal,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::CpuUsage => "cpu.usage",
            MetricKind::CpuModel => "cpu.model",
            MetricKind::CpuCountPhysical => "cpu.count_physical",
            MetricKind::CpuCountLogical => "cpu.count_logical",
            MetricKind::CpuTemperature => "cpu.temperature",
            MetricKind::MemoryUsage => "memory.usage",
            MetricKind::MemoryTotal => "memory.total",
            MetricKind::MemoryFree => "memory.free",
            MetricKind::DiskUsage => "disk.usage",
            MetricKind::DiskUsed => "disk.used",
            MetricKind::DiskFree => "disk.free",
            MetricKind::DiskTotal => "disk.total",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tag naming which value variant a point carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    String,
    Float,
    Int,
    Bool,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::String => "string",
            ValueKind::Float => "float",
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
        };
        f.write_str(s)
    }
}

/// The single populated value of a metric point.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    String(String),
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl MetricValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            MetricValue::String(_) => ValueKind::String,
            MetricValue::Float(_) => ValueKind::Float,
            MetricValue::Int(_) => ValueKind::Int,
            MetricValue::Bool(_) => ValueKind::Bool,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::String(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
            MetricValue::Int(v) => write!(f, "{}", v),
            MetricValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// One observation. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "MetricRecord", try_from = "MetricRecord")]
pub struct MetricPoint {
    kind: MetricKind,
    value: MetricValue,
    unit: String,
    timestamp: i64,
    labels: Labels,
}

impl MetricPoint {
    /// Builds a point stamped with the current time.
    pub fn new(kind: MetricKind, value: MetricValue) -> Self {
        Self {
            kind,
            value,
            unit: String::new(),
            timestamp: chrono::Utc::now().timestamp(),
            labels: Labels::new(),
        }
    }

    pub fn float(kind: MetricKind, value: f64) -> Self {
        Self::new(kind, MetricValue::Float(value))
    }

    pub fn int(kind: MetricKind, value: i64) -> Self {
        Self::new(kind, MetricValue::Int(value))
    }

    /// Integer point from an unsigned reading, saturating at `i64::MAX`.
    pub fn uint(kind: MetricKind, value: u64) -> Self {
        Self::int(kind, i64::try_from(value).unwrap_or(i64::MAX))
    }

    pub fn string(kind: MetricKind, value: impl Into<String>) -> Self {
        Self::new(kind, MetricValue::String(value.into()))
    }

    pub fn bool(kind: MetricKind, value: bool) -> Self {
        Self::new(kind, MetricValue::Bool(value))
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn value(&self) -> &MetricValue {
        &self.value
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value.kind()
    }

    /// Unit string, `None` when unset.
    pub fn unit(&self) -> Option<&str> {
        if self.unit.is_empty() {
            None
        } else {
            Some(&self.unit)
        }
    }

    /// Capture time in seconds since the Unix epoch.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn as_float(&self) -> Result<f64, MetricError> {
        match &self.value {
            MetricValue::Float(v) => Ok(*v),
            other => Err(wrong_kind(ValueKind::Float, other)),
        }
    }

    pub fn as_int(&self) -> Result<i64, MetricError> {
        match &self.value {
            MetricValue::Int(v) => Ok(*v),
            other => Err(wrong_kind(ValueKind::Int, other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, MetricError> {
        match &self.value {
            MetricValue::String(v) => Ok(v),
            other => Err(wrong_kind(ValueKind::String, other)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, MetricError> {
        match &self.value {
            MetricValue::Bool(v) => Ok(*v),
            other => Err(wrong_kind(ValueKind::Bool, other)),
        }
    }
}

fn wrong_kind(expected: ValueKind, actual: &MetricValue) -> MetricError {
    MetricError::WrongValueKind {
        expected,
        actual: actual.kind(),
    }
}

impl fmt::Display for MetricPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type={} value={}", self.kind, self.value)?;
        if !self.unit.is_empty() {
            write!(f, " unit={}", self.unit)?;
        }
        if !self.labels.is_empty() {
            let sorted: BTreeMap<_, _> = self.labels.iter().collect();
            let rendered = sorted
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",");
            write!(f, " labels={{{}}}", rendered)?;
        }
        Ok(())
    }
}

/// Flat wire representation of a [`MetricPoint`].
#[derive(Serialize, Deserialize)]
struct MetricRecord {
    #[serde(rename = "type")]
    kind: MetricKind,
    value_type: ValueKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "float_repr")]
    float_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    int_value: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bool_value: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    unit: String,
    timestamp: i64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    labels: Labels,
}

/// Finite floats stay JSON numbers; NaN and the infinities are written as
/// the strings `"NaN"`, `"inf"` and `"-inf"`, which JSON cannot encode as
/// numbers.
mod float_repr {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) if v.is_finite() => serializer.serialize_some(v),
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(text)) => text
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid float value '{}'", text))),
        }
    }
}

impl From<MetricPoint> for MetricRecord {
    fn from(point: MetricPoint) -> Self {
        let mut record = MetricRecord {
            kind: point.kind,
            value_type: point.value.kind(),
            string_value: None,
            float_value: None,
            int_value: None,
            bool_value: None,
            unit: point.unit,
            timestamp: point.timestamp,
            labels: point.labels,
        };
        match point.value {
            MetricValue::String(v) => record.string_value = Some(v),
            MetricValue::Float(v) => record.float_value = Some(v),
            MetricValue::Int(v) => record.int_value = Some(v),
            MetricValue::Bool(v) => record.bool_value = Some(v),
        }
        record
    }
}

impl TryFrom<MetricRecord> for MetricPoint {
    type Error = MetricError;

    fn try_from(record: MetricRecord) -> Result<Self, Self::Error> {
        let mut values = Vec::with_capacity(1);
        if let Some(v) = record.string_value {
            values.push(MetricValue::String(v));
        }
        if let Some(v) = record.float_value {
            values.push(MetricValue::Float(v));
        }
        if let Some(v) = record.int_value {
            values.push(MetricValue::Int(v));
        }
        if let Some(v) = record.bool_value {
            values.push(MetricValue::Bool(v));
        }

        if values.len() != 1 {
            return Err(MetricError::InvalidRecord(format!(
                "expected exactly one value field, found {}",
                values.len()
            )));
        }
        let value = values.remove(0);
        if value.kind() != record.value_type {
            return Err(MetricError::InvalidRecord(format!(
                "value_type is {} but a {} value is set",
                record.value_type,
                value.kind()
            )));
        }

        Ok(MetricPoint {
            kind: record.kind,
            value,
            unit: record.unit,
            timestamp: record.timestamp,
            labels: record.labels,
        })
    }
}
