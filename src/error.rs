//! Error types for the metrics agent.
//!
//! Registration and lifecycle failures are returned synchronously from the
//! [`Manager`](crate::manager::Manager). Sampling failures are local to one
//! tick of one collector and never leave the collector loop.

use std::fmt;
use std::path::PathBuf;

use crate::metric::ValueKind;

/// Reading a metric value through the wrong typed accessor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricError {
    #[error("metric holds a {actual} value, not {expected}")]
    WrongValueKind {
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("invalid metric record: {0}")]
    InvalidRecord(String),
}

/// Failure of an underlying OS read.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("statvfs failed for {path}: {source}")]
    Statvfs {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl PlatformError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(what: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Parse {
            what: what.into(),
            detail: detail.to_string(),
        }
    }
}

/// Errors raised by a single collector.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("collector '{0}' was already started")]
    AlreadyStarted(String),

    #[error("metrics queue closed while collector '{0}' was sending")]
    QueueClosed(String),
}

/// Errors returned by the collector manager.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("collector '{0}' already registered")]
    DuplicateCollector(String),

    #[error("no collectors registered")]
    NoCollectorsRegistered,

    #[error("collectors already started")]
    AlreadyStarted,

    #[error("collector '{0}' is not registered")]
    UnknownCollector(String),

    #[error("batch size must be between 1 and 255, got {0}")]
    InvalidBatchSize(u8),

    #[error("errors stopping collectors: {}", join_failures(.0))]
    Stop(Vec<(String, CollectorError)>),

    #[error("collector tasks failed: {}", join_failures(.0))]
    Tasks(Vec<(String, CollectorError)>),

    #[error(transparent)]
    Collector(#[from] CollectorError),

    #[error("collector task for '{name}' panicked: {detail}")]
    TaskPanicked { name: String, detail: String },
}

fn join_failures(failures: &[(String, CollectorError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("'{}': {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration loading and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to render config: {0}")]
    Render(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_error_joins_all_failures() {
        let err = ManagerError::Stop(vec![
            (
                "cpu".to_string(),
                CollectorError::AlreadyStarted("cpu".to_string()),
            ),
            (
                "disk".to_string(),
                CollectorError::QueueClosed("disk".to_string()),
            ),
        ]);

        let msg = err.to_string();
        assert!(msg.starts_with("errors stopping collectors:"));
        assert!(msg.contains("'cpu': collector 'cpu' was already started"));
        assert!(msg.contains("'disk': metrics queue closed"));
    }

    #[test]
    fn test_platform_error_is_transparent_in_collector_error() {
        let err: CollectorError = PlatformError::parse("/proc/meminfo", "MemTotal missing").into();
        assert_eq!(
            err.to_string(),
            "failed to parse /proc/meminfo: MemTotal missing"
        );
    }
}
