//! Sinks for drained metric points.

use tracing::{debug, info};

use crate::metric::MetricPoint;

/// Consumer of the points returned by [`Manager::get_metrics`](crate::manager::Manager::get_metrics).
pub trait Reporter: Send + Sync {
    fn report(&self, points: &[MetricPoint]);
}

/// Writes every point as one log line, grouped into chunks of `batch_size`.
#[derive(Debug, Clone)]
pub struct LogReporter {
    batch_size: usize,
}

impl LogReporter {
    pub fn new(batch_size: u8) -> Self {
        Self {
            batch_size: usize::from(batch_size.max(1)),
        }
    }

    /// Splits `points` the way [`Reporter::report`] logs them.
    pub fn chunks<'a>(&self, points: &'a [MetricPoint]) -> std::slice::Chunks<'a, MetricPoint> {
        points.chunks(self.batch_size)
    }

    /// The log lines [`Reporter::report`] writes for `points`: a header per
    /// chunk followed by one line per point. Empty input yields no lines.
    pub fn lines(&self, points: &[MetricPoint]) -> Vec<String> {
        let total = self.chunks(points).len();
        let mut lines = Vec::with_capacity(points.len() + total);
        for (index, chunk) in self.chunks(points).enumerate() {
            lines.push(format!(
                "Reporting metrics batch {}/{} ({} points)",
                index + 1,
                total,
                chunk.len()
            ));
            lines.extend(chunk.iter().map(ToString::to_string));
        }
        lines
    }
}

impl Reporter for LogReporter {
    fn report(&self, points: &[MetricPoint]) {
        if points.is_empty() {
            debug!("No metrics to report");
            return;
        }

        for line in self.lines(points) {
            info!("{}", line);
        }
    }
}
