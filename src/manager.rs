//! Collector registry and task lifecycle.
//!
//! The [`Manager`] owns every registered collector, one bounded queue shared
//! by all of them, and the handles of the tasks it spawned. Collectors push
//! batches into the queue; [`Manager::get_metrics`] drains it without
//! blocking. A full queue stalls every producer until the next drain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::collectors::{Batch, Collector};
use crate::config::CollectionConfig;
use crate::error::{CollectorError, ManagerError};
use crate::metric::MetricPoint;

/// Number of batches the shared queue holds before producers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

type CollectorTask = (String, JoinHandle<Result<(), CollectorError>>);

pub struct Manager {
    collectors: RwLock<HashMap<String, Arc<dyn Collector>>>,
    sender: mpsc::Sender<Batch>,
    receiver: Mutex<mpsc::Receiver<Batch>>,
    tasks: Mutex<Vec<CollectorTask>>,
    started: AtomicBool,
    batch_size: u8,
}

impl Manager {
    /// Creates a manager for the given collection settings.
    pub fn new(config: &CollectionConfig) -> Result<Self, ManagerError> {
        if config.batch_size == 0 {
            return Err(ManagerError::InvalidBatchSize(config.batch_size));
        }
        let mut manager = Self::with_capacity(DEFAULT_QUEUE_CAPACITY);
        manager.batch_size = config.batch_size;
        Ok(manager)
    }

    /// Creates a manager whose queue holds `capacity` batches (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            collectors: RwLock::new(HashMap::new()),
            sender,
            receiver: Mutex::new(receiver),
            tasks: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            batch_size: CollectionConfig::default().batch_size,
        }
    }

    pub fn batch_size(&self) -> u8 {
        self.batch_size
    }

    /// Adds a collector under `name`. The registry is left unchanged if the
    /// name is taken.
    pub fn register_collector(
        &self,
        name: impl Into<String>,
        collector: Arc<dyn Collector>,
    ) -> Result<(), ManagerError> {
        let name = name.into();
        let mut collectors = self
            .collectors
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if collectors.contains_key(&name) {
            return Err(ManagerError::DuplicateCollector(name));
        }

        info!(
            "Registered collector '{}' (interval {:?})",
            name,
            collector.interval()
        );
        collectors.insert(name, collector);
        Ok(())
    }

    /// Spawns one polling task per registered collector and returns
    /// immediately. Must be called from within a tokio runtime.
    pub fn start(&self, ctx: &CancellationToken) -> Result<(), ManagerError> {
        let collectors = self.snapshot();
        if collectors.is_empty() {
            return Err(ManagerError::NoCollectorsRegistered);
        }
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ManagerError::AlreadyStarted);
        }

        let mut tasks = self.lock_tasks();
        for (name, collector) in collectors {
            let ctx = ctx.clone();
            let output = self.sender.clone();
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                let result = collector.start(ctx, output).await;
                if let Err(e) = &result {
                    error!("Collector '{}' exited with error: {}", task_name, e);
                }
                result
            });
            tasks.push((name, handle));
        }

        info!("Started {} collector task(s)", tasks.len());
        Ok(())
    }

    /// Drains every batch currently queued, flattened in arrival order.
    /// Never blocks.
    pub fn get_metrics(&self) -> Vec<MetricPoint> {
        let mut receiver = self
            .receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut points = Vec::new();
        let mut batches = 0usize;
        while let Ok(batch) = receiver.try_recv() {
            batches += 1;
            points.extend(batch);
        }

        debug!("Drained {} batch(es), {} point(s)", batches, points.len());
        points
    }

    /// Stops every registered collector, reporting all failures together.
    pub fn stop(&self) -> Result<(), ManagerError> {
        let mut failures = Vec::new();

        for (name, collector) in self.snapshot() {
            if let Err(e) = collector.stop() {
                warn!("Failed to stop collector '{}': {}", name, e);
                failures.push((name, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ManagerError::Stop(failures))
        }
    }

    /// Waits for every spawned task to finish and surfaces their errors.
    ///
    /// Tasks only end once the shared token or their collector is
    /// cancelled, so this is normally called after [`Manager::stop`].
    pub async fn wait(&self) -> Result<(), ManagerError> {
        let tasks = std::mem::take(&mut *self.lock_tasks());

        let mut failures = Vec::new();
        let mut panicked = None;

        for (name, handle) in tasks {
            match handle.await {
                Ok(Ok(())) => debug!("Collector task '{}' finished", name),
                Ok(Err(e)) => failures.push((name, e)),
                Err(e) if e.is_panic() => {
                    error!("Collector task '{}' panicked: {}", name, e);
                    panicked.get_or_insert(ManagerError::TaskPanicked {
                        name,
                        detail: e.to_string(),
                    });
                }
                Err(e) => warn!("Collector task '{}' was cancelled: {}", name, e),
            }
        }

        if let Some(err) = panicked {
            return Err(err);
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ManagerError::Tasks(failures))
        }
    }

    /// Runs one ad-hoc sampling pass on a registered collector.
    pub fn probe(&self, name: &str) -> Result<Vec<MetricPoint>, ManagerError> {
        let collector = self
            .collectors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::UnknownCollector(name.to_string()))?;

        Ok(collector.collect()?)
    }

    pub fn len(&self) -> usize {
        self.collectors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names, sorted.
    pub fn collector_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collectors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn snapshot(&self) -> Vec<(String, Arc<dyn Collector>)> {
        self.collectors
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(name, collector)| (name.clone(), collector.clone()))
            .collect()
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<CollectorTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{CollectorState, MemoryCollector};
    use crate::platform::FakePlatform;
    use std::time::Duration;

    fn memory_collector() -> Arc<dyn Collector> {
        Arc::new(MemoryCollector::new(
            Duration::from_secs(1),
            Arc::new(FakePlatform::new()),
        ))
    }

    #[test]
    fn test_new_rejects_zero_batch_size() {
        let mut config = CollectionConfig::default();
        config.batch_size = 0;
        assert!(matches!(
            Manager::new(&config),
            Err(ManagerError::InvalidBatchSize(0))
        ));

        config.batch_size = 255;
        assert_eq!(Manager::new(&config).unwrap().batch_size(), 255);
    }

    #[test]
    fn test_duplicate_registration_keeps_one_entry() {
        let manager = Manager::with_capacity(4);
        manager.register_collector("memory", memory_collector()).unwrap();

        let err = manager
            .register_collector("memory", memory_collector())
            .unwrap_err();
        assert!(matches!(err, ManagerError::DuplicateCollector(ref n) if n == "memory"));
        assert_eq!(err.to_string(), "collector 'memory' already registered");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_start_without_collectors() {
        let manager = Manager::with_capacity(4);
        let err = manager.start(&CancellationToken::new()).unwrap_err();
        assert!(matches!(err, ManagerError::NoCollectorsRegistered));
        assert!(manager.lock_tasks().is_empty());

        // an empty start does not count as started
        manager.register_collector("memory", memory_collector()).unwrap();
        let ctx = CancellationToken::new();
        manager.start(&ctx).unwrap();
        ctx.cancel();
        manager.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let manager = Manager::with_capacity(4);
        manager.register_collector("memory", memory_collector()).unwrap();
        let ctx = CancellationToken::new();

        manager.start(&ctx).unwrap();
        assert!(matches!(
            manager.start(&ctx),
            Err(ManagerError::AlreadyStarted)
        ));

        ctx.cancel();
        manager.wait().await.unwrap();
    }

    #[test]
    fn test_get_metrics_on_empty_queue() {
        let manager = Manager::with_capacity(4);
        assert!(manager.get_metrics().is_empty());
        assert!(manager.get_metrics().is_empty());
    }

    #[test]
    fn test_probe() {
        let manager = Manager::with_capacity(4);
        manager.register_collector("memory", memory_collector()).unwrap();

        assert_eq!(manager.probe("memory").unwrap().len(), 3);
        assert!(matches!(
            manager.probe("gpu"),
            Err(ManagerError::UnknownCollector(ref n)) if n == "gpu"
        ));
    }

    #[test]
    fn test_stop_is_idempotent_and_marks_collectors() {
        let manager = Manager::with_capacity(4);
        let collector = memory_collector();
        manager.register_collector("memory", collector.clone()).unwrap();

        manager.stop().unwrap();
        manager.stop().unwrap();
        assert_eq!(collector.state(), CollectorState::Stopped);
    }

    #[test]
    fn test_collector_names_sorted() {
        let manager = Manager::with_capacity(4);
        for name in ["memory", "cpu", "disk"] {
            manager.register_collector(name, memory_collector()).unwrap();
        }
        assert_eq!(manager.collector_names(), vec!["cpu", "disk", "memory"]);
        assert!(!manager.is_empty());
    }
}
