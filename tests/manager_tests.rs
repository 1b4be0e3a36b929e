//! Integration tests for the collector manager.
//!
//! These tests cover registration, lifecycle errors and task failure
//! reporting through the public library API.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use herakles_metrics_agent::collectors::{BaseCollector, BoxFuture};
use herakles_metrics_agent::{
    Batch, Collector, CollectorError, CollectorState, CpuCollector, FakePlatform, Manager,
    ManagerError, MemoryCollector, PlatformError,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn memory_collector(interval: Duration) -> Arc<dyn Collector> {
    Arc::new(MemoryCollector::new(interval, Arc::new(FakePlatform::new())))
}

/// Collector whose stop always fails and whose sampling can panic.
struct Faulty {
    base: BaseCollector,
    panic_on_collect: bool,
}

impl Faulty {
    fn new(name: &str, panic_on_collect: bool) -> Self {
        Self {
            base: BaseCollector::new(name, Duration::from_secs(1)),
            panic_on_collect,
        }
    }
}

impl Collector for Faulty {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn collect(&self) -> Result<Batch, CollectorError> {
        if self.panic_on_collect {
            panic!("sensor driver exploded");
        }
        Ok(Vec::new())
    }

    fn start(
        &self,
        ctx: CancellationToken,
        output: mpsc::Sender<Batch>,
    ) -> BoxFuture<'_, Result<(), CollectorError>> {
        Box::pin(self.base.run(ctx, output, move || self.collect()))
    }

    fn stop(&self) -> Result<(), CollectorError> {
        self.base.stop()?;
        Err(PlatformError::Unsupported(format!("{} refuses to stop", self.name())).into())
    }

    fn interval(&self) -> Duration {
        self.base.interval()
    }

    fn state(&self) -> CollectorState {
        self.base.state()
    }
}

#[test]
fn test_duplicate_name_rejected_registry_unchanged() {
    let manager = Manager::with_capacity(10);
    let first = memory_collector(Duration::from_secs(1));
    manager.register_collector("memory", first.clone()).unwrap();

    let second = memory_collector(Duration::from_secs(5));
    let err = manager.register_collector("memory", second).unwrap_err();
    assert!(matches!(err, ManagerError::DuplicateCollector(_)));

    assert_eq!(manager.len(), 1);
    assert_eq!(manager.collector_names(), vec!["memory"]);
}

#[test]
fn test_concurrent_registration_no_lost_updates() {
    const N: usize = 32;
    let manager = Arc::new(Manager::with_capacity(10));

    let handles: Vec<_> = (0..N)
        .map(|i| {
            let manager = manager.clone();
            thread::spawn(move || {
                manager.register_collector(
                    format!("collector-{}", i),
                    memory_collector(Duration::from_secs(1)),
                )
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }
    assert_eq!(manager.len(), N);
}

#[tokio::test]
async fn test_start_empty_registry_launches_nothing() {
    let manager = Manager::with_capacity(10);
    let err = manager.start(&CancellationToken::new()).unwrap_err();
    assert!(matches!(err, ManagerError::NoCollectorsRegistered));

    // nothing to wait for
    manager.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_drain_twice_second_is_empty() {
    let manager = Manager::with_capacity(10);
    manager
        .register_collector("memory", memory_collector(Duration::from_secs(1)))
        .unwrap();

    let ctx = CancellationToken::new();
    manager.start(&ctx).unwrap();

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(manager.get_metrics().len(), 3);
    assert!(manager.get_metrics().is_empty());

    ctx.cancel();
    manager.wait().await.unwrap();
}

#[tokio::test]
async fn test_stop_aggregates_all_failures() {
    let manager = Manager::with_capacity(10);
    manager
        .register_collector("alpha", Arc::new(Faulty::new("alpha", false)))
        .unwrap();
    manager
        .register_collector("beta", Arc::new(Faulty::new("beta", false)))
        .unwrap();
    manager
        .register_collector("memory", memory_collector(Duration::from_secs(1)))
        .unwrap();

    match manager.stop() {
        Err(ManagerError::Stop(failures)) => {
            let mut names: Vec<_> = failures.iter().map(|(n, _)| n.as_str()).collect();
            names.sort();
            assert_eq!(names, vec!["alpha", "beta"]);
        }
        other => panic!("expected aggregated stop error, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_stop_ends_running_tasks() {
    let manager = Manager::with_capacity(10);
    let collector = memory_collector(Duration::from_secs(1));
    manager.register_collector("memory", collector.clone()).unwrap();

    // the shared token is never cancelled; only stop() ends the loop
    manager.start(&CancellationToken::new()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(collector.state(), CollectorState::Running);

    manager.stop().unwrap();
    manager.wait().await.unwrap();
    assert_eq!(collector.state(), CollectorState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_task_errors_surface_through_wait() {
    let manager = Manager::with_capacity(10);
    let shared = memory_collector(Duration::from_secs(1));

    // the same instance under two names: the second task cannot start it
    manager.register_collector("first", shared.clone()).unwrap();
    manager.register_collector("second", shared).unwrap();

    let ctx = CancellationToken::new();
    manager.start(&ctx).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    ctx.cancel();

    match manager.wait().await {
        Err(ManagerError::Tasks(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(matches!(failures[0].1, CollectorError::AlreadyStarted(_)));
        }
        other => panic!("expected task failure, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_collector_reported_by_wait() {
    let manager = Manager::with_capacity(10);
    manager
        .register_collector("fragile", Arc::new(Faulty::new("fragile", true)))
        .unwrap();

    let ctx = CancellationToken::new();
    manager.start(&ctx).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    ctx.cancel();

    let err = manager.wait().await.unwrap_err();
    assert!(matches!(err, ManagerError::TaskPanicked { ref name, .. } if name == "fragile"));
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_stalls_producers_until_drained() {
    let manager = Manager::with_capacity(1);
    manager
        .register_collector("memory", memory_collector(Duration::from_secs(1)))
        .unwrap();

    let ctx = CancellationToken::new();
    manager.start(&ctx).unwrap();

    // three ticks elapse, but only one batch fits and the producer blocks
    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(manager.get_metrics().len(), 3);

    // the blocked send completes once space is freed
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(manager.get_metrics().len(), 3);

    ctx.cancel();
    manager.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_full_queue_stalls_every_collector_until_drained() {
    let platform = Arc::new(FakePlatform::new());
    let manager = Manager::with_capacity(1);
    manager
        .register_collector(
            "memory",
            Arc::new(MemoryCollector::new(Duration::from_secs(1), platform.clone())),
        )
        .unwrap();
    manager
        .register_collector(
            "cpu",
            Arc::new(CpuCollector::new(Duration::from_secs(1), platform.clone())),
        )
        .unwrap();

    let ctx = CancellationToken::new();
    manager.start(&ctx).unwrap();

    // one batch fills the queue; both producers end up blocked on send
    tokio::time::sleep(Duration::from_millis(3500)).await;
    let stalled = platform.calls();
    assert!(stalled > 0);

    tokio::time::sleep(Duration::from_millis(6500)).await;
    assert_eq!(platform.calls(), stalled, "a producer kept sampling");

    // only the queued batch comes out: 3 memory points or 4 cpu points
    let points = manager.get_metrics();
    assert!(matches!(points.len(), 3 | 4), "got {} points", points.len());
    let prefixes: std::collections::HashSet<_> = points
        .iter()
        .filter_map(|p| p.kind().as_str().split('.').next())
        .collect();
    assert_eq!(prefixes.len(), 1);

    // freeing the slot lets the blocked producers resume sampling
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(platform.calls() > stalled);
    assert!(!manager.get_metrics().is_empty());

    ctx.cancel();
    manager.wait().await.unwrap();
}
