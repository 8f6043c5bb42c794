// ABOUTME: Bounded background task pool for pipeline runs, keyed by deployment id.
// ABOUTME: Tasks for one id run one after another; a semaphore caps concurrent runs.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Semaphore;

use crate::types::DeploymentId;

/// Default number of runs executing at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Completion of a spawned run; resolves to false if the task panicked.
type RunHandle = Shared<BoxFuture<'static, bool>>;

#[derive(Clone)]
struct ActiveRun {
    generation: u64,
    done: RunHandle,
}

/// Drops a run's registry entry when its task ends, including by panic.
struct Release {
    registry: Arc<Mutex<HashMap<DeploymentId, ActiveRun>>>,
    id: DeploymentId,
    generation: u64,
}

impl Drop for Release {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if registry
            .get(&self.id)
            .is_some_and(|run| run.generation == self.generation)
        {
            registry.remove(&self.id);
        }
    }
}

/// Spawns pipeline runs as tokio tasks.
///
/// A run's entry is removed by the run itself when it finishes, so presence in
/// the registry means queued or running.
#[derive(Clone)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    active: Arc<Mutex<HashMap<DeploymentId, ActiveRun>>>,
    generation: Arc<AtomicU64>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("available_permits", &self.permits.available_permits())
            .field("active", &self.active_ids())
            .finish()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl Dispatcher {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            active: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Whether a task for `id` is queued or running.
    pub fn is_active(&self, id: &DeploymentId) -> bool {
        self.active.lock().contains_key(id)
    }

    /// Ids with a queued or running task.
    pub fn active_ids(&self) -> Vec<DeploymentId> {
        self.active.lock().keys().cloned().collect()
    }

    /// Queue `task` for `id`. It starts once a permit is free and any earlier
    /// task for `id` has ended.
    ///
    /// Callers decide whether a run may start; the state store's claim is
    /// what rejects overlapping runs.
    pub fn submit<F>(&self, id: DeploymentId, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock();
        let previous = active.get(&id).map(|run| run.done.clone());

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let permits = Arc::clone(&self.permits);
        let registry = Arc::clone(&self.active);
        let task_id = id.clone();

        let handle = tokio::spawn(async move {
            let _release = Release {
                registry,
                id: task_id.clone(),
                generation,
            };
            if let Some(previous) = previous {
                previous.await;
            }
            match permits.acquire_owned().await {
                Ok(_permit) => task.await,
                Err(_) => tracing::warn!("{}: dispatcher closed before run started", task_id),
            }
        });

        let log_id = id.clone();
        let done = handle
            .map(move |result| match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!("{}: run task ended abnormally: {}", log_id, e);
                    false
                }
            })
            .boxed()
            .shared();

        active.insert(id, ActiveRun { generation, done });
    }

    /// Wait for the tasks for `id` to finish, if there are any.
    pub async fn wait(&self, id: &DeploymentId) {
        let done = self.active.lock().get(id).map(|run| run.done.clone());
        if let Some(done) = done {
            done.await;
        }
    }

    /// Wait for every task active at the time of the call.
    pub async fn wait_all(&self) {
        let pending: Vec<RunHandle> = self
            .active
            .lock()
            .values()
            .map(|run| run.done.clone())
            .collect();
        futures::future::join_all(pending).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    fn id(s: &str) -> DeploymentId {
        DeploymentId::new(s).unwrap()
    }

    #[tokio::test]
    async fn same_id_runs_after_the_earlier_task() {
        let dispatcher = Dispatcher::new(2);
        let (tx, rx) = oneshot::channel::<()>();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        dispatcher.submit(id("aaa111"), async move {
            let _ = rx.await;
            first.lock().push(1);
        });
        let second = Arc::clone(&order);
        dispatcher.submit(id("aaa111"), async move {
            second.lock().push(2);
        });
        assert!(dispatcher.is_active(&id("aaa111")));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(order.lock().is_empty());

        tx.send(()).unwrap();
        dispatcher.wait(&id("aaa111")).await;
        assert_eq!(*order.lock(), vec![1, 2]);
        assert!(!dispatcher.is_active(&id("aaa111")));
    }

    #[tokio::test]
    async fn semaphore_caps_concurrent_runs() {
        let dispatcher = Dispatcher::new(1);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for name in ["aaa111", "bbb222", "ccc333"] {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            dispatcher.submit(id(name), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        dispatcher.wait_all().await;
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
