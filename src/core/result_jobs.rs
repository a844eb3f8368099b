use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::core::result_bus::ResultBus;

/// Identity of an observation job: which consumer waits for which key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId {
    consumer: String,
    key: String,
}

impl JobId {
    pub fn new(consumer: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            key: key.into(),
        }
    }

    pub fn consumer(&self) -> &str {
        &self.consumer
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.consumer, self.key)
    }
}

struct ResultJob {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ResultJob {
    async fn cancel_and_wait(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            if e.is_panic() {
                log::error!("Result job panicked: {e}");
            }
        }
    }
}

type JobMap = Arc<Mutex<HashMap<JobId, ResultJob>>>;

fn lock(jobs: &JobMap) -> MutexGuard<'_, HashMap<JobId, ResultJob>> {
    jobs.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps at most one result observation per (consumer, key).
///
/// Starting a job for an id that already has one cancels the old job, and the
/// new job only subscribes once the old one has finished tearing down.
#[derive(Clone, Default)]
pub struct ResultJobs {
    jobs: JobMap,
    next_generation: Arc<AtomicU64>,
    runtime: Option<Handle>,
}

impl ResultJobs {
    /// Jobs run on the runtime of whoever calls [`ResultJobs::get_result`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs run on `runtime`, so they can be started from any thread
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::default()
        }
    }

    fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    /// Wait for a single-shot result under `key` and hand it to `on_result`.
    ///
    /// Without a runtime to run on, the request is logged and dropped.
    pub fn get_result<T, F>(
        &self,
        bus: &ResultBus,
        consumer: &str,
        key: &str,
        on_result: F,
    ) -> JobId
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        let id = JobId::new(consumer, key);
        let Some(runtime) = self.runtime() else {
            log::error!("No tokio runtime to observe result {id}; dropping request");
            return id;
        };
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let mut jobs = lock(&self.jobs);
        let previous = jobs.remove(&id);
        if let Some(previous) = &previous {
            previous.token.cancel();
            log::debug!("Replacing result job {id}");
        }
        let handle = runtime.spawn(observe(
            ObserveJob {
                id: id.clone(),
                generation,
                token: token.clone(),
                bus: bus.clone(),
                jobs: Arc::clone(&self.jobs),
            },
            previous,
            on_result,
        ));
        jobs.insert(
            id.clone(),
            ResultJob {
                generation,
                token,
                handle,
            },
        );
        id
    }

    /// Cancel the job for (`consumer`, `key`); returns whether one was running
    pub fn cancel(&self, consumer: &str, key: &str) -> bool {
        match lock(&self.jobs).remove(&JobId::new(consumer, key)) {
            Some(job) => {
                job.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every job owned by `consumer`, e.g. when it is torn down
    pub fn cancel_consumer(&self, consumer: &str) -> usize {
        let mut jobs = lock(&self.jobs);
        let ids: Vec<JobId> = jobs
            .keys()
            .filter(|id| id.consumer == consumer)
            .cloned()
            .collect();
        for id in &ids {
            if let Some(job) = jobs.remove(id) {
                job.token.cancel();
            }
        }
        if !ids.is_empty() {
            log::debug!("Cancelled {} result jobs for {consumer}", ids.len());
        }
        ids.len()
    }

    pub fn is_active(&self, id: &JobId) -> bool {
        lock(&self.jobs).contains_key(id)
    }

    pub fn len(&self) -> usize {
        lock(&self.jobs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ResultJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultJobs")
            .field("active", &self.len())
            .finish()
    }
}

struct ObserveJob {
    id: JobId,
    generation: u64,
    token: CancellationToken,
    bus: ResultBus,
    jobs: JobMap,
}

async fn observe<T, F>(job: ObserveJob, previous: Option<ResultJob>, on_result: F)
where
    T: DeserializeOwned + Send + 'static,
    F: FnOnce(T) + Send + 'static,
{
    if let Some(previous) = previous {
        previous.cancel_and_wait().await;
    }

    let mut results = job.bus.subscribe_as::<T>(job.id.key(), true);
    loop {
        tokio::select! {
            biased;

            _ = job.token.cancelled() => {
                log::debug!("Result job {} cancelled", job.id);
                break;
            }

            next = results.next() => match next {
                Some(Some(value)) => {
                    log::debug!("Result job {} received its result", job.id);
                    on_result(value);
                    break;
                }
                Some(None) => continue,
                None => break,
            }
        }
    }

    let mut jobs = lock(&job.jobs);
    if jobs
        .get(&job.id)
        .is_some_and(|current| current.generation == job.generation)
    {
        jobs.remove(&job.id);
    }
}
