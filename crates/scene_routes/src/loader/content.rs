//! Asynchronous content loading.
//!
//! [`ContentLoader`] owns a fixed pool of worker threads fed through a job channel. Workers
//! fetch through a [`ContentProvider`] and post a [`LoadCompletion`] to a second channel that
//! the scene drains at the start of each tick; that drain is the only point where loader
//! results touch node state.
//!
//! Cancellation is cooperative: [`ContentLoader::terminate_current`] flags the
//! [`CancelToken`] of every queued or running job, and providers are expected to check it at
//! each blocking I/O boundary.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::loader::cache::ContentCache;
use crate::node::NodeId;

/// Bytes fetched for one URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Content {
    url: String,
    bytes: Vec<u8>,
}

impl Content {
    pub fn new(url: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            bytes,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The content as UTF-8 text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }
}

/// Shared cancellation flag for one load.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err` once cancelled, for `?` at I/O boundaries.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Content("load cancelled".into()))
        } else {
            Ok(())
        }
    }
}

/// External collaborator performing the actual file or network I/O.
pub trait ContentProvider: Send + Sync {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Content>;
}

/// Reads URLs as paths on the local file system, relative ones against a base directory.
#[derive(Clone, Debug)]
pub struct FileProvider {
    base: PathBuf,
}

impl FileProvider {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        let path = url.strip_prefix("file://").unwrap_or(url);
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        }
    }
}

impl ContentProvider for FileProvider {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Content> {
        cancel.check()?;
        let bytes = std::fs::read(self.resolve(url))?;
        cancel.check()?;
        Ok(Content::new(url, bytes))
    }
}

/// Serves content from memory; handy for tests and embedded scenes.
#[derive(Clone, Debug, Default)]
pub struct MemoryProvider {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(url.into(), bytes.into());
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }
}

impl ContentProvider for MemoryProvider {
    fn fetch(&self, url: &str, cancel: &CancelToken) -> Result<Content> {
        cancel.check()?;
        self.entries
            .get(url)
            .map(|bytes| Content::new(url, bytes.clone()))
            .ok_or_else(|| Error::Content(format!("no content for '{url}'")))
    }
}

pub(crate) struct LoadJob {
    pub(crate) node: NodeId,
    pub(crate) ticket: u64,
    pub(crate) urls: Vec<String>,
    pub(crate) cancel: CancelToken,
}

/// How one load ended.
#[derive(Clone, Debug)]
pub enum LoadOutcome {
    Loaded(Arc<Content>),
    Failed(String),
    Cancelled,
}

/// Result posted by a worker for the scene to pick up.
#[derive(Debug)]
pub struct LoadCompletion {
    pub node: NodeId,
    pub(crate) ticket: u64,
    pub outcome: LoadOutcome,
}

struct Shared {
    provider: Arc<dyn ContentProvider>,
    cache: Arc<ContentCache>,
    /// Jobs submitted whose completion is not posted yet; `idle` fires when it drops to 0.
    in_flight: Mutex<usize>,
    idle: Condvar,
    active: Mutex<HashMap<u64, CancelToken>>,
}

impl Shared {
    fn active(&self) -> MutexGuard<'_, HashMap<u64, CancelToken>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn pending(&self) -> MutexGuard<'_, usize> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn job_started(&self) {
        *self.pending() += 1;
    }

    fn job_finished(&self) {
        let mut pending = self.pending();
        *pending = pending.saturating_sub(1);
        if *pending == 0 {
            self.idle.notify_all();
        }
    }
}

/// Bounded pool of loader threads.
pub struct ContentLoader {
    jobs: Option<Sender<(u64, LoadJob)>>,
    completions: Receiver<LoadCompletion>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
    next_job: AtomicU64,
}

impl ContentLoader {
    /// Spawns `threads` workers fetching through `provider`.
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        threads: usize,
        cache: Arc<ContentCache>,
    ) -> Result<Self> {
        if threads == 0 {
            return Err(Error::InvalidConfig("loader needs at least one thread".into()));
        }
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<(u64, LoadJob)>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            provider,
            cache,
            in_flight: Mutex::new(0),
            idle: Condvar::new(),
            active: Mutex::new(HashMap::new()),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = job_rx.clone();
            let tx = done_tx.clone();
            let shared = shared.clone();
            let handle = std::thread::Builder::new()
                .name(format!("content-loader-{i}"))
                .spawn(move || worker_loop(&shared, &rx, &tx))?;
            workers.push(handle);
        }

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            workers,
            shared,
            next_job: AtomicU64::new(0),
        })
    }

    pub(crate) fn submit(&self, job: LoadJob) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| Error::Content("loader is shut down".into()))?;
        let id = self.next_job.fetch_add(1, Ordering::Relaxed);
        self.shared.active().insert(id, job.cancel.clone());
        self.shared.job_started();
        if jobs.send((id, job)).is_err() {
            self.shared.active().remove(&id);
            self.shared.job_finished();
            return Err(Error::Content("loader workers are gone".into()));
        }
        Ok(())
    }

    /// Jobs queued or running whose completion has not been posted yet.
    pub fn in_flight(&self) -> usize {
        *self.shared.pending()
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    pub fn cache(&self) -> &Arc<ContentCache> {
        &self.shared.cache
    }

    /// Flags every queued or running job as cancelled.
    pub fn terminate_current(&self) -> usize {
        let mut active = self.shared.active();
        for token in active.values() {
            token.cancel();
        }
        let n = active.len();
        active.clear();
        n
    }

    /// Completions posted since the last drain, without blocking.
    pub(crate) fn drain(&self) -> Vec<LoadCompletion> {
        self.completions.try_iter().collect()
    }

    /// Blocks until no job is in flight or `timeout` elapses. Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let pending = self.shared.pending();
        let (pending, _) = self
            .shared
            .idle
            .wait_timeout_while(pending, timeout, |n| *n > 0)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *pending == 0
    }
}

impl Drop for ContentLoader {
    fn drop(&mut self) {
        self.terminate_current();
        self.jobs.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Content loader worker panicked.");
            }
        }
    }
}

fn worker_loop(shared: &Shared, jobs: &Receiver<(u64, LoadJob)>, done: &Sender<LoadCompletion>) {
    while let Ok((id, job)) = jobs.recv() {
        let outcome = run_job(shared, &job);
        shared.active().remove(&id);
        let _ = done.send(LoadCompletion {
            node: job.node,
            ticket: job.ticket,
            outcome,
        });
        shared.job_finished();
    }
}

fn run_job(shared: &Shared, job: &LoadJob) -> LoadOutcome {
    let mut last_error = None;
    for url in &job.urls {
        if job.cancel.is_cancelled() {
            return LoadOutcome::Cancelled;
        }
        if let Some(hit) = shared.cache.get(url) {
            debug!(url = %url, "Content cache hit.");
            return LoadOutcome::Loaded(hit);
        }
        match shared.provider.fetch(url, &job.cancel) {
            Ok(_) if job.cancel.is_cancelled() => return LoadOutcome::Cancelled,
            Ok(content) => {
                let content = Arc::new(content);
                shared.cache.insert(url.clone(), &content);
                return LoadOutcome::Loaded(content);
            }
            Err(_) if job.cancel.is_cancelled() => return LoadOutcome::Cancelled,
            Err(e) => {
                debug!(url = %url, error = %e, "Fetch failed, trying next url.");
                last_error = Some(format!("{url}: {e}"));
            }
        }
    }
    LoadOutcome::Failed(last_error.unwrap_or_else(|| "no url to load".into()))
}
