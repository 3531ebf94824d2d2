//! Background crawl worker.
//!
//! One tokio task consumes [`CrawlJob`]s from a bounded queue. Each job
//! crawls the subscriptions of a category (or a single feed in it) and merges
//! the results into the store as they arrive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::{Result, TributaryError};
use crate::domain::CategoryPath;
use crate::fetcher::{CrawlFailure, CrawlTarget, Crawler};
use crate::store::Store;

const QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum CrawlJob {
    /// Crawl every subscription below `category`, or only `feed_id`
    Crawl {
        category: CategoryPath,
        feed_id: Option<String>,
    },
    /// Stop the worker once the jobs queued before this one are done
    Terminate,
}

type FailureMap = Arc<Mutex<HashMap<String, CrawlFailure>>>;

fn lock_failures(failures: &FailureMap) -> MutexGuard<'_, HashMap<String, CrawlFailure>> {
    failures.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to send jobs to the background crawl worker
#[derive(Clone)]
pub struct CrawlWorkerHandle {
    tx: mpsc::Sender<CrawlJob>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    failures: FailureMap,
}

impl CrawlWorkerHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub async fn enqueue(&self, category: CategoryPath, feed_id: Option<String>) -> Result<()> {
        if !self.is_running() {
            return Err(TributaryError::WorkerNotRunning);
        }
        self.tx
            .send(CrawlJob::Crawl { category, feed_id })
            .await
            .map_err(|_| TributaryError::WorkerNotRunning)
    }

    /// Stop the worker as soon as possible. Queued jobs are dropped and a
    /// crawl in progress is abandoned; entries it already stored stay.
    pub fn terminate(&self) {
        self.shutdown.notify_one();
    }

    /// Stop the worker once every job queued so far is done.
    pub async fn finish(&self) {
        if let Err(e) = self.tx.send(CrawlJob::Terminate).await {
            warn!("Failed to stop crawl worker: {}", e);
        }
    }

    /// Most recent failure for each of `feed_ids` whose last crawl failed.
    pub fn failures_for<'a, I>(&self, feed_ids: I) -> Vec<CrawlFailure>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let failures = lock_failures(&self.failures);
        feed_ids
            .into_iter()
            .filter_map(|id| failures.get(id).cloned())
            .collect()
    }
}

pub struct CrawlWorker<S: Store + Send + Sync + 'static> {
    store: Arc<S>,
    crawler: Crawler,
    rx: mpsc::Receiver<CrawlJob>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    failures: FailureMap,
}

impl<S: Store + Send + Sync + 'static> CrawlWorker<S> {
    /// Create a new worker and return a handle to communicate with it
    pub fn new(store: Arc<S>, crawler: Crawler) -> (Self, CrawlWorkerHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let running = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(Notify::new());
        let failures = FailureMap::default();
        let handle = CrawlWorkerHandle {
            tx,
            running: running.clone(),
            shutdown: shutdown.clone(),
            failures: failures.clone(),
        };
        let worker = Self {
            store,
            crawler,
            rx,
            running,
            shutdown,
            failures,
        };
        (worker, handle)
    }

    pub async fn run(mut self) {
        self.running.store(true, Ordering::SeqCst);
        info!("Crawl worker started");

        loop {
            let job = tokio::select! {
                biased;
                _ = self.shutdown.notified() => {
                    info!("Crawl worker terminated");
                    break;
                }
                job = self.rx.recv() => job,
            };

            match job {
                Some(CrawlJob::Crawl { category, feed_id }) => {
                    let result = tokio::select! {
                        biased;
                        _ = self.shutdown.notified() => {
                            info!("Crawl worker terminated during a crawl of '{}'", category);
                            break;
                        }
                        result = self.crawl(&category, feed_id.as_deref()) => result,
                    };
                    if let Err(e) = result {
                        error!("Crawl job for '{}' failed: {}", category, e);
                    }
                }
                Some(CrawlJob::Terminate) => {
                    info!("Crawl worker shutting down");
                    break;
                }
                None => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
        self.rx.close();
    }

    async fn crawl(&self, category: &CategoryPath, feed_id: Option<&str>) -> Result<()> {
        let targets = self.targets(category, feed_id)?;
        if targets.is_empty() {
            return Ok(());
        }

        info!("Crawling {} feeds in '{}'", targets.len(), category);
        let report = self.crawler.crawl_into(self.store.as_ref(), targets).await;

        let mut failures = lock_failures(&self.failures);
        for id in &report.succeeded {
            failures.remove(id);
        }
        for failure in &report.failed {
            failures.insert(failure.feed_id.clone(), failure.clone());
        }

        info!(
            "Crawl of '{}' finished: {} new entries, {} failures",
            category,
            report.new_entries,
            report.failed.len()
        );
        Ok(())
    }

    fn targets(&self, category: &CategoryPath, feed_id: Option<&str>) -> Result<Vec<CrawlTarget>> {
        let list = self.store.get_subscriptions()?;
        list.category(category)?
            .recursive_subscriptions()
            .into_iter()
            .filter(|s| feed_id.is_none_or(|id| s.feed_id == id))
            .map(|s| CrawlTarget::with_hints(self.store.as_ref(), &s.feed_uri))
            .collect()
    }
}

/// Spawn the crawl worker as a tokio task
pub fn spawn_crawl_worker<S: Store + Send + Sync + 'static>(
    store: Arc<S>,
    crawler: Crawler,
) -> (CrawlWorkerHandle, JoinHandle<()>) {
    let (worker, handle) = CrawlWorker::new(store, crawler);
    // Accept jobs before the task is first polled
    handle.running.store(true, Ordering::SeqCst);

    let task = tokio::spawn(async move {
        worker.run().await;
    });

    (handle, task)
}
