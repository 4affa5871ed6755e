//! Bounded-concurrency fetch dispatch.
//!
//! A dispatch call runs a fixed number of workers over one shared task list.
//! Each worker pops a task, fetches it with [`retry::send_json`], and pushes
//! the parsed body into one shared outbox until the list is empty. The call
//! returns once every worker has finished.
//!
//! Results come back in no particular order. If any task exhausts its
//! retries the whole call fails and the remaining workers are dropped.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::try_join_all;
use serde_json::Value;

use crate::ApiError;
use crate::progress::ProgressCallback;
use crate::retry;

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 5;

/// One GET request: a URL and its query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl FetchTask {
    /// A task with no query parameters.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            params: Vec::new(),
        }
    }

    /// Last path segment of the URL: the table or schema being fetched.
    #[must_use]
    pub fn label(&self) -> &str {
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(self.url.as_str())
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Runs fetch tasks on a bounded worker pool.
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    workers: usize,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl Dispatcher {
    /// Creates a dispatcher with `workers` concurrent workers (at least one).
    #[must_use]
    pub fn new(client: reqwest::Client, workers: usize) -> Self {
        Self {
            client,
            workers: workers.max(1),
            progress: None,
        }
    }

    /// Reports the resource being fetched and one increment per completed
    /// task to `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Fetches every task and returns the parsed bodies in arbitrary order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::FetchExhausted`] for the first task that fails
    /// [`retry::MAX_ATTEMPTS`] times. Outstanding work is abandoned.
    pub async fn dispatch(&self, tasks: Vec<FetchTask>) -> Result<Vec<Value>, ApiError> {
        let total = tasks.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        if let Some(progress) = &self.progress {
            progress.set_total(total as u64);
        }

        let workers = self.workers.min(total);
        log::debug!("Dispatching {total} request(s) across {workers} worker(s)");

        let queue = Mutex::new(tasks);
        let outbox = Mutex::new(Vec::with_capacity(total));

        let result = try_join_all((0..workers).map(|_| self.worker(&queue, &outbox))).await;

        if let Some(progress) = &self.progress {
            progress.finish_and_clear();
        }
        result?;

        Ok(outbox.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    async fn worker(
        &self,
        queue: &Mutex<Vec<FetchTask>>,
        outbox: &Mutex<Vec<Value>>,
    ) -> Result<(), ApiError> {
        loop {
            let next = queue.lock().unwrap_or_else(PoisonError::into_inner).pop();
            let Some(task) = next else {
                return Ok(());
            };

            if let Some(progress) = &self.progress {
                progress.set_message(task.label().to_string());
            }

            let value = retry::send_json(&self.client, &task).await?;
            outbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(value);

            if let Some(progress) = &self.progress {
                progress.inc(1);
            }
        }
    }
}
