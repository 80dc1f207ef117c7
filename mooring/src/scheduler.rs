//! Named worker pools that components hand work to.
//!
//! Ports own no threads. Anything that must not run on the caller's thread
//! (the async-call server's `execute`, most notably) goes through a
//! [`TaskScheduler`] owned by the component.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::runtime::{Handle, Runtime};

use crate::config::{SchedulerConfig, DEFAULT_POOL};
use crate::error::SchedulerError;

/// A boxed unit of work.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Spawns tasks on named worker pools.
pub trait TaskScheduler: Send + Sync + fmt::Debug {
    /// Name of the pool used when no preference applies.
    fn default_pool(&self) -> &str;

    /// Whether a pool named `pool` exists.
    fn has_pool(&self, pool: &str) -> bool;

    /// Spawn `task` on `pool`.
    ///
    /// # Errors
    ///
    /// `SchedulerError::UnknownPool` if the pool does not exist.
    fn spawn_task(&self, pool: &str, name: &str, task: Task) -> Result<(), SchedulerError>;

    /// Pick `preferred` if this scheduler has it, otherwise the default pool.
    fn select_pool<'a>(&'a self, preferred: Option<&'a str>) -> &'a str {
        match preferred {
            Some(pool) if self.has_pool(pool) => pool,
            _ => self.default_pool(),
        }
    }
}

struct WorkerPool {
    handle: Handle,
    owned: Option<Runtime>,
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.owned.take() {
            runtime.shutdown_background();
        }
    }
}

/// [`TaskScheduler`] over Tokio runtimes.
///
/// Pools either borrow an existing runtime through its [`Handle`] or own a
/// multi-thread runtime built from a [`SchedulerConfig`]. Owned runtimes
/// shut down in the background when the scheduler is dropped.
///
/// A task that panics is reported at `error` level; the panic does not
/// reach the spawner.
pub struct TokioScheduler {
    default_pool: String,
    pools: HashMap<String, WorkerPool>,
}

impl TokioScheduler {
    /// A scheduler whose default pool is the given runtime.
    pub fn from_handle(handle: Handle) -> Self {
        let mut pools = HashMap::new();
        pools.insert(
            DEFAULT_POOL.to_string(),
            WorkerPool {
                handle,
                owned: None,
            },
        );
        Self {
            default_pool: DEFAULT_POOL.to_string(),
            pools,
        }
    }

    /// A scheduler whose default pool is the runtime of the calling thread.
    ///
    /// # Errors
    ///
    /// `SchedulerError::NoRuntime` outside a Tokio runtime.
    pub fn current() -> Result<Self, SchedulerError> {
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;
        Ok(Self::from_handle(handle))
    }

    /// A scheduler owning one multi-thread runtime per configured pool.
    ///
    /// # Errors
    ///
    /// `SchedulerError::Build` if a runtime cannot be started.
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, SchedulerError> {
        let mut pools = HashMap::new();
        for pool in config.pools() {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(pool.worker_threads)
                .thread_name(format!("mooring-{}", pool.name))
                .enable_time()
                .build()
                .map_err(|e| SchedulerError::Build {
                    name: pool.name.clone(),
                    message: e.to_string(),
                })?;
            tracing::debug!(
                pool = %pool.name,
                workers = pool.worker_threads,
                "worker pool started"
            );
            pools.insert(
                pool.name.clone(),
                WorkerPool {
                    handle: runtime.handle().clone(),
                    owned: Some(runtime),
                },
            );
        }
        Ok(Self {
            default_pool: config.default_pool().to_string(),
            pools,
        })
    }

    /// Add or replace a pool backed by an existing runtime.
    pub fn with_pool(mut self, name: impl Into<String>, handle: Handle) -> Self {
        self.pools.insert(
            name.into(),
            WorkerPool {
                handle,
                owned: None,
            },
        );
        self
    }

    /// Names of every pool.
    pub fn pool_names(&self) -> Vec<&str> {
        self.pools.keys().map(String::as_str).collect()
    }
}

impl TaskScheduler for TokioScheduler {
    fn default_pool(&self) -> &str {
        &self.default_pool
    }

    fn has_pool(&self, pool: &str) -> bool {
        self.pools.contains_key(pool)
    }

    fn spawn_task(&self, pool: &str, name: &str, task: Task) -> Result<(), SchedulerError> {
        let worker = self
            .pools
            .get(pool)
            .ok_or_else(|| SchedulerError::UnknownPool {
                name: pool.to_string(),
            })?;

        let task_name = name.to_string();
        let pool_name = pool.to_string();
        let work = worker.handle.spawn(async move { task.await });
        worker.handle.spawn(async move {
            tracing::trace!("Task {} starting on {}", task_name, pool_name);
            match work.await {
                Ok(()) => tracing::trace!("Task {} completed", task_name),
                Err(err) if err.is_panic() => {
                    tracing::error!(task = %task_name, pool = %pool_name, "task panicked")
                }
                Err(_) => tracing::debug!(task = %task_name, pool = %pool_name, "task cancelled"),
            }
        });
        Ok(())
    }
}

impl fmt::Debug for TokioScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioScheduler")
            .field("default_pool", &self.default_pool)
            .field("pools", &self.pool_names())
            .finish()
    }
}
