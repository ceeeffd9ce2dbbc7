//! Background task dispatch with single-consumer delivery.
//!
//! `produce` closures run on a bounded rayon pool. Their results wait in a
//! completion queue until the owning thread calls `drain`, which is the only
//! place `consume` closures ever run. Each drain processes the completions
//! present when it started; anything finishing mid-drain waits for the next.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TerrainError;

/// Fraction of detected CPUs to use for worker threads (numerator).
const THREAD_CPU_NUMERATOR: usize = 3;
/// Fraction of detected CPUs to use for worker threads (denominator).
const THREAD_CPU_DENOMINATOR: usize = 4;
/// Minimum number of worker threads.
const MIN_WORKER_THREADS: usize = 2;

/// A finished task with its result already bound to the consumer.
type Completion<C> = Box<dyn FnOnce(&mut C) + Send>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatcherStats {
    pub submitted: usize,
    pub delivered: usize,
    /// Tasks whose producer panicked; their consumers never run
    pub failed: usize,
}

struct Inner<C> {
    pool: rayon::ThreadPool,
    thread_count: usize,
    completed: Mutex<VecDeque<Completion<C>>>,
    submitted: AtomicUsize,
    delivered: AtomicUsize,
    failed: AtomicUsize,
}

/// Cloneable handle; all clones share one pool and one completion queue.
/// `C` is the context handed to consumers when the owner drains.
pub struct TaskDispatcher<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for TaskDispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: 'static> TaskDispatcher<C> {
    /// Start a dispatcher with `num_threads` workers, or 3/4 of the CPUs when 0.
    pub fn new(num_threads: usize) -> Result<Self, TerrainError> {
        let thread_count = if num_threads == 0 {
            ((num_cpus::get() * THREAD_CPU_NUMERATOR) / THREAD_CPU_DENOMINATOR)
                .max(MIN_WORKER_THREADS)
        } else {
            num_threads
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(thread_count)
            .thread_name(|i| format!("terrain-worker-{i}"))
            .build()?;

        log::debug!("Task dispatcher started with {thread_count} worker threads");

        Ok(Self {
            inner: Arc::new(Inner {
                pool,
                thread_count,
                completed: Mutex::new(VecDeque::new()),
                submitted: AtomicUsize::new(0),
                delivered: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
            }),
        })
    }

    /// Run `produce` on a worker; queue `consume` for the next drain.
    pub fn submit<T, P, F>(&self, produce: P, consume: F)
    where
        T: Send + 'static,
        P: FnOnce() -> T + Send + 'static,
        F: FnOnce(T, &mut C) + Send + 'static,
    {
        self.inner.submitted.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(&self.inner);

        self.inner
            .pool
            .spawn(move || match panic::catch_unwind(AssertUnwindSafe(produce)) {
                Ok(result) => {
                    let completion: Completion<C> = Box::new(move |ctx: &mut C| consume(result, ctx));
                    lock_queue(&inner.completed).push_back(completion);
                }
                Err(payload) => {
                    inner.failed.fetch_add(1, Ordering::Relaxed);
                    log::warn!(
                        "Generation task failed, result dropped: {}",
                        panic_message(payload.as_ref())
                    );
                }
            });
    }

    /// Run the consumers of every completion queued when the drain starts.
    /// Returns how many ran.
    pub fn drain(&self, ctx: &mut C) -> usize {
        let pending = lock_queue(&self.inner.completed).len();

        let mut ran = 0;
        while ran < pending {
            // Lock released before the consumer runs so workers can keep enqueuing.
            let Some(completion) = lock_queue(&self.inner.completed).pop_front() else {
                break;
            };
            completion(ctx);
            ran += 1;
        }

        self.inner.delivered.fetch_add(ran, Ordering::Relaxed);
        ran
    }

    /// Completions waiting for the next drain
    pub fn pending_completions(&self) -> usize {
        lock_queue(&self.inner.completed).len()
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    pub fn thread_count(&self) -> usize {
        self.inner.thread_count
    }
}

fn lock_queue<T>(queue: &Mutex<T>) -> MutexGuard<'_, T> {
    queue.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
