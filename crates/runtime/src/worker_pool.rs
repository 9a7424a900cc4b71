//! Background task execution with owning-thread completions.
//!
//! Tasks run on worker threads and never touch owning-thread state directly.
//! A task may hand back a [`Completion`], which is queued and only executed
//! when the owning thread calls [`CompletionSpawner::run_completions`] with
//! its context.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, warn};

/// Fire-and-forget work item.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Work that runs on the owning thread after its task returned.
pub type Completion<C> = Box<dyn FnOnce(&mut C) + Send + 'static>;

/// Work item that produces an owning-thread completion.
pub type CompletingTask<C> = Box<dyn FnOnce() -> Completion<C> + Send + 'static>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Blocks on file or network I/O; runs on the dedicated blocking threads.
    Blocking,
    /// Short CPU-only work.
    Light,
}

pub trait TaskSpawner: Send + Sync {
    fn spawn(&self, kind: TaskKind, task: Task);
}

pub trait CompletionSpawner<C>: TaskSpawner {
    fn spawn_with_completion(&self, kind: TaskKind, task: CompletingTask<C>);

    /// Runs every queued completion against `ctx`. Must only be called from
    /// the owning thread. Returns the number of completions executed.
    fn run_completions(&self, ctx: &mut C) -> usize;
}

/// Convenience wrapper: run `task` on a worker, then feed its output to
/// `completion` on the owning thread.
pub fn submit_with_completion<C, T, F, G>(
    spawner: &dyn CompletionSpawner<C>,
    kind: TaskKind,
    task: F,
    completion: G,
) where
    C: 'static,
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
    G: FnOnce(T, &mut C) + Send + 'static,
{
    spawner.spawn_with_completion(
        kind,
        Box::new(move || {
            let output = task();
            Box::new(move |ctx: &mut C| completion(output, ctx)) as Completion<C>
        }),
    );
}

/// Shared tokio runtime backing one or more [`WorkerPool`]s.
#[derive(Clone)]
pub struct WorkerRuntime {
    runtime: Arc<Runtime>,
}

impl WorkerRuntime {
    pub fn new(worker_threads: usize) -> std::io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(worker_threads.max(1))
            .thread_name("scene-worker")
            .enable_time()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    /// A pool whose completions receive `&mut C`.
    pub fn pool<C: 'static>(&self) -> WorkerPool<C> {
        let (tx, rx) = unbounded_channel();
        WorkerPool {
            runtime: self.runtime.clone(),
            completions_tx: tx,
            completions_rx: Mutex::new(rx),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }
}

pub struct WorkerPool<C> {
    runtime: Arc<Runtime>,
    completions_tx: UnboundedSender<Completion<C>>,
    completions_rx: Mutex<UnboundedReceiver<Completion<C>>>,
    in_flight: Arc<AtomicUsize>,
}

impl<C: 'static> WorkerPool<C> {
    /// Tasks submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Blocks the caller until no task is in flight or `timeout` expires.
    /// Returns `true` when the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                warn!(in_flight = self.in_flight(), "worker pool did not go idle");
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }

    fn dispatch(&self, kind: TaskKind, task: Task) {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let in_flight = self.in_flight.clone();
        let run = move || {
            task();
            in_flight.fetch_sub(1, Ordering::AcqRel);
        };
        match kind {
            TaskKind::Blocking => {
                self.runtime.spawn_blocking(run);
            }
            TaskKind::Light => {
                self.runtime.spawn(async move { run() });
            }
        }
    }
}

impl<C: 'static> TaskSpawner for WorkerPool<C> {
    fn spawn(&self, kind: TaskKind, task: Task) {
        self.dispatch(kind, task);
    }
}

impl<C: 'static> CompletionSpawner<C> for WorkerPool<C> {
    fn spawn_with_completion(&self, kind: TaskKind, task: CompletingTask<C>) {
        let tx = self.completions_tx.clone();
        self.dispatch(
            kind,
            Box::new(move || {
                let completion = task();
                if tx.send(completion).is_err() {
                    debug!("completion dropped: pool closed");
                }
            }),
        );
    }

    fn run_completions(&self, ctx: &mut C) -> usize {
        let mut rx = self.completions_rx.lock();
        let mut ran = 0;
        while let Ok(completion) = rx.try_recv() {
            completion(ctx);
            ran += 1;
        }
        ran
    }
}
