use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::worker_pool::{CompletingTask, Completion, CompletionSpawner, Task, TaskKind, TaskSpawner};

enum Queued<C> {
    Detached(Task),
    Completing(CompletingTask<C>),
}

/// Deterministic pool that only runs work when asked to.
///
/// Key properties:
/// - Tasks run in submission order, on the thread calling [`DeferredPool::run_pending`].
/// - Completions queue up exactly like on [`crate::WorkerPool`] and still need
///   [`CompletionSpawner::run_completions`].
///
/// Useful for single-threaded hosts and for tests that need to observe the
/// state between "scheduled" and "ran".
pub struct DeferredPool<C> {
    queue: Mutex<VecDeque<(TaskKind, Queued<C>)>>,
    completions: Mutex<VecDeque<Completion<C>>>,
}

impl<C> Default for DeferredPool<C> {
    fn default() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            completions: Mutex::new(VecDeque::new()),
        }
    }
}

impl<C: 'static> DeferredPool<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn pending_completions(&self) -> usize {
        self.completions.lock().len()
    }

    /// Runs the oldest queued task. Returns `false` when nothing was queued.
    pub fn run_next(&self) -> bool {
        // Release the queue lock before running: tasks may submit more work.
        let Some((_kind, queued)) = self.queue.lock().pop_front() else {
            return false;
        };
        match queued {
            Queued::Detached(task) => task(),
            Queued::Completing(task) => {
                let completion = task();
                self.completions.lock().push_back(completion);
            }
        }
        true
    }

    /// Runs queued tasks until the queue is empty, including tasks queued by
    /// tasks. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        ran
    }

    /// Removes every queued task without running it.
    pub fn discard_pending(&self) -> usize {
        let mut queue = self.queue.lock();
        let n = queue.len();
        queue.clear();
        n
    }
}

impl<C: 'static> TaskSpawner for DeferredPool<C> {
    fn spawn(&self, kind: TaskKind, task: Task) {
        self.queue.lock().push_back((kind, Queued::Detached(task)));
    }
}

impl<C: 'static> CompletionSpawner<C> for DeferredPool<C> {
    fn spawn_with_completion(&self, kind: TaskKind, task: CompletingTask<C>) {
        self.queue.lock().push_back((kind, Queued::Completing(task)));
    }

    fn run_completions(&self, ctx: &mut C) -> usize {
        let mut ran = 0;
        loop {
            let Some(completion) = self.completions.lock().pop_front() else {
                break;
            };
            completion(ctx);
            ran += 1;
        }
        ran
    }
}
