//! Fixed-size worker pool with priority, delayed and cancelable tasks
//!
//! Workers share one mutex-protected state holding:
//! - a FIFO deque of normal tasks (priority tasks are pushed to its head)
//! - a min-heap of delayed tasks ordered by (due time asc, id desc)
//! - a lookup table from task id to the delayed closure, used for O(1) cancel
//!
//! Cancelling only removes the lookup entry; the heap entry left behind is
//! skipped when it is popped.

use std::cell::Cell;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Id of a delayed task, 0 means "not cancelable"
pub type TaskId = u64;

type Task = Box<dyn FnOnce() + Send + 'static>;

thread_local! {
    // delayed task currently executed by this worker thread
    static CURRENT_TASK: Cell<TaskId> = const { Cell::new(0) };
    // set on pool worker threads
    static IN_WORKER: Cell<bool> = const { Cell::new(false) };
}

/// Outcome of [`ThreadPool::cancel_task`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResult {
    /// Removed before it started, it will never run
    Cancelled,
    /// Unknown id, id 0, or the task already ran
    NotFound,
    /// Currently executing and the caller chose not to wait
    Running,
    /// Was executing, the caller waited for it to finish
    Completed,
}

impl CancelResult {
    pub fn cancelled(self) -> bool {
        matches!(self, CancelResult::Cancelled)
    }

    pub fn is_running(self) -> bool {
        matches!(self, CancelResult::Running)
    }
}

/// Averages since the previous read
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Profile {
    /// Average time between a task becoming runnable and starting, in ms
    pub avg_schedule_ms: f64,
    /// Average task execution time, in ms
    pub avg_task_ms: f64,
    /// Number of tasks executed
    pub count: u64,
}

struct NormalTask {
    enqueued_at: Instant,
    task: Task,
}

struct DelayedTask {
    due: Instant,
    task: Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    due: Instant,
    id: TaskId,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap: earliest due first, then the newest id
        other
            .due
            .cmp(&self.due)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Counters {
    schedule_cost: Duration,
    schedule_count: u64,
    task_cost: Duration,
    task_count: u64,
}

#[derive(Default)]
struct State {
    normal: VecDeque<NormalTask>,
    delayed: BinaryHeap<HeapEntry>,
    lookup: HashMap<TaskId, DelayedTask>,
    running: HashSet<TaskId>,
    last_task_id: TaskId,
    stop: bool,
    counters: Counters,
}

struct Shared {
    state: Mutex<State>,
    /// Signals workers: new work or stop
    work_cv: Condvar,
    /// Signals waiters: a delayed task finished or pending dropped to zero
    done_cv: Condvar,
    pending: AtomicUsize,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Thread pool driving timeouts and background work
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ThreadPool {
    /// Start a pool with `threads` workers (at least one)
    pub fn new(threads: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State::default()),
            work_cv: Condvar::new(),
            done_cv: Condvar::new(),
            pending: AtomicUsize::new(0),
        });

        let workers = (0..threads.max(1))
            .filter_map(|i| {
                let shared = shared.clone();
                thread::Builder::new()
                    .name(format!("orion-worker-{}", i))
                    .spawn(move || worker_loop(shared))
                    .map_err(|e| tracing::error!("Failed to spawn worker {}: {}", i, e))
                    .ok()
            })
            .collect();

        Self {
            shared,
            workers: Mutex::new(workers),
        }
    }

    /// Append a task to the tail of the queue
    pub fn add_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(task), false);
    }

    /// Push a task to the head of the queue
    pub fn add_priority_task<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.enqueue(Box::new(task), true);
    }

    fn enqueue(&self, task: Task, front: bool) {
        let mut state = self.shared.lock();
        if state.stop {
            tracing::warn!("Thread pool stopped, task dropped");
            return;
        }
        let meta = NormalTask {
            enqueued_at: Instant::now(),
            task,
        };
        if front {
            state.normal.push_front(meta);
        } else {
            state.normal.push_back(meta);
        }
        self.shared.pending.fetch_add(1, Ordering::SeqCst);
        drop(state);
        self.shared.work_cv.notify_one();
    }

    /// Run a task after `delay_ms` milliseconds.
    ///
    /// Returns the id to pass to [`cancel_task`](Self::cancel_task), or 0 if
    /// the pool is stopped.
    pub fn delay_task<F>(&self, delay_ms: u64, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock();
        if state.stop {
            tracing::warn!("Thread pool stopped, delayed task dropped");
            return 0;
        }
        state.last_task_id += 1;
        let id = state.last_task_id;
        let due = Instant::now() + Duration::from_millis(delay_ms);
        state.delayed.push(HeapEntry { due, id });
        state.lookup.insert(
            id,
            DelayedTask {
                due,
                task: Box::new(task),
            },
        );
        drop(state);
        self.shared.work_cv.notify_one();
        id
    }

    /// Cancel a delayed task.
    ///
    /// A task that has not started is removed and never runs. A task that is
    /// executing cannot be interrupted: with `block` the call waits until it
    /// finishes and returns [`CancelResult::Completed`], otherwise it returns
    /// [`CancelResult::Running`] immediately. A task cancelling itself always
    /// gets `Running`.
    pub fn cancel_task(&self, id: TaskId, block: bool) -> CancelResult {
        if id == 0 {
            return CancelResult::NotFound;
        }
        let mut state = self.shared.lock();
        if !state.running.contains(&id) {
            return match state.lookup.remove(&id) {
                Some(_) => CancelResult::Cancelled,
                None => CancelResult::NotFound,
            };
        }
        if !block || CURRENT_TASK.with(|c| c.get()) == id {
            return CancelResult::Running;
        }
        while state.running.contains(&id) {
            state = self
                .shared
                .done_cv
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        CancelResult::Completed
    }

    /// Approximate number of queued normal tasks
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Averages since the last call; counters are reset
    pub fn profiling(&self) -> Profile {
        let counters = std::mem::take(&mut self.shared.lock().counters);
        let avg = |cost: Duration, count: u64| {
            if count == 0 {
                0.0
            } else {
                cost.as_secs_f64() * 1000.0 / count as f64
            }
        };
        Profile {
            avg_schedule_ms: avg(counters.schedule_cost, counters.schedule_count),
            avg_task_ms: avg(counters.task_cost, counters.task_count),
            count: counters.task_count,
        }
    }

    /// `"<avg_schedule_ms> <avg_task_ms> <count>"`
    pub fn profiling_str(&self) -> String {
        let p = self.profiling();
        format!("{:.3} {:.3} {}", p.avg_schedule_ms, p.avg_task_ms, p.count)
    }

    /// Stop all workers.
    ///
    /// With `wait`, queued normal tasks are drained first; called from a pool
    /// task, the calling thread runs them itself. Delayed tasks that are not
    /// due yet are abandoned either way.
    pub fn stop(&self, wait: bool) {
        let on_worker = IN_WORKER.with(|w| w.get());
        if wait && on_worker {
            // the calling worker cannot wait for itself, run the queue here
            self.drain_inline();
        }
        let mut state = self.shared.lock();
        if wait && !on_worker {
            while self.shared.pending.load(Ordering::SeqCst) > 0 && !state.stop {
                state = self
                    .shared
                    .done_cv
                    .wait(state)
                    .unwrap_or_else(|e| e.into_inner());
            }
        }
        state.stop = true;
        drop(state);
        self.shared.work_cv.notify_all();

        let current = thread::current().id();
        let handles: Vec<JoinHandle<()>> = self
            .workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::error!("Worker thread exited abnormally");
            }
        }
        tracing::debug!("Thread pool stopped");
    }

    /// Run queued normal tasks on the current thread until the queue is empty
    fn drain_inline(&self) {
        loop {
            let mut state = self.shared.lock();
            if state.stop {
                return;
            }
            let Some(normal) = state.normal.pop_front() else {
                return;
            };
            let start = Instant::now();
            state.counters.schedule_cost += start.duration_since(normal.enqueued_at);
            state.counters.schedule_count += 1;
            if self.shared.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.shared.done_cv.notify_all();
            }
            drop(state);

            run_task(normal.task, 0);
            let cost = start.elapsed();

            let mut state = self.shared.lock();
            state.counters.task_cost += cost;
            state.counters.task_count += 1;
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.lock().stop
    }

    pub fn threads(&self) -> usize {
        self.workers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop(false);
    }
}

fn worker_loop(shared: Arc<Shared>) {
    IN_WORKER.with(|w| w.set(true));
    let mut state = shared.lock();
    loop {
        while state.delayed.is_empty() && state.normal.is_empty() && !state.stop {
            state = shared
                .work_cv
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
        if state.stop {
            break;
        }

        if let Some(top) = state.delayed.peek().copied() {
            let now = Instant::now();
            if top.due <= now {
                state.delayed.pop();
                // cancelled entries are left in the heap as tombstones
                let Some(delayed) = state.lookup.remove(&top.id) else {
                    continue;
                };
                state.counters.schedule_cost += now.duration_since(delayed.due);
                state.counters.schedule_count += 1;
                state.running.insert(top.id);
                drop(state);

                CURRENT_TASK.with(|c| c.set(top.id));
                run_task(delayed.task, top.id);
                CURRENT_TASK.with(|c| c.set(0));
                let cost = now.elapsed();

                state = shared.lock();
                state.running.remove(&top.id);
                state.counters.task_cost += cost;
                state.counters.task_count += 1;
                shared.done_cv.notify_all();
                continue;
            } else if state.normal.is_empty() {
                let timeout = top.due - now;
                state = shared
                    .work_cv
                    .wait_timeout(state, timeout)
                    .map(|(guard, _)| guard)
                    .unwrap_or_else(|e| e.into_inner().0);
                continue;
            }
        }

        if let Some(normal) = state.normal.pop_front() {
            let start = Instant::now();
            state.counters.schedule_cost += start.duration_since(normal.enqueued_at);
            state.counters.schedule_count += 1;
            if shared.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                shared.done_cv.notify_all();
            }
            drop(state);

            run_task(normal.task, 0);
            let cost = start.elapsed();

            state = shared.lock();
            state.counters.task_cost += cost;
            state.counters.task_count += 1;
        }
    }
}

/// Execute a user task; a panic is logged and the worker keeps serving
fn run_task(task: Task, id: TaskId) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(task_id = id, "Task panicked: {}", msg);
    }
}
