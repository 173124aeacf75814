//! The pending-task queue.
//!
//! An unbounded FIFO, safe for concurrent enqueue from any thread (CLI
//! reader, HTTP/WS server, startup code). Strict arrival order across all
//! producers; no priorities. The engine's thread is the only consumer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::task::Task;

/// Thread-safe FIFO of pending tasks.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Mutex<VecDeque<Task>>,
    available: Condvar,
}

impl TaskQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a task at the tail.
    pub fn push(&self, task: Task) {
        let mut tasks = self.tasks.lock().expect("task queue poisoned");
        tasks.push_back(task);
        self.available.notify_one();
    }

    /// Pop the head without blocking.
    pub fn try_pop(&self) -> Option<Task> {
        self.tasks.lock().expect("task queue poisoned").pop_front()
    }

    /// Pop the head, waiting up to `timeout` for one to arrive.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Task> {
        let deadline = std::time::Instant::now() + timeout;
        let mut tasks = self.tasks.lock().expect("task queue poisoned");
        loop {
            if let Some(task) = tasks.pop_front() {
                return Some(task);
            }
            let now = std::time::Instant::now();
            if now >= deadline {
                return None;
            }
            let remaining = deadline - now;
            let (guard, _) = self
                .available
                .wait_timeout(tasks, remaining)
                .expect("task queue poisoned");
            tasks = guard;
        }
    }

    /// Wait up to `timeout` for the queue to become non-empty, without
    /// popping. Returns whether a task is pending.
    pub fn wait_nonempty(&self, timeout: Duration) -> bool {
        let tasks = self.tasks.lock().expect("task queue poisoned");
        if !tasks.is_empty() {
            return true;
        }
        let (guard, _) = self
            .available
            .wait_timeout(tasks, timeout)
            .expect("task queue poisoned");
        !guard.is_empty()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().expect("task queue poisoned").len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every pending task without executing it, returning how many
    /// were discarded. Used during shutdown.
    pub fn clear(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("task queue poisoned");
        let drained = tasks.len();
        tasks.clear();
        drained
    }

    /// Wake every thread blocked in [`pop_timeout`](Self::pop_timeout),
    /// e.g. after the stop flag flips.
    pub fn wake_all(&self) {
        self.available.notify_all();
    }
}
