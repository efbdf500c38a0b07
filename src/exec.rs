//! Single-worker task queues.
//!
//! Sequencing in this crate comes from dedicated worker threads draining
//! plain `std::sync::mpsc` channels, not from an executor framework. A
//! [`TaskQueue`] runs everything handed to it on one named thread in
//! submission order, so any state confined to that queue needs no locks.
//!
//! A panicking task is caught and logged; the worker keeps draining.
//! Dropping the queue closes the channel, lets the worker finish what is
//! already enqueued, and joins it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use crate::error::ExecError;

/// Result type for task queue operations.
pub type ExecResult<T> = std::result::Result<T, ExecError>;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// FIFO executor backed by one named worker thread.
pub struct TaskQueue {
    name: String,
    tasks: Option<mpsc::Sender<Task>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl TaskQueue {
    /// Spawn the worker thread. `name` becomes the thread name and shows
    /// up in logs and panic messages.
    pub fn single_worker(name: &str) -> ExecResult<Self> {
        let (tasks, task_rx) = mpsc::channel::<Task>();
        let thread_name = name.to_string();
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(&thread_name, task_rx))
            .map_err(|e| ExecError::Spawn {
                name: name.to_string(),
                source: e,
            })?;

        Ok(Self {
            name: name.to_string(),
            tasks: Some(tasks),
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a task. Returns once the task is queued, not once it ran;
    /// tasks run strictly in `execute` order.
    pub fn execute(&self, task: impl FnOnce() + Send + 'static) -> ExecResult<()> {
        match &self.tasks {
            Some(sender) => sender
                .send(Box::new(task))
                .map_err(|_| ExecError::QueueShutdown {
                    name: self.name.clone(),
                }),
            None => Err(ExecError::QueueShutdown {
                name: self.name.clone(),
            }),
        }
    }

    /// Block until every task enqueued before this call has finished.
    /// Drain point for shutdown sequencing and tests.
    pub fn flush(&self) -> ExecResult<()> {
        let (done_tx, done_rx) = mpsc::channel();
        self.execute(move || {
            let _ = done_tx.send(());
        })?;
        done_rx.recv().map_err(|_| ExecError::QueueShutdown {
            name: self.name.clone(),
        })
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // Closing the channel stops the worker after the backlog drains.
        self.tasks.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(name: &str, tasks: mpsc::Receiver<Task>) {
    tracing::debug!(queue = name, "task queue worker started");
    while let Ok(task) = tasks.recv() {
        if panic::catch_unwind(AssertUnwindSafe(move || task())).is_err() {
            tracing::error!(queue = name, "task panicked; worker continues");
        }
    }
    tracing::debug!(queue = name, "task queue worker stopped");
}
