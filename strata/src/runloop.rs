// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Message loops for the producer and raster threads.
//!
//! The compositor splits work across threads (produce, raster, platform)
//! that talk by posting closures at each other. [`RunLoop`] is a minimal
//! single-consumer message loop with delayed-task support, [`TaskRunner`]
//! its cloneable posting handle. [`AliveToken`] / [`AliveHandle`] guard
//! cross-thread callbacks against running after their target was torn
//! down.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

type Task = Box<dyn FnOnce() + Send>;

enum Message {
    Task(Task),
    Delayed(Task, Instant),
    Quit,
}

struct DelayedTask {
    deadline: Instant,
    /// Tie-breaker preserving post order among equal deadlines.
    seq: u64,
    task: Task,
}

impl PartialEq for DelayedTask {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for DelayedTask {}

impl PartialOrd for DelayedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DelayedTask {
    // Reversed so the std max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Posts tasks onto a [`RunLoop`], from any thread.
#[derive(Clone)]
pub struct TaskRunner {
    sender: mpsc::Sender<Message>,
}

impl TaskRunner {
    /// Posts `task` for execution on the loop's thread. Returns `false`
    /// if the loop is gone.
    pub fn post_task(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.sender.send(Message::Task(Box::new(task))).is_ok()
    }

    /// Posts `task` to run no earlier than `delay` from now.
    pub fn post_delayed_task(&self, task: impl FnOnce() + Send + 'static, delay: Duration) -> bool {
        self.sender
            .send(Message::Delayed(Box::new(task), Instant::now() + delay))
            .is_ok()
    }

    /// Moves `value` to the loop's thread and drops it there. Used for
    /// values whose destructors must run on a particular thread, e.g. a
    /// layer tree holding backend resources owned by the raster context.
    pub fn defer_drop<T: Send + 'static>(&self, value: T) {
        if !self.post_task(move || drop(value)) {
            // The loop is gone; dropping here is the only option left.
            log::warn!("defer_drop target loop has terminated; dropping on the posting thread");
        }
    }

    /// Asks the loop to exit after the tasks already queued.
    pub fn post_quit(&self) {
        let _ = self.sender.send(Message::Quit);
    }
}

/// A single-threaded message loop with delayed tasks.
pub struct RunLoop {
    receiver: mpsc::Receiver<Message>,
    sender: mpsc::Sender<Message>,
    delayed: BinaryHeap<DelayedTask>,
    next_seq: u64,
    running: bool,
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            receiver,
            sender,
            delayed: BinaryHeap::new(),
            next_seq: 0,
            running: false,
        }
    }

    /// A posting handle for this loop.
    pub fn task_runner(&self) -> TaskRunner {
        TaskRunner {
            sender: self.sender.clone(),
        }
    }

    /// Starts a named thread running a fresh loop, returning its posting
    /// handle and the join handle. The thread exits on
    /// [`TaskRunner::post_quit`].
    pub fn spawn(name: &str) -> std::io::Result<(TaskRunner, thread::JoinHandle<()>)> {
        let (sender, receiver) = mpsc::channel();
        let runner = TaskRunner {
            sender: sender.clone(),
        };
        let handle = thread::Builder::new().name(name.to_owned()).spawn(move || {
            let mut run_loop = Self {
                receiver,
                sender,
                delayed: BinaryHeap::new(),
                next_seq: 0,
                running: false,
            };
            run_loop.run();
        })?;
        Ok((runner, handle))
    }

    /// Runs until [`TaskRunner::post_quit`].
    pub fn run(&mut self) {
        self.running = true;
        while self.running {
            let now = Instant::now();
            self.run_expired_tasks(now);
            if !self.running {
                break;
            }
            let message = match self.delayed.peek() {
                Some(next) => {
                    let timeout = next.deadline.saturating_duration_since(Instant::now());
                    match self.receiver.recv_timeout(timeout) {
                        Ok(message) => Some(message),
                        Err(mpsc::RecvTimeoutError::Timeout) => None,
                        Err(mpsc::RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.receiver.recv() {
                    Ok(message) => Some(message),
                    Err(_) => break,
                },
            };
            if let Some(message) = message {
                self.dispatch(message);
            }
        }
    }

    /// Drains queued messages and runs every delayed task due at `now`.
    /// Drives the loop manually where blocking in [`RunLoop::run`] is not
    /// wanted, e.g. tests or an embedder-owned thread.
    pub fn run_expired_tasks(&mut self, now: Instant) {
        while let Ok(message) = self.receiver.try_recv() {
            self.dispatch(message);
        }
        while let Some(next) = self.delayed.peek() {
            if next.deadline > now {
                break;
            }
            let expired = self.delayed.pop().unwrap();
            (expired.task)();
        }
    }

    fn dispatch(&mut self, message: Message) {
        match message {
            Message::Task(task) => task(),
            Message::Delayed(task, deadline) => {
                self.next_seq += 1;
                self.delayed.push(DelayedTask {
                    deadline,
                    seq: self.next_seq,
                    task,
                });
            }
            Message::Quit => self.running = false,
        }
    }
}

/// Owned by the object callbacks target; dropping it flips every
/// [`AliveHandle`] to dead. A lock-free stand-in for weak references when
/// the target is not behind an `Arc`.
pub struct AliveToken {
    alive: Arc<AtomicBool>,
}

impl Default for AliveToken {
    fn default() -> Self {
        Self::new()
    }
}

impl AliveToken {
    pub fn new() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn handle(&self) -> AliveHandle {
        AliveHandle {
            alive: self.alive.clone(),
        }
    }
}

impl Drop for AliveToken {
    fn drop(&mut self) {
        self.alive.store(false, AtomicOrdering::Release);
    }
}

/// Cheap cloneable witness for an [`AliveToken`].
#[derive(Clone)]
pub struct AliveHandle {
    alive: Arc<AtomicBool>,
}

impl AliveHandle {
    pub fn is_alive(&self) -> bool {
        self.alive.load(AtomicOrdering::Acquire)
    }

    /// Runs `f` only if the token still exists.
    pub fn run_if_alive(&self, f: impl FnOnce()) {
        if self.is_alive() {
            f();
        }
    }
}
