//! Single-threaded message loop with delayed delivery.
//!
//! Each [`Worker`] owns a handler and a named thread. Commands arrive over a
//! crossbeam channel; delayed messages are kept on the worker thread ordered
//! by due time (ties keep submission order).

use crate::logging::Logger;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::mem::Discriminant;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Processes messages on the worker thread.
pub trait Handler<M>: Send + 'static {
    fn handle(&mut self, message: M);
}

enum Command<M> {
    Message(M),
    Delayed(M, Instant),
    Remove(Discriminant<M>),
    RemoveAll,
    Quit,
}

struct Pending<M> {
    due: Instant,
    seq: u64,
    message: M,
}

/// Cloneable sender side of a worker.
pub struct WorkerHandle<M> {
    sender: Sender<Command<M>>,
}

impl<M> Clone for WorkerHandle<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<M: Send + 'static> WorkerHandle<M> {
    /// Queue a message for immediate handling. Returns false once the worker is gone.
    pub fn send(&self, message: M) -> bool {
        self.sender.send(Command::Message(message)).is_ok()
    }

    pub fn send_delayed(&self, message: M, delay: Duration) -> bool {
        if delay.is_zero() {
            return self.send(message);
        }
        self.sender
            .send(Command::Delayed(message, Instant::now() + delay))
            .is_ok()
    }

    /// Drop pending delayed messages of the same variant as `like`.
    pub fn remove_messages(&self, like: &M) {
        let _ = self
            .sender
            .send(Command::Remove(std::mem::discriminant(like)));
    }

    /// Drop every pending delayed message.
    pub fn remove_all(&self) {
        let _ = self.sender.send(Command::RemoveAll);
    }

    /// Handle already-queued immediate messages, then stop.
    pub fn quit(&self) {
        let _ = self.sender.send(Command::Quit);
    }
}

/// A named thread running a [`Handler`].
pub struct Worker<M: Send + 'static> {
    name: String,
    handle: WorkerHandle<M>,
    thread: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> Worker<M> {
    /// Spawn a worker. `make_handler` receives a handle the handler can use
    /// to post messages to itself.
    pub fn spawn<H, F>(name: &str, logger: Logger, make_handler: F) -> std::io::Result<Self>
    where
        H: Handler<M>,
        F: FnOnce(WorkerHandle<M>) -> H,
    {
        let (sender, receiver) = unbounded();
        let handle = WorkerHandle { sender };
        let handler = make_handler(handle.clone());
        let thread_name = name.to_string();

        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_loop(thread_name, receiver, handler, logger))?;

        Ok(Self {
            name: name.to_string(),
            handle,
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> &WorkerHandle<M> {
        &self.handle
    }

    pub fn send(&self, message: M) -> bool {
        self.handle.send(message)
    }

    /// Stop after already-queued messages and wait for the thread.
    pub fn quit_safely(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.quit();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

impl<M: Send + 'static> Drop for Worker<M> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_loop<M, H>(name: String, receiver: Receiver<Command<M>>, mut handler: H, logger: Logger)
where
    M: Send + 'static,
    H: Handler<M>,
{
    let logger = logger.for_component("Worker");
    let mut delayed: Vec<Pending<M>> = Vec::new();
    let mut seq: u64 = 0;

    let dispatch = |handler: &mut H, message: M| {
        if panic::catch_unwind(AssertUnwindSafe(|| handler.handle(message))).is_err() {
            logger.error("run_loop", format_args!("Handler panicked, thread = {name}"));
        }
    };

    loop {
        let now = Instant::now();
        while delayed.first().map_or(false, |p| p.due <= now) {
            let pending = delayed.remove(0);
            dispatch(&mut handler, pending.message);
        }

        let command = match delayed.first() {
            Some(next) => {
                match receiver.recv_timeout(next.due.saturating_duration_since(Instant::now())) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match receiver.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            Command::Message(message) => dispatch(&mut handler, message),
            Command::Delayed(message, due) => {
                seq += 1;
                let index = delayed.partition_point(|p| (p.due, p.seq) <= (due, seq));
                delayed.insert(index, Pending { due, seq, message });
            }
            Command::Remove(kind) => {
                delayed.retain(|p| std::mem::discriminant(&p.message) != kind);
            }
            Command::RemoveAll => delayed.clear(),
            Command::Quit => {
                while let Ok(command) = receiver.try_recv() {
                    if let Command::Message(message) = command {
                        dispatch(&mut handler, message);
                    }
                }
                break;
            }
        }
    }
}
