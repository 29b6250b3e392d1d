//! Connection worker threads.
use std::{
    io,
    net::{Shutdown, TcpStream},
    thread,
};

use log::{debug, warn};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// One thread per open connection.
///
/// Finished workers are reaped whenever a new one is spawned. On shutdown the
/// socket of every remaining worker is closed so its blocked read returns, and
/// the thread is joined; a store operation already in progress runs to
/// completion first.
#[derive(Debug, Default)]
pub struct Workers {
    workers: Vec<Worker>,
    next_id: usize,
}

impl Workers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on a new thread. `control` is a handle to the socket the
    /// thread serves and is used to close it on shutdown.
    pub fn spawn<F>(&mut self, control: TcpStream, f: F) -> io::Result<usize>
    where
        F: FnOnce() + Send + 'static,
    {
        self.reap();

        let id = self.next_id;
        self.next_id += 1;

        let job: Job = Box::new(f);
        let thread = thread::Builder::new()
            .name(format!("sqlgate-conn-{id}"))
            .spawn(job)?;

        self.workers.push(Worker {
            id,
            control,
            thread,
        });
        Ok(id)
    }

    /// Number of workers still tracked, including ones that may have just
    /// finished.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Join every worker whose thread has already returned.
    pub fn reap(&mut self) {
        let (finished, running): (Vec<_>, Vec<_>) = self
            .workers
            .drain(..)
            .partition(|w| w.thread.is_finished());
        self.workers = running;

        for worker in finished {
            worker.join();
        }
    }

    /// Close every open connection and wait for its worker to exit.
    pub fn shutdown(&mut self) {
        for worker in self.workers.drain(..) {
            debug!("shutting down worker {}", worker.id);

            if let Err(e) = worker.control.shutdown(Shutdown::Both) {
                debug!("worker {} socket already closed: {e}", worker.id);
            }
            worker.join();
        }
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[derive(Debug)]
struct Worker {
    id: usize,
    control: TcpStream,
    thread: thread::JoinHandle<()>,
}

impl Worker {
    fn join(self) {
        if self.thread.join().is_err() {
            warn!("worker {} panicked", self.id);
        }
    }
}
