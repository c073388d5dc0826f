//! Single background worker for every pane-mutating side effect.
//!
//! The interactive loop only ever enqueues. When several jobs pile up while
//! the worker is busy, only the most recent one runs; a job that has started
//! always runs to completion.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

type Job<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

enum Message<T> {
    Run(Job<T>),
    Shutdown,
}

#[derive(Debug, Default)]
pub struct WriterStats {
    executed: AtomicU64,
    coalesced: AtomicU64,
}

impl WriterStats {
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn coalesced(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }
}

pub struct SerialWriter<T: Send + 'static> {
    name: String,
    tx: Sender<Message<T>>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<T>>,
    stats: Arc<WriterStats>,
}

impl<T: Send + 'static> SerialWriter<T> {
    /// Moves `context` onto a new named thread. Jobs receive it mutably.
    pub fn spawn(name: &str, context: T) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Message<T>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let stats = Arc::new(WriterStats::default());
        let worker_stats = Arc::clone(&stats);
        let thread_name = name.to_string();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                let context = run_worker(&thread_name, context, rx, &worker_stats);
                let _ = done_tx.send(());
                context
            })?;
        Ok(Self {
            name: name.to_string(),
            tx,
            done_rx,
            handle: Some(handle),
            stats,
        })
    }

    /// Returns false once the worker has exited.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce(&mut T) + Send + 'static,
    {
        self.tx.send(Message::Run(Box::new(job))).is_ok()
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Stops the worker after its in-flight job and returns the context.
    /// `None` if the worker did not finish within `wait` or had panicked.
    pub fn shutdown(mut self, wait: Duration) -> Option<T> {
        let _ = self.tx.send(Message::Shutdown);
        let handle = self.handle.take()?;
        match self.done_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => match handle.join() {
                Ok(context) => Some(context),
                Err(_) => {
                    warn!(event = "writer_join_failed", writer = %self.name);
                    None
                }
            },
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(
                    event = "writer_shutdown_timeout",
                    writer = %self.name,
                    wait_ms = wait.as_millis() as u64
                );
                None
            }
        }
    }
}

fn run_worker<T>(name: &str, mut context: T, rx: Receiver<Message<T>>, stats: &WriterStats) -> T {
    debug!(event = "writer_started", writer = %name);
    'outer: while let Ok(first) = rx.recv() {
        let mut latest = match first {
            Message::Run(job) => job,
            Message::Shutdown => break,
        };
        loop {
            match rx.try_recv() {
                Ok(Message::Run(job)) => {
                    stats.coalesced.fetch_add(1, Ordering::Relaxed);
                    latest = job;
                }
                Ok(Message::Shutdown) => break 'outer,
                Err(_) => break,
            }
        }
        if catch_unwind(AssertUnwindSafe(|| latest(&mut context))).is_err() {
            warn!(event = "writer_job_panicked", writer = %name);
        }
        stats.executed.fetch_add(1, Ordering::Relaxed);
    }
    info!(
        event = "writer_stopped",
        writer = %name,
        executed = stats.executed(),
        coalesced = stats.coalesced()
    );
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn jobs_run_in_order_on_the_worker() {
        let writer = SerialWriter::spawn("test-writer", Vec::<u32>::new()).expect("spawn");
        let (tx, rx) = mpsc::channel();
        writer.submit(|log: &mut Vec<u32>| log.push(1));
        writer.submit(move |log: &mut Vec<u32>| {
            log.push(2);
            tx.send(thread::current().name().map(str::to_string)).ok();
        });
        let name = rx.recv_timeout(Duration::from_secs(5)).expect("job ran");
        assert_eq!(name.as_deref(), Some("test-writer"));
        let log = writer.shutdown(Duration::from_secs(5)).expect("context");
        assert!(log.ends_with(&[2]));
    }

    #[test]
    fn backlog_collapses_to_latest_job() {
        let writer = SerialWriter::spawn("coalesce", Vec::<u32>::new()).expect("spawn");
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        writer.submit(move |log: &mut Vec<u32>| {
            started_tx.send(()).ok();
            gate_rx.recv().ok();
            log.push(1);
        });
        started_rx.recv_timeout(Duration::from_secs(5)).expect("first job started");
        for value in 2..=4 {
            writer.submit(move |log: &mut Vec<u32>| log.push(value));
        }
        gate_tx.send(()).expect("release");

        let deadline = Instant::now() + Duration::from_secs(5);
        while writer.stats().executed() < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(writer.stats().executed(), 2);
        assert_eq!(writer.stats().coalesced(), 2);
        let log = writer.shutdown(Duration::from_secs(5)).expect("context");
        assert_eq!(log, vec![1, 4]);
    }

    #[test]
    fn shutdown_drops_pending_work() {
        let writer = SerialWriter::spawn("shutdown", Vec::<u32>::new())
            .expect("spawn");
        let (started_tx, started_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        writer.submit(move |log: &mut Vec<u32>| {
            started_tx.send(()).ok();
            gate_rx.recv().ok();
            log.push(1);
        });
        started_rx.recv_timeout(Duration::from_secs(5)).expect("started");
        writer.submit(|log: &mut Vec<u32>| log.push(2));
        let sender = writer.tx.clone();
        sender.send(Message::Shutdown).ok();
        writer.submit(|log: &mut Vec<u32>| log.push(3));
        gate_tx.send(()).expect("release");

        let log = writer.shutdown(Duration::from_secs(5)).expect("context");
        assert_eq!(log, vec![1]);
    }

    #[test]
    fn panicking_job_does_not_stop_the_worker() {
        let writer = SerialWriter::spawn("panics", 0u32).expect("spawn");
        writer.submit(|_: &mut u32| panic!("boom"));
        let (tx, rx) = mpsc::channel();
        writer.submit(move |count: &mut u32| {
            *count += 1;
            tx.send(()).ok();
        });
        rx.recv_timeout(Duration::from_secs(5)).expect("second job ran");
        assert_eq!(writer.shutdown(Duration::from_secs(5)), Some(1));
    }
}
