//! Asynchronous per-device command streams.
//!
//! A stream is a single-producer FIFO of closures executed in submission order on a dedicated
//! worker. Submission never blocks; the only blocking points are explicit event waits and
//! [`block_until_idle`]. Cross-stream ordering is expressed through [`Event`] edges: recording
//! an event on one stream and waiting for it on another establishes happens-before from
//! everything submitted before the record to everything submitted after the wait.
//!
//! A closure that fails poisons the stream: the failure is stored, later submissions are
//! skipped, and the failure resurfaces at the next blocking join or through any event recorded
//! afterwards.
//!
//! [`block_until_idle`]: ./struct.Stream.html#method.block_until_idle
//! [`Event`]: ./struct.Event.html

pub use self::event::Event;

mod event;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;

use super::compute_device::Device;
use super::error::{Error, ErrorKind, Result};

static STREAM_IDS: AtomicUsize = AtomicUsize::new(0);

type Task = Box<dyn FnOnce() -> Result + Send + 'static>;

enum Job {
    Task(Task),
    Signal(Event),
    Wait(Event),
    Shutdown,
}

/// A single-producer FIFO of closures executed on one device.
///
/// Only the creating thread may [`enqueue`] work; event record/wait jobs may be posted across
/// threads during storage access resolution (queue-to-queue signaling). Dropping the stream
/// drains everything already submitted, then joins the worker.
///
/// [`enqueue`]: #method.enqueue
pub struct Stream {
    core: Arc<StreamCore>,
    worker: Option<JoinHandle<()>>,
    creator: ThreadId,
}

pub(crate) struct StreamCore {
    id: usize,
    device: Arc<Device>,
    sender: Sender<Job>,
    closed: AtomicBool,
    synchronous: AtomicBool,
    failure: Mutex<Option<Error>>,
}

impl StreamCore {

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn device(&self) -> &Arc<Device> {
        &self.device
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn failure_kind(&self) -> Option<ErrorKind> {
        self.failure.lock().as_ref().map(|e| e.kind())
    }

    fn failure_error(&self) -> Option<Error> {
        self.failure.lock().as_ref().map(|e| Error::new(e.kind(), e.to_string()))
    }

    fn poison(&self, error: Error) {
        warn!("stream {} poisoned: {}", self.id, error);
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(error);
        }
    }

    fn execute(&self, job: Job) {
        match job {
            Job::Task(task) => {
                if self.failure_kind().is_some() {
                    trace!("stream {} skipping a task (poisoned)", self.id);
                    return;
                }
                if let Err(error) = task() {
                    self.poison(error);
                }
            }
            Job::Signal(event) => {
                match self.failure_kind() {
                    Some(kind) => event.fail(kind),
                    _ => {
                        trace!("stream {} signaling an event", self.id);
                        event.complete()
                    }
                }
            }
            Job::Wait(event) => {
                if self.failure_kind().is_some() {
                    return;
                }
                if let Err(error) = event.wait(self.device.timeout()) {
                    self.poison(error);
                }
            }
            Job::Shutdown => unreachable!(),
        }
    }

    fn submit(&self, job: Job) -> Result {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::StreamPoisoned, "the stream is closed"));
        }
        if self.synchronous.load(Ordering::Relaxed) {
            self.execute(job);
            return Ok(());
        }
        self.sender.send(job)
            .map_err(|_| Error::new(ErrorKind::StreamPoisoned, "the stream worker is gone"))
    }

    /// Resets `event` to pending and appends a signal closure.
    pub(crate) fn record(&self, event: &Event) -> Result {
        if self.is_closed() {
            return Err(Error::new(ErrorKind::StreamPoisoned, "the stream is closed"));
        }
        event.reset();
        let submitted = self.submit(Job::Signal(event.clone()));
        if submitted.is_err() {
            // Never leave a reset event dangling; waiters must not hang on a dead stream.
            event.fail(ErrorKind::StreamPoisoned);
        }
        submitted
    }

    /// Appends a closure that waits for `event` with the device deadline.
    pub(crate) fn wait_for(&self, event: &Event) -> Result {
        self.submit(Job::Wait(event.clone()))
    }
}

fn run(core: Arc<StreamCore>, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        match job {
            Job::Shutdown => break,
            job => core.execute(job),
        }
    }
}

impl Stream {

    pub(crate) fn open(device: Arc<Device>) -> Result<Stream> {
        let (sender, receiver) = unbounded();
        let core = Arc::new(StreamCore {
            id: STREAM_IDS.fetch_add(1, Ordering::Relaxed),
            device,
            sender,
            closed: AtomicBool::new(false),
            synchronous: AtomicBool::new(false),
            failure: Mutex::new(None),
        });

        let worker = {
            let core = core.clone();
            thread::Builder::new()
                .name(format!("xylem-stream-{}", core.id))
                .spawn(move || run(core, receiver))
                .map_err(|e| Error::new(ErrorKind::Other, e))?
        };

        Ok(Stream { core, worker: Some(worker), creator: thread::current().id() })
    }

    pub fn id(&self) -> usize {
        self.core.id
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.core.device
    }

    pub(crate) fn core(&self) -> &Arc<StreamCore> {
        &self.core
    }

    /// Executes submitted closures on the submitting thread instead of the worker.
    ///
    /// FIFO order and poison semantics are unchanged; useful when debugging kernels.
    pub fn set_synchronous(&self, synchronous: bool) {
        self.core.synchronous.store(synchronous, Ordering::Relaxed);
    }

    /// Appends a closure to the FIFO.
    ///
    /// O(1); never blocks. A no-op when the stream is poisoned. Only the creating thread may
    /// submit; a violation is a programming error and is asserted.
    pub fn enqueue<F>(&self, task: F) -> Result
        where F: FnOnce() -> Result + Send + 'static {

        assert_eq!(
            thread::current().id(), self.creator,
            "streams are single-producer: only the creating thread may enqueue");

        if self.core.failure_kind().is_some() {
            return Ok(());
        }

        self.core.submit(Job::Task(Box::new(task)))
    }

    /// Creates an event suitable for recording on this (or any) stream.
    pub fn create_event(&self) -> Event {
        Event::new()
    }

    /// Records `event` on this stream: once every closure submitted so far has executed, the
    /// event signals. Recording resets the event to pending first.
    pub fn record(&self, event: &Event) -> Result {
        self.core.record(event)
    }

    /// Appends a closure that blocks the worker until `event` signals.
    pub fn wait_for(&self, event: &Event) -> Result {
        self.core.wait_for(event)
    }

    /// Establishes a happens-before edge from `other` to `self` without blocking the submitting
    /// thread: records `event` on `other`, then appends a wait-for-`event` closure to `self`.
    pub fn sync_with(&self, other: &Stream, event: &Event) -> Result {
        other.record(event)?;
        self.wait_for(event)
    }

    /// Blocks the caller until the tail of the FIFO has drained.
    ///
    /// Surfaces the stored failure if the stream is (or becomes) poisoned, and `TimedOut` when
    /// the device deadline passes first.
    pub fn block_until_idle(&self) -> Result {
        let event = Event::new();
        self.core.record(&event)?;
        let waited = event.wait(self.core.device.timeout());

        match self.core.failure_error() {
            Some(error) => Err(error),
            _ => waited,
        }
    }

    /// Submits a closure that fails, for exercising fault paths.
    pub fn inject_failure(&self) -> Result {
        self.enqueue(|| Err(Error::new(ErrorKind::Other, "injected failure")))
    }

    /// The kind of the failure that poisoned this stream, if any.
    pub fn last_error_kind(&self) -> Option<ErrorKind> {
        self.core.failure_kind()
    }
}

impl Drop for Stream {

    fn drop(&mut self) {
        self.core.closed.store(true, Ordering::Release);
        let _ = self.core.sender.send(Job::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for Stream {

    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Stream({} on {})", self.core.id, self.core.device.key())
    }
}
