//! The logical backing of a tensor: a master version and a per-device replica dictionary.

use std::sync::Arc;

use linear_map::LinearMap;
use parking_lot::Mutex;

use super::super::compute_device::{Device, DeviceKey};
use super::super::element::{Element, ElementKind};
use super::super::error::{ErrorKind, Result};
use super::super::hardware::Addressing;
use super::super::memory::DeviceBuffer;
use super::super::platform::Platform;
use super::super::stream::{Event, Stream, StreamCore};

/// The logical backing of a tensor.
///
/// A storage owns one byte replica per device it has been accessed on, keeps them consistent
/// through versioning, and repairs stale replicas lazily on access. Exactly one replica, the
/// master, carries `version == master_version`; every other replica is older or has never been
/// written (`version == -1`). If no master exists the tensor has never been written and any
/// replica is a valid zero initializer.
///
/// Accessors resolve replicas against a stream: migrations are scheduled asynchronously on it,
/// and every mutating access records a write-completion event that later accessors (and the
/// destructor) gate on. The critical section under the access mutex is short; no asynchronous
/// work happens inside it.
pub struct Storage {
    kind: ElementKind,
    count: usize,
    read_only: bool,
    state: Mutex<State>,
}

struct State {
    master: Option<DeviceKey>,
    master_version: i64,
    replicas: LinearMap<DeviceKey, Arc<DeviceBuffer>>,
    completion: Option<Completion>,
    last_access_copied: bool,
    last_access_mutated: bool,
}

struct Completion {
    event: Event,
    stream: Arc<StreamCore>,
}

impl Storage {

    /// Creates a never-written storage for `count` elements of `kind`.
    ///
    /// Replicas materialize lazily, zero-filled, on first access.
    pub fn empty(kind: ElementKind, count: usize) -> Storage {
        Storage {
            kind,
            count,
            read_only: false,
            state: Mutex::new(State {
                master: None,
                master_version: 0,
                replicas: LinearMap::new(),
                completion: None,
                last_access_copied: false,
                last_access_mutated: false,
            }),
        }
    }

    /// Creates a storage initialized with `data` on the host.
    ///
    /// The host replica becomes the master at version 0.
    pub fn with<T: Element>(data: &[T]) -> Result<Storage> {
        Self::initialized(data, false)
    }

    /// Creates a read-only storage initialized with `data` on the host.
    ///
    /// `read_write` on the result fails with `ReadOnlyViolation`.
    pub fn read_only_with<T: Element>(data: &[T]) -> Result<Storage> {
        Self::initialized(data, true)
    }

    fn initialized<T: Element>(data: &[T], read_only: bool) -> Result<Storage> {
        let host = Platform::global().host_device();
        let buffer = host.allocate(data.len() * T::KIND.size())?;

        // The buffer is freshly allocated; nothing else can observe the write.
        unsafe { buffer.as_mut_slice::<T>().copy_from_slice(data) }
        buffer.set_version(0);

        let mut replicas = LinearMap::new();
        replicas.insert(host.key(), buffer);

        Ok(Storage {
            kind: T::KIND,
            count: data.len(),
            read_only,
            state: Mutex::new(State {
                master: Some(host.key()),
                master_version: 0,
                replicas,
                completion: None,
                last_access_copied: false,
                last_access_mutated: false,
            }),
        })
    }

    pub fn element_kind(&self) -> ElementKind {
        self.kind
    }

    /// The number of elements of [`element_kind`](#method.element_kind).
    pub fn count(&self) -> usize {
        self.count
    }

    /// The byte size of every replica.
    pub fn size(&self) -> usize {
        self.count * self.kind.size()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The number of elements when viewed as `kind`, when the scalar kinds agree.
    pub fn capacity_for(&self, kind: ElementKind) -> Option<usize> {
        if kind.scalar() != self.kind.scalar() {
            return None;
        }
        let scalars = self.count * self.kind.components();
        match scalars % kind.components() {
            0 => Some(scalars / kind.components()),
            _ => None,
        }
    }

    // --- introspection (cheap probes for debugging and the consistency tests) ---

    pub fn master_key(&self) -> Option<DeviceKey> {
        self.state.lock().master
    }

    pub fn master_version(&self) -> i64 {
        self.state.lock().master_version
    }

    pub fn replica_version(&self, key: DeviceKey) -> Option<i64> {
        self.state.lock().replicas.get(&key).map(|b| b.version())
    }

    /// Whether the last access scheduled a replica migration (any copy, including staging).
    pub fn last_access_copied(&self) -> bool {
        self.state.lock().last_access_copied
    }

    /// Whether this storage was produced by a copy-on-write detach.
    pub fn last_access_mutated(&self) -> bool {
        self.state.lock().last_access_mutated
    }

    pub(crate) fn mark_mutated(&self) {
        self.state.lock().last_access_mutated = true;
    }

    // --- accessors ---

    /// Resolves a read-only replica on the stream's device, migrating stale bytes first.
    pub fn read(&self, stream: &Stream) -> Result<Arc<DeviceBuffer>> {
        self.access(stream, false, true)
    }

    /// Resolves the writable master replica on the stream's device.
    ///
    /// Waits for the previous write completion, migrates if the local replica is stale, then
    /// promotes it: the master moves here, `master_version` increments by one, and a fresh
    /// write-completion event is recorded on `stream`.
    pub fn read_write(&self, stream: &Stream) -> Result<Arc<DeviceBuffer>> {
        self.access(stream, true, true)
    }

    /// Like [`read_write`](#method.read_write) but skips the migration: the caller promises to
    /// overwrite every element, so stale local bytes don't matter.
    pub fn write_only(&self, stream: &Stream) -> Result<Arc<DeviceBuffer>> {
        self.access(stream, true, false)
    }

    fn access(&self, stream: &Stream, writable: bool, synchronize: bool)
        -> Result<Arc<DeviceBuffer>> {

        if writable && self.read_only {
            return Err(ErrorKind::ReadOnlyViolation.into());
        }

        let device = stream.device().clone();
        let mut state = self.state.lock();
        state.last_access_copied = false;

        Self::gate(&mut state, stream)?;
        let replica = self.fetchsert(&mut state, &device)?;

        if synchronize {
            if let Some(master_key) = state.master {
                if replica.version() != state.master_version {
                    debug_assert_ne!(master_key, device.key());
                    self.migrate(&mut state, &replica, stream)?;
                }
            }
        }

        if writable {
            state.master = Some(device.key());
            state.master_version += 1;
            replica.set_version(state.master_version);

            let event = Event::new();
            stream.record(&event)?;
            state.completion = Some(Completion { event, stream: stream.core().clone() });
        }

        Ok(replica)
    }

    /// Gates on the previous write completion.
    ///
    /// Same stream: FIFO order already covers it. Different stream: re-record the event on the
    /// writer (so the edge covers every kernel it queued up to now) and append a wait to the
    /// accessing stream, so the submitting thread never blocks. A dead writer degrades to a CPU
    /// wait on whatever the event last reported.
    fn gate(state: &mut State, stream: &Stream) -> Result {
        let completion = match state.completion {
            Some(ref completion) => completion,
            _ => return Ok(()),
        };

        if completion.stream.id() == stream.id() {
            return Ok(());
        }

        if !completion.stream.is_closed() && completion.stream.record(&completion.event).is_ok() {
            stream.core().wait_for(&completion.event)
        } else {
            completion.event.wait(stream.device().timeout())
        }
    }

    /// Returns the replica for `device`, lazily creating it.
    ///
    /// Creation allocates a zero-filled region of the storage size, or aliases the master's
    /// region outright when both sides live in the host address space.
    fn fetchsert(&self, state: &mut State, device: &Arc<Device>) -> Result<Arc<DeviceBuffer>> {
        let key = device.key();
        if let Some(buffer) = state.replicas.get(&key) {
            return Ok(buffer.clone());
        }

        let master = state.master.and_then(|k| state.replicas.get(&k)).cloned();
        let buffer = match master {
            Some(ref master)
                if master.device().addressing() == Addressing::Unified
                    && device.addressing() == Addressing::Unified => {
                trace!("storage {:p}: aliasing the host region for {}", self, key);
                Arc::new(DeviceBuffer::alias(device.clone(), master))
            }
            _ => device.allocate(self.size())?,
        };

        state.replicas.insert(key, buffer.clone());
        Ok(buffer)
    }

    /// Brings `target` up to the master version, scheduling asynchronous copies on `stream` and
    /// recording a completion event. The route follows the addressing of both replicas:
    ///
    /// * unified -> unified: no copy, the replica aliases the host region
    /// * unified -> discrete / discrete -> unified: one staged host transfer
    /// * discrete -> discrete, same service: peer copy
    /// * discrete -> discrete, different services: master -> host, then host -> target
    fn migrate(&self, state: &mut State, target: &Arc<DeviceBuffer>, stream: &Stream) -> Result {
        let master_key = state.master.expect("migrations require a master");
        let master = state.replicas.get(&master_key)
            .cloned()
            .expect("the master replica always exists");

        let route = (master.device().addressing(), target.device().addressing());
        match route {
            (Addressing::Unified, Addressing::Unified) => {
                // The replica shares the master's region; versions are all that differ.
                debug_assert!(target.shares_region_with(&master));
                target.set_version(state.master_version);
                return Ok(());
            }
            (Addressing::Discrete, Addressing::Discrete)
                if master.device().service_id() != target.device().service_id() => {

                debug!(
                    "storage {:p}: staging {} -> host -> {} ({} bytes)",
                    self, master.device().key(), target.device().key(), self.size());

                let host = Platform::global().host_device();
                let staging = self.fetchsert(state, &host)?;
                staging.schedule_copy(&master, stream)?;
                target.schedule_copy(&staging, stream)?;
                staging.set_version(state.master_version);
            }
            (Addressing::Discrete, Addressing::Discrete) => {
                debug!(
                    "storage {:p}: peer copy {} -> {} ({} bytes)",
                    self, master.device().key(), target.device().key(), self.size());
                target.copy_from_device(&master, stream)?;
            }
            _ => {
                debug!(
                    "storage {:p}: host transfer {} -> {} ({} bytes)",
                    self, master.device().key(), target.device().key(), self.size());
                target.schedule_copy(&master, stream)?;
            }
        }

        target.set_version(state.master_version);
        state.last_access_copied = true;

        let event = Event::new();
        stream.record(&event)?;
        state.completion = Some(Completion { event, stream: stream.core().clone() });
        Ok(())
    }

    /// Synchronously resolves an up-to-date host replica, staging from a device master when
    /// necessary. This is the blocking host-fetch path; it drains the writer stream first.
    pub fn read_host(&self) -> Result<Arc<DeviceBuffer>> {
        let host = Platform::global().host_device();
        let mut state = self.state.lock();

        if let Some(ref completion) = state.completion {
            // Cover everything the writer queued so far, not just the recorded completion.
            let drained = match completion.stream.is_closed() {
                true => false,
                _ => {
                    let barrier = Event::new();
                    completion.stream.record(&barrier).is_ok()
                        && barrier.wait(completion.stream.device().timeout()).is_ok()
                }
            };
            if !drained {
                completion.event.wait(completion.stream.device().timeout())?;
            }
        }

        let replica = self.fetchsert(&mut state, &host)?;
        state.last_access_copied = false;

        if let Some(master_key) = state.master {
            if replica.version() != state.master_version {
                debug_assert_ne!(master_key, host.key());
                let master = state.replicas.get(&master_key)
                    .cloned()
                    .expect("the master replica always exists");
                debug!(
                    "storage {:p}: synchronous host fetch from {} ({} bytes)",
                    self, master.device().key(), self.size());
                // The writer stream is drained; a direct copy is ordered.
                unsafe { replica.bytes_mut().copy_from_slice(master.bytes()) }
                replica.set_version(state.master_version);
                state.last_access_copied = true;
            }
        }

        Ok(replica)
    }

    /// Detaches a copy of the current contents: a fresh storage whose only replica lives on the
    /// master's device, with the copy scheduled on `stream`. This is the copy-on-write path.
    pub(crate) fn duplicate(&self, stream: &Stream) -> Result<Storage> {
        let duplicate = Storage::empty(self.kind, self.count);

        let mut state = self.state.lock();
        Self::gate(&mut state, stream)?;

        let master = match state.master {
            Some(key) => state.replicas.get(&key).cloned().expect("master replica exists"),
            // Never written: the duplicate starts never-written too.
            _ => return Ok(duplicate),
        };

        {
            let mut fresh = duplicate.state.lock();
            let replica = duplicate.fetchsert(&mut fresh, master.device())?;
            replica.schedule_copy(&master, stream)?;
            replica.set_version(0);
            fresh.master = Some(master.device().key());
            fresh.master_version = 0;

            let event = Event::new();
            stream.record(&event)?;
            fresh.completion = Some(Completion { event, stream: stream.core().clone() });
        }

        Ok(duplicate)
    }
}

impl Drop for Storage {

    /// Queued writes must finish before the replicas are freed.
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(ref completion) = state.completion {
            let timeout = completion.stream.device().timeout();
            if let Err(error) = completion.event.wait(timeout) {
                warn!("storage dropped with an undrained write completion: {}", error);
            }
        }
    }
}

impl std::fmt::Debug for Storage {

    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Storage")
            .field("kind", &self.kind)
            .field("count", &self.count)
            .field("read_only", &self.read_only)
            .field("master", &state.master)
            .field("master_version", &state.master_version)
            .field("replicas", &state.replicas.len())
            .finish()
    }
}
