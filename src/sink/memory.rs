//! In-memory [`Sink`] for embedding and tests.

use std::{
    collections::BTreeMap,
    io,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;

use super::{DumpIdentity, MAX_NAME_ATTEMPTS, Sink};

#[derive(Debug, Default)]
struct MemoryOutput {
    data: Vec<u8>,
    closed: bool,
}

#[derive(Debug, Default)]
struct MemoryStore {
    outputs: BTreeMap<String, MemoryOutput>,
    capacity: Option<usize>,
}

/// Keeps every dump in memory, keyed by output name.
///
/// Clones share the same store, so a test can hand one clone to a server and
/// inspect the results through another.
///
/// # Examples
///
/// ```
/// use coredump_recv::sink::MemorySink;
///
/// let sink = MemorySink::new();
/// assert!(sink.names().is_empty());
/// ```
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    store: Arc<Mutex<MemoryStore>>,
}

/// Handle naming one in-memory output.
#[derive(Debug)]
pub struct MemoryHandle {
    name: String,
}

impl MemoryHandle {
    /// Output name this handle writes to.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }
}

impl MemorySink {
    /// Create an empty sink without a size limit.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Create a sink whose appends fail once an output would exceed `bytes`.
    #[must_use]
    pub fn with_capacity_limit(bytes: usize) -> Self {
        let sink = Self::default();
        sink.lock().capacity = Some(bytes);
        sink
    }

    /// Names of all outputs ever opened, in lexical order.
    #[must_use]
    pub fn names(&self) -> Vec<String> { self.lock().outputs.keys().cloned().collect() }

    /// Contents of the output called `name`.
    #[must_use]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().outputs.get(name).map(|o| o.data.clone())
    }

    /// Whether the output called `name` has been closed.
    #[must_use]
    pub fn is_closed(&self, name: &str) -> bool {
        self.lock().outputs.get(name).is_some_and(|o| o.closed)
    }

    /// Snapshot of every output as `(name, contents)` pairs.
    #[must_use]
    pub fn outputs(&self) -> Vec<(String, Vec<u8>)> {
        self.lock()
            .outputs
            .iter()
            .map(|(name, o)| (name.clone(), o.data.clone()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStore> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl Sink for MemorySink {
    type Handle = MemoryHandle;

    async fn open(&self, identity: &DumpIdentity) -> io::Result<Self::Handle> {
        let mut store = self.lock();
        let name = (0..MAX_NAME_ATTEMPTS)
            .map(|attempt| identity.candidate_name(attempt))
            .find(|name| !store.outputs.contains_key(name))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::AlreadyExists, "no free output name")
            })?;
        store.outputs.insert(name.clone(), MemoryOutput::default());
        Ok(MemoryHandle { name })
    }

    async fn append(&self, handle: &mut Self::Handle, bytes: &[u8]) -> io::Result<()> {
        let mut store = self.lock();
        let capacity = store.capacity;
        let output = store
            .outputs
            .get_mut(&handle.name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "output was removed"))?;
        if output.closed {
            return Err(io::Error::other("output already closed"));
        }
        if capacity.is_some_and(|cap| output.data.len() + bytes.len() > cap) {
            return Err(io::Error::other("memory sink capacity exceeded"));
        }
        output.data.extend_from_slice(bytes);
        Ok(())
    }

    async fn close(&self, handle: Self::Handle) -> io::Result<()> {
        let mut store = self.lock();
        let output = store
            .outputs
            .get_mut(&handle.name)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "output was removed"))?;
        output.closed = true;
        Ok(())
    }

    fn output_name(&self, handle: &Self::Handle) -> String { handle.name.clone() }
}
