//! # In-Memory Vector Store
//!
//! The reference [`EmbeddingProvider`]: an append-only entry arena plus a
//! key index. Each entry carries its own occurrence counter and the index
//! of the graph node backed by it, so store and graph point at each other
//! through stable integers in both directions.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use crate::model::{NodeIdx, Precision, SlotIdx, VectorData};
use crate::store::EmbeddingProvider;
use crate::{Error, Result};

// ============================================================================
// Entries
// ============================================================================

/// Mutable side of an entry: the occurrence count and the node backed by
/// this slot. One mutex for both, so "create node on first sighting" is
/// atomic per entry during threaded ingestion.
#[derive(Debug)]
struct EntryState {
    absolute: u64,
    node: Option<NodeIdx>,
}

#[derive(Debug)]
struct StoreEntry {
    key: String,
    vector: Arc<VectorData>,
    state: Mutex<EntryState>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<StoreEntry>,
    index: HashMap<String, SlotIdx>,
}

// ============================================================================
// VectorStore
// ============================================================================

/// In-memory embedding table with stable slots.
///
/// Inserts serialize on the arena writer lock; everything on the ingestion
/// path takes the reader lock plus one entry's state mutex, so concurrent
/// ingestion of *different* keys never contends.
#[derive(Debug)]
pub struct VectorStore {
    dims: u32,
    precision: Precision,
    inner: RwLock<Inner>,
}

impl VectorStore {
    pub fn new(dims: u32, precision: Precision) -> Self {
        Self { dims, precision, inner: RwLock::new(Inner::default()) }
    }

    /// Insert a single-precision vector under `key`.
    pub fn insert_f32(&self, key: &str, vector: Vec<f32>) -> Result<SlotIdx> {
        self.insert(key, VectorData::F32(vector))
    }

    /// Insert a double-precision vector under `key`.
    pub fn insert_f64(&self, key: &str, vector: Vec<f64>) -> Result<SlotIdx> {
        self.insert(key, VectorData::F64(vector))
    }

    fn insert(&self, key: &str, vector: VectorData) -> Result<SlotIdx> {
        if vector.precision() != self.precision {
            return Err(Error::InvalidArgument(format!(
                "store holds {} vectors, cannot insert {}",
                self.precision,
                vector.precision()
            )));
        }
        if vector.dims() != self.dims as usize {
            return Err(Error::DimensionMismatch {
                expected: self.dims as usize,
                got: vector.dims(),
            });
        }

        let mut inner = self.inner.write();
        if inner.index.contains_key(key) {
            return Err(Error::InvalidArgument(format!("key {key:?} is already stored")));
        }
        if inner.entries.len() >= u32::MAX as usize {
            return Err(Error::InvalidArgument("store is at the slot index limit".into()));
        }
        inner
            .entries
            .try_reserve(1)
            .map_err(|_| Error::Alloc("store entries"))?;

        let slot = SlotIdx(inner.entries.len() as u32);
        inner.entries.push(StoreEntry {
            key: key.to_owned(),
            vector: Arc::new(vector),
            state: Mutex::new(EntryState { absolute: 0, node: None }),
        });
        inner.index.insert(key.to_owned(), slot);
        Ok(slot)
    }

    /// Key stored at `slot`.
    pub fn key_of(&self, slot: SlotIdx) -> Option<String> {
        self.inner
            .read()
            .entries
            .get(slot.index())
            .map(|e| e.key.clone())
    }

    /// Graph node backed by `slot`, once ingestion has created one.
    pub fn node_of(&self, slot: SlotIdx) -> Option<NodeIdx> {
        self.inner
            .read()
            .entries
            .get(slot.index())
            .and_then(|e| e.state.lock().node)
    }

    /// Occurrences recorded against `slot`.
    pub fn occurrences(&self, slot: SlotIdx) -> Option<u64> {
        self.inner
            .read()
            .entries
            .get(slot.index())
            .map(|e| e.state.lock().absolute)
    }

    /// Record `by` occurrences against `slot`, creating the backing graph
    /// node through `create_node` on the entry's first sighting.
    ///
    /// The closure runs under the entry's state mutex, which is what makes
    /// first-sighting creation race-free across ingestion threads. The
    /// resulting lock order is store entry, then graph arena; graph code
    /// never takes store locks, so the order cannot invert.
    pub fn record_occurrences<F>(&self, slot: SlotIdx, by: u64, create_node: F) -> Result<NodeIdx>
    where
        F: FnOnce() -> Result<NodeIdx>,
    {
        let inner = self.inner.read();
        let entry = inner.entries.get(slot.index()).ok_or_else(|| {
            Error::InvalidArgument(format!("slot {slot} is out of range"))
        })?;
        let mut state = entry.state.lock();
        let node = match state.node {
            Some(node) => node,
            None => {
                let node = create_node()?;
                state.node = Some(node);
                node
            }
        };
        state.absolute += by;
        Ok(node)
    }
}

impl EmbeddingProvider for VectorStore {
    fn dims(&self) -> u32 {
        self.dims
    }

    fn precision(&self) -> Precision {
        self.precision
    }

    fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    fn slot_of(&self, key: &str) -> Option<SlotIdx> {
        self.inner.read().index.get(key).copied()
    }

    fn vector(&self, slot: SlotIdx) -> Option<Arc<VectorData>> {
        self.inner
            .read()
            .entries
            .get(slot.index())
            .map(|e| Arc::clone(&e.vector))
    }
}
