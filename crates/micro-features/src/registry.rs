//! Handle-based frontend registry
//!
//! Frontends live in slots of an arena and are addressed by copyable
//! [`FrontendHandle`]s. Freeing a slot bumps its generation, so a handle
//! that outlived its frontend is rejected instead of reaching a reused slot.
//! Each frontend sits behind its own mutex; the arena lock is only held
//! while a slot is looked up.

use crate::error::FeaturesError;
use crate::{feed_chunk, fixed_config, ProcessOutput};
use micro_frontend::Frontend;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque reference to a frontend owned by a [`FrontendRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrontendHandle {
    registry: u64,
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    frontend: Option<Arc<Mutex<Frontend>>>,
}

#[derive(Debug, Default)]
struct Slots {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

/// Arena of fixed-configuration frontends
#[derive(Debug)]
pub struct FrontendRegistry {
    id: u64,
    inner: Mutex<Slots>,
}

impl Default for FrontendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FrontendRegistry {
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(Slots::default()),
        }
    }

    /// Build a frontend with the fixed configuration and register it
    pub fn create(&self) -> Result<FrontendHandle, FeaturesError> {
        let frontend = Arc::new(Mutex::new(Frontend::new(fixed_config())?));

        let mut inner = self.inner.lock();
        let index = match inner.free.pop() {
            Some(index) => index,
            None => {
                inner.slots.push(Slot::default());
                (inner.slots.len() - 1) as u32
            }
        };
        let slot = &mut inner.slots[index as usize];
        slot.frontend = Some(frontend);
        let generation = slot.generation;
        inner.live += 1;

        debug!(registry = self.id, index, generation, "Created frontend");
        Ok(FrontendHandle {
            registry: self.id,
            index,
            generation,
        })
    }

    fn lookup(&self, handle: FrontendHandle) -> Result<Arc<Mutex<Frontend>>, FeaturesError> {
        let inner = self.inner.lock();
        inner
            .slots
            .get(handle.index as usize)
            .filter(|slot| handle.registry == self.id && slot.generation == handle.generation)
            .and_then(|slot| slot.frontend.clone())
            .ok_or_else(|| {
                warn!(?handle, "Rejected unknown frontend handle");
                FeaturesError::InvalidHandle
            })
    }

    /// Feed the first chunk of `audio` to the frontend behind `handle`
    pub fn process(
        &self,
        handle: FrontendHandle,
        audio: &[u8],
    ) -> Result<ProcessOutput, FeaturesError> {
        let frontend = self.lookup(handle)?;
        let mut frontend = frontend.lock();
        feed_chunk(&mut frontend, audio)
    }

    pub fn reset(&self, handle: FrontendHandle) -> Result<(), FeaturesError> {
        let frontend = self.lookup(handle)?;
        frontend.lock().reset();
        Ok(())
    }

    /// Release the frontend; the handle and any copies become invalid
    pub fn destroy(&self, handle: FrontendHandle) -> Result<(), FeaturesError> {
        let mut inner = self.inner.lock();
        let slot = inner
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| handle.registry == self.id && slot.generation == handle.generation)
            .filter(|slot| slot.frontend.is_some())
            .ok_or_else(|| {
                warn!(?handle, "Rejected destroy of unknown frontend handle");
                FeaturesError::InvalidHandle
            })?;

        slot.frontend = None;
        // A slot whose generation is exhausted is retired, never reused
        let retired = slot.generation == u32::MAX;
        if !retired {
            slot.generation += 1;
            inner.free.push(handle.index);
        }
        inner.live -= 1;

        debug!(registry = self.id, index = handle.index, "Destroyed frontend");
        Ok(())
    }

    /// Number of live frontends
    pub fn len(&self) -> usize {
        self.inner.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
