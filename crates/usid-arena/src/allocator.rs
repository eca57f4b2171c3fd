//! Allocators for temporary fields.
//!
//! An allocator belongs to one invocation. It hands out zero-initialised
//! buffers, tracks how much it has handed out, and enforces the optional
//! byte budget from [`AllocatorConfig`]. Buffers are plain `Vec`s owned by
//! the [`TmpStorage`](crate::TmpStorage) that requested them, so they are
//! freed when that storage drops, which can be no later than the
//! allocator itself.

use std::cell::Cell;
use std::fmt;
use std::mem;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use usid_core::StorageKind;

use crate::config::AllocatorConfig;
use crate::error::ArenaError;

/// Element types temporaries can hold.
///
/// `T::default()` is the zero value used to initialise fresh buffers.
pub trait Element: Copy + Default + Send + Sync + 'static {}

impl<T: Copy + Default + Send + Sync + 'static> Element for T {}

/// Totals of what an allocator has handed out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// Number of successful allocations.
    pub allocations: usize,
    /// Bytes handed out over all successful allocations.
    pub bytes: usize,
}

/// Source of temporary buffers for one backend.
pub trait Allocator {
    /// Storage kind of the buffers this allocator produces.
    fn kind(&self) -> StorageKind;

    /// Budget and options.
    fn config(&self) -> &AllocatorConfig;

    /// Allocate `len` default-initialised elements.
    fn allocate<T: Element>(&self, len: usize) -> Result<Vec<T>, ArenaError>;

    /// Totals so far.
    fn stats(&self) -> AllocationStats;

    /// Bytes handed out so far.
    fn allocated_bytes(&self) -> usize {
        self.stats().bytes
    }

    /// Number of successful allocations so far.
    fn allocations(&self) -> usize {
        self.stats().allocations
    }
}

// ── Ledger ─────────────────────────────────────────────────────────

/// Budget bookkeeping shared by both allocators.
#[derive(Default)]
struct Ledger {
    allocations: Cell<usize>,
    bytes: Cell<usize>,
}

impl Ledger {
    /// Byte size of `len` elements of `T`, checked against the budget.
    fn admit<T>(&self, len: usize, config: &AllocatorConfig) -> Result<usize, ArenaError> {
        let element_size = mem::size_of::<T>();
        let requested = len
            .checked_mul(element_size)
            .ok_or(ArenaError::SizeOverflow {
                elements: len,
                element_size,
            })?;
        if let Some(available) = config.available(self.bytes.get()) {
            if requested > available {
                return Err(ArenaError::CapacityExceeded {
                    requested,
                    available,
                });
            }
        }
        Ok(requested)
    }

    fn commit(&self, bytes: usize) {
        self.allocations.set(self.allocations.get() + 1);
        self.bytes.set(self.bytes.get().saturating_add(bytes));
    }

    fn stats(&self) -> AllocationStats {
        AllocationStats {
            allocations: self.allocations.get(),
            bytes: self.bytes.get(),
        }
    }
}

fn reserve<T>(len: usize, requested: usize) -> Result<Vec<T>, ArenaError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| ArenaError::ReserveFailed { requested })?;
    Ok(data)
}

// ── HeapAllocator ──────────────────────────────────────────────────

/// Host-heap allocator used by the sequential backend.
#[derive(Default)]
pub struct HeapAllocator {
    config: AllocatorConfig,
    ledger: Ledger,
}

impl HeapAllocator {
    /// Create an allocator with the given budget.
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            ledger: Ledger::default(),
        }
    }
}

impl Allocator for HeapAllocator {
    fn kind(&self) -> StorageKind {
        StorageKind::Host
    }

    fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    fn allocate<T: Element>(&self, len: usize) -> Result<Vec<T>, ArenaError> {
        let bytes = self.ledger.admit::<T>(len, &self.config)?;
        let mut data = reserve(len, bytes)?;
        data.resize(len, T::default());
        self.ledger.commit(bytes);
        tracing::trace!(len, bytes, storage = "host", "temporary allocated");
        Ok(data)
    }

    fn stats(&self) -> AllocationStats {
        self.ledger.stats()
    }
}

impl fmt::Debug for HeapAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeapAllocator")
            .field("config", &self.config)
            .field("stats", &self.ledger.stats())
            .finish()
    }
}

// ── DeviceAllocator ────────────────────────────────────────────────

/// Allocator for the parallel backend.
///
/// Buffers are initialised by the worker threads that will later run
/// kernels over them, on the backend's pool when one is attached and on
/// the global rayon pool otherwise.
pub struct DeviceAllocator {
    config: AllocatorConfig,
    pool: Option<Arc<ThreadPool>>,
    ledger: Ledger,
}

impl DeviceAllocator {
    /// Allocator initialising on the global rayon pool.
    pub fn new(config: AllocatorConfig) -> Self {
        Self {
            config,
            pool: None,
            ledger: Ledger::default(),
        }
    }

    /// Allocator initialising on `pool`.
    pub fn with_pool(config: AllocatorConfig, pool: Arc<ThreadPool>) -> Self {
        Self {
            config,
            pool: Some(pool),
            ledger: Ledger::default(),
        }
    }

    /// Whether a dedicated pool is attached.
    pub fn has_pool(&self) -> bool {
        self.pool.is_some()
    }
}

impl Allocator for DeviceAllocator {
    fn kind(&self) -> StorageKind {
        StorageKind::Device
    }

    fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    fn allocate<T: Element>(&self, len: usize) -> Result<Vec<T>, ArenaError> {
        let bytes = self.ledger.admit::<T>(len, &self.config)?;
        let mut data = reserve(len, bytes)?;
        let fill = |data: &mut Vec<T>| {
            data.par_extend((0..len).into_par_iter().map(|_| T::default()));
        };
        match &self.pool {
            Some(pool) => pool.install(|| fill(&mut data)),
            None => fill(&mut data),
        }
        self.ledger.commit(bytes);
        tracing::trace!(len, bytes, storage = "device", "temporary allocated");
        Ok(data)
    }

    fn stats(&self) -> AllocationStats {
        self.ledger.stats()
    }
}

impl fmt::Debug for DeviceAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAllocator")
            .field("config", &self.config)
            .field("pooled", &self.pool.is_some())
            .field("stats", &self.ledger.stats())
            .finish()
    }
}
