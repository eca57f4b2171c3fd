//! Grid-parallel backend.
//!
//! Reproduces the accelerator execution model on a rayon pool: the outer
//! extent is covered by [`LaunchGeometry::for_extent`] blocks of
//! [`THREADS_PER_BLOCK`](crate::THREADS_PER_BLOCK) units, blocks run in
//! parallel, and the units of a block run in thread order on the worker
//! that picked the block up. Each unit owns exactly one outer element.

#![allow(unsafe_code)]

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use usid_arena::DeviceAllocator;
use usid_core::{Dim, FieldDescriptor, SharedDescriptor, StorageKind, Unit, H};

use crate::backend::Backend;
use crate::config::{ConfigError, EngineConfig};
use crate::geometry::LaunchGeometry;
use crate::status::LaunchStatus;

/// Backend running one unit per outer element across a worker pool.
pub struct ParallelBackend {
    config: EngineConfig,
    pool: Option<Arc<ThreadPool>>,
}

impl ParallelBackend {
    /// Create a backend after validating `config`.
    ///
    /// Builds a dedicated pool when `worker_threads` is set; otherwise
    /// launches go to the global rayon pool.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let pool = match config.resolved_worker_threads() {
            Some(n) => {
                let pool = ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("usid-worker-{i}"))
                    .build()
                    .map_err(|e| ConfigError::ThreadPool {
                        reason: e.to_string(),
                    })?;
                Some(Arc::new(pool))
            }
            None => None,
        };
        Ok(Self { config, pool })
    }

    /// Number of workers launches run on.
    pub fn worker_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }
}

impl Default for ParallelBackend {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
            pool: None,
        }
    }
}

impl fmt::Debug for ParallelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelBackend")
            .field("config", &self.config)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

impl Backend for ParallelBackend {
    const NAME: &'static str = "parallel";
    const STORAGE: StorageKind = StorageKind::Device;
    type Allocator = DeviceAllocator;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn make_allocator(&self) -> DeviceAllocator {
        let config = self.config.device_allocator_config();
        match &self.pool {
            Some(pool) => DeviceAllocator::with_pool(config, Arc::clone(pool)),
            None => DeviceAllocator::new(config),
        }
    }

    fn dispatch<S, F>(&self, extent: usize, fields: &S, body: &F) -> LaunchStatus
    where
        S: FieldDescriptor,
        F: Fn(&S::Handle, &S::Strides) + Sync,
    {
        let geometry = LaunchGeometry::for_extent(extent);
        if !geometry.is_valid() {
            return LaunchStatus::InvalidGeometry {
                blocks: geometry.blocks,
            };
        }
        tracing::debug!(
            blocks = geometry.blocks,
            threads_per_block = geometry.threads_per_block,
            idle_units = geometry.units().saturating_sub(extent),
            "grid launch"
        );

        let shared = fields.share();
        let strides = fields.strides();
        let outer = H::key();
        let grid = || {
            (0..geometry.blocks).into_par_iter().for_each(|block| {
                // Units past the extent are idle and never run.
                for idx in geometry.active_range(block, extent) {
                    // SAFETY: active ranges of distinct blocks are disjoint,
                    // so `idx` is held by exactly one unit, and the unit
                    // never leaves this thread.
                    let unit = unsafe { Unit::new_unchecked(outer, idx) };
                    let handle = shared.unit_origin(&unit);
                    body(&handle, &strides);
                }
            });
        };
        let run = AssertUnwindSafe(|| match &self.pool {
            Some(pool) => pool.install(grid),
            None => grid(),
        });
        match panic::catch_unwind(run) {
            Ok(()) => LaunchStatus::Success,
            Err(payload) => LaunchStatus::from_panic(&*payload),
        }
    }
}
