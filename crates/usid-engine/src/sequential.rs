//! Single-threaded backend.

use std::panic::{self, AssertUnwindSafe};

use usid_arena::HeapAllocator;
use usid_core::{Dim, FieldDescriptor, StorageKind, H};

use crate::backend::Backend;
use crate::config::{ConfigError, EngineConfig};
use crate::status::LaunchStatus;

/// Runs every element on the calling thread in ascending order.
///
/// A panicking body is caught and reported as
/// [`LaunchStatus::KernelFault`], the same way the parallel backend
/// reports it.
#[derive(Clone, Debug, Default)]
pub struct SequentialBackend {
    config: EngineConfig,
}

impl SequentialBackend {
    /// Create a backend after validating `config`.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Backend for SequentialBackend {
    const NAME: &'static str = "sequential";
    const STORAGE: StorageKind = StorageKind::Host;
    type Allocator = HeapAllocator;

    fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn make_allocator(&self) -> HeapAllocator {
        HeapAllocator::default()
    }

    fn dispatch<S, F>(&self, extent: usize, fields: &S, body: &F) -> LaunchStatus
    where
        S: FieldDescriptor,
        F: Fn(&S::Handle, &S::Strides) + Sync,
    {
        let strides = fields.strides();
        let run = AssertUnwindSafe(|| {
            for idx in 0..extent {
                let handle = fields.element_origin(H::key(), idx);
                body(&handle, &strides);
            }
        });
        match panic::catch_unwind(run) {
            Ok(()) => LaunchStatus::Success,
            Err(payload) => LaunchStatus::from_panic(&*payload),
        }
    }
}
