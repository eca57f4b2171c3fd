//! Engine configuration, validation, and error types.

use std::error::Error;
use std::fmt;

use usid_arena::AllocatorConfig;

/// Units per block of a grid-parallel launch.
pub const THREADS_PER_BLOCK: usize = 32;

/// Upper clamp for an explicit worker thread count.
pub const MAX_WORKER_THREADS: usize = 256;

// ── FailurePolicy ──────────────────────────────────────────────────

/// What the engine does with a fatal failure (a failed launch or a
/// refused temporary allocation).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the diagnostic at `error` level and abort the process.
    #[default]
    Abort,
    /// Log the diagnostic and return the error to the caller.
    Propagate,
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Configuration shared by both backends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Fatal-failure handling. Default: [`FailurePolicy::Abort`].
    pub failure_policy: FailurePolicy,
    /// Worker threads of the parallel backend. `None` = the global rayon
    /// pool. Explicit values are clamped to `[1, MAX_WORKER_THREADS]`.
    pub worker_threads: Option<usize>,
    /// Byte budget of the parallel backend's allocator per invocation.
    /// `None` = unlimited.
    pub device_memory_limit: Option<usize>,
    /// Range-check connectivity tables in
    /// [`Invocation::validate_connectivity`](crate::Invocation::validate_connectivity).
    /// Default: on in debug builds.
    pub check_connectivity: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            worker_threads: None,
            device_memory_limit: None,
            check_connectivity: cfg!(debug_assertions),
        }
    }
}

impl EngineConfig {
    /// Default configuration with fatal failures returned as errors.
    pub fn propagating() -> Self {
        Self {
            failure_policy: FailurePolicy::Propagate,
            ..Self::default()
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.device_memory_limit == Some(0) {
            return Err(ConfigError::ZeroMemoryLimit);
        }
        Ok(())
    }

    /// Worker count for a dedicated pool, or `None` for the global pool.
    pub fn resolved_worker_threads(&self) -> Option<usize> {
        self.worker_threads.map(|n| n.clamp(1, MAX_WORKER_THREADS))
    }

    /// Allocator budget of the parallel backend.
    pub fn device_allocator_config(&self) -> AllocatorConfig {
        AllocatorConfig {
            limit_bytes: self.device_memory_limit,
        }
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while building a backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// `worker_threads` is `Some(0)`.
    ZeroWorkers,
    /// `device_memory_limit` is `Some(0)`.
    ZeroMemoryLimit,
    /// The worker pool could not be built.
    ThreadPool {
        /// Error reported by the pool builder.
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroWorkers => write!(f, "worker_threads must be at least 1"),
            Self::ZeroMemoryLimit => write!(f, "device_memory_limit must be at least 1 byte"),
            Self::ThreadPool { reason } => write!(f, "worker pool build failed: {reason}"),
        }
    }
}

impl Error for ConfigError {}
