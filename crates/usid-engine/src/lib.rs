//! Kernel execution for usid.
//!
//! This crate runs kernel bodies written against `usid-core` descriptors
//! on one of two backends that share a single launch path:
//!
//! - [`SequentialBackend`]: one thread, ascending element order, host-heap
//!   temporaries.
//! - [`ParallelBackend`]: blocks of [`THREADS_PER_BLOCK`] units on a rayon
//!   pool, one unit per outer element, worker-initialised temporaries.
//!
//! # Launch path
//!
//! [`Backend::launch`] checks the fields against the outer extent
//! (storage kind, strides, bounds, writability), dispatches, and queries
//! the [`LaunchStatus`]. A failed status becomes
//! [`UsidError::LaunchFailure`](usid_core::UsidError::LaunchFailure) and
//! is handled by the configured [`FailurePolicy`].
//!
//! # Invocations
//!
//! [`invoke`] wraps one or more passes with the temporaries they need and
//! walks the [`InvocationState`] machine. [`call_kernel`] is the one-pass
//! shorthand.
//!
//! # Logging
//!
//! The crate emits `tracing` spans per invocation and per pass, state
//! transitions at `debug`, and fatal failures at `error`. It never installs
//! a subscriber.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod backend;
pub mod config;
pub mod geometry;
pub mod invocation;
pub mod kernel;
pub mod metrics;
pub mod parallel;
pub mod sequential;
pub mod status;

pub use backend::Backend;
pub use config::{ConfigError, EngineConfig, FailurePolicy, MAX_WORKER_THREADS, THREADS_PER_BLOCK};
pub use geometry::{LaunchGeometry, MAX_GRID_BLOCKS};
pub use invocation::{invoke, Invocation, InvocationState};
pub use kernel::call_kernel;
pub use metrics::{InvocationMetrics, PassMetrics};
pub use parallel::ParallelBackend;
pub use sequential::SequentialBackend;
pub use status::{check_launch, escalate, LaunchStatus};
