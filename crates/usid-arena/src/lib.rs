//! Temporary storage for usid kernel invocations.
//!
//! Multi-pass kernels keep intermediate results in temporary fields that
//! live exactly as long as the invocation that needs them. This crate
//! provides the pieces for that:
//!
//! - [`Allocator`]: source of zero-initialised buffers with a byte budget.
//!   [`HeapAllocator`] serves the sequential backend and
//!   [`DeviceAllocator`] the parallel one.
//! - [`TmpStorage`]: an owned buffer plus its strides and bounds, viewed as
//!   a [`Sid`](usid_core::Sid) or [`SidMut`](usid_core::SidMut).
//! - [`make_tmp_storage`] and [`make_simple_tmp_storage`]: constructors
//!   that pick the layout and go through an allocator.
//!
//! # Lifetimes
//!
//! A `TmpStorage<'a, T>` borrows the allocator it came from for `'a`.
//! Engines create one allocator per invocation and drop it when the
//! invocation ends, so no temporary can be observed after release.
//!
//! # Failure
//!
//! Allocation failures are [`ArenaError`]s at this layer and convert into
//! [`UsidError::AllocationFailure`](usid_core::UsidError::AllocationFailure)
//! through `?`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod config;
pub mod error;
pub mod storage;

pub use allocator::{AllocationStats, Allocator, DeviceAllocator, Element, HeapAllocator};
pub use config::AllocatorConfig;
pub use error::ArenaError;
pub use storage::{make_simple_tmp_storage, make_tmp_storage, TmpStorage};
