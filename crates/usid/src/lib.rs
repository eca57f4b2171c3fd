//! usid: a backend-agnostic stencil engine for unstructured meshes.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all usid sub-crates. Kernel bodies are written once against field
//! descriptors and run unchanged on the sequential or the parallel backend.
//!
//! # Quick start
//!
//! ```rust
//! use usid::prelude::*;
//!
//! let input = vec![1.0f64, 2.0, 3.0];
//! let mut output = vec![0.0f64; 3];
//! let backend = SequentialBackend::default();
//! let storage = SequentialBackend::STORAGE;
//!
//! let fields = (input.sid(storage), output.sid_mut(storage));
//! backend
//!     .launch("double", 3, &fields, |p, _| p.1.set(2.0 * p.0.get()))
//!     .unwrap();
//! assert_eq!(output, [2.0, 4.0, 6.0]);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `usid-core` | Tags, descriptors, bundles, loops, folds, errors |
//! | [`arena`] | `usid-arena` | Allocators and temporary storage |
//! | [`engine`] | `usid-engine` | Backends, launch status, invocations, metrics |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`usid-core`).
///
/// Dimension tags, stride maps, field descriptors, bundles, loops and
/// neighbour folds. The [`composite!`](types::composite) and
/// [`dimension!`](types::dimension) macros live here.
pub use usid_core as types;

/// Temporary storage (`usid-arena`).
///
/// [`arena::HeapAllocator`] backs the sequential backend,
/// [`arena::DeviceAllocator`] the parallel one. Both produce
/// [`arena::TmpStorage`].
pub use usid_arena as arena;

/// Backends and invocations (`usid-engine`).
///
/// [`engine::SequentialBackend`] and [`engine::ParallelBackend`] implement
/// [`engine::Backend`]. Multi-pass kernels with temporaries go through
/// [`engine::invoke`].
pub use usid_engine as engine;

pub use usid_core::{composite, dimension};

/// Common imports for writing and running kernels.
///
/// ```rust
/// use usid::prelude::*;
/// ```
pub mod prelude {
    // Tags and descriptors
    pub use usid_core::{
        Connectivity, Dim, Domain, FieldDescriptor, IntoSid, IntoSidMut, Layout, Location,
        Neighbors, Ptr, PtrMut, Sid, SidMut, StorageKind, H, K, N,
    };

    // Loops and folds
    pub use usid_core::{
        fold_neighbors, make_loop, max_degree, max_neighbors, min_neighbors, mul_neighbors,
        sum_neighbors, SKIP_VALUE,
    };

    // Errors
    pub use usid_core::{ContractViolation, UsidError};

    // Temporaries
    pub use usid_arena::{Allocator, TmpStorage};

    // Engine
    pub use usid_engine::{
        call_kernel, invoke, Backend, EngineConfig, FailurePolicy, Invocation, InvocationMetrics,
        LaunchStatus, ParallelBackend, SequentialBackend,
    };
}
