//! Core types for the usid stencil engine.
//!
//! This is the leaf crate of the workspace. It defines the pieces a kernel
//! body is written against, independent of how the kernel is executed:
//!
//! - dimension tags and their keys ([`Dim`], [`DimKey`], [`dimension!`]),
//! - stride and bound maps ([`StrideMap`], [`BoundMap`], [`Layout`]),
//! - field descriptors and handles ([`Sid`], [`SidMut`], [`Ptr`],
//!   [`PtrMut`], [`FieldDescriptor`]),
//! - bundles (tuples and [`composite!`]),
//! - dimension-keyed loops ([`make_loop`]),
//! - neighbour folds ([`fold_neighbors`] and its specialisations),
//! - connectivity tables and the mesh [`Domain`],
//! - the error taxonomy ([`UsidError`], [`ContractViolation`]).

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod composite;
pub mod connectivity;
pub mod dim;
pub mod domain;
pub mod error;
pub mod fold;
pub mod loops;
pub mod ptr;
pub mod sid;
pub mod stride;

pub use composite::SharedBundle;
pub use connectivity::Connectivity;
pub use dim::{Dim, DimKey, Horizontal, Neighbor, Vertical, H, K, N};
pub use domain::{Domain, Location};
pub use error::{ContractViolation, UsidError};
pub use fold::{
    fold_neighbors, max_neighbors, min_neighbors, mul_neighbors, sum_neighbors, BoundFold,
    ConnectivityIndex, NeighborFold, Reduction, SKIP_VALUE,
};
pub use loops::{make_loop, BoundLoop, Const, Extent, Loop, LoopFn};
pub use ptr::{ElementGuard, Ptr, PtrMut, SharedBuf, Shift, Unit};
pub use sid::{
    max_degree, FieldDescriptor, IntoSid, IntoSidMut, Neighbors, SharedDescriptor, SharedSidMut,
    Sid, SidMut, StorageKind, StrideSet,
};
pub use stride::{BoundMap, DimMap, Layout, StrideMap, MAX_DIMS};

#[doc(hidden)]
pub mod __private {
    /// Seals [`FieldDescriptor`](crate::FieldDescriptor).
    pub trait Sealed {}
}
