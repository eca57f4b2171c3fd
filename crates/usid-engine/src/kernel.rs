//! One-shot kernel helper.

use usid_core::{FieldDescriptor, UsidError};

use crate::backend::Backend;

/// Launch a single pass named `op` over `fields`, handing the body an
/// extra read-only `neighbor` argument alongside the handle and strides.
///
/// The neighbour argument is typically a [`Neighbors`](usid_core::Neighbors)
/// target for a fold. For multi-pass kernels or temporaries use
/// [`invoke`](crate::invoke).
pub fn call_kernel<B, S, X, F>(
    backend: &B,
    op: &str,
    extent: usize,
    fields: &S,
    neighbor: &X,
    body: F,
) -> Result<(), UsidError>
where
    B: Backend,
    S: FieldDescriptor,
    X: Sync + ?Sized,
    F: Fn(&S::Handle, &S::Strides, &X) + Sync,
{
    let _span = tracing::debug_span!("call_kernel", op, extent, backend = B::NAME).entered();
    backend.launch(op, extent, fields, |handle, strides| body(handle, strides, neighbor))
}
