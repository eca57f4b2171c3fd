//! The backend seam.
//!
//! A [`Backend`] runs one kernel body once per element of an outer
//! horizontal extent. Both implementations share the launch path in
//! [`Backend::launch`]: contract checks first, then dispatch, then a status
//! check under the configured [`FailurePolicy`](crate::FailurePolicy).

use usid_arena::Allocator;
use usid_core::{Dim, FieldDescriptor, StorageKind, UsidError, H};

use crate::config::EngineConfig;
use crate::status::{check_launch, LaunchStatus};

/// Execution strategy for kernel passes.
pub trait Backend: Sync {
    /// Name used in logs and metrics.
    const NAME: &'static str;

    /// Storage kind the backend accepts and allocates.
    const STORAGE: StorageKind;

    /// Allocator for temporaries of one invocation.
    type Allocator: Allocator;

    /// Configuration the backend was built with.
    fn config(&self) -> &EngineConfig;

    /// Fresh allocator for one invocation.
    fn make_allocator(&self) -> Self::Allocator;

    /// Run `body` once per outer index in `0..extent` without checking
    /// `fields` first.
    ///
    /// Each call receives a handle positioned at its element with writes
    /// confined to that element, plus the bundle's strides.
    fn dispatch<S, F>(&self, extent: usize, fields: &S, body: &F) -> LaunchStatus
    where
        S: FieldDescriptor,
        F: Fn(&S::Handle, &S::Strides) + Sync;

    /// Checked launch of one pass named `op`.
    ///
    /// Contract violations are returned before any element is touched.
    /// A non-success status is handled by the failure policy.
    fn launch<S, F>(&self, op: &str, extent: usize, fields: &S, body: F) -> Result<(), UsidError>
    where
        S: FieldDescriptor,
        F: Fn(&S::Handle, &S::Strides) + Sync,
    {
        fields.check_outer(H::key(), extent, Self::STORAGE)?;
        let status = self.dispatch(extent, fields, &body);
        check_launch(op, status, self.config().failure_policy)
    }
}
