//! Launch status and fatal-failure handling.
//!
//! Every launch yields a [`LaunchStatus`]. [`check_launch`] is queried
//! after each one and turns a non-success status into
//! [`UsidError::LaunchFailure`], applying the configured
//! [`FailurePolicy`].

use std::any::Any;
use std::fmt;

use usid_core::UsidError;

use crate::config::FailurePolicy;

/// Outcome of one launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LaunchStatus {
    /// Every unit completed.
    Success,
    /// A unit panicked. The pass may have written some elements.
    KernelFault {
        /// Panic message of the first faulting unit.
        message: String,
    },
    /// The grid for the requested extent exceeds the block limit.
    /// No unit ran.
    InvalidGeometry {
        /// Blocks the extent would need.
        blocks: usize,
    },
}

impl LaunchStatus {
    /// Numeric status code, `0` for success.
    pub fn code(&self) -> u32 {
        match self {
            Self::Success => 0,
            Self::KernelFault { .. } => 1,
            Self::InvalidGeometry { .. } => 2,
        }
    }

    /// Whether the launch succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Status for a caught panic payload.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::KernelFault { message }
    }
}

impl fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::KernelFault { message } => write!(f, "kernel fault: {message}"),
            Self::InvalidGeometry { blocks } => {
                write!(f, "invalid launch geometry: {blocks} blocks")
            }
        }
    }
}

/// Check the status of a finished launch of `op`.
///
/// Under [`FailurePolicy::Abort`] a failed launch does not return.
pub fn check_launch(
    op: &str,
    status: LaunchStatus,
    policy: FailurePolicy,
) -> Result<(), UsidError> {
    if status.is_success() {
        return Ok(());
    }
    Err(escalate(
        UsidError::LaunchFailure {
            operation: op.to_string(),
            code: status.code(),
            detail: status.to_string(),
        },
        policy,
    ))
}

/// Log a fatal error and apply `policy` to it.
///
/// Returns the error under [`FailurePolicy::Propagate`]; aborts the
/// process under [`FailurePolicy::Abort`].
pub fn escalate(err: UsidError, policy: FailurePolicy) -> UsidError {
    tracing::error!(error = %err, policy = ?policy, "fatal engine failure");
    match policy {
        FailurePolicy::Abort => std::process::abort(),
        FailurePolicy::Propagate => err,
    }
}
