//! Error types for usid.
//!
//! One taxonomy enum, [`UsidError`], covers every failure a kernel
//! invocation can report. Contract violations are grouped in the nested
//! [`ContractViolation`] enum because they are all programming errors
//! detected before any element is touched.

use std::error::Error;
use std::fmt;

use crate::sid::StorageKind;

/// Descriptor or bundle does not satisfy what a loop, fold or pass needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContractViolation {
    /// A tag used by a loop or fold is absent from the stride map.
    MissingStride {
        /// Name of the missing tag.
        dim: &'static str,
    },
    /// A tag has no upper bound where one is required.
    MissingBound {
        /// Name of the unbounded tag.
        dim: &'static str,
    },
    /// A bundle member is shorter along the outer tag than the launch extent.
    ExtentMismatch {
        /// Name of the outer tag.
        dim: &'static str,
        /// Launch extent.
        extent: usize,
        /// Bound of the offending member.
        bound: usize,
    },
    /// A writable member cannot be partitioned by the outer tag.
    NotAddressable {
        /// Name of the outer tag.
        dim: &'static str,
    },
    /// A member was built for a different storage kind than the backend uses.
    StorageMismatch {
        /// Storage kind of the backend.
        expected: StorageKind,
        /// Storage kind of the member.
        found: StorageKind,
    },
    /// A layout does not describe the buffer it is applied to.
    LayoutMismatch {
        /// Elements the layout addresses.
        expected: usize,
        /// Elements in the buffer.
        actual: usize,
    },
    /// More tags than a stride map can hold.
    TooManyDims {
        /// Capacity of the map.
        capacity: usize,
    },
    /// The same tag was given twice.
    DuplicateDim {
        /// Name of the repeated tag.
        dim: &'static str,
    },
    /// An invocation operation was attempted in the wrong state.
    InvalidState {
        /// What was attempted.
        action: &'static str,
        /// State the invocation was in.
        state: &'static str,
    },
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingStride { dim } => write!(f, "no stride for dimension '{dim}'"),
            Self::MissingBound { dim } => write!(f, "no upper bound for dimension '{dim}'"),
            Self::ExtentMismatch { dim, extent, bound } => write!(
                f,
                "extent {extent} along '{dim}' exceeds member bound {bound}"
            ),
            Self::NotAddressable { dim } => {
                write!(f, "writable member is not addressable along '{dim}'")
            }
            Self::StorageMismatch { expected, found } => {
                write!(f, "member built for {found:?} storage, backend uses {expected:?}")
            }
            Self::LayoutMismatch { expected, actual } => write!(
                f,
                "layout addresses {expected} elements, buffer holds {actual}"
            ),
            Self::TooManyDims { capacity } => {
                write!(f, "more than {capacity} dimensions in one stride map")
            }
            Self::DuplicateDim { dim } => write!(f, "dimension '{dim}' given twice"),
            Self::InvalidState { action, state } => {
                write!(f, "cannot {action} while invocation is {state}")
            }
        }
    }
}

impl Error for ContractViolation {}

/// Errors reported by usid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UsidError {
    /// A descriptor, bundle or invocation contract was broken.
    Contract(ContractViolation),
    /// A connectivity value lies outside the target element range.
    IndexOutOfRange {
        /// Table row, when known.
        row: Option<usize>,
        /// Neighbour slot.
        slot: usize,
        /// The offending value.
        index: i64,
        /// Number of target elements.
        bound: usize,
    },
    /// A launch reported non-success.
    LaunchFailure {
        /// Operation name given to the pass.
        operation: String,
        /// Numeric status code.
        code: u32,
        /// Human-readable status description.
        detail: String,
    },
    /// Temporary storage could not be allocated.
    AllocationFailure {
        /// Size of the request in bytes, saturated on overflow.
        requested_bytes: usize,
        /// Why the request failed.
        reason: String,
    },
}

impl fmt::Display for UsidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(v) => write!(f, "contract violation: {v}"),
            Self::IndexOutOfRange {
                row,
                slot,
                index,
                bound,
            } => {
                write!(f, "connectivity value {index} at slot {slot}")?;
                if let Some(row) = row {
                    write!(f, " of row {row}")?;
                }
                write!(f, " outside [0, {bound})")
            }
            Self::LaunchFailure {
                operation,
                code,
                detail,
            } => write!(f, "launch of '{operation}' failed with status {code}: {detail}"),
            Self::AllocationFailure {
                requested_bytes,
                reason,
            } => write!(f, "allocation of {requested_bytes} bytes failed: {reason}"),
        }
    }
}

impl Error for UsidError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Contract(v) => Some(v),
            _ => None,
        }
    }
}

impl From<ContractViolation> for UsidError {
    fn from(v: ContractViolation) -> Self {
        Self::Contract(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violation_converts_and_keeps_source() {
        let err: UsidError = ContractViolation::MissingStride { dim: "k" }.into();
        assert_eq!(
            err,
            UsidError::Contract(ContractViolation::MissingStride { dim: "k" })
        );
        assert!(err.source().is_some());
        assert_eq!(
            err.to_string(),
            "contract violation: no stride for dimension 'k'"
        );
    }

    #[test]
    fn index_out_of_range_mentions_row_when_known() {
        let with_row = UsidError::IndexOutOfRange {
            row: Some(3),
            slot: 1,
            index: 9,
            bound: 4,
        };
        assert_eq!(
            with_row.to_string(),
            "connectivity value 9 at slot 1 of row 3 outside [0, 4)"
        );
        let without_row = UsidError::IndexOutOfRange {
            row: None,
            slot: 0,
            index: -7,
            bound: 2,
        };
        assert_eq!(
            without_row.to_string(),
            "connectivity value -7 at slot 0 outside [0, 2)"
        );
    }

    #[test]
    fn launch_failure_display() {
        let err = UsidError::LaunchFailure {
            operation: "nabla_edge".to_string(),
            code: 1,
            detail: "kernel fault".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "launch of 'nabla_edge' failed with status 1: kernel fault"
        );
        assert!(err.source().is_none());
    }
}
