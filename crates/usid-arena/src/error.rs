//! Allocator error types.

use std::error::Error;
use std::fmt;

use usid_core::UsidError;

/// Errors from temporary-storage allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArenaError {
    /// The request would exceed the allocator's byte budget.
    CapacityExceeded {
        /// Number of bytes requested.
        requested: usize,
        /// Bytes still available under the budget.
        available: usize,
    },
    /// `elements * size_of::<T>()` does not fit in `usize`.
    SizeOverflow {
        /// Number of elements requested.
        elements: usize,
        /// Size of one element in bytes.
        element_size: usize,
    },
    /// The system allocator refused the reservation.
    ReserveFailed {
        /// Number of bytes requested.
        requested: usize,
    },
}

impl ArenaError {
    /// Bytes the failing request asked for, saturated on overflow.
    pub fn requested_bytes(&self) -> usize {
        match self {
            Self::CapacityExceeded { requested, .. } | Self::ReserveFailed { requested } => {
                *requested
            }
            Self::SizeOverflow {
                elements,
                element_size,
            } => elements.saturating_mul(*element_size),
        }
    }
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                requested,
                available,
            } => write!(
                f,
                "allocator budget exceeded: requested {requested} bytes, {available} bytes available"
            ),
            Self::SizeOverflow {
                elements,
                element_size,
            } => write!(
                f,
                "size overflow: {elements} elements of {element_size} bytes"
            ),
            Self::ReserveFailed { requested } => {
                write!(f, "system allocator refused {requested} bytes")
            }
        }
    }
}

impl Error for ArenaError {}

impl From<ArenaError> for UsidError {
    fn from(e: ArenaError) -> Self {
        UsidError::AllocationFailure {
            requested_bytes: e.requested_bytes(),
            reason: e.to_string(),
        }
    }
}
