//! Temporary fields.
//!
//! [`make_tmp_storage`] and [`make_simple_tmp_storage`] allocate a
//! zero-initialised field through an [`Allocator`] and wrap it in a
//! [`TmpStorage`]. The storage borrows the allocator, so it cannot outlive
//! the invocation that owns the allocator, and its buffer is released when
//! it drops.

use std::fmt;
use std::marker::PhantomData;
use std::mem;

use usid_core::{
    BoundMap, Dim, DimKey, Layout, Sid, SidMut, StorageKind, StrideMap, UsidError, H, K,
};

use crate::allocator::{Allocator, Element};

/// A temporary field owned by one invocation.
pub struct TmpStorage<'a, T> {
    data: Vec<T>,
    strides: StrideMap,
    bounds: BoundMap,
    storage: StorageKind,
    _alloc: PhantomData<&'a ()>,
}

impl<'a, T> TmpStorage<'a, T> {
    /// Read-only descriptor over the whole field.
    pub fn sid(&self) -> Sid<'_, T> {
        Sid::from_parts(&self.data, self.strides, self.bounds, self.storage)
    }

    /// Writable descriptor over the whole field.
    pub fn sid_mut(&mut self) -> SidMut<'_, T> {
        SidMut::from_parts(&mut self.data, self.strides, self.bounds, self.storage)
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the field has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Size of the buffer in bytes.
    pub fn bytes(&self) -> usize {
        self.data.len() * mem::size_of::<T>()
    }

    /// Storage kind of the allocator that produced this field.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Stride map.
    pub fn strides(&self) -> StrideMap {
        self.strides
    }

    /// Bound map.
    pub fn upper_bounds(&self) -> BoundMap {
        self.bounds
    }

    /// Bound along `D`, if the field has that dimension.
    pub fn extent<D: Dim>(&self) -> Option<usize> {
        self.bounds.get_dim::<D>()
    }

    /// Contents in buffer order.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

impl<T> Drop for TmpStorage<'_, T> {
    fn drop(&mut self) {
        tracing::trace!(len = self.data.len(), "temporary released");
    }
}

impl<T> fmt::Debug for TmpStorage<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TmpStorage")
            .field("len", &self.data.len())
            .field("strides", &self.strides)
            .field("bounds", &self.bounds)
            .field("storage", &self.storage)
            .finish()
    }
}

/// Allocate a temporary with the given `(tag, extent)` dimensions,
/// row-major with the first entry outermost.
///
/// Fails with a contract violation if a tag repeats or the size overflows,
/// and with [`UsidError::AllocationFailure`] if the allocator refuses.
pub fn make_tmp_storage<'a, T, A>(
    dims: &[(DimKey, usize)],
    alloc: &'a A,
) -> Result<TmpStorage<'a, T>, UsidError>
where
    T: Element,
    A: Allocator,
{
    let (strides, bounds, span) = Layout::row_major(dims).resolve()?;
    let data = alloc.allocate::<T>(span)?;
    Ok(TmpStorage {
        data,
        strides,
        bounds,
        storage: alloc.kind(),
        _alloc: PhantomData,
    })
}

/// Allocate an `h * k` temporary, horizontal outermost and vertical
/// innermost.
pub fn make_simple_tmp_storage<'a, T, A>(
    h: usize,
    k: usize,
    alloc: &'a A,
) -> Result<TmpStorage<'a, T>, UsidError>
where
    T: Element,
    A: Allocator,
{
    make_tmp_storage(&[(H::key(), h), (K::key(), k)], alloc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{DeviceAllocator, HeapAllocator};
    use crate::config::AllocatorConfig;
    use usid_core::{ContractViolation, FieldDescriptor, N};

    #[test]
    fn simple_storage_is_h_outer_k_inner() {
        let alloc = HeapAllocator::default();
        let mut tmp = make_simple_tmp_storage::<f64, _>(3, 4, &alloc).unwrap();
        assert_eq!(tmp.len(), 12);
        assert_eq!(tmp.bytes(), 96);
        assert_eq!(tmp.strides().get_dim::<H>(), Some(4));
        assert_eq!(tmp.strides().get_dim::<K>(), Some(1));
        assert_eq!(tmp.extent::<H>(), Some(3));
        assert_eq!(tmp.extent::<K>(), Some(4));
        assert_eq!(tmp.storage(), StorageKind::Host);
        assert!(tmp.as_slice().iter().all(|&x| x == 0.0));

        let sid = tmp.sid_mut().shifted::<H>(2).unwrap().shifted::<K>(1).unwrap();
        sid.origin().set(7.5);
        assert_eq!(tmp.as_slice()[9], 7.5);
        assert_eq!(tmp.sid().shifted::<H>(2).unwrap().shifted::<K>(1).unwrap().origin().get(), 7.5);
    }

    #[test]
    fn device_storage_carries_device_kind() {
        let alloc = DeviceAllocator::new(AllocatorConfig::default());
        let tmp = make_simple_tmp_storage::<i32, _>(5, 1, &alloc).unwrap();
        assert_eq!(tmp.storage(), StorageKind::Device);
        assert_eq!(tmp.sid().storage(), StorageKind::Device);
    }

    #[test]
    fn zero_extent_gives_empty_storage() {
        let alloc = HeapAllocator::default();
        let tmp = make_simple_tmp_storage::<f64, _>(0, 4, &alloc).unwrap();
        assert!(tmp.is_empty());
        assert_eq!(tmp.extent::<H>(), Some(0));
    }

    #[test]
    fn custom_dimensions() {
        let alloc = HeapAllocator::default();
        let tmp = make_tmp_storage::<u8, _>(&[(H::key(), 2), (N::key(), 3), (K::key(), 5)], &alloc)
            .unwrap();
        assert_eq!(tmp.len(), 30);
        assert_eq!(tmp.strides().get_dim::<H>(), Some(15));
        assert_eq!(tmp.strides().get_dim::<N>(), Some(5));
        assert_eq!(tmp.strides().get_dim::<K>(), Some(1));
    }

    #[test]
    fn repeated_tag_is_a_contract_violation() {
        let alloc = HeapAllocator::default();
        let err = make_tmp_storage::<u8, _>(&[(H::key(), 2), (H::key(), 3)], &alloc).unwrap_err();
        assert_eq!(
            err,
            UsidError::Contract(ContractViolation::DuplicateDim { dim: "h" })
        );
        assert_eq!(alloc.stats().allocations, 0);
    }

    #[test]
    fn budget_failure_surfaces_as_allocation_failure() {
        let alloc = HeapAllocator::new(AllocatorConfig::with_limit(64));
        let err = make_simple_tmp_storage::<f64, _>(4, 4, &alloc).unwrap_err();
        assert!(matches!(
            err,
            UsidError::AllocationFailure {
                requested_bytes: 128,
                ..
            }
        ));
    }

    #[test]
    fn tmp_fields_pass_member_checks() {
        let alloc = HeapAllocator::default();
        let mut tmp = make_simple_tmp_storage::<f64, _>(6, 2, &alloc).unwrap();
        let sid = tmp.sid_mut();
        assert!(sid.check_outer(H::key(), 6, StorageKind::Host).is_ok());
        assert_eq!(
            sid.check_outer(H::key(), 6, StorageKind::Device).unwrap_err(),
            ContractViolation::StorageMismatch {
                expected: StorageKind::Device,
                found: StorageKind::Host
            }
        );
    }
}
