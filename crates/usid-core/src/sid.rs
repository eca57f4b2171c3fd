//! Strided field descriptors.
//!
//! A descriptor pairs a position in a borrowed buffer with a
//! [`StrideMap`] and a [`BoundMap`]. [`Sid`] borrows its buffer shared and
//! is `Copy`; [`SidMut`] borrows it exclusively and hands out write
//! handles.
//!
//! Kernel code sees descriptors through [`FieldDescriptor`], which is also
//! implemented by bundles (tuples and [`composite!`](crate::composite)
//! structs), so one launch path serves a single field and a bundle alike.

use std::fmt;

use crate::dim::{Dim, DimKey, H};
use crate::error::ContractViolation;
use crate::ptr::{ElementGuard, MutBuf, Ptr, PtrMut, SharedBuf, Shift, Unit};
use crate::stride::{BoundMap, Layout, StrideMap};

/// Where a descriptor's buffer lives.
///
/// A backend accepts only descriptors built for its own storage kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StorageKind {
    /// Host heap, used by the sequential backend.
    Host,
    /// Memory owned by the parallel backend's allocator.
    Device,
}

// ── Traits ─────────────────────────────────────────────────────────

/// Strides of a descriptor or bundle.
///
/// For a bundle, a tag is carried when at least one member carries it, and
/// members without it get a zero step.
pub trait StrideSet: Copy + Send + Sync {
    /// Per-tag step of the matching handle.
    type Step: Copy + Send + Sync;

    /// Whether any member has a stride for `dim`.
    fn carries(&self, dim: DimKey) -> bool;

    /// Step along `dim`, zero for members without it.
    fn step_of(&self, dim: DimKey) -> Self::Step;

    /// Step along `dim`, or [`ContractViolation::MissingStride`].
    fn step(&self, dim: DimKey) -> Result<Self::Step, ContractViolation> {
        if self.carries(dim) {
            Ok(self.step_of(dim))
        } else {
            Err(ContractViolation::MissingStride { dim: dim.name() })
        }
    }
}

impl StrideSet for StrideMap {
    type Step = isize;

    fn carries(&self, dim: DimKey) -> bool {
        self.contains(dim)
    }

    fn step_of(&self, dim: DimKey) -> isize {
        self.get(dim).unwrap_or(0)
    }
}

/// Thread-shareable form of a descriptor, used by parallel backends.
pub trait SharedDescriptor: Send + Sync {
    /// Handle produced for one unit.
    type Handle;

    /// Origin positioned at the unit's outer index, with writes confined to
    /// that element.
    fn unit_origin(&self, unit: &Unit) -> Self::Handle;
}

/// A field descriptor or a bundle of them.
///
/// This trait is sealed: it is implemented by [`Sid`], [`SidMut`], tuples
/// of descriptors and structs declared with
/// [`composite!`](crate::composite).
pub trait FieldDescriptor: crate::__private::Sealed {
    /// Handle returned by [`origin`](FieldDescriptor::origin).
    type Handle: Shift<Step = <Self::Strides as StrideSet>::Step>;
    /// Strides returned by [`strides`](FieldDescriptor::strides).
    type Strides: StrideSet;
    /// Bounds returned by [`upper_bounds`](FieldDescriptor::upper_bounds).
    type Bounds: Copy;
    /// Thread-shareable form, see [`share`](FieldDescriptor::share).
    type Shared: SharedDescriptor<Handle = Self::Handle>;

    /// Handle at the descriptor's current position.
    fn origin(&self) -> Self::Handle;

    /// Strides of the descriptor.
    fn strides(&self) -> Self::Strides;

    /// Upper bounds of the descriptor, relative to its current position.
    fn upper_bounds(&self) -> Self::Bounds;

    /// Origin moved `index` steps along `dim`.
    ///
    /// Write handles in the result are confined to that element along `dim`.
    fn element_origin(&self, dim: DimKey, index: usize) -> Self::Handle;

    /// Snapshot that parallel units can share.
    fn share(&self) -> Self::Shared;

    /// Launch-time check of one bundle member against an outer loop of
    /// `extent` along `dim` on a backend using `storage`.
    ///
    /// Read-only members without a stride for `dim` are accepted and stay
    /// fixed while the bundle advances.
    fn check_member(
        &self,
        dim: DimKey,
        extent: usize,
        storage: StorageKind,
    ) -> Result<(), ContractViolation>;

    /// Launch-time check of the whole descriptor: `dim` must be carried and
    /// every member must pass [`check_member`](FieldDescriptor::check_member).
    fn check_outer(
        &self,
        dim: DimKey,
        extent: usize,
        storage: StorageKind,
    ) -> Result<(), ContractViolation> {
        if !self.strides().carries(dim) {
            return Err(ContractViolation::MissingStride { dim: dim.name() });
        }
        self.check_member(dim, extent, storage)
    }
}

fn check_storage(expected: StorageKind, found: StorageKind) -> Result<(), ContractViolation> {
    if expected == found {
        Ok(())
    } else {
        Err(ContractViolation::StorageMismatch { expected, found })
    }
}

fn shift_bound(bounds: &mut BoundMap, dim: DimKey, count: isize) -> Result<(), ContractViolation> {
    if let Some(b) = bounds.get(dim) {
        let moved = (b as isize).saturating_sub(count).max(0) as usize;
        bounds.insert(dim, moved)?;
    }
    Ok(())
}

// ── Sid ────────────────────────────────────────────────────────────

/// Read-only strided descriptor over a `&'a [T]`.
pub struct Sid<'a, T> {
    data: &'a [T],
    offset: isize,
    strides: StrideMap,
    bounds: BoundMap,
    storage: StorageKind,
}

impl<T> Clone for Sid<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Sid<'_, T> {}

impl<'a, T> Sid<'a, T> {
    /// Descriptor over `data` addressed by `layout`.
    ///
    /// Fails with [`ContractViolation::LayoutMismatch`] if the layout
    /// reaches past the end of `data`.
    pub fn new(
        data: &'a [T],
        layout: &Layout,
        storage: StorageKind,
    ) -> Result<Self, ContractViolation> {
        let (strides, bounds, span) = layout.resolve()?;
        if span > data.len() {
            return Err(ContractViolation::LayoutMismatch {
                expected: span,
                actual: data.len(),
            });
        }
        Ok(Self::from_parts(data, strides, bounds, storage))
    }

    /// Descriptor from explicit parts. Accesses stay bounds-checked.
    pub fn from_parts(
        data: &'a [T],
        strides: StrideMap,
        bounds: BoundMap,
        storage: StorageKind,
    ) -> Self {
        Self {
            data,
            offset: 0,
            strides,
            bounds,
            storage,
        }
    }

    /// One-dimensional horizontal field: stride 1, bound `data.len()`.
    pub fn horizontal(data: &'a [T], storage: StorageKind) -> Self {
        let mut strides = StrideMap::new();
        let mut bounds = BoundMap::new();
        // Inserting into empty maps cannot fail.
        let _ = strides.insert(H::key(), 1);
        let _ = bounds.insert(H::key(), data.len());
        Self::from_parts(data, strides, bounds, storage)
    }

    /// Read handle at the current position.
    pub fn origin(&self) -> Ptr<'a, T> {
        Ptr::new(self.data, self.offset)
    }

    /// Stride map.
    pub fn strides(&self) -> StrideMap {
        self.strides
    }

    /// Bound map, relative to the current position.
    pub fn upper_bounds(&self) -> BoundMap {
        self.bounds
    }

    /// Storage kind the descriptor was built for.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Underlying buffer.
    pub fn data(&self) -> &'a [T] {
        self.data
    }

    /// Bound along `D`, or [`ContractViolation::MissingBound`].
    pub fn upper_bound<D: Dim>(&self) -> Result<usize, ContractViolation> {
        self.bounds
            .get_dim::<D>()
            .ok_or(ContractViolation::MissingBound { dim: D::NAME })
    }

    /// Descriptor moved `count` steps along `D`.
    ///
    /// The bound along `D` shrinks (or grows) by `count`.
    pub fn shifted<D: Dim>(mut self, count: isize) -> Result<Self, ContractViolation> {
        let step = self.strides.step(D::key())?;
        self.offset = self.offset.wrapping_add(step.wrapping_mul(count));
        shift_bound(&mut self.bounds, D::key(), count)?;
        Ok(self)
    }

    /// Same descriptor with tag `From` renamed to `To`.
    pub fn rename<From: Dim, To: Dim>(mut self) -> Result<Self, ContractViolation> {
        self.strides = self.strides.rename(From::key(), To::key())?;
        self.bounds = self.bounds.rename(From::key(), To::key())?;
        Ok(self)
    }

    /// Package this field as the target of a neighbour fold.
    ///
    /// Needs a horizontal stride and bound.
    pub fn neighbors(&self) -> Result<Neighbors<'a, T>, ContractViolation> {
        let stride = self.strides.step(H::key())?;
        let count = self.upper_bound::<H>()?;
        Ok(Neighbors::new(self.origin(), stride, count))
    }
}

impl<T> fmt::Debug for Sid<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sid")
            .field("len", &self.data.len())
            .field("offset", &self.offset)
            .field("strides", &self.strides)
            .field("bounds", &self.bounds)
            .field("storage", &self.storage)
            .finish()
    }
}

impl<T> crate::__private::Sealed for Sid<'_, T> {}

impl<'a, T: Sync> FieldDescriptor for Sid<'a, T> {
    type Handle = Ptr<'a, T>;
    type Strides = StrideMap;
    type Bounds = BoundMap;
    type Shared = Self;

    fn origin(&self) -> Ptr<'a, T> {
        Sid::origin(self)
    }

    fn strides(&self) -> StrideMap {
        self.strides
    }

    fn upper_bounds(&self) -> BoundMap {
        self.bounds
    }

    fn element_origin(&self, dim: DimKey, index: usize) -> Ptr<'a, T> {
        self.origin()
            .shifted(self.strides.step_of(dim), index as isize)
    }

    fn share(&self) -> Self {
        *self
    }

    fn check_member(
        &self,
        dim: DimKey,
        extent: usize,
        storage: StorageKind,
    ) -> Result<(), ContractViolation> {
        check_storage(storage, self.storage)?;
        if !self.strides.contains(dim) {
            return Ok(());
        }
        match self.bounds.get(dim) {
            Some(bound) if bound < extent => Err(ContractViolation::ExtentMismatch {
                dim: dim.name(),
                extent,
                bound,
            }),
            _ => Ok(()),
        }
    }
}

impl<'a, T: Sync> SharedDescriptor for Sid<'a, T> {
    type Handle = Ptr<'a, T>;

    fn unit_origin(&self, unit: &Unit) -> Ptr<'a, T> {
        self.element_origin(unit.dim(), unit.index())
    }
}

// ── SidMut ─────────────────────────────────────────────────────────

/// Writable strided descriptor over a `&'a mut [T]`.
///
/// Handles obtained from a `SidMut` behave like `Cell`s: several may point
/// at the same element on one thread. They cannot cross threads; parallel
/// backends go through [`share`](FieldDescriptor::share) instead, which
/// only yields element-guarded handles.
pub struct SidMut<'a, T> {
    buf: MutBuf<'a, T>,
    offset: isize,
    strides: StrideMap,
    bounds: BoundMap,
    storage: StorageKind,
}

impl<'a, T> SidMut<'a, T> {
    /// Descriptor over `data` addressed by `layout`.
    pub fn new(
        data: &'a mut [T],
        layout: &Layout,
        storage: StorageKind,
    ) -> Result<Self, ContractViolation> {
        let (strides, bounds, span) = layout.resolve()?;
        if span > data.len() {
            return Err(ContractViolation::LayoutMismatch {
                expected: span,
                actual: data.len(),
            });
        }
        Ok(Self::from_parts(data, strides, bounds, storage))
    }

    /// Descriptor from explicit parts. Accesses stay bounds-checked.
    pub fn from_parts(
        data: &'a mut [T],
        strides: StrideMap,
        bounds: BoundMap,
        storage: StorageKind,
    ) -> Self {
        Self {
            buf: MutBuf::new(data),
            offset: 0,
            strides,
            bounds,
            storage,
        }
    }

    /// One-dimensional horizontal field: stride 1, bound `data.len()`.
    pub fn horizontal(data: &'a mut [T], storage: StorageKind) -> Self {
        let len = data.len();
        let mut strides = StrideMap::new();
        let mut bounds = BoundMap::new();
        let _ = strides.insert(H::key(), 1);
        let _ = bounds.insert(H::key(), len);
        Self::from_parts(data, strides, bounds, storage)
    }

    /// Write handle at the current position, not confined to any element.
    pub fn origin(&self) -> PtrMut<'a, T> {
        self.buf.ptr_mut(self.offset, None)
    }

    /// Stride map.
    pub fn strides(&self) -> StrideMap {
        self.strides
    }

    /// Bound map, relative to the current position.
    pub fn upper_bounds(&self) -> BoundMap {
        self.bounds
    }

    /// Storage kind the descriptor was built for.
    pub fn storage(&self) -> StorageKind {
        self.storage
    }

    /// Bound along `D`, or [`ContractViolation::MissingBound`].
    pub fn upper_bound<D: Dim>(&self) -> Result<usize, ContractViolation> {
        self.bounds
            .get_dim::<D>()
            .ok_or(ContractViolation::MissingBound { dim: D::NAME })
    }

    /// Descriptor moved `count` steps along `D`.
    pub fn shifted<D: Dim>(mut self, count: isize) -> Result<Self, ContractViolation> {
        let step = self.strides.step(D::key())?;
        self.offset = self.offset.wrapping_add(step.wrapping_mul(count));
        shift_bound(&mut self.bounds, D::key(), count)?;
        Ok(self)
    }

    /// Same descriptor with tag `From` renamed to `To`.
    pub fn rename<From: Dim, To: Dim>(mut self) -> Result<Self, ContractViolation> {
        self.strides = self.strides.rename(From::key(), To::key())?;
        self.bounds = self.bounds.rename(From::key(), To::key())?;
        Ok(self)
    }

    fn unit_offset(&self, dim: DimKey, index: usize) -> isize {
        self.offset
            .wrapping_add(self.strides.step_of(dim).wrapping_mul(index as isize))
    }
}

impl<T> fmt::Debug for SidMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SidMut")
            .field("len", &self.buf.len())
            .field("offset", &self.offset)
            .field("strides", &self.strides)
            .field("bounds", &self.bounds)
            .field("storage", &self.storage)
            .finish()
    }
}

impl<T> crate::__private::Sealed for SidMut<'_, T> {}

impl<'a, T: Send> FieldDescriptor for SidMut<'a, T> {
    type Handle = PtrMut<'a, T>;
    type Strides = StrideMap;
    type Bounds = BoundMap;
    type Shared = SharedSidMut<'a, T>;

    fn origin(&self) -> PtrMut<'a, T> {
        SidMut::origin(self)
    }

    fn strides(&self) -> StrideMap {
        self.strides
    }

    fn upper_bounds(&self) -> BoundMap {
        self.bounds
    }

    fn element_origin(&self, dim: DimKey, index: usize) -> PtrMut<'a, T> {
        let offset = self.unit_offset(dim, index);
        let guard = self
            .bounds
            .get(dim)
            .filter(|&bound| index < bound)
            .and_then(|_| ElementGuard::for_element(&self.strides, dim, self.offset, index));
        match guard {
            Some(g) => self.buf.ptr_mut(offset, Some(g)),
            // Not partitionable: a handle that admits nothing.
            None => self.buf.ptr_denied(offset),
        }
    }

    fn share(&self) -> SharedSidMut<'a, T> {
        SharedSidMut {
            buf: self.buf.share(),
            offset: self.offset,
            strides: self.strides,
            bounds: self.bounds,
        }
    }

    fn check_member(
        &self,
        dim: DimKey,
        extent: usize,
        storage: StorageKind,
    ) -> Result<(), ContractViolation> {
        check_storage(storage, self.storage)?;
        match self.strides.get(dim) {
            Some(s) if s > 0 => {}
            _ => return Err(ContractViolation::NotAddressable { dim: dim.name() }),
        }
        let bound = self
            .bounds
            .get(dim)
            .ok_or(ContractViolation::MissingBound { dim: dim.name() })?;
        if bound < extent {
            return Err(ContractViolation::ExtentMismatch {
                dim: dim.name(),
                extent,
                bound,
            });
        }
        Ok(())
    }
}

/// Thread-shareable snapshot of a [`SidMut`].
pub struct SharedSidMut<'a, T> {
    buf: SharedBuf<'a, T>,
    offset: isize,
    strides: StrideMap,
    bounds: BoundMap,
}

impl<'a, T: Send> SharedDescriptor for SharedSidMut<'a, T> {
    type Handle = PtrMut<'a, T>;

    fn unit_origin(&self, unit: &Unit) -> PtrMut<'a, T> {
        let step = self.strides.step_of(unit.dim());
        let offset = self
            .offset
            .wrapping_add(step.wrapping_mul(unit.index() as isize));
        let extent = self.bounds.get(unit.dim()).unwrap_or(0);
        self.buf
            .unit_ptr(unit, offset, self.offset, &self.strides, extent)
    }
}

impl<T> fmt::Debug for SharedSidMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSidMut")
            .field("buf", &self.buf)
            .field("offset", &self.offset)
            .finish()
    }
}

// ── Neighbors ──────────────────────────────────────────────────────

/// Target field of a neighbour fold: origin plus the stride that steps
/// from one target element to the next.
pub struct Neighbors<'a, T> {
    origin: Ptr<'a, T>,
    stride: isize,
    count: usize,
}

impl<T> Clone for Neighbors<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Neighbors<'_, T> {}

impl<'a, T> Neighbors<'a, T> {
    /// Target of `count` elements starting at `origin`, `stride` apart.
    pub fn new(origin: Ptr<'a, T>, stride: isize, count: usize) -> Self {
        Self {
            origin,
            stride,
            count,
        }
    }

    /// Handle at target element `index`.
    pub fn at(&self, index: isize) -> Ptr<'a, T> {
        self.origin.shifted(self.stride, index)
    }

    /// Number of target elements.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Stride between target elements.
    pub fn stride(&self) -> isize {
        self.stride
    }
}

impl<T> fmt::Debug for Neighbors<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Neighbors")
            .field("origin", &self.origin)
            .field("stride", &self.stride)
            .field("count", &self.count)
            .finish()
    }
}

/// Maximum degree of a connectivity field: its bound along the slot tag `D`.
pub fn max_degree<D: Dim, T>(sid: &Sid<'_, T>) -> Result<usize, ContractViolation> {
    sid.upper_bound::<D>()
}

// ── Field contract ─────────────────────────────────────────────────

/// Objects that can describe themselves as a read-only field.
pub trait IntoSid<T> {
    /// Descriptor for a backend using `storage`.
    fn sid(&self, storage: StorageKind) -> Sid<'_, T>;
}

/// Objects that can describe themselves as a writable field.
pub trait IntoSidMut<T> {
    /// Descriptor for a backend using `storage`.
    fn sid_mut(&mut self, storage: StorageKind) -> SidMut<'_, T>;
}

impl<T> IntoSid<T> for [T] {
    fn sid(&self, storage: StorageKind) -> Sid<'_, T> {
        Sid::horizontal(self, storage)
    }
}

impl<T> IntoSid<T> for Vec<T> {
    fn sid(&self, storage: StorageKind) -> Sid<'_, T> {
        Sid::horizontal(self, storage)
    }
}

impl<T> IntoSidMut<T> for [T] {
    fn sid_mut(&mut self, storage: StorageKind) -> SidMut<'_, T> {
        SidMut::horizontal(self, storage)
    }
}

impl<T> IntoSidMut<T> for Vec<T> {
    fn sid_mut(&mut self, storage: StorageKind) -> SidMut<'_, T> {
        SidMut::horizontal(self, storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::{K, N};

    fn hk_layout(h: usize, k: usize) -> Layout {
        Layout::new().dim::<H>(h).dim::<K>(k)
    }

    // ── Sid ────────────────────────────────────────────────────

    #[test]
    fn shift_matches_true_offset() {
        let data: Vec<i32> = (0..12).collect();
        let sid = Sid::new(&data, &hk_layout(4, 3), StorageKind::Host).unwrap();
        let s = sid.shifted::<H>(2).unwrap().shifted::<K>(1).unwrap();
        assert_eq!(s.origin().get(), 2 * 3 + 1);
        assert_eq!(s.upper_bound::<H>().unwrap(), 2);
        // The original is unchanged.
        assert_eq!(sid.origin().get(), 0);
        assert_eq!(sid.upper_bound::<H>().unwrap(), 4);
    }

    #[test]
    fn layout_longer_than_buffer_rejected() {
        let data = [0.0f64; 5];
        let err = Sid::new(&data, &hk_layout(2, 3), StorageKind::Host).unwrap_err();
        assert_eq!(
            err,
            ContractViolation::LayoutMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn missing_stride_and_bound_reported() {
        let data = [1u8; 4];
        let sid = Sid::horizontal(&data, StorageKind::Host);
        assert_eq!(
            sid.shifted::<K>(1).unwrap_err(),
            ContractViolation::MissingStride { dim: "k" }
        );
        assert_eq!(
            sid.upper_bound::<N>().unwrap_err(),
            ContractViolation::MissingBound { dim: "n" }
        );
    }

    #[test]
    fn rename_reinterprets_axis() {
        let table = [0i32, 1, 1, 2, 2, 0];
        let sid = Sid::new(
            &table,
            &Layout::new().dim::<H>(3).dim::<N>(2),
            StorageKind::Host,
        )
        .unwrap();
        crate::dimension!(E2V);
        let renamed = sid.rename::<N, E2V>().unwrap();
        assert_eq!(max_degree::<E2V, _>(&renamed).unwrap(), 2);
        assert!(max_degree::<N, _>(&renamed).is_err());
        assert_eq!(renamed.shifted::<E2V>(1).unwrap().origin().get(), 1);
    }

    #[test]
    fn element_origin_moves_along_dim() {
        let data: Vec<i32> = (0..6).collect();
        let sid = Sid::new(&data, &hk_layout(3, 2), StorageKind::Host).unwrap();
        let p = FieldDescriptor::element_origin(&sid, H::key(), 2);
        assert_eq!(p.get(), 4);
        // A tag the field does not carry leaves the handle in place.
        let q = FieldDescriptor::element_origin(&sid, N::key(), 2);
        assert_eq!(q.get(), 0);
    }

    #[test]
    fn read_member_check() {
        let data = [0i32; 8];
        let sid = Sid::horizontal(&data, StorageKind::Host);
        assert!(sid.check_outer(H::key(), 8, StorageKind::Host).is_ok());
        assert_eq!(
            sid.check_outer(H::key(), 9, StorageKind::Host).unwrap_err(),
            ContractViolation::ExtentMismatch {
                dim: "h",
                extent: 9,
                bound: 8
            }
        );
        assert_eq!(
            sid.check_outer(H::key(), 8, StorageKind::Device).unwrap_err(),
            ContractViolation::StorageMismatch {
                expected: StorageKind::Device,
                found: StorageKind::Host
            }
        );
        // Alone, a field must carry the outer tag; as a member it may not.
        assert!(sid.check_outer(K::key(), 3, StorageKind::Host).is_err());
        assert!(sid.check_member(K::key(), 3, StorageKind::Host).is_ok());
    }

    #[test]
    fn neighbors_need_horizontal_stride() {
        let data = [1.0f64, 2.0, 3.0];
        let n = Sid::horizontal(&data, StorageKind::Host).neighbors().unwrap();
        assert_eq!(n.count(), 3);
        assert_eq!(n.at(2).get(), 3.0);
        let vertical = Sid::new(&data, &Layout::new().dim::<K>(3), StorageKind::Host).unwrap();
        assert!(vertical.neighbors().is_err());
    }

    // ── SidMut ─────────────────────────────────────────────────

    #[test]
    fn writes_land_at_element_offsets() {
        let mut data = vec![0.0f64; 6];
        {
            let sid = SidMut::new(&mut data, &hk_layout(3, 2), StorageKind::Host).unwrap();
            for h in 0..3 {
                let p = sid.element_origin(H::key(), h);
                p.set(h as f64);
                p.shifted(1, 1).set(h as f64 + 0.5);
            }
        }
        assert_eq!(data, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn element_origin_is_confined() {
        let mut data = vec![0i32; 4];
        let sid = SidMut::horizontal(&mut data, StorageKind::Host);
        let p = sid.element_origin(H::key(), 1);
        assert!(p.try_set(7));
        assert!(!p.shifted(1, 1).try_set(8));
        // Index past the bound or an unpartitioned tag admits nothing.
        assert!(!sid.element_origin(H::key(), 4).try_set(1));
        assert!(!sid.element_origin(K::key(), 0).try_set(1));
        drop(sid);
        assert_eq!(data, vec![0, 7, 0, 0]);
    }

    #[test]
    fn element_origin_on_padded_level_major_layout() {
        let mut data = vec![0u8; 8];
        let layout = Layout::new()
            .dim_with_stride::<K>(2, 4)
            .dim_with_stride::<H>(3, 1);
        let sid = SidMut::new(&mut data, &layout, StorageKind::Host).unwrap();
        for h in 0..3 {
            let p = sid.element_origin(H::key(), h);
            assert!(p.try_set(1));
            assert!(p.shifted(4, 1).try_set(2));
        }
        // Offset 6 is element 2, level 1.
        assert!(!sid.element_origin(H::key(), 0).shifted(1, 6).try_set(9));
        // A field shifted one level down keeps each element's owner.
        let lower = sid.shifted::<K>(1).unwrap();
        assert!(lower.element_origin(H::key(), 1).shifted(4, -1).try_set(3));
        drop(lower);
        assert_eq!(data, vec![1, 3, 1, 0, 2, 2, 2, 0]);
    }

    #[test]
    fn writable_member_check() {
        let mut data = vec![0u32; 6];
        let level_major = SidMut::new(
            &mut data,
            &Layout::new().dim::<K>(2).dim::<H>(3),
            StorageKind::Host,
        )
        .unwrap();
        assert!(level_major.check_member(H::key(), 3, StorageKind::Host).is_ok());
        assert_eq!(
            level_major
                .check_member(N::key(), 3, StorageKind::Host)
                .unwrap_err(),
            ContractViolation::NotAddressable { dim: "n" }
        );
        assert_eq!(
            level_major
                .check_member(H::key(), 4, StorageKind::Host)
                .unwrap_err(),
            ContractViolation::ExtentMismatch {
                dim: "h",
                extent: 4,
                bound: 3
            }
        );
    }

    #[test]
    #[allow(unsafe_code)]
    fn shared_units_write_their_own_element() {
        let mut data = vec![0i64; 4];
        {
            let sid = SidMut::horizontal(&mut data, StorageKind::Device);
            let shared = sid.share();
            std::thread::scope(|s| {
                for idx in 0..4usize {
                    let shared = &shared;
                    s.spawn(move || {
                        // SAFETY: each thread owns a distinct index.
                        let unit = unsafe { Unit::new_unchecked(H::key(), idx) };
                        let p = shared.unit_origin(&unit);
                        p.set(idx as i64 * 100);
                        assert!(!p.shifted(1, 1).try_set(-1));
                    });
                }
            });
        }
        assert_eq!(data, vec![0, 100, 200, 300]);
    }

    // ── Field contract ─────────────────────────────────────────

    #[test]
    fn vec_is_horizontal_field() {
        let mut v = vec![1, 2, 3];
        assert_eq!(v.sid(StorageKind::Host).upper_bound::<H>().unwrap(), 3);
        let sid = v.sid_mut(StorageKind::Device);
        assert_eq!(sid.storage(), StorageKind::Device);
        sid.origin().shifted(1, 2).set(30);
        assert_eq!(v, vec![1, 2, 30]);
    }
}
