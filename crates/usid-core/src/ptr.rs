//! Element handles.
//!
//! A handle is what a descriptor's `origin()` hands to a kernel body: a
//! position inside a borrowed buffer that can be shifted by a signed count
//! of strides and dereferenced. [`Ptr`] reads, [`PtrMut`] reads and writes.
//!
//! Every dereference is checked against the underlying allocation, the same
//! way slice indexing is. A [`PtrMut`] produced for one outer element by
//! [`FieldDescriptor::element_origin`](crate::FieldDescriptor::element_origin)
//! additionally refuses to touch any other outer element, which is what
//! makes it sound for parallel units to write through disjoint copies of
//! one descriptor.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use smallvec::SmallVec;

use crate::dim::DimKey;
use crate::stride::{StrideMap, MAX_DIMS};

/// Advance a handle by a signed number of steps.
///
/// `Step` is `isize` for a single field and a tuple (or generated struct)
/// of member steps for a bundle, so a bundle advances all its members at
/// once.
pub trait Shift: Copy {
    /// Per-tag step of this handle.
    type Step: Copy;

    /// Move `count` steps in place.
    fn shift_by(&mut self, step: Self::Step, count: isize);

    /// Copy of `self` moved `count` steps.
    fn shifted_by(&self, step: Self::Step, count: isize) -> Self {
        let mut out = *self;
        out.shift_by(step, count);
        out
    }
}

#[cold]
#[inline(never)]
#[track_caller]
fn out_of_bounds(offset: isize, len: usize) -> ! {
    panic!("handle offset {offset} out of bounds for buffer of length {len}")
}

#[cold]
#[inline(never)]
#[track_caller]
fn foreign_element(offset: isize, guard: &ElementGuard) -> ! {
    panic!(
        "handle offset {offset} belongs to element {} but this unit owns element {}",
        guard.element_of(offset),
        guard.owner
    )
}

#[inline]
fn checked_index(offset: isize, len: usize) -> Option<usize> {
    usize::try_from(offset).ok().filter(|&i| i < len)
}

// ── Ptr ────────────────────────────────────────────────────────────

/// Read handle into a `&'a [T]`.
pub struct Ptr<'a, T> {
    base: NonNull<T>,
    len: usize,
    offset: isize,
    _marker: PhantomData<&'a [T]>,
}

// SAFETY: a `Ptr` only ever reads through `base`, exactly like `&'a [T]`,
// which is `Send` and `Sync` when `T: Sync`.
unsafe impl<T: Sync> Send for Ptr<'_, T> {}
// SAFETY: see above.
unsafe impl<T: Sync> Sync for Ptr<'_, T> {}

impl<T> Clone for Ptr<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Ptr<'_, T> {}

impl<'a, T> Ptr<'a, T> {
    /// Handle at offset `offset` of `data`.
    pub fn new(data: &'a [T], offset: isize) -> Self {
        Self {
            base: NonNull::from(data).cast(),
            len: data.len(),
            offset,
            _marker: PhantomData,
        }
    }

    /// Offset from the start of the buffer, in elements.
    pub fn offset(&self) -> isize {
        self.offset
    }

    /// Length of the underlying buffer.
    pub fn buffer_len(&self) -> usize {
        self.len
    }

    /// Whether the handle currently points inside the buffer.
    pub fn in_bounds(&self) -> bool {
        checked_index(self.offset, self.len).is_some()
    }

    /// Reference to the element under the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle points outside the buffer.
    #[track_caller]
    pub fn get_ref(&self) -> &'a T {
        match self.try_get_ref() {
            Some(v) => v,
            None => out_of_bounds(self.offset, self.len),
        }
    }

    /// Reference to the element under the handle, `None` if out of bounds.
    pub fn try_get_ref(&self) -> Option<&'a T> {
        let i = checked_index(self.offset, self.len)?;
        // SAFETY: `i < len`, and `base..base + len` is the `&'a [T]` this
        // handle was built from.
        unsafe {
            Some(&*self.base.as_ptr().add(i))
        }
    }

    /// Value under the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle points outside the buffer.
    #[track_caller]
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.get_ref()
    }

    /// Value under the handle, `None` if out of bounds.
    pub fn try_get(&self) -> Option<T>
    where
        T: Copy,
    {
        self.try_get_ref().copied()
    }

    /// Value under the handle without the bounds check.
    ///
    /// # Safety
    ///
    /// The handle must point inside the buffer (`0 <= offset < len`).
    pub unsafe fn get_unchecked(&self) -> T
    where
        T: Copy,
    {
        debug_assert!(self.in_bounds());
        // SAFETY: upheld by the caller.
        unsafe { *self.base.as_ptr().offset(self.offset) }
    }

    /// Copy of `self` moved `count * stride` elements.
    pub fn shifted(self, stride: isize, count: isize) -> Self {
        self.shifted_by(stride, count)
    }
}

impl<T> Shift for Ptr<'_, T> {
    type Step = isize;

    #[inline]
    fn shift_by(&mut self, step: isize, count: isize) {
        self.offset = self.offset.wrapping_add(step.wrapping_mul(count));
    }
}

impl<T> fmt::Debug for Ptr<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ptr")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

// ── ElementGuard ───────────────────────────────────────────────────

/// Confines a [`PtrMut`] to one element along the outer dimension.
///
/// An offset is split into coordinates by taking the field's positive
/// strides from largest to smallest, each absorbing the whole steps that
/// fit. The offset belongs to the element named by its outer coordinate,
/// which is exact for any layout whose strides nest, padded or not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementGuard {
    strides: [isize; MAX_DIMS],
    outer: usize,
    owner: usize,
}

impl ElementGuard {
    /// Guard for element `index` along `dim` of a field whose origin is
    /// at `base`. `None` when `dim` has no positive stride.
    ///
    /// The owner is the outer coordinate of `base` plus `index`, so
    /// distinct indices always yield distinct owners.
    pub(crate) fn for_element(
        strides: &StrideMap,
        dim: DimKey,
        base: isize,
        index: usize,
    ) -> Option<Self> {
        strides.get(dim).filter(|&s| s > 0)?;
        let mut sorted: SmallVec<[(isize, bool); MAX_DIMS]> = strides
            .iter()
            .filter(|&(_, s)| s > 0)
            .map(|(key, s)| (s, key == dim))
            .collect();
        // Largest first; on a tie the outer dimension wins.
        sorted.sort_unstable_by(|a, b| b.cmp(a));

        let mut guard = Self {
            strides: [0; MAX_DIMS],
            outer: 0,
            owner: 0,
        };
        for (i, &(stride, is_outer)) in sorted.iter().enumerate() {
            guard.strides[i] = stride;
            if is_outer {
                guard.outer = i;
            }
        }
        guard.owner = guard.element_of(base).wrapping_add(index);
        Some(guard)
    }

    /// Outer element the guard admits.
    pub fn owner(&self) -> usize {
        self.owner
    }

    fn element_of(&self, offset: isize) -> usize {
        let mut rest = offset;
        for &stride in &self.strides[..self.outer] {
            rest = rest.rem_euclid(stride);
        }
        rest.div_euclid(self.strides[self.outer]) as usize
    }

    fn admits(&self, offset: isize) -> bool {
        self.element_of(offset) == self.owner
    }
}

// ── PtrMut ─────────────────────────────────────────────────────────

/// Read/write handle into a `&'a mut [T]`.
///
/// `PtrMut` is `Copy` but neither `Send` nor `Sync`: copies never leave the
/// thread that created them, so two threads can only write through the
/// same buffer via distinct element-guarded handles.
pub struct PtrMut<'a, T> {
    base: NonNull<T>,
    len: usize,
    offset: isize,
    guard: Option<ElementGuard>,
    _marker: PhantomData<&'a mut [T]>,
}

impl<T> Clone for PtrMut<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PtrMut<'_, T> {}

impl<'a, T> PtrMut<'a, T> {
    /// Handle built from a raw buffer start by a writable descriptor.
    ///
    /// `base..base + len` must be a live `&'a mut [T]` whose only other
    /// users are handles derived from the same descriptor.
    pub(crate) fn from_raw(
        base: NonNull<T>,
        len: usize,
        offset: isize,
        guard: Option<ElementGuard>,
    ) -> Self {
        Self {
            base,
            len,
            offset,
            guard,
            _marker: PhantomData,
        }
    }

    /// Offset from the start of the buffer, in elements.
    pub fn offset(&self) -> isize {
        self.offset
    }

    /// Length of the underlying buffer.
    pub fn buffer_len(&self) -> usize {
        self.len
    }

    /// Element guard, if this handle was produced for one outer element.
    pub fn guard(&self) -> Option<ElementGuard> {
        self.guard
    }

    /// Whether the handle may access the element it points at.
    pub fn accessible(&self) -> bool {
        self.index().is_some()
    }

    fn index(&self) -> Option<usize> {
        let i = checked_index(self.offset, self.len)?;
        match &self.guard {
            Some(g) if !g.admits(self.offset) => None,
            _ => Some(i),
        }
    }

    #[track_caller]
    fn checked(&self) -> usize {
        match checked_index(self.offset, self.len) {
            None => out_of_bounds(self.offset, self.len),
            Some(i) => match &self.guard {
                Some(g) if !g.admits(self.offset) => foreign_element(self.offset, g),
                _ => i,
            },
        }
    }

    /// Value under the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle points outside the buffer or outside its
    /// owning element.
    #[track_caller]
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        let i = self.checked();
        // SAFETY: `i < len` and the element is not written concurrently:
        // only the owning unit's handles admit it.
        unsafe {
            self.base.as_ptr().add(i).read()
        }
    }

    /// Value under the handle, `None` if not accessible.
    pub fn try_get(&self) -> Option<T>
    where
        T: Copy,
    {
        let i = self.index()?;
        // SAFETY: as in `get`.
        unsafe {
            Some(self.base.as_ptr().add(i).read())
        }
    }

    /// Store `value` under the handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle points outside the buffer or outside its
    /// owning element.
    #[track_caller]
    pub fn set(&self, value: T)
    where
        T: Copy,
    {
        let i = self.checked();
        // SAFETY: `i < len`; no reference into the buffer is alive while a
        // pass runs, and only the owning unit's handles admit this element.
        unsafe {
            self.base.as_ptr().add(i).write(value)
        }
    }

    /// Store `value` under the handle, returning `false` if not accessible.
    pub fn try_set(&self, value: T) -> bool
    where
        T: Copy,
    {
        match self.index() {
            Some(i) => {
                // SAFETY: as in `set`.
                unsafe { self.base.as_ptr().add(i).write(value) };
                true
            }
            None => false,
        }
    }

    /// Read-modify-write of the element under the handle.
    #[track_caller]
    pub fn update(&self, f: impl FnOnce(T) -> T)
    where
        T: Copy,
    {
        self.set(f(self.get()));
    }

    /// Value under the handle without any check.
    ///
    /// # Safety
    ///
    /// The handle must point inside the buffer and inside its owning element.
    pub unsafe fn get_unchecked(&self) -> T
    where
        T: Copy,
    {
        debug_assert!(self.accessible());
        // SAFETY: upheld by the caller.
        unsafe { self.base.as_ptr().offset(self.offset).read() }
    }

    /// Store `value` without any check.
    ///
    /// # Safety
    ///
    /// The handle must point inside the buffer and inside its owning element.
    pub unsafe fn set_unchecked(&self, value: T)
    where
        T: Copy,
    {
        debug_assert!(self.accessible());
        // SAFETY: upheld by the caller.
        unsafe { self.base.as_ptr().offset(self.offset).write(value) }
    }

    /// Copy of `self` moved `count * stride` elements.
    pub fn shifted(self, stride: isize, count: isize) -> Self {
        self.shifted_by(stride, count)
    }
}

impl<T> Shift for PtrMut<'_, T> {
    type Step = isize;

    #[inline]
    fn shift_by(&mut self, step: isize, count: isize) {
        self.offset = self.offset.wrapping_add(step.wrapping_mul(count));
    }
}

impl<T> fmt::Debug for PtrMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PtrMut")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("guard", &self.guard)
            .finish()
    }
}

// ── Buffers ────────────────────────────────────────────────────────

/// A writable buffer borrowed for `'a`, addressed only through handles.
///
/// Holds the raw parts of a `&'a mut [T]`. No reference into the buffer is
/// ever created while a `MutBuf` is alive: all access goes through
/// [`PtrMut`], which reads and writes by value.
pub(crate) struct MutBuf<'a, T> {
    base: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T> MutBuf<'a, T> {
    pub(crate) fn new(data: &'a mut [T]) -> Self {
        Self {
            len: data.len(),
            base: NonNull::from(data).cast(),
            _marker: PhantomData,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Handle usable on the current thread only.
    pub(crate) fn ptr_mut(&self, offset: isize, guard: Option<ElementGuard>) -> PtrMut<'a, T> {
        PtrMut::from_raw(self.base, self.len, offset, guard)
    }

    /// Handle that admits no access at all.
    pub(crate) fn ptr_denied(&self, offset: isize) -> PtrMut<'a, T> {
        PtrMut::from_raw(self.base, 0, offset, None)
    }

    pub(crate) fn share(&self) -> SharedBuf<'a, T> {
        SharedBuf {
            base: self.base,
            len: self.len,
            _marker: PhantomData,
        }
    }
}

/// Thread-shareable form of a [`MutBuf`].
///
/// The only way to access the buffer through a `SharedBuf` is
/// [`unit_ptr`](SharedBuf::unit_ptr), which needs a [`Unit`] and always
/// yields a handle guarded to the unit's element.
pub struct SharedBuf<'a, T> {
    base: NonNull<T>,
    len: usize,
    _marker: PhantomData<&'a mut [T]>,
}

// SAFETY: every handle obtained from a `SharedBuf` is element-guarded. The
// `Unit` contract guarantees concurrently live units hold distinct indices,
// distinct indices get distinct owners, and each offset has exactly one
// owner, so threads touch disjoint offsets. Values move between threads,
// hence `T: Send`.
unsafe impl<T: Send> Send for SharedBuf<'_, T> {}
// SAFETY: see above.
unsafe impl<T: Send> Sync for SharedBuf<'_, T> {}

impl<T> Clone for SharedBuf<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedBuf<'_, T> {}

impl<'a, T> SharedBuf<'a, T> {
    /// Handle at `offset` for `unit`, confined to the unit's outer element
    /// of a field with origin `base` and `strides`.
    ///
    /// Distinct unit indices always yield distinct owners. The handle
    /// admits nothing when the outer stride is not positive or when the
    /// unit index is not below `extent`.
    pub(crate) fn unit_ptr(
        &self,
        unit: &Unit,
        offset: isize,
        base: isize,
        strides: &StrideMap,
        extent: usize,
    ) -> PtrMut<'a, T> {
        let guard = if unit.index < extent {
            ElementGuard::for_element(strides, unit.dim, base, unit.index)
        } else {
            None
        };
        match guard {
            Some(g) => PtrMut::from_raw(self.base, self.len, offset, Some(g)),
            None => PtrMut::from_raw(self.base, 0, offset, None),
        }
    }
}

impl<T> fmt::Debug for SharedBuf<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuf").field("len", &self.len).finish()
    }
}

// ── Unit ───────────────────────────────────────────────────────────

/// Proof that the current thread is the only one running one outer element
/// of a launch.
///
/// Backends create one `Unit` per outer index and hand it to
/// [`SharedDescriptor::unit_origin`](crate::SharedDescriptor::unit_origin).
/// A `Unit` cannot leave the thread that created it.
#[derive(Debug)]
pub struct Unit {
    dim: DimKey,
    index: usize,
    _not_send: PhantomData<*const ()>,
}

impl Unit {
    /// Unit for outer `index` along `dim`.
    ///
    /// # Safety
    ///
    /// For the lifetime of the returned value, no other `Unit` with the
    /// same `dim` and `index` may be alive on another thread for the same
    /// shared descriptor, and no thread other than the current one may use
    /// a writable handle of that descriptor's buffers.
    pub unsafe fn new_unchecked(dim: DimKey, index: usize) -> Self {
        Self {
            dim,
            index,
            _not_send: PhantomData,
        }
    }

    /// Outer dimension of the launch.
    pub fn dim(&self) -> DimKey {
        self.dim
    }

    /// Outer index owned by this unit.
    pub fn index(&self) -> usize {
        self.index
    }
}

// ── Bundles ────────────────────────────────────────────────────────

macro_rules! tuple_shift {
    ($($name:ident $idx:tt),+) => {
        impl<$($name: Shift),+> Shift for ($($name,)+) {
            type Step = ($($name::Step,)+);

            #[inline]
            fn shift_by(&mut self, step: Self::Step, count: isize) {
                $( self.$idx.shift_by(step.$idx, count); )+
            }
        }
    };
}

tuple_shift!(A 0);
tuple_shift!(A 0, B 1);
tuple_shift!(A 0, B 1, C 2);
tuple_shift!(A 0, B 1, C 2, D 3);
tuple_shift!(A 0, B 1, C 2, D 3, E 4);
tuple_shift!(A 0, B 1, C 2, D 3, E 4, F 5);
tuple_shift!(A 0, B 1, C 2, D 3, E 4, F 5, G 6);
tuple_shift!(A 0, B 1, C 2, D 3, E 4, F 5, G 6, I 7);
