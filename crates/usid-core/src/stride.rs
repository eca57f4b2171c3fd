//! Stride maps, bound maps and buffer layouts.
//!
//! [`DimMap`] is a small fixed-capacity map from [`DimKey`] to a value.
//! It is `Copy` and never allocates, so a pass can capture a field's
//! strides by value. [`StrideMap`] and [`BoundMap`] are its two uses.
//!
//! [`Layout`] describes how a flat buffer is addressed and resolves into a
//! stride map and a bound map.

use std::fmt;

use smallvec::SmallVec;

use crate::dim::{Dim, DimKey};
use crate::error::ContractViolation;

/// Maximum number of tags in one [`DimMap`].
pub const MAX_DIMS: usize = 6;

/// Fixed-capacity map from dimension tag to a `Copy` value.
///
/// Insertion order is preserved by [`iter`](DimMap::iter).
#[derive(Clone, Copy)]
pub struct DimMap<V: Copy> {
    entries: [Option<(DimKey, V)>; MAX_DIMS],
    len: usize,
}

/// Signed per-tag step, in elements.
pub type StrideMap = DimMap<isize>;

/// Per-tag upper bound (exclusive), in elements.
pub type BoundMap = DimMap<usize>;

impl<V: Copy> DimMap<V> {
    /// Empty map.
    pub fn new() -> Self {
        Self {
            entries: [None; MAX_DIMS],
            len: 0,
        }
    }

    /// Insert or overwrite the value for `key`.
    pub fn insert(&mut self, key: DimKey, value: V) -> Result<(), ContractViolation> {
        for (k, v) in self.entries[..self.len].iter_mut().flatten() {
            if *k == key {
                *v = value;
                return Ok(());
            }
        }
        if self.len == MAX_DIMS {
            return Err(ContractViolation::TooManyDims {
                capacity: MAX_DIMS,
            });
        }
        self.entries[self.len] = Some((key, value));
        self.len += 1;
        Ok(())
    }

    /// Builder form of [`insert`](DimMap::insert) keyed by tag type.
    pub fn with<D: Dim>(mut self, value: V) -> Result<Self, ContractViolation> {
        self.insert(D::key(), value)?;
        Ok(self)
    }

    /// Value for `key`, if present.
    pub fn get(&self, key: DimKey) -> Option<V> {
        self.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Value for tag `D`, if present.
    pub fn get_dim<D: Dim>(&self) -> Option<V> {
        self.get(D::key())
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: DimKey) -> bool {
        self.get(key).is_some()
    }

    /// Replace key `from` by `to`, keeping the value and position.
    ///
    /// Renaming an absent key is a no-op. Renaming onto a key that is
    /// already present is a [`ContractViolation::DuplicateDim`].
    pub fn rename(mut self, from: DimKey, to: DimKey) -> Result<Self, ContractViolation> {
        if from == to || !self.contains(from) {
            return Ok(self);
        }
        if self.contains(to) {
            return Err(ContractViolation::DuplicateDim { dim: to.name() });
        }
        for (k, _) in self.entries[..self.len].iter_mut().flatten() {
            if *k == from {
                *k = to;
            }
        }
        Ok(self)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (DimKey, V)> + '_ {
        self.entries[..self.len].iter().flatten().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<V: Copy> Default for DimMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Copy + PartialEq> PartialEq for DimMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<V: Copy + fmt::Debug> fmt::Debug for DimMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k.name(), v)))
            .finish()
    }
}

// ── Layout ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug)]
struct LayoutDim {
    key: DimKey,
    extent: usize,
    stride: Option<usize>,
}

/// How a flat buffer is addressed.
///
/// Tags added with [`dim`](Layout::dim) are laid out row-major in the
/// order given: the first is outermost, the last has stride 1. Tags added
/// with [`dim_with_stride`](Layout::dim_with_stride) keep the stride they
/// were given and take no part in the row-major computation.
#[derive(Clone, Debug, Default)]
pub struct Layout {
    dims: SmallVec<[LayoutDim; MAX_DIMS]>,
}

impl Layout {
    /// Empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Row-major layout from `(key, extent)` pairs, outermost first.
    pub fn row_major(dims: &[(DimKey, usize)]) -> Self {
        Self {
            dims: dims
                .iter()
                .map(|&(key, extent)| LayoutDim {
                    key,
                    extent,
                    stride: None,
                })
                .collect(),
        }
    }

    /// Append a row-major tag of the given extent.
    pub fn dim<D: Dim>(mut self, extent: usize) -> Self {
        self.dims.push(LayoutDim {
            key: D::key(),
            extent,
            stride: None,
        });
        self
    }

    /// Append a tag with an explicit stride.
    pub fn dim_with_stride<D: Dim>(mut self, extent: usize, stride: usize) -> Self {
        self.dims.push(LayoutDim {
            key: D::key(),
            extent,
            stride: Some(stride),
        });
        self
    }

    /// Extent of `key`, if present.
    pub fn extent(&self, key: DimKey) -> Option<usize> {
        self.dims.iter().find(|d| d.key == key).map(|d| d.extent)
    }

    /// Product of all extents, `None` on overflow.
    pub fn elements(&self) -> Option<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, d| acc.checked_mul(d.extent))
    }

    /// Resolve into strides, bounds and the number of buffer elements the
    /// layout reaches (`max offset + 1`, zero when any extent is zero).
    pub fn resolve(&self) -> Result<(StrideMap, BoundMap, usize), ContractViolation> {
        if self.dims.len() > MAX_DIMS {
            return Err(ContractViolation::TooManyDims {
                capacity: MAX_DIMS,
            });
        }
        for (i, d) in self.dims.iter().enumerate() {
            if self.dims[..i].iter().any(|p| p.key == d.key) {
                return Err(ContractViolation::DuplicateDim { dim: d.key.name() });
            }
        }

        let overflow = ContractViolation::LayoutMismatch {
            expected: usize::MAX,
            actual: 0,
        };

        let mut strides = StrideMap::new();
        let mut bounds = BoundMap::new();
        let mut running = 1usize;
        let mut resolved: SmallVec<[(DimKey, usize, usize); MAX_DIMS]> = SmallVec::new();
        for d in self.dims.iter().rev() {
            let stride = match d.stride {
                Some(s) => s,
                None => {
                    let s = running;
                    running = running.checked_mul(d.extent).ok_or(overflow.clone())?;
                    s
                }
            };
            resolved.push((d.key, d.extent, stride));
        }
        for &(key, extent, stride) in resolved.iter().rev() {
            let signed = isize::try_from(stride).map_err(|_| overflow.clone())?;
            strides.insert(key, signed)?;
            bounds.insert(key, extent)?;
        }

        let span = if resolved.iter().any(|&(_, extent, _)| extent == 0) {
            0
        } else {
            resolved
                .iter()
                .try_fold(1usize, |acc, &(_, extent, stride)| {
                    (extent - 1)
                        .checked_mul(stride)
                        .and_then(|reach| acc.checked_add(reach))
                })
                .ok_or(overflow)?
        };
        Ok((strides, bounds, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dim::{H, K, N};

    // ── DimMap ─────────────────────────────────────────────────

    #[test]
    fn insert_get_overwrite() {
        let mut m = StrideMap::new();
        m.insert(H::key(), 4).unwrap();
        m.insert(K::key(), 1).unwrap();
        assert_eq!(m.get(H::key()), Some(4));
        m.insert(H::key(), 8).unwrap();
        assert_eq!(m.get_dim::<H>(), Some(8));
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(N::key()), None);
    }

    #[test]
    fn capacity_is_enforced() {
        crate::dimension!(A);
        crate::dimension!(B);
        crate::dimension!(C);
        crate::dimension!(D);
        let m = StrideMap::new()
            .with::<H>(1)
            .and_then(|m| m.with::<K>(1))
            .and_then(|m| m.with::<N>(1))
            .and_then(|m| m.with::<A>(1))
            .and_then(|m| m.with::<B>(1))
            .and_then(|m| m.with::<C>(1))
            .unwrap();
        assert_eq!(m.len(), MAX_DIMS);
        assert_eq!(
            m.with::<D>(1).unwrap_err(),
            ContractViolation::TooManyDims { capacity: MAX_DIMS }
        );
    }

    #[test]
    fn rename_keeps_value_and_rejects_collision() {
        let m = StrideMap::new().with::<N>(1).unwrap().with::<H>(3).unwrap();
        let r = m.rename(N::key(), K::key()).unwrap();
        assert_eq!(r.get_dim::<K>(), Some(1));
        assert!(!r.contains(N::key()));
        assert_eq!(
            m.rename(N::key(), H::key()).unwrap_err(),
            ContractViolation::DuplicateDim { dim: "h" }
        );
        // Absent source is a no-op.
        assert_eq!(m.rename(K::key(), N::key()).unwrap(), m);
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let a = StrideMap::new().with::<H>(2).unwrap().with::<K>(1).unwrap();
        let b = StrideMap::new().with::<K>(1).unwrap().with::<H>(2).unwrap();
        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), r#"{"h": 2, "k": 1}"#);
    }

    // ── Layout ─────────────────────────────────────────────────

    #[test]
    fn row_major_h_outer_k_inner() {
        let (strides, bounds, span) = Layout::new().dim::<H>(5).dim::<K>(3).resolve().unwrap();
        assert_eq!(strides.get_dim::<H>(), Some(3));
        assert_eq!(strides.get_dim::<K>(), Some(1));
        assert_eq!(bounds.get_dim::<H>(), Some(5));
        assert_eq!(bounds.get_dim::<K>(), Some(3));
        assert_eq!(span, 15);
    }

    #[test]
    fn explicit_strides_are_kept() {
        let layout = Layout::new()
            .dim_with_stride::<H>(4, 1)
            .dim_with_stride::<K>(2, 4);
        let (strides, _, span) = layout.resolve().unwrap();
        assert_eq!(strides.get_dim::<H>(), Some(1));
        assert_eq!(strides.get_dim::<K>(), Some(4));
        assert_eq!(span, 8);
    }

    #[test]
    fn zero_extent_spans_nothing() {
        let (_, _, span) = Layout::new().dim::<H>(0).dim::<K>(7).resolve().unwrap();
        assert_eq!(span, 0);
    }

    #[test]
    fn duplicate_dim_rejected() {
        let err = Layout::new().dim::<H>(2).dim::<H>(2).resolve().unwrap_err();
        assert_eq!(err, ContractViolation::DuplicateDim { dim: "h" });
    }

    #[test]
    fn overflowing_layout_rejected() {
        let err = Layout::new()
            .dim::<H>(usize::MAX)
            .dim::<K>(4)
            .resolve()
            .unwrap_err();
        assert!(matches!(err, ContractViolation::LayoutMismatch { .. }));
        assert_eq!(Layout::new().dim::<H>(usize::MAX).dim::<K>(4).elements(), None);
    }

    #[test]
    fn row_major_constructor_matches_builder() {
        let a = Layout::row_major(&[(H::key(), 3), (K::key(), 2)]).resolve().unwrap();
        let b = Layout::new().dim::<H>(3).dim::<K>(2).resolve().unwrap();
        assert_eq!(a, b);
    }
}
