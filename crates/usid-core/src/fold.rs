//! Neighbour fold/reduce.
//!
//! A fold walks the slots of one connectivity row in stored order. For each
//! slot it reads the connectivity value through a caller-supplied selector,
//! skips it if it is [`SKIP_VALUE`] (unless skipping was turned off),
//! and otherwise combines `extract(center, neighbor)` into an accumulator
//! started from `init()`. A row whose slots are all skipped folds to
//! `init()`.
//!
//! [`sum_neighbors`], [`mul_neighbors`], [`min_neighbors`] and
//! [`max_neighbors`] are the usual specialisations.
//!
//! Connectivity values are not range-checked by [`BoundFold::eval`]: a
//! value at or beyond the target count is the caller's bug and panics on
//! the handle bounds check (or reads another valid element of the target
//! buffer). [`BoundFold::try_eval`] checks every value first.

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Mul};

use num_traits::{Bounded, One, Zero};

use crate::dim::Dim;
use crate::error::{ContractViolation, UsidError};
use crate::loops::Extent;
use crate::ptr::{Ptr, Shift};
use crate::sid::{Neighbors, StrideSet};

/// Connectivity value marking a missing neighbour.
pub const SKIP_VALUE: i32 = -1;

/// Integer types usable as connectivity values.
pub trait ConnectivityIndex: Copy {
    /// Value widened to `i64`.
    fn to_i64(self) -> i64;
}

macro_rules! connectivity_index {
    ($($t:ty),+) => {
        $(
            impl ConnectivityIndex for $t {
                #[inline]
                fn to_i64(self) -> i64 {
                    self as i64
                }
            }
        )+
    };
}

connectivity_index!(i16, i32, i64, isize);

/// Fold over the slot tag `D` of a connectivity row.
///
/// `SKIP` selects whether [`SKIP_VALUE`] slots are skipped.
pub struct NeighborFold<D, E, C, I, G, const SKIP: bool> {
    degree: E,
    combine: C,
    init: I,
    extract: G,
    _dim: PhantomData<D>,
}

/// Fold with a custom combiner, skipping sentinel slots.
///
/// `combine(acc, value)` folds one neighbour in, `init()` starts the
/// accumulator, `degree` is the number of slots, and
/// `extract(center, neighbor)` maps the slot-positioned central handle and
/// the neighbour's handle to a value.
pub fn fold_neighbors<D: Dim, E: Extent, C, I, G>(
    combine: C,
    init: I,
    degree: E,
    extract: G,
) -> NeighborFold<D, E, C, I, G, true> {
    NeighborFold {
        degree,
        combine,
        init,
        extract,
        _dim: PhantomData,
    }
}

impl<D: Dim, E: Extent, C, I, G, const SKIP: bool> NeighborFold<D, E, C, I, G, SKIP> {
    /// Number of slots.
    pub fn degree(&self) -> usize {
        self.degree.get()
    }

    /// Whether sentinel slots are skipped.
    pub fn skips_sentinels(&self) -> bool {
        SKIP
    }

    /// Same fold, treating every slot as a valid index.
    pub fn without_skip_values(self) -> NeighborFold<D, E, C, I, G, false> {
        self.respecialize()
    }

    /// Same fold, skipping sentinel slots.
    pub fn with_skip_values(self) -> NeighborFold<D, E, C, I, G, true> {
        self.respecialize()
    }

    fn respecialize<const S: bool>(self) -> NeighborFold<D, E, C, I, G, S> {
        NeighborFold {
            degree: self.degree,
            combine: self.combine,
            init: self.init,
            extract: self.extract,
            _dim: PhantomData,
        }
    }

    /// Resolve the slot step of `strides` once.
    pub fn bind<S: StrideSet>(
        &self,
        strides: &S,
    ) -> Result<BoundFold<'_, S::Step, D, E, C, I, G, SKIP>, ContractViolation> {
        Ok(BoundFold {
            fold: self,
            step: strides.step(D::key())?,
        })
    }

    /// Fold the row under `ptr`.
    ///
    /// `select` reads the connectivity value from the slot-positioned
    /// central handle. Values are not range-checked.
    pub fn eval<'n, P, S, X, Ix, T, A>(
        &self,
        ptr: &P,
        strides: &S,
        select: X,
        neighbors: &Neighbors<'n, T>,
    ) -> Result<A, ContractViolation>
    where
        S: StrideSet,
        P: Shift<Step = S::Step>,
        X: Fn(&P) -> Ix,
        Ix: ConnectivityIndex,
        C: Fn(A, A) -> A,
        I: Fn() -> A,
        G: Fn(&P, Ptr<'n, T>) -> A,
    {
        Ok(self.bind(strides)?.eval(ptr, select, neighbors))
    }

    /// Like [`eval`](NeighborFold::eval), but every non-skipped value is
    /// checked against `[0, neighbors.count())` before it is dereferenced.
    pub fn try_eval<'n, P, S, X, Ix, T, A>(
        &self,
        ptr: &P,
        strides: &S,
        select: X,
        neighbors: &Neighbors<'n, T>,
    ) -> Result<A, UsidError>
    where
        S: StrideSet,
        P: Shift<Step = S::Step>,
        X: Fn(&P) -> Ix,
        Ix: ConnectivityIndex,
        C: Fn(A, A) -> A,
        I: Fn() -> A,
        G: Fn(&P, Ptr<'n, T>) -> A,
    {
        self.bind(strides)?.try_eval(ptr, select, neighbors)
    }
}

impl<D: Dim, E: fmt::Debug, C, I, G, const SKIP: bool> fmt::Debug
    for NeighborFold<D, E, C, I, G, SKIP>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighborFold")
            .field("dim", &D::NAME)
            .field("degree", &self.degree)
            .field("skip", &SKIP)
            .finish()
    }
}

/// A [`NeighborFold`] with its slot step resolved.
pub struct BoundFold<'f, St, D, E, C, I, G, const SKIP: bool> {
    fold: &'f NeighborFold<D, E, C, I, G, SKIP>,
    step: St,
}

impl<St: Copy, D: Dim, E: Extent, C, I, G, const SKIP: bool> BoundFold<'_, St, D, E, C, I, G, SKIP> {
    /// Fold the row under `ptr` without range-checking connectivity values.
    #[inline]
    pub fn eval<'n, P, X, Ix, T, A>(&self, ptr: &P, select: X, neighbors: &Neighbors<'n, T>) -> A
    where
        P: Shift<Step = St>,
        X: Fn(&P) -> Ix,
        Ix: ConnectivityIndex,
        C: Fn(A, A) -> A,
        I: Fn() -> A,
        G: Fn(&P, Ptr<'n, T>) -> A,
    {
        let fold = self.fold;
        let mut acc = (fold.init)();
        let mut p = *ptr;
        for _ in 0..fold.degree.get() {
            let index = select(&p).to_i64();
            if !(SKIP && index == SKIP_VALUE as i64) {
                let neighbor = neighbors.at(index as isize);
                acc = (fold.combine)(acc, (fold.extract)(&p, neighbor));
            }
            p.shift_by(self.step, 1);
        }
        acc
    }

    /// Fold the row under `ptr`, failing with
    /// [`UsidError::IndexOutOfRange`] at the first value outside the target.
    pub fn try_eval<'n, P, X, Ix, T, A>(
        &self,
        ptr: &P,
        select: X,
        neighbors: &Neighbors<'n, T>,
    ) -> Result<A, UsidError>
    where
        P: Shift<Step = St>,
        X: Fn(&P) -> Ix,
        Ix: ConnectivityIndex,
        C: Fn(A, A) -> A,
        I: Fn() -> A,
        G: Fn(&P, Ptr<'n, T>) -> A,
    {
        let fold = self.fold;
        let bound = neighbors.count();
        let mut p = *ptr;
        for slot in 0..fold.degree.get() {
            let index = select(&p).to_i64();
            let skipped = SKIP && index == SKIP_VALUE as i64;
            if !skipped && !(0..bound as i64).contains(&index) {
                return Err(UsidError::IndexOutOfRange {
                    row: None,
                    slot,
                    index,
                    bound,
                });
            }
            p.shift_by(self.step, 1);
        }
        Ok(self.eval(ptr, select, neighbors))
    }
}

// ── Specialisations ────────────────────────────────────────────────

fn add<A: Add<Output = A>>(a: A, b: A) -> A {
    a + b
}

fn mul<A: Mul<Output = A>>(a: A, b: A) -> A {
    a * b
}

fn min_of<A: PartialOrd>(a: A, b: A) -> A {
    if b < a {
        b
    } else {
        a
    }
}

fn max_of<A: PartialOrd>(a: A, b: A) -> A {
    if b > a {
        b
    } else {
        a
    }
}

/// Combiner and initial value of a specialised fold.
pub type Reduce<A> = (fn(A, A) -> A, fn() -> A);

/// Fold type returned by the specialisations.
pub type Reduction<D, E, A, G> = NeighborFold<D, E, fn(A, A) -> A, fn() -> A, G, true>;

fn reduction<D: Dim, E: Extent, A, G>(reduce: Reduce<A>, degree: E, extract: G) -> Reduction<D, E, A, G> {
    fold_neighbors(reduce.0, reduce.1, degree, extract)
}

/// Sum of neighbour values, starting from zero.
pub fn sum_neighbors<D: Dim, A, E: Extent, G>(degree: E, extract: G) -> Reduction<D, E, A, G>
where
    A: Zero,
{
    reduction((add::<A>, A::zero), degree, extract)
}

/// Product of neighbour values, starting from one.
pub fn mul_neighbors<D: Dim, A, E: Extent, G>(degree: E, extract: G) -> Reduction<D, E, A, G>
where
    A: One,
{
    reduction((mul::<A>, A::one), degree, extract)
}

/// Minimum of neighbour values, starting from the type's maximum.
pub fn min_neighbors<D: Dim, A, E: Extent, G>(degree: E, extract: G) -> Reduction<D, E, A, G>
where
    A: Bounded + PartialOrd,
{
    reduction((min_of::<A>, A::max_value), degree, extract)
}

/// Maximum of neighbour values, starting from the type's minimum (the most
/// negative finite value for floats).
pub fn max_neighbors<D: Dim, A, E: Extent, G>(degree: E, extract: G) -> Reduction<D, E, A, G>
where
    A: Bounded + PartialOrd,
{
    reduction((max_of::<A>, A::min_value), degree, extract)
}
