//! Dimension-keyed loops.
//!
//! [`make_loop`] builds a loop over one tag with a compile-time or runtime
//! extent. Running it calls the body once per offset `0..extent`, in
//! ascending order, with a handle positioned at that offset. Loops nest by
//! running one inside another's body; there is no parallelism at this
//! layer.

use std::fmt;
use std::marker::PhantomData;

use crate::dim::Dim;
use crate::error::ContractViolation;
use crate::ptr::Shift;
use crate::sid::StrideSet;

/// Iteration count of a loop, known at compile time or at run time.
pub trait Extent: Copy + Send + Sync {
    /// Number of iterations.
    fn get(self) -> usize;
}

impl Extent for usize {
    #[inline]
    fn get(self) -> usize {
        self
    }
}

/// Compile-time extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Const<const N: usize>;

impl<const N: usize> Extent for Const<N> {
    #[inline]
    fn get(self) -> usize {
        N
    }
}

/// Loop over tag `D` with extent `E`.
pub struct Loop<D, E> {
    extent: E,
    _dim: PhantomData<D>,
}

impl<D, E: Copy> Clone for Loop<D, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D, E: Copy> Copy for Loop<D, E> {}

impl<D: Dim, E: fmt::Debug> fmt::Debug for Loop<D, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loop")
            .field("dim", &D::NAME)
            .field("extent", &self.extent)
            .finish()
    }
}

/// Loop over tag `D` running `extent` times.
pub fn make_loop<D: Dim, E: Extent>(extent: E) -> Loop<D, E> {
    Loop {
        extent,
        _dim: PhantomData,
    }
}

impl<D: Dim, E: Extent> Loop<D, E> {
    /// Number of iterations.
    pub fn extent(&self) -> usize {
        self.extent.get()
    }

    /// Resolve the step along `D` once.
    ///
    /// Fails with [`ContractViolation::MissingStride`] if no member of
    /// `strides` carries `D`.
    pub fn bind<S: StrideSet>(&self, strides: &S) -> Result<BoundLoop<S::Step, E>, ContractViolation> {
        Ok(BoundLoop {
            step: strides.step(D::key())?,
            extent: self.extent,
        })
    }

    /// Attach a body, producing a callable loop.
    pub fn apply<F>(self, body: F) -> LoopFn<D, E, F> {
        LoopFn { lp: self, body }
    }

    /// Run `body(handle, strides)` once per offset, `handle` positioned at
    /// the offset. `ptr` itself is not moved.
    pub fn run<P, S, F>(&self, ptr: &P, strides: &S, mut body: F) -> Result<(), ContractViolation>
    where
        S: StrideSet,
        P: Shift<Step = S::Step>,
        F: FnMut(&P, &S),
    {
        self.bind(strides)?.for_each(ptr, |p| body(p, strides));
        Ok(())
    }
}

/// A [`Loop`] with its body attached, see [`Loop::apply`].
pub struct LoopFn<D, E, F> {
    lp: Loop<D, E>,
    body: F,
}

impl<D: Dim, E: Extent, F> LoopFn<D, E, F> {
    /// Run the loop from `ptr`.
    pub fn call<P, S>(&mut self, ptr: &P, strides: &S) -> Result<(), ContractViolation>
    where
        S: StrideSet,
        P: Shift<Step = S::Step>,
        F: FnMut(&P, &S),
    {
        let body = &mut self.body;
        self.lp.run(ptr, strides, |p, s| body(p, s))
    }
}

impl<D: Dim, E: fmt::Debug, F> fmt::Debug for LoopFn<D, E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopFn").field("lp", &self.lp).finish()
    }
}

/// A loop whose step is already resolved. Running it cannot fail.
#[derive(Clone, Copy, Debug)]
pub struct BoundLoop<St, E> {
    step: St,
    extent: E,
}

impl<St: Copy, E: Extent> BoundLoop<St, E> {
    /// Number of iterations.
    pub fn extent(&self) -> usize {
        self.extent.get()
    }

    /// Run `body` once per offset with a handle positioned at the offset.
    #[inline]
    pub fn for_each<P, F>(&self, ptr: &P, mut body: F)
    where
        P: Shift<Step = St>,
        F: FnMut(&P),
    {
        let mut p = *ptr;
        for _ in 0..self.extent.get() {
            body(&p);
            p.shift_by(self.step, 1);
        }
    }

    /// Fold over the offsets in ascending order.
    #[inline]
    pub fn fold<P, A, F>(&self, ptr: &P, init: A, mut f: F) -> A
    where
        P: Shift<Step = St>,
        F: FnMut(A, &P) -> A,
    {
        let mut acc = init;
        let mut p = *ptr;
        for _ in 0..self.extent.get() {
            acc = f(acc, &p);
            p.shift_by(self.step, 1);
        }
        acc
    }
}
