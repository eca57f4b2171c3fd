//! Kernel invocations.
//!
//! [`invoke`] is the entry point for running a kernel. It creates the
//! backend's allocator, hands the caller an [`Invocation`] to allocate
//! temporaries and launch passes through, and releases everything when the
//! caller returns.
//!
//! # State machine
//!
//! ```text
//! Building ──alloc──▶ Allocating ──pass──▶ Executing { pass: 1..k } ──▶ Released
//!     └──────────────────pass─────────────────▲
//! ```
//!
//! Transitions only move forward. Allocating a temporary once a pass has
//! run is [`ContractViolation::InvalidState`]. Temporaries borrow the
//! invocation, so none of them can be observed after release.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::time::Instant;

use usid_arena::{make_simple_tmp_storage, make_tmp_storage, Allocator, Element, TmpStorage};
use usid_core::{
    Connectivity, ContractViolation, DimKey, Domain, FieldDescriptor, Location, StorageKind,
    UsidError,
};

use crate::backend::Backend;
use crate::metrics::{InvocationMetrics, PassMetrics};
use crate::status::escalate;

/// Phase of an [`Invocation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvocationState {
    /// No temporary allocated and no pass run yet.
    Building,
    /// At least one temporary allocated, no pass run yet.
    Allocating,
    /// Pass `pass` (1-based) is running or has run last.
    Executing {
        /// Number of the most recent pass.
        pass: usize,
    },
    /// Temporaries and allocator dropped.
    Released,
}

impl InvocationState {
    /// Short name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Building => "building",
            Self::Allocating => "allocating",
            Self::Executing { .. } => "executing",
            Self::Released => "released",
        }
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executing { pass } => write!(f, "executing pass {pass}"),
            other => f.write_str(other.name()),
        }
    }
}

/// One kernel invocation on backend `B`.
///
/// Only reachable inside the closure given to [`invoke`].
pub struct Invocation<'b, B: Backend> {
    backend: &'b B,
    domain: Domain,
    allocator: B::Allocator,
    state: Cell<InvocationState>,
    passes: RefCell<Vec<PassMetrics>>,
}

impl<'b, B: Backend> Invocation<'b, B> {
    fn new(backend: &'b B, domain: Domain) -> Self {
        Self {
            backend,
            domain,
            allocator: backend.make_allocator(),
            state: Cell::new(InvocationState::Building),
            passes: RefCell::new(Vec::new()),
        }
    }

    /// Backend running this invocation.
    pub fn backend(&self) -> &'b B {
        self.backend
    }

    /// Domain of this invocation.
    pub fn domain(&self) -> Domain {
        self.domain
    }

    /// Storage kind fields passed to [`pass`](Self::pass) must have.
    pub fn storage(&self) -> StorageKind {
        B::STORAGE
    }

    /// Current phase.
    pub fn state(&self) -> InvocationState {
        self.state.get()
    }

    fn transition(&self, to: InvocationState) {
        let from = self.state.replace(to);
        if from != to {
            tracing::debug!(from = %from, to = %to, "invocation state");
        }
    }

    // ── Temporaries ────────────────────────────────────────────

    fn begin_allocation(&self) -> Result<(), UsidError> {
        match self.state.get() {
            InvocationState::Building | InvocationState::Allocating => {
                self.transition(InvocationState::Allocating);
                Ok(())
            }
            state => Err(ContractViolation::InvalidState {
                action: "allocate a temporary",
                state: state.name(),
            }
            .into()),
        }
    }

    fn fatal_on_allocation<T>(&self, result: Result<T, UsidError>) -> Result<T, UsidError> {
        result.map_err(|e| match e {
            UsidError::AllocationFailure { .. } => {
                escalate(e, self.backend.config().failure_policy)
            }
            other => other,
        })
    }

    /// Allocate a zeroed temporary with the given `(tag, extent)`
    /// dimensions, first entry outermost.
    pub fn alloc_tmp<T: Element>(
        &self,
        dims: &[(DimKey, usize)],
    ) -> Result<TmpStorage<'_, T>, UsidError> {
        self.begin_allocation()?;
        self.fatal_on_allocation(make_tmp_storage(dims, &self.allocator))
    }

    /// Allocate a zeroed `h * k` temporary, horizontal outermost.
    pub fn alloc_simple_tmp<T: Element>(
        &self,
        h: usize,
        k: usize,
    ) -> Result<TmpStorage<'_, T>, UsidError> {
        self.begin_allocation()?;
        self.fatal_on_allocation(make_simple_tmp_storage(h, k, &self.allocator))
    }

    /// Allocate a zeroed temporary with one element per `loc` of the
    /// domain and one level per vertical level.
    pub fn alloc_at<T: Element>(&self, loc: Location) -> Result<TmpStorage<'_, T>, UsidError> {
        self.alloc_simple_tmp(self.domain.count(loc), self.domain.k)
    }

    // ── Passes ─────────────────────────────────────────────────

    /// Range-check `table` against the `target` element count when
    /// `check_connectivity` is enabled. A no-op otherwise.
    pub fn validate_connectivity(
        &self,
        table: &Connectivity,
        target: Location,
    ) -> Result<(), UsidError> {
        if !self.backend.config().check_connectivity {
            return Ok(());
        }
        table.validate(self.domain.count(target))
    }

    /// Run `body` once per outer element in `0..extent` over `fields`.
    ///
    /// Passes run in program order; each returns only after every element
    /// has completed.
    pub fn pass<S, F>(&self, op: &str, extent: usize, fields: &S, body: F) -> Result<(), UsidError>
    where
        S: FieldDescriptor,
        F: Fn(&S::Handle, &S::Strides) + Sync,
    {
        let pass = self.passes.borrow().len() + 1;
        self.transition(InvocationState::Executing { pass });
        let _span = tracing::debug_span!("pass", op, extent, pass).entered();
        let start = Instant::now();
        self.backend.launch(op, extent, fields, body)?;
        self.passes.borrow_mut().push(PassMetrics {
            op: op.to_string(),
            extent,
            us: start.elapsed().as_micros() as u64,
        });
        Ok(())
    }

    fn release(&self, start: Instant) -> InvocationMetrics {
        self.transition(InvocationState::Released);
        let stats = self.allocator.stats();
        InvocationMetrics {
            backend: B::NAME,
            total_us: start.elapsed().as_micros() as u64,
            passes: self.passes.take(),
            tmp_allocations: stats.allocations,
            tmp_bytes: stats.bytes,
        }
    }
}

impl<B: Backend> fmt::Debug for Invocation<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("backend", &B::NAME)
            .field("domain", &self.domain)
            .field("state", &self.state.get())
            .finish()
    }
}

/// Run a kernel on `backend` over `domain`.
///
/// `f` allocates temporaries and launches passes through the
/// [`Invocation`] it receives. Temporaries are released when `f` returns,
/// whether it succeeds or not. Metrics are returned on success.
pub fn invoke<B, F>(backend: &B, domain: Domain, f: F) -> Result<InvocationMetrics, UsidError>
where
    B: Backend,
    F: FnOnce(&Invocation<'_, B>) -> Result<(), UsidError>,
{
    let _span = tracing::debug_span!(
        "invocation",
        backend = B::NAME,
        vertex = domain.vertex,
        edge = domain.edge,
        cell = domain.cell,
        k = domain.k
    )
    .entered();
    let start = Instant::now();
    let inv = Invocation::new(backend, domain);
    let outcome = f(&inv);
    let metrics = inv.release(start);
    outcome.map(|()| metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::parallel::ParallelBackend;
    use crate::sequential::SequentialBackend;
    use usid_core::{IntoSid, IntoSidMut, H};

    fn sequential() -> SequentialBackend {
        SequentialBackend::new(EngineConfig::propagating()).unwrap()
    }

    // ── Lifecycle ──────────────────────────────────────────────

    #[test]
    fn states_move_forward() {
        let input = vec![1.0f64; 8];
        let mut output = vec![0.0f64; 8];
        let metrics = invoke(&sequential(), Domain::new(8, 8, 1), |inv| {
            assert_eq!(inv.state(), InvocationState::Building);
            let mut tmp = inv.alloc_at::<f64>(Location::Vertex)?;
            assert_eq!(inv.state(), InvocationState::Allocating);
            inv.pass("double", 8, &(input.sid(inv.storage()), tmp.sid_mut()), |p, _| {
                p.1.set(p.0.get() * 2.0)
            })?;
            assert_eq!(inv.state(), InvocationState::Executing { pass: 1 });
            inv.pass("copy", 8, &(tmp.sid(), output.sid_mut(inv.storage())), |p, _| {
                p.1.set(p.0.get())
            })?;
            assert_eq!(inv.state(), InvocationState::Executing { pass: 2 });
            Ok(())
        })
        .unwrap();
        assert_eq!(output, vec![2.0; 8]);
        assert_eq!(metrics.backend, "sequential");
        assert_eq!(metrics.passes.len(), 2);
        assert_eq!(metrics.passes[0].op, "double");
        assert_eq!(metrics.passes[1].extent, 8);
        assert_eq!(metrics.tmp_allocations, 1);
        assert_eq!(metrics.tmp_bytes, 64);
    }

    #[test]
    fn allocation_after_a_pass_is_rejected() {
        let data = vec![0i32; 4];
        let err = invoke(&sequential(), Domain::new(4, 4, 1), |inv| {
            inv.pass("noop", 4, &data.sid(inv.storage()), |_, _| {})?;
            inv.alloc_simple_tmp::<i32>(4, 1).map(|_| ())
        })
        .unwrap_err();
        assert_eq!(
            err,
            UsidError::Contract(ContractViolation::InvalidState {
                action: "allocate a temporary",
                state: "executing"
            })
        );
    }

    #[test]
    fn each_invocation_gets_a_fresh_allocator() {
        let backend = sequential();
        for _ in 0..3 {
            let metrics = invoke(&backend, Domain::new(10, 0, 2), |inv| {
                let _a = inv.alloc_at::<f32>(Location::Vertex)?;
                Ok(())
            })
            .unwrap();
            assert_eq!(metrics.tmp_allocations, 1);
            assert_eq!(metrics.tmp_bytes, 80);
        }
    }

    #[test]
    fn failing_pass_ends_the_invocation_with_its_error() {
        let data = vec![0.0f64; 4];
        let mut ran_second = false;
        let err = invoke(&sequential(), Domain::new(4, 4, 1), |inv| {
            let _tmp = inv.alloc_simple_tmp::<f64>(4, 1)?;
            inv.pass("fault", 4, &data.sid(inv.storage()), |_, _| panic!("boom"))?;
            ran_second = true;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, UsidError::LaunchFailure { code: 1, .. }));
        assert!(!ran_second);
    }

    // ── Budget ─────────────────────────────────────────────────

    #[test]
    fn device_budget_failure_propagates() {
        let backend = ParallelBackend::new(EngineConfig {
            device_memory_limit: Some(100),
            ..EngineConfig::propagating()
        })
        .unwrap();
        let err = invoke(&backend, Domain::new(100, 0, 1), |inv| {
            let _tmp = inv.alloc_at::<f64>(Location::Vertex)?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            UsidError::AllocationFailure {
                requested_bytes: 800,
                ..
            }
        ));
    }

    #[test]
    fn storage_follows_backend() {
        let backend = ParallelBackend::default();
        invoke(&backend, Domain::default(), |inv| {
            assert_eq!(inv.storage(), StorageKind::Device);
            let tmp = inv.alloc_simple_tmp::<u8>(3, 2)?;
            assert_eq!(tmp.storage(), StorageKind::Device);
            assert_eq!(tmp.extent::<H>(), Some(3));
            Ok(())
        })
        .unwrap();
    }

    // ── Connectivity ───────────────────────────────────────────

    #[test]
    fn connectivity_check_follows_config() {
        let table = Connectivity::from_rows(&[[0, 7]]);
        let checking = SequentialBackend::new(EngineConfig {
            check_connectivity: true,
            ..EngineConfig::propagating()
        })
        .unwrap();
        let err = invoke(&checking, Domain::new(1, 4, 1), |inv| {
            inv.validate_connectivity(&table, Location::Edge)
        })
        .unwrap_err();
        assert!(matches!(err, UsidError::IndexOutOfRange { index: 7, bound: 4, .. }));

        let trusting = SequentialBackend::new(EngineConfig {
            check_connectivity: false,
            ..EngineConfig::propagating()
        })
        .unwrap();
        assert!(invoke(&trusting, Domain::new(1, 4, 1), |inv| {
            inv.validate_connectivity(&table, Location::Edge)
        })
        .is_ok());
    }
}
