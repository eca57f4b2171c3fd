//! Integration test: invocation lifecycle.
//!
//! An invocation allocates its temporaries, runs its passes in program
//! order, and releases everything when the kernel closure returns. Each
//! invocation starts with a fresh allocator.

use usid::prelude::*;
use usid::types::Location;
use usid_test_utils::{init_tracing, Field};

/// Two passes through one temporary: `tmp = 2 * input`, `out = tmp + 1`.
fn double_then_increment<B: Backend>(
    backend: &B,
    input: &Field<f64>,
    out: &mut Field<f64>,
) -> Result<InvocationMetrics, UsidError> {
    let domain = Domain::new(input.h(), 0, input.k());
    invoke(backend, domain, |inv| {
        assert_eq!(inv.state().name(), "building");
        let storage = inv.storage();
        let mut tmp = inv.alloc_at::<f64>(Location::Vertex)?;
        assert_eq!(inv.state().name(), "allocating");
        let levels = make_loop::<K, _>(domain.k);

        let first = (input.sid(storage), tmp.sid_mut());
        let per_level = levels.bind(&first.strides())?;
        inv.pass("double", domain.vertex, &first, |p, _| {
            per_level.for_each(p, |q| q.1.set(2.0 * q.0.get()));
        })?;

        let second = (tmp.sid(), out.sid_mut(storage));
        let per_level = levels.bind(&second.strides())?;
        inv.pass("increment", domain.vertex, &second, |p, _| {
            per_level.for_each(p, |q| q.1.set(q.0.get() + 1.0));
        })?;
        assert_eq!(inv.state().name(), "executing");
        Ok(())
    })
}

fn check<B: Backend>(backend: &B) {
    let input = Field::from_fn(40, 3, |h, k| (h * 3 + k) as f64);
    let mut out = Field::new(40, 3);
    let metrics = double_then_increment(backend, &input, &mut out).unwrap();
    for h in 0..40 {
        for k in 0..3 {
            assert_eq!(out.get(h, k), 2.0 * input.get(h, k) + 1.0);
        }
    }
    assert_eq!(metrics.backend, B::NAME);
    assert_eq!(metrics.passes.len(), 2);
    assert_eq!(metrics.passes[0].op, "double");
    assert_eq!(metrics.passes[1].extent, 40);
    assert_eq!(metrics.tmp_allocations, 1);
    assert_eq!(metrics.tmp_bytes, 40 * 3 * 8);
    assert!(metrics.pass_us() <= metrics.total_us);
}

#[test]
fn passes_see_earlier_results_on_both_backends() {
    init_tracing();
    check(&SequentialBackend::default());
    check(&ParallelBackend::new(EngineConfig::default()).unwrap());
}

#[test]
fn repeated_invocations_start_from_a_fresh_allocator() {
    init_tracing();
    let backend = ParallelBackend::new(EngineConfig::default()).unwrap();
    let input = Field::from_fn(8, 2, |h, _| h as f64);
    let mut out = Field::new(8, 2);
    for _ in 0..3 {
        let metrics = double_then_increment(&backend, &input, &mut out).unwrap();
        assert_eq!(metrics.tmp_allocations, 1);
        assert_eq!(metrics.tmp_bytes, 8 * 2 * 8);
    }
}

#[test]
fn failing_pass_stops_the_invocation() {
    init_tracing();
    let backend = SequentialBackend::new(EngineConfig::propagating()).unwrap();
    let mut ran_second = false;
    let err = invoke(&backend, Domain::new(4, 0, 1), |inv| {
        let mut tmp = inv.alloc_simple_tmp::<f64>(4, 1)?;
        let fields = tmp.sid_mut();
        inv.pass("fail", 4, &fields, |_, _| panic!("boom"))?;
        ran_second = true;
        Ok(())
    })
    .unwrap_err();
    assert!(matches!(err, UsidError::LaunchFailure { code: 1, .. }), "{err:?}");
    assert!(!ran_second);
}
