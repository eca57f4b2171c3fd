//! Integration test: neighbour reductions over ragged connectivity.
//!
//! Rows of different lengths are padded with the skip sentinel. Every
//! reduction must see exactly the real neighbours of its row, in stored
//! order, on both backends. A row without neighbours folds to the
//! reduction's starting value.

use proptest::prelude::*;
use usid::composite;
use usid::prelude::*;
use usid_test_utils::init_tracing;

composite! {
    struct Reduced<'a> => ReducedPtr {
        table: Sid<'a, i32>,
        sum: SidMut<'a, f64>,
        min: SidMut<'a, f64>,
        max: SidMut<'a, f64>,
        product: SidMut<'a, f64>,
    }
}

fn slot(p: &ReducedPtr<'_>) -> i32 {
    p.table.get()
}

fn value(_: &ReducedPtr<'_>, n: Ptr<'_, f64>) -> f64 {
    n.get()
}

fn row_slot(p: &Ptr<'_, i32>) -> i32 {
    p.get()
}

fn row_value(_: &Ptr<'_, i32>, n: Ptr<'_, f64>) -> f64 {
    n.get()
}

#[derive(Debug, PartialEq)]
struct Rows {
    sum: Vec<f64>,
    min: Vec<f64>,
    max: Vec<f64>,
    product: Vec<f64>,
}

impl Rows {
    fn zeroed(rows: usize) -> Self {
        Self {
            sum: vec![0.0; rows],
            min: vec![0.0; rows],
            max: vec![0.0; rows],
            product: vec![0.0; rows],
        }
    }
}

fn reduce<B: Backend>(backend: &B, table: &Connectivity, values: &[f64]) -> Result<Rows, UsidError> {
    let rows = table.rows();
    let degree = table.max_degree();
    let storage = B::STORAGE;
    let mut out = Rows::zeroed(rows);
    let fields = Reduced {
        table: table.sid::<H, N>(storage)?,
        sum: out.sum.sid_mut(storage),
        min: out.min.sid_mut(storage),
        max: out.max.sid_mut(storage),
        product: out.product.sid_mut(storage),
    };
    let strides = fields.strides();
    let sum = sum_neighbors::<N, f64, _, _>(degree, value);
    let min = min_neighbors::<N, f64, _, _>(degree, value);
    let max = max_neighbors::<N, f64, _, _>(degree, value);
    let product = mul_neighbors::<N, f64, _, _>(degree, value);
    let sum = sum.bind(&strides)?;
    let min = min.bind(&strides)?;
    let max = max.bind(&strides)?;
    let product = product.bind(&strides)?;
    let target = values.sid(storage).neighbors()?;
    call_kernel(backend, "reduce", rows, &fields, &target, |p, _, t| {
        p.sum.set(sum.eval(p, slot, t));
        p.min.set(min.eval(p, slot, t));
        p.max.set(max.eval(p, slot, t));
        p.product.set(product.eval(p, slot, t));
    })?;
    Ok(out)
}

/// Reductions with plain iterators over the non-sentinel slots.
fn reference(table: &Connectivity, values: &[f64]) -> Rows {
    let mut out = Rows::zeroed(table.rows());
    for r in 0..table.rows() {
        let real: Vec<f64> = table
            .row(r)
            .iter()
            .filter(|&&i| i != SKIP_VALUE)
            .map(|&i| values[i as usize])
            .collect();
        out.sum[r] = real.iter().fold(0.0, |a, &b| a + b);
        out.min[r] = real.iter().fold(f64::MAX, |a, &b| if b < a { b } else { a });
        out.max[r] = real.iter().fold(f64::MIN, |a, &b| if b > a { b } else { a });
        out.product[r] = real.iter().fold(1.0, |a, &b| a * b);
    }
    out
}

fn parallel() -> ParallelBackend {
    ParallelBackend::new(EngineConfig::default()).unwrap()
}

// ── Sentinels ────────────────────────────────────────────────────────

#[test]
fn sentinel_in_the_middle_of_a_row_is_skipped() {
    init_tracing();
    let table = Connectivity::new(2, 3, vec![0, SKIP_VALUE, 2, SKIP_VALUE, 1, SKIP_VALUE]).unwrap();
    let values = [2.0, -3.0, 5.0];
    let rows = reduce(&SequentialBackend::default(), &table, &values).unwrap();
    assert_eq!(rows.sum, [7.0, -3.0]);
    assert_eq!(rows.min, [2.0, -3.0]);
    assert_eq!(rows.max, [5.0, -3.0]);
    assert_eq!(rows.product, [10.0, -3.0]);
}

#[test]
fn padded_slot_contributes_nothing() {
    init_tracing();
    let table = Connectivity::from_rows(&[vec![0, 1, SKIP_VALUE]]);
    let rows = reduce(&parallel(), &table, &[5.0, 7.0]).unwrap();
    assert_eq!(rows.sum, [12.0]);
    assert_eq!(rows.min, [5.0]);
    assert_eq!(rows.max, [7.0]);
    assert_eq!(rows.product, [35.0]);
}

#[test]
fn empty_rows_fold_to_starting_values() {
    init_tracing();
    let table = Connectivity::from_rows(&[vec![], vec![0], vec![]]);
    let rows = reduce(&parallel(), &table, &[4.0]).unwrap();
    assert_eq!(rows.sum, [0.0, 4.0, 0.0]);
    assert_eq!(rows.min, [f64::MAX, 4.0, f64::MAX]);
    assert_eq!(rows.max, [f64::MIN, 4.0, f64::MIN]);
    assert_eq!(rows.product, [1.0, 4.0, 1.0]);
}

#[test]
fn only_the_sentinel_is_skipped() {
    // Any other negative value is an error for the checked fold.
    let table = Connectivity::from_rows(&[[0, -2], [1, SKIP_VALUE]]);
    let values = vec![1.0f64, 2.0];
    let storage = StorageKind::Host;
    let sid = table.sid::<H, N>(storage).unwrap();
    let target = values.sid(storage).neighbors().unwrap();
    let fold = sum_neighbors::<N, f64, _, _>(2usize, row_value);

    let bad = fold.try_eval(&sid.origin(), &sid.strides(), row_slot, &target);
    assert!(
        matches!(bad, Err(UsidError::IndexOutOfRange { slot: 1, index: -2, bound: 2, .. })),
        "{bad:?}"
    );

    let second = sid.shifted::<H>(1).unwrap();
    let ok = fold.try_eval(&second.origin(), &second.strides(), row_slot, &target);
    assert_eq!(ok, Ok(2.0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reductions_match_iterators_on_both_backends(
        (values, rows) in (1usize..20).prop_flat_map(|targets| (
            proptest::collection::vec(-10.0f64..10.0, targets),
            proptest::collection::vec(
                proptest::collection::vec(0..targets as i32, 0..6),
                1..80,
            ),
        ))
    ) {
        let table = Connectivity::from_rows(&rows);
        let expected = reference(&table, &values);
        let seq = reduce(&SequentialBackend::default(), &table, &values).unwrap();
        let par = reduce(&parallel(), &table, &values).unwrap();
        prop_assert_eq!(&seq, &expected);
        prop_assert_eq!(&par, &expected);
    }
}
