//! Test utilities for usid development.
//!
//! Provides an owned two-dimensional [`Field`], seeded random data, mesh
//! fixtures ([`Mesh::ring`], [`Mesh::strip`]) with a plain-loop nabla
//! reference, and [`init_tracing`] for tests that want log output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{nabla_reference, Mesh, NablaInputs, NablaOutputs};

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;
use usid_core::{IntoSid, IntoSidMut, Layout, Sid, SidMut, StorageKind, H, K};

/// Install a fmt subscriber writing to the test harness.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`. Safe to call
/// from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
    tracing::trace!("test tracing initialised");
}

/// Owned `h * k` field, horizontal outermost.
#[derive(Clone, Debug, PartialEq)]
pub struct Field<T> {
    h: usize,
    k: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Field<T> {
    pub fn new(h: usize, k: usize) -> Self {
        Self {
            h,
            k,
            data: vec![T::default(); h * k],
        }
    }
}

impl<T> Field<T> {
    pub fn from_fn(h: usize, k: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut data = Vec::with_capacity(h * k);
        for i in 0..h {
            for j in 0..k {
                data.push(f(i, j));
            }
        }
        Self { h, k, data }
    }

    /// # Panics
    ///
    /// Panics if `data.len() != h * k`.
    pub fn from_vec(h: usize, k: usize, data: Vec<T>) -> Self {
        assert_eq!(data.len(), h * k, "field data length");
        Self { h, k, data }
    }

    pub fn h(&self) -> usize {
        self.h
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn layout(&self) -> Layout {
        Layout::new().dim::<H>(self.h).dim::<K>(self.k)
    }
}

impl<T: Copy> Field<T> {
    pub fn get(&self, h: usize, k: usize) -> T {
        self.data[h * self.k + k]
    }

    pub fn set(&mut self, h: usize, k: usize, value: T) {
        self.data[h * self.k + k] = value;
    }
}

impl<T> IntoSid<T> for Field<T> {
    fn sid(&self, storage: StorageKind) -> Sid<'_, T> {
        let (strides, bounds, _) = self.layout().resolve().expect("H and K are distinct");
        Sid::from_parts(&self.data, strides, bounds, storage)
    }
}

impl<T> IntoSidMut<T> for Field<T> {
    fn sid_mut(&mut self, storage: StorageKind) -> SidMut<'_, T> {
        let (strides, bounds, _) = self.layout().resolve().expect("H and K are distinct");
        SidMut::from_parts(&mut self.data, strides, bounds, storage)
    }
}

/// `len` values uniform in `[-1, 1)` from a ChaCha8 stream seeded with `seed`.
pub fn random_values(seed: u64, len: usize) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0..1.0)).collect()
}

/// Random `h * k` field, see [`random_values`].
pub fn random_field(seed: u64, h: usize, k: usize) -> Field<f64> {
    Field::from_vec(h, k, random_values(seed, h * k))
}
