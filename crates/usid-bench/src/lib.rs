//! Benchmark kernels for usid.
//!
//! - [`nabla`]: the three-pass finite-volume nabla on a [`Mesh`], run on
//!   any backend. Integration tests compare it against
//!   [`nabla_reference`](usid_test_utils::nabla_reference).
//! - [`vertex_sum`]: single-pass sum of edge values around each vertex.
//! - [`ring_profile`]: a ring mesh with seeded inputs, sized for timing.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use usid_core::{
    composite, dimension, make_loop, max_degree, sum_neighbors, ContractViolation,
    FieldDescriptor, IntoSid, IntoSidMut, Layout, Location, Neighbors, Ptr, PtrMut, Sid, SidMut,
    UsidError, H, K, N,
};
use usid_engine::{call_kernel, invoke, Backend, InvocationMetrics};
use usid_test_utils::{Mesh, NablaInputs, NablaOutputs};

dimension! {
    /// Slot axis of the edge-to-vertex table.
    pub E2V = "e2v"
}

dimension! {
    /// Slot axis of the vertex-to-edge table.
    pub V2E = "v2e"
}

composite! {
    struct EdgeFields<'a> => EdgePtr {
        e2v: Sid<'a, i32>,
        s_mxx: Sid<'a, f64>,
        s_myy: Sid<'a, f64>,
        zavg_mxx: SidMut<'a, f64>,
        zavg_myy: SidMut<'a, f64>,
    }
}

composite! {
    struct VertexFields<'a> => VertexPtr {
        v2e: Sid<'a, i32>,
        sign: Sid<'a, f64>,
        pnabla_mxx: SidMut<'a, f64>,
        pnabla_myy: SidMut<'a, f64>,
    }
}

composite! {
    struct VolumeFields<'a> => VolumePtr {
        vol: Sid<'a, f64>,
        pnabla_mxx: SidMut<'a, f64>,
        pnabla_myy: SidMut<'a, f64>,
    }
}

fn e2v_index(p: &EdgePtr<'_>) -> i32 {
    p.e2v.get()
}

fn pp_value(_: &EdgePtr<'_>, n: Ptr<'_, f64>) -> f64 {
    n.get()
}

fn v2e_index(p: &VertexPtr<'_>) -> i32 {
    p.v2e.get()
}

fn signed_value(p: &VertexPtr<'_>, n: Ptr<'_, f64>) -> f64 {
    n.get() * p.sign.get()
}

/// One fold target per vertical level of `field`.
fn level_targets(field: Sid<'_, f64>, k: usize) -> Result<Vec<Neighbors<'_, f64>>, ContractViolation> {
    (0..k)
        .map(|level| field.shifted::<K>(level as isize)?.neighbors())
        .collect()
}

/// Finite-volume nabla of `input.pp` on `mesh`, written to `out`.
pub fn nabla<B: Backend>(
    backend: &B,
    mesh: &Mesh,
    input: &NablaInputs,
    out: &mut NablaOutputs,
) -> Result<InvocationMetrics, UsidError> {
    let k = input.pp.k();
    let domain = mesh.domain(k);
    invoke(backend, domain, |inv| {
        let storage = inv.storage();
        inv.validate_connectivity(mesh.e2v(), Location::Vertex)?;
        inv.validate_connectivity(mesh.v2e(), Location::Edge)?;
        let mut zavg_mxx = inv.alloc_at::<f64>(Location::Edge)?;
        let mut zavg_myy = inv.alloc_at::<f64>(Location::Edge)?;
        let levels = make_loop::<K, _>(k);

        {
            let e2v = mesh.e2v().sid::<H, N>(storage)?.rename::<N, E2V>()?;
            let degree = max_degree::<E2V, _>(&e2v)?;
            let targets = level_targets(input.pp.sid(storage), k)?;
            let fields = EdgeFields {
                e2v,
                s_mxx: input.s_mxx.sid(storage),
                s_myy: input.s_myy.sid(storage),
                zavg_mxx: zavg_mxx.sid_mut(),
                zavg_myy: zavg_myy.sid_mut(),
            };
            let strides = fields.strides();
            let per_level = levels.bind(&strides)?;
            let avg = sum_neighbors::<E2V, f64, _, _>(degree, pp_value);
            let avg = avg.bind(&strides)?;
            inv.pass("nabla_edges", domain.edge, &fields, |p, _| {
                per_level.fold(p, 0usize, |level, q| {
                    let acc = 0.5 * avg.eval(q, e2v_index, &targets[level]);
                    q.zavg_mxx.set(q.s_mxx.get() * acc);
                    q.zavg_myy.set(q.s_myy.get() * acc);
                    level + 1
                });
            })?;
        }

        {
            let v2e = mesh.v2e().sid::<H, N>(storage)?.rename::<N, V2E>()?;
            let degree = max_degree::<V2E, _>(&v2e)?;
            let sign_layout = Layout::new().dim::<H>(mesh.vertex_count()).dim::<N>(degree);
            let sign = Sid::new(mesh.signs(), &sign_layout, storage)?.rename::<N, V2E>()?;
            let mxx_targets = level_targets(zavg_mxx.sid(), k)?;
            let myy_targets = level_targets(zavg_myy.sid(), k)?;
            let fields = VertexFields {
                v2e,
                sign,
                pnabla_mxx: out.pnabla_mxx.sid_mut(storage),
                pnabla_myy: out.pnabla_myy.sid_mut(storage),
            };
            let strides = fields.strides();
            let per_level = levels.bind(&strides)?;
            let flux = sum_neighbors::<V2E, f64, _, _>(degree, signed_value);
            let flux = flux.bind(&strides)?;
            inv.pass("nabla_vertices", domain.vertex, &fields, |p, _| {
                per_level.fold(p, 0usize, |level, q| {
                    q.pnabla_mxx.set(flux.eval(q, v2e_index, &mxx_targets[level]));
                    q.pnabla_myy.set(flux.eval(q, v2e_index, &myy_targets[level]));
                    level + 1
                });
            })?;
        }

        let fields = VolumeFields {
            vol: input.vol.sid(storage),
            pnabla_mxx: out.pnabla_mxx.sid_mut(storage),
            pnabla_myy: out.pnabla_myy.sid_mut(storage),
        };
        let per_level = levels.bind(&fields.strides())?;
        inv.pass("nabla_volume", domain.vertex, &fields, |p, _| {
            per_level.for_each(p, |q| {
                let vol = q.vol.get();
                q.pnabla_mxx.update(|x| x / vol);
                q.pnabla_myy.update(|x| x / vol);
            });
        })
    })
}

type Incident<'a> = (Ptr<'a, i32>, PtrMut<'a, f64>);

fn incident_edge(p: &Incident<'_>) -> i32 {
    p.0.get()
}

fn edge_value(_: &Incident<'_>, e: Ptr<'_, f64>) -> f64 {
    e.get()
}

/// Sum of `edge_values` around each vertex of `mesh`, ignoring orientation.
pub fn vertex_sum<B: Backend>(
    backend: &B,
    mesh: &Mesh,
    edge_values: &[f64],
    out: &mut [f64],
) -> Result<(), UsidError> {
    let storage = B::STORAGE;
    let v2e = mesh.v2e().sid::<H, N>(storage)?;
    let degree = max_degree::<N, _>(&v2e)?;
    let fields = (v2e, out.sid_mut(storage));
    let target = edge_values.sid(storage).neighbors()?;
    let sum = sum_neighbors::<N, f64, _, _>(degree, edge_value);
    let sum = sum.bind(&fields.strides())?;
    call_kernel(backend, "vertex_sum", mesh.vertex_count(), &fields, &target, |p, _, target| {
        p.1.set(sum.eval(p, incident_edge, target));
    })
}

/// Ring mesh with `vertices` vertices and random nabla inputs on `k` levels.
pub fn ring_profile(vertices: usize, k: usize, seed: u64) -> (Mesh, NablaInputs) {
    let mesh = Mesh::ring(vertices);
    let input = NablaInputs::random(&mesh, k, seed);
    (mesh, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use usid_engine::{EngineConfig, ParallelBackend, SequentialBackend};
    use usid_test_utils::nabla_reference;

    #[test]
    fn nabla_matches_reference_on_strip() {
        let mesh = Mesh::strip();
        let input = NablaInputs::random(&mesh, 3, 11);
        let expected = nabla_reference(&mesh, &input);
        let mut out = NablaOutputs::zeroed(&mesh, 3);
        let metrics = nabla(&SequentialBackend::default(), &mesh, &input, &mut out).unwrap();
        assert_eq!(out.max_abs_diff(&expected), 0.0);
        assert_eq!(metrics.passes.len(), 3);
        assert_eq!(metrics.tmp_allocations, 2);
        assert_eq!(metrics.tmp_bytes, 2 * mesh.edge_count() * 3 * 8);
    }

    #[test]
    fn vertex_sum_counts_both_incident_edges() {
        let mesh = Mesh::ring(40);
        let edges = vec![1.5; mesh.edge_count()];
        let mut out = vec![0.0; 40];
        let backend = ParallelBackend::new(EngineConfig::default()).unwrap();
        vertex_sum(&backend, &mesh, &edges, &mut out).unwrap();
        assert!(out.iter().all(|&x| x == 3.0));
    }

    #[test]
    fn ring_profile_is_seeded() {
        let (mesh, a) = ring_profile(16, 2, 5);
        let (_, b) = ring_profile(16, 2, 5);
        assert_eq!(mesh.vertex_count(), 16);
        assert_eq!(a.vol, b.vol);
        assert_eq!(a.pp.as_slice(), b.pp.as_slice());
    }
}
