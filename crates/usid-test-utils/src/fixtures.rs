//! Mesh fixtures and a reference nabla.
//!
//! - [`Mesh::ring`]: `n` vertices and `n` edges, edge `e` joining `e` and
//!   `(e + 1) % n`.
//! - [`Mesh::strip`]: six vertices in two rows of three, nine edges,
//!   vertex degrees 2 to 4 so that `v2e` carries sentinel slots.
//!
//! [`nabla_reference`] computes the three-pass finite-volume nabla with
//! plain index loops for comparison against engine runs.

use usid_core::{Connectivity, Domain, SKIP_VALUE};

use crate::{random_field, random_values, Field};

/// Edge list with derived connectivity tables.
#[derive(Clone, Debug)]
pub struct Mesh {
    vertex_count: usize,
    edges: Vec<(i32, i32)>,
    e2v: Connectivity,
    v2e: Connectivity,
    signs: Vec<f64>,
}

impl Mesh {
    /// Mesh from an edge list. Edge `e` is oriented from `edges[e].0` to
    /// `edges[e].1`.
    ///
    /// # Panics
    ///
    /// Panics if an endpoint is outside `0..vertex_count`.
    pub fn from_edges(vertex_count: usize, edges: &[(i32, i32)]) -> Self {
        let mut incident: Vec<Vec<(i32, f64)>> = vec![Vec::new(); vertex_count];
        for (e, &(a, b)) in edges.iter().enumerate() {
            assert!(a >= 0 && (a as usize) < vertex_count, "edge {e} start");
            assert!(b >= 0 && (b as usize) < vertex_count, "edge {e} end");
            incident[a as usize].push((e as i32, 1.0));
            incident[b as usize].push((e as i32, -1.0));
        }
        let rows: Vec<Vec<i32>> = incident
            .iter()
            .map(|r| r.iter().map(|&(e, _)| e).collect())
            .collect();
        let v2e = Connectivity::from_rows(&rows);
        let degree = v2e.max_degree();
        let mut signs = vec![0.0; vertex_count * degree];
        for (v, row) in incident.iter().enumerate() {
            for (slot, &(_, sign)) in row.iter().enumerate() {
                signs[v * degree + slot] = sign;
            }
        }
        let e2v_rows: Vec<[i32; 2]> = edges.iter().map(|&(a, b)| [a, b]).collect();
        Self {
            vertex_count,
            edges: edges.to_vec(),
            e2v: Connectivity::from_rows(&e2v_rows),
            v2e,
            signs,
        }
    }

    pub fn ring(n: usize) -> Self {
        let edges: Vec<(i32, i32)> = (0..n).map(|e| (e as i32, ((e + 1) % n) as i32)).collect();
        Self::from_edges(n, &edges)
    }

    /// ```text
    /// 0 ── 1 ── 2
    /// │  ╱ │  ╱ │
    /// 3 ── 4 ── 5
    /// ```
    pub fn strip() -> Self {
        Self::from_edges(
            6,
            &[
                (0, 1),
                (1, 2),
                (3, 4),
                (4, 5),
                (0, 3),
                (1, 4),
                (2, 5),
                (1, 3),
                (2, 4),
            ],
        )
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn edges(&self) -> &[(i32, i32)] {
        &self.edges
    }

    pub fn domain(&self, k: usize) -> Domain {
        Domain::new(self.vertex_count, self.edges.len(), k)
    }

    pub fn e2v(&self) -> &Connectivity {
        &self.e2v
    }

    pub fn v2e(&self) -> &Connectivity {
        &self.v2e
    }

    /// `+1` where the vertex starts the edge, `-1` where it ends it, `0`
    /// in sentinel slots. Vertex-major, one value per `v2e` slot.
    pub fn signs(&self) -> &[f64] {
        &self.signs
    }

    pub fn sign(&self, v: usize, slot: usize) -> f64 {
        self.signs[v * self.v2e.max_degree() + slot]
    }
}

/// Inputs of the nabla operator.
#[derive(Clone, Debug)]
pub struct NablaInputs {
    /// Dual-face normal x component per edge.
    pub s_mxx: Vec<f64>,
    /// Dual-face normal y component per edge.
    pub s_myy: Vec<f64>,
    /// Scalar per vertex and level.
    pub pp: Field<f64>,
    /// Dual volume per vertex.
    pub vol: Vec<f64>,
}

impl NablaInputs {
    pub fn random(mesh: &Mesh, k: usize, seed: u64) -> Self {
        let vol = random_values(seed ^ 0x3, mesh.vertex_count())
            .into_iter()
            .map(|v| 2.0 + v)
            .collect();
        Self {
            s_mxx: random_values(seed ^ 0x1, mesh.edge_count()),
            s_myy: random_values(seed ^ 0x2, mesh.edge_count()),
            pp: random_field(seed, mesh.vertex_count(), k),
            vol,
        }
    }
}

/// Outputs of the nabla operator.
#[derive(Clone, Debug, PartialEq)]
pub struct NablaOutputs {
    pub pnabla_mxx: Field<f64>,
    pub pnabla_myy: Field<f64>,
}

impl NablaOutputs {
    pub fn zeroed(mesh: &Mesh, k: usize) -> Self {
        Self {
            pnabla_mxx: Field::new(mesh.vertex_count(), k),
            pnabla_myy: Field::new(mesh.vertex_count(), k),
        }
    }

    /// Largest absolute difference to `other` over both components.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        let a = self.pnabla_mxx.as_slice().iter().zip(other.pnabla_mxx.as_slice());
        let b = self.pnabla_myy.as_slice().iter().zip(other.pnabla_myy.as_slice());
        a.chain(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }
}

/// Finite-volume nabla with index loops.
///
/// 1. Per edge and level: `zavg = 0.5 * (pp[a] + pp[b])`, scaled by the
///    edge's `s_mxx` and `s_myy`.
/// 2. Per vertex and level: signed sum of the incident edges' averages.
/// 3. Divide by the vertex volume.
pub fn nabla_reference(mesh: &Mesh, input: &NablaInputs) -> NablaOutputs {
    let k = input.pp.k();
    let mut zavg_mxx = Field::<f64>::new(mesh.edge_count(), k);
    let mut zavg_myy = Field::<f64>::new(mesh.edge_count(), k);
    for (e, &(a, b)) in mesh.edges().iter().enumerate() {
        for level in 0..k {
            let avg = 0.5 * (input.pp.get(a as usize, level) + input.pp.get(b as usize, level));
            zavg_mxx.set(e, level, input.s_mxx[e] * avg);
            zavg_myy.set(e, level, input.s_myy[e] * avg);
        }
    }

    let mut out = NablaOutputs::zeroed(mesh, k);
    for v in 0..mesh.vertex_count() {
        for level in 0..k {
            let mut mxx = 0.0;
            let mut myy = 0.0;
            for (slot, &e) in mesh.v2e().row(v).iter().enumerate() {
                if e == SKIP_VALUE {
                    continue;
                }
                mxx += zavg_mxx.get(e as usize, level) * mesh.sign(v, slot);
                myy += zavg_myy.get(e as usize, level) * mesh.sign(v, slot);
            }
            out.pnabla_mxx.set(v, level, mxx / input.vol[v]);
            out.pnabla_myy.set(v, level, myy / input.vol[v]);
        }
    }
    out
}
