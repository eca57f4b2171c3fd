//! Mesh domain descriptor.

use std::fmt;

/// Kind of mesh element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// Mesh vertices.
    Vertex,
    /// Mesh edges.
    Edge,
    /// Mesh cells.
    Cell,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => write!(f, "vertex"),
            Self::Edge => write!(f, "edge"),
            Self::Cell => write!(f, "cell"),
        }
    }
}

/// Element counts of the mesh a kernel runs on.
///
/// Fixed for the duration of one invocation and passed by value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Domain {
    /// Number of vertices.
    pub vertex: usize,
    /// Number of edges.
    pub edge: usize,
    /// Number of cells.
    pub cell: usize,
    /// Number of vertical levels.
    pub k: usize,
}

impl Domain {
    /// Domain with no cells.
    pub fn new(vertex: usize, edge: usize, k: usize) -> Self {
        Self {
            vertex,
            edge,
            cell: 0,
            k,
        }
    }

    /// Same domain with `cell` cells.
    pub fn with_cells(self, cell: usize) -> Self {
        Self { cell, ..self }
    }

    /// Element count at `loc`.
    pub fn count(&self, loc: Location) -> usize {
        match loc {
            Location::Vertex => self.vertex,
            Location::Edge => self.edge,
            Location::Cell => self.cell,
        }
    }
}
