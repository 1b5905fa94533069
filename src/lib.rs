//! Moving-mesh (r-adaptive) redistribution of simplicial finite element meshes
//! by the harmonic-mapping MMPDE method.
//!
//! Given a physical triangle or tetrahedron mesh and a P1 solution field on it,
//! [`harmap::MeshAdaptationEngine`] relocates mesh nodes towards regions of large
//! solution gradient while keeping the topology and the boundary shape intact.

extern crate nalgebra as na;
extern crate nalgebra_sparse as nas;

pub mod assemble;
pub mod classify;
pub mod constraint;
pub mod error;
pub mod fe;
pub mod harmap;
pub mod hull;
pub mod linalg;
pub mod logic;
pub mod mesh;
pub mod monitor;
pub mod ode;
pub mod params;
pub mod redistribute;
pub mod sparse;
pub mod step;
pub mod transport;
pub mod util;

pub use error::{MmpdeError, MmpdeResult};
pub use params::MmpdeParams;

pub type Dim = usize;
