//! The logical (computational) mesh of the harmonic map.
//!
//! It shares the connectivity of the physical mesh and is built once. For a
//! convex boundary the physical node positions are reused. A non-convex 2D
//! boundary is mapped side by side onto a regular polygon inscribed in the
//! unit circle, and the interior nodes follow from a Dirichlet Laplace problem.

use crate::{
  assemble::{assemble_galmat, fix_dofs_coeff},
  classify::{BoundaryClassification, BoundaryNormals},
  fe::laplace_elmat,
  hull,
  linalg::{Factorization as _, SparseSolver},
  mesh::{boundary::BoundaryLoop, NodeCoords, SimplicialMesh, VertexIdx},
  MmpdeError, MmpdeResult,
};

use std::f64::consts::TAU;

#[derive(Debug, Clone)]
pub struct LogicMesh {
  mesh: SimplicialMesh,
  convex: bool,
  /// Normals of the logical boundary.
  normals: BoundaryNormals,
}

impl LogicMesh {
  pub fn build(
    physical: &SimplicialMesh,
    classification: &BoundaryClassification,
    solver: &impl SparseSolver,
  ) -> MmpdeResult<Self> {
    let convex = is_convex_boundary(physical, classification);
    let mesh = if convex {
      tracing::debug!("convex boundary, logical mesh is the physical mesh");
      physical.clone()
    } else if physical.dim() == 2 {
      tracing::debug!(
        "non-convex boundary, mapping {} corners onto a regular polygon",
        classification.vertices().len()
      );
      let coords = harmonic_logic_coords(physical, classification, solver)?;
      physical.with_coords(coords)
    } else {
      return Err(MmpdeError::geometry(
        "logical mesh of a non-convex polyhedron",
      ));
    };
    let normals = BoundaryNormals::compute(&mesh);
    Ok(Self {
      mesh,
      convex,
      normals,
    })
  }

  pub fn mesh(&self) -> &SimplicialMesh {
    &self.mesh
  }
  pub fn coords(&self) -> &NodeCoords {
    self.mesh.coords()
  }
  pub fn is_convex(&self) -> bool {
    self.convex
  }
  pub fn normals(&self) -> &BoundaryNormals {
    &self.normals
  }
}

/// Whether the boundary corners are in convex position.
pub fn is_convex_boundary(mesh: &SimplicialMesh, classification: &BoundaryClassification) -> bool {
  let vertices = classification.vertices();
  let mut points = na::DMatrix::zeros(mesh.dim(), vertices.len());
  for (i, &v) in vertices.iter().enumerate() {
    points.set_column(i, &mesh.coords().coord(v));
  }
  hull::is_convex(&points)
}

/// Corners of the regular polygon with `n` corners on the unit circle,
/// the first one at angle zero, counter-clockwise.
pub fn regular_polygon(n: usize) -> Vec<na::Vector2<f64>> {
  (0..n)
    .map(|k| {
      let theta = TAU * k as f64 / n as f64;
      na::Vector2::new(theta.cos(), theta.sin())
    })
    .collect()
}

/// Rotation and uniform scaling that maps the vector `from` onto `to`.
fn similarity(from: na::Vector2<f64>, to: na::Vector2<f64>) -> na::Matrix2<f64> {
  let denom = from.norm_squared();
  let a = to.dot(&from) / denom;
  let b = (to.y * from.x - to.x * from.y) / denom;
  na::Matrix2::new(a, -b, b, a)
}

/// Logical positions of the boundary nodes: every physical side between two
/// consecutive corners is mapped by a similarity onto the matching polygon side.
pub fn boundary_logic_positions(
  physical: &SimplicialMesh,
  classification: &BoundaryClassification,
) -> MmpdeResult<Vec<(VertexIdx, na::Vector2<f64>)>> {
  let vertices = classification.vertices();
  let mut bloop = BoundaryLoop::trace(physical)?;
  bloop.rotate_to(vertices[0])?;

  let coord = |inode: VertexIdx| -> na::Vector2<f64> {
    let c = physical.coords().coord(inode);
    na::Vector2::new(c[0], c[1])
  };
  let nsides = vertices.len();
  let logic_corners = regular_polygon(nsides);
  let maps: Vec<na::Matrix2<f64>> = (0..nsides)
    .map(|k| {
      let next = (k + 1) % nsides;
      let physical_side = coord(vertices[next]) - coord(vertices[k]);
      let logic_side = logic_corners[next] - logic_corners[k];
      similarity(physical_side, logic_side)
    })
    .collect();

  let mut positions = Vec::with_capacity(bloop.len());
  let mut iside = 0;
  for &inode in bloop.nodes() {
    if iside + 1 < nsides && inode == vertices[iside + 1] {
      iside += 1;
    }
    let offset = coord(inode) - coord(vertices[iside]);
    positions.push((inode, logic_corners[iside] + maps[iside] * offset));
  }
  if iside + 1 != nsides {
    return Err(MmpdeError::config(
      "corners are not in boundary loop order",
    ));
  }
  Ok(positions)
}

fn harmonic_logic_coords(
  physical: &SimplicialMesh,
  classification: &BoundaryClassification,
  solver: &impl SparseSolver,
) -> MmpdeResult<NodeCoords> {
  let boundary = boundary_logic_positions(physical, classification)?;
  let laplace = assemble_galmat(physical, laplace_elmat)?;

  let mut logic = na::DMatrix::zeros(2, physical.nnodes());
  for icomp in 0..2 {
    let dof_coeffs: Vec<_> = boundary
      .iter()
      .map(|(inode, pos)| (*inode, pos[icomp]))
      .collect();
    let mut galmat = laplace.clone();
    let mut galvec = na::DVector::zeros(physical.nnodes());
    fix_dofs_coeff(&dof_coeffs, &mut galmat, &mut galvec);
    let solution = solver
      .factorize_spd(&galmat, "logical mesh laplacian")?
      .solve(&galvec)?;
    logic.set_row(icomp, &solution.transpose());
  }
  Ok(NodeCoords::new(logic))
}
