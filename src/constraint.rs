//! Linear constraints on the logical boundary node positions.
//!
//! The unknowns are the coordinates of the boundary nodes, component-major:
//! unknown `k * nboundary + p` is coordinate `k` of the `p`-th (sorted)
//! boundary node.
//!
//! - `BoundaryInner`: one row `n . xi = n . xi0`, sliding in the tangent plane.
//! - `ArrisNode`: one such row per face normal, sliding along the edge line.
//! - `Vertex`: one row `xi_k = xi0_k` per coordinate, fixed.

use crate::{
  classify::{BoundaryClassification, NodeClass},
  logic::LogicMesh,
  mesh::VertexIdx,
  sparse::SparseMatrix,
  MmpdeError, MmpdeResult,
};

#[derive(Debug, Clone)]
pub struct ConstraintSystem {
  a: SparseMatrix,
  b: na::DVector<f64>,
}

impl ConstraintSystem {
  pub fn assemble(logic: &LogicMesh, classification: &BoundaryClassification) -> MmpdeResult<Self> {
    let mesh = logic.mesh();
    let dim = mesh.dim();
    let boundary_nodes = mesh.topology().boundary_nodes();
    let nboundary = boundary_nodes.len();
    let xi0 = logic.coords();

    let mut rows: Vec<(Vec<(usize, f64)>, f64)> = Vec::new();
    let mut push_normal_row = |p: usize, inode: VertexIdx, normal: &na::DVector<f64>| {
      let row = (0..dim).map(|k| (k * nboundary + p, normal[k])).collect();
      rows.push((row, normal.dot(&xi0.coord(inode))));
    };

    for (p, &inode) in boundary_nodes.iter().enumerate() {
      let normals = logic.normals().get(inode);
      match classification.class(inode) {
        NodeClass::BoundaryInner => {
          let normal = normals.first().ok_or_else(|| missing_normal(inode))?;
          push_normal_row(p, inode, normal);
        }
        NodeClass::ArrisNode => {
          let [n1, n2, ..] = normals else {
            return Err(missing_normal(inode));
          };
          push_normal_row(p, inode, n1);
          push_normal_row(p, inode, n2);
        }
        NodeClass::Vertex => {
          for k in 0..dim {
            let mut unit = na::DVector::zeros(dim);
            unit[k] = 1.0;
            push_normal_row(p, inode, &unit);
          }
        }
        NodeClass::Interior => unreachable!("boundary nodes are classified"),
      }
    }

    let mut a = SparseMatrix::zeros(rows.len(), dim * nboundary);
    let mut b = na::DVector::zeros(rows.len());
    for (irow, (row, rhs)) in rows.into_iter().enumerate() {
      for (icol, v) in row {
        a.push(irow, icol, v);
      }
      b[irow] = rhs;
    }
    tracing::debug!(
      "assembled {} constraints on {} boundary unknowns",
      a.nrows(),
      a.ncols()
    );
    Ok(Self { a, b })
  }

  pub fn matrix(&self) -> &SparseMatrix {
    &self.a
  }
  pub fn rhs(&self) -> &na::DVector<f64> {
    &self.b
  }
  pub fn nconstraints(&self) -> usize {
    self.a.nrows()
  }

  /// Largest violation of the constraints by component-major boundary coordinates.
  pub fn residual(&self, x: &na::DVector<f64>) -> f64 {
    (self.a.mul_vec(x) - &self.b).amax()
  }
}

fn missing_normal(inode: VertexIdx) -> MmpdeError {
  MmpdeError::config(format!(
    "boundary node {inode} lacks the normals its class requires"
  ))
}

/// Component-major stacking of the coordinates of the given nodes.
pub fn stack_components(coords: &na::DMatrix<f64>, nodes: &[VertexIdx]) -> na::DVector<f64> {
  let n = nodes.len();
  let mut stacked = na::DVector::zeros(coords.nrows() * n);
  for k in 0..coords.nrows() {
    for (p, &inode) in nodes.iter().enumerate() {
      stacked[k * n + p] = coords[(k, inode)];
    }
  }
  stacked
}

/// Inverse of [`stack_components`], writing into the node columns of `coords`.
pub fn unstack_components(stacked: &na::DVector<f64>, nodes: &[VertexIdx], coords: &mut na::DMatrix<f64>) {
  let n = nodes.len();
  for k in 0..coords.nrows() {
    for (p, &inode) in nodes.iter().enumerate() {
      coords[(k, inode)] = stacked[k * n + p];
    }
  }
}

#[cfg(test)]
mod test {
  use super::{stack_components, unstack_components, ConstraintSystem};
  use crate::{
    classify::BoundaryClassification, linalg::FaerSolver, logic::LogicMesh,
    mesh::hyperbox::HyperBoxMeshInfo,
  };

  use approx::assert_relative_eq;

  #[test]
  fn row_counts() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 3).to_mesh();
    let classification = BoundaryClassification::detect(&mesh);
    let logic = LogicMesh::build(&mesh, &classification, &FaerSolver).unwrap();
    let constraints = ConstraintSystem::assemble(&logic, &classification).unwrap();
    // 8 side nodes, 4 corners with 2 rows each
    assert_eq!(constraints.nconstraints(), 8 + 4 * 2);
    assert_eq!(constraints.matrix().ncols(), 2 * 12);

    let cube = HyperBoxMeshInfo::new_unit(3, 2).to_mesh();
    let classification = BoundaryClassification::detect(&cube);
    let logic = LogicMesh::build(&cube, &classification, &FaerSolver).unwrap();
    let constraints = ConstraintSystem::assemble(&logic, &classification).unwrap();
    assert_eq!(constraints.nconstraints(), 6 + 12 * 2 + 8 * 3);
    assert_eq!(constraints.matrix().ncols(), 3 * 26);
  }

  #[test]
  fn logical_boundary_satisfies_constraints() {
    for dim in [2, 3] {
      let mesh = HyperBoxMeshInfo::new_unit(dim, 3).to_mesh();
      let classification = BoundaryClassification::detect(&mesh);
      let logic = LogicMesh::build(&mesh, &classification, &FaerSolver).unwrap();
      let constraints = ConstraintSystem::assemble(&logic, &classification).unwrap();
      let boundary = mesh.topology().boundary_nodes();
      let x = stack_components(logic.coords().matrix(), boundary);
      assert_relative_eq!(constraints.residual(&x), 0.0, epsilon = 1e-14);
    }
  }

  #[test]
  fn sliding_along_a_side_is_admissible() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    let classification = BoundaryClassification::detect(&mesh);
    let logic = LogicMesh::build(&mesh, &classification, &FaerSolver).unwrap();
    let constraints = ConstraintSystem::assemble(&logic, &classification).unwrap();
    let boundary = mesh.topology().boundary_nodes();

    let mut coords = logic.coords().matrix().clone();
    // node 1 = (0.5, 0) slides along the bottom side
    coords[(0, 1)] = 0.3;
    let x = stack_components(&coords, boundary);
    assert_relative_eq!(constraints.residual(&x), 0.0, epsilon = 1e-14);
    // but may not leave it
    coords[(1, 1)] = 0.1;
    let x = stack_components(&coords, boundary);
    assert_relative_eq!(constraints.residual(&x), 0.1, epsilon = 1e-14);

    let mut roundtrip = na::DMatrix::zeros(2, mesh.nnodes());
    unstack_components(&x, boundary, &mut roundtrip);
    assert_eq!(roundtrip.column(1), coords.column(1));
  }
}
