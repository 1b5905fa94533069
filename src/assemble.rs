//! Assembly of Galerkin matrices and enforcement of essential conditions.

use crate::{
  fe::{interval_laplace_elmat, CellGeometry, ElmatProvider},
  mesh::{SimplicialMesh, VertexIdx},
  sparse::SparseMatrix,
  util, MmpdeResult,
};

/// Assembly algorithm for the Galerkin Matrix of P1 elements.
pub fn assemble_galmat(
  mesh: &SimplicialMesh,
  elmat: impl ElmatProvider,
) -> MmpdeResult<SparseMatrix> {
  let nnodes = mesh.nnodes();
  let mut galmat = SparseMatrix::zeros(nnodes, nnodes);
  for icell in 0..mesh.ncells() {
    let cell = CellGeometry::new(mesh, icell)?;
    let elmat = elmat.eval(&cell);
    for (ilocal, &iglobal) in cell.vertices().iter().enumerate() {
      for (jlocal, &jglobal) in cell.vertices().iter().enumerate() {
        galmat.push(iglobal, jglobal, elmat[(ilocal, jlocal)]);
      }
    }
  }
  Ok(galmat)
}

/// Galerkin Matrix of a weighted 1D Laplacian on a chain of nodes.
///
/// `coords` are the (increasing) node positions along the chain,
/// `weights` holds one coefficient per element.
pub fn assemble_interval_galmat(coords: &[f64], weights: &[f64]) -> SparseMatrix {
  assert_eq!(coords.len(), weights.len() + 1);
  let nnodes = coords.len();
  let mut galmat = SparseMatrix::zeros(nnodes, nnodes);
  for (ielem, &weight) in weights.iter().enumerate() {
    let h = coords[ielem + 1] - coords[ielem];
    let elmat = interval_laplace_elmat(h, weight);
    for i in 0..2 {
      for j in 0..2 {
        galmat.push(ielem + i, ielem + j, elmat[(i, j)]);
      }
    }
  }
  galmat
}

/// Fix DOFs of FE solution.
///
/// Is primarly used the enforce essential dirichlet boundary conditions.
///
/// Modifies supplied galerkin matrix and galerkin vector,
/// such that the FE solution has the optionally given coefficents on the dofs.
/// $mat(A_0, 0; 0, I) vec(mu_0, mu_diff) = vec(phi - A_(0 diff) gamma, gamma)$
pub fn fix_dofs_coeff(
  dof_coeffs: &[(VertexIdx, f64)],
  galmat: &mut SparseMatrix,
  galvec: &mut na::DVector<f64>,
) {
  let ndofs = galmat.nrows();

  let dof_coeffs_opt = util::sparse_to_dense_data(dof_coeffs.to_vec(), ndofs);
  let dof_coeffs_zeroed =
    na::DVector::from_iterator(ndofs, dof_coeffs_opt.iter().map(|v| v.unwrap_or(0.0)));

  // Modify galvec.
  *galvec -= galmat.mul_vec(&dof_coeffs_zeroed);

  // Set galvec to prescribed coefficents.
  dof_coeffs.iter().for_each(|&(i, v)| galvec[i] = v);

  // Set entires zero that share a (row or column) index with a fixed dof.
  galmat.set_zero(|r, c| dof_coeffs_opt[r].is_some() || dof_coeffs_opt[c].is_some());

  // Set galmat diagonal for dofs to one.
  for &(i, _) in dof_coeffs {
    galmat.push(i, i, 1.0);
  }
}

#[cfg(test)]
mod test {
  use super::{assemble_galmat, assemble_interval_galmat, fix_dofs_coeff};
  use crate::{
    fe::{laplace_elmat, mass_elmat, WeightedLaplaceElmat},
    linalg::{FaerSolver, SparseSolver},
    mesh::hyperbox::HyperBoxMeshInfo,
  };

  use approx::assert_relative_eq;

  #[test]
  fn laplacian_annihilates_constants() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 3).to_mesh();
    let galmat = assemble_galmat(&mesh, laplace_elmat).unwrap();
    let ones = na::DVector::from_element(mesh.nnodes(), 1.0);
    assert_relative_eq!(galmat.mul_vec(&ones).norm(), 0.0, epsilon = 1e-12);
  }

  #[test]
  fn mass_integrates_domain() {
    let mesh = HyperBoxMeshInfo::new_unit(3, 2).to_mesh();
    let galmat = assemble_galmat(&mesh, mass_elmat).unwrap();
    let total: f64 = galmat.triplets().iter().map(|t| t.2).sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-12);
  }

  #[test]
  fn weighted_laplacian_scales() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    let weights = na::DVector::from_element(mesh.ncells(), 3.0);
    let weighted = assemble_galmat(&mesh, WeightedLaplaceElmat::new(&weights))
      .unwrap()
      .to_nalgebra_dense();
    let plain = assemble_galmat(&mesh, laplace_elmat)
      .unwrap()
      .to_nalgebra_dense();
    assert_relative_eq!(weighted, 3.0 * plain, epsilon = 1e-12);
  }

  #[test]
  fn dirichlet_problem_reproduces_linear_data() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 4).to_mesh();
    let mut galmat = assemble_galmat(&mesh, laplace_elmat).unwrap();
    let mut galvec = na::DVector::zeros(mesh.nnodes());
    let exact = |x: na::DVectorView<f64>| 1.0 + 2.0 * x[0] - x[1];
    let dof_coeffs: Vec<_> = mesh
      .topology()
      .boundary_nodes()
      .iter()
      .map(|&inode| (inode, exact(mesh.coords().coord(inode))))
      .collect();
    fix_dofs_coeff(&dof_coeffs, &mut galmat, &mut galvec);
    let solution = FaerSolver.solve_spd(&galmat, &galvec, "test").unwrap();
    let expected = mesh.coords().eval_coord_fn(exact);
    assert_relative_eq!(solution, expected, epsilon = 1e-12);
  }

  #[test]
  fn interval_chain() {
    let galmat = assemble_interval_galmat(&[0.0, 0.5, 1.5], &[1.0, 2.0]).to_nalgebra_dense();
    #[rustfmt::skip]
    let expected = na::DMatrix::from_row_slice(3, 3, &[
       2.0, -2.0,  0.0,
      -2.0,  4.0, -2.0,
       0.0, -2.0,  2.0,
    ]);
    assert_eq!(galmat, expected);
  }
}
