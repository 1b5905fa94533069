//! The monitor (control) function steering the node density.

use crate::{mesh::SimplicialMesh, util, MmpdeResult};

/// Per-node sum of the measures of the incident cells.
pub fn star_measure(mesh: &SimplicialMesh, cell_measures: &na::DVector<f64>) -> na::DVector<f64> {
  let mut star = na::DVector::zeros(mesh.nnodes());
  for (icell, cell) in mesh.cells().iter().enumerate() {
    for &inode in cell {
      star[inode] += cell_measures[icell];
    }
  }
  star
}

/// Gradient of the P1 interpolant of `uh` on every cell, one column per cell.
pub fn cell_gradients(mesh: &SimplicialMesh, uh: &na::DVector<f64>) -> MmpdeResult<na::DMatrix<f64>> {
  let mut grads = na::DMatrix::zeros(mesh.dim(), mesh.ncells());
  for (icell, cell) in mesh.cells().iter().enumerate() {
    let grad_lambda = mesh.grad_lambda(icell)?;
    let local_uh = na::DVector::from_iterator(cell.len(), cell.iter().map(|&v| uh[v]));
    grads.set_column(icell, &(grad_lambda * local_uh));
  }
  Ok(grads)
}

/// Star measure weighted average of cell values at the nodes.
pub fn node_average(
  mesh: &SimplicialMesh,
  cell_values: &na::DVector<f64>,
  cell_measures: &na::DVector<f64>,
  star_measure: &na::DVector<f64>,
) -> na::DVector<f64> {
  let mut node_values = na::DVector::zeros(mesh.nnodes());
  for (icell, cell) in mesh.cells().iter().enumerate() {
    for &inode in cell {
      node_values[inode] += cell_measures[icell] * cell_values[icell];
    }
  }
  node_values.component_div(star_measure)
}

/// Unweighted mean of node values over the vertices of each cell.
pub fn cell_mean(mesh: &SimplicialMesh, node_values: &na::DVector<f64>) -> na::DVector<f64> {
  na::DVector::from_iterator(
    mesh.ncells(),
    mesh
      .cells()
      .iter()
      .map(|cell| cell.iter().map(|&v| node_values[v]).sum::<f64>() / cell.len() as f64),
  )
}

/// Mesh density indicator $M = sqrt(1 + beta |grad u|^2 / max |grad u|)$
/// per cell. Uniform if `uh` is constant.
pub fn raw_monitor(grads: &na::DMatrix<f64>, beta: f64) -> na::DVector<f64> {
  let norms_sq = grads.row_iter().fold(
    na::RowDVector::zeros(grads.ncols()),
    |acc, row| acc + row.component_mul(&row),
  );
  let max_norm = util::fmax(norms_sq.iter().copied()).unwrap_or(0.0).sqrt();
  na::DVector::from_iterator(
    grads.ncols(),
    norms_sq.iter().map(|&n| {
      let gradient_term = if max_norm > 0.0 { n / max_norm } else { 0.0 };
      (1.0 + beta * gradient_term).sqrt()
    }),
  )
}

/// The control function $G = 1/M$ per cell, where $M$ is smoothed `mol_times`
/// times by averaging to the nodes and back to the cells.
pub fn control_function(
  mesh: &SimplicialMesh,
  uh: &na::DVector<f64>,
  cell_measures: &na::DVector<f64>,
  star_measure: &na::DVector<f64>,
  beta: f64,
  mol_times: usize,
) -> MmpdeResult<na::DVector<f64>> {
  let grads = cell_gradients(mesh, uh)?;
  let mut m_cell = raw_monitor(&grads, beta);
  for _ in 0..mol_times {
    let m_node = node_average(mesh, &m_cell, cell_measures, star_measure);
    m_cell = cell_mean(mesh, &m_node);
  }
  Ok(m_cell.map(|m| 1.0 / m))
}

#[cfg(test)]
mod test {
  use super::{cell_gradients, control_function, star_measure};
  use crate::mesh::hyperbox::HyperBoxMeshInfo;

  use approx::assert_relative_eq;

  #[test]
  fn star_measures_sum_to_scaled_volume() {
    for dim in [2, 3] {
      let mesh = HyperBoxMeshInfo::new_unit(dim, 3).to_mesh();
      let measures = mesh.cell_measures();
      let star = star_measure(&mesh, &measures);
      assert_relative_eq!(star.sum(), (dim + 1) as f64, epsilon = 1e-12);
    }
  }

  #[test]
  fn gradient_of_linear_field() {
    let mesh = HyperBoxMeshInfo::new_unit(3, 2).to_mesh();
    let uh = mesh
      .coords()
      .eval_coord_fn(|x| 2.0 * x[0] - x[1] + 0.5 * x[2]);
    let grads = cell_gradients(&mesh, &uh).unwrap();
    for grad in grads.column_iter() {
      assert_relative_eq!(grad[0], 2.0, epsilon = 1e-12);
      assert_relative_eq!(grad[1], -1.0, epsilon = 1e-12);
      assert_relative_eq!(grad[2], 0.5, epsilon = 1e-12);
    }
  }

  #[test]
  fn constant_field_gives_uniform_monitor() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 4).to_mesh();
    let measures = mesh.cell_measures();
    let star = star_measure(&mesh, &measures);
    let uh = na::DVector::from_element(mesh.nnodes(), 3.0);
    let g = control_function(&mesh, &uh, &measures, &star, 10.0, 2).unwrap();
    for &v in g.iter() {
      assert_relative_eq!(v, 1.0, epsilon = 1e-14);
    }
  }

  #[test]
  fn monitor_is_positive_and_bounded() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 8).to_mesh();
    let measures = mesh.cell_measures();
    let star = star_measure(&mesh, &measures);
    let uh = mesh
      .coords()
      .eval_coord_fn(|x| (-50.0 * ((x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2))).exp());
    for beta in [0.0, 0.5, 10.0, 1e6] {
      for mol_times in [0, 1, 4] {
        let g = control_function(&mesh, &uh, &measures, &star, beta, mol_times).unwrap();
        assert!(g.iter().all(|&v| v > 0.0 && v <= 1.0));
        if beta == 0.0 {
          assert!(g.iter().all(|&v| v == 1.0));
        }
      }
    }
  }

  #[test]
  fn steep_cells_get_small_weight() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 8).to_mesh();
    let measures = mesh.cell_measures();
    let star = star_measure(&mesh, &measures);
    // ramp in x < 0.5, flat beyond
    let uh = mesh.coords().eval_coord_fn(|x| (10.0 * x[0]).min(5.0));
    let g = control_function(&mesh, &uh, &measures, &star, 1.0, 0).unwrap();
    let gmin = g.iter().copied().fold(f64::INFINITY, f64::min);
    let gmax = g.iter().copied().fold(0.0, f64::max);
    assert_relative_eq!(gmax, 1.0);
    assert!(gmin < 0.5);
  }
}
