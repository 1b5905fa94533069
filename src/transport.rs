//! Transport of a P1 field from the old to the new node positions.
//!
//! The field follows the nodes through the pseudo-time ODE
//! $M y' = P y$ on $[0, 1]$ with $y(0) = u_h$, where $M$ is the mass matrix
//! and $P_(i j) = -sum_K integral_K phi_i (Delta x_h dot grad phi_j)$ with the
//! displacement $Delta x = x_"old" - x_"new"$. Both operators are frozen on
//! the old mesh.

use crate::{
  assemble::assemble_galmat,
  fe::{mass_elmat, ConvectionElmat},
  linalg::{Factorization as _, SparseSolver},
  mesh::{NodeCoords, SimplicialMesh},
  ode::OdeIntegrator,
  MmpdeResult,
};

pub fn transport(
  old: &SimplicialMesh,
  new_coords: &NodeCoords,
  uh: &na::DVector<f64>,
  solver: &impl SparseSolver,
  integrator: &impl OdeIntegrator,
) -> MmpdeResult<na::DVector<f64>> {
  let displacement = old.coords().matrix() - new_coords.matrix();

  let mass = assemble_galmat(old, mass_elmat)?;
  let mass = solver.factorize_spd(&mass, "transport mass matrix")?;

  let mut convection = assemble_galmat(old, ConvectionElmat::new(&displacement))?;
  convection.scale(-1.0);
  let convection = convection.to_nalgebra_csr();

  integrator.integrate(
    |_, y| {
      let rhs: na::DVector<f64> = &convection * y;
      mass.solve(&rhs)
    },
    (0.0, 1.0),
    uh.clone(),
  )
}

#[cfg(test)]
mod test {
  use super::transport;
  use crate::{
    linalg::FaerSolver,
    mesh::{hyperbox::HyperBoxMeshInfo, NodeCoords},
    ode::Rk23,
  };

  use approx::assert_relative_eq;

  #[test]
  fn constant_field_is_preserved() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 4).to_mesh();
    let mut new = mesh.coords().matrix().clone();
    new[(0, 6)] += 0.05;
    new[(1, 12)] -= 0.07;
    let uh = na::DVector::from_element(mesh.nnodes(), 2.5);
    let moved = transport(
      &mesh,
      &NodeCoords::new(new),
      &uh,
      &FaerSolver,
      &Rk23::default(),
    )
    .unwrap();
    assert_relative_eq!(moved, uh, epsilon = 1e-10);
  }

  #[test]
  fn translation_carries_linear_field() {
    for dim in [2, 3] {
      let mesh = HyperBoxMeshInfo::new_unit(dim, 3).to_mesh();
      let shift = na::DVector::from_fn(dim, |i, _| 0.1 - 0.05 * i as f64);
      let mut new = mesh.coords().matrix().clone();
      for mut c in new.column_iter_mut() {
        c += &shift;
      }
      let new = NodeCoords::new(new);
      let u = |x: na::DVectorView<f64>| 1.0 + 3.0 * x[0] - 2.0 * x[1];
      let uh = mesh.coords().eval_coord_fn(u);
      let moved = transport(&mesh, &new, &uh, &FaerSolver, &Rk23::default()).unwrap();
      assert_relative_eq!(moved, new.eval_coord_fn(u), epsilon = 1e-9);
    }
  }

  #[test]
  fn small_deformation_approximates_interpolation() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 8).to_mesh();
    let new = mesh
      .coords()
      .matrix()
      .map_with_location(|r, c, x| if r == 0 { x + 0.005 * (c as f64 * 0.37).sin() } else { x });
    let new = NodeCoords::new(new);
    let u = |x: na::DVectorView<f64>| x[0] + 0.5 * x[1];
    let uh = mesh.coords().eval_coord_fn(u);
    let moved = transport(&mesh, &new, &uh, &FaerSolver, &Rk23::default()).unwrap();
    let exact = new.eval_coord_fn(u);
    assert!((moved - exact).amax() < 5e-3);
  }
}
