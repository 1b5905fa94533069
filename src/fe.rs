//! Element matrices of linear Lagrange (P1) finite elements.

use crate::{
  mesh::{CellIdx, SimplicialMesh, VertexIdx},
  Dim, MmpdeResult,
};

/// Geometric data of one cell, as seen by an element matrix provider.
pub struct CellGeometry<'a> {
  icell: CellIdx,
  vertices: &'a [VertexIdx],
  vol: f64,
  grad_lambda: na::DMatrix<f64>,
}
impl<'a> CellGeometry<'a> {
  pub fn new(mesh: &'a SimplicialMesh, icell: CellIdx) -> MmpdeResult<Self> {
    Ok(Self {
      icell,
      vertices: mesh.topology().cell(icell),
      vol: mesh.cell_simplex(icell).vol(),
      grad_lambda: mesh.grad_lambda(icell)?,
    })
  }

  pub fn icell(&self) -> CellIdx {
    self.icell
  }
  pub fn vertices(&self) -> &[VertexIdx] {
    self.vertices
  }
  pub fn nvertices(&self) -> usize {
    self.vertices.len()
  }
  pub fn dim(&self) -> Dim {
    self.nvertices() - 1
  }
  pub fn vol(&self) -> f64 {
    self.vol
  }
  /// One column per local vertex.
  pub fn grad_lambda(&self) -> &na::DMatrix<f64> {
    &self.grad_lambda
  }
}

pub trait ElmatProvider {
  fn eval(&self, cell: &CellGeometry) -> na::DMatrix<f64>;
}

impl<F> ElmatProvider for F
where
  F: Fn(&CellGeometry) -> na::DMatrix<f64>,
{
  fn eval(&self, cell: &CellGeometry) -> na::DMatrix<f64> {
    self(cell)
  }
}

/// The constant exterior drivatives of the reference barycentric coordinate
/// functions, given in the 1-form standard basis.
pub fn ref_difbarys(n: Dim) -> na::DMatrix<f64> {
  let mut ref_difbarys = na::DMatrix::zeros(n, n + 1);
  for i in 0..n {
    ref_difbarys[(i, 0)] = -1.0;
    ref_difbarys[(i, i + 1)] = 1.0;
  }
  ref_difbarys
}

/// Exact Element Matrix Provider for the Laplace operator.
///
/// $A = [(grad lambda_j, grad lambda_i)_(L^2 (K))]_(i,j)$
pub fn laplace_elmat(cell: &CellGeometry) -> na::DMatrix<f64> {
  let grads = cell.grad_lambda();
  cell.vol() * grads.transpose() * grads
}

/// Laplace Element Matrix Provider with a piecewise constant diffusion coefficient.
pub struct WeightedLaplaceElmat<'a> {
  cell_weights: &'a na::DVector<f64>,
}
impl<'a> WeightedLaplaceElmat<'a> {
  pub fn new(cell_weights: &'a na::DVector<f64>) -> Self {
    Self { cell_weights }
  }
}
impl ElmatProvider for WeightedLaplaceElmat<'_> {
  fn eval(&self, cell: &CellGeometry) -> na::DMatrix<f64> {
    self.cell_weights[cell.icell()] * laplace_elmat(cell)
  }
}

/// Exact Element Matrix Provider for mass bilinear form.
pub fn mass_elmat(cell: &CellGeometry) -> na::DMatrix<f64> {
  let ndofs = cell.nvertices();
  let dim = cell.dim();
  let v = cell.vol() / ((dim + 1) * (dim + 2)) as f64;
  let mut elmat = na::DMatrix::from_element(ndofs, ndofs, v);
  elmat.fill_diagonal(2.0 * v);
  elmat
}

/// Exact Element Matrix Provider for the convection form
/// $(w_h dot grad phi_j, phi_i)_(L^2 (K))$
/// with a P1 velocity field $w_h$ given by its nodal values.
pub struct ConvectionElmat<'a> {
  /// One column per mesh node.
  velocity: &'a na::DMatrix<f64>,
}
impl<'a> ConvectionElmat<'a> {
  pub fn new(velocity: &'a na::DMatrix<f64>) -> Self {
    Self { velocity }
  }
}
impl ElmatProvider for ConvectionElmat<'_> {
  fn eval(&self, cell: &CellGeometry) -> na::DMatrix<f64> {
    let mut local_velocity = na::DMatrix::zeros(cell.dim(), cell.nvertices());
    for (ilocal, &iglobal) in cell.vertices().iter().enumerate() {
      local_velocity.set_column(ilocal, &self.velocity.column(iglobal));
    }
    // (k, j) entry is w_k . grad lambda_j
    let nodal_derivatives = local_velocity.transpose() * cell.grad_lambda();
    mass_elmat(cell) * nodal_derivatives
  }
}

/// Weighted stiffness of a 1D linear element of length `h`.
pub fn interval_laplace_elmat(h: f64, weight: f64) -> na::Matrix2<f64> {
  let v = weight / h;
  na::Matrix2::new(v, -v, -v, v)
}

#[cfg(test)]
mod test {
  use super::{
    interval_laplace_elmat, laplace_elmat, mass_elmat, ref_difbarys, CellGeometry,
    ConvectionElmat, ElmatProvider,
  };
  use crate::{
    linalg::assert_mat_eq,
    mesh::{NodeCoords, SimplicialMesh},
  };

  use approx::assert_relative_eq;

  fn reference_triangle() -> SimplicialMesh {
    let coords = NodeCoords::from_points(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
    SimplicialMesh::new(coords, vec![vec![0, 1, 2]]).unwrap()
  }

  #[test]
  fn ref_difbarys_sum_to_zero() {
    for n in 1..=3 {
      let barys = ref_difbarys(n);
      for i in 0..n {
        assert_eq!(barys.row(i).sum(), 0.0);
      }
    }
  }

  #[test]
  fn laplace_reference_triangle() {
    let mesh = reference_triangle();
    let cell = CellGeometry::new(&mesh, 0).unwrap();
    #[rustfmt::skip]
    let expected = na::DMatrix::from_row_slice(3, 3, &[
       1.0, -0.5, -0.5,
      -0.5,  0.5,  0.0,
      -0.5,  0.0,  0.5,
    ]);
    assert_mat_eq(&laplace_elmat(&cell), &expected);
  }

  #[test]
  fn mass_integrates_one() {
    let mesh = reference_triangle();
    let cell = CellGeometry::new(&mesh, 0).unwrap();
    assert_relative_eq!(mass_elmat(&cell).sum(), 0.5, epsilon = 1e-15);
  }

  #[test]
  fn convection_of_constant_is_zero() {
    let mesh = reference_triangle();
    let cell = CellGeometry::new(&mesh, 0).unwrap();
    let velocity = na::DMatrix::from_column_slice(2, 3, &[0.3, -0.1, 0.2, 0.5, -0.4, 0.1]);
    let elmat = ConvectionElmat::new(&velocity).eval(&cell);
    let ones = na::DVector::from_element(3, 1.0);
    assert_relative_eq!((elmat * ones).norm(), 0.0, epsilon = 1e-15);
  }

  #[test]
  fn convection_of_linear_field_with_constant_velocity() {
    // w . grad u = 2 for u = x and w = (2, 0), so the row sums of
    // (w . grad phi_j, phi_i) applied to u are 2 * int phi_i = 2 |K| / 3.
    let mesh = reference_triangle();
    let cell = CellGeometry::new(&mesh, 0).unwrap();
    let velocity = na::DMatrix::from_column_slice(2, 3, &[2.0, 0.0, 2.0, 0.0, 2.0, 0.0]);
    let elmat = ConvectionElmat::new(&velocity).eval(&cell);
    let u = na::DVector::from_vec(vec![0.0, 1.0, 0.0]);
    for v in (elmat * u).iter() {
      assert_relative_eq!(*v, 2.0 * 0.5 / 3.0, epsilon = 1e-14);
    }
  }

  #[test]
  fn interval_stiffness() {
    let elmat = interval_laplace_elmat(0.5, 2.0);
    assert_eq!(elmat, na::Matrix2::new(4.0, -4.0, -4.0, 4.0));
  }
}
