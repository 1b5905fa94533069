use super::VertexIdx;
use crate::{fe::ref_difbarys, util::factorial, Dim};

#[derive(Debug, Clone, PartialEq)]
pub struct NodeCoords {
  /// The node coordinates in the columns of a matrix.
  matrix: na::DMatrix<f64>,
}
impl NodeCoords {
  pub fn new(matrix: na::DMatrix<f64>) -> Self {
    Self { matrix }
  }

  pub fn from_points<const D: usize>(points: &[[f64; D]]) -> Self {
    let matrix = na::DMatrix::from_iterator(D, points.len(), points.iter().flatten().copied());
    Self { matrix }
  }

  pub fn dim(&self) -> Dim {
    self.matrix.nrows()
  }
  pub fn nnodes(&self) -> usize {
    self.matrix.ncols()
  }

  pub fn coord(&self, inode: VertexIdx) -> na::DVectorView<f64> {
    self.matrix.column(inode)
  }

  pub fn matrix(&self) -> &na::DMatrix<f64> {
    &self.matrix
  }
  pub fn matrix_mut(&mut self) -> &mut na::DMatrix<f64> {
    &mut self.matrix
  }
  pub fn into_matrix(self) -> na::DMatrix<f64> {
    self.matrix
  }

  /// Coordinate `icomp` of all nodes.
  pub fn component(&self, icomp: usize) -> na::DVector<f64> {
    self.matrix.row(icomp).transpose()
  }

  pub fn coord_simplex(&self, simp: &[VertexIdx]) -> CoordSimplex {
    let mut vert_coords = na::DMatrix::zeros(self.dim(), simp.len());
    for (i, &v) in simp.iter().enumerate() {
      vert_coords.set_column(i, &self.coord(v));
    }
    CoordSimplex::new(vert_coords)
  }

  pub fn eval_coord_fn<F>(&self, f: F) -> na::DVector<f64>
  where
    F: FnMut(na::DVectorView<f64>) -> f64,
  {
    na::DVector::from_iterator(self.nnodes(), self.matrix.column_iter().map(f))
  }

  /// Largest euclidean distance between corresponding nodes.
  pub fn max_displacement(&self, other: &Self) -> f64 {
    assert_eq!(self.matrix.shape(), other.matrix.shape());
    (&self.matrix - &other.matrix)
      .column_iter()
      .map(|c| c.norm())
      .fold(0.0, f64::max)
  }
}

/// A full-dimensional simplex given by its vertex coordinates.
pub struct CoordSimplex {
  vertices: na::DMatrix<f64>,
}
impl CoordSimplex {
  pub fn new(vertices: na::DMatrix<f64>) -> Self {
    Self { vertices }
  }
}
impl CoordSimplex {
  pub fn nvertices(&self) -> usize {
    self.vertices.ncols()
  }
  pub fn dim(&self) -> Dim {
    self.nvertices() - 1
  }
  pub fn vertices(&self) -> &na::DMatrix<f64> {
    &self.vertices
  }

  /// Edge vectors `x_i - x_0` as columns.
  pub fn spanning_vectors(&self) -> na::DMatrix<f64> {
    let mut mat = na::DMatrix::zeros(self.vertices.nrows(), self.dim());
    let v0 = self.vertices.column(0);
    for (i, vi) in self.vertices.column_iter().skip(1).enumerate() {
      let v0i = vi - v0;
      mat.set_column(i, &v0i);
    }
    mat
  }
  pub fn det(&self) -> f64 {
    self.spanning_vectors().determinant()
  }
  pub fn signed_vol(&self) -> f64 {
    self.det() / factorial(self.dim()) as f64
  }
  pub fn vol(&self) -> f64 {
    self.signed_vol().abs()
  }
  pub fn is_positively_oriented(&self) -> bool {
    self.det() > 0.0
  }

  /// Gradients of the barycentric coordinate functions (one per column).
  /// `None` for a degenerate simplex.
  pub fn barycentric_gradients(&self) -> Option<na::DMatrix<f64>> {
    let inv = self.spanning_vectors().try_inverse()?;
    Some(inv.transpose() * ref_difbarys(self.dim()))
  }
}
