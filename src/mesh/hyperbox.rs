use super::{coordinates::NodeCoords, SimplicialMesh, VertexIdx};
use crate::{util::factorial, Dim};

use itertools::Itertools as _;

/// converts linear index to cartesian index
///
/// converts linear index in 0..dim_len^d to cartesian index in (0)^d..(dim_len)^d
pub fn linear_index2cartesian_index(
  mut lin_idx: usize,
  dim_len: usize,
  dim: usize,
) -> na::DVector<usize> {
  let mut cart_idx = na::DVector::zeros(dim);
  for icomp in 0..dim {
    cart_idx[icomp] = lin_idx % dim_len;
    lin_idx /= dim_len;
  }
  cart_idx
}

/// converts cartesian index to linear index
///
/// converts cartesian index in (0)^d..(dim_len)^d to linear index in 0..dim_len^d
pub fn cartesian_index2linear_index(cart_idx: &na::DVector<usize>, dim_len: usize) -> usize {
  let dim = cart_idx.len();
  let mut lin_idx = 0;
  for icomp in (0..dim).rev() {
    lin_idx *= dim_len;
    lin_idx += cart_idx[icomp];
  }
  lin_idx
}

/// Structured simplicial mesh of an axis aligned box.
///
/// Mostly used for building test and demo domains.
pub struct HyperBoxMeshInfo {
  min: na::DVector<f64>,
  max: na::DVector<f64>,
  nboxes_per_dim: usize,
}
// constructors
impl HyperBoxMeshInfo {
  pub fn new_min_max(min: na::DVector<f64>, max: na::DVector<f64>, nboxes_per_dim: usize) -> Self {
    assert!(min.len() == max.len());
    assert!(nboxes_per_dim >= 1);
    Self {
      min,
      max,
      nboxes_per_dim,
    }
  }
  pub fn new_unit(dim: Dim, nboxes_per_dim: usize) -> Self {
    let min = na::DVector::zeros(dim);
    let max = na::DVector::from_element(dim, 1.0);
    Self::new_min_max(min, max, nboxes_per_dim)
  }
}
// getters
impl HyperBoxMeshInfo {
  pub fn dim(&self) -> usize {
    self.min.len()
  }
  pub fn side_lengths(&self) -> na::DVector<f64> {
    &self.max - &self.min
  }
  pub fn nboxes_per_dim(&self) -> usize {
    self.nboxes_per_dim
  }
  pub fn nnodes_per_dim(&self) -> usize {
    self.nboxes_per_dim + 1
  }
  pub fn nboxes(&self) -> usize {
    self.nboxes_per_dim.pow(self.dim() as u32)
  }
  pub fn nnodes(&self) -> usize {
    self.nnodes_per_dim().pow(self.dim() as u32)
  }
  pub fn node_cart_idx(&self, inode: VertexIdx) -> na::DVector<usize> {
    linear_index2cartesian_index(inode, self.nnodes_per_dim(), self.dim())
  }
  pub fn node_pos(&self, inode: VertexIdx) -> na::DVector<f64> {
    (self.node_cart_idx(inode).cast::<f64>() / self.nboxes_per_dim as f64)
      .component_mul(&self.side_lengths())
      + &self.min
  }

  pub fn is_node_on_boundary(&self, inode: VertexIdx) -> bool {
    self
      .node_cart_idx(inode)
      .iter()
      .any(|&c| c == 0 || c == self.nboxes_per_dim)
  }
}

impl HyperBoxMeshInfo {
  pub fn compute_node_coords(&self) -> NodeCoords {
    let mut nodes = na::DMatrix::zeros(self.dim(), self.nnodes());
    for (inode, mut coord) in nodes.column_iter_mut().enumerate() {
      coord.copy_from(&self.node_pos(inode));
    }
    NodeCoords::new(nodes)
  }

  pub fn compute_cells(&self, node_coords: &NodeCoords) -> Vec<Vec<VertexIdx>> {
    let dim = self.dim();
    let mut cells = Vec::with_capacity(factorial(dim) * self.nboxes());

    // iterate through all boxes that make up the mesh
    for ibox in 0..self.nboxes() {
      let vertex_icart_origin = linear_index2cartesian_index(ibox, self.nboxes_per_dim, dim);
      let ivertex_origin = cartesian_index2linear_index(&vertex_icart_origin, self.nnodes_per_dim());

      // construct all $d!$ simplicies that make up the current box
      // each permutation of the basis directions (dimensions) gives rise to one simplicial cell
      let box_cells = (0..dim).permutations(dim).map(|basisdirs| {
        let mut cell = vec![ivertex_origin];

        // every shift step gives us one vertex
        let mut vertex_icart = vertex_icart_origin.clone();
        for basisdir in basisdirs {
          vertex_icart[basisdir] += 1;
          cell.push(cartesian_index2linear_index(&vertex_icart, self.nnodes_per_dim()));
        }

        // Ensure consistent positive orientation of cells.
        if !node_coords.coord_simplex(&cell).is_positively_oriented() {
          cell.swap(dim - 1, dim);
        }
        cell
      });

      cells.extend(box_cells);
    }
    cells
  }

  pub fn to_mesh(&self) -> SimplicialMesh {
    let node_coords = self.compute_node_coords();
    let cells = self.compute_cells(&node_coords);
    SimplicialMesh::new(node_coords, cells).expect("structured box mesh is valid")
  }
}
