//! A mesh plays the role of a container of mesh entities (cells, faces, edges, nodes).
//! It provides a global numbering for unique identification of the entities
//! and the incidence information the moving-mesh core needs.
//!
//! Topology and geometry are kept apart: a [`MeshTopology`] is shared through
//! an [`Rc`] by every [`SimplicialMesh`] with the same connectivity, such as
//! the physical mesh, the logical mesh and every moved physical mesh.

pub mod boundary;
pub mod coordinates;
pub mod hyperbox;

pub use coordinates::{CoordSimplex, NodeCoords};

use crate::{util, Dim, MmpdeError, MmpdeResult};

use indexmap::IndexSet;
use itertools::Itertools as _;
use num_integer::binomial;
use std::rc::Rc;

pub type VertexIdx = usize;
pub type CellIdx = usize;
pub type FaceIdx = usize;

/// Connectivity of a triangle (2D) or tetrahedron (3D) mesh.
#[derive(Debug)]
pub struct MeshTopology {
  dim: Dim,
  nnodes: usize,
  cells: Vec<Vec<VertexIdx>>,
  /// Facets (codim 1) with sorted vertices.
  faces: IndexSet<Vec<VertexIdx>>,
  /// Edges with sorted vertices.
  edges: IndexSet<[VertexIdx; 2]>,
  /// Local face `i` of a cell is the one opposite to its local vertex `i`.
  cell_faces: Vec<Vec<FaceIdx>>,
  face_cells: Vec<Vec<CellIdx>>,
  node_cells: Vec<Vec<CellIdx>>,
  node_faces: Vec<Vec<FaceIdx>>,
  boundary_faces: Vec<FaceIdx>,
  /// sorted
  boundary_nodes: Vec<VertexIdx>,
}

// constructors
impl MeshTopology {
  pub fn new(nnodes: usize, cells: Vec<Vec<VertexIdx>>) -> MmpdeResult<Self> {
    let Some(first) = cells.first() else {
      return Err(MmpdeError::config("mesh has no cells"));
    };
    let dim = first.len().saturating_sub(1);
    if !(2..=3).contains(&dim) {
      return Err(MmpdeError::config(format!(
        "only triangle and tetrahedron meshes are supported, got cells with {} vertices",
        first.len()
      )));
    }
    for (icell, cell) in cells.iter().enumerate() {
      if cell.len() != dim + 1 {
        return Err(MmpdeError::config(format!(
          "cell {icell} has {} vertices, expected {}",
          cell.len(),
          dim + 1
        )));
      }
      if let Some(&v) = cell.iter().find(|&&v| v >= nnodes) {
        return Err(MmpdeError::config(format!(
          "cell {icell} references node {v}, but mesh has {nnodes} nodes"
        )));
      }
      if !cell.iter().all_unique() {
        return Err(MmpdeError::config(format!(
          "cell {icell} has repeated vertices"
        )));
      }
    }

    let mut faces = IndexSet::new();
    let mut edges = IndexSet::with_capacity(cells.len() * binomial(dim + 1, 2));
    let mut cell_faces = Vec::with_capacity(cells.len());
    let mut face_cells: Vec<Vec<CellIdx>> = Vec::new();
    let mut node_cells = vec![Vec::new(); nnodes];

    for (icell, cell) in cells.iter().enumerate() {
      let mut this_faces = Vec::with_capacity(dim + 1);
      for ivertex in 0..cell.len() {
        let mut face = cell.clone();
        face.remove(ivertex);
        face.sort_unstable();
        let (iface, new_insert) = faces.insert_full(face);
        if new_insert {
          face_cells.push(Vec::new());
        }
        face_cells[iface].push(icell);
        this_faces.push(iface);
      }
      cell_faces.push(this_faces);

      for (&a, &b) in cell.iter().tuple_combinations() {
        edges.insert([a.min(b), a.max(b)]);
      }
      for &v in cell {
        node_cells[v].push(icell);
      }
    }

    if let Some(iface) = face_cells.iter().position(|cs| cs.len() > 2) {
      return Err(MmpdeError::config(format!(
        "face {iface} is shared by more than two cells"
      )));
    }
    if let Some(inode) = node_cells.iter().position(|cs| cs.is_empty()) {
      return Err(MmpdeError::config(format!(
        "node {inode} does not belong to any cell"
      )));
    }

    let mut node_faces = vec![Vec::new(); nnodes];
    for (iface, face) in faces.iter().enumerate() {
      for &v in face {
        node_faces[v].push(iface);
      }
    }

    // The boundary faces are characterized by the fact that they
    // only have 1 cell as super entity.
    let boundary_faces: Vec<FaceIdx> = (0..faces.len())
      .filter(|&iface| face_cells[iface].len() == 1)
      .collect();
    let boundary_nodes: Vec<VertexIdx> = boundary_faces
      .iter()
      .flat_map(|&iface| faces[iface].iter().copied())
      .sorted_unstable()
      .dedup()
      .collect();

    Ok(Self {
      dim,
      nnodes,
      cells,
      faces,
      edges,
      cell_faces,
      face_cells,
      node_cells,
      node_faces,
      boundary_faces,
      boundary_nodes,
    })
  }
}

// getters
impl MeshTopology {
  pub fn dim(&self) -> Dim {
    self.dim
  }
  pub fn nnodes(&self) -> usize {
    self.nnodes
  }
  pub fn ncells(&self) -> usize {
    self.cells.len()
  }
  pub fn nfaces(&self) -> usize {
    self.faces.len()
  }
  pub fn nedges(&self) -> usize {
    self.edges.len()
  }
  pub fn cells(&self) -> &[Vec<VertexIdx>] {
    &self.cells
  }
  pub fn cell(&self, icell: CellIdx) -> &[VertexIdx] {
    &self.cells[icell]
  }
  pub fn face(&self, iface: FaceIdx) -> &[VertexIdx] {
    &self.faces[iface]
  }
  pub fn face_idx(&self, face: &[VertexIdx]) -> Option<FaceIdx> {
    let sorted: Vec<_> = face.iter().copied().sorted_unstable().collect();
    self.faces.get_index_of(&sorted)
  }
  pub fn edges(&self) -> impl ExactSizeIterator<Item = &[VertexIdx; 2]> + '_ {
    self.edges.iter()
  }
  pub fn cell_faces(&self, icell: CellIdx) -> &[FaceIdx] {
    &self.cell_faces[icell]
  }
  pub fn face_cells(&self, iface: FaceIdx) -> &[CellIdx] {
    &self.face_cells[iface]
  }
  pub fn node_cells(&self, inode: VertexIdx) -> &[CellIdx] {
    &self.node_cells[inode]
  }
  pub fn node_faces(&self, inode: VertexIdx) -> &[FaceIdx] {
    &self.node_faces[inode]
  }
}

/// A simplicial mesh with both topological and geometric information.
#[derive(Debug, Clone)]
pub struct SimplicialMesh {
  topology: Rc<MeshTopology>,
  coords: NodeCoords,
}

// constructors
impl SimplicialMesh {
  pub fn new(coords: NodeCoords, cells: Vec<Vec<VertexIdx>>) -> MmpdeResult<Self> {
    let topology = MeshTopology::new(coords.nnodes(), cells)?;
    Self::from_parts(Rc::new(topology), coords)
  }

  pub fn from_parts(topology: Rc<MeshTopology>, coords: NodeCoords) -> MmpdeResult<Self> {
    if coords.dim() != topology.dim() {
      return Err(MmpdeError::config(format!(
        "{}D coordinates for a {}D mesh",
        coords.dim(),
        topology.dim()
      )));
    }
    if coords.nnodes() != topology.nnodes() {
      return Err(MmpdeError::config(format!(
        "{} node coordinates for a mesh with {} nodes",
        coords.nnodes(),
        topology.nnodes()
      )));
    }
    let mesh = Self { topology, coords };
    if let Some(icell) = (0..mesh.ncells()).find(|&icell| mesh.cell_simplex(icell).det() == 0.0) {
      return Err(MmpdeError::config(format!("cell {icell} is degenerate")));
    }
    Ok(mesh)
  }

  /// A mesh with the same connectivity but new node positions.
  pub fn with_coords(&self, coords: NodeCoords) -> Self {
    assert_eq!(coords.dim(), self.dim());
    assert_eq!(coords.nnodes(), self.nnodes());
    Self {
      topology: Rc::clone(&self.topology),
      coords,
    }
  }
}

// getters
impl SimplicialMesh {
  pub fn dim(&self) -> Dim {
    self.topology.dim()
  }
  pub fn nnodes(&self) -> usize {
    self.topology.nnodes()
  }
  pub fn ncells(&self) -> usize {
    self.topology.ncells()
  }
  pub fn topology(&self) -> &Rc<MeshTopology> {
    &self.topology
  }
  pub fn coords(&self) -> &NodeCoords {
    &self.coords
  }
  pub fn cells(&self) -> &[Vec<VertexIdx>] {
    self.topology.cells()
  }
}

// geometry
impl SimplicialMesh {
  pub fn cell_simplex(&self, icell: CellIdx) -> CoordSimplex {
    self.coords.coord_simplex(self.topology.cell(icell))
  }

  pub fn cell_signed_measures(&self) -> na::DVector<f64> {
    na::DVector::from_iterator(
      self.ncells(),
      (0..self.ncells()).map(|icell| self.cell_simplex(icell).signed_vol()),
    )
  }

  pub fn cell_measures(&self) -> na::DVector<f64> {
    self.cell_signed_measures().abs()
  }

  /// Gradients of the barycentric coordinate functions of a cell,
  /// one column per local vertex.
  pub fn grad_lambda(&self, icell: CellIdx) -> MmpdeResult<na::DMatrix<f64>> {
    self
      .cell_simplex(icell)
      .barycentric_gradients()
      .ok_or_else(|| MmpdeError::geometry(format!("cell {icell} is degenerate")))
  }

  /// Outward unit normal of a face, oriented away from its (first) incident cell.
  pub fn face_unit_normal(&self, iface: FaceIdx) -> na::DVector<f64> {
    let face = self.topology.face(iface);
    let icell = self.topology.face_cells(iface)[0];
    let opposite = self
      .topology
      .cell(icell)
      .iter()
      .copied()
      .find(|v| !face.contains(v))
      .expect("cell has a vertex opposite to each of its faces");

    let p0 = self.coords.coord(face[0]);
    let mut normal = match self.dim() {
      2 => {
        let t = self.coords.coord(face[1]) - p0;
        na::DVector::from_vec(vec![t[1], -t[0]])
      }
      3 => {
        let t1 = na::Vector3::from_iterator((self.coords.coord(face[1]) - p0).iter().copied());
        let t2 = na::Vector3::from_iterator((self.coords.coord(face[2]) - p0).iter().copied());
        let n = t1.cross(&t2);
        na::DVector::from_column_slice(n.as_slice())
      }
      _ => unreachable!("mesh dimension is validated on construction"),
    };
    normal.normalize_mut();
    if normal.dot(&(p0 - self.coords.coord(opposite))) < 0.0 {
      normal.neg_mut();
    }
    normal
  }

  pub fn edge_lengths(&self) -> Vec<f64> {
    self
      .topology
      .edges()
      .map(|&[a, b]| (self.coords.coord(b) - self.coords.coord(a)).norm())
      .collect()
  }

  pub fn min_edge_length(&self) -> f64 {
    util::fmin(self.edge_lengths()).unwrap_or(0.0)
  }
}

#[cfg(test)]
mod test {
  use super::{hyperbox::HyperBoxMeshInfo, MeshTopology, NodeCoords, SimplicialMesh};
  use crate::MmpdeError;

  use approx::assert_relative_eq;

  #[test]
  fn incidence_check_2d() {
    let topology = MeshTopology::new(3, vec![vec![0, 1, 2]]).unwrap();
    assert_eq!(topology.dim(), 2);
    assert_eq!(topology.nfaces(), 3);
    assert_eq!(topology.nedges(), 3);
    assert_eq!(topology.boundary_faces().len(), 3);
    assert_eq!(topology.boundary_nodes(), &[0, 1, 2]);

    // local face i is opposite to local vertex i
    for (ivertex, &iface) in topology.cell_faces(0).iter().enumerate() {
      assert!(!topology.face(iface).contains(&ivertex));
    }
    assert_eq!(topology.node_cells(1), &[0]);
    assert_eq!(topology.node_faces(0).len(), 2);
  }

  #[test]
  fn interior_faces_have_two_cells() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    let topology = mesh.topology();
    assert_eq!(topology.ncells(), 8);
    assert_eq!(topology.nedges(), 16);
    assert_eq!(topology.boundary_faces().len(), 8);
    assert_eq!(topology.boundary_nodes(), &[0, 1, 2, 3, 5, 6, 7, 8]);
    let ninterior_faces = (0..topology.nfaces())
      .filter(|&iface| topology.face_cells(iface).len() == 2)
      .count();
    assert_eq!(ninterior_faces, 8);
  }

  #[test]
  fn measures_and_normals() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    let measures = mesh.cell_signed_measures();
    for &m in measures.iter() {
      assert_relative_eq!(m, 0.125);
    }
    let bottom = mesh.topology().face_idx(&[1, 0]).unwrap();
    let normal = mesh.face_unit_normal(bottom);
    assert_eq!(normal.as_slice(), &[0.0, -1.0]);
    let right = mesh.topology().face_idx(&[5, 8]).unwrap();
    assert_eq!(mesh.face_unit_normal(right).as_slice(), &[1.0, 0.0]);
    assert_relative_eq!(mesh.min_edge_length(), 0.5);
  }

  #[test]
  fn outward_normals_3d() {
    let mesh = HyperBoxMeshInfo::new_unit(3, 1).to_mesh();
    let top = mesh.topology().face_idx(&[4, 5, 7]).unwrap();
    assert_eq!(mesh.face_unit_normal(top).as_slice(), &[0.0, 0.0, 1.0]);
    let total: f64 = mesh.cell_measures().iter().sum();
    assert_relative_eq!(total, 1.0, epsilon = 1e-14);
  }

  #[test]
  fn rejects_invalid_meshes() {
    let err = MeshTopology::new(2, vec![vec![0, 1]]).unwrap_err();
    assert!(matches!(err, MmpdeError::Configuration(_)));

    let err = MeshTopology::new(3, vec![vec![0, 1, 5]]).unwrap_err();
    assert!(matches!(err, MmpdeError::Configuration(_)));

    let err = MeshTopology::new(4, vec![vec![0, 1, 2]]).unwrap_err();
    assert!(matches!(err, MmpdeError::Configuration(_)));

    // 4-simplex
    let err = MeshTopology::new(5, vec![vec![0, 1, 2, 3, 4]]).unwrap_err();
    assert!(matches!(err, MmpdeError::Configuration(_)));

    // collinear triangle
    let coords = NodeCoords::from_points(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
    let err = SimplicialMesh::new(coords, vec![vec![0, 1, 2]]).unwrap_err();
    assert!(matches!(err, MmpdeError::Configuration(_)));
  }

  #[test]
  fn moved_mesh_shares_topology() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 1).to_mesh();
    let mut coords = mesh.coords().clone();
    coords.matrix_mut()[(0, 3)] = 0.9;
    let moved = mesh.with_coords(coords);
    assert!(std::rc::Rc::ptr_eq(mesh.topology(), moved.topology()));
    assert_eq!(mesh.coords().coord(3)[0], 1.0);
    assert_eq!(moved.coords().coord(3)[0], 0.9);
  }
}
