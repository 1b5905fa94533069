//! Boundary node classification and per-node boundary normals.

use crate::{
  mesh::{boundary::BoundaryLoop, SimplicialMesh, VertexIdx},
  util, MmpdeError, MmpdeResult,
};

use indexmap::IndexMap;
use itertools::Itertools as _;

/// Two unit normals closer than this (in max-norm) are the same normal.
pub const NORMAL_TOL: f64 = 1e-10;

/// The distinct outward unit normals of the boundary faces incident to each
/// boundary node, in first-seen order.
#[derive(Debug, Clone)]
pub struct BoundaryNormals {
  normals: IndexMap<VertexIdx, Vec<na::DVector<f64>>>,
}
impl BoundaryNormals {
  pub fn compute(mesh: &SimplicialMesh) -> Self {
    let topology = mesh.topology();
    let normals = topology
      .boundary_nodes()
      .iter()
      .map(|&inode| {
        let mut distinct: Vec<na::DVector<f64>> = Vec::new();
        for iface in topology.node_boundary_faces(inode) {
          let normal = mesh.face_unit_normal(iface);
          if !distinct.iter().any(|n| same_normal(n, &normal)) {
            distinct.push(normal);
          }
        }
        (inode, distinct)
      })
      .collect();
    Self { normals }
  }

  /// Distinct normals of a boundary node, empty for interior nodes.
  pub fn get(&self, inode: VertexIdx) -> &[na::DVector<f64>] {
    self.normals.get(&inode).map_or(&[], |n| n.as_slice())
  }

  pub fn iter(&self) -> impl Iterator<Item = (VertexIdx, &[na::DVector<f64>])> {
    self.normals.iter().map(|(&inode, n)| (inode, n.as_slice()))
  }
}

fn same_normal(a: &na::DVector<f64>, b: &na::DVector<f64>) -> bool {
  (a - b).amax() <= NORMAL_TOL
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeClass {
  Interior,
  /// Interior of a boundary edge (2D) or face (3D).
  BoundaryInner,
  /// Interior of a boundary edge of a 3D polyhedron.
  ArrisNode,
  /// Corner of the boundary.
  Vertex,
}

/// Partition of the boundary nodes, fixed for the whole run.
#[derive(Debug, Clone)]
pub struct BoundaryClassification {
  /// 2D: in counter-clockwise order along the boundary.
  vertices: Vec<VertexIdx>,
  inner: Vec<VertexIdx>,
  arris: Vec<VertexIdx>,
  classes: Vec<NodeClass>,
}

impl BoundaryClassification {
  /// Classifies the boundary nodes by the number of distinct normals
  /// of their incident boundary faces.
  pub fn detect(mesh: &SimplicialMesh) -> Self {
    let dim = mesh.dim();
    let normals = BoundaryNormals::compute(mesh);
    let mut vertices = Vec::new();
    let mut inner = Vec::new();
    let mut arris = Vec::new();
    for (inode, n) in normals.iter() {
      match n.len() {
        1 => inner.push(inode),
        2 if dim == 3 => arris.push(inode),
        _ => vertices.push(inode),
      }
    }
    Self::from_parts(mesh, vertices, inner, arris)
  }

  /// Classification from caller supplied index sets.
  ///
  /// `arris` is required for 3D meshes and must be absent or empty in 2D.
  pub fn new(
    mesh: &SimplicialMesh,
    vertices: Vec<VertexIdx>,
    inner: Vec<VertexIdx>,
    arris: Option<Vec<VertexIdx>>,
  ) -> MmpdeResult<Self> {
    let arris = match (mesh.dim(), arris) {
      (3, None) => {
        return Err(MmpdeError::config(
          "3D meshes need the indices of the edge interior (arris) nodes",
        ))
      }
      (2, Some(arris)) if !arris.is_empty() => {
        return Err(MmpdeError::config("2D meshes have no arris nodes"))
      }
      (_, arris) => arris.unwrap_or_default(),
    };

    let flags = mesh.topology().flag_boundary_nodes();
    let all = vertices.iter().chain(&inner).chain(&arris).copied();
    let mut seen = vec![false; mesh.nnodes()];
    for inode in all {
      if inode >= mesh.nnodes() || !flags[inode] {
        return Err(MmpdeError::config(format!(
          "node {inode} is not a boundary node"
        )));
      }
      if std::mem::replace(&mut seen[inode], true) {
        return Err(MmpdeError::config(format!(
          "node {inode} is classified more than once"
        )));
      }
    }
    if let Some(missing) = mesh
      .topology()
      .boundary_nodes()
      .iter()
      .find(|&&inode| !seen[inode])
    {
      return Err(MmpdeError::config(format!(
        "boundary node {missing} is not classified"
      )));
    }
    if vertices.len() < mesh.dim() + 1 {
      return Err(MmpdeError::config(format!(
        "a {}D boundary needs at least {} vertices, got {}",
        mesh.dim(),
        mesh.dim() + 1,
        vertices.len()
      )));
    }

    Ok(Self::from_parts(mesh, vertices, inner, arris))
  }

  fn from_parts(
    mesh: &SimplicialMesh,
    mut vertices: Vec<VertexIdx>,
    mut inner: Vec<VertexIdx>,
    mut arris: Vec<VertexIdx>,
  ) -> Self {
    vertices.sort_unstable();
    inner.sort_unstable();
    arris.sort_unstable();
    if mesh.dim() == 2 {
      if let Ok(bloop) = BoundaryLoop::trace(mesh) {
        vertices.sort_by_key(|&v| bloop.position(v));
      }
    }

    let mut classes = vec![NodeClass::Interior; mesh.nnodes()];
    for (nodes, class) in [
      (&vertices, NodeClass::Vertex),
      (&inner, NodeClass::BoundaryInner),
      (&arris, NodeClass::ArrisNode),
    ] {
      nodes.iter().for_each(|&inode| classes[inode] = class);
    }

    Self {
      vertices,
      inner,
      arris,
      classes,
    }
  }
}

impl BoundaryClassification {
  pub fn vertices(&self) -> &[VertexIdx] {
    &self.vertices
  }
  pub fn inner(&self) -> &[VertexIdx] {
    &self.inner
  }
  pub fn arris(&self) -> &[VertexIdx] {
    &self.arris
  }
  pub fn class(&self, inode: VertexIdx) -> NodeClass {
    self.classes[inode]
  }
  pub fn vertex_flags(&self) -> Vec<bool> {
    util::indicies_to_flags(&self.vertices, self.classes.len())
  }

  /// All classified boundary nodes, sorted.
  pub fn boundary_nodes(&self) -> Vec<VertexIdx> {
    self
      .vertices
      .iter()
      .chain(&self.inner)
      .chain(&self.arris)
      .copied()
      .sorted_unstable()
      .collect()
  }
}

#[cfg(test)]
mod test {
  use super::{BoundaryClassification, BoundaryNormals, NodeClass};
  use crate::{
    mesh::{hyperbox::HyperBoxMeshInfo, NodeCoords, SimplicialMesh},
    MmpdeError,
  };

  use itertools::Itertools as _;

  fn assert_partition(mesh: &SimplicialMesh, classification: &BoundaryClassification) {
    let union = classification.boundary_nodes();
    assert!(union.iter().all_unique());
    assert_eq!(union.as_slice(), mesh.topology().boundary_nodes());
  }

  #[test]
  fn unit_square_classes() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 3).to_mesh();
    let classification = BoundaryClassification::detect(&mesh);
    assert_partition(&mesh, &classification);
    // corners in counter-clockwise order starting at the origin
    assert_eq!(classification.vertices(), &[0, 3, 15, 12]);
    assert_eq!(classification.inner().len(), 8);
    assert!(classification.arris().is_empty());
    assert_eq!(classification.class(5), NodeClass::Interior);
    assert_eq!(classification.class(1), NodeClass::BoundaryInner);
    assert_eq!(classification.class(15), NodeClass::Vertex);
  }

  #[test]
  fn unit_cube_classes() {
    let mesh = HyperBoxMeshInfo::new_unit(3, 2).to_mesh();
    let classification = BoundaryClassification::detect(&mesh);
    assert_partition(&mesh, &classification);
    assert_eq!(classification.vertices().len(), 8);
    assert_eq!(classification.arris().len(), 12);
    assert_eq!(classification.inner().len(), 6);
    // node 1 = (0.5, 0, 0) lies on an edge of the cube
    assert_eq!(classification.class(1), NodeClass::ArrisNode);
    assert_eq!(classification.class(13), NodeClass::Interior);
  }

  #[test]
  fn arris_normals_are_face_normals() {
    let mesh = HyperBoxMeshInfo::new_unit(3, 2).to_mesh();
    let normals = BoundaryNormals::compute(&mesh);
    let n = normals.get(1);
    assert_eq!(n.len(), 2);
    for normal in n {
      assert_eq!(normal[0], 0.0);
      assert_eq!(normal.norm(), 1.0);
    }
    assert!(normals.get(13).is_empty());
  }

  #[test]
  fn l_shape_has_reflex_vertex() {
    let coords = NodeCoords::from_points(&[
      [0.0, 0.0],
      [1.0, 0.0],
      [2.0, 0.0],
      [0.0, 1.0],
      [1.0, 1.0],
      [2.0, 1.0],
      [0.0, 2.0],
      [1.0, 2.0],
    ]);
    let cells = vec![
      vec![0, 1, 4],
      vec![0, 4, 3],
      vec![1, 2, 5],
      vec![1, 5, 4],
      vec![3, 4, 7],
      vec![3, 7, 6],
    ];
    let mesh = SimplicialMesh::new(coords, cells).unwrap();
    let classification = BoundaryClassification::detect(&mesh);
    assert_partition(&mesh, &classification);
    assert_eq!(classification.vertices(), &[0, 2, 5, 4, 7, 6]);
    assert_eq!(classification.inner(), &[1, 3]);
  }

  #[test]
  fn explicit_sets_are_validated() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    let ok = BoundaryClassification::new(&mesh, vec![0, 2, 8, 6], vec![1, 3, 5, 7], None);
    assert!(ok.is_ok());

    let missing = BoundaryClassification::new(&mesh, vec![0, 2, 8, 6], vec![1, 3, 5], None);
    assert!(matches!(missing, Err(MmpdeError::Configuration(_))));

    let interior = BoundaryClassification::new(&mesh, vec![0, 2, 8, 6], vec![1, 3, 5, 7, 4], None);
    assert!(matches!(interior, Err(MmpdeError::Configuration(_))));

    let twice = BoundaryClassification::new(&mesh, vec![0, 2, 8, 6, 1], vec![1, 3, 5, 7], None);
    assert!(matches!(twice, Err(MmpdeError::Configuration(_))));

    let cube = HyperBoxMeshInfo::new_unit(3, 1).to_mesh();
    let no_arris = BoundaryClassification::new(&cube, (0..8).collect(), vec![], None);
    assert!(matches!(no_arris, Err(MmpdeError::Configuration(_))));
  }
}
