use super::{FaceIdx, MeshTopology, SimplicialMesh, VertexIdx};
use crate::{util, MmpdeError, MmpdeResult};

use itertools::Itertools as _;

impl MeshTopology {
  pub fn has_boundary(&self) -> bool {
    !self.boundary_faces.is_empty()
  }

  /// For a d-mesh computes the boundary, which consists of facets ((d-1)-faces).
  ///
  /// The boundary facets are characterized by the fact that they
  /// only have 1 cell as super entity.
  pub fn boundary_faces(&self) -> &[FaceIdx] {
    &self.boundary_faces
  }

  pub fn is_boundary_face(&self, iface: FaceIdx) -> bool {
    self.face_cells(iface).len() == 1
  }

  /// The nodes that lie on the boundary of the mesh, sorted.
  pub fn boundary_nodes(&self) -> &[VertexIdx] {
    &self.boundary_nodes
  }

  pub fn flag_boundary_nodes(&self) -> Vec<bool> {
    util::indicies_to_flags(&self.boundary_nodes, self.nnodes())
  }

  pub fn interior_nodes(&self) -> Vec<VertexIdx> {
    util::flags_to_indicies(
      &self
        .flag_boundary_nodes()
        .into_iter()
        .map(|b| !b)
        .collect_vec(),
    )
  }

  /// Boundary faces incident to a node.
  pub fn node_boundary_faces(&self, inode: VertexIdx) -> impl Iterator<Item = FaceIdx> + '_ {
    self
      .node_faces(inode)
      .iter()
      .copied()
      .filter(|&iface| self.is_boundary_face(iface))
  }
}

/// The boundary of a 2D mesh as one closed, counter-clockwise node cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryLoop {
  nodes: Vec<VertexIdx>,
}

impl BoundaryLoop {
  /// Traces the boundary edges of a 2D mesh.
  ///
  /// Fails if the mesh is not 2D, if a boundary node is not incident to
  /// exactly two boundary edges or if the boundary has several components.
  pub fn trace(mesh: &SimplicialMesh) -> MmpdeResult<Self> {
    let topology = mesh.topology();
    if topology.dim() != 2 {
      return Err(MmpdeError::config("boundary loops only exist for 2D meshes"));
    }

    let positions = util::indicies_to_positions(topology.boundary_nodes(), topology.nnodes());
    let mut neighbours = vec![Vec::with_capacity(2); topology.boundary_nodes().len()];
    for &iface in topology.boundary_faces() {
      let &[a, b] = topology.face(iface) else {
        unreachable!("2D faces are edges")
      };
      let (Some(pa), Some(pb)) = (positions[a], positions[b]) else {
        unreachable!("boundary face nodes are boundary nodes")
      };
      neighbours[pa].push(b);
      neighbours[pb].push(a);
    }
    if let Some(pos) = neighbours.iter().position(|n| n.len() != 2) {
      return Err(MmpdeError::config(format!(
        "boundary node {} is incident to {} boundary edges",
        topology.boundary_nodes()[pos],
        neighbours[pos].len()
      )));
    }

    let start = topology.boundary_nodes()[0];
    let mut nodes = vec![start];
    let mut prev = start;
    let mut curr = neighbours[0][0];
    while curr != start {
      nodes.push(curr);
      let Some(pcurr) = positions[curr] else {
        unreachable!("loop only visits boundary nodes")
      };
      let next = if neighbours[pcurr][0] != prev {
        neighbours[pcurr][0]
      } else {
        neighbours[pcurr][1]
      };
      prev = curr;
      curr = next;
    }
    if nodes.len() != topology.boundary_nodes().len() {
      return Err(MmpdeError::config(format!(
        "boundary consists of several loops ({} of {} boundary nodes on the first one)",
        nodes.len(),
        topology.boundary_nodes().len()
      )));
    }

    let mut this = Self { nodes };
    if this.signed_area(mesh) < 0.0 {
      this.nodes[1..].reverse();
    }
    Ok(this)
  }

  pub fn nodes(&self) -> &[VertexIdx] {
    &self.nodes
  }
  pub fn len(&self) -> usize {
    self.nodes.len()
  }
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  pub fn position(&self, inode: VertexIdx) -> Option<usize> {
    self.nodes.iter().position(|&v| v == inode)
  }

  /// Rotates the cycle so that `inode` comes first.
  pub fn rotate_to(&mut self, inode: VertexIdx) -> MmpdeResult<()> {
    let pos = self
      .position(inode)
      .ok_or_else(|| MmpdeError::config(format!("node {inode} is not on the boundary loop")))?;
    self.nodes.rotate_left(pos);
    Ok(())
  }

  /// Shoelace area enclosed by the loop, positive for counter-clockwise order.
  pub fn signed_area(&self, mesh: &SimplicialMesh) -> f64 {
    let coords = mesh.coords();
    0.5
      * self
        .nodes
        .iter()
        .circular_tuple_windows()
        .map(|(&a, &b)| {
          let (pa, pb) = (coords.coord(a), coords.coord(b));
          pa[0] * pb[1] - pb[0] * pa[1]
        })
        .sum::<f64>()
  }
}

#[cfg(test)]
mod test {
  use super::BoundaryLoop;
  use crate::{
    mesh::{hyperbox::HyperBoxMeshInfo, NodeCoords, SimplicialMesh},
    MmpdeError,
  };

  use approx::assert_relative_eq;

  #[test]
  fn square_loop_is_counter_clockwise() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    let mut bloop = BoundaryLoop::trace(&mesh).unwrap();
    assert_eq!(bloop.nodes(), &[0, 1, 2, 5, 8, 7, 6, 3]);
    assert_relative_eq!(bloop.signed_area(&mesh), 1.0);

    bloop.rotate_to(8).unwrap();
    assert_eq!(bloop.nodes(), &[8, 7, 6, 3, 0, 1, 2, 5]);
    assert!(bloop.rotate_to(4).is_err());
  }

  #[test]
  fn interior_and_boundary_nodes() {
    let mesh = HyperBoxMeshInfo::new_unit(2, 2).to_mesh();
    assert_eq!(mesh.topology().interior_nodes(), vec![4]);
    assert_eq!(mesh.topology().node_boundary_faces(4).count(), 0);
    assert_eq!(mesh.topology().node_boundary_faces(0).count(), 2);
  }

  #[test]
  fn annulus_has_two_loops() {
    // square with a square hole: outer nodes 0..4, inner nodes 4..8
    let coords = NodeCoords::from_points(&[
      [0.0, 0.0],
      [3.0, 0.0],
      [3.0, 3.0],
      [0.0, 3.0],
      [1.0, 1.0],
      [2.0, 1.0],
      [2.0, 2.0],
      [1.0, 2.0],
    ]);
    let cells = vec![
      vec![0, 1, 5],
      vec![0, 5, 4],
      vec![1, 2, 6],
      vec![1, 6, 5],
      vec![2, 3, 7],
      vec![2, 7, 6],
      vec![3, 0, 4],
      vec![3, 4, 7],
    ];
    let mesh = SimplicialMesh::new(coords, cells).unwrap();
    let err = BoundaryLoop::trace(&mesh).unwrap_err();
    assert!(matches!(err, MmpdeError::Configuration(_)));
  }
}
