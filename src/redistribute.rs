//! Monitor driven redistribution of the logical boundary nodes of a 2D mesh.
//!
//! Every boundary side between two consecutive corners is treated as an
//! interval mesh parametrized by chord length. A weighted 1D harmonic map on
//! it places the side nodes on the matching logical side, so that boundary
//! nodes cluster where the monitor is large instead of keeping their
//! initial spacing.

use crate::{
  assemble::{assemble_interval_galmat, fix_dofs_coeff},
  classify::BoundaryClassification,
  linalg::SparseSolver,
  mesh::{boundary::BoundaryLoop, NodeCoords, SimplicialMesh, VertexIdx},
  MmpdeError, MmpdeResult,
};

/// Number of smoothing passes of the monitor used on the boundary sides.
pub const SIDE_MOL_TIMES: usize = 4;

/// The node chains of the boundary sides, corner to corner, both inclusive.
pub fn boundary_sides(
  mesh: &SimplicialMesh,
  classification: &BoundaryClassification,
) -> MmpdeResult<Vec<Vec<VertexIdx>>> {
  let vertices = classification.vertices();
  let mut bloop = BoundaryLoop::trace(mesh)?;
  bloop.rotate_to(vertices[0])?;

  let is_vertex = classification.vertex_flags();
  let mut sides: Vec<Vec<VertexIdx>> = Vec::with_capacity(vertices.len());
  let mut current = vec![vertices[0]];
  for &inode in &bloop.nodes()[1..] {
    current.push(inode);
    if is_vertex[inode] {
      sides.push(std::mem::replace(&mut current, vec![inode]));
    }
  }
  current.push(vertices[0]);
  sides.push(current);
  if sides.len() != vertices.len() {
    return Err(MmpdeError::config(
      "corners are not in boundary loop order",
    ));
  }
  Ok(sides)
}

/// Logical node positions with the side nodes redistributed by the cell
/// control function `g` (one value per cell).
pub fn redistribute_boundary(
  physical: &SimplicialMesh,
  logic: &NodeCoords,
  classification: &BoundaryClassification,
  g: &na::DVector<f64>,
  solver: &impl SparseSolver,
) -> MmpdeResult<NodeCoords> {
  if physical.dim() != 2 {
    return Err(MmpdeError::config(
      "boundary redistribution is only available in 2D",
    ));
  }
  let topology = physical.topology();
  let mut logic = logic.clone();

  for side in boundary_sides(physical, classification)? {
    let nside = side.len();
    if nside <= 2 {
      continue;
    }

    let mut chord = Vec::with_capacity(nside);
    let mut weights = Vec::with_capacity(nside - 1);
    chord.push(0.0);
    for pair in side.windows(2) {
      let length = (physical.coords().coord(pair[1]) - physical.coords().coord(pair[0])).norm();
      chord.push(chord[chord.len() - 1] + length);
      let iface = topology
        .face_idx(pair)
        .ok_or_else(|| MmpdeError::config("boundary side is not made of mesh edges"))?;
      weights.push(g[topology.face_cells(iface)[0]]);
    }
    let length = chord[nside - 1];

    let mut galmat = assemble_interval_galmat(&chord, &weights);
    let mut galvec = na::DVector::zeros(nside);
    fix_dofs_coeff(&[(0, 0.0), (nside - 1, length)], &mut galmat, &mut galvec);
    let param = solver.solve_spd(&galmat, &galvec, "boundary side laplacian")?;

    let start = logic.coord(side[0]).into_owned();
    let direction = logic.coord(side[nside - 1]) - &start;
    for (j, &inode) in side.iter().enumerate().take(nside - 1).skip(1) {
      let pos = &start + (param[j] / length) * &direction;
      logic.matrix_mut().set_column(inode, &pos);
    }
  }
  Ok(logic)
}
