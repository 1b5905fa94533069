//! Physical node update with a step length that keeps every cell non-degenerate.

use crate::{
  classify::{BoundaryClassification, BoundaryNormals, NodeClass},
  mesh::{NodeCoords, SimplicialMesh},
  MmpdeError, MmpdeResult,
};

use itertools::Itertools as _;

const BISECTION_STEPS: usize = 100;

/// Transfers the logical move field to a physical displacement field.
///
/// On each cell the map from logical to physical coordinates is the affine
/// map $A B^(-1)$ of the physical edge matrix $A$ and the logical edge matrix
/// $B$. Its measure weighted average over the node stars, applied to the
/// logical move, gives the physical displacement.
pub fn physical_displacement(
  mesh: &SimplicialMesh,
  new_logic: &NodeCoords,
  logic_move: &na::DMatrix<f64>,
  cell_measures: &na::DVector<f64>,
  star_measure: &na::DVector<f64>,
) -> MmpdeResult<na::DMatrix<f64>> {
  let dim = mesh.dim();
  let mut jacobians = vec![na::DMatrix::<f64>::zeros(dim, dim); mesh.nnodes()];
  for (icell, cell) in mesh.cells().iter().enumerate() {
    let a = mesh.cell_simplex(icell).spanning_vectors();
    let b = new_logic.coord_simplex(cell).spanning_vectors();
    let b_inv = b
      .try_inverse()
      .ok_or_else(|| MmpdeError::singular("logical cell map"))?;
    let weighted = cell_measures[icell] * a * b_inv;
    for &inode in cell {
      jacobians[inode] += &weighted;
    }
  }

  let mut delta = na::DMatrix::zeros(dim, mesh.nnodes());
  for (inode, jacobian) in jacobians.into_iter().enumerate() {
    let d = jacobian / star_measure[inode] * logic_move.column(inode);
    delta.set_column(inode, &d);
  }
  Ok(delta)
}

/// Restricts boundary displacements to the boundary: tangential at face
/// interior nodes, along the edge at arris nodes, none at corners.
pub fn project_to_boundary(
  delta: &mut na::DMatrix<f64>,
  classification: &BoundaryClassification,
  normals: &BoundaryNormals,
) {
  for (inode, node_normals) in normals.iter() {
    let mut d = delta.column_mut(inode);
    match classification.class(inode) {
      NodeClass::BoundaryInner => {
        let n = &node_normals[0];
        let dn = n.dot(&d);
        d.axpy(-dn, n, 1.0);
      }
      NodeClass::ArrisNode => {
        let n1 = na::Vector3::from_iterator(node_normals[0].iter().copied());
        let n2 = na::Vector3::from_iterator(node_normals[1].iter().copied());
        let edge = n1.cross(&n2).normalize();
        let de = edge.dot(&na::Vector3::from_iterator(d.iter().copied()));
        d.copy_from(&(de * edge));
      }
      NodeClass::Vertex => d.fill(0.0),
      NodeClass::Interior => {}
    }
  }
}

/// Coefficients $p_0, ..., p_d$ of $det(A + t C) = sum_k p_k t^k$.
///
/// $p_k$ is the sum of the determinants of the matrices taking `k` columns
/// from `c` and the others from `a`.
pub fn det_polynomial(a: &na::DMatrix<f64>, c: &na::DMatrix<f64>) -> Vec<f64> {
  let dim = a.ncols();
  (0..=dim)
    .map(|k| {
      (0..dim)
        .combinations(k)
        .map(|from_c| {
          let mut mixed = a.clone();
          for &j in &from_c {
            mixed.set_column(j, &c.column(j));
          }
          mixed.determinant()
        })
        .sum()
    })
    .collect()
}

fn eval_polynomial(coeffs: &[f64], t: f64) -> f64 {
  coeffs.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

/// Real roots of $p_0 + p_1 t + p_2 t^2 = 0$ (or lower degree).
fn quadratic_roots(p0: f64, p1: f64, p2: f64) -> Vec<f64> {
  if p2 == 0.0 {
    if p1 == 0.0 {
      return Vec::new();
    }
    return vec![-p0 / p1];
  }
  let discriminant = p1 * p1 - 4.0 * p2 * p0;
  if discriminant < 0.0 {
    return Vec::new();
  }
  let sqrt = discriminant.sqrt();
  // numerically stable pair
  let q = -0.5 * (p1 + p1.signum() * sqrt);
  if q == 0.0 {
    return vec![0.0];
  }
  vec![q / p2, p0 / q]
}

/// Largest `t` in `(0, 1]` up to which `det(A + s C)` keeps the sign of
/// `det(A)` for all `s <= t`, or `None` if it keeps it on all of `[0, 1]`.
pub fn first_sign_change(coeffs: &[f64]) -> Option<f64> {
  let p0 = coeffs[0];
  let same_sign = |v: f64| v * p0 > 0.0;

  // split [0, 1] at the critical points into monotone pieces
  let derivative: Vec<f64> = coeffs
    .iter()
    .enumerate()
    .skip(1)
    .map(|(k, &c)| k as f64 * c)
    .collect();
  let mut breaks = match derivative.len() {
    0 | 1 => Vec::new(),
    2 => quadratic_roots(derivative[0], derivative[1], 0.0),
    3 => quadratic_roots(derivative[0], derivative[1], derivative[2]),
    _ => unreachable!("mesh dimension is validated on construction"),
  };
  breaks.retain(|&t| t > 0.0 && t < 1.0);
  breaks.sort_by(f64::total_cmp);
  breaks.push(1.0);

  let mut lo = 0.0;
  for hi in breaks {
    if !same_sign(eval_polynomial(coeffs, hi)) {
      // bisect, keeping lo on the sign preserving side
      let mut hi = hi;
      for _ in 0..BISECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if mid <= lo || mid >= hi {
          break;
        }
        if same_sign(eval_polynomial(coeffs, mid)) {
          lo = mid;
        } else {
          hi = mid;
        }
      }
      return Some(lo);
    }
    lo = hi;
  }
  None
}

/// The step length $eta in [0, 1]$ such that moving every node by
/// `t * delta` for `t <= eta` inverts no cell.
pub fn step_length(mesh: &SimplicialMesh, delta: &na::DMatrix<f64>) -> f64 {
  let displacement = NodeCoords::new(delta.clone());
  (0..mesh.ncells())
    .filter_map(|icell| {
      let cell = mesh.topology().cell(icell);
      let a = mesh.cell_simplex(icell).spanning_vectors();
      let c = displacement.coord_simplex(cell).spanning_vectors();
      first_sign_change(&det_polynomial(&a, &c))
    })
    .fold(1.0, f64::min)
}

/// New physical node positions `x + alpha * eta * delta`.
pub fn advance_nodes(
  mesh: &SimplicialMesh,
  delta: &na::DMatrix<f64>,
  alpha: f64,
) -> (NodeCoords, f64) {
  let eta = step_length(mesh, delta);
  tracing::debug!("step length eta = {eta:.4e}");
  let coords = mesh.coords().matrix() + alpha * eta * delta;
  (NodeCoords::new(coords), eta)
}
