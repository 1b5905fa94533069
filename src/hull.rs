//! Convex position test of point sets.
//!
//! A point set is in convex position if every point is a vertex of its convex
//! hull. Points in the relative interior of a hull edge or facet are not
//! vertices. The hull is built by Andrew's monotone chain in 2D and by
//! quickhull in 3D.

use std::collections::HashMap;

const REL_TOL: f64 = 1e-10;

/// Whether all points (columns of `points`) are vertices of their convex hull.
pub fn is_convex(points: &na::DMatrix<f64>) -> bool {
  let dim = points.nrows();
  if points.ncols() < dim + 1 {
    return false;
  }
  let extent = bounding_box_diagonal(points);
  if extent == 0.0 {
    return false;
  }
  let tol = REL_TOL * extent;
  match dim {
    2 => is_convex_2d(points, tol),
    3 => is_convex_3d(points, tol),
    _ => unreachable!("mesh dimension is validated on construction"),
  }
}

fn bounding_box_diagonal(points: &na::DMatrix<f64>) -> f64 {
  points
    .row_iter()
    .map(|row| (row.max() - row.min()).powi(2))
    .sum::<f64>()
    .sqrt()
}

/// Andrew's monotone chain. Collinear points are dropped from the chain, so
/// the set is convex iff the chain keeps every point.
fn is_convex_2d(points: &na::DMatrix<f64>, tol: f64) -> bool {
  let npoints = points.ncols();
  let point = |i: usize| na::Vector2::new(points[(0, i)], points[(1, i)]);
  let turns_left = |o: usize, a: usize, b: usize| {
    let (o, a, b) = (point(o), point(a), point(b));
    (a - o).perp(&(b - o)) > tol * (b - o).norm()
  };

  let mut order: Vec<usize> = (0..npoints).collect();
  order.sort_by(|&a, &b| {
    points[(0, a)]
      .total_cmp(&points[(0, b)])
      .then(points[(1, a)].total_cmp(&points[(1, b)]))
  });

  let half_chain = |order: &mut dyn Iterator<Item = usize>| {
    let mut chain: Vec<usize> = Vec::new();
    for i in order {
      while chain.len() >= 2 && !turns_left(chain[chain.len() - 2], chain[chain.len() - 1], i) {
        chain.pop();
      }
      chain.push(i);
    }
    chain.pop();
    chain
  };
  let lower = half_chain(&mut order.iter().copied());
  let upper = half_chain(&mut order.iter().rev().copied());
  lower.len() + upper.len() == npoints
}

/// Outward oriented hull facet with the points above it.
struct Facet {
  vertices: [usize; 3],
  normal: na::Vector3<f64>,
  offset: f64,
  outside: Vec<usize>,
  alive: bool,
}
impl Facet {
  fn new(points: &[na::Vector3<f64>], vertices: [usize; 3]) -> Option<Self> {
    let [a, b, c] = vertices.map(|v| points[v]);
    let normal = (b - a).cross(&(c - a)).try_normalize(0.0)?;
    Some(Self {
      vertices,
      normal,
      offset: normal.dot(&a),
      outside: Vec::new(),
      alive: true,
    })
  }

  fn distance(&self, p: &na::Vector3<f64>) -> f64 {
    self.normal.dot(p) - self.offset
  }

  fn edges(&self) -> [(usize, usize); 3] {
    let [a, b, c] = self.vertices;
    [(a, b), (b, c), (c, a)]
  }
}

fn argmax(n: usize, f: impl Fn(usize) -> f64) -> (usize, f64) {
  (0..n).map(|i| (i, f(i))).fold((0, f64::NEG_INFINITY), |best, cur| {
    if cur.1 > best.1 {
      cur
    } else {
      best
    }
  })
}

/// Quickhull. Returns early as soon as a point turns out to lie inside the
/// hull of the others.
fn is_convex_3d(points: &na::DMatrix<f64>, tol: f64) -> bool {
  let npoints = points.ncols();
  let pts: Vec<na::Vector3<f64>> = points
    .column_iter()
    .map(|c| na::Vector3::new(c[0], c[1], c[2]))
    .collect();

  // initial tetrahedron
  let (i0, _) = argmax(npoints, |i| -pts[i].x);
  let (i1, d1) = argmax(npoints, |i| (pts[i] - pts[i0]).norm());
  if d1 <= tol {
    return false;
  }
  let axis = (pts[i1] - pts[i0]) / d1;
  let (i2, d2) = argmax(npoints, |i| (pts[i] - pts[i0]).cross(&axis).norm());
  if d2 <= tol {
    return false;
  }
  let plane = (pts[i1] - pts[i0]).cross(&(pts[i2] - pts[i0])).normalize();
  let (i3, d3) = argmax(npoints, |i| plane.dot(&(pts[i] - pts[i0])).abs());
  if d3 <= tol {
    return false;
  }

  let mut facets: Vec<Facet> = Vec::new();
  for ([a, b, c], opposite) in [
    ([i0, i1, i2], i3),
    ([i0, i1, i3], i2),
    ([i0, i2, i3], i1),
    ([i1, i2, i3], i0),
  ] {
    let Some(facet) = Facet::new(&pts, [a, b, c]) else {
      return false;
    };
    let facet = if facet.distance(&pts[opposite]) > 0.0 {
      match Facet::new(&pts, [a, c, b]) {
        Some(facet) => facet,
        None => return false,
      }
    } else {
      facet
    };
    facets.push(facet);
  }
  let mut edges: HashMap<(usize, usize), usize> = HashMap::new();
  for (ifacet, facet) in facets.iter().enumerate() {
    for edge in facet.edges() {
      edges.insert(edge, ifacet);
    }
  }

  let initial = [i0, i1, i2, i3];
  for q in (0..npoints).filter(|q| !initial.contains(q)) {
    match facets.iter().position(|f| f.distance(&pts[q]) > tol) {
      Some(ifacet) => facets[ifacet].outside.push(q),
      None => return false,
    }
  }

  let mut pending: Vec<usize> = (0..facets.len()).collect();
  while let Some(ifacet) = pending.pop() {
    if !facets[ifacet].alive || facets[ifacet].outside.is_empty() {
      continue;
    }
    let facet = &facets[ifacet];
    let apex = facet
      .outside
      .iter()
      .copied()
      .max_by(|&a, &b| facet.distance(&pts[a]).total_cmp(&facet.distance(&pts[b])))
      .unwrap_or(facet.outside[0]);
    let apex_pt = pts[apex];

    // visible region, flagged dead while it is explored
    facets[ifacet].alive = false;
    let mut visible = vec![ifacet];
    let mut stack = vec![ifacet];
    let mut horizon = Vec::new();
    while let Some(f) = stack.pop() {
      for (u, v) in facets[f].edges() {
        let Some(&g) = edges.get(&(v, u)) else {
          return false;
        };
        if !facets[g].alive {
          continue;
        }
        if facets[g].distance(&apex_pt) > tol {
          facets[g].alive = false;
          visible.push(g);
          stack.push(g);
        } else {
          horizon.push((u, v));
        }
      }
    }

    let mut orphans = Vec::new();
    for &f in &visible {
      for edge in facets[f].edges() {
        edges.remove(&edge);
      }
      orphans.extend(std::mem::take(&mut facets[f].outside));
    }

    let mut new_facets = Vec::with_capacity(horizon.len());
    for (u, v) in horizon {
      let Some(facet) = Facet::new(&pts, [u, v, apex]) else {
        return false;
      };
      let inew = facets.len();
      for edge in facet.edges() {
        edges.insert(edge, inew);
      }
      facets.push(facet);
      new_facets.push(inew);
      pending.push(inew);
    }

    for q in orphans.into_iter().filter(|&q| q != apex) {
      let above = new_facets
        .iter()
        .copied()
        .find(|&f| facets[f].distance(&pts[q]) > tol)
        .or_else(|| {
          facets
            .iter()
            .position(|f| f.alive && f.distance(&pts[q]) > tol)
        });
      match above {
        Some(f) => facets[f].outside.push(q),
        None => return false,
      }
    }
  }

  // a vertex is a corner iff its facet normals span the space
  let mut incident: Vec<Vec<na::Vector3<f64>>> = vec![Vec::new(); npoints];
  for facet in facets.iter().filter(|f| f.alive) {
    for v in facet.vertices {
      incident[v].push(facet.normal);
    }
  }
  incident.iter().all(|normals| {
    normals.len() >= 3
      && na::DMatrix::from_fn(3, normals.len(), |r, c| normals[c][r]).rank(REL_TOL) == 3
  })
}

#[cfg(test)]
mod test {
  use super::is_convex;

  fn circle(n: usize) -> na::DMatrix<f64> {
    na::DMatrix::from_fn(2, n, |r, k| {
      let theta = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
      if r == 0 {
        theta.cos()
      } else {
        theta.sin()
      }
    })
  }

  fn fibonacci_sphere(n: usize) -> na::DMatrix<f64> {
    let golden_angle = std::f64::consts::PI * (3.0 - 5f64.sqrt());
    let mut points = na::DMatrix::zeros(3, n);
    for (k, mut p) in points.column_iter_mut().enumerate() {
      let y = 1.0 - 2.0 * (k as f64 + 0.5) / n as f64;
      let r = (1.0 - y * y).sqrt();
      let theta = golden_angle * k as f64;
      p[0] = r * theta.cos();
      p[1] = y;
      p[2] = r * theta.sin();
    }
    points
  }

  #[test]
  fn many_points_on_a_circle() {
    let points = circle(400);
    assert!(is_convex(&points));

    let with_center = points.clone().insert_column(400, 0.0);
    assert!(!is_convex(&with_center));

    let mut pulled_in = points;
    pulled_in.column_mut(17).scale_mut(0.999);
    assert!(!is_convex(&pulled_in));
  }

  #[test]
  fn many_points_on_a_sphere() {
    let points = fibonacci_sphere(500);
    assert!(is_convex(&points));

    let with_center = points.clone().insert_column(500, 0.0);
    assert!(!is_convex(&with_center));

    let mut pulled_in = points;
    pulled_in.column_mut(250).scale_mut(0.9);
    assert!(!is_convex(&pulled_in));
  }

  #[test]
  fn coplanar_points_are_not_convex_in_3d() {
    let square = na::DMatrix::from_column_slice(
      3,
      4,
      &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
    );
    assert!(!is_convex(&square));
  }

  fn points2(coords: &[[f64; 2]]) -> na::DMatrix<f64> {
    na::DMatrix::from_iterator(2, coords.len(), coords.iter().flatten().copied())
  }

  #[test]
  fn regular_polygon_is_convex() {
    for n in 3..9 {
      let coords: Vec<[f64; 2]> = (0..n)
        .map(|k| {
          let theta = 2.0 * std::f64::consts::PI * k as f64 / n as f64;
          [theta.cos(), theta.sin()]
        })
        .collect();
      assert!(is_convex(&points2(&coords)), "{n}-gon");
    }
  }

  #[test]
  fn reflex_vertex_is_not_convex() {
    // L-shape
    let coords = [
      [0.0, 0.0],
      [2.0, 0.0],
      [2.0, 1.0],
      [1.0, 1.0],
      [1.0, 2.0],
      [0.0, 2.0],
    ];
    assert!(!is_convex(&points2(&coords)));
  }

  #[test]
  fn point_on_hull_edge_is_not_a_vertex() {
    let coords = [[0.0, 0.0], [0.5, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
    assert!(!is_convex(&points2(&coords)));
  }

  #[test]
  fn cube_corners_are_convex() {
    let mut cube = na::DMatrix::zeros(3, 8);
    for (i, mut c) in cube.column_iter_mut().enumerate() {
      c[0] = (i & 1) as f64;
      c[1] = ((i >> 1) & 1) as f64;
      c[2] = ((i >> 2) & 1) as f64;
    }
    assert!(is_convex(&cube));

    // push the top face center down into the cube
    let mut dented = cube.clone().insert_column(8, 0.0);
    dented.set_column(8, &na::Vector3::new(0.5, 0.5, 0.5));
    assert!(!is_convex(&dented));
  }
}
