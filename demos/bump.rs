extern crate nalgebra as na;

use mmpde::{
  classify::BoundaryClassification, harmap::MeshAdaptationEngine,
  mesh::hyperbox::HyperBoxMeshInfo, monitor::star_measure, MmpdeParams,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt::init();

  let nboxes_per_dim = 24;
  let mesh = HyperBoxMeshInfo::new_unit(2, nboxes_per_dim).to_mesh();
  let classification = BoundaryClassification::detect(&mesh);

  // Steep gaussian bump in the middle of the unit square.
  let bump = |x: na::DVectorView<f64>| {
    let r2 = (x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2);
    (-80.0 * r2).exp()
  };
  let uh = mesh.coords().eval_coord_fn(bump);

  let params = MmpdeParams::default().with_beta(1.0).with_maxit(20);
  let mut engine = MeshAdaptationEngine::new(mesh.clone(), uh.clone(), classification, params)?;
  let outcome = engine.mesh_redistribution(uh)?;

  println!(
    "{:?} after {} iterations (displacement {:.3e}, tolerance {:.3e})",
    outcome.termination, outcome.niterations, outcome.displacement, outcome.tolerance
  );

  let center = na::DVector::from_element(2, 0.5);
  for (label, mesh) in [("initial", &mesh), ("adapted", &outcome.mesh)] {
    let star = star_measure(mesh, &mesh.cell_measures());
    let (mut near, mut nnear) = (0.0, 0);
    for inode in 0..mesh.nnodes() {
      if (mesh.coords().coord(inode) - &center).norm() < 0.15 {
        near += star[inode];
        nnear += 1;
      }
    }
    println!(
      "{label}: {nnear} nodes within 0.15 of the bump, mean star measure {:.3e}, min edge {:.3e}",
      near / nnear.max(1) as f64,
      mesh.min_edge_length()
    );
  }

  let error = outcome
    .mesh
    .coords()
    .eval_coord_fn(bump)
    .iter()
    .zip(outcome.uh.iter())
    .map(|(exact, transported)| (exact - transported).abs())
    .fold(0.0, f64::max);
  println!("max deviation of the transported field from the bump: {error:.3e}");

  Ok(())
}
