//! The harmonic-map moving mesh driver.
//!
//! Each iteration solves for new logical node positions under the current
//! monitor, transfers the logical move to a step limited physical node update,
//! transports the field to the moved nodes and rebuilds the derived state.
//! The logical mesh, the boundary classification and the constraint system
//! are built once.

use crate::{
  assemble::assemble_galmat,
  classify::{BoundaryClassification, BoundaryNormals},
  constraint::{unstack_components, ConstraintSystem},
  fe::WeightedLaplaceElmat,
  linalg::{FaerSolver, Factorization as _, SparseSolver},
  logic::LogicMesh,
  mesh::{NodeCoords, SimplicialMesh, VertexIdx},
  monitor::{control_function, star_measure},
  ode::{OdeIntegrator, Rk23},
  redistribute::{self, boundary_sides, SIDE_MOL_TIMES},
  sparse::SparseMatrix,
  step::{advance_nodes, physical_displacement, project_to_boundary},
  transport::transport,
  util, MmpdeError, MmpdeParams, MmpdeResult,
};

use std::rc::Rc;

/// Result of one logical solve.
#[derive(Debug, Clone)]
pub struct LogicNodeMove {
  /// Logical node positions harmonic w.r.t. the current physical mesh.
  pub logic: NodeCoords,
  /// `initial logical - new logical`, one column per node.
  pub move_field: na::DMatrix<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
  Converged,
  /// The iteration budget ran out; the last iterate is returned.
  Exhausted,
}

#[derive(Debug, Clone)]
pub struct Redistribution {
  pub mesh: SimplicialMesh,
  pub uh: na::DVector<f64>,
  pub niterations: usize,
  /// Logical displacement of the last iteration.
  pub displacement: f64,
  pub tolerance: f64,
  pub termination: Termination,
}
impl Redistribution {
  pub fn converged(&self) -> bool {
    self.termination == Termination::Converged
  }

  /// Treats an exhausted iteration budget as an error.
  pub fn into_result(self) -> MmpdeResult<Self> {
    match self.termination {
      Termination::Converged => Ok(self),
      Termination::Exhausted => Err(MmpdeError::ConvergenceExhausted {
        niterations: self.niterations,
        displacement: self.displacement,
        tolerance: self.tolerance,
      }),
    }
  }
}

pub struct MeshAdaptationEngine<S = FaerSolver, I = Rk23> {
  params: MmpdeParams,
  classification: BoundaryClassification,
  logic: LogicMesh,
  constraints: ConstraintSystem,
  physical_normals: BoundaryNormals,
  boundary_nodes: Vec<VertexIdx>,
  interior_nodes: Vec<VertexIdx>,

  mesh: SimplicialMesh,
  uh: na::DVector<f64>,
  cell_measures: na::DVector<f64>,
  star_measure: na::DVector<f64>,
  g: na::DVector<f64>,

  solver: S,
  integrator: I,
}

impl MeshAdaptationEngine {
  pub fn new(
    mesh: SimplicialMesh,
    uh: na::DVector<f64>,
    classification: BoundaryClassification,
    params: MmpdeParams,
  ) -> MmpdeResult<Self> {
    Self::with_solver(mesh, uh, classification, params, FaerSolver)
  }
}

impl<S: SparseSolver> MeshAdaptationEngine<S, Rk23> {
  pub fn with_solver(
    mesh: SimplicialMesh,
    uh: na::DVector<f64>,
    classification: BoundaryClassification,
    params: MmpdeParams,
    solver: S,
  ) -> MmpdeResult<Self> {
    params.validate()?;
    check_field(&mesh, &uh)?;
    if !mesh.topology().has_boundary() {
      return Err(MmpdeError::config("mesh has no boundary"));
    }
    if classification.boundary_nodes() != mesh.topology().boundary_nodes() {
      return Err(MmpdeError::config(
        "boundary classification does not match the mesh boundary",
      ));
    }
    if params.redistribute {
      if mesh.dim() != 2 {
        return Err(MmpdeError::config(
          "boundary redistribution is only available in 2D",
        ));
      }
      boundary_sides(&mesh, &classification)?;
    }

    let logic = LogicMesh::build(&mesh, &classification, &solver)?;
    let constraints = ConstraintSystem::assemble(&logic, &classification)?;
    let physical_normals = BoundaryNormals::compute(&mesh);
    let boundary_nodes = mesh.topology().boundary_nodes().to_vec();
    let interior_nodes = mesh.topology().interior_nodes();

    let cell_measures = mesh.cell_measures();
    let star_measure = star_measure(&mesh, &cell_measures);
    let g = control_function(
      &mesh,
      &uh,
      &cell_measures,
      &star_measure,
      params.beta,
      params.mol_times,
    )?;

    tracing::debug!(
      "moving mesh engine: {}D, {} nodes ({} on the boundary), {} cells",
      mesh.dim(),
      mesh.nnodes(),
      boundary_nodes.len(),
      mesh.ncells()
    );

    Ok(Self {
      params,
      classification,
      logic,
      constraints,
      physical_normals,
      boundary_nodes,
      interior_nodes,
      mesh,
      uh,
      cell_measures,
      star_measure,
      g,
      solver,
      integrator: Rk23::default(),
    })
  }
}

impl<S, I> MeshAdaptationEngine<S, I> {
  /// Replaces the ODE integrator used for the field transport.
  pub fn with_integrator<I2: OdeIntegrator>(self, integrator: I2) -> MeshAdaptationEngine<S, I2> {
    MeshAdaptationEngine {
      params: self.params,
      classification: self.classification,
      logic: self.logic,
      constraints: self.constraints,
      physical_normals: self.physical_normals,
      boundary_nodes: self.boundary_nodes,
      interior_nodes: self.interior_nodes,
      mesh: self.mesh,
      uh: self.uh,
      cell_measures: self.cell_measures,
      star_measure: self.star_measure,
      g: self.g,
      solver: self.solver,
      integrator,
    }
  }

  pub fn params(&self) -> &MmpdeParams {
    &self.params
  }
  pub fn classification(&self) -> &BoundaryClassification {
    &self.classification
  }
  pub fn logic_mesh(&self) -> &LogicMesh {
    &self.logic
  }
  pub fn constraints(&self) -> &ConstraintSystem {
    &self.constraints
  }
  pub fn mesh(&self) -> &SimplicialMesh {
    &self.mesh
  }
  pub fn uh(&self) -> &na::DVector<f64> {
    &self.uh
  }
  pub fn cell_measures(&self) -> &na::DVector<f64> {
    &self.cell_measures
  }
  pub fn star_measure(&self) -> &na::DVector<f64> {
    &self.star_measure
  }
  /// The control function `G = 1/M`, one value per cell.
  pub fn monitor(&self) -> &na::DVector<f64> {
    &self.g
  }

  /// Convergence tolerance on the logical displacement.
  pub fn tolerance(&self) -> f64 {
    self
      .params
      .tol
      .unwrap_or_else(|| 0.1 * self.logic.mesh().min_edge_length())
  }
}

impl<S: SparseSolver, I: OdeIntegrator> MeshAdaptationEngine<S, I> {
  /// Logical positions with the boundary side nodes redistributed by the
  /// (more strongly smoothed) monitor. 2D only.
  pub fn redistribute_boundary(&self) -> MmpdeResult<NodeCoords> {
    let side_g = control_function(
      &self.mesh,
      &self.uh,
      &self.cell_measures,
      &self.star_measure,
      self.params.beta,
      SIDE_MOL_TIMES,
    )?;
    redistribute::redistribute_boundary(
      &self.mesh,
      self.logic.coords(),
      &self.classification,
      &side_g,
      &self.solver,
    )
  }

  /// Solves the weighted harmonic map for the logical node positions:
  /// first the interior nodes with the boundary held, then the boundary
  /// nodes subject to the boundary constraints.
  pub fn solve_move_logic_nodes(&self) -> MmpdeResult<LogicNodeMove> {
    let dim = self.mesh.dim();
    let nnodes = self.mesh.nnodes();
    let ninterior = self.interior_nodes.len();
    let nboundary = self.boundary_nodes.len();

    let h = assemble_galmat(&self.mesh, WeightedLaplaceElmat::new(&self.g))?;
    let interior_pos = util::indicies_to_positions(&self.interior_nodes, nnodes);
    let boundary_pos = util::indicies_to_positions(&self.boundary_nodes, nnodes);
    let h11 = h.select(&interior_pos, &interior_pos, ninterior, ninterior);
    let h12 = h.select(&interior_pos, &boundary_pos, ninterior, nboundary);
    let h21 = h.select(&boundary_pos, &interior_pos, nboundary, ninterior);
    let h22 = h.select(&boundary_pos, &boundary_pos, nboundary, nboundary);

    let process = if self.params.redistribute {
      self.redistribute_boundary()?
    } else {
      self.logic.coords().clone()
    };
    let mut new_logic = process.into_matrix();

    // interior: pure dirichlet problem per coordinate
    let mut interior_rhs = na::DVector::zeros(dim * nboundary);
    if ninterior > 0 {
      let h11 = self.solver.factorize_spd(&h11, "interior logical laplacian")?;
      for k in 0..dim {
        let boundary_k = na::DVector::from_iterator(
          nboundary,
          self.boundary_nodes.iter().map(|&v| new_logic[(k, v)]),
        );
        let x_k = h11.solve(&-h12.mul_vec(&boundary_k))?;
        for (p, &inode) in self.interior_nodes.iter().enumerate() {
          new_logic[(k, inode)] = x_k[p];
        }
        interior_rhs
          .rows_mut(k * nboundary, nboundary)
          .copy_from(&-h21.mul_vec(&x_k));
      }
    }

    // boundary: saddle point system with the constraints
    let h22 = h22.repeat_diagonal(dim);
    let a = self.constraints.matrix();
    let at = a.transpose();
    let saddle = SparseMatrix::block(&[&[Some(&h22), Some(&at)], &[Some(a), None]]);
    let mut rhs = na::DVector::zeros(saddle.nrows());
    rhs.rows_mut(0, dim * nboundary).copy_from(&interior_rhs);
    rhs
      .rows_mut(dim * nboundary, self.constraints.nconstraints())
      .copy_from(self.constraints.rhs());
    tracing::debug!("solving boundary saddle point system of size {}", saddle.nrows());
    let solution = self.solver.solve(&saddle, &rhs, "boundary saddle point system")?;
    let boundary = solution.rows(0, dim * nboundary).into_owned();
    unstack_components(&boundary, &self.boundary_nodes, &mut new_logic);

    let move_field = self.logic.coords().matrix() - &new_logic;
    Ok(LogicNodeMove {
      logic: NodeCoords::new(new_logic),
      move_field,
    })
  }

  /// New physical node positions for a logical move, step limited so that
  /// no cell inverts and damped by `alpha`.
  pub fn physical_update(&self, logic_move: &LogicNodeMove) -> MmpdeResult<NodeCoords> {
    let mut delta = physical_displacement(
      &self.mesh,
      &logic_move.logic,
      &logic_move.move_field,
      &self.cell_measures,
      &self.star_measure,
    )?;
    project_to_boundary(&mut delta, &self.classification, &self.physical_normals);
    let (coords, _eta) = advance_nodes(&self.mesh, &delta, self.params.alpha);
    Ok(coords)
  }

  /// The current field transported onto the nodes of `new_mesh`.
  pub fn transport(&self, new_mesh: &SimplicialMesh) -> MmpdeResult<na::DVector<f64>> {
    self.check_topology(new_mesh)?;
    transport(
      &self.mesh,
      new_mesh.coords(),
      &self.uh,
      &self.solver,
      &self.integrator,
    )
  }

  /// Moves to `new_mesh`: transports the field and rebuilds the measures
  /// and the monitor.
  pub fn construct(&mut self, new_mesh: SimplicialMesh) -> MmpdeResult<()> {
    self.uh = self.transport(&new_mesh)?;
    self.mesh = new_mesh;
    self.refresh()
  }

  fn refresh(&mut self) -> MmpdeResult<()> {
    self.cell_measures = self.mesh.cell_measures();
    self.star_measure = star_measure(&self.mesh, &self.cell_measures);
    self.g = control_function(
      &self.mesh,
      &self.uh,
      &self.cell_measures,
      &self.star_measure,
      self.params.beta,
      self.params.mol_times,
    )?;
    Ok(())
  }

  /// Iterates until the logical displacement drops below the tolerance or
  /// the iteration budget is exhausted.
  pub fn mesh_redistribution(&mut self, uh: na::DVector<f64>) -> MmpdeResult<Redistribution> {
    check_field(&self.mesh, &uh)?;
    self.uh = uh;
    self.refresh()?;

    let tolerance = self.tolerance();
    tracing::info!("moving mesh tolerance {tolerance:.4e}");

    let mut displacement = f64::INFINITY;
    for iteration in 1..=self.params.maxit {
      let logic_move = self.solve_move_logic_nodes()?;
      displacement = self.logic.coords().max_displacement(&logic_move.logic);
      let coords = self.physical_update(&logic_move)?;
      let new_mesh = self.mesh.with_coords(coords);
      tracing::info!("iteration {iteration}: logical displacement {displacement:.4e}");
      self.construct(new_mesh)?;

      if displacement < tolerance {
        tracing::info!("converged after {iteration} iterations");
        return Ok(self.outcome(iteration, displacement, tolerance, Termination::Converged));
      }
    }

    tracing::warn!(
      "no convergence within {} iterations (displacement {displacement:.4e})",
      self.params.maxit
    );
    Ok(self.outcome(
      self.params.maxit,
      displacement,
      tolerance,
      Termination::Exhausted,
    ))
  }

  fn outcome(
    &self,
    niterations: usize,
    displacement: f64,
    tolerance: f64,
    termination: Termination,
  ) -> Redistribution {
    Redistribution {
      mesh: self.mesh.clone(),
      uh: self.uh.clone(),
      niterations,
      displacement,
      tolerance,
      termination,
    }
  }

  fn check_topology(&self, new_mesh: &SimplicialMesh) -> MmpdeResult<()> {
    if Rc::ptr_eq(new_mesh.topology(), self.mesh.topology()) {
      Ok(())
    } else {
      Err(MmpdeError::config(
        "new mesh does not share the topology of the current mesh",
      ))
    }
  }
}

fn check_field(mesh: &SimplicialMesh, uh: &na::DVector<f64>) -> MmpdeResult<()> {
  if uh.len() != mesh.nnodes() {
    return Err(MmpdeError::config(format!(
      "field has {} values for {} nodes",
      uh.len(),
      mesh.nnodes()
    )));
  }
  Ok(())
}
