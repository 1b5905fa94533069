//! Construction parameters of the moving-mesh iteration.

use crate::{MmpdeError, MmpdeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct MmpdeParams {
  /// Gradient sensitivity of the monitor function. Must be `>= 0`.
  pub beta: f64,
  /// Damping of the physical node update. Must lie in `(0, 1]`.
  pub alpha: f64,
  /// Number of diffusive smoothing passes applied to the monitor.
  pub mol_times: usize,
  /// Redistribute the boundary nodes along each polygon side before the
  /// logical solve. 2D only.
  pub redistribute: bool,
  /// Convergence tolerance on the logical node displacement.
  /// `None` selects `0.1 * min logical edge length`.
  pub tol: Option<f64>,
  /// Iteration budget of [`crate::harmap::MeshAdaptationEngine::mesh_redistribution`].
  pub maxit: usize,
}

impl Default for MmpdeParams {
  fn default() -> Self {
    Self {
      beta: 1.0,
      alpha: 0.5,
      mol_times: 1,
      redistribute: true,
      tol: None,
      maxit: 1000,
    }
  }
}

impl MmpdeParams {
  pub fn with_beta(mut self, beta: f64) -> Self {
    self.beta = beta;
    self
  }
  pub fn with_alpha(mut self, alpha: f64) -> Self {
    self.alpha = alpha;
    self
  }
  pub fn with_mol_times(mut self, mol_times: usize) -> Self {
    self.mol_times = mol_times;
    self
  }
  pub fn with_redistribute(mut self, redistribute: bool) -> Self {
    self.redistribute = redistribute;
    self
  }
  pub fn with_tol(mut self, tol: f64) -> Self {
    self.tol = Some(tol);
    self
  }
  pub fn with_maxit(mut self, maxit: usize) -> Self {
    self.maxit = maxit;
    self
  }

  pub fn validate(&self) -> MmpdeResult<()> {
    if !(self.beta >= 0.0 && self.beta.is_finite()) {
      return Err(MmpdeError::config(format!(
        "beta must be a finite non-negative number, got {}",
        self.beta
      )));
    }
    if !(self.alpha > 0.0 && self.alpha <= 1.0) {
      return Err(MmpdeError::config(format!(
        "alpha must lie in (0, 1], got {}",
        self.alpha
      )));
    }
    if let Some(tol) = self.tol {
      if !(tol > 0.0 && tol.is_finite()) {
        return Err(MmpdeError::config(format!(
          "tol must be positive, got {tol}"
        )));
      }
    }
    if self.maxit == 0 {
      return Err(MmpdeError::config("maxit must be at least 1"));
    }
    Ok(())
  }
}
