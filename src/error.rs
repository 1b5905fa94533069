use thiserror::Error;

pub type MmpdeResult<T> = Result<T, MmpdeError>;

#[derive(Debug, Error)]
pub enum MmpdeError {
  /// Missing or inconsistent input for the given geometry.
  #[error("configuration error: {0}")]
  Configuration(String),

  #[error("unsupported geometry: {0}")]
  Geometry(String),

  /// A direct solve failed or produced non-finite values.
  /// Indicates a malformed mesh or constraint set.
  #[error("singular system while solving {context}")]
  SingularSystem { context: &'static str },

  #[error(
    "no convergence after {niterations} iterations \
     (displacement {displacement:e} >= tolerance {tolerance:e})"
  )]
  ConvergenceExhausted {
    niterations: usize,
    displacement: f64,
    tolerance: f64,
  },

  #[error("ode integration failed: {0}")]
  Integration(String),
}

impl MmpdeError {
  pub(crate) fn config(msg: impl Into<String>) -> Self {
    Self::Configuration(msg.into())
  }
  pub(crate) fn geometry(msg: impl Into<String>) -> Self {
    Self::Geometry(msg.into())
  }
  pub(crate) fn singular(context: &'static str) -> Self {
    Self::SingularSystem { context }
  }
}
