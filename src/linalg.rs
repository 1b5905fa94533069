//! Direct sparse solvers.
//!
//! The numerical core never talks to a solver library directly. It is handed a
//! [`SparseSolver`], which factorizes a matrix once so that several right hand
//! sides can be solved against it.

use crate::{sparse::SparseMatrix, MmpdeError, MmpdeResult};

use faer::solvers::SpSolver;

/// A factorized matrix.
pub trait Factorization {
  fn solve(&self, b: &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>>;
}

/// Direct solver backend.
///
/// Implementations must fail loudly on singular input instead of returning
/// garbage.
pub trait SparseSolver {
  type Factor: Factorization;

  /// Factorization of a symmetric positive definite matrix.
  fn factorize_spd(&self, a: &SparseMatrix, context: &'static str) -> MmpdeResult<Self::Factor>;

  /// Factorization of a general (possibly indefinite) square matrix.
  fn factorize(&self, a: &SparseMatrix, context: &'static str) -> MmpdeResult<Self::Factor>;

  fn solve_spd(
    &self,
    a: &SparseMatrix,
    b: &na::DVector<f64>,
    context: &'static str,
  ) -> MmpdeResult<na::DVector<f64>> {
    self.factorize_spd(a, context)?.solve(b)
  }

  fn solve(
    &self,
    a: &SparseMatrix,
    b: &na::DVector<f64>,
    context: &'static str,
  ) -> MmpdeResult<na::DVector<f64>> {
    self.factorize(a, context)?.solve(b)
  }
}

type SparseMatrixFaer = faer::sparse::SparseColMat<usize, f64>;

pub fn nalgebra2faer(m: nas::CscMatrix<f64>) -> SparseMatrixFaer {
  let nrows = m.nrows();
  let ncols = m.ncols();
  let (col_ptrs, row_indices, values) = m.disassemble();

  let symbolic =
    faer::sparse::SymbolicSparseColMat::new_checked(nrows, ncols, col_ptrs, None, row_indices);
  faer::sparse::SparseColMat::new(symbolic, values)
}

fn check_square(a: &SparseMatrix, context: &'static str) -> MmpdeResult<()> {
  if a.nrows() != a.ncols() {
    return Err(MmpdeError::singular(context));
  }
  Ok(())
}

fn finite_solution(
  x: na::DVector<f64>,
  context: &'static str,
) -> MmpdeResult<na::DVector<f64>> {
  if x.iter().all(|v| v.is_finite()) {
    Ok(x)
  } else {
    Err(MmpdeError::singular(context))
  }
}

pub struct FaerLu {
  raw: faer::sparse::linalg::solvers::Lu<usize, f64>,
  context: &'static str,
}
impl FaerLu {
  pub fn new(a: &SparseMatrix, context: &'static str) -> MmpdeResult<Self> {
    check_square(a, context)?;
    let raw = nalgebra2faer(a.to_nalgebra_csc())
      .sp_lu()
      .map_err(|_| MmpdeError::singular(context))?;
    Ok(Self { raw, context })
  }
}
impl Factorization for FaerLu {
  fn solve(&self, b: &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>> {
    let b = faer::col::from_slice(b.as_slice());
    let x = na::DVector::from_vec(self.raw.solve(b).as_slice().to_vec());
    finite_solution(x, self.context)
  }
}

pub struct FaerCholesky {
  raw: faer::sparse::linalg::solvers::Cholesky<usize, f64>,
  context: &'static str,
}
impl FaerCholesky {
  pub fn new(a: &SparseMatrix, context: &'static str) -> MmpdeResult<Self> {
    check_square(a, context)?;
    let raw = nalgebra2faer(a.to_nalgebra_csc())
      .sp_cholesky(faer::Side::Upper)
      .map_err(|_| MmpdeError::singular(context))?;
    Ok(Self { raw, context })
  }
}
impl Factorization for FaerCholesky {
  fn solve(&self, b: &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>> {
    let b = faer::col::from_slice(b.as_slice());
    let x = na::DVector::from_vec(self.raw.solve(b).as_slice().to_vec());
    finite_solution(x, self.context)
  }
}

pub enum FaerFactor {
  Cholesky(FaerCholesky),
  Lu(FaerLu),
}
impl Factorization for FaerFactor {
  fn solve(&self, b: &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>> {
    match self {
      Self::Cholesky(f) => f.solve(b),
      Self::Lu(f) => f.solve(b),
    }
  }
}

/// The default backend: faer's sparse Cholesky and LU.
#[derive(Debug, Default, Clone, Copy)]
pub struct FaerSolver;
impl SparseSolver for FaerSolver {
  type Factor = FaerFactor;

  fn factorize_spd(&self, a: &SparseMatrix, context: &'static str) -> MmpdeResult<FaerFactor> {
    FaerCholesky::new(a, context).map(FaerFactor::Cholesky)
  }

  fn factorize(&self, a: &SparseMatrix, context: &'static str) -> MmpdeResult<FaerFactor> {
    FaerLu::new(a, context).map(FaerFactor::Lu)
  }
}

pub fn assert_mat_eq(a: &na::DMatrix<f64>, b: &na::DMatrix<f64>) {
  const TOL: f64 = 10e-12;
  let diff = a - b;
  let error = diff.norm();
  let equal = error <= TOL;
  if !equal {
    println!("Matrix a={a:.3}");
    println!("Matrix b={b:.3}");
    println!("a-b={diff:.3}");
    panic!("Matrices not equal.");
  }
}
