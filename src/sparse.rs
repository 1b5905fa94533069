//! Triplet-based sparse matrix used for all assembly.
//!
//! Duplicate entries are allowed and summed on conversion.

#[derive(Default, Debug, Clone)]
pub struct SparseMatrix {
  nrows: usize,
  ncols: usize,
  triplets: Vec<(usize, usize, f64)>,
}

impl SparseMatrix {
  pub fn zeros(nrows: usize, ncols: usize) -> Self {
    Self::new(nrows, ncols, Vec::new())
  }
  pub fn new(nrows: usize, ncols: usize, triplets: Vec<(usize, usize, f64)>) -> Self {
    Self {
      nrows,
      ncols,
      triplets,
    }
  }

  pub fn nrows(&self) -> usize {
    self.nrows
  }
  pub fn ncols(&self) -> usize {
    self.ncols
  }
  pub fn triplets(&self) -> &[(usize, usize, f64)] {
    &self.triplets
  }

  pub fn push(&mut self, r: usize, c: usize, v: f64) {
    assert!(r < self.nrows() && c < self.ncols());
    if v != 0.0 {
      self.triplets.push((r, c, v));
    }
  }

  pub fn set_zero<F>(&mut self, predicate: F)
  where
    F: Fn(usize, usize) -> bool,
  {
    let mut i = 0;
    while i < self.triplets.len() {
      let triplet = self.triplets[i];
      let r = triplet.0;
      let c = triplet.1;
      if predicate(r, c) {
        self.triplets.swap_remove(i);
      } else {
        i += 1;
      }
    }
  }

  pub fn scale(&mut self, factor: f64) {
    self.triplets.iter_mut().for_each(|t| t.2 *= factor);
  }

  pub fn transpose(&self) -> SparseMatrix {
    let mut triplets = self.triplets.clone();
    for t in &mut triplets {
      std::mem::swap(&mut t.0, &mut t.1);
    }
    Self::new(self.ncols, self.nrows, triplets)
  }

  /// Extracts the sub-block with the given rows and columns.
  ///
  /// `row_pos` and `col_pos` map a global index to its position in the block,
  /// or `None` if it is not part of the block.
  pub fn select(
    &self,
    row_pos: &[Option<usize>],
    col_pos: &[Option<usize>],
    nrows: usize,
    ncols: usize,
  ) -> SparseMatrix {
    let triplets = self
      .triplets
      .iter()
      .filter_map(|&(r, c, v)| Some((row_pos[r]?, col_pos[c]?, v)))
      .collect();
    Self::new(nrows, ncols, triplets)
  }

  /// Concatenates a matrix block grid row-wise and column-wise.
  ///
  /// `None` stands for a zero block, whose size is taken from its neighbours.
  pub fn block(block_grid: &[&[Option<&SparseMatrix>]]) -> SparseMatrix {
    let nblock_rows = block_grid.len();
    let nblock_cols = block_grid.first().map_or(0, |row| row.len());
    assert!(
      block_grid.iter().all(|row| row.len() == nblock_cols),
      "Each block row must contain the same number of blocks."
    );

    let row_sizes: Vec<usize> = (0..nblock_rows)
      .map(|i| {
        block_grid[i]
          .iter()
          .flatten()
          .map(|m| m.nrows())
          .next()
          .expect("Each block row needs at least one non-zero block.")
      })
      .collect();
    let col_sizes: Vec<usize> = (0..nblock_cols)
      .map(|j| {
        block_grid
          .iter()
          .filter_map(|row| row[j])
          .map(|m| m.ncols())
          .next()
          .expect("Each block column needs at least one non-zero block.")
      })
      .collect();

    let offsets = |sizes: &[usize]| -> Vec<usize> {
      sizes
        .iter()
        .scan(0, |acc, &s| {
          let offset = *acc;
          *acc += s;
          Some(offset)
        })
        .collect()
    };
    let row_offsets = offsets(&row_sizes);
    let col_offsets = offsets(&col_sizes);

    let mut result = Self::zeros(row_sizes.iter().sum(), col_sizes.iter().sum());
    for (i, row) in block_grid.iter().enumerate() {
      for (j, block) in row.iter().enumerate() {
        let Some(block) = block else { continue };
        assert!(block.nrows() == row_sizes[i] && block.ncols() == col_sizes[j]);
        for &(r, c, v) in block.triplets() {
          result.push(row_offsets[i] + r, col_offsets[j] + c, v);
        }
      }
    }
    result
  }

  /// Block diagonal matrix with `n` copies of `self`.
  pub fn repeat_diagonal(&self, n: usize) -> SparseMatrix {
    let mut triplets = Vec::with_capacity(n * self.triplets.len());
    for k in 0..n {
      triplets.extend(
        self
          .triplets
          .iter()
          .map(|&(r, c, v)| (k * self.nrows + r, k * self.ncols + c, v)),
      );
    }
    Self::new(n * self.nrows, n * self.ncols, triplets)
  }

  pub fn mul_vec(&self, x: &na::DVector<f64>) -> na::DVector<f64> {
    assert_eq!(x.len(), self.ncols);
    let mut y = na::DVector::zeros(self.nrows);
    for &(r, c, v) in &self.triplets {
      y[r] += v * x[c];
    }
    y
  }

  pub fn to_nalgebra_coo(&self) -> nas::CooMatrix<f64> {
    let mut coo = nas::CooMatrix::new(self.nrows, self.ncols);
    for &(r, c, v) in &self.triplets {
      coo.push(r, c, v);
    }
    coo
  }

  pub fn to_nalgebra_csc(&self) -> nas::CscMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }

  pub fn to_nalgebra_csr(&self) -> nas::CsrMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }

  pub fn to_nalgebra_dense(&self) -> na::DMatrix<f64> {
    (&self.to_nalgebra_coo()).into()
  }
}
