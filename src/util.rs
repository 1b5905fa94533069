pub fn factorial(num: usize) -> usize {
  (1..=num).product()
}

pub fn indicies_to_flags(indicies: &[usize], len: usize) -> Vec<bool> {
  let mut flags = vec![false; len];
  indicies.iter().for_each(|&i| flags[i] = true);
  flags
}

pub fn flags_to_indicies(flags: &[bool]) -> Vec<usize> {
  flags
    .iter()
    .enumerate()
    .filter_map(|(i, &flag)| flag.then_some(i))
    .collect()
}

pub fn sparse_to_dense_data<T>(sparse: Vec<(usize, T)>, len: usize) -> Vec<Option<T>> {
  let mut dense = Vec::from_iter((0..len).map(|_| None));
  sparse.into_iter().for_each(|(i, t)| dense[i] = Some(t));
  dense
}

/// Maps global indices to their position in `indicies`.
pub fn indicies_to_positions(indicies: &[usize], len: usize) -> Vec<Option<usize>> {
  sparse_to_dense_data(
    indicies.iter().enumerate().map(|(pos, &i)| (i, pos)).collect(),
    len,
  )
}

/// Maximum over an iterator of floats, ignoring NaNs.
pub fn fmax(iter: impl IntoIterator<Item = f64>) -> Option<f64> {
  iter.into_iter().filter(|v| !v.is_nan()).reduce(f64::max)
}

/// Minimum over an iterator of floats, ignoring NaNs.
pub fn fmin(iter: impl IntoIterator<Item = f64>) -> Option<f64> {
  iter.into_iter().filter(|v| !v.is_nan()).reduce(f64::min)
}
