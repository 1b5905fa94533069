//! Explicit adaptive integration of $y' = f(t, y)$, final value only.

use crate::{MmpdeError, MmpdeResult};

pub trait OdeIntegrator {
  /// Integrates from `t_span.0` to `t_span.1` and returns `y(t_span.1)`.
  fn integrate<F>(
    &self,
    f: F,
    t_span: (f64, f64),
    y0: na::DVector<f64>,
  ) -> MmpdeResult<na::DVector<f64>>
  where
    F: FnMut(f64, &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>>;
}

/// Bogacki-Shampine embedded Runge-Kutta pair of order 3(2).
#[derive(Debug, Clone, Copy)]
pub struct Rk23 {
  pub rtol: f64,
  pub atol: f64,
  pub max_steps: usize,
}
impl Default for Rk23 {
  fn default() -> Self {
    Self {
      rtol: 1e-3,
      atol: 1e-6,
      max_steps: 100_000,
    }
  }
}
impl Rk23 {
  pub fn with_tolerances(rtol: f64, atol: f64) -> Self {
    Self {
      rtol,
      atol,
      ..Self::default()
    }
  }
}

const ERROR_ESTIMATOR_ORDER: f64 = 2.0;
const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

const C: [f64; 3] = [0.0, 1.0 / 2.0, 3.0 / 4.0];
const B: [f64; 3] = [2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0];
/// Difference of the 3rd and the embedded 2nd order weights, incl. the FSAL stage.
const E: [f64; 4] = [5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0];

fn rms_norm(x: &na::DVector<f64>) -> f64 {
  if x.is_empty() {
    return 0.0;
  }
  (x.norm_squared() / x.len() as f64).sqrt()
}

impl Rk23 {
  fn scale(&self, y: &na::DVector<f64>, y_new: &na::DVector<f64>) -> na::DVector<f64> {
    y.zip_map(y_new, |a, b| self.atol + self.rtol * a.abs().max(b.abs()))
  }

  fn initial_step<F>(
    &self,
    f: &mut F,
    t0: f64,
    y0: &na::DVector<f64>,
    f0: &na::DVector<f64>,
    direction: f64,
  ) -> MmpdeResult<f64>
  where
    F: FnMut(f64, &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>>,
  {
    let scale = self.scale(y0, y0);
    let d0 = rms_norm(&y0.component_div(&scale));
    let d1 = rms_norm(&f0.component_div(&scale));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 {
      1e-6
    } else {
      0.01 * d0 / d1
    };
    let y1 = y0 + direction * h0 * f0;
    let f1 = f(t0 + direction * h0, &y1)?;
    let d2 = rms_norm(&(f1 - f0).component_div(&scale)) / h0;
    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
      (h0 * 1e-3).max(1e-6)
    } else {
      (0.01 / d1.max(d2)).powf(1.0 / (ERROR_ESTIMATOR_ORDER + 1.0))
    };
    Ok((100.0 * h0).min(h1))
  }
}

impl OdeIntegrator for Rk23 {
  fn integrate<F>(
    &self,
    mut f: F,
    t_span: (f64, f64),
    y0: na::DVector<f64>,
  ) -> MmpdeResult<na::DVector<f64>>
  where
    F: FnMut(f64, &na::DVector<f64>) -> MmpdeResult<na::DVector<f64>>,
  {
    let (t0, t_end) = t_span;
    if t0 == t_end {
      return Ok(y0);
    }
    let direction = (t_end - t0).signum();
    let exponent = -1.0 / (ERROR_ESTIMATOR_ORDER + 1.0);

    let mut t = t0;
    let mut y = y0;
    let mut k1 = f(t, &y)?;
    let mut h_abs = self.initial_step(&mut f, t, &y, &k1, direction)?;

    let mut nsteps = 0;
    while direction * (t_end - t) > 0.0 {
      if nsteps == self.max_steps {
        return Err(MmpdeError::Integration(format!(
          "step limit of {} reached at t = {t}",
          self.max_steps
        )));
      }
      nsteps += 1;

      let min_step = 10.0 * (t.abs() * f64::EPSILON).max(f64::MIN_POSITIVE);
      if h_abs < min_step {
        return Err(MmpdeError::Integration(format!(
          "step size underflow at t = {t}"
        )));
      }
      h_abs = h_abs.min((t_end - t).abs());
      let h = direction * h_abs;

      let k2 = f(t + C[1] * h, &(&y + (h * 0.5) * &k1))?;
      let k3 = f(t + C[2] * h, &(&y + (h * 0.75) * &k2))?;
      let y_new = &y + h * (B[0] * &k1 + B[1] * &k2 + B[2] * &k3);
      let t_new = if (t_end - (t + h)) * direction <= 0.0 {
        t_end
      } else {
        t + h
      };
      let k4 = f(t_new, &y_new)?;

      let error = h * (E[0] * &k1 + E[1] * &k2 + E[2] * &k3 + E[3] * &k4);
      let error_norm = rms_norm(&error.component_div(&self.scale(&y, &y_new)));
      if !error_norm.is_finite() {
        return Err(MmpdeError::Integration(format!(
          "non-finite error estimate at t = {t}"
        )));
      }

      if error_norm < 1.0 {
        let factor = if error_norm == 0.0 {
          MAX_FACTOR
        } else {
          (SAFETY * error_norm.powf(exponent)).min(MAX_FACTOR)
        };
        t = t_new;
        y = y_new;
        k1 = k4;
        h_abs *= factor;
      } else {
        h_abs *= (SAFETY * error_norm.powf(exponent)).max(MIN_FACTOR);
      }
    }
    Ok(y)
  }
}
