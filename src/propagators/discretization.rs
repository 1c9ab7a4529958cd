/*
    scvx, successive convexification trajectory optimization
    Copyright (C) 2026 The scvx developers

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use rayon::prelude::*;

use super::{Integrator, IntegrationError, IntegratorOptions, OdeSystem, RssStep};
use crate::dynamics::{DescentModel, DynamicsError};
use crate::linalg::{DMatrix, DVector};

/// The discrete linearized transition model of one trajectory segment:
///
/// `x(k+1) ≈ A̅·x(k) + B̅·u(k) + C̅·u(k+1) + Σ̅·σ + z̅`
///
/// to first order about the reference state, controls and time scale used for
/// the discretization.
#[derive(Clone, Debug)]
pub struct DiscretizationResult {
    /// State-to-state transition, `n_states × n_states`.
    pub a_bar: DMatrix<f64>,
    /// Start-of-segment control to state transition, `n_states × n_inputs`.
    pub b_bar: DMatrix<f64>,
    /// End-of-segment control to state transition, `n_states × n_inputs`.
    pub c_bar: DMatrix<f64>,
    /// Sensitivity to the total-time scale factor σ.
    pub sigma_bar: DVector<f64>,
    /// Residual affine term.
    pub z_bar: DVector<f64>,
}

/// The augmented ODE whose integration yields a segment's nonlinear state
/// endpoint plus all transition matrices in one pass.
///
/// The flat state packs, column-wise: the nonlinear state (column 0), the
/// running state transition matrix Φ(t) (identity at t=0), the Φ⁻¹-weighted
/// end- and start-control sensitivity blocks, the σ sensitivity and the
/// residual. The control along the segment is affinely interpolated between
/// `u_start` and `u_end` with the interval fraction α = t/dt.
pub struct SensitivityOde<'a, M: DescentModel + ?Sized> {
    model: &'a M,
    u_start: DVector<f64>,
    u_end: DVector<f64>,
    sigma: f64,
    dt: f64,
    n: usize,
    m: usize,
}

impl<'a, M: DescentModel + ?Sized> SensitivityOde<'a, M> {
    pub fn new(
        model: &'a M,
        u_start: DVector<f64>,
        u_end: DVector<f64>,
        sigma: f64,
        dt: f64,
    ) -> Self {
        let n = model.n_states();
        let m = model.n_inputs();
        Self {
            model,
            u_start,
            u_end,
            sigma,
            dt,
            n,
            m,
        }
    }

    /// Number of columns of the augmented state matrix.
    fn n_cols(&self) -> usize {
        1 + self.n + 2 * self.m + 2
    }

    /// The augmented initial condition for a segment starting at `x_k`.
    pub fn initial_state(&self, x_k: &DVector<f64>) -> DVector<f64> {
        let mut v = DMatrix::<f64>::zeros(self.n, self.n_cols());
        v.set_column(0, x_k);
        v.view_mut((0, 1), (self.n, self.n))
            .fill_with_identity();
        DVector::from_column_slice(v.as_slice())
    }
}

impl<'a, M: DescentModel + ?Sized> OdeSystem for SensitivityOde<'a, M> {
    fn dimension(&self) -> usize {
        self.n * self.n_cols()
    }

    fn eom(&self, t: f64, v: &DVector<f64>) -> Result<DVector<f64>, DynamicsError> {
        let (n, m) = (self.n, self.m);
        let v_mat = DMatrix::from_column_slice(n, self.n_cols(), v.as_slice());

        let x = v_mat.column(0).into_owned();
        let alpha = (t / self.dt).clamp(0.0, 1.0);
        let beta = 1.0 - alpha;
        let u = &self.u_start * beta + &self.u_end * alpha;

        let a = self.model.state_jacobian(&x, &u)? * self.sigma;
        let b = self.model.control_jacobian(&x, &u)? * self.sigma;
        let f = self.model.ode(&x, &u)?;

        let phi = v_mat.columns(1, n).into_owned();
        let phi_inv = phi
            .clone()
            .try_inverse()
            .ok_or(DynamicsError::SingularStateTransitionMatrix)?;

        let phi_inv_b = &phi_inv * &b;

        let mut dv = DMatrix::<f64>::zeros(n, self.n_cols());
        dv.set_column(0, &(&f * self.sigma));
        dv.view_mut((0, 1), (n, n)).copy_from(&(&a * &phi));
        // End-of-segment control weight is α, start-of-segment weight is β.
        dv.view_mut((0, 1 + n), (n, m))
            .copy_from(&(&phi_inv_b * alpha));
        dv.view_mut((0, 1 + n + m), (n, m))
            .copy_from(&(&phi_inv_b * beta));
        dv.set_column(1 + n + 2 * m, &(&phi_inv * &f));
        dv.set_column(
            1 + n + 2 * m + 1,
            &(&phi_inv * (-(&a * &x) - (&b * &u))),
        );

        Ok(DVector::from_column_slice(dv.as_slice()))
    }
}

/// Discretizes trajectory segments by propagating the augmented sensitivity
/// ODE over each segment's normalized span `[0, dt]`.
#[derive(Clone, Debug)]
pub struct Discretizer {
    /// Normalized segment duration, `1/(K-1)`.
    pub dt: f64,
    pub opts: IntegratorOptions,
}

impl Discretizer {
    /// Builds a discretizer for trajectories of `k` samples.
    pub fn new(k: usize, opts: IntegratorOptions) -> Self {
        Self {
            dt: 1.0 / (k as f64 - 1.0),
            opts,
        }
    }

    /// Discretizes one segment about the provided reference point.
    pub fn segment<M: DescentModel + ?Sized>(
        &self,
        model: &M,
        x_k: &DVector<f64>,
        u_k: &DVector<f64>,
        u_k1: &DVector<f64>,
        sigma: f64,
    ) -> Result<DiscretizationResult, IntegrationError> {
        let (n, m) = (model.n_states(), model.n_inputs());
        if x_k.len() != n {
            return Err(IntegrationError::Dynamics {
                source: DynamicsError::DimensionMismatch {
                    expected: n,
                    got: x_k.len(),
                },
            });
        }
        for u in [u_k, u_k1] {
            if u.len() != m {
                return Err(IntegrationError::Dynamics {
                    source: DynamicsError::DimensionMismatch {
                        expected: m,
                        got: u.len(),
                    },
                });
            }
        }
        let system = SensitivityOde::new(model, u_k.clone(), u_k1.clone(), sigma, self.dt);
        let v0 = system.initial_state(x_k);

        let integrator = Integrator::<_, RssStep>::dormand_prince45(&system, self.opts);
        let (v_end, _) = integrator.until(v0, 0.0, self.dt)?;

        let v_mat = DMatrix::from_column_slice(n, 1 + n + 2 * m + 2, v_end.as_slice());
        let a_bar = v_mat.columns(1, n).into_owned();
        // Remove the Φ⁻¹ weighting accumulated during the integration.
        let c_bar = &a_bar * v_mat.columns(1 + n, m).into_owned();
        let b_bar = &a_bar * v_mat.columns(1 + n + m, m).into_owned();
        let sigma_bar = &a_bar * v_mat.column(1 + n + 2 * m).into_owned();
        let z_bar = &a_bar * v_mat.column(1 + n + 2 * m + 1).into_owned();

        Ok(DiscretizationResult {
            a_bar,
            b_bar,
            c_bar,
            sigma_bar,
            z_bar,
        })
    }

    /// Discretizes all `K-1` segments of the reference trajectory.
    ///
    /// Segments are independent: each one reads only the reference trajectory
    /// and produces its own result slot, so the map runs in parallel.
    pub fn all_segments<M: DescentModel>(
        &self,
        model: &M,
        states: &DMatrix<f64>,
        controls: &DMatrix<f64>,
        sigma: f64,
    ) -> Result<Vec<DiscretizationResult>, IntegrationError> {
        let segments = states.ncols() - 1;
        (0..segments)
            .into_par_iter()
            .map(|k| {
                self.segment(
                    model,
                    &states.column(k).into_owned(),
                    &controls.column(k).into_owned(),
                    &controls.column(k + 1).into_owned(),
                    sigma,
                )
            })
            .collect()
    }
}
