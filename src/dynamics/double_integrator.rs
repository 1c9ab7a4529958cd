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

use super::{DescentModel, DynamicsError};
use crate::linalg::{DMatrix, DVector, Vector2};
use crate::program::{ConicProgramModel, Constraint, ProgramError};

/// A one-dimensional double integrator: `ẋ₁ = x₂`, `ẋ₂ = u`, with a bounded
/// control channel and fixed boundary states. The simplest model exercising
/// the full SCvx stack; its dynamics are linear, so the linearization is
/// exact and the virtual control collapses immediately.
#[derive(Clone, Debug)]
pub struct DoubleIntegrator {
    pub initial: Vector2<f64>,
    pub target: Vector2<f64>,
    /// Symmetric control bound, `|u| ≤ u_max`.
    pub u_max: f64,
    /// Lower bound on the total flight time, keeps the free-final-time
    /// objective away from the degenerate σ → 0 corner.
    pub t_min: f64,
    pub t_guess: f64,
}

impl Default for DoubleIntegrator {
    fn default() -> Self {
        Self {
            initial: Vector2::new(1.0, 0.0),
            target: Vector2::new(0.0, 0.0),
            u_max: 3.0,
            t_min: 0.3,
            t_guess: 2.0,
        }
    }
}

impl DescentModel for DoubleIntegrator {
    fn n_states(&self) -> usize {
        2
    }

    fn n_inputs(&self) -> usize {
        1
    }

    fn ode(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>, DynamicsError> {
        Ok(DVector::from_vec(vec![x[1], u[0]]))
    }

    fn state_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 0.0, 0.0]))
    }

    fn control_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::from_row_slice(2, 1, &[0.0, 1.0]))
    }

    fn initialize(&self, k: usize) -> Result<(DMatrix<f64>, DMatrix<f64>), DynamicsError> {
        let mut states = DMatrix::zeros(2, k);
        let controls = DMatrix::zeros(1, k);
        let rate = (self.target[0] - self.initial[0]) / self.t_guess;
        for j in 0..k {
            let tau = j as f64 / (k as f64 - 1.0);
            states[(0, j)] = (1.0 - tau) * self.initial[0] + tau * self.target[0];
            states[(1, j)] = rate;
        }
        Ok((states, controls))
    }

    fn total_time_guess(&self) -> f64 {
        self.t_guess
    }

    fn add_application_constraints(
        &self,
        program: &mut ConicProgramModel,
        k: usize,
    ) -> Result<(), ProgramError> {
        // Boundary conditions.
        for i in 0..2 {
            let x_first = program.variable_ref("X", &[i, 0])?;
            let x_last = program.variable_ref("X", &[i, k - 1])?;
            program.add_constraint(Constraint::eq_zero(1.0 * x_first + (-self.initial[i])))?;
            program.add_constraint(Constraint::eq_zero(1.0 * x_last + (-self.target[i])))?;
        }

        // Control bounds, |u(j)| <= u_max.
        for j in 0..k {
            let u = program.variable_ref("U", &[0, j])?;
            program.add_constraint(Constraint::le_zero(1.0 * u + (-self.u_max)))?;
            program.add_constraint(Constraint::le_zero(-1.0 * u + (-self.u_max)))?;
        }

        // Flight time floor.
        let sigma = program.variable_ref("sigma", &[])?;
        program.add_constraint(Constraint::le_zero(-1.0 * sigma + self.t_min))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn jacobians_match_finite_differences() {
        let model = DoubleIntegrator::default();
        let x = DVector::from_vec(vec![0.4, -0.7]);
        let u = DVector::from_vec(vec![1.3]);
        let f0 = model.ode(&x, &u).unwrap();
        let a = model.state_jacobian(&x, &u).unwrap();
        let b = model.control_jacobian(&x, &u).unwrap();

        let eps = 1e-6;
        for j in 0..2 {
            let mut xp = x.clone();
            xp[j] += eps;
            let fp = model.ode(&xp, &u).unwrap();
            for i in 0..2 {
                assert_abs_diff_eq!(a[(i, j)], (fp[i] - f0[i]) / eps, epsilon = 1e-6);
            }
        }
        let mut up = u.clone();
        up[0] += eps;
        let fp = model.ode(&x, &up).unwrap();
        for i in 0..2 {
            assert_abs_diff_eq!(b[(i, 0)], (fp[i] - f0[i]) / eps, epsilon = 1e-6);
        }
    }

    #[test]
    fn initial_guess_hits_boundaries() {
        let model = DoubleIntegrator::default();
        let (states, controls) = model.initialize(11).unwrap();
        assert_eq!(states.ncols(), 11);
        assert_eq!(controls.ncols(), 11);
        assert_abs_diff_eq!(states[(0, 0)], 1.0);
        assert_abs_diff_eq!(states[(0, 10)], 0.0);
    }
}
