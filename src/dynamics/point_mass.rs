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
use crate::linalg::{DMatrix, DVector, Vector3};
use crate::program::{norm2, ConicProgramModel, Constraint, ProgramError};

/// Guards the thrust direction `T/‖T‖` in the mass-flow Jacobian when the
/// reference thrust is near zero.
const THRUST_NORM_FLOOR: f64 = 1e-9;

/// A 3-DoF variable-mass powered descent model in nondimensional units.
///
/// State `[m, rx, ry, rz, vx, vy, vz]` with `z` up, control is the thrust
/// vector. Mass depletes proportionally to the thrust magnitude:
///
/// - `ṁ = -α·‖T‖`
/// - `ṙ = v`
/// - `v̇ = T/m - g·e_z`
///
/// Mission constraints: wet mass at departure, dry mass floor, thrust
/// magnitude cone, glide-slope cone and rest-to-rest boundary conditions.
#[derive(Clone, Debug)]
pub struct PointMassLander {
    pub m_wet: f64,
    pub m_dry: f64,
    /// Mass flow per unit of thrust.
    pub alpha: f64,
    /// Gravity magnitude, acting along `-z`.
    pub g: f64,
    /// Thrust magnitude upper bound.
    pub t_max: f64,
    /// Tangent of the maximum glide-slope half angle: `‖r_xy‖ ≤ tan_gs · r_z`.
    pub tan_gs: f64,
    pub r0: Vector3<f64>,
    pub v0: Vector3<f64>,
    pub t_min: f64,
    pub t_guess: f64,
}

impl Default for PointMassLander {
    fn default() -> Self {
        Self {
            m_wet: 2.0,
            m_dry: 1.0,
            alpha: 0.01,
            g: 1.0,
            t_max: 5.0,
            tan_gs: 1.0,
            r0: Vector3::new(2.0, 0.5, 5.0),
            v0: Vector3::new(-0.5, -0.2, -1.0),
            t_min: 1.0,
            t_guess: 5.0,
        }
    }
}

impl DescentModel for PointMassLander {
    fn n_states(&self) -> usize {
        7
    }

    fn n_inputs(&self) -> usize {
        3
    }

    fn ode(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>, DynamicsError> {
        let m = x[0];
        if m <= 0.0 {
            return Err(DynamicsError::ModelError {
                details: format!("non-positive mass {m}"),
            });
        }
        let thrust_norm = u.norm();
        let mut f = DVector::zeros(7);
        f[0] = -self.alpha * thrust_norm;
        f[1] = x[4];
        f[2] = x[5];
        f[3] = x[6];
        f[4] = u[0] / m;
        f[5] = u[1] / m;
        f[6] = u[2] / m - self.g;
        Ok(f)
    }

    fn state_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        let m = x[0];
        let mut a = DMatrix::zeros(7, 7);
        // ∂ṙ/∂v
        for i in 0..3 {
            a[(1 + i, 4 + i)] = 1.0;
        }
        // ∂v̇/∂m = -T/m²
        for i in 0..3 {
            a[(4 + i, 0)] = -u[i] / (m * m);
        }
        Ok(a)
    }

    fn control_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        let m = x[0];
        let thrust_norm = u.norm().max(THRUST_NORM_FLOOR);
        let mut b = DMatrix::zeros(7, 3);
        for i in 0..3 {
            b[(0, i)] = -self.alpha * u[i] / thrust_norm;
            b[(4 + i, i)] = 1.0 / m;
        }
        Ok(b)
    }

    fn initialize(&self, k: usize) -> Result<(DMatrix<f64>, DMatrix<f64>), DynamicsError> {
        let mut states = DMatrix::zeros(7, k);
        let mut controls = DMatrix::zeros(3, k);
        for j in 0..k {
            let tau = j as f64 / (k as f64 - 1.0);
            let mass = (1.0 - tau) * self.m_wet + tau * self.m_dry;
            states[(0, j)] = mass;
            for i in 0..3 {
                states[(1 + i, j)] = (1.0 - tau) * self.r0[i];
                states[(4 + i, j)] = (1.0 - tau) * self.v0[i];
            }
            // Hover thrust.
            controls[(2, j)] = mass * self.g;
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
        // Departure state: wet mass, initial position and velocity.
        let m_first = program.variable_ref("X", &[0, 0])?;
        program.add_constraint(Constraint::eq_zero(1.0 * m_first + (-self.m_wet)))?;
        for i in 0..3 {
            let r_first = program.variable_ref("X", &[1 + i, 0])?;
            let v_first = program.variable_ref("X", &[4 + i, 0])?;
            program.add_constraint(Constraint::eq_zero(1.0 * r_first + (-self.r0[i])))?;
            program.add_constraint(Constraint::eq_zero(1.0 * v_first + (-self.v0[i])))?;
        }

        // Touchdown at the origin, at rest.
        for i in 0..3 {
            let r_last = program.variable_ref("X", &[1 + i, k - 1])?;
            let v_last = program.variable_ref("X", &[4 + i, k - 1])?;
            program.add_constraint(Constraint::eq_zero(1.0 * r_last))?;
            program.add_constraint(Constraint::eq_zero(1.0 * v_last))?;
        }

        for j in 0..k {
            // Dry mass floor.
            let m_j = program.variable_ref("X", &[0, j])?;
            program.add_constraint(Constraint::le_zero(-1.0 * m_j + self.m_dry))?;

            // Thrust magnitude cone.
            let t0 = program.variable_ref("U", &[0, j])?;
            let t1 = program.variable_ref("U", &[1, j])?;
            let t2 = program.variable_ref("U", &[2, j])?;
            program.add_constraint(
                norm2(vec![1.0 * t0, 1.0 * t1, 1.0 * t2]).le(self.t_max),
            )?;

            // Glide slope: the lateral position stays within the cone.
            let rx = program.variable_ref("X", &[1, j])?;
            let ry = program.variable_ref("X", &[2, j])?;
            let rz = program.variable_ref("X", &[3, j])?;
            program.add_constraint(norm2(vec![1.0 * rx, 1.0 * ry]).le(self.tan_gs * rz))?;
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
        let model = PointMassLander::default();
        let x = DVector::from_vec(vec![1.8, 1.0, 0.4, 3.0, -0.3, -0.1, -0.8]);
        let u = DVector::from_vec(vec![0.4, -0.2, 2.1]);
        let f0 = model.ode(&x, &u).unwrap();
        let a = model.state_jacobian(&x, &u).unwrap();
        let b = model.control_jacobian(&x, &u).unwrap();

        let eps = 1e-7;
        for j in 0..7 {
            let mut xp = x.clone();
            xp[j] += eps;
            let fp = model.ode(&xp, &u).unwrap();
            for i in 0..7 {
                assert_abs_diff_eq!(a[(i, j)], (fp[i] - f0[i]) / eps, epsilon = 1e-5);
            }
        }
        for j in 0..3 {
            let mut up = u.clone();
            up[j] += eps;
            let fp = model.ode(&x, &up).unwrap();
            for i in 0..7 {
                assert_abs_diff_eq!(b[(i, j)], (fp[i] - f0[i]) / eps, epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn non_positive_mass_is_an_error() {
        let model = PointMassLander::default();
        let x = DVector::from_vec(vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        let u = DVector::from_vec(vec![0.0, 0.0, 1.0]);
        assert!(model.ode(&x, &u).is_err());
    }

    #[test]
    fn hover_initialization_is_balanced() {
        let model = PointMassLander::default();
        let (states, controls) = model.initialize(5).unwrap();
        // At every sample the vertical thrust offsets gravity exactly.
        for j in 0..5 {
            let f = model
                .ode(
                    &DVector::from_column_slice(states.column(j).as_slice()),
                    &DVector::from_column_slice(controls.column(j).as_slice()),
                )
                .unwrap();
            assert_abs_diff_eq!(f[6], 0.0, epsilon = 1e-12);
        }
    }
}
