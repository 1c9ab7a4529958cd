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

extern crate approx;
extern crate scvx;

use approx::assert_abs_diff_eq;
use scvx::dynamics::{DescentModel, DoubleIntegrator, DynamicsError};
use scvx::linalg::{DMatrix, DVector};
use scvx::program::{ConicProgramModel, ProgramError};
use scvx::propagators::{
    Discretizer, IntegrationError, IntegratorOptions, OdeSystem, SensitivityOde,
};

/// A model whose state never moves: every transition matrix must be trivial.
struct Frozen;

impl DescentModel for Frozen {
    fn n_states(&self) -> usize {
        2
    }

    fn n_inputs(&self) -> usize {
        1
    }

    fn ode(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> Result<DVector<f64>, DynamicsError> {
        Ok(DVector::zeros(2))
    }

    fn state_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::zeros(2, 2))
    }

    fn control_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::zeros(2, 1))
    }

    fn initialize(&self, k: usize) -> Result<(DMatrix<f64>, DMatrix<f64>), DynamicsError> {
        Ok((DMatrix::zeros(2, k), DMatrix::zeros(1, k)))
    }

    fn total_time_guess(&self) -> f64 {
        1.0
    }

    fn add_application_constraints(
        &self,
        _program: &mut ConicProgramModel,
        _k: usize,
    ) -> Result<(), ProgramError> {
        Ok(())
    }
}

/// A model drifting at a constant rate regardless of state and control.
struct ConstantDrift;

impl DescentModel for ConstantDrift {
    fn n_states(&self) -> usize {
        2
    }

    fn n_inputs(&self) -> usize {
        1
    }

    fn ode(&self, _x: &DVector<f64>, _u: &DVector<f64>) -> Result<DVector<f64>, DynamicsError> {
        Ok(DVector::from_vec(vec![0.7, -0.2]))
    }

    fn state_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::zeros(2, 2))
    }

    fn control_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::zeros(2, 1))
    }

    fn initialize(&self, k: usize) -> Result<(DMatrix<f64>, DMatrix<f64>), DynamicsError> {
        Ok((DMatrix::zeros(2, k), DMatrix::zeros(1, k)))
    }

    fn total_time_guess(&self) -> f64 {
        1.0
    }

    fn add_application_constraints(
        &self,
        _program: &mut ConicProgramModel,
        _k: usize,
    ) -> Result<(), ProgramError> {
        Ok(())
    }
}

#[test]
fn frozen_dynamics_yield_identity_transition() {
    let model = Frozen;
    let discretizer = Discretizer::new(11, IntegratorOptions::default());
    let result = discretizer
        .segment(
            &model,
            &DVector::from_vec(vec![0.3, -0.4]),
            &DVector::zeros(1),
            &DVector::zeros(1),
            2.0,
        )
        .unwrap();

    for i in 0..2 {
        for j in 0..2 {
            let expected = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(result.a_bar[(i, j)], expected, epsilon = 1e-10);
        }
        assert_abs_diff_eq!(result.b_bar[(i, 0)], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(result.c_bar[(i, 0)], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(result.sigma_bar[i], 0.0, epsilon = 1e-10);
        assert_abs_diff_eq!(result.z_bar[i], 0.0, epsilon = 1e-10);
    }
}

#[test]
fn constant_drift_lands_in_the_sigma_sensitivity() {
    let model = ConstantDrift;
    let k = 11;
    let dt = 1.0 / (k as f64 - 1.0);
    let sigma = 3.0;
    let discretizer = Discretizer::new(k, IntegratorOptions::default());
    let result = discretizer
        .segment(
            &model,
            &DVector::from_vec(vec![1.0, 2.0]),
            &DVector::zeros(1),
            &DVector::zeros(1),
            sigma,
        )
        .unwrap();

    // With zero Jacobians the transition is the identity and the drift is
    // carried entirely by the sigma sensitivity: x(k+1) = x(k) + sigma*f*dt.
    assert_abs_diff_eq!(result.a_bar[(0, 0)], 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.a_bar[(1, 1)], 1.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.sigma_bar[0], 0.7 * dt, epsilon = 1e-9);
    assert_abs_diff_eq!(result.sigma_bar[1], -0.2 * dt, epsilon = 1e-9);
    assert_abs_diff_eq!(result.z_bar[0], 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(result.z_bar[1], 0.0, epsilon = 1e-9);
}

#[test]
fn double_integrator_matches_closed_form() {
    let model = DoubleIntegrator::default();
    let k = 6;
    let dt = 1.0 / (k as f64 - 1.0);
    let sigma = 2.0;
    let opts = IntegratorOptions::builder().tolerance(1e-10).build();
    let discretizer = Discretizer::new(k, opts);

    let u = 1.5;
    let result = discretizer
        .segment(
            &model,
            &DVector::from_vec(vec![1.0, -0.5]),
            &DVector::from_element(1, u),
            &DVector::from_element(1, u),
            sigma,
        )
        .unwrap();

    // A̅ = exp(σ·A·dt) for A = [[0, 1], [0, 0]].
    assert_abs_diff_eq!(result.a_bar[(0, 0)], 1.0, epsilon = 1e-8);
    assert_abs_diff_eq!(result.a_bar[(0, 1)], sigma * dt, epsilon = 1e-8);
    assert_abs_diff_eq!(result.a_bar[(1, 0)], 0.0, epsilon = 1e-8);
    assert_abs_diff_eq!(result.a_bar[(1, 1)], 1.0, epsilon = 1e-8);

    // With the affine control interpolation the start weight carries the
    // larger share of the position response:
    //   B̅ = [σ²dt²/3, σdt/2], C̅ = [σ²dt²/6, σdt/2].
    let sd = sigma * dt;
    assert_abs_diff_eq!(result.b_bar[(0, 0)], sd * sd / 3.0, epsilon = 1e-7);
    assert_abs_diff_eq!(result.b_bar[(1, 0)], sd / 2.0, epsilon = 1e-7);
    assert_abs_diff_eq!(result.c_bar[(0, 0)], sd * sd / 6.0, epsilon = 1e-7);
    assert_abs_diff_eq!(result.c_bar[(1, 0)], sd / 2.0, epsilon = 1e-7);
}

#[test]
fn linearization_reconstructs_the_nonlinear_endpoint() {
    // For linear dynamics the first-order model is exact: applying the
    // transition matrices at the reference point must reproduce the closed
    // form propagation of the nonlinear system.
    let model = DoubleIntegrator::default();
    let k = 6;
    let dt = 1.0 / (k as f64 - 1.0);
    let sigma = 2.0;
    let x0 = DVector::from_vec(vec![1.0, -0.5]);
    let u = 1.5;

    let opts = IntegratorOptions::builder().tolerance(1e-10).build();
    let discretizer = Discretizer::new(k, opts);
    let result = discretizer
        .segment(
            &model,
            &x0,
            &DVector::from_element(1, u),
            &DVector::from_element(1, u),
            sigma,
        )
        .unwrap();

    let reconstructed = &result.a_bar * &x0
        + &result.b_bar * DVector::from_element(1, u)
        + &result.c_bar * DVector::from_element(1, u)
        + &result.sigma_bar * sigma
        + &result.z_bar;

    let sd = sigma * dt;
    let expected_0 = x0[0] + sd * x0[1] + 0.5 * sd * sd * u;
    let expected_1 = x0[1] + sd * u;
    assert_abs_diff_eq!(reconstructed[0], expected_0, epsilon = 1e-7);
    assert_abs_diff_eq!(reconstructed[1], expected_1, epsilon = 1e-7);
}

/// A model that cannot be linearized: the state Jacobian always fails.
struct Unlinearizable;

impl DescentModel for Unlinearizable {
    fn n_states(&self) -> usize {
        2
    }

    fn n_inputs(&self) -> usize {
        1
    }

    fn ode(&self, x: &DVector<f64>, _u: &DVector<f64>) -> Result<DVector<f64>, DynamicsError> {
        Ok(x.clone())
    }

    fn state_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Err(DynamicsError::ModelError {
            details: "no gradient here".to_string(),
        })
    }

    fn control_jacobian(
        &self,
        _x: &DVector<f64>,
        _u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError> {
        Ok(DMatrix::zeros(2, 1))
    }

    fn initialize(&self, k: usize) -> Result<(DMatrix<f64>, DMatrix<f64>), DynamicsError> {
        Ok((DMatrix::zeros(2, k), DMatrix::zeros(1, k)))
    }

    fn total_time_guess(&self) -> f64 {
        1.0
    }

    fn add_application_constraints(
        &self,
        _program: &mut ConicProgramModel,
        _k: usize,
    ) -> Result<(), ProgramError> {
        Ok(())
    }
}

#[test]
fn model_failure_aborts_the_segment() {
    let model = Unlinearizable;
    let discretizer = Discretizer::new(11, IntegratorOptions::default());
    let err = discretizer
        .segment(
            &model,
            &DVector::from_vec(vec![1.0, 0.0]),
            &DVector::zeros(1),
            &DVector::zeros(1),
            1.0,
        )
        .unwrap_err();
    assert!(matches!(err, IntegrationError::Dynamics { .. }));
}

#[test]
fn singular_transition_matrix_is_fatal() {
    // Zeroing the state transition block of the augmented state makes it
    // non-invertible, which must abort the propagation rather than produce
    // garbage sensitivities.
    let model = DoubleIntegrator::default();
    let system = SensitivityOde::new(
        &model,
        DVector::zeros(1),
        DVector::zeros(1),
        2.0,
        0.1,
    );
    let mut v = system.initial_state(&DVector::from_vec(vec![1.0, 0.0]));
    // Columns 1..3 of the 2-row augmented matrix hold the transition matrix.
    for i in 2..6 {
        v[i] = 0.0;
    }
    assert_eq!(
        system.eom(0.0, &v).unwrap_err(),
        DynamicsError::SingularStateTransitionMatrix
    );
}

#[test]
fn mismatched_reference_dimensions_rejected() {
    let model = DoubleIntegrator::default();
    let discretizer = Discretizer::new(11, IntegratorOptions::default());

    // Three states for a two-state model.
    let err = discretizer
        .segment(
            &model,
            &DVector::zeros(3),
            &DVector::zeros(1),
            &DVector::zeros(1),
            1.0,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        IntegrationError::Dynamics {
            source: DynamicsError::DimensionMismatch { expected: 2, got: 3 },
        }
    ));

    // Two control channels for a single-input model.
    let err = discretizer
        .segment(
            &model,
            &DVector::zeros(2),
            &DVector::zeros(1),
            &DVector::zeros(2),
            1.0,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        IntegrationError::Dynamics {
            source: DynamicsError::DimensionMismatch { expected: 1, got: 2 },
        }
    ));
}

#[test]
fn all_segments_covers_the_whole_trajectory() {
    let model = DoubleIntegrator::default();
    let k = 8;
    let (states, controls) = model.initialize(k).unwrap();
    let discretizer = Discretizer::new(k, IntegratorOptions::default());
    let results = discretizer
        .all_segments(&model, &states, &controls, model.total_time_guess())
        .unwrap();
    assert_eq!(results.len(), k - 1);
    for result in &results {
        assert_eq!(result.a_bar.nrows(), 2);
        assert_eq!(result.b_bar.ncols(), 1);
    }
}
