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

use crate::linalg::{DMatrix, DVector};
use crate::program::{ConicProgramModel, ProgramError};
use snafu::Snafu;

/// A double integrator with a single control channel.
pub mod double_integrator;
pub use self::double_integrator::*;

/// A 3-DoF variable-mass powered descent model.
pub mod point_mass;
pub use self::point_mass::*;

/// The capability the SCvx core consumes from a vehicle model.
///
/// A model defines the equations of motion over *normalized* flight time
/// `τ ∈ [0, 1]` such that `dx/dτ = σ·f(x, u)` where `σ` is the total flight
/// time. The core linearizes `f` about a reference trajectory, so the
/// Jacobians must be consistent with [`DescentModel::ode`].
///
/// Models must be `Send + Sync`: segment discretizations run in parallel and
/// each worker reads the model concurrently.
pub trait DescentModel: Send + Sync {
    /// Dimension of the state vector.
    fn n_states(&self) -> usize;

    /// Dimension of the control vector.
    fn n_inputs(&self) -> usize;

    /// Nonlinear dynamics right-hand side `f(x, u)`.
    fn ode(&self, x: &DVector<f64>, u: &DVector<f64>) -> Result<DVector<f64>, DynamicsError>;

    /// Jacobian `∂f/∂x` evaluated at `(x, u)`, shaped `n_states × n_states`.
    fn state_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError>;

    /// Jacobian `∂f/∂u` evaluated at `(x, u)`, shaped `n_states × n_inputs`.
    fn control_jacobian(
        &self,
        x: &DVector<f64>,
        u: &DVector<f64>,
    ) -> Result<DMatrix<f64>, DynamicsError>;

    /// Initial trajectory guess: state samples (`n_states × k`) and control
    /// samples (`n_inputs × k`).
    fn initialize(&self, k: usize) -> Result<(DMatrix<f64>, DMatrix<f64>), DynamicsError>;

    /// Initial guess for the total flight time `σ`, in seconds.
    fn total_time_guess(&self) -> f64;

    /// Injects mission-specific constraints (boundary conditions, control
    /// limits, path constraints) into the convex program during structural
    /// setup. Called exactly once, before the program is compiled.
    ///
    /// The core declares the tensor variables `X` (`n_states × k`), `U`
    /// (`n_inputs × k`) and the scalar `sigma` before this is invoked, so the
    /// model may reference them by name.
    fn add_application_constraints(
        &self,
        program: &mut ConicProgramModel,
        k: usize,
    ) -> Result<(), ProgramError>;
}

/// Dynamical model errors.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum DynamicsError {
    /// The state transition matrix became singular during propagation. This
    /// is fatal: the segment cannot be linearized.
    #[snafu(display("state transition matrix is singular, propagation cannot proceed"))]
    SingularStateTransitionMatrix,
    /// A state or control vector had the wrong dimension.
    #[snafu(display("dimension mismatch: expected {expected}, got {got}"))]
    DimensionMismatch { expected: usize, got: usize },
    /// Model-specific failure.
    #[snafu(display("model error: {details}"))]
    ModelError { details: String },
}
