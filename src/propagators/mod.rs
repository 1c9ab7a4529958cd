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

use std::fmt;

use serde_derive::{Deserialize, Serialize};
use snafu::Snafu;
use typed_builder::TypedBuilder;

use crate::dynamics::DynamicsError;
use crate::linalg::DVector;

mod rk_methods;
pub use rk_methods::*;
mod instance;
pub use instance::*;
mod discretization;
pub use discretization::*;

/// A first-order ODE system over a flat real vector. The segment
/// discretization flattens its augmented state matrix into this form.
pub trait OdeSystem {
    /// Dimension of the flat state vector.
    fn dimension(&self) -> usize;

    /// Right-hand side at time `t`.
    fn eom(&self, t: f64, v: &DVector<f64>) -> Result<DVector<f64>, DynamicsError>;
}

/// Stores the details of the previous integration step.
#[derive(Copy, Clone, Debug)]
pub struct IntegrationDetails {
    /// step size used
    pub step: f64,
    /// error in the previous integration step
    pub error: f64,
    /// number of attempts needed by an adaptive step size to be within the tolerance
    pub attempts: u8,
}

impl fmt::Display for IntegrationDetails {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "IntegrationDetails {{step: {:.3e}, error: {:.3e}, attempts: {}}}",
            self.step, self.error, self.attempts
        )
    }
}

/// Integrator options: tolerance and step bounds for the adaptive stepper.
///
/// Steps are expressed in the normalized time of the quantity being
/// integrated (a trajectory segment spans `[0, dt]` with `dt = 1/(K-1)`), so
/// the initial step is a fraction of the span rather than an absolute value.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, TypedBuilder)]
#[builder(doc)]
pub struct IntegratorOptions {
    /// Initial step as a fraction of the integration span.
    #[builder(default = 0.1)]
    pub init_step_fraction: f64,
    /// Smallest admissible step.
    #[builder(default = 1e-10)]
    pub min_step: f64,
    #[builder(default = 1e-4)]
    pub tolerance: f64,
    #[builder(default = 50)]
    pub attempts: u8,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            init_step_fraction: 0.1,
            min_step: 1e-10,
            tolerance: 1e-4,
            attempts: 50,
        }
    }
}

impl fmt::Display for IntegratorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "init_frac: {:e}, min_step: {:e}, tol: {:e}, attempts: {}",
            self.init_step_fraction, self.min_step, self.tolerance, self.attempts
        )
    }
}

/// Provides different methods for controlling the error computation of the
/// integrator.
pub trait ErrorControl
where
    Self: Sized,
{
    /// Computes the actual error of the current step, from the estimated
    /// error of the embedded pair, the candidate state and the current state.
    fn estimate(error_est: &DVector<f64>, candidate: &DVector<f64>, cur_state: &DVector<f64>) -> f64;
}

// This determines when to take into consideration the magnitude of the
// state_delta -- prevents dividing by too small of a number.
const REL_ERR_THRESH: f64 = 0.1;

/// An RSS step error control: the L2 norm of the error estimate, relative to
/// the step's state change when that change is large enough.
pub struct RssStep;

impl ErrorControl for RssStep {
    fn estimate(
        error_est: &DVector<f64>,
        candidate: &DVector<f64>,
        cur_state: &DVector<f64>,
    ) -> f64 {
        let mag = (candidate - cur_state).norm();
        let err = error_est.norm();
        if mag > REL_ERR_THRESH {
            err / mag
        } else {
            err
        }
    }
}

/// A largest error control which effectively computes the largest error at
/// each component.
pub struct LargestError;

impl ErrorControl for LargestError {
    fn estimate(
        error_est: &DVector<f64>,
        candidate: &DVector<f64>,
        cur_state: &DVector<f64>,
    ) -> f64 {
        let state_delta = candidate - cur_state;
        let mut max_err = 0.0;
        for (i, err_i) in error_est.iter().enumerate() {
            let err = if state_delta[i] > REL_ERR_THRESH {
                (err_i / state_delta[i]).abs()
            } else {
                err_i.abs()
            };
            if err > max_err {
                max_err = err;
            }
        }
        max_err
    }
}

/// Integration and discretization errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum IntegrationError {
    #[snafu(display("encountered a dynamics error: {source}"))]
    Dynamics { source: DynamicsError },
    #[snafu(display("integration span [{start}, {end}] is empty or reversed"))]
    EmptySpan { start: f64, end: f64 },
}
