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

/*! The outer successive convexification loop.

Each iteration linearizes the nonlinear dynamics about the current reference
trajectory, refreshes the coefficients of the compiled conic subproblem, and
adopts the subproblem's optimum as the next reference. Convergence is declared
when the virtual control has collapsed and the flight-time trust region is
inactive.
*/

use snafu::Snafu;

use crate::dynamics::DynamicsError;
use crate::program::ProgramError;
use crate::propagators::IntegrationError;

mod config;
pub use config::*;
mod subproblem;
pub use subproblem::*;
mod controller;
pub use controller::*;

/// Errors raised by the outer SCvx loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ScvxError {
    #[snafu(display("model failed to provide dynamics data: {source}"))]
    ModelDynamics { source: DynamicsError },
    #[snafu(display("segment discretization failed: {source}"))]
    Discretization { source: IntegrationError },
    #[snafu(display("convex subproblem failed: {source}"))]
    Subproblem { source: ProgramError },
    #[snafu(display("invalid configuration: {source}"))]
    Configuration { source: ConfigError },
}
