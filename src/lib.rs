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

/*! # scvx

Successive convexification (SCvx) guidance for powered descent: computes a
dynamically feasible, time-optimal trajectory by solving a sequence of
trust-region-limited convex approximations of the non-convex optimal control
problem.

The crate is organized around four layers:

- [`propagators`] integrates the nonlinear dynamics together with their
  sensitivity matrices to produce a discrete linearized transition model for
  each trajectory segment;
- [`program`] holds a parametric second-order-cone program whose structure is
  compiled once and whose numeric coefficients are refreshed every iteration;
- [`solvers`] abstracts the interior-point backend which solves the compiled
  subproblem;
- [`opti`] runs the outer SCvx loop: re-linearize, refresh, solve, adopt.

Vehicle models plug in through the [`dynamics::DescentModel`] trait.
*/

/// Vehicle dynamics models and the trait they implement.
pub mod dynamics;

/// Adaptive Runge-Kutta integration and segment discretization.
pub mod propagators;

/// Parametric conic program assembly: variables, affine expressions, cones.
pub mod program;

/// Second-order-cone solver backends.
pub mod solvers;

/// The outer successive convexification loop and its configuration.
pub mod opti;

#[macro_use]
extern crate log;
extern crate nalgebra as na;

/// Re-export nalgebra
pub mod linalg {
    pub use na::base::*;
}

pub use self::opti::{ScvxConfig, ScvxController, ScvxError, ScvxSolution};
