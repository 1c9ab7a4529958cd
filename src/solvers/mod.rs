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

use snafu::Snafu;

mod clarabel;
pub use self::clarabel::ClarabelSolver;

/// One cone of the compiled problem, in row order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConeSpec {
    /// Equality rows: `A·x = b`.
    Zero(usize),
    /// Inequality rows: `A·x ≤ b`.
    Nonnegative(usize),
    /// A second-order cone of the given total dimension (bound row first).
    SecondOrder(usize),
}

/// A fully numeric second-order-cone program in the standard conic form
/// `minimize qᵀx subject to A·x + s = b, s ∈ K`, produced by evaluating a
/// compiled [`crate::program::ConicProgramModel`] against its current
/// parameter values.
#[derive(Clone, Debug)]
pub struct CompiledSocp {
    pub n_cols: usize,
    pub n_rows: usize,
    /// Linear objective coefficients, one per decision variable.
    pub objective: Vec<f64>,
    /// Constraint matrix entries as `(row, col, value)` triplets. Duplicate
    /// coordinates are summed by the backend.
    pub triplets: Vec<(usize, usize, f64)>,
    pub rhs: Vec<f64>,
    /// Cone layout covering all rows, in order.
    pub cones: Vec<ConeSpec>,
}

/// The primal solution returned by a backend.
#[derive(Clone, Debug)]
pub struct SocpSolution {
    pub x: Vec<f64>,
    pub objective: f64,
}

/// The convex solver capability the core consumes: accept a compiled conic
/// program, return a primal solution or a failure signal. The interior-point
/// internals stay behind this boundary.
pub trait SocpSolver: Send + Sync {
    fn solve(&self, problem: &CompiledSocp) -> Result<SocpSolution, SolverError>;
}

/// Backend failures. Infeasibility is not retried by the core; the virtual
/// control relaxation is the only resilience mechanism of the outer loop.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SolverError {
    /// The backend rejected the problem data.
    #[snafu(display("solver setup failed: {details}"))]
    Setup { details: String },
    /// The backend did not return a usable primal solution.
    #[snafu(display("solver terminated with status {status}"))]
    Failed { status: String },
}
