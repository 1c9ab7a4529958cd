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

use crate::solvers::SolverError;

mod expr;
pub use expr::{norm2, AffineExpression, Constraint, Norm2, ParamId, Parameter, VariableRef};

mod model;
pub use model::ConicProgramModel;

/// Errors of the parametric conic program layer. All structural misuse fails
/// fast with a distinct variant; nothing is reported lazily or silently.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProgramError {
    /// A variable with that name already exists.
    #[snafu(display("variable `{name}` is already declared"))]
    DuplicateVariable { name: String },
    /// Referenced variable was never declared.
    #[snafu(display("variable `{name}` is not declared"))]
    UnknownVariable { name: String },
    /// Component indices do not match the declared shape.
    #[snafu(display("indices {indices:?} out of range for `{name}` of shape {shape:?}"))]
    IndexOutOfBounds {
        name: String,
        indices: Vec<usize>,
        shape: Vec<usize>,
    },
    /// Structure cannot change after compilation.
    #[snafu(display("cannot {action}: the program structure is compiled"))]
    StructureFrozen { action: &'static str },
    /// `compile()` was called twice.
    #[snafu(display("the program structure is already compiled"))]
    AlreadyCompiled,
    /// `solve()` requires a compiled structure.
    #[snafu(display("the program structure was never compiled"))]
    NotCompiled,
    /// `solution_value()` before any successful solve.
    #[snafu(display("no solution available: the program was never solved successfully"))]
    SolutionUnavailable,
    /// A parameter slot identifier that was never allocated.
    #[snafu(display("parameter slot {id} was never allocated"))]
    UnknownParameter { id: usize },
    /// The solver backend reported a failure for the current subproblem.
    #[snafu(display("conic solve failed: {source}"))]
    SolverFailure { source: SolverError },
}
