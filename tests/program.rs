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
use scvx::program::{norm2, ConicProgramModel, Constraint, Parameter, ProgramError};
use scvx::solvers::ClarabelSolver;

#[test]
fn compile_once_solve_twice() {
    // The structure is compiled once; only the parameter slot changes
    // between the two solves.
    let mut model = ConicProgramModel::new();
    model.declare_variable("x", &[]).unwrap();
    let x = model.variable_ref("x", &[]).unwrap();
    let lower = model.new_param(1.0);

    // x >= lower, minimize x.
    model
        .add_constraint(Constraint::le_zero(
            (-1.0) * x + Parameter::Slot(lower),
        ))
        .unwrap();
    model.add_objective_term(1.0, 1.0 * x).unwrap();
    model.compile().unwrap();

    let solver = ClarabelSolver::default();
    model.solve(&solver).unwrap();
    assert_abs_diff_eq!(model.value_of("x", &[]).unwrap(), 1.0, epsilon = 1e-6);

    model.set_param(lower, 3.0).unwrap();
    model.solve(&solver).unwrap();
    assert_abs_diff_eq!(model.value_of("x", &[]).unwrap(), 3.0, epsilon = 1e-6);
}

#[test]
fn quadratic_trust_region_via_second_order_cone() {
    // The cone reformulation of (sigma - sigma0)^2 <= delta: with sigma
    // pinned and delta minimized, the optimum must be the squared distance
    // to the reference.
    let sigma0 = 2.0;
    let sigma_pin = 2.5;

    let mut model = ConicProgramModel::new();
    model.declare_variable("sigma", &[]).unwrap();
    model.declare_variable("delta", &[]).unwrap();
    let sigma = model.variable_ref("sigma", &[]).unwrap();
    let delta = model.variable_ref("delta", &[]).unwrap();

    let head =
        (-sigma0) * sigma + (-0.5) * delta + Parameter::Constant(0.5 * (1.0 + sigma0 * sigma0));
    let bound =
        sigma0 * sigma + 0.5 * delta + Parameter::Constant(0.5 * (1.0 - sigma0 * sigma0));
    model
        .add_constraint(norm2(vec![head, 1.0 * sigma]).le(bound))
        .unwrap();
    model
        .add_constraint(Constraint::eq_zero(1.0 * sigma + (-sigma_pin)))
        .unwrap();
    model.add_objective_term(1.0, 1.0 * delta).unwrap();
    model.compile().unwrap();

    model.solve(&ClarabelSolver::default()).unwrap();
    let expected = (sigma_pin - sigma0) * (sigma_pin - sigma0);
    assert_abs_diff_eq!(
        model.value_of("delta", &[]).unwrap(),
        expected,
        epsilon = 1e-5
    );
}

#[test]
fn solve_requires_compilation() {
    let mut model = ConicProgramModel::new();
    model.declare_variable("x", &[]).unwrap();
    assert!(matches!(
        model.solve(&ClarabelSolver::default()),
        Err(ProgramError::NotCompiled)
    ));
}

#[test]
fn infeasible_subproblem_reported_as_solver_failure() {
    let mut model = ConicProgramModel::new();
    model.declare_variable("x", &[]).unwrap();
    let x = model.variable_ref("x", &[]).unwrap();
    model
        .add_constraint(Constraint::eq_zero(1.0 * x + (-1.0)))
        .unwrap();
    model
        .add_constraint(Constraint::eq_zero(1.0 * x + 1.0))
        .unwrap();
    model.add_objective_term(1.0, 1.0 * x).unwrap();
    model.compile().unwrap();

    assert!(matches!(
        model.solve(&ClarabelSolver::default()),
        Err(ProgramError::SolverFailure { .. })
    ));
}
