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

use super::ScvxConfig;
use crate::dynamics::DescentModel;
use crate::linalg::DMatrix;
use crate::program::{norm2, ConicProgramModel, Constraint, ParamId, Parameter, ProgramError};
use crate::propagators::DiscretizationResult;
use crate::solvers::SocpSolver;

/// Parameter slots of one trajectory segment's linearized transition model.
struct SegmentSlots {
    /// `n × n`, row-major.
    a_bar: Vec<ParamId>,
    /// `n × m`, row-major.
    b_bar: Vec<ParamId>,
    /// `n × m`, row-major.
    c_bar: Vec<ParamId>,
    sigma_bar: Vec<ParamId>,
    z_bar: Vec<ParamId>,
}

/// The convex subproblem solved at every SCvx iteration.
///
/// Decision variables:
///
/// - `X` (`n × K`) and `U` (`m × K`), the state and control samples;
/// - `sigma`, the total flight time;
/// - `nu` (`n × K-1`) and `norm2_nu`, the virtual control slack on each
///   dynamics defect row and its norm;
/// - `delta_sigma` and `delta_xu` (`K`), the trust region radii.
///
/// The structure is compiled once at construction. [`Subproblem::update`]
/// rewrites the linearization and reference slots between solves, so
/// successive iterations reuse the same sparsity and cone layout.
pub struct Subproblem {
    program: ConicProgramModel,
    n: usize,
    m: usize,
    k: usize,
    segments: Vec<SegmentSlots>,
    /// Reference states, `n × K` row-major.
    x_ref: Vec<ParamId>,
    /// Reference controls, `m × K` row-major.
    u_ref: Vec<ParamId>,
    sigma_ref: ParamId,
}

impl Subproblem {
    /// Declares the variables, allocates the parameter slots, lays down every
    /// constraint of the descent subproblem and compiles the structure.
    pub fn new(model: &dyn DescentModel, config: &ScvxConfig) -> Result<Self, ProgramError> {
        let (n, m, k) = (model.n_states(), model.n_inputs(), config.k);
        let mut program = ConicProgramModel::new();

        program.declare_variable("X", &[n, k])?;
        program.declare_variable("U", &[m, k])?;
        program.declare_variable("sigma", &[])?;
        program.declare_variable("nu", &[n, k - 1])?;
        program.declare_variable("norm2_nu", &[])?;
        program.declare_variable("delta_sigma", &[])?;
        program.declare_variable("delta_xu", &[k])?;

        let segments = (0..k - 1)
            .map(|_| SegmentSlots {
                a_bar: (0..n * n).map(|_| program.new_param(0.0)).collect(),
                b_bar: (0..n * m).map(|_| program.new_param(0.0)).collect(),
                c_bar: (0..n * m).map(|_| program.new_param(0.0)).collect(),
                sigma_bar: (0..n).map(|_| program.new_param(0.0)).collect(),
                z_bar: (0..n).map(|_| program.new_param(0.0)).collect(),
            })
            .collect::<Vec<_>>();
        let x_ref: Vec<ParamId> = (0..n * k).map(|_| program.new_param(0.0)).collect();
        let u_ref: Vec<ParamId> = (0..m * k).map(|_| program.new_param(0.0)).collect();
        let sigma_ref = program.new_param(0.0);

        let sigma = program.variable_ref("sigma", &[])?;
        let norm2_nu = program.variable_ref("norm2_nu", &[])?;
        let delta_sigma = program.variable_ref("delta_sigma", &[])?;

        // Free-final-time objective plus the relaxation penalties.
        program.add_objective_term(1.0, 1.0 * sigma)?;
        program.add_objective_term(config.weight_virtual_control, 1.0 * norm2_nu)?;
        program.add_objective_term(config.weight_trust_region_sigma, 1.0 * delta_sigma)?;
        for j in 0..k {
            let radius = program.variable_ref("delta_xu", &[j])?;
            program.add_objective_term(config.weight_trust_region_xu, 1.0 * radius)?;
        }

        // Linearized dynamics defects, one equality per state row per
        // segment, each carrying its virtual control slack:
        // x(k+1) = A̅·x(k) + B̅·u(k) + C̅·u(k+1) + Σ̅·σ + z̅ + ν(k)
        for (seg, slots) in segments.iter().enumerate() {
            for i in 0..n {
                let mut expr = (-1.0) * program.variable_ref("X", &[i, seg + 1])?;
                for j in 0..n {
                    let x_j = program.variable_ref("X", &[j, seg])?;
                    expr = expr + Parameter::Slot(slots.a_bar[i * n + j]) * x_j;
                }
                for j in 0..m {
                    let u_j = program.variable_ref("U", &[j, seg])?;
                    expr = expr + Parameter::Slot(slots.b_bar[i * m + j]) * u_j;
                    let u_j1 = program.variable_ref("U", &[j, seg + 1])?;
                    expr = expr + Parameter::Slot(slots.c_bar[i * m + j]) * u_j1;
                }
                expr = expr + Parameter::Slot(slots.sigma_bar[i]) * sigma;
                expr = expr + 1.0 * program.variable_ref("nu", &[i, seg])?;
                expr = expr + Parameter::Slot(slots.z_bar[i]);
                program.add_constraint(Constraint::eq_zero(expr))?;
            }
        }

        // The virtual control norm, bounding every slack component at once.
        let mut nu_terms = Vec::with_capacity(n * (k - 1));
        for seg in 0..k - 1 {
            for i in 0..n {
                nu_terms.push(1.0 * program.variable_ref("nu", &[i, seg])?);
            }
        }
        program.add_constraint(norm2(nu_terms).le(1.0 * norm2_nu))?;

        // Flight-time trust region, (σ - σ₀)² ≤ Δσ, as the second-order cone
        //   ‖(-σ₀·σ - Δσ/2 + (1 + σ₀²)/2, σ)‖ ≤ σ₀·σ + Δσ/2 + (1 - σ₀²)/2
        // where σ₀ is the reference flight time slot.
        let sr = sigma_ref;
        let head = Parameter::derived(move |t| -t[sr.0]) * sigma
            + (-0.5) * delta_sigma
            + Parameter::derived(move |t| 0.5 * (1.0 + t[sr.0] * t[sr.0]));
        let bound = Parameter::Slot(sr) * sigma
            + 0.5 * delta_sigma
            + Parameter::derived(move |t| 0.5 * (1.0 - t[sr.0] * t[sr.0]));
        program.add_constraint(norm2(vec![head, 1.0 * sigma]).le(bound))?;

        // State/control trust region about the reference iterate, one radius
        // per sample.
        for j in 0..k {
            let mut terms = Vec::with_capacity(n + m);
            for i in 0..n {
                let x_ij = program.variable_ref("X", &[i, j])?;
                terms.push(1.0 * x_ij + Parameter::negated_slot(x_ref[i * k + j]));
            }
            for i in 0..m {
                let u_ij = program.variable_ref("U", &[i, j])?;
                terms.push(1.0 * u_ij + Parameter::negated_slot(u_ref[i * k + j]));
            }
            let radius = program.variable_ref("delta_xu", &[j])?;
            program.add_constraint(norm2(terms).le(1.0 * radius))?;
        }

        model.add_application_constraints(&mut program, k)?;
        program.compile()?;

        Ok(Self {
            program,
            n,
            m,
            k,
            segments,
            x_ref,
            u_ref,
            sigma_ref,
        })
    }

    /// Rewrites the linearization and reference slots ahead of the next
    /// solve. `discretization` holds the `K-1` segment transition models
    /// about the reference trajectory `(states, controls, sigma)`.
    pub fn update(
        &mut self,
        discretization: &[DiscretizationResult],
        states: &DMatrix<f64>,
        controls: &DMatrix<f64>,
        sigma: f64,
    ) -> Result<(), ProgramError> {
        let (n, m, k) = (self.n, self.m, self.k);
        for (seg, result) in discretization.iter().enumerate() {
            let slots = &self.segments[seg];
            for i in 0..n {
                for j in 0..n {
                    self.program
                        .set_param(slots.a_bar[i * n + j], result.a_bar[(i, j)])?;
                }
                for j in 0..m {
                    self.program
                        .set_param(slots.b_bar[i * m + j], result.b_bar[(i, j)])?;
                    self.program
                        .set_param(slots.c_bar[i * m + j], result.c_bar[(i, j)])?;
                }
                self.program.set_param(slots.sigma_bar[i], result.sigma_bar[i])?;
                self.program.set_param(slots.z_bar[i], result.z_bar[i])?;
            }
        }
        for j in 0..k {
            for i in 0..n {
                self.program.set_param(self.x_ref[i * k + j], states[(i, j)])?;
            }
            for i in 0..m {
                self.program
                    .set_param(self.u_ref[i * k + j], controls[(i, j)])?;
            }
        }
        self.program.set_param(self.sigma_ref, sigma)?;
        Ok(())
    }

    /// Solves the subproblem with the current coefficients, returning the
    /// objective value.
    pub fn solve(&mut self, solver: &dyn SocpSolver) -> Result<f64, ProgramError> {
        self.program.solve(solver)
    }

    /// The optimal state samples of the latest solve, `n × K`.
    pub fn states(&self) -> Result<DMatrix<f64>, ProgramError> {
        let mut states = DMatrix::zeros(self.n, self.k);
        for j in 0..self.k {
            for i in 0..self.n {
                states[(i, j)] = self.program.value_of("X", &[i, j])?;
            }
        }
        Ok(states)
    }

    /// The optimal control samples of the latest solve, `m × K`.
    pub fn controls(&self) -> Result<DMatrix<f64>, ProgramError> {
        let mut controls = DMatrix::zeros(self.m, self.k);
        for j in 0..self.k {
            for i in 0..self.m {
                controls[(i, j)] = self.program.value_of("U", &[i, j])?;
            }
        }
        Ok(controls)
    }

    /// The optimal total flight time of the latest solve.
    pub fn sigma(&self) -> Result<f64, ProgramError> {
        self.program.value_of("sigma", &[])
    }

    /// The virtual control norm of the latest solve.
    pub fn virtual_control_norm(&self) -> Result<f64, ProgramError> {
        self.program.value_of("norm2_nu", &[])
    }

    /// The flight-time trust region radius of the latest solve.
    pub fn sigma_trust_region(&self) -> Result<f64, ProgramError> {
        self.program.value_of("delta_sigma", &[])
    }
}
