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
use std::time::Instant;

use snafu::ResultExt;

use super::{
    ConfigurationSnafu, DiscretizationSnafu, ModelDynamicsSnafu, ScvxConfig, ScvxError,
    Subproblem, SubproblemSnafu,
};
use crate::dynamics::DescentModel;
use crate::linalg::DMatrix;
use crate::propagators::Discretizer;
use crate::solvers::SocpSolver;

/// A full reference trajectory: the state and control samples plus the total
/// flight time. Each iteration replaces the iterate wholesale with the
/// subproblem's optimum.
#[derive(Clone, Debug)]
pub struct ScvxIterate {
    /// State samples, `n_states × K`.
    pub states: DMatrix<f64>,
    /// Control samples, `n_inputs × K`.
    pub controls: DMatrix<f64>,
    /// Total flight time, in seconds.
    pub sigma: f64,
}

/// Per-iteration diagnostics of the outer loop.
#[derive(Clone, Debug)]
pub struct IterationSummary {
    pub iteration: usize,
    /// Subproblem objective value.
    pub objective: f64,
    pub sigma: f64,
    /// Virtual control norm: how much slack the linearization needed.
    pub virtual_control_norm: f64,
    /// Flight-time trust region radius.
    pub sigma_trust_region: f64,
    /// Wall clock time spent in discretization.
    pub discretization_ms: f64,
    /// Wall clock time spent in the conic solve.
    pub solve_ms: f64,
}

impl fmt::Display for IterationSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "iter {}: sigma = {:.6}, |nu| = {:.3e}, delta_sigma = {:.3e}, discretized in {:.1} ms, solved in {:.1} ms",
            self.iteration,
            self.sigma,
            self.virtual_control_norm,
            self.sigma_trust_region,
            self.discretization_ms,
            self.solve_ms
        )
    }
}

/// Why the outer loop stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScvxTermination {
    /// Both convergence thresholds were met.
    Converged { iterations: usize },
    /// The iteration budget ran out before convergence.
    IterationLimitReached,
}

/// The converged (or best-effort) trajectory and the iteration history.
#[derive(Clone, Debug)]
pub struct ScvxSolution {
    pub iterate: ScvxIterate,
    pub termination: ScvxTermination,
    pub history: Vec<IterationSummary>,
}

impl ScvxSolution {
    /// Whether the loop stopped because the convergence thresholds were met.
    pub fn converged(&self) -> bool {
        matches!(self.termination, ScvxTermination::Converged { .. })
    }
}

/// Drives the outer successive convexification loop for one vehicle model.
///
/// Each iteration discretizes the nonlinear dynamics about the current
/// iterate, refreshes the compiled subproblem's coefficients, solves it, and
/// adopts the optimum as the next iterate. The loop converges when the
/// virtual control norm and the flight-time trust region radius both drop
/// below their thresholds.
pub struct ScvxController<'a, M: DescentModel> {
    model: &'a M,
    config: ScvxConfig,
}

impl<'a, M: DescentModel> ScvxController<'a, M> {
    pub fn new(model: &'a M, config: ScvxConfig) -> Self {
        Self { model, config }
    }

    /// Runs the loop to convergence or to the iteration budget.
    pub fn run(&self, solver: &dyn SocpSolver) -> Result<ScvxSolution, ScvxError> {
        self.config.validate().context(ConfigurationSnafu)?;
        let k = self.config.k;

        let (mut states, mut controls) =
            self.model.initialize(k).context(ModelDynamicsSnafu)?;
        let mut sigma = self.model.total_time_guess();

        info!(
            "SCvx: {} samples, {} iterations max, initial sigma = {:.4}",
            k, self.config.iterations, sigma
        );

        let discretizer = Discretizer::new(k, self.config.integrator);
        let mut subproblem =
            Subproblem::new(self.model, &self.config).context(SubproblemSnafu)?;

        let mut history = Vec::with_capacity(self.config.iterations);
        let mut termination = ScvxTermination::IterationLimitReached;

        for iteration in 1..=self.config.iterations {
            let disc_start = Instant::now();
            let results = discretizer
                .all_segments(self.model, &states, &controls, sigma)
                .context(DiscretizationSnafu)?;
            let discretization_ms = disc_start.elapsed().as_secs_f64() * 1e3;

            subproblem
                .update(&results, &states, &controls, sigma)
                .context(SubproblemSnafu)?;

            let solve_start = Instant::now();
            let objective = subproblem.solve(solver).context(SubproblemSnafu)?;
            let solve_ms = solve_start.elapsed().as_secs_f64() * 1e3;

            states = subproblem.states().context(SubproblemSnafu)?;
            controls = subproblem.controls().context(SubproblemSnafu)?;
            sigma = subproblem.sigma().context(SubproblemSnafu)?;
            let virtual_control_norm = subproblem
                .virtual_control_norm()
                .context(SubproblemSnafu)?;
            let sigma_trust_region = subproblem
                .sigma_trust_region()
                .context(SubproblemSnafu)?;

            let summary = IterationSummary {
                iteration,
                objective,
                sigma,
                virtual_control_norm,
                sigma_trust_region,
                discretization_ms,
                solve_ms,
            };
            info!("{summary}");
            history.push(summary);

            if virtual_control_norm < self.config.tol_virtual_control
                && sigma_trust_region < self.config.tol_trust_region_sigma
            {
                info!("SCvx converged in {iteration} iterations");
                termination = ScvxTermination::Converged {
                    iterations: iteration,
                };
                break;
            }
        }

        if termination == ScvxTermination::IterationLimitReached {
            warn!(
                "SCvx did not converge within {} iterations",
                self.config.iterations
            );
        }

        Ok(ScvxSolution {
            iterate: ScvxIterate {
                states,
                controls,
                sigma,
            },
            termination,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamics::DoubleIntegrator;
    use crate::solvers::ClarabelSolver;
    use approx::assert_abs_diff_eq;

    #[test]
    fn double_integrator_converges() {
        let model = DoubleIntegrator::default();
        let config = ScvxConfig::builder().k(15).iterations(10).build();
        let controller = ScvxController::new(&model, config);
        let solution = controller.run(&ClarabelSolver::default()).unwrap();

        assert!(solution.converged());
        let iterate = &solution.iterate;
        assert!(iterate.sigma >= model.t_min - 1e-6);
        assert_abs_diff_eq!(iterate.states[(0, 0)], 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(iterate.states[(0, 14)], 0.0, epsilon = 1e-5);
        assert!(!solution.history.is_empty());
    }

    #[test]
    fn invalid_configuration_is_reported() {
        let model = DoubleIntegrator::default();
        let config = ScvxConfig::builder().k(1).build();
        let controller = ScvxController::new(&model, config);
        assert!(matches!(
            controller.run(&ClarabelSolver::default()),
            Err(ScvxError::Configuration { .. })
        ));
    }
}
