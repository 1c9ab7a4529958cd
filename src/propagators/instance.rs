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

use std::marker::PhantomData;

use snafu::ResultExt;

use super::{
    DormandPrince45, DynamicsSnafu, ErrorControl, IntegrationDetails, IntegrationError,
    IntegratorOptions, OdeSystem, RssStep, RK,
};
use crate::linalg::DVector;

/// An adaptive-step explicit Runge Kutta integrator over an [`OdeSystem`].
///
/// The stepper is monomorphized over a Butcher tableau [`RK`] and an
/// [`ErrorControl`]; the integration loop adapts the step from the embedded
/// error estimate until the tolerance is met or the attempt budget runs out.
#[derive(Clone, Debug)]
pub struct Integrator<'a, S: OdeSystem, E: ErrorControl = RssStep> {
    pub system: &'a S,
    pub opts: IntegratorOptions,
    order: u8,
    stages: usize,
    a_coeffs: &'static [f64],
    b_coeffs: &'static [f64],
    _error_ctrl: PhantomData<E>,
}

impl<'a, S: OdeSystem, E: ErrorControl> Integrator<'a, S, E> {
    /// Each integrator must be initialized with `new` which stores the tableau coefficients.
    pub fn new<T: RK>(system: &'a S, opts: IntegratorOptions) -> Self {
        Self {
            system,
            opts,
            order: T::ORDER,
            stages: T::STAGES,
            a_coeffs: T::A_COEFFS,
            b_coeffs: T::B_COEFFS,
            _error_ctrl: PhantomData,
        }
    }

    /// A Dormand Prince 5(4) integrator with the provided options.
    pub fn dormand_prince45(system: &'a S, opts: IntegratorOptions) -> Self {
        Self::new::<DormandPrince45>(system, opts)
    }

    /// Integrates the system from `start` to exactly `end`, adapting the step
    /// along the way. Returns the end state and the details of the last step.
    pub fn until(
        &self,
        initial: DVector<f64>,
        start: f64,
        end: f64,
    ) -> Result<(DVector<f64>, IntegrationDetails), IntegrationError> {
        if end <= start {
            return Err(IntegrationError::EmptySpan { start, end });
        }
        let span = end - start;
        let mut step_size = (span * self.opts.init_step_fraction).max(self.opts.min_step);
        let mut details = IntegrationDetails {
            step: step_size,
            error: 0.0,
            attempts: 1,
        };

        let mut t = start;
        let mut state = initial;
        let dim = self.system.dimension();
        let mut k = vec![DVector::<f64>::zeros(dim); self.stages];

        loop {
            if t + step_size >= end {
                // Take one final step of exactly the needed span.
                let final_step = end - t;
                let (next_state, _) = self.try_step(t, &state, final_step, true, &mut k)?;
                details.step = final_step;
                return Ok((next_state, details));
            }
            let (next_state, used_step) =
                self.adaptive_step(t, &state, &mut step_size, &mut details, &mut k)?;
            state = next_state;
            t += used_step;
        }
    }

    /// Integrates from `start` to `end` in `steps` uniform steps with the
    /// tableau's primary weights, skipping the embedded error control. This
    /// is how a fixed-step method such as [`super::RK4Fixed`] is driven.
    pub fn until_fixed(
        &self,
        initial: DVector<f64>,
        start: f64,
        end: f64,
        steps: usize,
    ) -> Result<DVector<f64>, IntegrationError> {
        if end <= start || steps == 0 {
            return Err(IntegrationError::EmptySpan { start, end });
        }
        let step = (end - start) / steps as f64;
        let dim = self.system.dimension();
        let mut k = vec![DVector::<f64>::zeros(dim); self.stages];
        let mut state = initial;
        for i in 0..steps {
            let t = start + i as f64 * step;
            let (next_state, _) = self.try_step(t, &state, step, true, &mut k)?;
            state = next_state;
        }
        Ok(state)
    }

    /// One adaptive step: retries with a smaller step until the error control
    /// accepts or the attempt budget is exhausted. Returns the accepted state
    /// and the step actually taken; `step_size` is left holding the proposal
    /// for the *next* step.
    fn adaptive_step(
        &self,
        t: f64,
        state: &DVector<f64>,
        step_size: &mut f64,
        details: &mut IntegrationDetails,
        k: &mut [DVector<f64>],
    ) -> Result<(DVector<f64>, f64), IntegrationError> {
        details.attempts = 1;
        let mut step = *step_size;
        loop {
            let (next_state, error_est) = self.try_step(t, state, step, false, k)?;
            details.error = E::estimate(&error_est, &next_state, state);
            if details.error <= self.opts.tolerance
                || step <= self.opts.min_step
                || details.attempts >= self.opts.attempts
            {
                if details.attempts >= self.opts.attempts {
                    warn!(
                        "Could not further decrease step size: maximum number of attempts reached ({})",
                        details.attempts
                    );
                }
                details.step = step;
                if details.error < self.opts.tolerance {
                    // Error is less than the tolerance: attempt to increase
                    // the step for the next iteration.
                    let proposed = 0.9
                        * step
                        * (self.opts.tolerance / details.error.max(f64::MIN_POSITIVE))
                            .powf(1.0 / f64::from(self.order));
                    *step_size = proposed;
                } else {
                    *step_size = step;
                }
                return Ok((next_state, step));
            }
            // Error is too high: shrink the step and try again.
            details.attempts += 1;
            let proposed = 0.9
                * step
                * (self.opts.tolerance / details.error).powf(1.0 / f64::from(self.order - 1));
            step = proposed.max(self.opts.min_step);
        }
    }

    /// Evaluates the tableau stages for one trial step. In adaptive mode the
    /// second return value is the embedded error estimate.
    fn try_step(
        &self,
        t: f64,
        state: &DVector<f64>,
        step: f64,
        fixed: bool,
        k: &mut [DVector<f64>],
    ) -> Result<(DVector<f64>, DVector<f64>), IntegrationError> {
        k[0] = self.system.eom(t, state).context(DynamicsSnafu)?;
        let mut a_idx: usize = 0;
        for i in 0..(self.stages - 1) {
            // Compute the c_i by summing the relevant items from the list of
            // coefficients: \sum_{j=1}^{i-1} a_ij ∀ i ∈ [2, s]
            let mut ci: f64 = 0.0;
            let mut wi = DVector::<f64>::zeros(state.nrows());
            for kj in &k[0..i + 1] {
                let a_ij = self.a_coeffs[a_idx];
                ci += a_ij;
                wi += a_ij * kj;
                a_idx += 1;
            }
            k[i + 1] = self
                .system
                .eom(t + ci * step, &(state + step * &wi))
                .context(DynamicsSnafu)?;
        }

        let mut next_state = state.clone();
        let mut error_est = DVector::<f64>::zeros(state.nrows());
        for (i, ki) in k.iter().enumerate() {
            let b_i = self.b_coeffs[i];
            if !fixed {
                let b_i_star = self.b_coeffs[i + self.stages];
                error_est += step * (b_i - b_i_star) * ki;
            }
            next_state += step * b_i * ki;
        }
        Ok((next_state, error_est))
    }
}
