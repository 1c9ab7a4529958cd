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

use std::collections::BTreeMap;

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus,
    SupportedConeT::{NonnegativeConeT, SecondOrderConeT, ZeroConeT},
};

use super::{CompiledSocp, ConeSpec, SocpSolution, SocpSolver, SolverError};

/// Clarabel interior-point backend.
///
/// Clarabel is a pure-Rust conic solver; a linear objective is passed with a
/// zero quadratic term.
#[derive(Clone, Debug)]
pub struct ClarabelSolver {
    pub max_iter: u32,
    pub verbose: bool,
    /// Absolute and relative duality gap tolerance, also used for the
    /// feasibility tolerance.
    pub tolerance: f64,
}

impl Default for ClarabelSolver {
    fn default() -> Self {
        Self {
            max_iter: 200,
            verbose: false,
            tolerance: 1e-8,
        }
    }
}

impl SocpSolver for ClarabelSolver {
    fn solve(&self, problem: &CompiledSocp) -> Result<SocpSolution, SolverError> {
        // Clarabel wants column-compressed storage with unique coordinates.
        let mut entries: BTreeMap<(usize, usize), f64> = BTreeMap::new();
        for &(row, col, value) in &problem.triplets {
            *entries.entry((col, row)).or_insert(0.0) += value;
        }

        let mut colptr = vec![0usize; problem.n_cols + 1];
        let mut rowval = Vec::with_capacity(entries.len());
        let mut nzval = Vec::with_capacity(entries.len());
        for (&(col, row), &value) in &entries {
            rowval.push(row);
            nzval.push(value);
            colptr[col + 1] = rowval.len();
        }
        // Forward-fill the column pointers of empty columns.
        for col in 1..=problem.n_cols {
            if colptr[col] < colptr[col - 1] {
                colptr[col] = colptr[col - 1];
            }
        }
        let a = CscMatrix::new(problem.n_rows, problem.n_cols, colptr, rowval, nzval);

        // No quadratic cost: P is the empty upper triangle.
        let p = CscMatrix::new(
            problem.n_cols,
            problem.n_cols,
            vec![0; problem.n_cols + 1],
            vec![],
            vec![],
        );

        let cones: Vec<_> = problem
            .cones
            .iter()
            .map(|cone| match *cone {
                ConeSpec::Zero(n) => ZeroConeT(n),
                ConeSpec::Nonnegative(n) => NonnegativeConeT(n),
                ConeSpec::SecondOrder(n) => SecondOrderConeT(n),
            })
            .collect();

        let mut settings = DefaultSettings::<f64>::default();
        settings.max_iter = self.max_iter;
        settings.verbose = self.verbose;
        settings.tol_gap_abs = self.tolerance;
        settings.tol_gap_rel = self.tolerance;
        settings.tol_feas = self.tolerance;

        let mut solver = DefaultSolver::new(
            &p,
            &problem.objective,
            &a,
            &problem.rhs,
            &cones,
            settings,
        )
        .map_err(|e| SolverError::Setup {
            details: format!("{e:?}"),
        })?;

        solver.solve();

        let solution = &solver.solution;
        match solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(SocpSolution {
                x: solution.x.clone(),
                objective: solution.obj_val,
            }),
            status => Err(SolverError::Failed {
                status: format!("{status:?}"),
            }),
        }
    }
}
