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

use std::collections::HashMap;

use snafu::ResultExt;

use super::expr::{AffineExpression, Constraint, ParamId, Parameter, VariableRef};
use super::{ProgramError, SolverFailureSnafu};
use crate::solvers::{CompiledSocp, ConeSpec, SocpSolver};

#[derive(Clone, Debug)]
struct VariableDef {
    shape: Vec<usize>,
    offset: usize,
    len: usize,
}

#[derive(Clone, Debug)]
struct RowEntry {
    col: usize,
    scale: f64,
    param: Parameter,
}

/// One row of the conic constraint block `A·x + s = b`, with symbolic
/// coefficients. `scale` carries the sign flips introduced when mapping
/// constraints onto the cone form, so the user-facing [`Parameter`]s are
/// stored untouched and re-evaluated at every solve.
#[derive(Clone, Debug)]
struct Row {
    entries: Vec<RowEntry>,
    rhs: Vec<(f64, Parameter)>,
}

#[derive(Clone, Debug)]
struct Structure {
    rows: Vec<Row>,
    cones: Vec<ConeSpec>,
}

/// A parametric second-order-cone program.
///
/// The model separates *structure* from *values*: variables, constraints and
/// objective terms are declared once and frozen by [`ConicProgramModel::compile`],
/// while the numeric coefficients bound through [`Parameter`] slots are
/// re-evaluated on every [`ConicProgramModel::solve`]. The outer SCvx loop
/// relies on this split to refresh the linearization each iteration without
/// re-deriving sparsity or cone layout.
#[derive(Default)]
pub struct ConicProgramModel {
    variables: HashMap<String, VariableDef>,
    n_cols: usize,
    params: Vec<f64>,
    constraints: Vec<Constraint>,
    objective: Vec<(f64, AffineExpression)>,
    structure: Option<Structure>,
    solution: Option<Vec<f64>>,
}

impl ConicProgramModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scalar decision variables declared so far.
    pub fn n_variables(&self) -> usize {
        self.n_cols
    }

    /// Registers a tensor-shaped decision variable. A scalar is declared with
    /// an empty shape.
    pub fn declare_variable(&mut self, name: &str, shape: &[usize]) -> Result<(), ProgramError> {
        if self.structure.is_some() {
            return Err(ProgramError::StructureFrozen {
                action: "declare a variable",
            });
        }
        if self.variables.contains_key(name) {
            return Err(ProgramError::DuplicateVariable { name: name.into() });
        }
        let len = shape.iter().product::<usize>().max(1);
        self.variables.insert(
            name.into(),
            VariableDef {
                shape: shape.to_vec(),
                offset: self.n_cols,
                len,
            },
        );
        self.n_cols += len;
        Ok(())
    }

    /// Returns a handle to one scalar component of a declared variable.
    pub fn variable_ref(&self, name: &str, indices: &[usize]) -> Result<VariableRef, ProgramError> {
        let def = self
            .variables
            .get(name)
            .ok_or_else(|| ProgramError::UnknownVariable { name: name.into() })?;
        if indices.len() != def.shape.len() {
            return Err(ProgramError::IndexOutOfBounds {
                name: name.into(),
                indices: indices.to_vec(),
                shape: def.shape.clone(),
            });
        }
        // Row-major flattening over the declared shape.
        let mut flat = 0;
        for (&idx, &extent) in indices.iter().zip(def.shape.iter()) {
            if idx >= extent {
                return Err(ProgramError::IndexOutOfBounds {
                    name: name.into(),
                    indices: indices.to_vec(),
                    shape: def.shape.clone(),
                });
            }
            flat = flat * extent + idx;
        }
        Ok(VariableRef {
            index: def.offset + flat,
        })
    }

    /// Allocates a live parameter slot, returning its identifier.
    pub fn new_param(&mut self, value: f64) -> ParamId {
        self.params.push(value);
        ParamId(self.params.len() - 1)
    }

    /// Updates the value of a parameter slot. Must not be called while a
    /// solve is in flight; the outer loop refreshes all slots strictly
    /// between solves.
    pub fn set_param(&mut self, id: ParamId, value: f64) -> Result<(), ProgramError> {
        match self.params.get_mut(id.0) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ProgramError::UnknownParameter { id: id.0 }),
        }
    }

    /// Records a constraint. Fails once the structure is compiled.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<(), ProgramError> {
        if self.structure.is_some() {
            return Err(ProgramError::StructureFrozen {
                action: "add a constraint",
            });
        }
        self.constraints.push(constraint);
        Ok(())
    }

    /// Accumulates `weight · expr` into the minimization objective.
    pub fn add_objective_term<E: Into<AffineExpression>>(
        &mut self,
        weight: f64,
        expr: E,
    ) -> Result<(), ProgramError> {
        if self.structure.is_some() {
            return Err(ProgramError::StructureFrozen {
                action: "add an objective term",
            });
        }
        self.objective.push((weight, expr.into()));
        Ok(())
    }

    /// Freezes the structure: partitions the constraints into the cone order
    /// the backend expects (zero cone, nonnegative cone, then one
    /// second-order cone per norm constraint) and lays out the symbolic
    /// coefficient rows. Calling twice is an error.
    pub fn compile(&mut self) -> Result<(), ProgramError> {
        if self.structure.is_some() {
            return Err(ProgramError::AlreadyCompiled);
        }

        let mut eq_rows = Vec::new();
        let mut ineq_rows = Vec::new();
        let mut soc_blocks: Vec<Vec<Row>> = Vec::new();

        for constraint in self.constraints.drain(..) {
            match constraint {
                // expr == 0  ⇒  A = l, b = -c  with expr = l·x + c
                Constraint::Equality { expr } => eq_rows.push(Self::row_from(&expr, 1.0, -1.0)),
                // expr <= 0  ⇒  A·x ≤ b with the same mapping
                Constraint::LessEqualZero { expr } => {
                    ineq_rows.push(Self::row_from(&expr, 1.0, -1.0))
                }
                // ‖terms‖ ≤ bound  ⇒  s = b - A·x stacks [bound; terms]
                Constraint::SecondOrderCone { terms, bound } => {
                    let mut block = Vec::with_capacity(terms.len() + 1);
                    block.push(Self::row_from(&bound, -1.0, 1.0));
                    for term in &terms {
                        block.push(Self::row_from(term, -1.0, 1.0));
                    }
                    soc_blocks.push(block);
                }
            }
        }

        let mut cones = Vec::new();
        if !eq_rows.is_empty() {
            cones.push(ConeSpec::Zero(eq_rows.len()));
        }
        if !ineq_rows.is_empty() {
            cones.push(ConeSpec::Nonnegative(ineq_rows.len()));
        }

        let mut rows = eq_rows;
        rows.append(&mut ineq_rows);
        for mut block in soc_blocks {
            cones.push(ConeSpec::SecondOrder(block.len()));
            rows.append(&mut block);
        }

        debug!(
            "compiled program structure: {} variables, {} rows, {} cones",
            self.n_cols,
            rows.len(),
            cones.len()
        );

        self.structure = Some(Structure { rows, cones });
        Ok(())
    }

    fn row_from(expr: &AffineExpression, entry_scale: f64, rhs_scale: f64) -> Row {
        Row {
            entries: expr
                .terms
                .iter()
                .map(|term| RowEntry {
                    col: term.var,
                    scale: entry_scale,
                    param: term.coeff.clone(),
                })
                .collect(),
            rhs: expr
                .constants
                .iter()
                .map(|p| (rhs_scale, p.clone()))
                .collect(),
        }
    }

    /// Evaluates all parameters against the current value table, assembles
    /// the numeric conic problem and delegates to the solver capability. On
    /// success the solution values become readable and the objective value is
    /// returned.
    pub fn solve(&mut self, solver: &dyn SocpSolver) -> Result<f64, ProgramError> {
        let structure = self.structure.as_ref().ok_or(ProgramError::NotCompiled)?;

        let table = &self.params;
        let mut objective = vec![0.0; self.n_cols];
        for (weight, expr) in &self.objective {
            for term in &expr.terms {
                objective[term.var] += weight * term.coeff.evaluate(table);
            }
        }

        let mut triplets = Vec::new();
        let mut rhs = Vec::with_capacity(structure.rows.len());
        for (row_index, row) in structure.rows.iter().enumerate() {
            for entry in &row.entries {
                triplets.push((row_index, entry.col, entry.scale * entry.param.evaluate(table)));
            }
            rhs.push(
                row.rhs
                    .iter()
                    .map(|(scale, p)| scale * p.evaluate(table))
                    .sum(),
            );
        }

        let problem = CompiledSocp {
            n_cols: self.n_cols,
            n_rows: structure.rows.len(),
            objective,
            triplets,
            rhs,
            cones: structure.cones.clone(),
        };

        let solution = solver.solve(&problem).context(SolverFailureSnafu)?;
        let objective_value = solution.objective;
        self.solution = Some(solution.x);
        Ok(objective_value)
    }

    /// Reads the value assigned to a variable component by the most recent
    /// successful solve.
    pub fn solution_value(&self, var: VariableRef) -> Result<f64, ProgramError> {
        match &self.solution {
            Some(x) => Ok(x[var.index]),
            None => Err(ProgramError::SolutionUnavailable),
        }
    }

    /// Convenience lookup by name and indices.
    pub fn value_of(&self, name: &str, indices: &[usize]) -> Result<f64, ProgramError> {
        let var = self.variable_ref(name, indices)?;
        self.solution_value(var)
    }
}
