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
use std::ops::{Add, Mul};
use std::sync::Arc;

/// Identifier of a live parameter slot in a [`super::ConicProgramModel`]'s
/// value table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ParamId(pub(crate) usize);

/// A numeric coefficient of the convex program.
///
/// Parameters are re-read from the model's value table every time the program
/// is evaluated for a solve, so the outer loop can refresh all linearization
/// coefficients without touching the compiled structure.
#[derive(Clone)]
pub enum Parameter {
    /// A fixed value, baked in at construction.
    Constant(f64),
    /// Read from the value table at evaluation time.
    Slot(ParamId),
    /// Computed from the value table at evaluation time. Used for
    /// coefficients derived from other parameters, e.g. the trust region
    /// terms built from the reference sigma.
    Derived(Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>),
}

impl Parameter {
    /// Builds a derived parameter from a function of the value table.
    pub fn derived<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Self::Derived(Arc::new(f))
    }

    /// A parameter evaluating to the negated value of the provided slot.
    pub fn negated_slot(id: ParamId) -> Self {
        Self::derived(move |table| -table[id.0])
    }

    /// Evaluates this parameter against the current value table.
    pub fn evaluate(&self, table: &[f64]) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Slot(id) => table[id.0],
            Self::Derived(f) => f(table),
        }
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Self::Constant(value)
    }
}

impl From<ParamId> for Parameter {
    fn from(id: ParamId) -> Self {
        Self::Slot(id)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "Constant({value})"),
            Self::Slot(id) => write!(f, "Slot({})", id.0),
            Self::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

/// Handle to one scalar component of a declared tensor variable.
///
/// The index is the component's column in the flat decision vector, fixed at
/// declaration time.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VariableRef {
    pub(crate) index: usize,
}

/// One `parameter × variable` product.
#[derive(Clone, Debug)]
pub struct AffineTerm {
    pub(crate) coeff: Parameter,
    pub(crate) var: usize,
}

/// A weighted sum of variables plus parameter constants. Immutable once
/// constructed; building happens through the `+` and `*` operators.
#[derive(Clone, Debug, Default)]
pub struct AffineExpression {
    pub(crate) terms: Vec<AffineTerm>,
    pub(crate) constants: Vec<Parameter>,
}

impl AffineExpression {
    /// Evaluates the constant part against the current value table.
    pub(crate) fn constant_value(&self, table: &[f64]) -> f64 {
        self.constants.iter().map(|p| p.evaluate(table)).sum()
    }
}

impl From<f64> for AffineExpression {
    fn from(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constants: vec![Parameter::Constant(value)],
        }
    }
}

impl From<Parameter> for AffineExpression {
    fn from(param: Parameter) -> Self {
        Self {
            terms: Vec::new(),
            constants: vec![param],
        }
    }
}

impl Mul<VariableRef> for Parameter {
    type Output = AffineExpression;

    fn mul(self, var: VariableRef) -> AffineExpression {
        AffineExpression {
            terms: vec![AffineTerm {
                coeff: self,
                var: var.index,
            }],
            constants: Vec::new(),
        }
    }
}

impl Mul<VariableRef> for f64 {
    type Output = AffineExpression;

    fn mul(self, var: VariableRef) -> AffineExpression {
        Parameter::Constant(self) * var
    }
}

impl Add for AffineExpression {
    type Output = AffineExpression;

    fn add(mut self, mut rhs: AffineExpression) -> AffineExpression {
        self.terms.append(&mut rhs.terms);
        self.constants.append(&mut rhs.constants);
        self
    }
}

impl Add<Parameter> for AffineExpression {
    type Output = AffineExpression;

    fn add(mut self, rhs: Parameter) -> AffineExpression {
        self.constants.push(rhs);
        self
    }
}

impl Add<f64> for AffineExpression {
    type Output = AffineExpression;

    fn add(self, rhs: f64) -> AffineExpression {
        self + Parameter::Constant(rhs)
    }
}

/// An equality, inequality, or second-order-cone relation between affine
/// expressions. Constraints are added before structural compilation and never
/// removed.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// `expr == 0`
    Equality { expr: AffineExpression },
    /// `expr <= 0`
    LessEqualZero { expr: AffineExpression },
    /// `norm2(terms) <= bound`
    SecondOrderCone {
        terms: Vec<AffineExpression>,
        bound: AffineExpression,
    },
}

impl Constraint {
    /// `expr == 0`
    pub fn eq_zero(expr: AffineExpression) -> Self {
        Self::Equality { expr }
    }

    /// `expr <= 0`
    pub fn le_zero(expr: AffineExpression) -> Self {
        Self::LessEqualZero { expr }
    }
}

/// The Euclidean norm of a list of affine expressions, awaiting its upper
/// bound. `norm2(v).le(s)` builds the standard second-order-cone constraint
/// `‖v‖₂ ≤ s`.
pub struct Norm2(Vec<AffineExpression>);

/// Starts a second-order-cone constraint from the stacked expressions.
pub fn norm2(terms: Vec<AffineExpression>) -> Norm2 {
    Norm2(terms)
}

impl Norm2 {
    /// Bounds the norm above by the provided affine expression.
    pub fn le<B: Into<AffineExpression>>(self, bound: B) -> Constraint {
        Constraint::SecondOrderCone {
            terms: self.0,
            bound: bound.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_evaluation() {
        let table = vec![2.0, -3.0];
        assert_eq!(Parameter::Constant(1.5).evaluate(&table), 1.5);
        assert_eq!(Parameter::Slot(ParamId(1)).evaluate(&table), -3.0);
        let squared = Parameter::derived(|t| t[0] * t[0]);
        assert_eq!(squared.evaluate(&table), 4.0);
        assert_eq!(Parameter::negated_slot(ParamId(0)).evaluate(&table), -2.0);
    }

    #[test]
    fn expression_building() {
        let x = VariableRef { index: 3 };
        let y = VariableRef { index: 7 };
        let expr = 2.0 * x + Parameter::Slot(ParamId(0)) * y + 5.0;
        assert_eq!(expr.terms.len(), 2);
        assert_eq!(expr.terms[0].var, 3);
        assert_eq!(expr.terms[1].var, 7);
        assert_eq!(expr.constant_value(&[0.0]), 5.0);
    }
}
