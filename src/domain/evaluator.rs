//! Restricted evaluation of parsed expressions.
//!
//! The evaluator walks an [`Expr`] against a [`Bindings`] snapshot. It holds
//! no state of its own and never mutates the bindings, so evaluating the same
//! tree twice always yields the same result.

use super::bindings::Bindings;
use super::errors::EvaluationError;
use super::parser::{BinaryOp, Expr, UnaryOp};

/// Expression evaluator that walks the AST and computes results.
pub struct ExpressionEvaluator<'a> {
    bindings: &'a Bindings,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(bindings: &'a Bindings) -> Self {
        Self { bindings }
    }

    /// Evaluates an expression with plain IEEE-754 semantics.
    ///
    /// Intermediate and final values may be infinite or `NaN`; see
    /// [`evaluate`] for the checked entry point.
    pub fn evaluate(&self, expr: &Expr) -> Result<f64, EvaluationError> {
        match expr {
            Expr::Number(value) => Ok(*value),
            Expr::Variable { name, offset } => {
                self.bindings
                    .get(name)
                    .ok_or_else(|| EvaluationError::UnresolvedVariable {
                        name: name.clone(),
                        offset: *offset,
                    })
            }
            Expr::Binary { left, operator, right } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;

                Ok(match operator {
                    BinaryOp::Add => left_val + right_val,
                    BinaryOp::Subtract => left_val - right_val,
                    BinaryOp::Multiply => left_val * right_val,
                    BinaryOp::Divide => left_val / right_val,
                    BinaryOp::Power => left_val.powf(right_val),
                })
            }
            Expr::Unary { operator, operand } => {
                let operand_val = self.evaluate(operand)?;
                Ok(match operator {
                    UnaryOp::Plus => operand_val,
                    UnaryOp::Minus => -operand_val,
                })
            }
            Expr::Call { function, args } => {
                let arg_values = args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(function.apply(&arg_values))
            }
        }
    }
}

/// Evaluates `expr` and rejects non-finite results.
///
/// ```
/// use billcalc::domain::{evaluate, parse, Bindings, EvaluationError};
///
/// let ast = parse("a + b * 2").unwrap();
/// let bindings = Bindings::from_iter([("a", 2.0), ("b", 5.0)]);
/// assert_eq!(evaluate(&ast, &bindings), Ok(12.0));
///
/// let ast = parse("a / 0").unwrap();
/// assert!(matches!(evaluate(&ast, &bindings), Err(EvaluationError::NonFiniteResult(_))));
/// ```
pub fn evaluate(expr: &Expr, bindings: &Bindings) -> Result<f64, EvaluationError> {
    let value = ExpressionEvaluator::new(bindings).evaluate(expr)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvaluationError::NonFiniteResult(value))
    }
}
