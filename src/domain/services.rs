//! Formula evaluation services.
//!
//! This module is the surface the rest of the application talks to:
//! evaluating a single expression, building bindings for a formula,
//! evaluating a whole formula (amount due plus projected columns), compiling
//! a formula once for many evaluations, and validating a formula before it
//! is saved.

use super::bindings::{build_bindings, Bindings};
use super::errors::{BindingError, ErrorKind, FormulaError, FormulaResult, ParseErrorKind};
use super::evaluator::evaluate;
use super::models::{Formula, Variable, CONSUMPTION_VARIABLE};
use super::parser::{is_identifier, parse, Expr};
use super::projection::{compile_columns, project_columns, CompiledColumn, ProjectionRow};
use serde::Serialize;
use std::collections::HashSet;

/// Parses and evaluates `expression` against `bindings`.
///
/// # Examples
///
/// ```
/// use billcalc::domain::{parse_and_evaluate, Bindings, ErrorKind};
///
/// let bindings = Bindings::from_iter([("a", 2.0), ("b", 5.0)]);
/// assert_eq!(parse_and_evaluate("a + b * 2", &bindings), Ok(12.0));
///
/// let err = parse_and_evaluate("a + c", &bindings).unwrap_err();
/// assert_eq!(err.kind(), ErrorKind::UnresolvedVariable);
/// ```
pub fn parse_and_evaluate(expression: &str, bindings: &Bindings) -> FormulaResult<f64> {
    tracing::debug!(expression, bindings = bindings.len(), "evaluating expression");
    let ast = parse(expression)?;
    Ok(evaluate(&ast, bindings)?)
}

/// Serialisable outcome of one evaluation.
///
/// Serialises as `{"ok": true, "value": 12.0}` or
/// `{"ok": false, "kind": "UnresolvedVariable", "message": "...", "offset": 4}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl From<&FormulaResult<f64>> for EvaluationReport {
    fn from(result: &FormulaResult<f64>) -> Self {
        match result {
            Ok(value) => Self {
                ok: true,
                value: Some(*value),
                kind: None,
                message: None,
                offset: None,
            },
            Err(err) => Self {
                ok: false,
                value: None,
                kind: Some(err.kind()),
                message: Some(err.to_string()),
                offset: err.offset(),
            },
        }
    }
}

/// Serialisable outcome of building bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindingReport {
    Built { ok: bool, bindings: Bindings },
    Failed { ok: bool, kind: &'static str, name: String },
}

impl From<&Result<Bindings, BindingError>> for BindingReport {
    fn from(result: &Result<Bindings, BindingError>) -> Self {
        match result {
            Ok(bindings) => BindingReport::Built {
                ok: true,
                bindings: bindings.clone(),
            },
            Err(BindingError::DuplicateName(name)) => BindingReport::Failed {
                ok: false,
                kind: "DuplicateName",
                name: name.clone(),
            },
        }
    }
}

/// Everything one evaluation of a formula produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaEvaluation {
    pub bindings: Bindings,
    /// The amount due computed from the main expression.
    pub amount: FormulaResult<f64>,
    pub columns: ProjectionRow,
}

/// Evaluates a formula's expression and columns for one consumption value.
///
/// Duplicate variable names stop evaluation before anything is computed.
/// Otherwise the amount and every column are evaluated independently, so a
/// broken expression still leaves the column values available.
///
/// ```
/// use billcalc::domain::{evaluate_formula, Formula, Variable};
///
/// let mut formula = Formula::new("Flat", "consumption * rate_per_unit");
/// formula.variables.push(Variable::new("rate_per_unit", 15.0));
///
/// let evaluation = evaluate_formula(&formula, 20.0).unwrap();
/// assert_eq!(evaluation.amount, Ok(300.0));
/// assert_eq!(evaluation.columns.cells[0].result, Ok(20.0));
/// ```
pub fn evaluate_formula(formula: &Formula, consumption: f64) -> Result<FormulaEvaluation, BindingError> {
    let injected = Bindings::new().with(CONSUMPTION_VARIABLE, consumption);
    let bindings = build_bindings(&formula.variables, &injected)?;

    let amount = parse_and_evaluate(&formula.expression, &bindings);
    let columns = project_columns(&formula.columns, &bindings);

    Ok(FormulaEvaluation {
        bindings,
        amount,
        columns,
    })
}

/// A formula parsed and checked once, ready to be evaluated for many
/// consumption values.
///
/// Holds no interior mutability, so it can be shared across threads and
/// evaluated concurrently.
#[derive(Debug, Clone)]
pub struct CompiledFormula {
    name: String,
    expression: Expr,
    base: Bindings,
    columns: Vec<CompiledColumn>,
}

impl CompiledFormula {
    /// Fails if the main expression does not parse or a variable name is
    /// duplicated. Column syntax errors are kept and reported per evaluation.
    pub fn compile(formula: &Formula) -> FormulaResult<Self> {
        let expression = parse(&formula.expression)?;
        let placeholder = Bindings::new().with(CONSUMPTION_VARIABLE, 0.0);
        let base = build_bindings(&formula.variables, &placeholder)?;

        Ok(Self {
            name: formula.name.clone(),
            expression,
            base,
            columns: compile_columns(&formula.columns),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_headers(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.header.as_str())
    }

    pub fn evaluate(&self, consumption: f64) -> FormulaEvaluation {
        let bindings = self.base.clone().with(CONSUMPTION_VARIABLE, consumption);
        let amount = evaluate(&self.expression, &bindings).map_err(FormulaError::from);
        let columns = ProjectionRow::evaluate(&self.columns, &bindings);

        FormulaEvaluation {
            bindings,
            amount,
            columns,
        }
    }
}

/// Where in a formula a validation issue was found. Indices refer to
/// positions in `Formula::variables` and `Formula::columns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueField {
    Expression,
    Variable(usize),
    Column(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    Syntax(ParseErrorKind),
    InvalidName,
    DuplicateName,
    UnknownReference,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: IssueField,
    pub kind: IssueKind,
    pub message: String,
}

/// Checks a formula before it is saved and returns every problem found.
///
/// An empty list means the formula may be persisted.
pub fn validate_formula(formula: &Formula) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut known: HashSet<&str> = HashSet::from([CONSUMPTION_VARIABLE]);

    for (index, variable) in formula.variables.iter().enumerate() {
        if variable.marked_for_deletion || variable.is_static {
            continue;
        }
        check_variable_name(index, variable, &mut known, &mut issues);
    }

    check_expression(IssueField::Expression, &formula.expression, &known, &mut issues);

    for (index, column) in formula.columns.iter().enumerate() {
        if column.marked_for_deletion {
            continue;
        }
        check_expression(IssueField::Column(index), &column.value, &known, &mut issues);
    }

    if !issues.is_empty() {
        tracing::debug!(formula = %formula.name, issues = issues.len(), "formula failed validation");
    }
    issues
}

fn check_variable_name<'a>(
    index: usize,
    variable: &'a Variable,
    known: &mut HashSet<&'a str>,
    issues: &mut Vec<ValidationIssue>,
) {
    let field = IssueField::Variable(index);

    if !is_identifier(&variable.name) {
        issues.push(ValidationIssue {
            field,
            kind: IssueKind::InvalidName,
            message: format!("'{}' is not a valid variable name", variable.name),
        });
    } else if !known.insert(&variable.name) {
        let message = if variable.name == CONSUMPTION_VARIABLE {
            format!("'{}' is reserved for the metered consumption", variable.name)
        } else {
            format!("Variable '{}' is defined more than once", variable.name)
        };
        issues.push(ValidationIssue {
            field,
            kind: IssueKind::DuplicateName,
            message,
        });
    }
}

fn check_expression(
    field: IssueField,
    source: &str,
    known: &HashSet<&str>,
    issues: &mut Vec<ValidationIssue>,
) {
    match parse(source) {
        Ok(ast) => {
            for name in ast.referenced_variables() {
                if !known.contains(name) {
                    issues.push(ValidationIssue {
                        field,
                        kind: IssueKind::UnknownReference,
                        message: format!("Unknown variable: {}", name),
                    });
                }
            }
        }
        Err(err) => issues.push(ValidationIssue {
            field,
            kind: IssueKind::Syntax(err.kind),
            message: err.to_string(),
        }),
    }
}
