//! Column projection: evaluating a formula's display columns into one row.
//!
//! Every column sees the same binding table. A column that fails to parse or
//! evaluate yields an error cell; the remaining columns are still evaluated.

use super::bindings::Bindings;
use super::errors::{FormulaResult, ParseError};
use super::evaluator::evaluate;
use super::models::Column;
use super::parser::{parse, Expr};

/// A column whose expression has been parsed once for repeated evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledColumn {
    pub header: String,
    pub expr: Result<Expr, ParseError>,
}

impl CompiledColumn {
    pub fn compile(column: &Column) -> Self {
        Self {
            header: column.header.clone(),
            expr: parse(&column.value),
        }
    }

    pub fn evaluate(&self, bindings: &Bindings) -> FormulaResult<f64> {
        match &self.expr {
            Ok(expr) => Ok(evaluate(expr, bindings)?),
            Err(err) => Err(err.clone().into()),
        }
    }
}

/// Compiles the columns not marked for deletion, in display order.
pub fn compile_columns(columns: &[Column]) -> Vec<CompiledColumn> {
    let mut live: Vec<&Column> = columns
        .iter()
        .filter(|column| !column.marked_for_deletion)
        .collect();
    live.sort_by_key(|column| column.display_order);
    live.into_iter().map(CompiledColumn::compile).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedCell {
    pub header: String,
    pub result: FormulaResult<f64>,
}

/// One evaluated row of column values, in display order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectionRow {
    pub cells: Vec<ProjectedCell>,
}

impl ProjectionRow {
    pub fn evaluate(columns: &[CompiledColumn], bindings: &Bindings) -> Self {
        let cells = columns
            .iter()
            .map(|column| ProjectedCell {
                header: column.header.clone(),
                result: column.evaluate(bindings),
            })
            .collect();
        Self { cells }
    }

    /// First cell with the given header.
    pub fn get(&self, header: &str) -> Option<&ProjectedCell> {
        self.cells.iter().find(|cell| cell.header == header)
    }

    pub fn has_failures(&self) -> bool {
        self.cells.iter().any(|cell| cell.result.is_err())
    }
}

/// Evaluates every live column of a formula against one binding table.
///
/// ```
/// use billcalc::domain::{project_columns, Bindings, Column};
///
/// let columns = vec![Column::new("Double", "a * 2"), Column::new("Broken", "a +")];
/// let row = project_columns(&columns, &Bindings::from_iter([("a", 4.0)]));
/// assert_eq!(row.cells[0].result, Ok(8.0));
/// assert!(row.cells[1].result.is_err());
/// ```
pub fn project_columns(columns: &[Column], bindings: &Bindings) -> ProjectionRow {
    tracing::debug!(columns = columns.len(), "projecting columns");
    ProjectionRow::evaluate(&compile_columns(columns), bindings)
}
