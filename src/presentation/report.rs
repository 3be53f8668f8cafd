//! Plain-text rendering of evaluation results for the command line.

use crate::application::BatchReport;
use crate::domain::{FormulaError, FormulaEvaluation, IssueField, ProjectionRow, ValidationIssue};
use std::fmt::Write;

const MIN_COLUMN_WIDTH: usize = 3;
const MAX_COLUMN_WIDTH: usize = 50;

pub fn format_amount(value: f64, precision: usize) -> String {
    format!("{:.*}", precision, value)
}

/// Renders an error, pointing at the offending character when the error
/// carries an offset.
///
/// ```
/// use billcalc::domain::{parse_and_evaluate, Bindings};
/// use billcalc::presentation::render_error;
///
/// let err = parse_and_evaluate("rate * 2x", &Bindings::new()).unwrap_err();
/// let rendered = render_error("rate * 2x", &err);
/// assert!(rendered.starts_with("rate * 2x\n        ^ "));
/// ```
pub fn render_error(expression: &str, error: &FormulaError) -> String {
    match error.offset() {
        Some(offset) => format!("{}\n{}^ {}", expression, " ".repeat(offset), error),
        None => error.to_string(),
    }
}

fn cell_text(result: &Result<f64, FormulaError>, precision: usize) -> String {
    match result {
        Ok(value) => format_amount(*value, precision),
        Err(error) => format!("#ERROR ({})", error),
    }
}

fn column_width(header: &str, value: &str) -> usize {
    header
        .chars()
        .count()
        .max(value.chars().count())
        .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut shortened: String = text.chars().take(width.saturating_sub(1)).collect();
        shortened.push('…');
        shortened
    }
}

/// Renders a projection row as a two-line table: headers, then values.
pub fn render_row(row: &ProjectionRow, precision: usize) -> String {
    let values: Vec<String> = row
        .cells
        .iter()
        .map(|cell| cell_text(&cell.result, precision))
        .collect();

    let mut header_line = Vec::new();
    let mut value_line = Vec::new();
    for (cell, value) in row.cells.iter().zip(&values) {
        let width = column_width(&cell.header, value);
        header_line.push(format!("{:<width$}", truncate(&cell.header, width)));
        value_line.push(format!("{:>width$}", truncate(value, width)));
    }

    format!(
        "{}\n{}",
        header_line.join(" | ").trim_end(),
        value_line.join(" | ").trim_end()
    )
}

/// Renders the amount due followed by the column table.
pub fn render_evaluation(expression: &str, evaluation: &FormulaEvaluation, precision: usize) -> String {
    let mut output = String::new();
    match &evaluation.amount {
        Ok(amount) => {
            let _ = writeln!(output, "Amount due: {}", format_amount(*amount, precision));
        }
        Err(error) => {
            let _ = writeln!(output, "Amount due: #ERROR");
            let _ = writeln!(output, "{}", render_error(expression, error));
        }
    }
    if !evaluation.columns.cells.is_empty() {
        output.push('\n');
        output.push_str(&render_row(&evaluation.columns, precision));
        output.push('\n');
    }
    output
}

pub fn render_issues(issues: &[ValidationIssue]) -> String {
    if issues.is_empty() {
        return "Formula is valid\n".to_string();
    }

    let mut output = String::new();
    for issue in issues {
        let field = match issue.field {
            IssueField::Expression => "expression".to_string(),
            IssueField::Variable(index) => format!("variables[{}]", index),
            IssueField::Column(index) => format!("columns[{}]", index),
        };
        let _ = writeln!(output, "{}: {}", field, issue.message);
    }
    output
}

pub fn render_batch_summary(report: &BatchReport, precision: usize) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{}: {} meters, {} invoiced, {} failed, total {}",
        report.formula,
        report.outcomes.len(),
        report.invoiced_count(),
        report.failed_count(),
        format_amount(report.total_amount(), precision)
    );
    for failure in report.failures() {
        let _ = writeln!(
            output,
            "  {} ({}): {}",
            failure.meter_id, failure.subscriber, failure.error
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{run_batch, BatchOptions, MeterReading};
    use crate::domain::{evaluate_formula, validate_formula, Column, Formula, Variable};
    use pretty_assertions::assert_eq;

    fn formula() -> Formula {
        let mut formula = Formula::new("Flat", "consumption * rate_per_unit");
        formula.variables.push(Variable::new("rate_per_unit", 15.0));
        formula.columns.push(Column {
            display_order: 1,
            ..Column::new("Gross", "consumption * rate_per_unit")
        });
        formula
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(300.0, 2), "300.00");
        assert_eq!(format_amount(1.005, 0), "1");
        assert_eq!(format_amount(-2.5, 1), "-2.5");
    }

    #[test]
    fn test_render_evaluation() {
        let formula = formula();
        let evaluation = evaluate_formula(&formula, 20.0).unwrap();
        assert_eq!(
            render_evaluation(&formula.expression, &evaluation, 2),
            "Amount due: 300.00\n\nConsumption | Gross\n      20.00 | 300.00\n"
        );
    }

    #[test]
    fn test_render_evaluation_error_points_at_offset() {
        let mut formula = formula();
        formula.expression = "consumption * rate".to_string();
        let evaluation = evaluate_formula(&formula, 20.0).unwrap();
        let rendered = render_evaluation(&formula.expression, &evaluation, 2);
        assert!(rendered.starts_with(
            "Amount due: #ERROR\nconsumption * rate\n              ^ Unresolved variable: rate\n"
        ));
    }

    #[test]
    fn test_render_issues() {
        let mut formula = formula();
        formula.expression = "consumption *".to_string();
        formula.variables.push(Variable::new("rate_per_unit", 1.0));

        let rendered = render_issues(&validate_formula(&formula));
        assert_eq!(
            rendered,
            "variables[2]: Variable 'rate_per_unit' is defined more than once\n\
             expression: Unexpected end of expression (at offset 13)\n"
        );
        assert_eq!(render_issues(&[]), "Formula is valid\n");
    }

    #[test]
    fn test_render_batch_summary() {
        let readings = vec![
            MeterReading {
                meter_id: "M-1".to_string(),
                subscriber: "Ada".to_string(),
                consumption: 2.0,
            },
            MeterReading {
                meter_id: "M-2".to_string(),
                subscriber: "Bob".to_string(),
                consumption: f64::NAN,
            },
        ];
        let options = BatchOptions {
            parallel: false,
            threads: None,
        };
        let report = run_batch(&formula(), &readings, &options).unwrap();

        assert_eq!(
            render_batch_summary(&report, 2),
            "Flat: 2 meters, 1 invoiced, 1 failed, total 30.00\n  M-2 (Bob): Result is not a finite number: NaN\n"
        );
    }

    #[test]
    fn test_truncate_long_headers() {
        let long = "x".repeat(80);
        let truncated = truncate(&long, MAX_COLUMN_WIDTH);
        assert_eq!(truncated.chars().count(), MAX_COLUMN_WIDTH);
        assert!(truncated.ends_with('…'));
    }
}
