//! Invoice generation for a batch of meter readings.
//!
//! The formula is compiled once and evaluated for every reading with that
//! meter's consumption injected. A failing meter is reported and skipped;
//! it never aborts the rest of the batch.

use super::config::BatchOptions;
use crate::domain::{CompiledFormula, Formula, FormulaError, ProjectionRow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One meter's consumption for the billing period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub meter_id: String,
    #[serde(default)]
    pub subscriber: String,
    pub consumption: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceLine {
    pub meter_id: String,
    pub subscriber: String,
    pub consumption: f64,
    pub amount: f64,
    pub columns: ProjectionRow,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub meter_id: String,
    pub subscriber: String,
    pub error: FormulaError,
}

/// Errors that prevent a batch from starting at all.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Formula cannot be used for invoicing: {0}")]
    InvalidFormula(#[from] FormulaError),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Per-meter outcomes, in the order the readings were supplied.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub formula: String,
    pub headers: Vec<String>,
    pub outcomes: Vec<Result<InvoiceLine, BatchFailure>>,
}

impl BatchReport {
    pub fn invoices(&self) -> impl Iterator<Item = &InvoiceLine> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchFailure> {
        self.outcomes.iter().filter_map(|outcome| outcome.as_ref().err())
    }

    pub fn invoiced_count(&self) -> usize {
        self.invoices().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Sum of all successfully computed amounts.
    pub fn total_amount(&self) -> f64 {
        self.invoices().map(|line| line.amount).sum()
    }
}

fn invoice(formula: &CompiledFormula, reading: &MeterReading) -> Result<InvoiceLine, BatchFailure> {
    let evaluation = formula.evaluate(reading.consumption);
    match evaluation.amount {
        Ok(amount) => Ok(InvoiceLine {
            meter_id: reading.meter_id.clone(),
            subscriber: reading.subscriber.clone(),
            consumption: reading.consumption,
            amount,
            columns: evaluation.columns,
        }),
        Err(error) => {
            tracing::warn!(
                meter = %reading.meter_id,
                subscriber = %reading.subscriber,
                %error,
                "invoice evaluation failed"
            );
            Err(BatchFailure {
                meter_id: reading.meter_id.clone(),
                subscriber: reading.subscriber.clone(),
                error,
            })
        }
    }
}

/// Evaluates `formula` once per reading.
///
/// # Examples
///
/// ```
/// use billcalc::application::{run_batch, BatchOptions, MeterReading};
/// use billcalc::domain::{Formula, Variable};
///
/// let mut formula = Formula::new("Flat", "consumption * rate");
/// formula.variables.push(Variable::new("rate", 2.0));
///
/// let readings = vec![MeterReading {
///     meter_id: "M-1".to_string(),
///     subscriber: "Ada".to_string(),
///     consumption: 10.0,
/// }];
///
/// let report = run_batch(&formula, &readings, &BatchOptions::default()).unwrap();
/// assert_eq!(report.total_amount(), 20.0);
/// ```
pub fn run_batch(
    formula: &Formula,
    readings: &[MeterReading],
    options: &BatchOptions,
) -> Result<BatchReport, BatchError> {
    let compiled = CompiledFormula::compile(formula)?;

    tracing::info!(
        formula = %compiled.name(),
        meters = readings.len(),
        parallel = options.parallel,
        "starting invoice batch"
    );

    let evaluate_all = || -> Vec<Result<InvoiceLine, BatchFailure>> {
        if options.parallel {
            readings
                .par_iter()
                .map(|reading| invoice(&compiled, reading))
                .collect()
        } else {
            readings
                .iter()
                .map(|reading| invoice(&compiled, reading))
                .collect()
        }
    };

    let outcomes = match options.threads {
        Some(threads) if options.parallel => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?
            .install(evaluate_all),
        _ => evaluate_all(),
    };

    let report = BatchReport {
        formula: compiled.name().to_string(),
        headers: compiled.column_headers().map(str::to_string).collect(),
        outcomes,
    };

    tracing::info!(
        invoiced = report.invoiced_count(),
        failed = report.failed_count(),
        "invoice batch finished"
    );

    Ok(report)
}
