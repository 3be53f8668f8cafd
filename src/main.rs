//! billcalc - command-line front end for the billing formula engine.
//!
//! Evaluates ad-hoc expressions, tests and validates saved formula files,
//! and generates invoices for a CSV of meter readings.

use anyhow::{Context, Result};
use billcalc::application::{run_batch, BatchOptions, FormulaEditor, Settings};
use billcalc::domain::parser::is_identifier;
use billcalc::domain::{
    build_bindings, parse_and_evaluate, validate_formula, BindingReport, Bindings,
    EvaluationReport, Variable,
};
use billcalc::infrastructure::{CsvRepository, FileRepository};
use billcalc::presentation::{
    format_amount, render_batch_summary, render_error, render_evaluation, render_issues,
};
use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "billcalc")]
#[command(author, version, about = "Evaluate water-utility billing formulas")]
struct Cli {
    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Decimal places used when printing amounts
    #[arg(long, global = true, default_value_t = 2)]
    precision: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a single expression
    Eval {
        /// Expression, e.g. "consumption * rate"
        expression: String,

        /// Variable binding, repeatable
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_binding)]
        vars: Vec<(String, f64)>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a formula file with a sample consumption
    Test {
        /// Formula JSON file
        formula: PathBuf,

        /// Consumption injected as the `consumption` variable
        #[arg(short, long)]
        consumption: f64,
    },

    /// Check a formula file for problems that block saving
    Validate {
        /// Formula JSON file
        formula: PathBuf,
    },

    /// Generate invoices for a CSV of meter readings
    Batch {
        /// Formula JSON file
        formula: PathBuf,

        /// CSV with meter_id, subscriber and consumption columns
        readings: PathBuf,

        /// Invoice CSV output (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Evaluate meters one at a time
        #[arg(long)]
        sequential: bool,

        /// Worker threads for parallel evaluation
        #[arg(long, env = "BILLCALC_THREADS")]
        threads: Option<usize>,
    },
}

fn parse_binding(arg: &str) -> Result<(String, f64), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", arg))?;
    let name = name.trim();
    if !is_identifier(name) {
        return Err(format!("'{}' is not a valid variable name", name));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for {}: {}", name, e))?;
    Ok((name.to_string(), value))
}

fn init_logging(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let mut settings = Settings {
        precision: cli.precision,
        ..Settings::default()
    };

    match cli.command {
        Commands::Eval {
            expression,
            vars,
            json,
        } => eval(&expression, vars, json, &settings),
        Commands::Test {
            formula,
            consumption,
        } => test(&formula, consumption, &settings),
        Commands::Validate { formula } => validate(&formula),
        Commands::Batch {
            formula,
            readings,
            output,
            sequential,
            threads,
        } => {
            settings.batch = BatchOptions {
                parallel: !sequential,
                threads,
            };
            batch(&formula, &readings, output, &settings)
        }
    }
}

fn eval(expression: &str, vars: Vec<(String, f64)>, json: bool, settings: &Settings) -> Result<ExitCode> {
    let variables: Vec<Variable> = vars
        .into_iter()
        .map(|(name, value)| Variable::new(name, value))
        .collect();

    let bindings = build_bindings(&variables, &Bindings::new());
    let bindings = match bindings {
        Ok(bindings) => bindings,
        Err(err) => {
            if json {
                let failed: Result<Bindings, _> = Err(err);
                println!("{}", serde_json::to_string(&BindingReport::from(&failed))?);
            } else {
                eprintln!("{}", err);
            }
            return Ok(ExitCode::FAILURE);
        }
    };

    let result = parse_and_evaluate(expression, &bindings);

    if json {
        println!("{}", serde_json::to_string(&EvaluationReport::from(&result))?);
    } else {
        match &result {
            Ok(value) => println!("{}", format_amount(*value, settings.precision)),
            Err(err) => eprintln!("{}", render_error(expression, err)),
        }
    }

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn test(path: &Path, consumption: f64, settings: &Settings) -> Result<ExitCode> {
    let formula = FileRepository::load_formula(path)
        .with_context(|| format!("Failed to load formula '{}'", path.display()))?;

    let mut editor = FormulaEditor::open(formula);
    editor.set_sample_consumption(consumption);
    let expression = editor.formula().expression.clone();
    let run = editor.run_test();

    match &run.outcome {
        Ok(evaluation) => print!("{}", render_evaluation(&expression, evaluation, settings.precision)),
        Err(err) => eprintln!("{}", err),
    }

    Ok(if run.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn validate(path: &Path) -> Result<ExitCode> {
    let formula = FileRepository::load_formula(path)
        .with_context(|| format!("Failed to load formula '{}'", path.display()))?;

    let issues = validate_formula(&formula);
    print!("{}", render_issues(&issues));

    Ok(if issues.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Exits with status 2 when some meters could not be invoiced.
fn batch(
    formula_path: &Path,
    readings_path: &Path,
    output: Option<PathBuf>,
    settings: &Settings,
) -> Result<ExitCode> {
    let formula = FileRepository::load_formula(formula_path)
        .with_context(|| format!("Failed to load formula '{}'", formula_path.display()))?;
    let readings = CsvRepository::load_readings(readings_path)
        .with_context(|| format!("Failed to read meter readings '{}'", readings_path.display()))?;

    let report = run_batch(&formula, &readings, &settings.batch).context("Invoice batch failed")?;

    match output {
        Some(path) => CsvRepository::save_invoices(&report, &path)
            .with_context(|| format!("Failed to write invoices to '{}'", path.display()))?,
        None => CsvRepository::write_invoices(&report, io::stdout().lock())
            .context("Failed to write invoices")?,
    }

    eprint!("{}", render_batch_summary(&report, settings.precision));

    Ok(if report.failed_count() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}
