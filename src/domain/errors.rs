//! Error taxonomy for parsing, binding and evaluating formulas.
//!
//! Every failure is returned as a value. Callers branch on the kind rather
//! than on message text.

use serde::Serialize;
use thiserror::Error;

/// The category of a [`ParseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParseErrorKind {
    UnexpectedToken,
    UnbalancedParentheses,
    InvalidNumberLiteral,
    EmptyExpression,
    UnknownFunction,
    /// A known function called with too few arguments.
    WrongArgumentCount,
    /// Input exceeds the length or nesting limits of the parser.
    ExpressionTooComplex,
}

/// A syntax error, located by zero-based character offset.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (at offset {offset})")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, message: impl Into<String>, offset: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            offset,
        }
    }
}

/// Errors raised while evaluating a syntactically valid expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("Unresolved variable: {name}")]
    UnresolvedVariable { name: String, offset: usize },

    #[error("Result is not a finite number: {0}")]
    NonFiniteResult(f64),

    #[error("Duplicate variable name: {0}")]
    DuplicateVariableName(String),
}

/// Errors raised while building a binding table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("Duplicate variable name: {0}")]
    DuplicateName(String),
}

impl From<BindingError> for EvaluationError {
    fn from(err: BindingError) -> Self {
        match err {
            BindingError::DuplicateName(name) => EvaluationError::DuplicateVariableName(name),
        }
    }
}

/// Rejected edits to a formula's variables or columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    #[error("No entry at index {0}")]
    IndexOutOfRange(usize),

    #[error("'{0}' is a static entry and cannot be changed this way")]
    StaticEntry(String),
}

/// Flat, serialisable tag covering every way an evaluation can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnexpectedToken,
    UnbalancedParentheses,
    InvalidNumberLiteral,
    EmptyExpression,
    UnknownFunction,
    WrongArgumentCount,
    ExpressionTooComplex,
    UnresolvedVariable,
    NonFiniteResult,
    DuplicateVariableName,
}

impl From<ParseErrorKind> for ErrorKind {
    fn from(kind: ParseErrorKind) -> Self {
        match kind {
            ParseErrorKind::UnexpectedToken => ErrorKind::UnexpectedToken,
            ParseErrorKind::UnbalancedParentheses => ErrorKind::UnbalancedParentheses,
            ParseErrorKind::InvalidNumberLiteral => ErrorKind::InvalidNumberLiteral,
            ParseErrorKind::EmptyExpression => ErrorKind::EmptyExpression,
            ParseErrorKind::UnknownFunction => ErrorKind::UnknownFunction,
            ParseErrorKind::WrongArgumentCount => ErrorKind::WrongArgumentCount,
            ParseErrorKind::ExpressionTooComplex => ErrorKind::ExpressionTooComplex,
        }
    }
}

/// Any failure of `parse_and_evaluate`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl From<BindingError> for FormulaError {
    fn from(err: BindingError) -> Self {
        FormulaError::Evaluation(err.into())
    }
}

impl FormulaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::Parse(err) => err.kind.into(),
            FormulaError::Evaluation(EvaluationError::UnresolvedVariable { .. }) => {
                ErrorKind::UnresolvedVariable
            }
            FormulaError::Evaluation(EvaluationError::NonFiniteResult(_)) => {
                ErrorKind::NonFiniteResult
            }
            FormulaError::Evaluation(EvaluationError::DuplicateVariableName(_)) => {
                ErrorKind::DuplicateVariableName
            }
        }
    }

    /// Character offset into the expression, when the error has one.
    pub fn offset(&self) -> Option<usize> {
        match self {
            FormulaError::Parse(err) => Some(err.offset),
            FormulaError::Evaluation(EvaluationError::UnresolvedVariable { offset, .. }) => {
                Some(*offset)
            }
            FormulaError::Evaluation(_) => None,
        }
    }
}

pub type FormulaResult<T> = Result<T, FormulaError>;
