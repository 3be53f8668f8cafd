//! Presentation layer rendering results as plain text.
//!
//! The CLI prints these renderings to stdout; machine-readable output uses
//! the serialisable reports from the domain layer instead.

pub mod report;

pub use report::*;
