//! billcalc - formula engine for water-utility billing
//!
//! Parses, validates and evaluates operator-authored billing formulas such as
//! `(consumption * rate_per_unit) - discount` against named variables, and
//! projects a formula's display columns from the same bindings.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
