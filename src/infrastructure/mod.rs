//! Infrastructure layer providing file-based storage.
//!
//! Formula definitions are read and written as JSON; meter readings and
//! invoice output use CSV.

pub mod persistence;

pub use persistence::*;
