//! Application layer managing editing and billing workflows.
//!
//! This module coordinates between the domain layer and its callers: the
//! formula editor's Test/Save cycle and the invoice batch run.

pub mod batch;
pub mod config;
pub mod editor;

pub use batch::*;
pub use config::*;
pub use editor::*;
