//! Domain layer: the formula engine and the model it operates on.

pub mod bindings;
pub mod errors;
pub mod evaluator;
pub mod models;
pub mod parser;
pub mod policy;
pub mod projection;
pub mod services;

pub use bindings::*;
pub use errors::*;
pub use evaluator::{evaluate, ExpressionEvaluator};
pub use models::*;
pub use parser::{parse, Expr};
pub use policy::Builtin;
pub use projection::*;
pub use services::*;
