//! The closed set of functions a formula may call.
//!
//! There is no registry to add entries to at runtime. The parser resolves a
//! call site to a [`Builtin`] or rejects it with `UnknownFunction`, so an
//! [`Expr`](super::parser::Expr) can only ever name what is listed here.
//! Anything else a formula might try to reach (module loading, string
//! evaluation, symbolic manipulation, host I/O) has no representation in the
//! AST at all.

use serde::Serialize;
use std::fmt;

/// A function permitted inside a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Builtin {
    Min,
    Max,
}

impl Builtin {
    /// Every callable function, in the order they are documented.
    pub const ALL: [Builtin; 2] = [Builtin::Min, Builtin::Max];

    /// Resolves a call-site name. Names are case-sensitive.
    pub fn lookup(name: &str) -> Option<Builtin> {
        Self::ALL.into_iter().find(|builtin| builtin.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Min => "min",
            Builtin::Max => "max",
        }
    }

    /// Fewest arguments the function accepts.
    pub fn min_arity(self) -> usize {
        match self {
            Builtin::Min | Builtin::Max => 2,
        }
    }

    /// Applies the function to already evaluated arguments.
    ///
    /// `NaN` in any argument yields `NaN`, unlike `f64::min`/`f64::max` which
    /// would drop it.
    pub fn apply(self, args: &[f64]) -> f64 {
        if args.iter().any(|value| value.is_nan()) {
            return f64::NAN;
        }
        let mut values = args.iter().copied();
        let Some(first) = values.next() else {
            return f64::NAN;
        };
        match self {
            Builtin::Min => values.fold(first, f64::min),
            Builtin::Max => values.fold(first, f64::max),
        }
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_allowed_functions() {
        assert_eq!(Builtin::lookup("min"), Some(Builtin::Min));
        assert_eq!(Builtin::lookup("max"), Some(Builtin::Max));
    }

    #[test]
    fn test_lookup_rejects_everything_else() {
        for name in ["MIN", "Max", "import", "evaluate", "parse", "simplify", "derivative", "resolve", "createUnit", "sum", ""] {
            assert_eq!(Builtin::lookup(name), None, "{name} must not resolve");
        }
    }

    #[test]
    fn test_apply_extremum() {
        assert_eq!(Builtin::Min.apply(&[3.0, 7.0]), 3.0);
        assert_eq!(Builtin::Max.apply(&[3.0, 7.0, 10.0]), 10.0);
        assert_eq!(Builtin::Min.apply(&[-1.5, 2.0, -3.25]), -3.25);
    }

    #[test]
    fn test_apply_propagates_nan() {
        assert!(Builtin::Max.apply(&[1.0, f64::NAN]).is_nan());
        assert!(Builtin::Min.apply(&[f64::NAN, 1.0]).is_nan());
    }

    #[test]
    fn test_apply_handles_infinity() {
        assert_eq!(Builtin::Max.apply(&[1.0, f64::INFINITY]), f64::INFINITY);
        assert_eq!(Builtin::Min.apply(&[1.0, f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }
}
