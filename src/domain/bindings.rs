//! Binding tables: the resolved `name -> number` mapping one evaluation sees.

use super::errors::BindingError;
use super::models::Variable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An immutable snapshot of variable values.
///
/// Ordered by name so that rendering and serialisation are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings {
    values: BTreeMap<String, f64>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Returns a copy with `name` bound to `value`, replacing any previous
    /// binding of that name.
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(name, value)| (name.into(), value)).collect(),
        }
    }
}

/// Builds the binding table for one evaluation.
///
/// Variables marked for deletion are skipped. Static variables contribute no
/// value of their own; theirs comes from `injected`. Every remaining variable
/// name must be unique, and must not collide with an injected name: a user
/// variable called `consumption` is reported as a duplicate rather than
/// silently dropped. The first offending name is returned.
///
/// ```
/// use billcalc::domain::{build_bindings, Bindings, Variable};
///
/// let variables = vec![Variable::static_consumption(), Variable::new("rate", 15.0)];
/// let injected = Bindings::new().with("consumption", 20.0);
/// let bindings = build_bindings(&variables, &injected).unwrap();
/// assert_eq!(bindings.get("rate"), Some(15.0));
/// assert_eq!(bindings.get("consumption"), Some(20.0));
/// ```
pub fn build_bindings(variables: &[Variable], injected: &Bindings) -> Result<Bindings, BindingError> {
    let mut values = injected.values.clone();

    for variable in variables.iter().filter(|variable| !variable.marked_for_deletion) {
        if variable.is_static {
            continue;
        }
        if values.contains_key(&variable.name) {
            return Err(BindingError::DuplicateName(variable.name.clone()));
        }
        values.insert(variable.name.clone(), variable.value);
    }

    Ok(Bindings { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_bindings_merges_injected_values() {
        let variables = vec![
            Variable::static_consumption(),
            Variable::new("rate_per_unit", 15.0),
            Variable::new("discount", 2.5),
        ];
        let injected = Bindings::new().with("consumption", 20.0);

        let bindings = build_bindings(&variables, &injected).unwrap();

        assert_eq!(
            bindings,
            Bindings::from_iter([("consumption", 20.0), ("discount", 2.5), ("rate_per_unit", 15.0)])
        );
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let variables = vec![Variable::new("rate", 1.0), Variable::new("rate", 2.0)];
        assert_eq!(
            build_bindings(&variables, &Bindings::new()),
            Err(BindingError::DuplicateName("rate".to_string()))
        );
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let variables = vec![Variable::new("rate", 1.0), Variable::new("Rate", 2.0)];
        let bindings = build_bindings(&variables, &Bindings::new()).unwrap();
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn test_user_variable_cannot_shadow_injected_name() {
        let variables = vec![Variable::static_consumption(), Variable::new("consumption", 99.0)];
        let injected = Bindings::new().with("consumption", 20.0);
        assert_eq!(
            build_bindings(&variables, &injected),
            Err(BindingError::DuplicateName("consumption".to_string()))
        );
    }

    #[test]
    fn test_deleted_variables_are_skipped() {
        let mut removed = Variable::new("rate", 1.0);
        removed.marked_for_deletion = true;
        let variables = vec![removed, Variable::new("rate", 2.0)];

        let bindings = build_bindings(&variables, &Bindings::new()).unwrap();
        assert_eq!(bindings.get("rate"), Some(2.0));
    }

    #[test]
    fn test_static_value_comes_only_from_injection() {
        let mut stored = Variable::static_consumption();
        stored.value = 500.0;
        let bindings = build_bindings(&[stored], &Bindings::new()).unwrap();
        assert!(!bindings.contains("consumption"));
    }

    #[test]
    fn test_bindings_serialize_as_plain_object() {
        let bindings = Bindings::from_iter([("b", 2.0), ("a", 1.0)]);
        assert_eq!(serde_json::to_string(&bindings).unwrap(), r#"{"a":1.0,"b":2.0}"#);
    }
}
