//! Formula editor workflow.
//!
//! Holds the formula being edited together with the state of its "Test"
//! action. Every edit bumps a revision counter; a test result is only kept
//! if it was requested for the current revision, so a slow evaluation of
//! superseded input can never overwrite a newer one.

use crate::domain::{
    build_bindings, evaluate_formula, project_columns, validate_formula, BindingError, Bindings,
    EditError, Formula, FormulaEvaluation, ProjectionRow, Removal, ValidationIssue,
    CONSUMPTION_VARIABLE,
};

/// Identifies the revision a test evaluation was started for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestTicket {
    revision: u64,
}

/// The outcome of the most recent accepted test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRun {
    pub revision: u64,
    pub consumption: f64,
    pub outcome: Result<FormulaEvaluation, BindingError>,
}

impl TestRun {
    /// True when bindings were built and the main expression evaluated.
    pub fn succeeded(&self) -> bool {
        matches!(&self.outcome, Ok(evaluation) if evaluation.amount.is_ok())
    }
}

/// Editing session for a single formula.
///
/// # Examples
///
/// ```
/// use billcalc::application::FormulaEditor;
///
/// let mut editor = FormulaEditor::new();
/// editor.set_expression("consumption * rate");
/// let index = editor.add_variable();
/// editor.edit(|formula| formula.rename_variable(index, "rate")).unwrap();
/// editor.edit(|formula| formula.set_variable_value(index, 2.5)).unwrap();
/// editor.set_sample_consumption(4.0);
///
/// assert!(editor.run_test().succeeded());
/// assert!(editor.can_submit());
/// ```
#[derive(Debug)]
pub struct FormulaEditor {
    formula: Formula,
    persisted: bool,
    sample_consumption: f64,
    revision: u64,
    last_test: Option<TestRun>,
}

impl Default for FormulaEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormulaEditor {
    /// Starts editing a new, never persisted formula.
    pub fn new() -> Self {
        Self {
            formula: Formula::default(),
            persisted: false,
            sample_consumption: 0.0,
            revision: 0,
            last_test: None,
        }
    }

    /// Starts editing a formula that already exists in storage. Removals
    /// become soft until the next save.
    pub fn open(mut formula: Formula) -> Self {
        formula.normalize();
        Self {
            formula,
            persisted: true,
            ..Self::new()
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn sample_consumption(&self) -> f64 {
        self.sample_consumption
    }

    /// Result of the latest test for the current revision, if any.
    pub fn last_test(&self) -> Option<&TestRun> {
        self.last_test.as_ref()
    }

    fn removal(&self) -> Removal {
        if self.persisted {
            Removal::Soft
        } else {
            Removal::Hard
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.last_test = None;
    }

    /// Applies an arbitrary edit to the formula.
    pub fn edit<R>(&mut self, change: impl FnOnce(&mut Formula) -> R) -> R {
        self.touch();
        change(&mut self.formula)
    }

    pub fn set_expression(&mut self, expression: impl Into<String>) {
        self.edit(|formula| formula.expression = expression.into());
    }

    pub fn set_sample_consumption(&mut self, consumption: f64) {
        self.touch();
        self.sample_consumption = consumption;
    }

    pub fn add_variable(&mut self) -> usize {
        self.edit(Formula::add_variable)
    }

    /// Removes a variable: immediately for a new formula, as a pending
    /// deletion for a persisted one.
    pub fn remove_variable(&mut self, index: usize) -> Result<(), EditError> {
        let removal = self.removal();
        self.edit(|formula| formula.remove_variable(index, removal))
    }

    pub fn add_column(&mut self) -> usize {
        self.edit(Formula::add_column)
    }

    pub fn remove_column(&mut self, index: usize) -> Result<(), EditError> {
        let removal = self.removal();
        self.edit(|formula| formula.remove_column(index, removal))
    }

    /// Reserves a slot for an evaluation started now.
    pub fn begin_test(&self) -> TestTicket {
        TestTicket {
            revision: self.revision,
        }
    }

    /// Records a finished evaluation. Returns `false` and discards the
    /// result when the formula has been edited since `ticket` was issued.
    pub fn complete_test(
        &mut self,
        ticket: TestTicket,
        outcome: Result<FormulaEvaluation, BindingError>,
    ) -> bool {
        if ticket.revision != self.revision {
            tracing::debug!(
                requested = ticket.revision,
                current = self.revision,
                "discarding stale test result"
            );
            return false;
        }

        self.last_test = Some(TestRun {
            revision: ticket.revision,
            consumption: self.sample_consumption,
            outcome,
        });
        true
    }

    /// Evaluates the formula with the sample consumption and records it.
    pub fn run_test(&mut self) -> &TestRun {
        let outcome = evaluate_formula(&self.formula, self.sample_consumption);
        self.last_test.insert(TestRun {
            revision: self.revision,
            consumption: self.sample_consumption,
            outcome,
        })
    }

    /// Re-evaluates the columns against the sample consumption without
    /// touching the main expression's test state.
    pub fn preview_columns(&self) -> Result<ProjectionRow, BindingError> {
        let injected = Bindings::new().with(CONSUMPTION_VARIABLE, self.sample_consumption);
        let bindings = build_bindings(&self.formula.variables, &injected)?;
        Ok(project_columns(&self.formula.columns, &bindings))
    }

    pub fn validate(&self) -> Vec<ValidationIssue> {
        validate_formula(&self.formula)
    }

    /// Submission is allowed once the latest test of the current revision
    /// succeeded and the formula passes validation.
    pub fn can_submit(&self) -> bool {
        self.last_test.as_ref().is_some_and(TestRun::succeeded) && self.validate().is_empty()
    }

    /// Produces the formula to persist: validated, with pending deletions
    /// dropped and column order renumbered.
    pub fn prepare_save(&self) -> Result<Formula, Vec<ValidationIssue>> {
        let issues = self.validate();
        if !issues.is_empty() {
            return Err(issues);
        }
        let mut formula = self.formula.clone();
        formula.purge_deleted();
        Ok(formula)
    }

    /// Marks the current state as persisted.
    pub fn mark_saved(&mut self) {
        self.formula.purge_deleted();
        self.persisted = true;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, IssueKind, Variable};
    use pretty_assertions::assert_eq;

    fn flat_rate_editor() -> FormulaEditor {
        let mut editor = FormulaEditor::new();
        editor.set_expression("consumption * rate_per_unit");
        let index = editor.add_variable();
        editor.edit(|formula| formula.rename_variable(index, "rate_per_unit")).unwrap();
        editor.edit(|formula| formula.set_variable_value(index, 15.0)).unwrap();
        editor.set_sample_consumption(20.0);
        editor
    }

    fn persisted_formula() -> Formula {
        let mut formula = Formula::new("Stored", "consumption * rate");
        formula.variables.push(Variable::new("rate", 2.0));
        formula.variables.push(Variable::new("fee", 5.0));
        formula
    }

    #[test]
    fn test_new_editor_defaults() {
        let editor = FormulaEditor::default();
        assert!(!editor.is_persisted());
        assert_eq!(editor.revision(), 0);
        assert!(editor.last_test().is_none());
        assert!(!editor.can_submit());
        assert_eq!(editor.formula().variables.len(), 1);
    }

    #[test]
    fn test_run_test_evaluates_sample() {
        let mut editor = flat_rate_editor();
        let run = editor.run_test();
        assert!(run.succeeded());
        assert_eq!(run.consumption, 20.0);
        assert_eq!(run.outcome.as_ref().unwrap().amount, Ok(300.0));
        assert!(editor.can_submit());
    }

    #[test]
    fn test_edit_invalidates_test() {
        let mut editor = flat_rate_editor();
        editor.run_test();
        editor.set_expression("consumption * rate_per_unit + 1");
        assert!(editor.last_test().is_none());
        assert!(!editor.can_submit());
    }

    #[test]
    fn test_failed_test_blocks_submission() {
        let mut editor = flat_rate_editor();
        editor.set_expression("consumption * missing");
        let run = editor.run_test();
        assert!(!run.succeeded());
        assert_eq!(
            run.outcome.as_ref().unwrap().amount.as_ref().unwrap_err().kind(),
            ErrorKind::UnresolvedVariable
        );
        assert!(!editor.can_submit());
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let mut editor = flat_rate_editor();
        let stale = editor.begin_test();
        let stale_outcome = evaluate_formula(editor.formula(), 20.0);

        editor.set_expression("consumption * rate_per_unit * 2");
        let fresh = editor.begin_test();
        let fresh_outcome = evaluate_formula(editor.formula(), 20.0);

        assert!(editor.complete_test(fresh, fresh_outcome));
        assert!(!editor.complete_test(stale, stale_outcome));

        let run = editor.last_test().unwrap();
        assert_eq!(run.outcome.as_ref().unwrap().amount, Ok(600.0));
    }

    #[test]
    fn test_new_formula_removes_immediately() {
        let mut editor = flat_rate_editor();
        editor.remove_variable(1).unwrap();
        assert_eq!(editor.formula().variables.len(), 1);
    }

    #[test]
    fn test_persisted_formula_removes_softly() {
        let mut editor = FormulaEditor::open(persisted_formula());
        editor.remove_variable(2).unwrap();
        assert_eq!(editor.formula().variables.len(), 3);
        assert!(editor.formula().variables[2].marked_for_deletion);

        editor.edit(|formula| formula.restore_variable(2)).unwrap();
        assert!(!editor.formula().variables[2].marked_for_deletion);
    }

    #[test]
    fn test_static_entries_cannot_be_removed() {
        let mut editor = FormulaEditor::open(persisted_formula());
        assert!(matches!(editor.remove_variable(0), Err(EditError::StaticEntry(_))));
        assert!(matches!(editor.remove_column(0), Err(EditError::StaticEntry(_))));
    }

    #[test]
    fn test_prepare_save_drops_pending_deletions() {
        let mut editor = FormulaEditor::open(persisted_formula());
        editor.remove_variable(2).unwrap();
        let index = editor.add_column();
        editor.edit(|formula| formula.set_column_header(index, "Fee")).unwrap();
        editor.edit(|formula| formula.set_column_value(index, "rate * 2")).unwrap();

        let saved = editor.prepare_save().unwrap();

        let names: Vec<_> = saved.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["consumption", "rate"]);
        assert_eq!(saved.columns.len(), 2);
        assert_eq!(editor.formula().variables.len(), 3);
    }

    #[test]
    fn test_prepare_save_reports_duplicates() {
        let mut editor = flat_rate_editor();
        let index = editor.add_variable();
        editor.edit(|formula| formula.rename_variable(index, "rate_per_unit")).unwrap();

        let issues = editor.prepare_save().unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::DuplicateName);

        let run = editor.run_test();
        assert_eq!(run.outcome, Err(BindingError::DuplicateName("rate_per_unit".to_string())));
    }

    #[test]
    fn test_preview_columns_uses_sample() {
        let mut editor = flat_rate_editor();
        let index = editor.add_column();
        editor.edit(|formula| formula.set_column_header(index, "Gross")).unwrap();
        editor.edit(|formula| formula.set_column_value(index, "consumption * rate_per_unit")).unwrap();

        let row = editor.preview_columns().unwrap();

        assert_eq!(row.get("Consumption").unwrap().result, Ok(20.0));
        assert_eq!(row.get("Gross").unwrap().result, Ok(300.0));
    }

    #[test]
    fn test_mark_saved_switches_to_soft_removal() {
        let mut editor = flat_rate_editor();
        editor.mark_saved();
        assert!(editor.is_persisted());

        editor.remove_variable(1).unwrap();
        assert!(editor.formula().variables[1].marked_for_deletion);
    }
}
