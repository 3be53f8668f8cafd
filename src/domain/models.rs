use super::errors::EditError;
use serde::{Deserialize, Serialize};

/// Name of the system-injected variable carrying a meter's consumption.
pub const CONSUMPTION_VARIABLE: &str = "consumption";

/// Header of the static column showing the consumption value.
pub const CONSUMPTION_HEADER: &str = "Consumption";

/// How an entry is removed from a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Drop the entry immediately; used for formulas that were never saved.
    Hard,
    /// Mark the entry for deletion so the removal can be undone before save.
    Soft,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub marked_for_deletion: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            ..Self::default()
        }
    }

    /// The `consumption` entry every formula carries. Its value is injected at
    /// evaluation time, never stored.
    pub fn static_consumption() -> Self {
        Self {
            name: CONSUMPTION_VARIABLE.to_string(),
            is_static: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub header: String,
    /// Expression evaluated against the formula's bindings.
    pub value: String,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub marked_for_deletion: bool,
    #[serde(default)]
    pub display_order: u32,
}

impl Column {
    pub fn new(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn static_consumption() -> Self {
        Self {
            header: CONSUMPTION_HEADER.to_string(),
            value: CONSUMPTION_VARIABLE.to_string(),
            is_static: true,
            ..Self::default()
        }
    }
}

/// A named billing formula with the variables and columns it owns.
///
/// `columns` is kept sorted by `display_order`, and display orders are the
/// contiguous positions `0..len`.
///
/// # Examples
///
/// ```
/// use billcalc::domain::{Formula, Variable};
///
/// let mut formula = Formula::new("Residential", "consumption * rate_per_unit");
/// let index = formula.add_variable();
/// formula.rename_variable(index, "rate_per_unit").unwrap();
/// formula.set_variable_value(index, 15.0).unwrap();
///
/// assert_eq!(formula.variables[0], Variable::static_consumption());
/// assert_eq!(formula.columns[0].header, "Consumption");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Formula {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

impl Default for Formula {
    fn default() -> Self {
        Self::new("", "")
    }
}

impl Formula {
    /// Creates a formula holding only the static consumption variable and
    /// column.
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            expression: expression.into(),
            variables: vec![Variable::static_consumption()],
            columns: vec![Column::static_consumption()],
        }
    }

    /// Restores the invariants a formula loaded from elsewhere may lack: the
    /// static consumption variable and column exist, the static column comes
    /// first, and display orders are contiguous.
    pub fn normalize(&mut self) {
        if !self.variables.iter().any(|variable| variable.is_static) {
            self.variables.insert(0, Variable::static_consumption());
        }
        if !self.columns.iter().any(|column| column.is_static) {
            self.columns.push(Column::static_consumption());
        }
        self.columns
            .sort_by_key(|column| (!column.is_static, column.display_order));
        self.renumber_columns();
    }

    pub fn live_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|variable| !variable.marked_for_deletion)
    }

    /// Appends an empty variable and returns its index.
    pub fn add_variable(&mut self) -> usize {
        self.variables.push(Variable::default());
        self.variables.len() - 1
    }

    pub fn remove_variable(&mut self, index: usize, removal: Removal) -> Result<(), EditError> {
        let variable = self.user_variable_mut(index)?;
        match removal {
            Removal::Soft => variable.marked_for_deletion = true,
            Removal::Hard => {
                self.variables.remove(index);
            }
        }
        Ok(())
    }

    /// Cancels a pending soft removal.
    pub fn restore_variable(&mut self, index: usize) -> Result<(), EditError> {
        let variable = self
            .variables
            .get_mut(index)
            .ok_or(EditError::IndexOutOfRange(index))?;
        variable.marked_for_deletion = false;
        Ok(())
    }

    pub fn rename_variable(&mut self, index: usize, name: impl Into<String>) -> Result<(), EditError> {
        self.user_variable_mut(index)?.name = name.into();
        Ok(())
    }

    pub fn set_variable_value(&mut self, index: usize, value: f64) -> Result<(), EditError> {
        self.user_variable_mut(index)?.value = value;
        Ok(())
    }

    pub fn set_variable_unit(&mut self, index: usize, unit: impl Into<String>) -> Result<(), EditError> {
        self.variable_mut(index)?.unit = unit.into();
        Ok(())
    }

    pub fn set_variable_description(
        &mut self,
        index: usize,
        description: impl Into<String>,
    ) -> Result<(), EditError> {
        self.variable_mut(index)?.description = description.into();
        Ok(())
    }

    /// Appends an empty column after the last one and returns its index.
    pub fn add_column(&mut self) -> usize {
        self.columns.push(Column {
            display_order: self.columns.len() as u32,
            ..Column::default()
        });
        self.columns.len() - 1
    }

    pub fn remove_column(&mut self, index: usize, removal: Removal) -> Result<(), EditError> {
        let column = self.user_column_mut(index)?;
        match removal {
            Removal::Soft => column.marked_for_deletion = true,
            Removal::Hard => {
                self.columns.remove(index);
                self.renumber_columns();
            }
        }
        Ok(())
    }

    pub fn restore_column(&mut self, index: usize) -> Result<(), EditError> {
        let column = self
            .columns
            .get_mut(index)
            .ok_or(EditError::IndexOutOfRange(index))?;
        column.marked_for_deletion = false;
        Ok(())
    }

    pub fn set_column_header(&mut self, index: usize, header: impl Into<String>) -> Result<(), EditError> {
        self.user_column_mut(index)?.header = header.into();
        Ok(())
    }

    pub fn set_column_value(&mut self, index: usize, value: impl Into<String>) -> Result<(), EditError> {
        self.user_column_mut(index)?.value = value.into();
        Ok(())
    }

    /// Moves the column at `from` to position `to`, shifting the columns in
    /// between. The static column is pinned to the front.
    pub fn move_column(&mut self, from: usize, to: usize) -> Result<(), EditError> {
        let len = self.columns.len();
        if from >= len {
            return Err(EditError::IndexOutOfRange(from));
        }
        if to >= len {
            return Err(EditError::IndexOutOfRange(to));
        }
        if self.columns[from].is_static {
            return Err(EditError::StaticEntry(self.columns[from].header.clone()));
        }
        if self.columns[to].is_static {
            return Err(EditError::StaticEntry(self.columns[to].header.clone()));
        }

        let column = self.columns.remove(from);
        self.columns.insert(to, column);
        self.renumber_columns();
        Ok(())
    }

    /// Drops every entry marked for deletion. Called when the formula is
    /// about to be persisted.
    pub fn purge_deleted(&mut self) {
        self.variables.retain(|variable| !variable.marked_for_deletion);
        self.columns.retain(|column| !column.marked_for_deletion);
        self.renumber_columns();
    }

    fn renumber_columns(&mut self) {
        for (position, column) in self.columns.iter_mut().enumerate() {
            column.display_order = position as u32;
        }
    }

    fn variable_mut(&mut self, index: usize) -> Result<&mut Variable, EditError> {
        self.variables
            .get_mut(index)
            .ok_or(EditError::IndexOutOfRange(index))
    }

    fn user_variable_mut(&mut self, index: usize) -> Result<&mut Variable, EditError> {
        let variable = self.variable_mut(index)?;
        if variable.is_static {
            return Err(EditError::StaticEntry(variable.name.clone()));
        }
        Ok(variable)
    }

    fn user_column_mut(&mut self, index: usize) -> Result<&mut Column, EditError> {
        let column = self
            .columns
            .get_mut(index)
            .ok_or(EditError::IndexOutOfRange(index))?;
        if column.is_static {
            return Err(EditError::StaticEntry(column.header.clone()));
        }
        Ok(column)
    }
}
