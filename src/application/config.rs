//! Runtime settings shared by the CLI and the batch workflow.

/// How an invoice batch is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOptions {
    /// Evaluate meters on the rayon thread pool.
    pub parallel: bool,
    /// Size of a dedicated pool; `None` uses rayon's global pool.
    pub threads: Option<usize>,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub batch: BatchOptions,
    /// Decimal places used when rendering amounts as text.
    pub precision: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch: BatchOptions::default(),
            precision: 2,
        }
    }
}
