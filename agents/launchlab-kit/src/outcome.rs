//! Stage outcomes and run summaries

use std::fmt;

use tracing::info;

/// Result of one best-effort stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage made its change
    Applied,
    /// Desired state was already present, nothing written
    AlreadySatisfied,
    /// Some but not all calls of the stage succeeded
    Partial(String),
    /// The stage could not complete
    Failed(String),
}

impl StageOutcome {
    pub fn failed(reason: impl fmt::Display) -> Self {
        StageOutcome::Failed(reason.to_string())
    }

    pub fn partial(reason: impl fmt::Display) -> Self {
        StageOutcome::Partial(reason.to_string())
    }

    /// Partial results count as failures.
    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Applied | StageOutcome::AlreadySatisfied)
    }

    /// Single-character marker for summary tables
    pub fn mark(&self) -> &'static str {
        match self {
            StageOutcome::Applied | StageOutcome::AlreadySatisfied => "✓",
            StageOutcome::Partial(_) => "⚠",
            StageOutcome::Failed(_) => "✗",
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Applied => write!(f, "applied"),
            StageOutcome::AlreadySatisfied => write!(f, "already satisfied"),
            StageOutcome::Partial(reason) => write!(f, "partial: {}", reason),
            StageOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

const RULE_WIDTH: usize = 60;

/// Tabular end-of-run report
#[derive(Debug, Clone)]
pub struct Summary {
    title: String,
    rows: Vec<(String, String)>,
}

impl Summary {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            rows: Vec::new(),
        }
    }

    /// Append a row
    pub fn row(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.rows.push((label.into(), value.into()));
        self
    }

    /// Render the table as lines
    pub fn lines(&self) -> Vec<String> {
        let width = self.rows.iter().map(|(label, _)| label.chars().count()).max().unwrap_or(0);

        let mut lines = vec![
            "=".repeat(RULE_WIDTH),
            self.title.clone(),
            "=".repeat(RULE_WIDTH),
        ];
        lines.extend(
            self.rows
                .iter()
                .map(|(label, value)| format!("  {:<width$}  {}", format!("{label}:"), value, width = width + 1)),
        );
        lines
    }

    /// Emit every line at info level
    pub fn log(&self) {
        for line in self.lines() {
            info!("{}", line);
        }
    }
}

/// Log a banner line pair used at agent start
pub fn banner(title: &str) {
    info!("{}", "=".repeat(RULE_WIDTH));
    info!("{}", title);
    info!("{}", "=".repeat(RULE_WIDTH));
}
