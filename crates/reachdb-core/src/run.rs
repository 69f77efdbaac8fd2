//! Run record lifecycle types.
//!
//! A run is opened as [`RunStatus::Running`] when a source's pass begins and
//! closed exactly once with a terminal [`RunOutcome`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status: {0}")]
pub struct UnknownRunStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownRunStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(UnknownRunStatus(other.to_string())),
        }
    }
}

/// Per-pass accumulators, mutated only by the pass that owns them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub items_processed: i32,
    pub metrics_collected: i32,
}

impl RunCounts {
    pub fn item_processed(&mut self) {
        self.items_processed = self.items_processed.saturating_add(1);
    }

    pub fn metric_collected(&mut self) {
        self.metrics_collected = self.metrics_collected.saturating_add(1);
    }
}

/// The terminal state written when a run is closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub counts: RunCounts,
    pub error_message: Option<String>,
}

impl RunOutcome {
    #[must_use]
    pub fn completed(counts: RunCounts) -> Self {
        Self {
            status: RunStatus::Completed,
            counts,
            error_message: None,
        }
    }

    #[must_use]
    pub fn failed(counts: RunCounts, error_message: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            counts,
            error_message: Some(error_message.into()),
        }
    }
}
