//! Pipeline Status Module
//!
//! Tracks a single action's progress through the pipeline:
//! `idle → building → signing → broadcasting → success | error`.
//! Transitions are strictly forward; the only way back is an explicit reset.
//! Each instance is owned by one pipeline run; status is never shared
//! between concurrent actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Finite status of one in-flight action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Idle,
    Building,
    Signing,
    Broadcasting,
    Success,
    Error,
}

impl PipelineStatus {
    /// User-visible progress message for this state.
    pub fn progress_message(&self) -> &'static str {
        match self {
            PipelineStatus::Idle => "Ready",
            PipelineStatus::Building => "Preparing transaction...",
            PipelineStatus::Signing => "Waiting for signature...",
            PipelineStatus::Broadcasting => "Sending transaction...",
            PipelineStatus::Success => "Done",
            PipelineStatus::Error => "Something went wrong",
        }
    }

    /// Whether this state ends the run (only a reset leaves it).
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Success | PipelineStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            PipelineStatus::Idle => 0,
            PipelineStatus::Building => 1,
            PipelineStatus::Signing => 2,
            PipelineStatus::Broadcasting => 3,
            PipelineStatus::Success | PipelineStatus::Error => 4,
        }
    }
}

/// Error returned when a transition would move backwards or leave a terminal
/// state without a reset.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid status transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: PipelineStatus,
    pub to: PipelineStatus,
}

/// Snapshot of a tracker, serializable toward the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub status: PipelineStatus,
    pub message: String,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Per-action status tracker enforcing forward-only transitions.
#[derive(Debug)]
pub struct StatusTracker {
    status: PipelineStatus,
    tx_hash: Option<String>,
    error: Option<String>,
    updated_at: DateTime<Utc>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self {
            status: PipelineStatus::Idle,
            tx_hash: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// Advances to a non-terminal state.
    ///
    /// `signing` is only reachable after `building`, `broadcasting` only
    /// after `signing`; regressions and re-entry of terminal states are
    /// rejected.
    pub fn advance(&mut self, to: PipelineStatus) -> Result<(), InvalidTransition> {
        let valid = !self.status.is_terminal()
            && !to.is_terminal()
            && to.rank() == self.status.rank() + 1;
        if !valid {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        tracing::info!("pipeline status: {:?} ({})", to, to.progress_message());
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Enters the terminal `success` state with the broadcast hash.
    pub fn succeed(&mut self, tx_hash: &str) -> Result<(), InvalidTransition> {
        if self.status != PipelineStatus::Broadcasting {
            return Err(InvalidTransition {
                from: self.status,
                to: PipelineStatus::Success,
            });
        }
        tracing::info!("pipeline succeeded: {}", tx_hash);
        self.status = PipelineStatus::Success;
        self.tx_hash = Some(tx_hash.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Enters the terminal `error` state with the failure text.
    ///
    /// Valid from any non-terminal state: a run can fail while building,
    /// signing, or broadcasting.
    pub fn fail(&mut self, error: &str) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() {
            return Err(InvalidTransition {
                from: self.status,
                to: PipelineStatus::Error,
            });
        }
        tracing::warn!("pipeline failed: {}", error);
        self.status = PipelineStatus::Error;
        self.error = Some(error.to_string());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Returns to `idle`, clearing the terminal result.
    pub fn reset(&mut self) {
        self.status = PipelineStatus::Idle;
        self.tx_hash = None;
        self.error = None;
        self.updated_at = Utc::now();
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            message: self.status.progress_message().to_string(),
            tx_hash: self.tx_hash.clone(),
            error: self.error.clone(),
            updated_at: self.updated_at,
        }
    }
}

impl Default for StatusTracker {
    fn default() -> Self {
        Self::new()
    }
}
