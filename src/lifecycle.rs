/*!
 * Session lifecycle state machine
 *
 * ```text
 * Requested -> Duplicating -> Starting -> Active -> Stopping -> Deleting -> Ended
 *     \            \             \          \           \           \
 *      +------------+-------------+----------+-----------+-----------+--> Failed
 * ```
 *
 * Only `Active` and `Ended` are ever persisted. Every other phase exists for
 * the duration of one launch or teardown request and is tracked by a
 * [`PhaseTracker`], which validates each step against the current phase.
 */

use crate::error::{RangeError, Result};
use crate::store::SessionStatus;
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Phase of a single launch or teardown attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Requested,
    Duplicating,
    Starting,
    Active,
    Stopping,
    Deleting,
    Ended,
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::Ended | SessionPhase::Failed)
    }

    pub fn can_transition_to(&self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Requested, Duplicating)
            | (Duplicating, Starting)
            | (Starting, Active)
            | (Active, Stopping)
            | (Stopping, Deleting)
            | (Deleting, Ended) => true,
            _ => false,
        }
    }

    /// The registry status a phase corresponds to, if it is ever stored
    pub fn persisted_status(&self) -> Option<SessionStatus> {
        match self {
            SessionPhase::Active => Some(SessionStatus::Active),
            SessionPhase::Ended => Some(SessionStatus::Ended),
            _ => None,
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Requested => "requested",
            SessionPhase::Duplicating => "duplicating",
            SessionPhase::Starting => "starting",
            SessionPhase::Active => "active",
            SessionPhase::Stopping => "stopping",
            SessionPhase::Deleting => "deleting",
            SessionPhase::Ended => "ended",
            SessionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

impl From<SessionStatus> for SessionPhase {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Active => SessionPhase::Active,
            SessionStatus::Ended => SessionPhase::Ended,
        }
    }
}

/// Validated walk through the phases of one request
#[derive(Debug)]
pub struct PhaseTracker {
    label: String,
    phase: SessionPhase,
    history: Vec<SessionPhase>,
}

impl PhaseTracker {
    /// A fresh launch attempt
    pub fn new(label: impl Into<String>) -> Self {
        Self::resume(label, SessionPhase::Requested)
    }

    /// Continue from a persisted phase (teardown starts at `Active`)
    pub fn resume(label: impl Into<String>, phase: SessionPhase) -> Self {
        Self {
            label: label.into(),
            phase,
            history: vec![phase],
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn history(&self) -> &[SessionPhase] {
        &self.history
    }

    pub fn advance(&mut self, next: SessionPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(RangeError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        info!("{}: {} -> {}", self.label, self.phase, next);
        self.phase = next;
        self.history.push(next);
        Ok(())
    }

    /// Move to `Failed` unless already terminal
    pub fn fail(&mut self, reason: &str) {
        if self.phase.is_terminal() {
            return;
        }
        warn!("{}: {} -> failed ({})", self.label, self.phase, reason);
        self.phase = SessionPhase::Failed;
        self.history.push(SessionPhase::Failed);
    }
}
