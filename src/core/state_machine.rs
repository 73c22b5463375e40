//! State tracking for a single publish attempt
//!
//! Every run walks
//! `Init → Resolved → Validated → DigestObtained` and then either stops at
//! `ShortCircuitDone` or continues `Pushed → Polling` to one of the terminal
//! outcomes. The machine is in-memory only; the store owns publish history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Publishing state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublishState {
    Init,
    Resolved,
    Validated,
    DigestObtained,
    ShortCircuitDone,
    Pushed,
    Polling,
    Success,
    PublishErrorReported,
    RaceError,
    Failed,
}

impl PublishState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ShortCircuitDone
                | Self::Success
                | Self::PublishErrorReported
                | Self::RaceError
                | Self::Failed
        )
    }

    /// States reachable in one step from `self`
    fn successors(&self) -> &'static [PublishState] {
        use PublishState::*;
        match self {
            Init => &[Resolved, Failed],
            Resolved => &[Validated, Failed],
            Validated => &[DigestObtained, Failed],
            DigestObtained => &[ShortCircuitDone, PublishErrorReported, Pushed, Failed],
            Pushed => &[Polling, Failed],
            Polling => &[Success, PublishErrorReported, RaceError, Failed],
            ShortCircuitDone | Success | PublishErrorReported | RaceError | Failed => &[],
        }
    }
}

/// Rejected state change
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("invalid publish state transition {from:?} -> {to:?}")]
    Invalid { from: PublishState, to: PublishState },

    #[error("publish state {0:?} already visited")]
    Reentered(PublishState),
}

/// State transition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateTransition {
    pub from: PublishState,
    pub to: PublishState,
    pub timestamp: DateTime<Utc>,
}

/// State machine for one publish run
#[derive(Debug)]
pub struct PublishStateMachine {
    current_state: PublishState,
    transitions: Vec<StateTransition>,
}

impl Default for PublishStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: PublishState::Init,
            transitions: Vec::new(),
        }
    }

    /// Transition to a new state
    pub fn transition(&mut self, to: PublishState) -> Result<(), TransitionError> {
        let from = self.current_state;

        if to == PublishState::Init || self.transitions.iter().any(|t| t.to == to) {
            return Err(TransitionError::Reentered(to));
        }
        if !from.successors().contains(&to) {
            return Err(TransitionError::Invalid { from, to });
        }

        self.transitions.push(StateTransition {
            from,
            to,
            timestamp: Utc::now(),
        });
        self.current_state = to;

        tracing::debug!(?from, ?to, "publish state transition");
        Ok(())
    }

    /// Get current state
    pub fn get_state(&self) -> PublishState {
        self.current_state
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Milliseconds between the first and the last transition
    pub fn get_elapsed_time(&self) -> i64 {
        match (self.transitions.first(), self.transitions.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp).num_milliseconds(),
            _ => 0,
        }
    }

    /// Get transition history as human-readable string
    pub fn get_history(&self) -> String {
        self.transitions
            .iter()
            .map(|t| format!("{}: {:?} → {:?}", t.timestamp.to_rfc3339(), t.from, t.to))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
