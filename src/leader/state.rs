//! Leadership state machine.
//!
//! # States
//! ```text
//! Candidate ──Acquired──▶ Leading ──RenewFailed──────────▶ Lost ─────┐
//!     ▲                      │                                       │
//!     │                      ├──Cancelled / EpisodeFinished─▶ Released
//!     │                      │                                       │
//!     └──────────────StoppedNotified─────────────────────────────────┘
//!
//! Candidate ──Cancelled──▶ Stopped
//! ```
//!
//! The transition function is pure: it only decides the next state and the
//! side effects the elector must perform, in order.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderState {
    Candidate,
    Leading,
    Lost,
    Released,
    Stopped,
}

impl fmt::Display for LeaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LeaderState::Candidate => "candidate",
            LeaderState::Leading => "leading",
            LeaderState::Lost => "lost",
            LeaderState::Released => "released",
            LeaderState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderEvent {
    /// The lease was granted to us.
    Acquired,
    /// A renewal landed before the deadline.
    Renewed,
    /// Renewal missed the deadline or another holder was observed.
    RenewFailed,
    /// The episode body returned on its own.
    EpisodeFinished,
    /// The root token was cancelled.
    Cancelled,
    /// `on_stopped_leading` has run.
    StoppedNotified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Spawn `on_started_leading` with a fresh child token.
    StartEpisode,
    /// Cancel the episode token and wait for the body to return.
    CancelEpisode,
    /// Best-effort release of the lock record.
    ReleaseLock,
    /// Invoke `on_stopped_leading`.
    NotifyStopped,
    /// Leave the election loop.
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid leadership transition: {event:?} while {state}")]
pub struct InvalidTransition {
    pub state: LeaderState,
    pub event: LeaderEvent,
}

/// Compute the next state and effects for `event` in `state`.
pub fn transition(
    state: LeaderState,
    event: LeaderEvent,
    release_on_cancel: bool,
) -> Result<(LeaderState, Vec<Effect>), InvalidTransition> {
    use Effect::*;
    use LeaderEvent as E;
    use LeaderState as S;

    let released = |mut effects: Vec<Effect>| {
        if release_on_cancel {
            effects.push(ReleaseLock);
        }
        effects.push(NotifyStopped);
        effects
    };

    let next = match (state, event) {
        (S::Candidate, E::Acquired) => (S::Leading, vec![StartEpisode]),
        (S::Candidate, E::Cancelled) => (S::Stopped, vec![Exit]),

        (S::Leading, E::Renewed) => (S::Leading, vec![]),
        (S::Leading, E::RenewFailed) => (S::Lost, vec![CancelEpisode, NotifyStopped]),
        (S::Leading, E::Cancelled) | (S::Leading, E::EpisodeFinished) => {
            (S::Released, released(vec![CancelEpisode]))
        }

        (S::Lost, E::StoppedNotified) | (S::Released, E::StoppedNotified) => {
            (S::Candidate, vec![])
        }

        (state, event) => return Err(InvalidTransition { state, event }),
    };
    Ok(next)
}

/// Holds the current state and applies [`transition`].
#[derive(Debug, Clone)]
pub struct LeaderStateMachine {
    state: LeaderState,
    release_on_cancel: bool,
}

impl LeaderStateMachine {
    pub fn new(release_on_cancel: bool) -> Self {
        Self {
            state: LeaderState::Candidate,
            release_on_cancel,
        }
    }

    pub fn state(&self) -> LeaderState {
        self.state
    }

    pub fn handle(&mut self, event: LeaderEvent) -> Result<Vec<Effect>, InvalidTransition> {
        let (next, effects) = transition(self.state, event, self.release_on_cancel)?;
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, ?event, "Leadership state transition");
        }
        self.state = next;
        Ok(effects)
    }
}
