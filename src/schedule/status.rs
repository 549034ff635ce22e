use tracing::debug;

use super::types::{AppointmentStatus, Role};
use crate::error::{SchedulingError, SchedulingResult};

use AppointmentStatus::*;

/// Who is acting on an appointment, as far as lifecycle rules care
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
    Admin,
    /// The staff member the appointment is assigned to
    Owner,
}

impl Actor {
    fn label(self) -> &'static str {
        match self {
            Actor::Admin => "admin",
            Actor::Owner => "staff",
        }
    }
}

/// Allowed targets keyed by (current status, actor)
const TRANSITIONS: &[((AppointmentStatus, Actor), &[AppointmentStatus])] = &[
    ((Requested, Actor::Admin), &[Scheduled, Denied]),
    ((Scheduled, Actor::Admin), &[Confirmed, Cancelled]),
    ((Scheduled, Actor::Owner), &[Confirmed, Cancelled]),
    ((Confirmed, Actor::Admin), &[Completed, Cancelled]),
    ((Confirmed, Actor::Owner), &[Completed, Cancelled]),
];

/// Role-gated appointment lifecycle
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusStateMachine;

impl StatusStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Targets reachable from `from` by `actor`
    pub fn allowed_targets(
        &self,
        from: AppointmentStatus,
        actor: Actor,
    ) -> &'static [AppointmentStatus] {
        TRANSITIONS
            .iter()
            .find(|(key, _)| *key == (from, actor))
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    /// True if any actor may move `from` to `to`
    pub fn is_edge(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        TRANSITIONS
            .iter()
            .any(|((source, _), targets)| *source == from && targets.contains(&to))
    }

    /// Checks a transition.
    ///
    /// Edges missing from the table, including every edge out of a terminal status,
    /// fail with `InvalidStateTransition`. An existing edge taken by the wrong actor
    /// fails with `Authorization`.
    pub fn validate(
        &self,
        from: AppointmentStatus,
        to: AppointmentStatus,
        actor: Actor,
    ) -> SchedulingResult<()> {
        if from.is_terminal() || !self.is_edge(from, to) {
            debug!(%from, %to, "rejected status transition");
            return Err(SchedulingError::InvalidStateTransition { from, to });
        }
        if !self.allowed_targets(from, actor).contains(&to) {
            debug!(%from, %to, actor = actor.label(), "actor may not take this transition");
            return Err(SchedulingError::unauthorized(format!(
                "{} may not move an appointment from {} to {}",
                actor.label(),
                from,
                to
            )));
        }
        Ok(())
    }
}

/// Maps a principal's role onto a lifecycle actor; only admins and the owning staff member act.
pub fn actor_for(role: Role, is_owner: bool) -> Option<Actor> {
    match role {
        Role::Admin => Some(Actor::Admin),
        Role::Staff if is_owner => Some(Actor::Owner),
        _ => None,
    }
}
