//! The TrainingSession aggregate: a scheduled club training with per-player
//! attendance tracking. Sessions are never deleted; cancellation is a
//! terminal state recorded as an event.

use std::borrow::{Borrow, BorrowMut};
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Root as AggregateRoot};
use crate::domain::{new_id, AttendanceStatus, ClubId, DomainEvent, PlayerId, TrainingSessionId};
use crate::event;
use crate::fault::Fault;
use crate::message::{ActorId, Message};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSessionCreated {
    pub training_session_id: TrainingSessionId,
    pub club_id: ClubId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingSessionCancelled {
    pub training_session_id: TrainingSessionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTrainingSessionStatusChangedToPresent {
    pub training_session_id: TrainingSessionId,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTrainingSessionStatusChangedToAbsent {
    pub training_session_id: TrainingSessionId,
    pub player_id: PlayerId,
    #[serde(default)]
    pub with_reason: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerTrainingSessionStatusChangedToLate {
    pub training_session_id: TrainingSessionId,
    pub player_id: PlayerId,
    pub arrival_time: DateTime<Utc>,
    #[serde(default)]
    pub with_reason: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainingSessionEvent {
    Created(TrainingSessionCreated),
    Cancelled(TrainingSessionCancelled),
    PlayerStatusChangedToPresent(PlayerTrainingSessionStatusChangedToPresent),
    PlayerStatusChangedToAbsent(PlayerTrainingSessionStatusChangedToAbsent),
    PlayerStatusChangedToLate(PlayerTrainingSessionStatusChangedToLate),
}

impl Message for TrainingSessionEvent {
    fn name(&self) -> &'static str {
        match self {
            TrainingSessionEvent::Created(_) => "TrainingSessionCreated",
            TrainingSessionEvent::Cancelled(_) => "TrainingSessionCancelled",
            TrainingSessionEvent::PlayerStatusChangedToPresent(_) => {
                "PlayerTrainingSessionStatusChangedToPresent"
            }
            TrainingSessionEvent::PlayerStatusChangedToAbsent(_) => {
                "PlayerTrainingSessionStatusChangedToAbsent"
            }
            TrainingSessionEvent::PlayerStatusChangedToLate(_) => {
                "PlayerTrainingSessionStatusChangedToLate"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrainingSessionError {
    #[error("training session has not been created yet")]
    NotCreatedYet,
    #[error("training session has already been created")]
    AlreadyCreated,
    #[error("training session end time must be after its start time")]
    InvalidWindow,
    #[error("training session has been cancelled")]
    Cancelled,
    #[error("training session has already been cancelled")]
    AlreadyCancelled,
    #[error("a late arrival requires an arrival time")]
    MissingArrivalTime,
    #[error("arrival time must fall within the session window")]
    ArrivalOutsideSession,
}

impl From<TrainingSessionError> for Fault {
    fn from(err: TrainingSessionError) -> Self {
        Fault::InvalidOperation(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSession {
    id: TrainingSessionId,
    club_id: ClubId,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    cancelled: bool,
    attendance: HashMap<PlayerId, AttendanceStatus>,
}

impl TrainingSession {
    pub fn club_id(&self) -> &ClubId {
        &self.club_id
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn attendance(&self) -> &HashMap<PlayerId, AttendanceStatus> {
        &self.attendance
    }
}

impl aggregate::Aggregate for TrainingSession {
    type Id = TrainingSessionId;
    type Event = TrainingSessionEvent;
    type Error = TrainingSessionError;

    fn type_name() -> &'static str {
        "training_session"
    }

    fn aggregate_id(&self) -> &Self::Id {
        &self.id
    }

    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => match event {
                TrainingSessionEvent::Created(created) => Ok(TrainingSession {
                    id: created.training_session_id,
                    club_id: created.club_id,
                    start_time: created.start_time,
                    end_time: created.end_time,
                    cancelled: false,
                    attendance: HashMap::default(),
                }),
                _ => Err(TrainingSessionError::NotCreatedYet),
            },
            Some(mut session) => match event {
                TrainingSessionEvent::Cancelled(_) => {
                    session.cancelled = true;
                    Ok(session)
                }
                TrainingSessionEvent::PlayerStatusChangedToPresent(changed) => {
                    session
                        .attendance
                        .insert(changed.player_id, AttendanceStatus::Present);
                    Ok(session)
                }
                TrainingSessionEvent::PlayerStatusChangedToAbsent(changed) => {
                    session
                        .attendance
                        .insert(changed.player_id, AttendanceStatus::Absent);
                    Ok(session)
                }
                TrainingSessionEvent::PlayerStatusChangedToLate(changed) => {
                    session
                        .attendance
                        .insert(changed.player_id, AttendanceStatus::Late);
                    Ok(session)
                }
                TrainingSessionEvent::Created(_) => Err(TrainingSessionError::AlreadyCreated),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSessionRoot(aggregate::Context<TrainingSession>);

impl AggregateRoot<TrainingSession> for TrainingSessionRoot {}

impl From<aggregate::Context<TrainingSession>> for TrainingSessionRoot {
    fn from(context: aggregate::Context<TrainingSession>) -> Self {
        Self(context)
    }
}

impl Borrow<aggregate::Context<TrainingSession>> for TrainingSessionRoot {
    fn borrow(&self) -> &aggregate::Context<TrainingSession> {
        &self.0
    }
}

impl BorrowMut<aggregate::Context<TrainingSession>> for TrainingSessionRoot {
    fn borrow_mut(&mut self) -> &mut aggregate::Context<TrainingSession> {
        &mut self.0
    }
}

impl TrainingSessionRoot {
    pub fn create(
        actor_id: ActorId,
        club_id: ClubId,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, TrainingSessionError> {
        if end_time <= start_time {
            return Err(TrainingSessionError::InvalidWindow);
        }

        Self::record_new(event::Envelope::new(
            actor_id,
            TrainingSessionEvent::Created(TrainingSessionCreated {
                training_session_id: new_id(),
                club_id,
                start_time,
                end_time,
            }),
        ))
    }

    pub fn cancel(&mut self, actor_id: ActorId) -> Result<(), TrainingSessionError> {
        if self.state().cancelled {
            return Err(TrainingSessionError::AlreadyCancelled);
        }

        let training_session_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            TrainingSessionEvent::Cancelled(TrainingSessionCancelled {
                training_session_id,
            }),
        ))
    }

    pub fn change_player_status(
        &mut self,
        player_id: PlayerId,
        status: AttendanceStatus,
        reason: Option<String>,
        with_reason: bool,
        arrival_time: Option<DateTime<Utc>>,
        actor_id: ActorId,
    ) -> Result<(), TrainingSessionError> {
        if self.state().cancelled {
            return Err(TrainingSessionError::Cancelled);
        }

        let training_session_id = self.aggregate_id().clone();

        let event = match status {
            AttendanceStatus::Present => TrainingSessionEvent::PlayerStatusChangedToPresent(
                PlayerTrainingSessionStatusChangedToPresent {
                    training_session_id,
                    player_id,
                },
            ),
            AttendanceStatus::Absent => TrainingSessionEvent::PlayerStatusChangedToAbsent(
                PlayerTrainingSessionStatusChangedToAbsent {
                    training_session_id,
                    player_id,
                    with_reason,
                    reason,
                },
            ),
            AttendanceStatus::Late => {
                let arrival_time =
                    arrival_time.ok_or(TrainingSessionError::MissingArrivalTime)?;

                if arrival_time < self.state().start_time || arrival_time > self.state().end_time {
                    return Err(TrainingSessionError::ArrivalOutsideSession);
                }

                TrainingSessionEvent::PlayerStatusChangedToLate(
                    PlayerTrainingSessionStatusChangedToLate {
                        training_session_id,
                        player_id,
                        arrival_time,
                        with_reason,
                        reason,
                    },
                )
            }
        };

        self.record_that(event::Envelope::new(actor_id, event))
    }
}

pub type TrainingSessionRepository<S> =
    aggregate::EventSourced<TrainingSession, TrainingSessionRoot, S, DomainEvent>;
