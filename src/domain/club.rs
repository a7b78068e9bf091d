//! The Club aggregate: the tenant boundary of the system. A Club is owned
//! by a user, can enroll coaches and keeps its federation registration
//! number.

use std::borrow::{Borrow, BorrowMut};

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Root as AggregateRoot};
use crate::domain::{new_id, ClubId, DomainEvent, UserId};
use crate::event;
use crate::fault::Fault;
use crate::message::{ActorId, Message};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubCreated {
    pub club_id: ClubId,
    pub name: String,
    #[serde(default)]
    pub registration_number: Option<String>,
    pub owner_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClubOwnerChanged {
    pub club_id: ClubId,
    pub new_owner_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachAdded {
    pub club_id: ClubId,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClubEvent {
    Created(ClubCreated),
    OwnerChanged(ClubOwnerChanged),
    CoachAdded(CoachAdded),
}

impl Message for ClubEvent {
    fn name(&self) -> &'static str {
        match self {
            ClubEvent::Created(_) => "ClubCreated",
            ClubEvent::OwnerChanged(_) => "ClubOwnerChanged",
            ClubEvent::CoachAdded(_) => "CoachAdded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClubError {
    #[error("club has not been created yet")]
    NotCreatedYet,
    #[error("club has already been created")]
    AlreadyCreated,
    #[error("club name cannot be empty")]
    EmptyName,
    #[error("new owner must be different from the current owner")]
    SameOwner,
}

impl From<ClubError> for Fault {
    fn from(err: ClubError) -> Self {
        Fault::InvalidOperation(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Club {
    id: ClubId,
    name: String,
    registration_number: Option<String>,
    owner_id: UserId,
    coaches: Vec<UserId>,
}

impl Club {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn coaches(&self) -> &[UserId] {
        &self.coaches
    }

    pub fn registration_number(&self) -> Option<&str> {
        self.registration_number.as_deref()
    }
}

impl aggregate::Aggregate for Club {
    type Id = ClubId;
    type Event = ClubEvent;
    type Error = ClubError;

    fn type_name() -> &'static str {
        "club"
    }

    fn aggregate_id(&self) -> &Self::Id {
        &self.id
    }

    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => match event {
                ClubEvent::Created(created) => Ok(Club {
                    id: created.club_id,
                    name: created.name,
                    registration_number: created.registration_number,
                    owner_id: created.owner_id,
                    coaches: Vec::default(),
                }),
                _ => Err(ClubError::NotCreatedYet),
            },
            Some(mut club) => match event {
                ClubEvent::OwnerChanged(changed) => {
                    club.owner_id = changed.new_owner_id;
                    Ok(club)
                }
                ClubEvent::CoachAdded(added) => {
                    club.coaches.push(added.user_id);
                    Ok(club)
                }
                ClubEvent::Created(_) => Err(ClubError::AlreadyCreated),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClubRoot(aggregate::Context<Club>);

impl AggregateRoot<Club> for ClubRoot {}

impl From<aggregate::Context<Club>> for ClubRoot {
    fn from(context: aggregate::Context<Club>) -> Self {
        Self(context)
    }
}

impl Borrow<aggregate::Context<Club>> for ClubRoot {
    fn borrow(&self) -> &aggregate::Context<Club> {
        &self.0
    }
}

impl BorrowMut<aggregate::Context<Club>> for ClubRoot {
    fn borrow_mut(&mut self) -> &mut aggregate::Context<Club> {
        &mut self.0
    }
}

impl ClubRoot {
    pub fn create(
        actor_id: ActorId,
        name: String,
        registration_number: Option<String>,
        owner_id: UserId,
    ) -> Result<Self, ClubError> {
        if name.trim().is_empty() {
            return Err(ClubError::EmptyName);
        }

        Self::record_new(event::Envelope::new(
            actor_id,
            ClubEvent::Created(ClubCreated {
                club_id: new_id(),
                name,
                registration_number,
                owner_id,
            }),
        ))
    }

    pub fn change_owner(&mut self, new_owner_id: UserId, actor_id: ActorId) -> Result<(), ClubError> {
        if self.state().owner_id == new_owner_id {
            return Err(ClubError::SameOwner);
        }

        let club_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            ClubEvent::OwnerChanged(ClubOwnerChanged {
                club_id,
                new_owner_id,
            }),
        ))
    }

    /// Enrolls a coach into the club. Adding a user that is already a
    /// coach records nothing.
    pub fn add_coach(&mut self, user_id: UserId, actor_id: ActorId) -> Result<(), ClubError> {
        if self.state().coaches.contains(&user_id) {
            return Ok(());
        }

        let club_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            ClubEvent::CoachAdded(CoachAdded { club_id, user_id }),
        ))
    }
}

pub type ClubRepository<S> = aggregate::EventSourced<Club, ClubRoot, S, DomainEvent>;
