//! The Collective aggregate: a named group of players within a club
//! (e.g. a training group or a squad).

use std::borrow::{Borrow, BorrowMut};
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Root as AggregateRoot};
use crate::domain::{new_id, ClubId, CollectiveId, DomainEvent, PlayerId};
use crate::event;
use crate::fault::Fault;
use crate::message::{ActorId, Message};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectiveCreated {
    pub collective_id: CollectiveId,
    pub club_id: ClubId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerAddedToCollective {
    pub collective_id: CollectiveId,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRemovedFromCollective {
    pub collective_id: CollectiveId,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectiveEvent {
    Created(CollectiveCreated),
    PlayerAdded(PlayerAddedToCollective),
    PlayerRemoved(PlayerRemovedFromCollective),
}

impl Message for CollectiveEvent {
    fn name(&self) -> &'static str {
        match self {
            CollectiveEvent::Created(_) => "CollectiveCreated",
            CollectiveEvent::PlayerAdded(_) => "PlayerAddedToCollective",
            CollectiveEvent::PlayerRemoved(_) => "PlayerRemovedFromCollective",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollectiveError {
    #[error("collective has not been created yet")]
    NotCreatedYet,
    #[error("collective has already been created")]
    AlreadyCreated,
    #[error("collective name cannot be empty")]
    EmptyName,
    #[error("player {0} is already in the collective")]
    PlayerAlreadyInCollective(PlayerId),
    #[error("player {0} is not in the collective")]
    PlayerNotInCollective(PlayerId),
}

impl From<CollectiveError> for Fault {
    fn from(err: CollectiveError) -> Self {
        Fault::InvalidOperation(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Collective {
    id: CollectiveId,
    club_id: ClubId,
    name: String,
    description: Option<String>,
    players: HashSet<PlayerId>,
}

impl Collective {
    pub fn club_id(&self) -> &ClubId {
        &self.club_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn players(&self) -> &HashSet<PlayerId> {
        &self.players
    }
}

impl aggregate::Aggregate for Collective {
    type Id = CollectiveId;
    type Event = CollectiveEvent;
    type Error = CollectiveError;

    fn type_name() -> &'static str {
        "collective"
    }

    fn aggregate_id(&self) -> &Self::Id {
        &self.id
    }

    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => match event {
                CollectiveEvent::Created(created) => Ok(Collective {
                    id: created.collective_id,
                    club_id: created.club_id,
                    name: created.name,
                    description: created.description,
                    players: HashSet::default(),
                }),
                _ => Err(CollectiveError::NotCreatedYet),
            },
            Some(mut collective) => match event {
                CollectiveEvent::PlayerAdded(added) => {
                    collective.players.insert(added.player_id);
                    Ok(collective)
                }
                CollectiveEvent::PlayerRemoved(removed) => {
                    collective.players.remove(&removed.player_id);
                    Ok(collective)
                }
                CollectiveEvent::Created(_) => Err(CollectiveError::AlreadyCreated),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectiveRoot(aggregate::Context<Collective>);

impl AggregateRoot<Collective> for CollectiveRoot {}

impl From<aggregate::Context<Collective>> for CollectiveRoot {
    fn from(context: aggregate::Context<Collective>) -> Self {
        Self(context)
    }
}

impl Borrow<aggregate::Context<Collective>> for CollectiveRoot {
    fn borrow(&self) -> &aggregate::Context<Collective> {
        &self.0
    }
}

impl BorrowMut<aggregate::Context<Collective>> for CollectiveRoot {
    fn borrow_mut(&mut self) -> &mut aggregate::Context<Collective> {
        &mut self.0
    }
}

impl CollectiveRoot {
    pub fn create(
        actor_id: ActorId,
        club_id: ClubId,
        name: String,
        description: Option<String>,
    ) -> Result<Self, CollectiveError> {
        if name.trim().is_empty() {
            return Err(CollectiveError::EmptyName);
        }

        Self::record_new(event::Envelope::new(
            actor_id,
            CollectiveEvent::Created(CollectiveCreated {
                collective_id: new_id(),
                club_id,
                name,
                description,
            }),
        ))
    }

    pub fn add_player(
        &mut self,
        player_id: PlayerId,
        actor_id: ActorId,
    ) -> Result<(), CollectiveError> {
        if self.state().players.contains(&player_id) {
            return Err(CollectiveError::PlayerAlreadyInCollective(player_id));
        }

        let collective_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            CollectiveEvent::PlayerAdded(PlayerAddedToCollective {
                collective_id,
                player_id,
            }),
        ))
    }

    pub fn remove_player(
        &mut self,
        player_id: PlayerId,
        actor_id: ActorId,
    ) -> Result<(), CollectiveError> {
        if !self.state().players.contains(&player_id) {
            return Err(CollectiveError::PlayerNotInCollective(player_id));
        }

        let collective_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            CollectiveEvent::PlayerRemoved(PlayerRemovedFromCollective {
                collective_id,
                player_id,
            }),
        ))
    }
}

pub type CollectiveRepository<S> =
    aggregate::EventSourced<Collective, CollectiveRoot, S, DomainEvent>;
