//! The Player aggregate: a licensed (or yet unlicensed) player and their
//! club membership over seasons.

use std::borrow::{Borrow, BorrowMut};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Root as AggregateRoot};
use crate::domain::{
    new_id, ClubId, DomainEvent, Gender, LicenseNumber, LicenseType, PlayerId, Season,
};
use crate::event;
use crate::fault::Fault;
use crate::message::{ActorId, Message};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegistered {
    pub player_id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub license_number: Option<LicenseNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRegisteredToClub {
    pub player_id: PlayerId,
    pub club_id: ClubId,
    pub season: Season,
    #[serde(default)]
    pub license_type: Option<LicenseType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerUnregisteredFromClub {
    pub player_id: PlayerId,
    pub club_id: ClubId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Registered(PlayerRegistered),
    RegisteredToClub(PlayerRegisteredToClub),
    UnregisteredFromClub(PlayerUnregisteredFromClub),
}

impl Message for PlayerEvent {
    fn name(&self) -> &'static str {
        match self {
            PlayerEvent::Registered(_) => "PlayerRegistered",
            PlayerEvent::RegisteredToClub(_) => "PlayerRegisteredToClub",
            PlayerEvent::UnregisteredFromClub(_) => "PlayerUnregisteredFromClub",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    #[error("player has not been registered yet")]
    NotRegisteredYet,
    #[error("player has already been registered")]
    AlreadyRegistered,
    #[error("player name cannot be empty")]
    EmptyName,
}

impl From<PlayerError> for Fault {
    fn from(err: PlayerError) -> Self {
        Fault::InvalidOperation(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    id: PlayerId,
    first_name: String,
    last_name: String,
    gender: Gender,
    date_of_birth: NaiveDate,
    license_number: Option<LicenseNumber>,
    club_id: Option<ClubId>,
    season: Option<Season>,
    license_type: Option<LicenseType>,
}

impl Player {
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn club_id(&self) -> Option<&ClubId> {
        self.club_id.as_ref()
    }

    pub fn license_number(&self) -> Option<&LicenseNumber> {
        self.license_number.as_ref()
    }
}

impl aggregate::Aggregate for Player {
    type Id = PlayerId;
    type Event = PlayerEvent;
    type Error = PlayerError;

    fn type_name() -> &'static str {
        "player"
    }

    fn aggregate_id(&self) -> &Self::Id {
        &self.id
    }

    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => match event {
                PlayerEvent::Registered(registered) => Ok(Player {
                    id: registered.player_id,
                    first_name: registered.first_name,
                    last_name: registered.last_name,
                    gender: registered.gender,
                    date_of_birth: registered.date_of_birth,
                    license_number: registered.license_number,
                    club_id: None,
                    season: None,
                    license_type: None,
                }),
                _ => Err(PlayerError::NotRegisteredYet),
            },
            Some(mut player) => match event {
                PlayerEvent::RegisteredToClub(registered) => {
                    player.club_id = Some(registered.club_id);
                    player.season = Some(registered.season);
                    player.license_type = registered.license_type;
                    Ok(player)
                }
                PlayerEvent::UnregisteredFromClub(_) => {
                    player.club_id = None;
                    Ok(player)
                }
                PlayerEvent::Registered(_) => Err(PlayerError::AlreadyRegistered),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlayerRoot(aggregate::Context<Player>);

impl AggregateRoot<Player> for PlayerRoot {}

impl From<aggregate::Context<Player>> for PlayerRoot {
    fn from(context: aggregate::Context<Player>) -> Self {
        Self(context)
    }
}

impl Borrow<aggregate::Context<Player>> for PlayerRoot {
    fn borrow(&self) -> &aggregate::Context<Player> {
        &self.0
    }
}

impl BorrowMut<aggregate::Context<Player>> for PlayerRoot {
    fn borrow_mut(&mut self) -> &mut aggregate::Context<Player> {
        &mut self.0
    }
}

impl PlayerRoot {
    pub fn register(
        actor_id: ActorId,
        first_name: String,
        last_name: String,
        gender: Gender,
        date_of_birth: NaiveDate,
        license_number: Option<LicenseNumber>,
    ) -> Result<Self, PlayerError> {
        if first_name.trim().is_empty() || last_name.trim().is_empty() {
            return Err(PlayerError::EmptyName);
        }

        Self::record_new(event::Envelope::new(
            actor_id,
            PlayerEvent::Registered(PlayerRegistered {
                player_id: new_id(),
                first_name,
                last_name,
                gender,
                date_of_birth,
                license_number,
            }),
        ))
    }

    /// Registers the player to a club for a season.
    ///
    /// When the player is already registered to a different club, the
    /// previous membership is implicitly closed in the same command: an
    /// unregistration event is recorded first, then the new registration.
    /// Re-registering to the current club records nothing.
    pub fn register_to_club(
        &mut self,
        club_id: ClubId,
        season: Season,
        license_type: Option<LicenseType>,
        actor_id: ActorId,
    ) -> Result<(), PlayerError> {
        let player_id = self.aggregate_id().clone();

        match self.state().club_id.clone() {
            Some(current) if current == club_id => return Ok(()),
            Some(current) => {
                self.record_that(event::Envelope::new(
                    actor_id.clone(),
                    PlayerEvent::UnregisteredFromClub(PlayerUnregisteredFromClub {
                        player_id: player_id.clone(),
                        club_id: current,
                    }),
                ))?;
            }
            None => {}
        }

        self.record_that(event::Envelope::new(
            actor_id,
            PlayerEvent::RegisteredToClub(PlayerRegisteredToClub {
                player_id,
                club_id,
                season,
                license_type,
            }),
        ))
    }
}

pub type PlayerRepository<S> = aggregate::EventSourced<Player, PlayerRoot, S, DomainEvent>;
