//! The Federation aggregate: a singleton keeping the national license
//! registry. Its Event Stream id is fixed, so every deployment works on the
//! same single instance.

use std::borrow::{Borrow, BorrowMut};
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Root as AggregateRoot};
use crate::domain::{DomainEvent, LicenseNumber, LicenseType, PlayerId};
use crate::event;
use crate::fault::Fault;
use crate::message::{ActorId, Message};

/// The fixed identifier (and Event Stream id) of the Federation singleton.
pub const FEDERATION_ID: &str = "FFHB";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationInstituted {
    pub federation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLicenseRegistered {
    pub player_id: PlayerId,
    pub license_number: LicenseNumber,
    pub license_type: LicenseType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederationEvent {
    Instituted(FederationInstituted),
    PlayerLicenseRegistered(PlayerLicenseRegistered),
}

impl Message for FederationEvent {
    fn name(&self) -> &'static str {
        match self {
            FederationEvent::Instituted(_) => "FederationInstituted",
            FederationEvent::PlayerLicenseRegistered(_) => "PlayerLicenseRegistered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FederationError {
    #[error("federation has not been instituted yet")]
    NotInstitutedYet,
    #[error("federation has already been instituted")]
    AlreadyInstituted,
    #[error("license {license_number} is already registered to player {player_id}")]
    LicenseAlreadyRegistered {
        license_number: LicenseNumber,
        player_id: PlayerId,
    },
}

impl From<FederationError> for Fault {
    fn from(err: FederationError) -> Self {
        Fault::InvalidOperation(err.to_string())
    }
}

/// A license registration held by the Federation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLicense {
    pub player_id: PlayerId,
    pub license_type: LicenseType,
}

#[derive(Debug, Clone)]
pub struct Federation {
    id: String,
    licenses: HashMap<LicenseNumber, PlayerLicense>,
}

impl Federation {
    pub fn player_license(&self, license_number: &str) -> Option<&PlayerLicense> {
        self.licenses.get(license_number)
    }
}

impl aggregate::Aggregate for Federation {
    type Id = String;
    type Event = FederationEvent;
    type Error = FederationError;

    fn type_name() -> &'static str {
        "federation"
    }

    // The singleton stream is identified by the federation id itself.
    fn stream_id(id: &Self::Id) -> event::StreamId {
        id.clone()
    }

    fn aggregate_id(&self) -> &Self::Id {
        &self.id
    }

    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => match event {
                FederationEvent::Instituted(instituted) => Ok(Federation {
                    id: instituted.federation_id,
                    licenses: HashMap::default(),
                }),
                _ => Err(FederationError::NotInstitutedYet),
            },
            Some(mut federation) => match event {
                FederationEvent::PlayerLicenseRegistered(registered) => {
                    federation.licenses.insert(
                        registered.license_number,
                        PlayerLicense {
                            player_id: registered.player_id,
                            license_type: registered.license_type,
                        },
                    );
                    Ok(federation)
                }
                FederationEvent::Instituted(_) => Err(FederationError::AlreadyInstituted),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FederationRoot(aggregate::Context<Federation>);

impl AggregateRoot<Federation> for FederationRoot {}

impl From<aggregate::Context<Federation>> for FederationRoot {
    fn from(context: aggregate::Context<Federation>) -> Self {
        Self(context)
    }
}

impl Borrow<aggregate::Context<Federation>> for FederationRoot {
    fn borrow(&self) -> &aggregate::Context<Federation> {
        &self.0
    }
}

impl BorrowMut<aggregate::Context<Federation>> for FederationRoot {
    fn borrow_mut(&mut self) -> &mut aggregate::Context<Federation> {
        &mut self.0
    }
}

impl FederationRoot {
    /// Creates the Federation singleton. Called once, the first time the
    /// singleton stream turns out to be empty.
    pub fn institute(actor_id: ActorId) -> Result<Self, FederationError> {
        Self::record_new(event::Envelope::new(
            actor_id,
            FederationEvent::Instituted(FederationInstituted {
                federation_id: FEDERATION_ID.to_owned(),
            }),
        ))
    }

    /// Registers a license number to a player.
    ///
    /// A license number maps to at most one player: registering it to a
    /// different player fails, while re-registering the same license to the
    /// same player records nothing.
    pub fn register_player_license(
        &mut self,
        player_id: PlayerId,
        license_number: LicenseNumber,
        license_type: LicenseType,
        actor_id: ActorId,
    ) -> Result<(), FederationError> {
        if let Some(license) = self.state().licenses.get(&license_number) {
            if license.player_id != player_id {
                return Err(FederationError::LicenseAlreadyRegistered {
                    license_number,
                    player_id: license.player_id.clone(),
                });
            }

            return Ok(());
        }

        self.record_that(event::Envelope::new(
            actor_id,
            FederationEvent::PlayerLicenseRegistered(PlayerLicenseRegistered {
                player_id,
                license_number,
                license_type,
            }),
        ))
    }
}

pub type FederationRepository<S> =
    aggregate::EventSourced<Federation, FederationRoot, S, DomainEvent>;

#[cfg(test)]
mod test {
    use crate::aggregate::Aggregate;

    use super::*;

    fn federation() -> FederationRoot {
        FederationRoot::institute("u1".to_owned()).expect("federation should be instituted")
    }

    #[test]
    fn the_singleton_stream_id_is_fixed() {
        assert_eq!(FEDERATION_ID, Federation::stream_id(&FEDERATION_ID.to_owned()));
    }

    #[test]
    fn a_license_maps_to_at_most_one_player() {
        let mut federation = federation();

        federation
            .register_player_license(
                "p1".to_owned(),
                "L1".to_owned(),
                LicenseType::A,
                "u1".to_owned(),
            )
            .expect("license registration should succeed");

        let result = federation.register_player_license(
            "p2".to_owned(),
            "L1".to_owned(),
            LicenseType::B,
            "u1".to_owned(),
        );

        assert_eq!(
            Err(FederationError::LicenseAlreadyRegistered {
                license_number: "L1".to_owned(),
                player_id: "p1".to_owned(),
            }),
            result,
        );
    }

    #[test]
    fn re_registering_the_same_license_to_the_same_player_records_nothing() {
        let mut federation = federation();

        federation
            .register_player_license(
                "p1".to_owned(),
                "L1".to_owned(),
                LicenseType::A,
                "u1".to_owned(),
            )
            .expect("license registration should succeed");

        federation
            .register_player_license(
                "p1".to_owned(),
                "L1".to_owned(),
                LicenseType::A,
                "u1".to_owned(),
            )
            .expect("re-registration should be a no-op");

        assert_eq!(1, federation.version());
        assert_eq!(2, federation.ctx().uncommitted_events().len());
    }
}
