//! The domain model of the system: one module per Aggregate kind, the
//! [DomainEvent] union shared by the Event Store, and the tagged codec used
//! to persist events in the journal.

pub mod club;
pub mod collective;
pub mod federation;
pub mod player;
pub mod training_session;
pub mod user;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use club::{Club, ClubEvent, ClubRepository, ClubRoot};
pub use collective::{Collective, CollectiveEvent, CollectiveRepository, CollectiveRoot};
pub use federation::{
    Federation, FederationEvent, FederationRepository, FederationRoot, FEDERATION_ID,
};
pub use player::{Player, PlayerEvent, PlayerRepository, PlayerRoot};
pub use training_session::{
    TrainingSession, TrainingSessionEvent, TrainingSessionRepository, TrainingSessionRoot,
};
pub use user::{User, UserEvent, UserRepository, UserRoot};

use crate::{event, message};

pub type ClubId = String;
pub type CollectiveId = String;
pub type PlayerId = String;
pub type TrainingSessionId = String;
pub type UserId = String;
pub type LicenseNumber = String;

/// A playing season, in its `"<start year>/<end year>"` form (e.g.
/// `"2025/2026"`).
pub type Season = String;

/// Generates a new unique identifier for an Aggregate instance.
pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    M,
    F,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::M => "M",
            Gender::F => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseType {
    A,
    B,
    C,
    D,
}

impl LicenseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseType::A => "A",
            LicenseType::B => "B",
            LicenseType::C => "C",
            LicenseType::D => "D",
        }
    }
}

/// The attendance status of a player within a training session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
        }
    }
}

/// The union of all Domain Events recorded by the system, as stored in the
/// shared Event Store log.
///
/// Aggregate-typed repositories convert between this wire representation
/// and their own event enums through the `From`/`TryFrom` bridges below.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    Club(ClubEvent),
    Collective(CollectiveEvent),
    Player(PlayerEvent),
    TrainingSession(TrainingSessionEvent),
    User(UserEvent),
    Federation(FederationEvent),
}

impl message::Message for DomainEvent {
    fn name(&self) -> &'static str {
        match self {
            DomainEvent::Club(event) => event.name(),
            DomainEvent::Collective(event) => event.name(),
            DomainEvent::Player(event) => event.name(),
            DomainEvent::TrainingSession(event) => event.name(),
            DomainEvent::User(event) => event.name(),
            DomainEvent::Federation(event) => event.name(),
        }
    }
}

/// Error returned when converting a [DomainEvent] back into an
/// aggregate-specific event, and the event belongs to a different
/// Aggregate kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected {actual} event in a {expected} event stream")]
pub struct ForeignEvent {
    pub expected: &'static str,
    pub actual: &'static str,
}

macro_rules! domain_event_bridge {
    ($variant:ident, $event:ty, $kind:literal) => {
        impl From<$event> for DomainEvent {
            fn from(event: $event) -> Self {
                DomainEvent::$variant(event)
            }
        }

        impl TryFrom<DomainEvent> for $event {
            type Error = ForeignEvent;

            fn try_from(event: DomainEvent) -> Result<Self, Self::Error> {
                match event {
                    DomainEvent::$variant(event) => Ok(event),
                    other => Err(ForeignEvent {
                        expected: $kind,
                        actual: match other {
                            DomainEvent::Club(_) => "club",
                            DomainEvent::Collective(_) => "collective",
                            DomainEvent::Player(_) => "player",
                            DomainEvent::TrainingSession(_) => "training_session",
                            DomainEvent::User(_) => "user",
                            DomainEvent::Federation(_) => "federation",
                        },
                    }),
                }
            }
        }
    };
}

domain_event_bridge!(Club, ClubEvent, "club");
domain_event_bridge!(Collective, CollectiveEvent, "collective");
domain_event_bridge!(Player, PlayerEvent, "player");
domain_event_bridge!(TrainingSession, TrainingSessionEvent, "training_session");
domain_event_bridge!(User, UserEvent, "user");
domain_event_bridge!(Federation, FederationEvent, "federation");

/// Errors returned by the [EventSerde] codec.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The type tag read from storage is not part of the registry.
    #[error("unknown event type tag: {0}")]
    UnknownType(String),

    /// The payload could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

// The on-disk payload shape: the envelope fields next to the flattened
// event payload. Missing envelope fields in older journals are defaulted.
#[derive(Serialize)]
struct WireEvent<'a, P> {
    event_id: Uuid,
    triggered_at: DateTime<Utc>,
    actor_id: &'a str,
    #[serde(flatten)]
    payload: &'a P,
}

#[derive(Deserialize)]
struct WireParts<P> {
    #[serde(default = "Uuid::new_v4")]
    event_id: Uuid,
    #[serde(default = "Utc::now")]
    triggered_at: DateTime<Utc>,
    #[serde(default)]
    actor_id: String,
    #[serde(flatten)]
    payload: P,
}

fn encode<P>(envelope: &event::Envelope<DomainEvent>, payload: &P) -> Result<String, CodecError>
where
    P: Serialize,
{
    Ok(serde_json::to_string(&WireEvent {
        event_id: envelope.id,
        triggered_at: envelope.recorded_at,
        actor_id: &envelope.actor_id,
        payload,
    })?)
}

fn decode<P, F>(data: &str, wrap: F) -> Result<event::Envelope<DomainEvent>, CodecError>
where
    P: DeserializeOwned,
    F: FnOnce(P) -> DomainEvent,
{
    let wire: WireParts<P> = serde_json::from_str(data)?;

    Ok(event::Envelope {
        id: wire.event_id,
        actor_id: wire.actor_id,
        recorded_at: wire.triggered_at,
        message: wrap(wire.payload),
    })
}

/// The type registry of the system: serializes Domain Events to the journal
/// payload format and resolves them back from their stable type tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventSerde;

impl crate::serde::Serde<event::Envelope<DomainEvent>> for EventSerde {
    type Error = CodecError;

    fn serialize(&self, value: &event::Envelope<DomainEvent>) -> Result<String, CodecError> {
        match &value.message {
            DomainEvent::Club(ClubEvent::Created(p)) => encode(value, p),
            DomainEvent::Club(ClubEvent::OwnerChanged(p)) => encode(value, p),
            DomainEvent::Club(ClubEvent::CoachAdded(p)) => encode(value, p),
            DomainEvent::Collective(CollectiveEvent::Created(p)) => encode(value, p),
            DomainEvent::Collective(CollectiveEvent::PlayerAdded(p)) => encode(value, p),
            DomainEvent::Collective(CollectiveEvent::PlayerRemoved(p)) => encode(value, p),
            DomainEvent::Player(PlayerEvent::Registered(p)) => encode(value, p),
            DomainEvent::Player(PlayerEvent::RegisteredToClub(p)) => encode(value, p),
            DomainEvent::Player(PlayerEvent::UnregisteredFromClub(p)) => encode(value, p),
            DomainEvent::TrainingSession(TrainingSessionEvent::Created(p)) => encode(value, p),
            DomainEvent::TrainingSession(TrainingSessionEvent::Cancelled(p)) => encode(value, p),
            DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToPresent(p)) => {
                encode(value, p)
            }
            DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToAbsent(p)) => {
                encode(value, p)
            }
            DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToLate(p)) => {
                encode(value, p)
            }
            DomainEvent::User(UserEvent::SignedUp(p)) => encode(value, p),
            DomainEvent::User(UserEvent::NameUpdated(p)) => encode(value, p),
            DomainEvent::User(UserEvent::EmailUpdated(p)) => encode(value, p),
            DomainEvent::Federation(FederationEvent::Instituted(p)) => encode(value, p),
            DomainEvent::Federation(FederationEvent::PlayerLicenseRegistered(p)) => {
                encode(value, p)
            }
        }
    }

    fn deserialize(
        &self,
        type_name: &str,
        data: &str,
    ) -> Result<event::Envelope<DomainEvent>, CodecError> {
        match type_name {
            "ClubCreated" => decode(data, |p| DomainEvent::Club(ClubEvent::Created(p))),
            "ClubOwnerChanged" => decode(data, |p| DomainEvent::Club(ClubEvent::OwnerChanged(p))),
            "CoachAdded" => decode(data, |p| DomainEvent::Club(ClubEvent::CoachAdded(p))),
            "CollectiveCreated" => {
                decode(data, |p| DomainEvent::Collective(CollectiveEvent::Created(p)))
            }
            "PlayerAddedToCollective" => decode(data, |p| {
                DomainEvent::Collective(CollectiveEvent::PlayerAdded(p))
            }),
            "PlayerRemovedFromCollective" => decode(data, |p| {
                DomainEvent::Collective(CollectiveEvent::PlayerRemoved(p))
            }),
            "PlayerRegistered" => decode(data, |p| DomainEvent::Player(PlayerEvent::Registered(p))),
            "PlayerRegisteredToClub" => {
                decode(data, |p| DomainEvent::Player(PlayerEvent::RegisteredToClub(p)))
            }
            "PlayerUnregisteredFromClub" => decode(data, |p| {
                DomainEvent::Player(PlayerEvent::UnregisteredFromClub(p))
            }),
            "TrainingSessionCreated" => decode(data, |p| {
                DomainEvent::TrainingSession(TrainingSessionEvent::Created(p))
            }),
            "TrainingSessionCancelled" => decode(data, |p| {
                DomainEvent::TrainingSession(TrainingSessionEvent::Cancelled(p))
            }),
            "PlayerTrainingSessionStatusChangedToPresent" => decode(data, |p| {
                DomainEvent::TrainingSession(
                    TrainingSessionEvent::PlayerStatusChangedToPresent(p),
                )
            }),
            "PlayerTrainingSessionStatusChangedToAbsent" => decode(data, |p| {
                DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToAbsent(p))
            }),
            "PlayerTrainingSessionStatusChangedToLate" => decode(data, |p| {
                DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToLate(p))
            }),
            "UserSignedUp" => decode(data, |p| DomainEvent::User(UserEvent::SignedUp(p))),
            "UserNameUpdated" => decode(data, |p| DomainEvent::User(UserEvent::NameUpdated(p))),
            "UserEmailUpdated" => decode(data, |p| DomainEvent::User(UserEvent::EmailUpdated(p))),
            "FederationInstituted" => {
                decode(data, |p| DomainEvent::Federation(FederationEvent::Instituted(p)))
            }
            "PlayerLicenseRegistered" => decode(data, |p| {
                DomainEvent::Federation(FederationEvent::PlayerLicenseRegistered(p))
            }),
            other => Err(CodecError::UnknownType(other.to_owned())),
        }
    }
}
