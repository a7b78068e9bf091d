//! This module contains the definition of a [Message] type, used to describe
//! domain values such as a Domain Event ([`crate::event::Envelope`]) or a
//! Domain Command ([`crate::command::Envelope`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of the authenticated principal that caused a [Message].
pub type ActorId = String;

/// Represents a piece of domain data that occurs in the system.
///
/// Each Message has a specific name, which should be unique within the
/// domain you're operating in, and is used as the stable type tag when the
/// Message is persisted or routed. Example: a Domain Event that represents
/// when a Club was created has the `name()`: `"ClubCreated"`.
pub trait Message {
    /// Returns the domain name of the [Message].
    fn name(&self) -> &'static str;
}

/// Represents a [Message] packaged for persistence and/or processing by
/// other parts of the system.
///
/// It carries the actual message (i.e. a payload), the unique id assigned to
/// this occurrence, the actor that caused it and the moment it was recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T>
where
    T: Message,
{
    /// Unique identifier of this specific message occurrence.
    pub id: Uuid,

    /// The principal that caused the message.
    pub actor_id: ActorId,

    /// The instant the message was recorded by the application.
    pub recorded_at: DateTime<Utc>,

    /// The message payload.
    pub message: T,
}

impl<T> Envelope<T>
where
    T: Message,
{
    /// Wraps the given payload in a new [Envelope], stamping it with a fresh
    /// id and the current time.
    pub fn new(actor_id: impl Into<ActorId>, message: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.into(),
            recorded_at: Utc::now(),
            message,
        }
    }

    /// Maps the payload of the [Envelope] to a different type, preserving
    /// id, actor and timestamp.
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        U: Message,
        F: FnOnce(T) -> U,
    {
        Envelope {
            id: self.id,
            actor_id: self.actor_id,
            recorded_at: self.recorded_at,
            message: f(self.message),
        }
    }

    /// Attempts to map the payload of the [Envelope] to a different type,
    /// preserving id, actor and timestamp.
    pub fn try_map<U, E, F>(self, f: F) -> Result<Envelope<U>, E>
    where
        U: Message,
        F: FnOnce(T) -> Result<U, E>,
    {
        Ok(Envelope {
            id: self.id,
            actor_id: self.actor_id,
            recorded_at: self.recorded_at,
            message: f(self.message)?,
        })
    }
}

impl<T> From<T> for Envelope<T>
where
    T: Message,
{
    fn from(message: T) -> Self {
        Envelope::new(ActorId::default(), message)
    }
}

// Identity fields are storage-assigned; two envelopes are the same message
// when their payloads are the same.
impl<T> PartialEq for Envelope<T>
where
    T: Message + PartialEq,
{
    fn eq(&self, other: &Envelope<T>) -> bool {
        self.message == other.message
    }
}
