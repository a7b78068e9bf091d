//! The User aggregate: an authenticated account. The user id comes from the
//! external identity provider; the aggregate only tracks profile data.

use std::borrow::{Borrow, BorrowMut};

use serde::{Deserialize, Serialize};

use crate::aggregate::{self, Root as AggregateRoot};
use crate::domain::{DomainEvent, UserId};
use crate::event;
use crate::fault::Fault;
use crate::message::{ActorId, Message};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSignedUp {
    pub user_id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNameUpdated {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEmailUpdated {
    pub user_id: UserId,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserEvent {
    SignedUp(UserSignedUp),
    NameUpdated(UserNameUpdated),
    EmailUpdated(UserEmailUpdated),
}

impl Message for UserEvent {
    fn name(&self) -> &'static str {
        match self {
            UserEvent::SignedUp(_) => "UserSignedUp",
            UserEvent::NameUpdated(_) => "UserNameUpdated",
            UserEvent::EmailUpdated(_) => "UserEmailUpdated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("user has not signed up yet")]
    NotSignedUpYet,
    #[error("user has already signed up")]
    AlreadySignedUp,
    #[error("user id cannot be empty")]
    EmptyUserId,
}

impl From<UserError> for Fault {
    fn from(err: UserError) -> Self {
        Fault::InvalidOperation(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct User {
    id: UserId,
    name: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
}

impl User {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl aggregate::Aggregate for User {
    type Id = UserId;
    type Event = UserEvent;
    type Error = UserError;

    fn type_name() -> &'static str {
        "user"
    }

    fn aggregate_id(&self) -> &Self::Id {
        &self.id
    }

    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error> {
        match state {
            None => match event {
                UserEvent::SignedUp(signed_up) => Ok(User {
                    id: signed_up.user_id,
                    name: signed_up.name,
                    first_name: signed_up.first_name,
                    last_name: signed_up.last_name,
                    email: signed_up.email,
                }),
                _ => Err(UserError::NotSignedUpYet),
            },
            Some(mut user) => match event {
                UserEvent::NameUpdated(updated) => {
                    user.first_name = Some(updated.first_name);
                    user.last_name = Some(updated.last_name);
                    user.name = Some(updated.name);
                    Ok(user)
                }
                UserEvent::EmailUpdated(updated) => {
                    user.email = Some(updated.email);
                    Ok(user)
                }
                UserEvent::SignedUp(_) => Err(UserError::AlreadySignedUp),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserRoot(aggregate::Context<User>);

impl AggregateRoot<User> for UserRoot {}

impl From<aggregate::Context<User>> for UserRoot {
    fn from(context: aggregate::Context<User>) -> Self {
        Self(context)
    }
}

impl Borrow<aggregate::Context<User>> for UserRoot {
    fn borrow(&self) -> &aggregate::Context<User> {
        &self.0
    }
}

impl BorrowMut<aggregate::Context<User>> for UserRoot {
    fn borrow_mut(&mut self) -> &mut aggregate::Context<User> {
        &mut self.0
    }
}

impl UserRoot {
    pub fn sign_up(
        actor_id: ActorId,
        user_id: UserId,
        name: Option<String>,
        first_name: Option<String>,
        last_name: Option<String>,
        email: Option<String>,
    ) -> Result<Self, UserError> {
        if user_id.trim().is_empty() {
            return Err(UserError::EmptyUserId);
        }

        Self::record_new(event::Envelope::new(
            actor_id,
            UserEvent::SignedUp(UserSignedUp {
                user_id,
                name,
                first_name,
                last_name,
                email,
            }),
        ))
    }

    pub fn update_name(
        &mut self,
        first_name: String,
        last_name: String,
        name: String,
        actor_id: ActorId,
    ) -> Result<(), UserError> {
        let user_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            UserEvent::NameUpdated(UserNameUpdated {
                user_id,
                first_name,
                last_name,
                name,
            }),
        ))
    }

    pub fn update_email(&mut self, email: String, actor_id: ActorId) -> Result<(), UserError> {
        let user_id = self.aggregate_id().clone();

        self.record_that(event::Envelope::new(
            actor_id,
            UserEvent::EmailUpdated(UserEmailUpdated { user_id, email }),
        ))
    }
}

pub type UserRepository<S> = aggregate::EventSourced<User, UserRoot, S, DomainEvent>;
