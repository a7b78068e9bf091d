//! Module containing support for Domain Commands.
//!
//! Following the Domain-driven Design definition, a Command expresses the
//! intent of an Actor (e.g. a Customer, a User, a System, etc.) to modify
//! the state of the system in some way.
//!
//! To modify the state of the system through a Command, implement a Command
//! [Handler] which, in an Event-sourced system, should make use of an
//! [Aggregate][crate::aggregate::Aggregate] to evaluate the validity of the
//! Command submitted, and emit Domain Events as a result (through the Event
//! [Store][crate::event::Store]).

pub mod bus;

use std::future::Future;

use async_trait::async_trait;

pub use bus::{CommandBus, EventBus, Retry};

use crate::message;

/// A Command represents an intent by an Actor (e.g. a User, or a System)
/// to mutate the state of the system.
///
/// In an event-sourced system, a Command is represented as a
/// [Message][message::Message]; the [Envelope] carries its unique command
/// id, the issuing actor and the submission time.
pub type Envelope<T> = message::Envelope<T>;

/// A software component that is able to handle Commands of a certain type,
/// and mutate the state as a result of the command handling, or fail.
///
/// In an event-sourced system, the Command Handler should use an
/// [Aggregate][crate::aggregate::Aggregate] to evaluate a Command and
/// ensure business invariants are respected.
#[async_trait]
pub trait Handler<T>: Send + Sync
where
    T: message::Message,
{
    /// The error type returned by the Handler while handling a Command.
    type Error: Send + Sync;

    /// Handles a Command and returns an error if the handling has failed.
    ///
    /// Since Commands are solely modifying the state of the system, they do
    /// not return anything to the caller but the result of the operation
    /// (expressed by a [Result] type).
    async fn handle(&self, command: Envelope<T>) -> Result<(), Self::Error>;
}

#[async_trait]
impl<T, Err, F, Fut> Handler<T> for F
where
    T: message::Message + Send + Sync + 'static,
    Err: Send + Sync,
    F: Send + Sync + Fn(Envelope<T>) -> Fut,
    Fut: Send + Future<Output = Result<(), Err>>,
{
    type Error = Err;

    async fn handle(&self, command: Envelope<T>) -> Result<(), Self::Error> {
        self(command).await
    }
}
