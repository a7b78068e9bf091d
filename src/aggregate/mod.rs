//! Module containing support for the Aggregate pattern.
//!
//! An Aggregate is the cluster of domain state that owns a transactional
//! boundary: it is mutated only through its own methods, and every mutation
//! is expressed as a Domain Event. Folding the recorded Domain Events in
//! chronological order yields the current Aggregate state.

pub mod repository;

use std::borrow::{Borrow, BorrowMut};
use std::fmt::Display;

pub use repository::{EventSourced, Repository};

use crate::event;
use crate::message;
use crate::version::Version;

/// An Aggregate manages a domain entity state, acting as a transaction
/// boundary.
///
/// It allows state mutations through Domain [Event][event::Envelope]s,
/// folded onto the current state by the [apply][Aggregate::apply] method.
pub trait Aggregate: Sized + Send + Sync + Clone {
    /// The type used to uniquely identify the Aggregate.
    type Id: Eq + Display + Send + Sync;

    /// The type of Domain Events that interest this Aggregate.
    /// Usually, this type should be an `enum`.
    type Event: message::Message + Send + Sync + Clone;

    /// The error type that can be returned by [Aggregate::apply] when
    /// mutating the Aggregate state.
    type Error: Send + Sync;

    /// A short name identifying the Aggregate kind, used to derive the
    /// Event Stream id of each instance.
    fn type_name() -> &'static str;

    /// Returns the Event Stream id for the Aggregate instance with the
    /// given id, following the `"<kind>-<id>"` naming rule.
    ///
    /// Singleton Aggregates override this method to pin their fixed
    /// Stream id.
    fn stream_id(id: &Self::Id) -> event::StreamId {
        format!("{}-{}", Self::type_name(), id)
    }

    /// Returns the unique identifier for the Aggregate instance.
    fn aggregate_id(&self) -> &Self::Id;

    /// Mutates the state of an Aggregate through a Domain Event.
    ///
    /// # Errors
    ///
    /// The method can return an error if the event to apply is unexpected
    /// given the current state of the Aggregate.
    fn apply(state: Option<Self>, event: Self::Event) -> Result<Self, Self::Error>;
}

/// A context object used by the Aggregate [Root] to access the [Aggregate]
/// state and to record new Domain Events.
#[derive(Debug, Clone)]
#[must_use]
pub struct Context<T>
where
    T: Aggregate,
{
    aggregate: T,
    version: Version,
    uncommitted_events: Vec<event::Envelope<T::Event>>,
}

impl<T> Context<T>
where
    T: Aggregate,
{
    /// Returns the current version of the [Aggregate], i.e. the version of
    /// the last Domain Event applied to it.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the list of uncommitted, recorded Domain Events.
    pub fn uncommitted_events(&self) -> &[event::Envelope<T::Event>] {
        &self.uncommitted_events
    }

    /// Resets the list of uncommitted Domain Events.
    ///
    /// Called by the [Repository] once the events have been appended to the
    /// Event Store; the buffer is deliberately left untouched on a failed
    /// save, so the caller can reload and retry.
    pub(crate) fn mark_committed(&mut self) {
        self.uncommitted_events.clear();
    }

    /// Creates a new [Context] instance from the first Domain Event of an
    /// Event Stream, while rehydrating an [Aggregate].
    ///
    /// # Errors
    ///
    /// The method can return an error if the event to apply is unexpected
    /// given the current state of the Aggregate.
    pub(crate) fn rehydrate_from(event: event::Envelope<T::Event>) -> Result<Context<T>, T::Error> {
        Ok(Context {
            version: 0,
            aggregate: T::apply(None, event.message)?,
            uncommitted_events: Vec::default(),
        })
    }

    /// Applies a new Domain Event to the [Context] while rehydrating
    /// an [Aggregate].
    ///
    /// # Errors
    ///
    /// The method can return an error if the event to apply is unexpected
    /// given the current state of the Aggregate.
    pub(crate) fn apply_rehydrated_event(
        mut self,
        event: event::Envelope<T::Event>,
    ) -> Result<Context<T>, T::Error> {
        self.aggregate = T::apply(Some(self.aggregate), event.message)?;
        self.version += 1;

        Ok(self)
    }

    fn state(&self) -> &T {
        &self.aggregate
    }

    fn record_new(event: event::Envelope<T::Event>) -> Result<Context<T>, T::Error> {
        Ok(Context {
            version: 0,
            aggregate: T::apply(None, event.message.clone())?,
            uncommitted_events: vec![event],
        })
    }

    fn record_that(&mut self, event: event::Envelope<T::Event>) -> Result<(), T::Error> {
        self.aggregate = T::apply(Some(self.aggregate.clone()), event.message.clone())?;
        self.uncommitted_events.push(event);
        self.version += 1;

        Ok(())
    }
}

/// An Aggregate Root represents the Domain Entity object used to load and
/// save an [Aggregate] from and to a [Repository], and to perform actions
/// that may result in new Domain Events to change the state of the
/// Aggregate.
///
/// An Aggregate Root implementation should only depend on [Context], and
/// implement the `From<Context<AggregateType>>` and `Borrow`/`BorrowMut`
/// traits to expose it:
///
/// ```text
/// #[derive(Debug, Clone)]
/// struct MyAggregateRoot(Context<MyAggregate>);
///
/// impl aggregate::Root<MyAggregate> for MyAggregateRoot {}
/// ```
pub trait Root<T>:
    From<Context<T>> + Borrow<Context<T>> + BorrowMut<Context<T>> + Send + Sync
where
    T: Aggregate,
{
    /// Provides read access to the [Aggregate] [Root] [Context].
    #[doc(hidden)]
    fn ctx(&self) -> &Context<T> {
        self.borrow()
    }

    /// Provides write access to the [Aggregate] [Root] [Context].
    #[doc(hidden)]
    fn ctx_mut(&mut self) -> &mut Context<T> {
        self.borrow_mut()
    }

    /// Provides convenient access to the [Aggregate] Root state.
    fn state(&self) -> &T {
        self.ctx().state()
    }

    /// Returns the unique identifier of the Aggregate instance.
    fn aggregate_id<'a>(&'a self) -> &'a T::Id
    where
        T: 'a,
    {
        self.state().aggregate_id()
    }

    /// Returns the current version of the Aggregate instance.
    fn version(&self) -> Version {
        self.ctx().version()
    }

    /// Creates a new [Aggregate] [Root] instance by recording the specified
    /// creation Domain Event.
    ///
    /// # Errors
    ///
    /// The method can return an error if the event to apply is unexpected
    /// given the current state of the Aggregate.
    fn record_new(event: event::Envelope<T::Event>) -> Result<Self, T::Error> {
        Context::record_new(event).map(Self::from)
    }

    /// Records a change to the [Aggregate] [Root], expressed by the
    /// specified Domain Event.
    ///
    /// # Errors
    ///
    /// The method can return an error if the event to apply is unexpected
    /// given the current state of the Aggregate.
    fn record_that(&mut self, event: event::Envelope<T::Event>) -> Result<(), T::Error> {
        self.ctx_mut().record_that(event)
    }
}
