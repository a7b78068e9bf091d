//! Contains the definition of a [Repository], to load and save Aggregate
//! Roots from and to an Event [Store][event::Store], using the Event
//! Sourcing pattern for rehydration.

use std::marker::PhantomData;

use async_trait::async_trait;
use futures::TryStreamExt;

use crate::aggregate::{Aggregate, Context, Root};
use crate::version::{Check, Version};
use crate::{event, message};

/// All possible error types returned by [Repository] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The desired Aggregate [Root] could not be found in the data store.
    #[error("aggregate root was not found")]
    NotFound,

    /// The expected version asserted on save did not match the current
    /// version of the Aggregate's Event Stream. Reload the Aggregate and
    /// retry, or give up.
    #[error("failed to save aggregate root: {0}")]
    Conflict(#[from] crate::version::ConflictError),

    /// The Aggregate returned an error while applying a Domain Event from
    /// its Event Stream. This usually implies the Event Stream contains
    /// corrupted or unexpected data.
    #[error("failed to rehydrate aggregate from event stream: {0}")]
    Rehydrate(#[source] anyhow::Error),

    /// The Event [Store][event::Store] returned an error.
    #[error("event store failed: {0}")]
    Store(#[source] anyhow::Error),
}

/// A Repository is an object that allows to load and save an
/// [Aggregate Root][Root] from and to a persistent data store.
#[async_trait]
pub trait Repository<T, R>: Send + Sync
where
    T: Aggregate,
    R: Root<T>,
{
    /// Loads an Aggregate Root instance from the data store, referenced by
    /// its unique identifier.
    async fn get(&self, id: &T::Id) -> Result<R, Error>;

    /// Saves a new version of an Aggregate Root instance to the data store.
    ///
    /// The save asserts the version the Aggregate was loaded at; a
    /// concurrent mutation of the same Stream fails the save with
    /// [Error::Conflict], and the uncommitted events stay buffered on the
    /// Root for a retry after reload.
    async fn save(&self, root: &mut R) -> Result<(), Error>;
}

/// An Event-sourced implementation of the [Repository] interface.
///
/// It streams the Aggregate's Event Stream from an Event
/// [Store][event::Store] to rehydrate its state, and appends the
/// uncommitted Domain Events recorded by the Aggregate [Root] on save.
///
/// The `W` type parameter is the wire event representation used by the
/// Event Store, shared between all Aggregate kinds; the Aggregate's own
/// event type converts into and from it.
pub struct EventSourced<T, R, S, W>
where
    T: Aggregate,
    R: Root<T>,
    W: message::Message,
{
    store: S,
    aggregate: PhantomData<fn() -> (T, R, W)>,
}

impl<T, R, S, W> Clone for EventSourced<T, R, S, W>
where
    T: Aggregate,
    R: Root<T>,
    S: Clone,
    W: message::Message,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            aggregate: PhantomData,
        }
    }
}

impl<T, R, S, W> From<S> for EventSourced<T, R, S, W>
where
    T: Aggregate,
    R: Root<T>,
    W: message::Message,
{
    fn from(store: S) -> Self {
        Self {
            store,
            aggregate: PhantomData,
        }
    }
}

#[async_trait]
impl<T, R, S, W> Repository<T, R> for EventSourced<T, R, S, W>
where
    T: Aggregate,
    T::Error: std::error::Error + Send + Sync + 'static,
    T::Event: TryFrom<W> + Into<W>,
    <T::Event as TryFrom<W>>::Error: std::error::Error + Send + Sync + 'static,
    R: Root<T>,
    S: event::Store<event::StreamId, W>,
    W: message::Message + Clone + Send + Sync,
{
    async fn get(&self, id: &T::Id) -> Result<R, Error> {
        let stream_id = T::stream_id(id);

        let ctx = self
            .store
            .stream(&stream_id, event::VersionSelect::All)
            .map_err(|err| Error::Store(err.into()))
            .try_fold(None, |ctx: Option<Context<T>>, persisted| async move {
                let event = persisted
                    .event
                    .try_map(T::Event::try_from)
                    .map_err(|err| Error::Rehydrate(err.into()))?;

                let new_ctx = match ctx {
                    None => Context::rehydrate_from(event),
                    Some(ctx) => ctx.apply_rehydrated_event(event),
                }
                .map_err(|err| Error::Rehydrate(err.into()))?;

                Ok(Some(new_ctx))
            })
            .await?;

        ctx.map(R::from).ok_or(Error::NotFound)
    }

    async fn save(&self, root: &mut R) -> Result<(), Error> {
        let uncommitted = root.ctx().uncommitted_events();

        if uncommitted.is_empty() {
            return Ok(());
        }

        let expected = root.version() - (uncommitted.len() as Version);
        let stream_id = T::stream_id(root.aggregate_id());

        let events: Vec<event::Envelope<W>> = uncommitted
            .iter()
            .cloned()
            .map(|envelope| envelope.map(Into::into))
            .collect();

        self.store
            .append(stream_id, Check::MustBe(expected), events)
            .await
            .map_err(|err| match err {
                event::store::AppendError::Conflict(conflict) => Error::Conflict(conflict),
                event::store::AppendError::Internal(inner) => Error::Store(inner),
            })?;

        root.ctx_mut().mark_committed();

        Ok(())
    }
}
