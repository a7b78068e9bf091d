//! Contains the Event [Store] trait family and the [InMemory] implementation,
//! together with the [Tracking] decorator used by test scenarios.

use std::collections::HashMap;
use std::convert::Infallible;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use futures::stream::{iter, StreamExt};

use crate::version::EMPTY_STREAM;
use crate::{event, message, version};

/// Interface used to stream [Persisted][event::Persisted] Domain Events
/// of a single Event Stream back into the application.
pub trait Streamer<StreamId, Event>: Send + Sync
where
    StreamId: Send + Sync,
    Event: message::Message + Send + Sync,
{
    /// The error type returned by the Store during a [`stream`] call.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Opens an Event Stream, streaming back all the Domain Events recorded
    /// for the given Stream id, in [Version][crate::version::Version] order.
    ///
    /// An empty Stream yields no items.
    fn stream(
        &self,
        id: &StreamId,
        select: event::VersionSelect,
    ) -> event::Stream<StreamId, Event, Self::Error>;
}

/// All possible error types returned by [`Appender::append`].
#[derive(Debug, thiserror::Error)]
pub enum AppendError {
    /// Error returned when [`Appender::append`] encounters a version
    /// conflict while appending the new Domain Events.
    #[error("failed to append new domain events: {0}")]
    Conflict(#[from] version::ConflictError),

    /// Error returned when the [Appender] implementation has encountered
    /// an error. The append has no effect in this case.
    #[error("failed to append new domain events, an error occurred: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Interface used to append new Domain Events to an Event Store.
#[async_trait]
pub trait Appender<StreamId, Event>: Send + Sync
where
    StreamId: Send + Sync,
    Event: message::Message + Send + Sync,
{
    /// Appends new Domain Events to the specified Event Stream.
    ///
    /// Versions are assigned by the Store: the first appended event gets
    /// `current version + 1`. Callers assert the current Stream version
    /// through the [version::Check] value; a mismatch fails the whole
    /// append with [AppendError::Conflict] and records nothing.
    ///
    /// The result of this operation is the new [Version][version::Version]
    /// of the Event Stream after the append.
    async fn append(
        &self,
        id: StreamId,
        version_check: version::Check,
        events: Vec<event::Envelope<Event>>,
    ) -> Result<version::Version, AppendError>;
}

/// Interface used to follow the global ordering of Domain Events in an
/// Event Store, typically by a projection worker.
#[async_trait]
pub trait Follower<StreamId, Event>: Send + Sync
where
    StreamId: Send + Sync,
    Event: message::Message + Send + Sync,
{
    /// The error type returned by the Store while reading the global log.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the number of Domain Events ever appended to the Store,
    /// i.e. the [Position][event::Position] the next appended event will get.
    async fn last_position(&self) -> Result<event::Position, Self::Error>;

    /// Returns up to `limit` Domain Events whose global position is greater
    /// than or equal to `from`, in position order.
    async fn read_from(
        &self,
        from: event::Position,
        limit: usize,
    ) -> Result<Vec<event::Persisted<StreamId, Event>>, Self::Error>;
}

/// An Event Store, used to persist Domain Events in Event Streams and
/// retrieve them, either per Stream or through the globally-ordered log.
pub trait Store<StreamId, Event>:
    Streamer<StreamId, Event> + Appender<StreamId, Event> + Follower<StreamId, Event> + Send + Sync
where
    StreamId: Send + Sync,
    Event: message::Message + Send + Sync,
{
}

impl<T, StreamId, Event> Store<StreamId, Event> for T
where
    T: Streamer<StreamId, Event>
        + Appender<StreamId, Event>
        + Follower<StreamId, Event>
        + Send
        + Sync,
    StreamId: Send + Sync,
    Event: message::Message + Send + Sync,
{
}

#[derive(Debug)]
struct InMemoryBackend<Id, Evt>
where
    Evt: message::Message,
{
    // The global log owns the events; streams index into it by offset.
    log: Vec<event::Persisted<Id, Evt>>,
    streams: HashMap<Id, Vec<usize>>,
}

impl<Id, Evt> Default for InMemoryBackend<Id, Evt>
where
    Evt: message::Message,
{
    fn default() -> Self {
        Self {
            log: Vec::default(),
            streams: HashMap::default(),
        }
    }
}

impl<Id, Evt> InMemoryBackend<Id, Evt>
where
    Id: Eq + Hash,
    Evt: message::Message,
{
    fn stream_version(&self, id: &Id) -> version::Version {
        self.streams
            .get(id)
            .and_then(|offsets| offsets.last())
            .map(|&offset| self.log[offset].version)
            .unwrap_or(EMPTY_STREAM)
    }
}

/// In-memory implementation of the Event [Store] trait, backed by a
/// thread-safe global log plus per-stream offset indexes.
///
/// The backend write lock serializes the read-compare-append sequence, so
/// concurrent appends to the same Stream with the same expected version
/// cannot both succeed.
#[derive(Debug, Clone)]
pub struct InMemory<Id, Evt>
where
    Evt: message::Message,
{
    backend: Arc<RwLock<InMemoryBackend<Id, Evt>>>,
}

impl<Id, Evt> Default for InMemory<Id, Evt>
where
    Evt: message::Message,
{
    fn default() -> Self {
        Self {
            backend: Arc::default(),
        }
    }
}

impl<Id, Evt> Streamer<Id, Evt> for InMemory<Id, Evt>
where
    Id: Clone + Eq + Hash + Send + Sync,
    Evt: message::Message + Clone + Send + Sync,
{
    type Error = Infallible;

    fn stream(&self, id: &Id, select: event::VersionSelect) -> event::Stream<Id, Evt, Self::Error> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        let events: Vec<_> = backend
            .streams
            .get(id)
            .map(|offsets| {
                offsets
                    .iter()
                    .map(|&offset| backend.log[offset].clone())
                    .filter(|evt| match select {
                        event::VersionSelect::All => true,
                        event::VersionSelect::From(v) => evt.version >= v,
                    })
                    .collect()
            })
            .unwrap_or_default();

        iter(events).map(Ok).boxed()
    }
}

#[async_trait]
impl<Id, Evt> Appender<Id, Evt> for InMemory<Id, Evt>
where
    Id: Clone + Eq + Hash + Send + Sync,
    Evt: message::Message + Clone + Send + Sync,
{
    async fn append(
        &self,
        id: Id,
        version_check: version::Check,
        events: Vec<event::Envelope<Evt>>,
    ) -> Result<version::Version, AppendError> {
        let mut backend = self
            .backend
            .write()
            .expect("acquire write lock on event store backend");

        let current_version = backend.stream_version(&id);

        if let version::Check::MustBe(expected) = version_check {
            if current_version != expected {
                return Err(AppendError::Conflict(version::ConflictError {
                    expected,
                    actual: current_version,
                }));
            }
        }

        let mut new_version = current_version;

        for event in events {
            new_version += 1;

            let offset = backend.log.len();
            backend.log.push(event::Persisted {
                stream_id: id.clone(),
                version: new_version,
                position: offset as event::Position,
                event,
            });

            backend.streams.entry(id.clone()).or_default().push(offset);
        }

        Ok(new_version)
    }
}

#[async_trait]
impl<Id, Evt> Follower<Id, Evt> for InMemory<Id, Evt>
where
    Id: Clone + Eq + Hash + Send + Sync,
    Evt: message::Message + Clone + Send + Sync,
{
    type Error = Infallible;

    async fn last_position(&self) -> Result<event::Position, Self::Error> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        Ok(backend.log.len() as event::Position)
    }

    async fn read_from(
        &self,
        from: event::Position,
        limit: usize,
    ) -> Result<Vec<event::Persisted<Id, Evt>>, Self::Error> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on event store backend");

        Ok(backend
            .log
            .iter()
            .skip(from as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Wraps an Event [Store] and keeps a copy of every Domain Event appended
/// through it, exactly as the Store persisted it: stream id, version and
/// global [Position][event::Position] included.
///
/// Test harnesses assert against [Tracking::recorded_events] to check that
/// a command produced the expected writes, including their placement in
/// the global log. Reading the appended tail back assumes no interleaved
/// writers on other handles, which holds in the sequential test scenarios
/// this wrapper serves.
#[derive(Debug, Clone)]
pub struct Tracking<T, StreamId, Event>
where
    T: Store<StreamId, Event> + Send + Sync,
    StreamId: Send + Sync,
    Event: message::Message + Send + Sync,
{
    store: T,

    #[allow(clippy::type_complexity)] // It is a complex type but still readable.
    events: Arc<RwLock<Vec<event::Persisted<StreamId, Event>>>>,
}

impl<T, StreamId, Event> Tracking<T, StreamId, Event>
where
    T: Store<StreamId, Event> + Send + Sync,
    StreamId: Clone + Send + Sync,
    Event: message::Message + Clone + Send + Sync,
{
    /// Returns the Domain Events appended through this instance so far, in
    /// append order, as the underlying Store persisted them.
    pub fn recorded_events(&self) -> Vec<event::Persisted<StreamId, Event>> {
        self.events
            .read()
            .expect("acquire lock on recorded events list")
            .clone()
    }
}

impl<T, StreamId, Event> Streamer<StreamId, Event> for Tracking<T, StreamId, Event>
where
    T: Store<StreamId, Event> + Send + Sync,
    StreamId: Clone + Send + Sync,
    Event: message::Message + Clone + Send + Sync,
{
    type Error = <T as Streamer<StreamId, Event>>::Error;

    fn stream(
        &self,
        id: &StreamId,
        select: event::VersionSelect,
    ) -> event::Stream<StreamId, Event, Self::Error> {
        self.store.stream(id, select)
    }
}

#[async_trait]
impl<T, StreamId, Event> Appender<StreamId, Event> for Tracking<T, StreamId, Event>
where
    T: Store<StreamId, Event> + Send + Sync,
    StreamId: Clone + Send + Sync,
    Event: message::Message + Clone + Send + Sync,
{
    async fn append(
        &self,
        id: StreamId,
        version_check: version::Check,
        events: Vec<event::Envelope<Event>>,
    ) -> Result<version::Version, AppendError> {
        let appended = events.len();
        let new_version = self.store.append(id, version_check, events).await?;

        // Read the freshly appended tail back from the global log instead
        // of reconstructing it, so the recorded copies carry the versions
        // and positions the Store actually assigned.
        let end = self
            .store
            .last_position()
            .await
            .map_err(|err| AppendError::Internal(err.into()))?;

        let mut persisted_events = self
            .store
            .read_from(end - appended as event::Position, appended)
            .await
            .map_err(|err| AppendError::Internal(err.into()))?;

        self.events
            .write()
            .expect("acquire lock on recorded events list")
            .append(&mut persisted_events);

        Ok(new_version)
    }
}

#[async_trait]
impl<T, StreamId, Event> Follower<StreamId, Event> for Tracking<T, StreamId, Event>
where
    T: Store<StreamId, Event> + Send + Sync,
    StreamId: Clone + Send + Sync,
    Event: message::Message + Clone + Send + Sync,
{
    type Error = <T as Follower<StreamId, Event>>::Error;

    async fn last_position(&self) -> Result<event::Position, Self::Error> {
        self.store.last_position().await
    }

    async fn read_from(
        &self,
        from: event::Position,
        limit: usize,
    ) -> Result<Vec<event::Persisted<StreamId, Event>>, Self::Error> {
        self.store.read_from(from, limit).await
    }
}

/// Extension trait that can be used to pull in supertypes implemented
/// in this module.
pub trait EventStoreExt<StreamId, Event>: Store<StreamId, Event> + Send + Sync + Sized
where
    StreamId: Clone + Send + Sync,
    Event: message::Message + Clone + Send + Sync,
{
    /// Wraps this Event [Store] in a [`Tracking`] instance, recording
    /// every append that goes through the wrapper.
    fn with_recorded_events_tracking(self) -> Tracking<Self, StreamId, Event> {
        Tracking {
            store: self,
            events: Arc::default(),
        }
    }
}

impl<T, StreamId, Event> EventStoreExt<StreamId, Event> for T
where
    T: Store<StreamId, Event> + Send + Sync,
    StreamId: Clone + Send + Sync,
    Event: message::Message + Clone + Send + Sync,
{
}
