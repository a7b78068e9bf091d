//! Module `event` contains types and abstractions helpful for working
//! with Domain Events.

pub mod journal;
pub mod store;

use futures::stream::BoxStream;

pub use crate::event::journal::Journal;
pub use crate::event::store::Store;
use crate::{message, version};

/// An Event is a [Message][message::Message] carrying the information about
/// a Domain Event, an occurrence in the system lifetime that is relevant for
/// the Domain that is being implemented.
pub type Envelope<T> = message::Envelope<T>;

/// Identifier of an Event Stream, in the form `"<aggregate kind>-<id>"`.
pub type StreamId = String;

/// The position of a Domain Event in the global ordering of the Event
/// [Store], across all Event Streams. Monotonic and gap-free, starting at 0.
pub type Position = u64;

/// An [Event][Envelope] that has been persisted to the Event [Store].
#[derive(Debug, Clone)]
pub struct Persisted<Id, Evt>
where
    Evt: message::Message,
{
    /// The id of the Event Stream the persisted Event belongs to.
    pub stream_id: Id,

    /// The version of the Event Stream when this Event has been recorded.
    ///
    /// This value is used for optimistic concurrency checks, to avoid
    /// data races in parallel command evaluations.
    pub version: version::Version,

    /// The position of this Event in the global log of the Event [Store].
    pub position: Position,

    /// The actual Domain Event carried by this envelope.
    pub event: Envelope<Evt>,
}

// The global position is storage-assigned: the identity of a persisted
// event is its (stream, version, payload) triple.
impl<Id, Evt> PartialEq for Persisted<Id, Evt>
where
    Id: PartialEq,
    Evt: message::Message + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.stream_id == other.stream_id
            && self.version == other.version
            && self.event == other.event
    }
}

/// Specifies the slice of the Event Stream to select when calling
/// [`store::Streamer::stream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelect {
    /// Selects all [Event][Envelope]s in the Event Stream.
    All,

    /// Selects all [Event][Envelope]s starting from the one with the
    /// specified [Version][version::Version].
    From(version::Version),
}

/// Stream is a stream of [Persisted] Domain Events.
pub type Stream<'a, Id, Evt, Err> = BoxStream<'a, Result<Persisted<Id, Evt>, Err>>;
