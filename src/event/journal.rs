//! Contains the [Journal] Event Store, the reference persistence of the
//! system: a single JSON document on disk holding the global event list and
//! the per-stream event descriptors.
//!
//! On startup the journal file is replayed into in-memory indices; every
//! append rewrites the document through a temporary file, flushes it to disk
//! and atomically renames it over the previous one, so a crashed write never
//! leaves partial state behind.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context as _;
use async_trait::async_trait;
use futures::stream::{iter, StreamExt};
use serde::{Deserialize, Serialize};

use crate::event;
use crate::event::store::{AppendError, Appender, Follower, Streamer};
use crate::message;
use crate::serde::Serde;
use crate::version::{self, EMPTY_STREAM};

/// Storage envelope of a single Domain Event inside the journal document.
///
/// `event_data` is a JSON-encoded string of the event payload; `event_type`
/// is the stable tag used to resolve the concrete type on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Descriptor {
    id: event::StreamId,
    event_type: String,
    event_data: String,
    version: version::Version,
}

/// The JSON document persisted on disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    event_list: Vec<Descriptor>,
    aggregates: BTreeMap<event::StreamId, Vec<Descriptor>>,
}

#[derive(Debug)]
struct Backend<Evt>
where
    Evt: message::Message,
{
    path: PathBuf,
    document: Document,
    log: Vec<event::Persisted<event::StreamId, Evt>>,
    streams: HashMap<event::StreamId, Vec<usize>>,
}

impl<Evt> Backend<Evt>
where
    Evt: message::Message,
{
    fn stream_version(&self, id: &str) -> version::Version {
        self.streams
            .get(id)
            .and_then(|offsets| offsets.last())
            .map(|&offset| self.log[offset].version)
            .unwrap_or(EMPTY_STREAM)
    }

    // Rewrites the whole document through a temporary file so that an
    // interrupted write leaves the previous journal intact.
    fn persist(&self) -> anyhow::Result<()> {
        let tmp_path = self.path.with_extension("tmp");

        let mut tmp = File::create(&tmp_path)
            .with_context(|| format!("failed to create journal temp file {:?}", tmp_path))?;

        let data = serde_json::to_vec(&self.document).context("failed to encode journal")?;

        tmp.write_all(&data).context("failed to write journal")?;
        tmp.sync_all().context("failed to flush journal to disk")?;

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to move journal into place at {:?}", self.path))?;

        Ok(())
    }
}

/// Event [Store][event::Store] backed by a JSON journal file.
///
/// Events are kept decoded in memory for reads; the document on disk is the
/// durable source of truth and is replayed on [Journal::open].
pub struct Journal<Evt, S>
where
    Evt: message::Message,
    S: Serde<event::Envelope<Evt>>,
{
    serde: Arc<S>,
    backend: Arc<RwLock<Backend<Evt>>>,
}

impl<Evt, S> Clone for Journal<Evt, S>
where
    Evt: message::Message,
    S: Serde<event::Envelope<Evt>>,
{
    fn clone(&self) -> Self {
        Self {
            serde: self.serde.clone(),
            backend: self.backend.clone(),
        }
    }
}

impl<Evt, S> Journal<Evt, S>
where
    Evt: message::Message,
    S: Serde<event::Envelope<Evt>>,
{
    /// Opens the journal at the given path, replaying its contents into
    /// memory. A missing file starts an empty journal; it is created on the
    /// first append.
    pub fn open(path: impl AsRef<Path>, serde: S) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();

        let document: Document = if path.exists() {
            let data = fs::read(&path)
                .with_context(|| format!("failed to read journal file {:?}", path))?;

            serde_json::from_slice(&data)
                .with_context(|| format!("failed to parse journal file {:?}", path))?
        } else {
            Document::default()
        };

        let mut log = Vec::with_capacity(document.event_list.len());
        let mut streams: HashMap<event::StreamId, Vec<usize>> = HashMap::new();

        for (offset, descriptor) in document.event_list.iter().enumerate() {
            let envelope = serde
                .deserialize(&descriptor.event_type, &descriptor.event_data)
                .map_err(anyhow::Error::from)
                .with_context(|| {
                    format!(
                        "failed to decode journal event {} at position {}",
                        descriptor.event_type, offset
                    )
                })?;

            log.push(event::Persisted {
                stream_id: descriptor.id.clone(),
                version: descriptor.version,
                position: offset as event::Position,
                event: envelope,
            });

            streams
                .entry(descriptor.id.clone())
                .or_default()
                .push(offset);
        }

        Ok(Self {
            serde: Arc::new(serde),
            backend: Arc::new(RwLock::new(Backend {
                path,
                document,
                log,
                streams,
            })),
        })
    }
}

impl<Evt, S> Streamer<event::StreamId, Evt> for Journal<Evt, S>
where
    Evt: message::Message + Clone + Send + Sync,
    S: Serde<event::Envelope<Evt>>,
{
    type Error = std::convert::Infallible;

    fn stream(
        &self,
        id: &event::StreamId,
        select: event::VersionSelect,
    ) -> event::Stream<event::StreamId, Evt, Self::Error> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on journal backend");

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
impl<Evt, S> Appender<event::StreamId, Evt> for Journal<Evt, S>
where
    Evt: message::Message + Clone + Send + Sync,
    S: Serde<event::Envelope<Evt>>,
{
    async fn append(
        &self,
        id: event::StreamId,
        version_check: version::Check,
        events: Vec<event::Envelope<Evt>>,
    ) -> Result<version::Version, AppendError> {
        let mut backend = self
            .backend
            .write()
            .expect("acquire write lock on journal backend");

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
        let mut persisted = Vec::with_capacity(events.len());
        let mut descriptors = Vec::with_capacity(events.len());

        for envelope in events {
            new_version += 1;

            let event_data = self
                .serde
                .serialize(&envelope)
                .map_err(|err| AppendError::Internal(anyhow::Error::from(err)))?;

            descriptors.push(Descriptor {
                id: id.clone(),
                event_type: envelope.message.name().to_owned(),
                event_data,
                version: new_version,
            });

            persisted.push(event::Persisted {
                stream_id: id.clone(),
                version: new_version,
                position: (backend.log.len() + persisted.len()) as event::Position,
                event: envelope,
            });
        }

        let appended = descriptors.len();
        backend
            .document
            .event_list
            .extend(descriptors.iter().cloned());
        backend
            .document
            .aggregates
            .entry(id.clone())
            .or_default()
            .extend(descriptors);

        if let Err(err) = backend.persist() {
            // Roll the document back so memory matches the file on disk.
            let list_len = backend.document.event_list.len() - appended;
            backend.document.event_list.truncate(list_len);

            let stream = backend
                .document
                .aggregates
                .get_mut(&id)
                .expect("stream descriptors were just appended");
            let stream_len = stream.len() - appended;
            stream.truncate(stream_len);

            return Err(AppendError::Internal(err));
        }

        for evt in persisted {
            let offset = backend.log.len();
            backend.streams.entry(id.clone()).or_default().push(offset);
            backend.log.push(evt);
        }

        Ok(new_version)
    }
}

#[async_trait]
impl<Evt, S> Follower<event::StreamId, Evt> for Journal<Evt, S>
where
    Evt: message::Message + Clone + Send + Sync,
    S: Serde<event::Envelope<Evt>>,
{
    type Error = std::convert::Infallible;

    async fn last_position(&self) -> Result<event::Position, Self::Error> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on journal backend");

        Ok(backend.log.len() as event::Position)
    }

    async fn read_from(
        &self,
        from: event::Position,
        limit: usize,
    ) -> Result<Vec<event::Persisted<event::StreamId, Evt>>, Self::Error> {
        let backend = self
            .backend
            .read()
            .expect("acquire read lock on journal backend");

        Ok(backend
            .log
            .iter()
            .skip(from as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod test {
    use chrono::{DateTime, Utc};
    use futures::TryStreamExt;
    use uuid::Uuid;

    use super::*;
    use crate::message::Message;

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct TestEvent {
        value: String,
    }

    impl Message for TestEvent {
        fn name(&self) -> &'static str {
            "TestEvent"
        }
    }

    #[derive(serde::Serialize, serde::Deserialize)]
    struct WireEvent {
        event_id: Uuid,
        actor_id: String,
        triggered_at: DateTime<Utc>,
        value: String,
    }

    struct TestSerde;

    impl Serde<event::Envelope<TestEvent>> for TestSerde {
        type Error = serde_json::Error;

        fn serialize(&self, value: &event::Envelope<TestEvent>) -> Result<String, Self::Error> {
            serde_json::to_string(&WireEvent {
                event_id: value.id,
                actor_id: value.actor_id.clone(),
                triggered_at: value.recorded_at,
                value: value.message.value.clone(),
            })
        }

        fn deserialize(
            &self,
            _type_name: &str,
            data: &str,
        ) -> Result<event::Envelope<TestEvent>, Self::Error> {
            let wire: WireEvent = serde_json::from_str(data)?;

            Ok(event::Envelope {
                id: wire.event_id,
                actor_id: wire.actor_id,
                recorded_at: wire.triggered_at,
                message: TestEvent { value: wire.value },
            })
        }
    }

    fn temp_journal_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("clubhouse-journal-{}-{}.json", name, Uuid::new_v4()))
    }

    #[tokio::test]
    async fn events_survive_a_reopen() {
        let path = temp_journal_path("reopen");

        {
            let journal = Journal::open(&path, TestSerde).expect("journal should open");

            journal
                .append(
                    "club-1".to_owned(),
                    version::Check::MustBe(EMPTY_STREAM),
                    vec![
                        event::Envelope::new("u1", TestEvent { value: "a".into() }),
                        event::Envelope::new("u1", TestEvent { value: "b".into() }),
                    ],
                )
                .await
                .expect("append should not fail");
        }

        let reopened = Journal::open(&path, TestSerde).expect("journal should reopen");

        let events: Vec<_> = reopened
            .stream(&"club-1".to_owned(), event::VersionSelect::All)
            .try_collect()
            .await
            .expect("stream should not fail");

        assert_eq!(2, events.len());
        assert_eq!(0, events[0].version);
        assert_eq!(1, events[1].version);
        assert_eq!("a", events[0].event.message.value);
        assert_eq!("u1", events[0].event.actor_id);

        let last_position = reopened
            .last_position()
            .await
            .expect("last position should be available");
        assert_eq!(2, last_position);

        fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn document_shape_matches_the_storage_contract() {
        let path = temp_journal_path("shape");

        let journal = Journal::open(&path, TestSerde).expect("journal should open");

        journal
            .append(
                "club-1".to_owned(),
                version::Check::MustBe(EMPTY_STREAM),
                vec![event::Envelope::new("u1", TestEvent { value: "a".into() })],
            )
            .await
            .expect("append should not fail");

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).expect("journal file should exist"))
                .expect("journal file should be valid JSON");

        let descriptor = &raw["event_list"][0];
        assert_eq!("club-1", descriptor["id"]);
        assert_eq!("TestEvent", descriptor["event_type"]);
        assert_eq!(0, descriptor["version"]);

        // The payload is stored as a JSON-encoded string.
        let event_data: serde_json::Value =
            serde_json::from_str(descriptor["event_data"].as_str().expect("event_data string"))
                .expect("event_data should hold JSON");
        assert_eq!("a", event_data["value"]);

        assert_eq!(raw["aggregates"]["club-1"][0], *descriptor);

        fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn version_conflicts_append_nothing() {
        let path = temp_journal_path("conflict");

        let journal = Journal::open(&path, TestSerde).expect("journal should open");

        journal
            .append(
                "club-1".to_owned(),
                version::Check::MustBe(EMPTY_STREAM),
                vec![event::Envelope::new("u1", TestEvent { value: "a".into() })],
            )
            .await
            .expect("append should not fail");

        let error = journal
            .append(
                "club-1".to_owned(),
                version::Check::MustBe(EMPTY_STREAM),
                vec![event::Envelope::new("u2", TestEvent { value: "b".into() })],
            )
            .await
            .expect_err("the second creation attempt should conflict");

        assert!(matches!(error, AppendError::Conflict(_)));

        let last_position = journal
            .last_position()
            .await
            .expect("last position should be available");
        assert_eq!(1, last_position);

        fs::remove_file(&path).ok();
    }
}
