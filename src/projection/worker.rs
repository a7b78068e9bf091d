//! The projection worker: the single consumer of the global event log.
//!
//! The worker tails the Event [Store][crate::event::Store] from its
//! persisted cursor, applies each Domain Event to the relational read model
//! in its own transaction (the cursor advances in the same transaction) and
//! emits the queued notifications once the transaction has committed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::domain::DomainEvent;
use crate::event;
use crate::event::store::Follower;
use crate::message::Message as _;
use crate::notify::ClubChannels;
use crate::projection::{apply, schema};

// Retries per failing event before it is skipped as poison.
const POISON_THRESHOLD: u32 = 5;
const RETRY_BACKOFF: Duration = Duration::from_millis(50);

/// Tuning knobs for the [Worker].
#[derive(Debug, Clone)]
pub struct Options {
    /// How long to sleep when the log has no new events.
    pub poll_interval: Duration,

    /// Maximum number of events fetched from the log per read.
    pub batch_size: usize,

    /// Wipe and recreate the read model on startup, re-tailing the log from
    /// position 0. Development only; production resumes from the cursor.
    pub reset_read_model: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            batch_size: 64,
            reset_read_model: false,
        }
    }
}

/// Handle used to ask a running [Worker] to stop.
///
/// The stop flag is polled between events: the in-flight transaction always
/// completes (or rolls back) before the worker exits.
#[derive(Debug, Clone)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }
}

/// The projection worker. See the [module documentation][self].
pub struct Worker<S>
where
    S: Follower<event::StreamId, DomainEvent>,
{
    store: S,
    pool: SqlitePool,
    channels: ClubChannels,
    options: Options,
    position: event::Position,
    stop: Arc<AtomicBool>,
}

impl<S> Worker<S>
where
    S: Follower<event::StreamId, DomainEvent>,
{
    pub fn new(store: S, pool: SqlitePool, channels: ClubChannels, options: Options) -> Self {
        Self {
            store,
            pool,
            channels,
            options,
            position: 0,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a handle that can stop this worker from another task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            flag: self.stop.clone(),
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Prepares the read model and loads the persisted cursor.
    pub async fn prepare(&mut self) -> anyhow::Result<()> {
        if self.options.reset_read_model {
            tracing::warn!("resetting read model, the event log will be re-projected from 0");
            schema::reset(&self.pool).await?;
        } else {
            schema::ensure(&self.pool).await?;
        }

        self.position = self.load_position().await?;
        tracing::info!(position = self.position, "projection worker prepared");

        Ok(())
    }

    /// Runs the worker until its [StopHandle] is triggered.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.prepare().await?;
        tracing::info!("projection worker started");

        while !self.stopped() {
            match self.catch_up().await {
                Ok(0) => tokio::time::sleep(self.options.poll_interval).await,
                Ok(projected) => {
                    tracing::debug!(projected, position = self.position, "projected events");
                }
                Err(error) => {
                    tracing::error!(%error, "projection pass failed, backing off");
                    tokio::time::sleep(self.options.poll_interval).await;
                }
            }
        }

        tracing::info!("projection worker stopped");
        Ok(())
    }

    /// Projects every event currently in the log past the cursor, returning
    /// the number of events processed.
    pub async fn catch_up(&mut self) -> anyhow::Result<usize> {
        let mut projected = 0;

        'outer: loop {
            if self.stopped() {
                break;
            }

            let end = self
                .store
                .last_position()
                .await
                .map_err(|err| anyhow::Error::new(err).context("failed to read log position"))?;

            if end <= self.position {
                break;
            }

            let events = self
                .store
                .read_from(self.position, self.options.batch_size)
                .await
                .map_err(|err| anyhow::Error::new(err).context("failed to read event log"))?;

            if events.is_empty() {
                break;
            }

            for event in &events {
                if self.stopped() {
                    break 'outer;
                }

                self.project_with_retry(event).await?;
                projected += 1;
            }
        }

        Ok(projected)
    }

    async fn project_with_retry(
        &mut self,
        event: &event::Persisted<event::StreamId, DomainEvent>,
    ) -> anyhow::Result<()> {
        let mut attempts: u32 = 0;

        loop {
            match self.project(event).await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    attempts += 1;

                    if attempts >= POISON_THRESHOLD {
                        tracing::error!(
                            position = event.position,
                            event = event.event.message.name(),
                            %error,
                            "skipping poison event after {attempts} failed attempts",
                        );

                        return self.skip(event).await;
                    }

                    tracing::warn!(
                        position = event.position,
                        event = event.event.message.name(),
                        attempt = attempts,
                        %error,
                        "projection failed, retrying",
                    );

                    tokio::time::sleep(RETRY_BACKOFF * attempts).await;
                }
            }
        }
    }

    // One transaction per event: the state mutation and the cursor advance
    // commit together. Notifications go out only after the commit.
    async fn project(
        &mut self,
        event: &event::Persisted<event::StreamId, DomainEvent>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let notifications = apply::apply(&mut *tx, event).await?;

        save_position(&mut *tx, event.position + 1).await?;

        tx.commit().await.context("failed to commit transaction")?;

        self.position = event.position + 1;

        for (club_id, notification) in notifications {
            self.channels.send(&club_id, &notification);
        }

        Ok(())
    }

    // Advances the cursor past a poison event without touching the rest of
    // the read model.
    async fn skip(
        &mut self,
        event: &event::Persisted<event::StreamId, DomainEvent>,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        save_position(&mut *tx, event.position + 1).await?;

        tx.commit().await.context("failed to commit transaction")?;

        self.position = event.position + 1;

        Ok(())
    }

    async fn load_position(&self) -> anyhow::Result<event::Position> {
        let row = sqlx::query("SELECT position FROM last_recorded_event_position WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .context("failed to load projection cursor")?;

        Ok(row
            .map(|row| row.get::<i64, _>("position") as event::Position)
            .unwrap_or_default())
    }
}

async fn save_position(
    conn: &mut SqliteConnection,
    position: event::Position,
) -> anyhow::Result<()> {
    sqlx::query(
        "INSERT INTO last_recorded_event_position (id, position) VALUES (1, ?1) \
         ON CONFLICT (id) DO UPDATE SET position = excluded.position",
    )
    .bind(position as i64)
    .execute(conn)
    .await
    .context("failed to persist projection cursor")?;

    Ok(())
}
