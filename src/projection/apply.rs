//! The projection rules: one relational mutation per Domain Event, plus the
//! notifications to push once the surrounding transaction has committed.

use sqlx::{Row, SqliteConnection};

use crate::domain::{
    AttendanceStatus, ClubEvent, CollectiveEvent, DomainEvent, PlayerEvent, TrainingSessionEvent,
    UserEvent,
};
use crate::event;
use crate::notify::Notification;

/// A notification queued for a club while projecting an event; emitted by
/// the worker only after the transaction commits.
pub(crate) type QueuedNotification = (String, Notification);

fn counter_column(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => "number_of_players_present",
        AttendanceStatus::Absent => "number_of_players_absent",
        AttendanceStatus::Late => "number_of_players_late",
    }
}

async fn club_of_collective(
    conn: &mut SqliteConnection,
    collective_id: &str,
) -> anyhow::Result<Option<String>> {
    Ok(sqlx::query("SELECT club_id FROM collective WHERE id = ?1")
        .bind(collective_id)
        .fetch_optional(conn)
        .await?
        .map(|row| row.get("club_id")))
}

async fn club_of_training_session(
    conn: &mut SqliteConnection,
    training_session_id: &str,
) -> anyhow::Result<Option<String>> {
    Ok(
        sqlx::query("SELECT club_id FROM training_session WHERE id = ?1")
            .bind(training_session_id)
            .fetch_optional(conn)
            .await?
            .map(|row| row.get("club_id")),
    )
}

async fn adjust_attendance_counter(
    conn: &mut SqliteConnection,
    training_session_id: &str,
    status: AttendanceStatus,
    delta: i64,
) -> anyhow::Result<()> {
    let column = counter_column(status);

    sqlx::query(&format!(
        "UPDATE training_session SET {column} = {column} + ?1 WHERE id = ?2"
    ))
    .bind(delta)
    .bind(training_session_id)
    .execute(conn)
    .await?;

    Ok(())
}

async fn record_attendance(
    conn: &mut SqliteConnection,
    training_session_id: &str,
    player_id: &str,
    status: AttendanceStatus,
    reason: Option<&str>,
    arrival_time: Option<String>,
) -> anyhow::Result<Vec<QueuedNotification>> {
    let previous: Option<String> = sqlx::query(
        "SELECT status FROM training_session_player \
         WHERE training_session_id = ?1 AND player_id = ?2",
    )
    .bind(training_session_id)
    .bind(player_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(|row| row.get("status"));

    sqlx::query(
        "INSERT INTO training_session_player \
         (training_session_id, player_id, status, reason, arrival_time) \
         VALUES (?1, ?2, ?3, ?4, ?5) \
         ON CONFLICT (training_session_id, player_id) DO UPDATE SET \
         status = excluded.status, reason = excluded.reason, \
         arrival_time = excluded.arrival_time",
    )
    .bind(training_session_id)
    .bind(player_id)
    .bind(status.as_str())
    .bind(reason)
    .bind(arrival_time)
    .execute(&mut *conn)
    .await?;

    let previous = match previous.as_deref() {
        Some("PRESENT") => Some(AttendanceStatus::Present),
        Some("ABSENT") => Some(AttendanceStatus::Absent),
        Some("LATE") => Some(AttendanceStatus::Late),
        _ => None,
    };

    if let Some(previous) = previous {
        adjust_attendance_counter(&mut *conn, training_session_id, previous, -1).await?;
    }

    adjust_attendance_counter(&mut *conn, training_session_id, status, 1).await?;

    let mut notifications = Vec::new();

    if let Some(club_id) = club_of_training_session(&mut *conn, training_session_id).await? {
        notifications.push((club_id.clone(), Notification::ClubTrainingSessionUpdated));
        notifications.push((club_id, Notification::ClubTrainingSessionListUpdated));
    }

    Ok(notifications)
}

/// Applies a single Domain Event to the read model, returning the
/// notifications to emit after commit.
pub(crate) async fn apply(
    conn: &mut SqliteConnection,
    persisted: &event::Persisted<event::StreamId, DomainEvent>,
) -> anyhow::Result<Vec<QueuedNotification>> {
    match &persisted.event.message {
        DomainEvent::Club(ClubEvent::Created(created)) => {
            sqlx::query(
                "INSERT INTO club (id, name, registration_number, owner_id, number_of_players) \
                 VALUES (?1, ?2, ?3, ?4, 0) \
                 ON CONFLICT (id) DO UPDATE SET name = excluded.name, \
                 registration_number = excluded.registration_number, \
                 owner_id = excluded.owner_id",
            )
            .bind(&created.club_id)
            .bind(&created.name)
            .bind(&created.registration_number)
            .bind(&created.owner_id)
            .execute(conn)
            .await?;

            Ok(Vec::new())
        }

        DomainEvent::Club(ClubEvent::OwnerChanged(changed)) => {
            sqlx::query("UPDATE club SET owner_id = ?1 WHERE id = ?2")
                .bind(&changed.new_owner_id)
                .bind(&changed.club_id)
                .execute(conn)
                .await?;

            Ok(Vec::new())
        }

        DomainEvent::Club(ClubEvent::CoachAdded(added)) => {
            sqlx::query(
                "INSERT OR IGNORE INTO club_coach (club_id, user_id) VALUES (?1, ?2)",
            )
            .bind(&added.club_id)
            .bind(&added.user_id)
            .execute(conn)
            .await?;

            Ok(Vec::new())
        }

        DomainEvent::User(UserEvent::SignedUp(signed_up)) => {
            sqlx::query(
                "INSERT INTO user (id, email, first_name, last_name, name) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT (id) DO UPDATE SET email = excluded.email, \
                 first_name = excluded.first_name, last_name = excluded.last_name, \
                 name = excluded.name",
            )
            .bind(&signed_up.user_id)
            .bind(&signed_up.email)
            .bind(&signed_up.first_name)
            .bind(&signed_up.last_name)
            .bind(&signed_up.name)
            .execute(conn)
            .await?;

            Ok(Vec::new())
        }

        DomainEvent::User(UserEvent::NameUpdated(updated)) => {
            sqlx::query(
                "UPDATE user SET first_name = ?1, last_name = ?2, name = ?3 WHERE id = ?4",
            )
            .bind(&updated.first_name)
            .bind(&updated.last_name)
            .bind(&updated.name)
            .bind(&updated.user_id)
            .execute(conn)
            .await?;

            Ok(Vec::new())
        }

        DomainEvent::User(UserEvent::EmailUpdated(updated)) => {
            sqlx::query("UPDATE user SET email = ?1 WHERE id = ?2")
                .bind(&updated.email)
                .bind(&updated.user_id)
                .execute(conn)
                .await?;

            Ok(Vec::new())
        }

        DomainEvent::Player(PlayerEvent::Registered(registered)) => {
            sqlx::query(
                "INSERT INTO player \
                 (id, first_name, last_name, gender, date_of_birth, license_number) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
                 ON CONFLICT (id) DO UPDATE SET first_name = excluded.first_name, \
                 last_name = excluded.last_name, gender = excluded.gender, \
                 date_of_birth = excluded.date_of_birth, \
                 license_number = excluded.license_number",
            )
            .bind(&registered.player_id)
            .bind(&registered.first_name)
            .bind(&registered.last_name)
            .bind(registered.gender.as_str())
            .bind(registered.date_of_birth.to_string())
            .bind(&registered.license_number)
            .execute(conn)
            .await?;

            Ok(Vec::new())
        }

        DomainEvent::Player(PlayerEvent::RegisteredToClub(registered)) => {
            sqlx::query(
                "UPDATE player SET club_id = ?1, season = ?2, license_type = ?3 WHERE id = ?4",
            )
            .bind(&registered.club_id)
            .bind(&registered.season)
            .bind(registered.license_type.map(|license| license.as_str()))
            .bind(&registered.player_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE club SET number_of_players = number_of_players + 1 WHERE id = ?1",
            )
            .bind(&registered.club_id)
            .execute(conn)
            .await?;

            Ok(vec![(
                registered.club_id.clone(),
                Notification::ClubPlayerListUpdated,
            )])
        }

        DomainEvent::Player(PlayerEvent::UnregisteredFromClub(unregistered)) => {
            sqlx::query("UPDATE player SET club_id = NULL WHERE id = ?1")
                .bind(&unregistered.player_id)
                .execute(&mut *conn)
                .await?;

            sqlx::query(
                "UPDATE club SET number_of_players = number_of_players - 1 WHERE id = ?1",
            )
            .bind(&unregistered.club_id)
            .execute(conn)
            .await?;

            Ok(vec![(
                unregistered.club_id.clone(),
                Notification::ClubPlayerListUpdated,
            )])
        }

        DomainEvent::Collective(CollectiveEvent::Created(created)) => {
            sqlx::query(
                "INSERT INTO collective (id, club_id, name, description, number_of_players) \
                 VALUES (?1, ?2, ?3, ?4, 0) \
                 ON CONFLICT (id) DO UPDATE SET club_id = excluded.club_id, \
                 name = excluded.name, description = excluded.description",
            )
            .bind(&created.collective_id)
            .bind(&created.club_id)
            .bind(&created.name)
            .bind(&created.description)
            .execute(conn)
            .await?;

            Ok(vec![(
                created.club_id.clone(),
                Notification::ClubCollectiveListUpdated,
            )])
        }

        DomainEvent::Collective(CollectiveEvent::PlayerAdded(added)) => {
            sqlx::query(
                "INSERT OR IGNORE INTO collective_player (collective_id, player_id) \
                 VALUES (?1, ?2)",
            )
            .bind(&added.collective_id)
            .bind(&added.player_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE collective SET number_of_players = number_of_players + 1 WHERE id = ?1",
            )
            .bind(&added.collective_id)
            .execute(&mut *conn)
            .await?;

            Ok(club_of_collective(conn, &added.collective_id)
                .await?
                .map(|club_id| vec![(club_id, Notification::ClubCollectiveListUpdated)])
                .unwrap_or_default())
        }

        DomainEvent::Collective(CollectiveEvent::PlayerRemoved(removed)) => {
            sqlx::query(
                "DELETE FROM collective_player \
                 WHERE collective_id = ?1 AND player_id = ?2",
            )
            .bind(&removed.collective_id)
            .bind(&removed.player_id)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE collective SET number_of_players = number_of_players - 1 WHERE id = ?1",
            )
            .bind(&removed.collective_id)
            .execute(&mut *conn)
            .await?;

            Ok(club_of_collective(conn, &removed.collective_id)
                .await?
                .map(|club_id| vec![(club_id, Notification::ClubCollectiveListUpdated)])
                .unwrap_or_default())
        }

        DomainEvent::TrainingSession(TrainingSessionEvent::Created(created)) => {
            sqlx::query(
                "INSERT INTO training_session (id, club_id, start_time, end_time, cancelled) \
                 VALUES (?1, ?2, ?3, ?4, 0) \
                 ON CONFLICT (id) DO UPDATE SET club_id = excluded.club_id, \
                 start_time = excluded.start_time, end_time = excluded.end_time",
            )
            .bind(&created.training_session_id)
            .bind(&created.club_id)
            .bind(created.start_time.to_rfc3339())
            .bind(created.end_time.to_rfc3339())
            .execute(conn)
            .await?;

            Ok(vec![(
                created.club_id.clone(),
                Notification::ClubTrainingSessionListUpdated,
            )])
        }

        DomainEvent::TrainingSession(TrainingSessionEvent::Cancelled(cancelled)) => {
            sqlx::query("UPDATE training_session SET cancelled = 1 WHERE id = ?1")
                .bind(&cancelled.training_session_id)
                .execute(&mut *conn)
                .await?;

            Ok(
                club_of_training_session(conn, &cancelled.training_session_id)
                    .await?
                    .map(|club_id| {
                        vec![(club_id, Notification::ClubTrainingSessionListUpdated)]
                    })
                    .unwrap_or_default(),
            )
        }

        DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToPresent(
            changed,
        )) => {
            record_attendance(
                conn,
                &changed.training_session_id,
                &changed.player_id,
                AttendanceStatus::Present,
                None,
                None,
            )
            .await
        }

        DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToAbsent(
            changed,
        )) => {
            record_attendance(
                conn,
                &changed.training_session_id,
                &changed.player_id,
                AttendanceStatus::Absent,
                changed.reason.as_deref(),
                None,
            )
            .await
        }

        DomainEvent::TrainingSession(TrainingSessionEvent::PlayerStatusChangedToLate(changed)) => {
            record_attendance(
                conn,
                &changed.training_session_id,
                &changed.player_id,
                AttendanceStatus::Late,
                changed.reason.as_deref(),
                Some(changed.arrival_time.to_rfc3339()),
            )
            .await
        }

        // The federation registry has no read-model surface.
        DomainEvent::Federation(_) => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod test {
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    use crate::domain::club::ClubCreated;
    use crate::domain::collective::{
        CollectiveCreated, PlayerAddedToCollective, PlayerRemovedFromCollective,
    };
    use crate::domain::ClubEvent;
    use crate::projection::schema;

    use super::*;

    async fn read_model() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory read model should open");

        schema::ensure(&pool).await.expect("schema should apply");

        pool
    }

    fn persisted(
        position: u64,
        stream_id: &str,
        version: i64,
        message: DomainEvent,
    ) -> event::Persisted<event::StreamId, DomainEvent> {
        event::Persisted {
            stream_id: stream_id.to_owned(),
            version,
            position,
            event: event::Envelope::new("u1", message),
        }
    }

    async fn number_of_players(conn: &mut SqliteConnection, collective_id: &str) -> i64 {
        sqlx::query("SELECT number_of_players FROM collective WHERE id = ?1")
            .bind(collective_id)
            .fetch_one(&mut *conn)
            .await
            .expect("collective row should exist")
            .get("number_of_players")
    }

    async fn membership_rows(conn: &mut SqliteConnection, collective_id: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS n FROM collective_player WHERE collective_id = ?1")
            .bind(collective_id)
            .fetch_one(&mut *conn)
            .await
            .expect("count query should not fail")
            .get("n")
    }

    #[tokio::test]
    async fn adding_then_removing_a_player_restores_the_collective_projection() {
        let pool = read_model().await;
        let mut conn = pool.acquire().await.expect("acquire connection");

        apply(
            &mut conn,
            &persisted(
                0,
                "club-c1",
                0,
                DomainEvent::Club(ClubEvent::Created(ClubCreated {
                    club_id: "c1".to_owned(),
                    name: "Alpha".to_owned(),
                    registration_number: None,
                    owner_id: "u1".to_owned(),
                })),
            ),
        )
        .await
        .expect("club projection should apply");

        apply(
            &mut conn,
            &persisted(
                1,
                "collective-k1",
                0,
                DomainEvent::Collective(CollectiveEvent::Created(CollectiveCreated {
                    collective_id: "k1".to_owned(),
                    club_id: "c1".to_owned(),
                    name: "U15".to_owned(),
                    description: None,
                })),
            ),
        )
        .await
        .expect("collective projection should apply");

        let players_before_add = number_of_players(&mut conn, "k1").await;

        let notifications = apply(
            &mut conn,
            &persisted(
                2,
                "collective-k1",
                1,
                DomainEvent::Collective(CollectiveEvent::PlayerAdded(PlayerAddedToCollective {
                    collective_id: "k1".to_owned(),
                    player_id: "p1".to_owned(),
                })),
            ),
        )
        .await
        .expect("membership projection should apply");

        assert_eq!(players_before_add + 1, number_of_players(&mut conn, "k1").await);
        assert_eq!(1, membership_rows(&mut conn, "k1").await);
        assert_eq!(
            vec![("c1".to_owned(), Notification::ClubCollectiveListUpdated)],
            notifications,
        );

        apply(
            &mut conn,
            &persisted(
                3,
                "collective-k1",
                2,
                DomainEvent::Collective(CollectiveEvent::PlayerRemoved(
                    PlayerRemovedFromCollective {
                        collective_id: "k1".to_owned(),
                        player_id: "p1".to_owned(),
                    },
                )),
            ),
        )
        .await
        .expect("membership projection should apply");

        // Back to the pre-add state: no membership row, unchanged counter.
        assert_eq!(players_before_add, number_of_players(&mut conn, "k1").await);
        assert_eq!(0, membership_rows(&mut conn, "k1").await);
    }
}
