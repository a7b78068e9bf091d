//! The relational read-model schema.
//!
//! The projection worker creates missing tables on startup; an optional
//! development reset drops everything and re-tails the event log from
//! position 0.

use sqlx::SqlitePool;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS last_recorded_event_position (
        id INTEGER PRIMARY KEY,
        position INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user (
        id TEXT PRIMARY KEY,
        email TEXT,
        first_name TEXT,
        last_name TEXT,
        name TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS club (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        registration_number TEXT,
        owner_id TEXT REFERENCES user(id),
        number_of_players INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS club_coach (
        club_id TEXT NOT NULL REFERENCES club(id),
        user_id TEXT NOT NULL REFERENCES user(id),
        PRIMARY KEY (club_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collective (
        id TEXT PRIMARY KEY,
        club_id TEXT NOT NULL REFERENCES club(id),
        name TEXT NOT NULL,
        description TEXT,
        number_of_players INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS player (
        id TEXT PRIMARY KEY,
        club_id TEXT REFERENCES club(id),
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        gender TEXT NOT NULL,
        date_of_birth TEXT NOT NULL,
        license_number TEXT,
        license_type TEXT,
        season TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collective_player (
        collective_id TEXT NOT NULL REFERENCES collective(id),
        player_id TEXT NOT NULL REFERENCES player(id),
        PRIMARY KEY (collective_id, player_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS training_session (
        id TEXT PRIMARY KEY,
        club_id TEXT NOT NULL REFERENCES club(id),
        start_time TEXT NOT NULL,
        end_time TEXT NOT NULL,
        cancelled INTEGER NOT NULL DEFAULT 0,
        number_of_players_present INTEGER NOT NULL DEFAULT 0,
        number_of_players_absent INTEGER NOT NULL DEFAULT 0,
        number_of_players_late INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS training_session_player (
        training_session_id TEXT NOT NULL REFERENCES training_session(id),
        player_id TEXT NOT NULL REFERENCES player(id),
        status TEXT NOT NULL,
        reason TEXT,
        arrival_time TEXT,
        PRIMARY KEY (training_session_id, player_id)
    )
    "#,
];

const TABLE_NAMES: &[&str] = &[
    "training_session_player",
    "training_session",
    "collective_player",
    "collective",
    "player",
    "club_coach",
    "club",
    "user",
    "last_recorded_event_position",
];

/// Creates every read-model table that does not exist yet.
pub async fn ensure(pool: &SqlitePool) -> sqlx::Result<()> {
    for ddl in TABLES {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}

/// Drops and recreates the whole read model, resetting the projection
/// cursor to 0.
pub async fn reset(pool: &SqlitePool) -> sqlx::Result<()> {
    for table in TABLE_NAMES {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
    }

    ensure(pool).await
}
