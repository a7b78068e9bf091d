//! Cross-tenant read facade: club directory, public player cards and the
//! clubs a user belongs to (as owner or coach).

use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::domain::{ClubId, PlayerId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ClubSummary {
    pub id: ClubId,
    pub name: String,
    pub registration_number: Option<String>,
    pub number_of_players: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct ClubDetails {
    pub id: ClubId,
    pub name: String,
    pub registration_number: Option<String>,
    pub owner_id: Option<UserId>,
    pub number_of_players: i64,
}

/// The public card of a player: identity and current membership, no
/// attendance data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PlayerCard {
    pub id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub date_of_birth: String,
    pub club_id: Option<ClubId>,
    pub license_number: Option<String>,
    pub license_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PublicReads {
    pool: SqlitePool,
}

impl PublicReads {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Lists every club, ordered by name.
    pub async fn clubs(&self) -> sqlx::Result<Vec<ClubSummary>> {
        sqlx::query_as(
            "SELECT id, name, registration_number, number_of_players \
             FROM club ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Fetches a single club by id.
    pub async fn club(&self, club_id: &str) -> sqlx::Result<Option<ClubDetails>> {
        sqlx::query_as(
            "SELECT id, name, registration_number, owner_id, number_of_players \
             FROM club WHERE id = ?1",
        )
        .bind(club_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Fetches the public card of a player.
    pub async fn player_card(&self, player_id: &str) -> sqlx::Result<Option<PlayerCard>> {
        sqlx::query_as(
            "SELECT id, first_name, last_name, gender, date_of_birth, club_id, \
             license_number, license_type \
             FROM player WHERE id = ?1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Lists the clubs a user owns or coaches, ordered by name.
    pub async fn user_clubs(&self, user_id: &str) -> sqlx::Result<Vec<ClubSummary>> {
        sqlx::query_as(
            "SELECT id, name, registration_number, number_of_players FROM club \
             WHERE owner_id = ?1 \
             OR id IN (SELECT club_id FROM club_coach WHERE user_id = ?1) \
             ORDER BY name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}
