//! Club-scoped read facade: collectives, paginated player lists, player
//! search and training-session pages for a single club.

use serde::Serialize;
use sqlx::{FromRow, Row, SqlitePool};

use crate::domain::{ClubId, CollectiveId, PlayerId, TrainingSessionId};
use crate::query::{substring_pattern, Page};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct CollectiveSummary {
    pub id: CollectiveId,
    pub name: String,
    pub description: Option<String>,
    pub number_of_players: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct PlayerRow {
    pub id: PlayerId,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub date_of_birth: String,
    pub license_number: Option<String>,
    pub license_type: Option<String>,
    pub season: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct TrainingSessionRow {
    pub id: TrainingSessionId,
    pub start_time: String,
    pub end_time: String,
    pub cancelled: bool,
    pub number_of_players_present: i64,
    pub number_of_players_absent: i64,
    pub number_of_players_late: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AttendanceRow {
    pub player_id: PlayerId,
    pub status: String,
    pub reason: Option<String>,
    pub arrival_time: Option<String>,
}

/// A training session together with its recorded attendance.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSessionDetails {
    pub session: TrainingSessionRow,
    pub attendance: Vec<AttendanceRow>,
}

const PLAYER_COLUMNS: &str = "id, first_name, last_name, gender, date_of_birth, \
                              license_number, license_type, season";

/// Read facade scoped to one club.
#[derive(Debug, Clone)]
pub struct ClubReads {
    pool: SqlitePool,
    club_id: ClubId,
}

impl ClubReads {
    pub fn new(pool: SqlitePool, club_id: ClubId) -> Self {
        Self { pool, club_id }
    }

    /// Lists the collectives of the club, ordered by name.
    pub async fn collectives(&self) -> sqlx::Result<Vec<CollectiveSummary>> {
        sqlx::query_as(
            "SELECT id, name, description, number_of_players \
             FROM collective WHERE club_id = ?1 ORDER BY name",
        )
        .bind(&self.club_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Pages through the players of the club, ordered by last name then
    /// first name.
    pub async fn players(&self, page: i64, per_page: i64) -> sqlx::Result<Page<PlayerRow>> {
        let per_page = per_page.max(1);

        let total_count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM player WHERE club_id = ?1")
            .bind(&self.club_id)
            .fetch_one(&self.pool)
            .await?
            .get("n");

        let results = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE club_id = ?1 \
             ORDER BY last_name, first_name LIMIT ?2 OFFSET ?3"
        ))
        .bind(&self.club_id)
        .bind(per_page)
        .bind(page * per_page)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total_count, page, per_page, results))
    }

    /// Case-insensitive substring search over first name, last name and
    /// license number.
    pub async fn search_players(
        &self,
        term: &str,
        page: i64,
        per_page: i64,
    ) -> sqlx::Result<Page<PlayerRow>> {
        let per_page = per_page.max(1);
        let pattern = substring_pattern(term);

        const MATCH: &str = "club_id = ?1 AND (LOWER(first_name) LIKE ?2 ESCAPE '\\' \
                             OR LOWER(last_name) LIKE ?2 ESCAPE '\\' \
                             OR LOWER(COALESCE(license_number, '')) LIKE ?2 ESCAPE '\\')";

        let total_count: i64 =
            sqlx::query(&format!("SELECT COUNT(*) AS n FROM player WHERE {MATCH}"))
                .bind(&self.club_id)
                .bind(&pattern)
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let results = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE {MATCH} \
             ORDER BY last_name, first_name LIMIT ?3 OFFSET ?4"
        ))
        .bind(&self.club_id)
        .bind(&pattern)
        .bind(per_page)
        .bind(page * per_page)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total_count, page, per_page, results))
    }

    /// Lists the players of a collective, ordered by last name then first
    /// name.
    pub async fn collective_players(
        &self,
        collective_id: &str,
    ) -> sqlx::Result<Vec<PlayerRow>> {
        sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player \
             WHERE club_id = ?1 AND id IN \
             (SELECT player_id FROM collective_player WHERE collective_id = ?2) \
             ORDER BY last_name, first_name"
        ))
        .bind(&self.club_id)
        .bind(collective_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Pages through the club players that are not part of the given
    /// collective.
    pub async fn players_not_in_collective(
        &self,
        collective_id: &str,
        page: i64,
        per_page: i64,
    ) -> sqlx::Result<Page<PlayerRow>> {
        let per_page = per_page.max(1);

        const MATCH: &str = "club_id = ?1 AND id NOT IN \
                             (SELECT player_id FROM collective_player WHERE collective_id = ?2)";

        let total_count: i64 =
            sqlx::query(&format!("SELECT COUNT(*) AS n FROM player WHERE {MATCH}"))
                .bind(&self.club_id)
                .bind(collective_id)
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let results = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE {MATCH} \
             ORDER BY last_name, first_name LIMIT ?3 OFFSET ?4"
        ))
        .bind(&self.club_id)
        .bind(collective_id)
        .bind(per_page)
        .bind(page * per_page)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total_count, page, per_page, results))
    }

    /// Pages through the training sessions of the club, most recent first.
    pub async fn training_sessions(
        &self,
        page: i64,
        per_page: i64,
    ) -> sqlx::Result<Page<TrainingSessionRow>> {
        let per_page = per_page.max(1);

        let total_count: i64 =
            sqlx::query("SELECT COUNT(*) AS n FROM training_session WHERE club_id = ?1")
                .bind(&self.club_id)
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let results = sqlx::query_as(
            "SELECT id, start_time, end_time, cancelled, number_of_players_present, \
             number_of_players_absent, number_of_players_late \
             FROM training_session WHERE club_id = ?1 \
             ORDER BY start_time DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(&self.club_id)
        .bind(per_page)
        .bind(page * per_page)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total_count, page, per_page, results))
    }

    /// Fetches a training session of the club together with its attendance.
    pub async fn training_session(
        &self,
        training_session_id: &str,
    ) -> sqlx::Result<Option<TrainingSessionDetails>> {
        let session: Option<TrainingSessionRow> = sqlx::query_as(
            "SELECT id, start_time, end_time, cancelled, number_of_players_present, \
             number_of_players_absent, number_of_players_late \
             FROM training_session WHERE id = ?1 AND club_id = ?2",
        )
        .bind(training_session_id)
        .bind(&self.club_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let attendance = sqlx::query_as(
            "SELECT player_id, status, reason, arrival_time \
             FROM training_session_player WHERE training_session_id = ?1 \
             ORDER BY player_id",
        )
        .bind(training_session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(TrainingSessionDetails {
            session,
            attendance,
        }))
    }

    /// Pages through the club players with no attendance recorded for the
    /// given training session.
    pub async fn players_without_attendance(
        &self,
        training_session_id: &str,
        page: i64,
        per_page: i64,
    ) -> sqlx::Result<Page<PlayerRow>> {
        let per_page = per_page.max(1);

        const MATCH: &str = "club_id = ?1 AND id NOT IN \
                             (SELECT player_id FROM training_session_player \
                              WHERE training_session_id = ?2)";

        let total_count: i64 =
            sqlx::query(&format!("SELECT COUNT(*) AS n FROM player WHERE {MATCH}"))
                .bind(&self.club_id)
                .bind(training_session_id)
                .fetch_one(&self.pool)
                .await?
                .get("n");

        let results = sqlx::query_as(&format!(
            "SELECT {PLAYER_COLUMNS} FROM player WHERE {MATCH} \
             ORDER BY last_name, first_name LIMIT ?3 OFFSET ?4"
        ))
        .bind(&self.club_id)
        .bind(training_session_id)
        .bind(per_page)
        .bind(page * per_page)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(total_count, page, per_page, results))
    }
}
