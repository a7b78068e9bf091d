use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::aggregate::{repository, Repository, Root};
use crate::command;
use crate::domain::{
    AttendanceStatus, ClubId, Player, PlayerId, PlayerRoot, TrainingSession, TrainingSessionId,
    TrainingSessionRoot,
};
use crate::fault::Fault;
use crate::message::Message;

#[derive(Clone)]
pub struct Service<TR, PR>
where
    TR: Repository<TrainingSession, TrainingSessionRoot>,
    PR: Repository<Player, PlayerRoot>,
{
    training_session_repository: TR,
    player_repository: PR,
}

impl<TR, PR> Service<TR, PR>
where
    TR: Repository<TrainingSession, TrainingSessionRoot>,
    PR: Repository<Player, PlayerRoot>,
{
    pub fn new(training_session_repository: TR, player_repository: PR) -> Self {
        Self {
            training_session_repository,
            player_repository,
        }
    }

    async fn session_in_club(
        &self,
        training_session_id: &TrainingSessionId,
        club_id: &ClubId,
    ) -> Result<TrainingSessionRoot, Fault> {
        let session = self
            .training_session_repository
            .get(training_session_id)
            .await
            .map_err(|err| match err {
                repository::Error::NotFound => {
                    Fault::not_found(format!("training session {training_session_id}"))
                }
                other => other.into(),
            })?;

        if session.state().club_id() != club_id {
            return Err(Fault::invalid_operation(
                "training session is not in the club",
            ));
        }

        Ok(session)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTrainingSession {
    pub club_id: ClubId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl Message for CreateTrainingSession {
    fn name(&self) -> &'static str {
        "CreateTrainingSession"
    }
}

#[async_trait]
impl<TR, PR> command::Handler<CreateTrainingSession> for Service<TR, PR>
where
    TR: Repository<TrainingSession, TrainingSessionRoot>,
    PR: Repository<Player, PlayerRoot>,
{
    type Error = Fault;

    async fn handle(
        &self,
        command: command::Envelope<CreateTrainingSession>,
    ) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut session = TrainingSessionRoot::create(
            actor_id,
            command.club_id,
            command.start_time,
            command.end_time,
        )?;

        self.training_session_repository.save(&mut session).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelTrainingSession {
    pub club_id: ClubId,
    pub training_session_id: TrainingSessionId,
}

impl Message for CancelTrainingSession {
    fn name(&self) -> &'static str {
        "CancelTrainingSession"
    }
}

#[async_trait]
impl<TR, PR> command::Handler<CancelTrainingSession> for Service<TR, PR>
where
    TR: Repository<TrainingSession, TrainingSessionRoot>,
    PR: Repository<Player, PlayerRoot>,
{
    type Error = Fault;

    async fn handle(
        &self,
        command: command::Envelope<CancelTrainingSession>,
    ) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut session = self
            .session_in_club(&command.training_session_id, &command.club_id)
            .await?;

        session.cancel(actor_id)?;

        self.training_session_repository.save(&mut session).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangePlayerTrainingSessionStatus {
    pub club_id: ClubId,
    pub training_session_id: TrainingSessionId,
    pub player_id: PlayerId,
    pub status: AttendanceStatus,
    pub reason: Option<String>,
    pub arrival_time: Option<DateTime<Utc>>,
    pub with_reason: bool,
}

impl Message for ChangePlayerTrainingSessionStatus {
    fn name(&self) -> &'static str {
        "ChangePlayerTrainingSessionStatus"
    }
}

#[async_trait]
impl<TR, PR> command::Handler<ChangePlayerTrainingSessionStatus> for Service<TR, PR>
where
    TR: Repository<TrainingSession, TrainingSessionRoot>,
    PR: Repository<Player, PlayerRoot>,
{
    type Error = Fault;

    async fn handle(
        &self,
        command: command::Envelope<ChangePlayerTrainingSessionStatus>,
    ) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut session = self
            .session_in_club(&command.training_session_id, &command.club_id)
            .await?;

        let player = self
            .player_repository
            .get(&command.player_id)
            .await
            .map_err(|err| match err {
                repository::Error::NotFound => {
                    Fault::not_found(format!("player {}", command.player_id))
                }
                other => other.into(),
            })?;

        if player.state().club_id() != Some(&command.club_id) {
            return Err(Fault::invalid_operation("player is not in the club"));
        }

        session.change_player_status(
            command.player_id,
            command.status,
            command.reason,
            command.with_reason,
            command.arrival_time,
            actor_id,
        )?;

        self.training_session_repository.save(&mut session).await?;

        Ok(())
    }
}
