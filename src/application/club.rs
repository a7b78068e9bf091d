use async_trait::async_trait;

use crate::aggregate::{repository, Repository};
use crate::command;
use crate::domain::{Club, ClubId, ClubRoot, UserId};
use crate::fault::Fault;
use crate::message::Message;

#[derive(Clone)]
pub struct Service<R>
where
    R: Repository<Club, ClubRoot>,
{
    club_repository: R,
}

impl<R> From<R> for Service<R>
where
    R: Repository<Club, ClubRoot>,
{
    fn from(club_repository: R) -> Self {
        Self { club_repository }
    }
}

impl<R> Service<R>
where
    R: Repository<Club, ClubRoot>,
{
    async fn club(&self, club_id: &ClubId) -> Result<ClubRoot, Fault> {
        self.club_repository.get(club_id).await.map_err(|err| match err {
            repository::Error::NotFound => Fault::not_found(format!("club {club_id}")),
            other => other.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateClub {
    pub name: String,
    pub owner_id: UserId,
    pub registration_number: Option<String>,
}

impl Message for CreateClub {
    fn name(&self) -> &'static str {
        "CreateClub"
    }
}

#[async_trait]
impl<R> command::Handler<CreateClub> for Service<R>
where
    R: Repository<Club, ClubRoot>,
{
    type Error = Fault;

    async fn handle(&self, command: command::Envelope<CreateClub>) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut club = ClubRoot::create(
            actor_id,
            command.name,
            command.registration_number,
            command.owner_id,
        )?;

        self.club_repository.save(&mut club).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeClubOwner {
    pub club_id: ClubId,
    pub new_owner_id: UserId,
}

impl Message for ChangeClubOwner {
    fn name(&self) -> &'static str {
        "ChangeClubOwner"
    }
}

#[async_trait]
impl<R> command::Handler<ChangeClubOwner> for Service<R>
where
    R: Repository<Club, ClubRoot>,
{
    type Error = Fault;

    async fn handle(&self, command: command::Envelope<ChangeClubOwner>) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut club = self.club(&command.club_id).await?;

        club.change_owner(command.new_owner_id, actor_id)?;

        self.club_repository.save(&mut club).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCoach {
    pub club_id: ClubId,
    pub user_id: UserId,
}

impl Message for AddCoach {
    fn name(&self) -> &'static str {
        "AddCoach"
    }
}

#[async_trait]
impl<R> command::Handler<AddCoach> for Service<R>
where
    R: Repository<Club, ClubRoot>,
{
    type Error = Fault;

    async fn handle(&self, command: command::Envelope<AddCoach>) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut club = self.club(&command.club_id).await?;

        club.add_coach(command.user_id, actor_id)?;

        self.club_repository.save(&mut club).await?;

        Ok(())
    }
}
