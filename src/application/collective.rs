use async_trait::async_trait;

use crate::aggregate::{repository, Repository};
use crate::command;
use crate::domain::{
    Club, ClubId, ClubRoot, Collective, CollectiveId, CollectiveRoot, PlayerId,
};
use crate::fault::Fault;
use crate::message::Message;

#[derive(Clone)]
pub struct Service<LR, CR>
where
    LR: Repository<Collective, CollectiveRoot>,
    CR: Repository<Club, ClubRoot>,
{
    collective_repository: LR,
    club_repository: CR,
}

impl<LR, CR> Service<LR, CR>
where
    LR: Repository<Collective, CollectiveRoot>,
    CR: Repository<Club, ClubRoot>,
{
    pub fn new(collective_repository: LR, club_repository: CR) -> Self {
        Self {
            collective_repository,
            club_repository,
        }
    }

    async fn collective(&self, collective_id: &CollectiveId) -> Result<CollectiveRoot, Fault> {
        self.collective_repository
            .get(collective_id)
            .await
            .map_err(|err| match err {
                repository::Error::NotFound => {
                    Fault::not_found(format!("collective {collective_id}"))
                }
                other => other.into(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCollective {
    pub club_id: ClubId,
    pub name: String,
    pub description: Option<String>,
}

impl Message for CreateCollective {
    fn name(&self) -> &'static str {
        "CreateCollective"
    }
}

#[async_trait]
impl<LR, CR> command::Handler<CreateCollective> for Service<LR, CR>
where
    LR: Repository<Collective, CollectiveRoot>,
    CR: Repository<Club, ClubRoot>,
{
    type Error = Fault;

    async fn handle(
        &self,
        command: command::Envelope<CreateCollective>,
    ) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        self.club_repository
            .get(&command.club_id)
            .await
            .map_err(|err| match err {
                repository::Error::NotFound => {
                    Fault::not_found(format!("club {}", command.club_id))
                }
                other => other.into(),
            })?;

        let mut collective = CollectiveRoot::create(
            actor_id,
            command.club_id,
            command.name,
            command.description,
        )?;

        self.collective_repository.save(&mut collective).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPlayerToCollective {
    pub collective_id: CollectiveId,
    pub player_id: PlayerId,
}

impl Message for AddPlayerToCollective {
    fn name(&self) -> &'static str {
        "AddPlayerToCollective"
    }
}

#[async_trait]
impl<LR, CR> command::Handler<AddPlayerToCollective> for Service<LR, CR>
where
    LR: Repository<Collective, CollectiveRoot>,
    CR: Repository<Club, ClubRoot>,
{
    type Error = Fault;

    async fn handle(
        &self,
        command: command::Envelope<AddPlayerToCollective>,
    ) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut collective = self.collective(&command.collective_id).await?;

        collective.add_player(command.player_id, actor_id)?;

        self.collective_repository.save(&mut collective).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovePlayerFromCollective {
    pub collective_id: CollectiveId,
    pub player_id: PlayerId,
}

impl Message for RemovePlayerFromCollective {
    fn name(&self) -> &'static str {
        "RemovePlayerFromCollective"
    }
}

#[async_trait]
impl<LR, CR> command::Handler<RemovePlayerFromCollective> for Service<LR, CR>
where
    LR: Repository<Collective, CollectiveRoot>,
    CR: Repository<Club, ClubRoot>,
{
    type Error = Fault;

    async fn handle(
        &self,
        command: command::Envelope<RemovePlayerFromCollective>,
    ) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut collective = self.collective(&command.collective_id).await?;

        collective.remove_player(command.player_id, actor_id)?;

        self.collective_repository.save(&mut collective).await?;

        Ok(())
    }
}
