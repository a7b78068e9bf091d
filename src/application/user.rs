use async_trait::async_trait;

use crate::aggregate::{repository, Repository};
use crate::command;
use crate::domain::{User, UserId, UserRoot};
use crate::fault::Fault;
use crate::message::Message;

#[derive(Clone)]
pub struct Service<R>
where
    R: Repository<User, UserRoot>,
{
    user_repository: R,
}

impl<R> From<R> for Service<R>
where
    R: Repository<User, UserRoot>,
{
    fn from(user_repository: R) -> Self {
        Self { user_repository }
    }
}

impl<R> Service<R>
where
    R: Repository<User, UserRoot>,
{
    async fn user(&self, user_id: &UserId) -> Result<UserRoot, Fault> {
        self.user_repository.get(user_id).await.map_err(|err| match err {
            repository::Error::NotFound => Fault::not_found(format!("user {user_id}")),
            other => other.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpUser {
    pub user_id: UserId,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl Message for SignUpUser {
    fn name(&self) -> &'static str {
        "SignUpUser"
    }
}

#[async_trait]
impl<R> command::Handler<SignUpUser> for Service<R>
where
    R: Repository<User, UserRoot>,
{
    type Error = Fault;

    async fn handle(&self, command: command::Envelope<SignUpUser>) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut user = UserRoot::sign_up(
            actor_id,
            command.user_id,
            command.name,
            command.first_name,
            command.last_name,
            command.email,
        )?;

        self.user_repository.save(&mut user).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUserName {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub name: String,
}

impl Message for UpdateUserName {
    fn name(&self) -> &'static str {
        "UpdateUserName"
    }
}

#[async_trait]
impl<R> command::Handler<UpdateUserName> for Service<R>
where
    R: Repository<User, UserRoot>,
{
    type Error = Fault;

    async fn handle(&self, command: command::Envelope<UpdateUserName>) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut user = self.user(&command.user_id).await?;

        user.update_name(command.first_name, command.last_name, command.name, actor_id)?;

        self.user_repository.save(&mut user).await?;

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateUserEmail {
    pub user_id: UserId,
    pub email: String,
}

impl Message for UpdateUserEmail {
    fn name(&self) -> &'static str {
        "UpdateUserEmail"
    }
}

#[async_trait]
impl<R> command::Handler<UpdateUserEmail> for Service<R>
where
    R: Repository<User, UserRoot>,
{
    type Error = Fault;

    async fn handle(&self, command: command::Envelope<UpdateUserEmail>) -> Result<(), Self::Error> {
        let actor_id = command.actor_id;
        let command = command.message;

        let mut user = self.user(&command.user_id).await?;

        user.update_email(command.email, actor_id)?;

        self.user_repository.save(&mut user).await?;

        Ok(())
    }
}
