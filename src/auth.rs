//! Authorization hook invoked by the [CommandBus][crate::command::CommandBus]
//! before dispatching a command to its handler.
//!
//! The policy itself lives outside the core: the session layer supplies the
//! authenticated actor id on each command, and deployments plug their own
//! [Authorize] implementation in at startup.

use async_trait::async_trait;

use crate::fault::Fault;
use crate::message::ActorId;

/// Decides whether a command issued by an actor may proceed.
#[async_trait]
pub trait Authorize: Send + Sync {
    /// Returns `Ok(())` to accept the command, or [Fault::Unauthorized]
    /// to refuse it.
    async fn authorize(&self, actor_id: &ActorId, command_name: &'static str)
        -> Result<(), Fault>;
}

/// An [Authorize] implementation that accepts every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl Authorize for AllowAll {
    async fn authorize(
        &self,
        _actor_id: &ActorId,
        _command_name: &'static str,
    ) -> Result<(), Fault> {
        Ok(())
    }
}
