//! The application layer: one command-handler service per Aggregate kind,
//! plus the integration events republished on the
//! [EventBus][crate::command::EventBus] after successful command handling.
//!
//! Services load Aggregate Roots through their repositories, call the
//! domain mutators and save with the version that was observed on load;
//! the [CommandBus][crate::command::CommandBus] takes care of retrying
//! version conflicts.

pub mod club;
pub mod collective;
pub mod integration;
pub mod player;
pub mod training_session;
pub mod user;
