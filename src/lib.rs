//! Event-sourced backend for sports-club management.
//!
//! The write path goes command → [command::CommandBus] → application
//! service → [aggregate] → [aggregate::Repository] → [event::Store]. The
//! [projection::Worker] tails the store's global log into a relational read
//! model served by the [query] facades, and pushes per-club notifications
//! through the [notify::ClubChannels] registry.

pub mod aggregate;
pub mod application;
pub mod auth;
pub mod command;
pub mod config;
pub mod domain;
pub mod event;
pub mod fault;
pub mod message;
pub mod notify;
pub mod projection;
pub mod query;
pub mod serde;
pub mod server;
pub mod telemetry;
pub mod version;
