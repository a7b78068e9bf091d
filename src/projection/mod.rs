//! The read-model projection: relational schema, per-event apply rules and
//! the worker tailing the global event log.

mod apply;
pub mod schema;
pub mod worker;

pub use worker::{Options, StopHandle, Worker};
