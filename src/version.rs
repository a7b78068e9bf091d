//! Contains the types necessary for Optimistic Locking through versioning.

/// A version used for Optimistic Locking.
///
/// Versions are assigned per Event Stream, starting at 0 for the first
/// recorded Domain Event. A Stream that has never been persisted has a
/// current version of [EMPTY_STREAM].
pub type Version = i64;

/// The current version of an Event Stream with no recorded Domain Events.
///
/// Creation saves assert this value to detect concurrent creations.
pub const EMPTY_STREAM: Version = -1;

/// Specifies the optimistic locking level applied when appending new
/// Domain Events to an Event Stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// Append the events disregarding the current Stream [Version].
    Any,

    /// Append the events only if the current [Version] of the Stream is
    /// exactly the one specified.
    MustBe(Version),
}

/// This error is returned by a function when a version conflict has
/// been detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("conflict error detected, expected version was: {expected}, found: {actual}")]
pub struct ConflictError {
    /// The [Version] value that was expected when calling the function that failed.
    pub expected: Version,

    /// The actual [Version] value, which mismatch caused this error.
    pub actual: Version,
}
