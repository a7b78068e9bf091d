//! A [Serde] implementation can be used to serialize and deserialize
//! values into and from a tagged wire format, where the type tag
//! travels separately from the serialized payload.
//!
//! This is the shape required by the event journal, where each stored
//! descriptor carries an `event_type` tag next to its `event_data` payload,
//! and deserialization resolves the concrete type through the tag.

/// Serializes values of a given type to a JSON payload, and deserializes
/// them back from a `(type tag, payload)` pair.
///
/// Implementations act as the type registry of the system: the set of tags
/// they recognize is the set of types that can be read back from storage.
pub trait Serde<T>: Send + Sync {
    /// The error returned by [Serde::serialize] and [Serde::deserialize].
    type Error: std::error::Error + Send + Sync + 'static;

    /// Serializes the given value into its JSON payload representation.
    /// The type tag is carried by the value itself.
    fn serialize(&self, value: &T) -> Result<String, Self::Error>;

    /// Deserializes a value from the payload previously produced by
    /// [Serde::serialize], resolving the concrete type through the tag.
    fn deserialize(&self, type_name: &str, data: &str) -> Result<T, Self::Error>;
}
