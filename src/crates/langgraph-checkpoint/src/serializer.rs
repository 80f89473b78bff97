//! Serialization protocol for checkpoints and pending writes

use crate::error::{CheckpointError, Result};
use serde::{Deserialize, Serialize};

/// Type tag emitted by [`JsonPlusSerializer::dumps_typed`]
pub const JSON_TYPE: &str = "json";

/// Protocol for serializing and deserializing checkpoint data
///
/// Backends store metadata through [`dumps`](Self::dumps) and pending write
/// values through [`dumps_typed`](Self::dumps_typed), which pairs the encoded
/// bytes with a tag naming the encoding so they can be decoded later.
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;

    /// Serialize a value to `(type_tag, bytes)`
    fn dumps_typed(&self, value: &serde_json::Value) -> Result<(String, Vec<u8>)>;

    /// Deserialize bytes previously produced by [`dumps_typed`](Self::dumps_typed)
    fn loads_typed(&self, type_tag: &str, data: &[u8]) -> Result<serde_json::Value>;
}

/// JSON serializer used by default for checkpoint backends
#[derive(Debug, Clone, Default)]
pub struct JsonPlusSerializer;

impl JsonPlusSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonPlusSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }

    fn dumps_typed(&self, value: &serde_json::Value) -> Result<(String, Vec<u8>)> {
        Ok((JSON_TYPE.to_string(), serde_json::to_vec(value)?))
    }

    fn loads_typed(&self, type_tag: &str, data: &[u8]) -> Result<serde_json::Value> {
        match type_tag {
            JSON_TYPE => Ok(serde_json::from_slice(data)?),
            other => Err(CheckpointError::Invalid(format!(
                "unsupported serialization type: {}",
                other
            ))),
        }
    }
}
