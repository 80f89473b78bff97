//! Row models for the checkpoint tables

use langgraph_checkpoint::{
    serializer::JSON_TYPE, Checkpoint, CheckpointConfig, CheckpointError, CheckpointMetadata,
    PendingWrite, SerializerProtocol,
};
use sqlx::FromRow;

/// A row of the checkpoints table
#[derive(Debug, Clone, FromRow)]
pub struct CheckpointRow {
    pub thread_id: String,
    pub checkpoint_ns: String,
    pub checkpoint_id: String,
    pub parent_checkpoint_id: Option<String>,
    pub checkpoint: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl CheckpointRow {
    /// Config pointing at this checkpoint
    pub fn config(&self) -> CheckpointConfig {
        CheckpointConfig::new()
            .with_thread_id(self.thread_id.clone())
            .with_checkpoint_ns(self.checkpoint_ns.clone())
            .with_checkpoint_id(self.checkpoint_id.clone())
    }

    /// Config pointing at the parent checkpoint, if any
    pub fn parent_config(&self) -> Option<CheckpointConfig> {
        self.parent_checkpoint_id.as_ref().map(|parent_id| {
            CheckpointConfig::new()
                .with_thread_id(self.thread_id.clone())
                .with_checkpoint_ns(self.checkpoint_ns.clone())
                .with_checkpoint_id(parent_id.clone())
        })
    }

    pub fn decode_checkpoint(&self) -> Result<Checkpoint, CheckpointError> {
        Ok(serde_json::from_value(self.checkpoint.clone())?)
    }

    pub fn decode_metadata<S: SerializerProtocol>(
        &self,
        serde: &S,
    ) -> Result<CheckpointMetadata, CheckpointError> {
        serde.loads(&serde_json::to_vec(&self.metadata)?)
    }
}

/// A row of the checkpoint writes table
#[derive(Debug, Clone, FromRow)]
pub struct WriteRecord {
    pub task_id: String,
    pub channel: String,
    #[sqlx(rename = "type")]
    pub type_tag: Option<String>,
    pub blob: serde_json::Value,
}

impl WriteRecord {
    /// Decode the stored value; rows without a type tag are JSON
    pub fn decode_value<S: SerializerProtocol>(
        &self,
        serde: &S,
    ) -> Result<serde_json::Value, CheckpointError> {
        let type_tag = self.type_tag.as_deref().unwrap_or(JSON_TYPE);
        serde.loads_typed(type_tag, &serde_json::to_vec(&self.blob)?)
    }

    pub fn into_pending_write<S: SerializerProtocol>(
        self,
        serde: &S,
    ) -> Result<PendingWrite, CheckpointError> {
        let value = self.decode_value(serde)?;
        Ok((self.task_id, self.channel, value))
    }
}
