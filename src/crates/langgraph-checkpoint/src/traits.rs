//! Extensible checkpoint storage trait for backend implementations
//!
//! This module defines the **[`CheckpointSaver`]** trait - the contract between
//! the graph engine and a checkpoint persistence backend.
//!
//! # Call Pattern
//!
//! ```text
//! ┌──────────────────────────┐
//! │  Graph engine superstep  │
//! └────────────┬─────────────┘
//!              │ 1. task finishes
//!              ▼
//!   put_writes(cfg, writes, task_id, task_path)
//!              │ 2. superstep completes
//!              ▼
//!   put(cfg, checkpoint, metadata, new_versions) ──► next cfg
//!              │ 3. resume / inspect
//!              ▼
//!   get_tuple(cfg) / list(cfg, filter, before, limit)
//! ```
//!
//! The config returned by `put()` points at the checkpoint just written; the
//! engine threads it into the next `put()` call, which is how backends learn
//! the parent of each checkpoint.
//!
//! # Write Conflicts
//!
//! Backends must treat `put()` as an upsert on
//! `(thread_id, checkpoint_ns, checkpoint_id)` that replaces the checkpoint and
//! metadata but keeps the original parent link. For `put_writes()`, a batch
//! made only of reserved channels (see [`crate::writes`]) overwrites earlier
//! rows with the same `(task_id, idx)`; any other batch leaves existing rows
//! untouched.

use crate::{
    checkpoint::{
        ChannelVersions, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple,
    },
    error::Result,
};
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// Type alias for async stream of checkpoint tuples
pub type CheckpointStream =
    Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

/// Core trait for implementing checkpoint storage backends
///
/// ## Required Methods
///
/// - `get_tuple` - Retrieve a specific or the latest checkpoint
/// - `list` - List checkpoints with filtering
/// - `put` - Save a checkpoint
/// - `put_writes` - Save the pending writes of one task
///
/// ## Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) to support
/// concurrent graph executions.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch a checkpoint using the given configuration
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        Ok(self.get_tuple(config).await?.map(|tuple| tuple.checkpoint))
    }

    /// Retrieve a complete checkpoint tuple with metadata.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration specifying which checkpoint to retrieve:
    ///   - If `checkpoint_id` is provided: Retrieve that specific version
    ///   - Otherwise: Retrieve the **latest** checkpoint for the thread and namespace
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CheckpointTuple))` - Checkpoint found, with its parent config and pending writes
    /// - `Ok(None)` - No checkpoint exists matching the config
    /// - `Err` - Storage error occurred
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// Query and stream checkpoints matching specified criteria, newest first.
    ///
    /// # Arguments
    ///
    /// * `config` - Optional base configuration; filters by `thread_id` and, when set, `checkpoint_ns`
    /// * `filter` - Key-value pairs that must all match in the checkpoint metadata
    /// * `before` - Only checkpoints whose id sorts before this config's `checkpoint_id`
    /// * `limit` - Maximum number of results
    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<std::collections::HashMap<String, serde_json::Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Store a checkpoint with its configuration and metadata.
    ///
    /// `config.checkpoint_id` (if any) is recorded as the parent of `checkpoint`.
    /// `new_versions` lists the channels updated by this checkpoint.
    ///
    /// # Returns
    ///
    /// A config pointing at the stored checkpoint, to be passed to the next `put()`.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig>;

    /// Store intermediate writes linked to a checkpoint.
    ///
    /// # Arguments
    ///
    /// * `config` - Configuration of the related checkpoint (`thread_id`, `checkpoint_ns`, `checkpoint_id`)
    /// * `writes` - Ordered channel writes: `(channel_name, value)`
    /// * `task_id` - Identifier of the task producing these writes
    /// * `task_path` - Structural path of the task within the graph, may be empty
    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, serde_json::Value)>,
        task_id: String,
        task_path: String,
    ) -> Result<()>;
}
