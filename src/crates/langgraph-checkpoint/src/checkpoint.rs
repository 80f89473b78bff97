//! Core checkpoint data structures for state persistence
//!
//! This module defines the data types exchanged between the graph engine and a
//! checkpoint backend: **[`Checkpoint`]**, **[`CheckpointConfig`]**,
//! **[`CheckpointMetadata`]**, and **[`CheckpointTuple`]**.
//!
//! # Core Types
//!
//! - [`Checkpoint`] - Complete state snapshot with channel values and versions
//! - [`CheckpointConfig`] - Thread ID, namespace and checkpoint ID identifying a checkpoint
//! - [`CheckpointMetadata`] - Additional metadata (step, source, parents, custom)
//! - [`CheckpointTuple`] - Checkpoint with config, metadata, parent link and pending writes
//! - [`ChannelVersions`] - Map of channel names to version numbers
//! - [`PendingWrite`] - Channel writes produced by a task but not yet folded into a checkpoint
//!
//! # Lineage
//!
//! Checkpoints of one `(thread_id, checkpoint_ns)` pair form a linked history.
//! The config passed to `put()` carries the id of the checkpoint being
//! superseded; [`CheckpointConfig::resolved_checkpoint_id`] reads it back,
//! falling back to the deprecated `thread_ts` key kept in `extra`.
//!
//! ```text
//!   put(cfg{thread: t1})                 -> cfg{thread: t1, id: c1}
//!   put(cfg{thread: t1, id: c1}, c2)     -> cfg{thread: t1, id: c2}   (parent = c1)
//!   put(cfg{thread: t1, id: c2}, c3)     -> cfg{thread: t1, id: c3}   (parent = c2)
//! ```
//!
//! # Pending Sends
//!
//! [`Checkpoint::pending_sends`] holds queued-but-undelivered messages. Backends
//! never persist them inline: the field is cleared before encoding and rebuilt
//! on read from the parent checkpoint's writes to the
//! [`TASKS`](crate::writes::TASKS) channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// Pending write tuple: (task_id, channel, value)
///
/// Represents a write operation that hasn't been committed to a channel yet.
pub type PendingWrite = (String, String, serde_json::Value);

/// Key of the deprecated checkpoint id alias in [`CheckpointConfig::extra`]
pub const THREAD_TS_KEY: &str = "thread_ts";

/// Channel version type - can be int, float, or string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelVersion {
    Int(i64),
    Float(f64),
    String(String),
}

impl ChannelVersion {
    /// Get the next version, `None` for string versions which are managed by the caller
    pub fn next(&self) -> Option<Self> {
        match self {
            ChannelVersion::Int(v) => Some(ChannelVersion::Int(v + 1)),
            ChannelVersion::Float(v) => Some(ChannelVersion::Float(v + 1.0)),
            ChannelVersion::String(_) => None,
        }
    }
}

/// Mapping from channel name to version
pub type ChannelVersions = HashMap<String, ChannelVersion>;

/// Metadata source type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Checkpoint created from an input to invoke/stream/batch
    Input,
    /// Checkpoint created from inside the pregel loop
    Loop,
    /// Checkpoint created from a manual state update
    Update,
    /// Checkpoint created as a copy of another checkpoint
    Fork,
}

/// Metadata associated with a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// The step number of the checkpoint
    /// -1 for the first "input" checkpoint
    /// 0 for the first "loop" checkpoint
    /// n for the nth checkpoint afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i32>,

    /// The IDs of the parent checkpoints
    /// Mapping from checkpoint namespace to checkpoint ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<HashMap<String, String>>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    /// Create a new checkpoint metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the step number
    pub fn with_step(mut self, step: i32) -> Self {
        self.step = Some(step);
        self
    }

    /// Set parent checkpoints
    pub fn with_parents(mut self, parents: HashMap<String, String>) -> Self {
        self.parents = Some(parents);
        self
    }

    /// Add custom metadata
    pub fn with_extra(mut self, key: String, value: serde_json::Value) -> Self {
        self.extra.insert(key, value);
        self
    }
}

/// State snapshot at a given point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// The version of the checkpoint format (currently 1)
    pub v: i32,

    /// The ID of the checkpoint (unique and monotonically increasing)
    pub id: CheckpointId,

    /// The timestamp of the checkpoint
    pub ts: DateTime<Utc>,

    /// The values of the channels at the time of the checkpoint
    /// Mapping from channel name to serialized channel snapshot value
    pub channel_values: HashMap<String, serde_json::Value>,

    /// The versions of the channels at the time of the checkpoint
    pub channel_versions: ChannelVersions,

    /// Map from node ID to map from channel name to version seen
    /// Used to determine which nodes to execute next
    pub versions_seen: HashMap<String, ChannelVersions>,

    /// Sends queued for the next step but not yet delivered
    #[serde(default)]
    pub pending_sends: Vec<serde_json::Value>,

    /// The channels that were updated in this checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_channels: Option<Vec<String>>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a new checkpoint
    pub fn new(
        id: CheckpointId,
        channel_values: HashMap<String, serde_json::Value>,
        channel_versions: ChannelVersions,
        versions_seen: HashMap<String, ChannelVersions>,
    ) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id,
            ts: Utc::now(),
            channel_values,
            channel_versions,
            versions_seen,
            pending_sends: Vec::new(),
            updated_channels: None,
        }
    }

    /// Create an empty checkpoint with a fresh, time-ordered ID
    pub fn empty() -> Self {
        Self::new(
            Uuid::now_v7().to_string(),
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
        )
    }

    /// Set the updated channels
    pub fn with_updated_channels(mut self, channels: Vec<String>) -> Self {
        self.updated_channels = Some(channels);
        self
    }

    /// Set the pending sends
    pub fn with_pending_sends(mut self, sends: Vec<serde_json::Value>) -> Self {
        self.pending_sends = sends;
        self
    }
}

/// Configuration for checkpoint operations
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointConfig {
    /// Thread ID for grouping related checkpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Specific checkpoint ID to retrieve
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,

    /// Checkpoint namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_ns: Option<String>,

    /// Additional configuration
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointConfig {
    /// Create a new checkpoint configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread ID
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Set the checkpoint ID
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// Set the checkpoint namespace
    pub fn with_checkpoint_ns(mut self, checkpoint_ns: impl Into<String>) -> Self {
        self.checkpoint_ns = Some(checkpoint_ns.into());
        self
    }

    /// Namespace of this config, empty when unset
    pub fn namespace(&self) -> &str {
        self.checkpoint_ns.as_deref().unwrap_or("")
    }

    /// Checkpoint ID this config points at.
    ///
    /// Falls back to the deprecated `thread_ts` alias when `checkpoint_id` is unset.
    pub fn resolved_checkpoint_id(&self) -> Option<&str> {
        self.checkpoint_id.as_deref().or_else(|| {
            self.extra
                .get(THREAD_TS_KEY)
                .and_then(serde_json::Value::as_str)
        })
    }
}

/// A tuple containing a checkpoint and its associated data
#[derive(Debug, Clone)]
pub struct CheckpointTuple {
    /// Configuration for this checkpoint
    pub config: CheckpointConfig,

    /// The checkpoint itself
    pub checkpoint: Checkpoint,

    /// Metadata associated with the checkpoint
    pub metadata: CheckpointMetadata,

    /// Parent configuration (if any)
    pub parent_config: Option<CheckpointConfig>,

    /// Writes stored against this checkpoint, ordered by task and index
    pub pending_writes: Vec<PendingWrite>,
}

impl CheckpointTuple {
    /// Create a new checkpoint tuple
    pub fn new(
        config: CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
            parent_config: None,
            pending_writes: Vec::new(),
        }
    }

    /// Set the parent configuration
    pub fn with_parent_config(mut self, parent_config: CheckpointConfig) -> Self {
        self.parent_config = Some(parent_config);
        self
    }

    /// Set the pending writes
    pub fn with_pending_writes(mut self, writes: Vec<PendingWrite>) -> Self {
        self.pending_writes = writes;
        self
    }
}
