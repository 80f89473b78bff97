//! # langgraph-checkpoint - State Persistence Contract for Graph Execution
//!
//! Checkpoint types and the [`CheckpointSaver`] trait that persistence backends
//! implement so the graph engine can save and restore execution state.
//!
//! ## Core Concepts
//!
//! ### 1. CheckpointSaver Trait
//!
//! - **`put()`** - Save checkpoint with config and metadata, returning the config of the new checkpoint
//! - **`put_writes()`** - Store the pending writes of one task
//! - **`get_tuple()`** - Retrieve checkpoint, parent link and pending writes
//! - **`list()`** - Query checkpoint history, newest first
//!
//! ### 2. Checkpoint Structure
//!
//! A [`Checkpoint`] contains:
//! - **Version info** - Checkpoint ID and format version
//! - **Channel values** - Current state of all channels
//! - **Channel versions** - Per-channel version tracking
//! - **Pending sends** - Rebuilt from stored writes on read, never persisted inline
//!
//! ### 3. Reserved Write Channels
//!
//! The [`writes`] module holds the control channels that are stored under a
//! fixed index instead of their position in a write batch.
//!
//! ### 4. Serialization
//!
//! [`SerializerProtocol`] encodes metadata and write values;
//! [`JsonPlusSerializer`] is the JSON implementation used by default.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use langgraph_checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver};
//! use std::collections::HashMap;
//!
//! async fn step(saver: &impl CheckpointSaver) -> langgraph_checkpoint::Result<()> {
//!     let config = CheckpointConfig::new().with_thread_id("thread-123");
//!     let first = saver
//!         .put(&config, Checkpoint::empty(), CheckpointMetadata::new().with_step(-1), HashMap::new())
//!         .await?;
//!
//!     // `first` points at the stored checkpoint; passing it on records the lineage
//!     let second = saver
//!         .put(&first, Checkpoint::empty(), CheckpointMetadata::new().with_step(0), HashMap::new())
//!         .await?;
//!
//!     let tuple = saver.get_tuple(&second).await?.expect("just written");
//!     assert_eq!(tuple.parent_config.unwrap().checkpoint_id, first.checkpoint_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`checkpoint`] - [`Checkpoint`], [`CheckpointConfig`], [`CheckpointMetadata`], [`CheckpointTuple`]
//! - [`traits`] - [`CheckpointSaver`] trait and [`CheckpointStream`]
//! - [`writes`] - Reserved write channels and index mapping
//! - [`serializer`] - Serialization protocol
//! - [`error`] - [`CheckpointError`] types

pub mod checkpoint;
pub mod error;
pub mod serializer;
pub mod traits;
pub mod writes;

// Re-export main types
pub use checkpoint::{
    ChannelVersion, ChannelVersions, Checkpoint, CheckpointConfig, CheckpointId,
    CheckpointMetadata, CheckpointSource, CheckpointTuple, PendingWrite,
};
pub use error::{CheckpointError, Result};
pub use serializer::{JsonPlusSerializer, SerializerProtocol};
pub use traits::{CheckpointSaver, CheckpointStream};
