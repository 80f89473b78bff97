//! Row encoding for checkpoints and pending writes
//!
//! Everything here is pure: it turns saver inputs into the values bound to the
//! SQL statements, so the write policy can be checked without a database.

use langgraph_checkpoint::{
    writes, Checkpoint, CheckpointError, CheckpointMetadata, SerializerProtocol,
};

/// Escape sequence a JSON encoder emits for U+0000, rejected by JSONB
const NUL_ESCAPE: &str = "\\u0000";

/// Encode a checkpoint for the `checkpoint` column.
///
/// `pending_sends` is always cleared: sends are rebuilt from the writes table on read.
pub fn dump_checkpoint(mut checkpoint: Checkpoint) -> Result<String, CheckpointError> {
    checkpoint.pending_sends = Vec::new();
    Ok(serde_json::to_string(&checkpoint)?)
}

/// Encode metadata for the `metadata` column, dropping every `\u0000` escape.
pub fn dump_metadata<S: SerializerProtocol>(
    serde: &S,
    metadata: &CheckpointMetadata,
) -> Result<String, CheckpointError> {
    let bytes = serde.dumps(metadata)?;
    let encoded = String::from_utf8(bytes).map_err(|e| {
        CheckpointError::Invalid(format!("metadata encoding is not UTF-8: {}", e))
    })?;
    Ok(strip_nul_escapes(&encoded))
}

/// Remove `\u0000` escapes from JSON text.
///
/// Only real escapes are removed; an escaped backslash followed by `u0000`
/// (the text `\\u0000`) is literal data and stays, so the output is still valid JSON.
pub fn strip_nul_escapes(encoded: &str) -> String {
    if !encoded.contains(NUL_ESCAPE) {
        return encoded.to_string();
    }

    let mut out = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let escape = &rest[pos..];
        if escape.starts_with(NUL_ESCAPE) {
            rest = &escape[NUL_ESCAPE.len()..];
        } else {
            // Copy the backslash and the escaped character as one unit
            let mut chars = escape.chars();
            out.extend(chars.next());
            out.extend(chars.next());
            rest = chars.as_str();
        }
    }
    out.push_str(rest);
    out
}

/// One row of the pending writes table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRow {
    pub thread_id: String,
    pub checkpoint_ns: String,
    pub checkpoint_id: String,
    pub task_id: String,
    /// Carried for callers; the writes table has no column for it
    pub task_path: String,
    pub idx: i32,
    pub channel: String,
    pub type_tag: String,
    pub blob: String,
}

/// How a batch of writes resolves a key conflict with stored rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteConflict {
    /// Replace the stored row (reserved control channels only)
    Overwrite,
    /// Keep the stored row (first write wins)
    Ignore,
}

impl WriteConflict {
    /// Policy for a batch: overwrite only when every write targets a reserved channel
    pub fn for_writes(writes: &[(String, serde_json::Value)]) -> Self {
        if writes::all_reserved(writes.iter().map(|(channel, _)| channel.as_str())) {
            WriteConflict::Overwrite
        } else {
            WriteConflict::Ignore
        }
    }
}

/// Target of a batch of writes
#[derive(Debug, Clone, Copy)]
pub struct WriteTarget<'a> {
    pub thread_id: &'a str,
    pub checkpoint_ns: &'a str,
    pub checkpoint_id: &'a str,
    pub task_id: &'a str,
    pub task_path: &'a str,
}

/// Encode a batch of writes into rows, assigning each its index
pub fn dump_writes<S: SerializerProtocol>(
    serde: &S,
    target: WriteTarget<'_>,
    writes: &[(String, serde_json::Value)],
) -> Result<Vec<WriteRow>, CheckpointError> {
    writes
        .iter()
        .enumerate()
        .map(|(position, (channel, value))| {
            let (type_tag, bytes) = serde.dumps_typed(value)?;
            let blob = String::from_utf8(bytes).map_err(|e| {
                CheckpointError::Invalid(format!(
                    "write to channel '{}' is not JSON text: {}",
                    channel, e
                ))
            })?;

            Ok(WriteRow {
                thread_id: target.thread_id.to_string(),
                checkpoint_ns: target.checkpoint_ns.to_string(),
                checkpoint_id: target.checkpoint_id.to_string(),
                task_id: target.task_id.to_string(),
                task_path: target.task_path.to_string(),
                idx: writes::write_idx(channel, position),
                channel: channel.clone(),
                type_tag,
                blob,
            })
        })
        .collect()
}
