//! Reserved write channels and their fixed indices
//!
//! Pending writes are keyed by `(task_id, idx)`. Ordinarily `idx` is the
//! position of the write within the batch handed to `put_writes()`, but a few
//! control channels always land on a fixed, negative slot so the engine can
//! locate them without knowing the write order. Repeated writes to one of these
//! channels by the same task collapse onto that single slot.
//!
//! | Channel | idx |
//! |---------|-----|
//! | [`ERROR`] | -1 |
//! | [`SCHEDULED`] | -2 |
//! | [`INTERRUPT`] | -3 |
//! | [`RESUME`] | -4 |
//!
//! These names and values are part of the graph engine's contract and must not
//! change independently of it.

/// Channel receiving the error raised by a task
pub const ERROR: &str = "__error__";

/// Channel marking a task as scheduled
pub const SCHEDULED: &str = "__scheduled__";

/// Channel receiving interrupt payloads
pub const INTERRUPT: &str = "__interrupt__";

/// Channel receiving resume values
pub const RESUME: &str = "__resume__";

/// Channel carrying `Send` packets, folded into `pending_sends` on read
pub const TASKS: &str = "__pregel_tasks";

/// Reserved channel to fixed write index
pub const WRITES_IDX_MAP: [(&str, i32); 4] = [(ERROR, -1), (SCHEDULED, -2), (INTERRUPT, -3), (RESUME, -4)];

/// Fixed index of a reserved channel, `None` for ordinary channels
pub fn reserved_write_idx(channel: &str) -> Option<i32> {
    WRITES_IDX_MAP
        .iter()
        .find(|(name, _)| *name == channel)
        .map(|(_, idx)| *idx)
}

/// Whether `channel` is one of the reserved control channels
pub fn is_reserved_channel(channel: &str) -> bool {
    reserved_write_idx(channel).is_some()
}

/// Index under which a write is stored: the reserved slot, else its position in the batch
pub fn write_idx(channel: &str, position: usize) -> i32 {
    reserved_write_idx(channel).unwrap_or(position as i32)
}

/// Whether every write in a batch targets a reserved channel.
///
/// Such batches carry control state and may overwrite earlier rows; any batch
/// with an ordinary channel is append-once. An empty batch counts as all-reserved.
pub fn all_reserved<'a, I>(channels: I) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    channels.into_iter().all(is_reserved_channel)
}
