//! Scheduler events.

use super::status::Status;

/// What a queued event asks the scheduler to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Reload every slot from disk and seed its next event.
    Recover,
    /// Drive the slot to (or past) this status.
    Advance(Status),
}

/// A unit of scheduler work, owned by the queue until taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    /// Requested action.
    pub kind: EventKind,
    /// Target slot; ignored for [`EventKind::Recover`].
    pub slot: usize,
    /// Number of failed attempts so far.
    pub tries: u32,
}

impl Event {
    /// The global recovery sentinel.
    pub const fn recover() -> Self {
        Self {
            kind: EventKind::Recover,
            slot: 0,
            tries: 0,
        }
    }

    /// Advance `slot` to `status`.
    pub const fn advance(slot: usize, status: Status) -> Self {
        Self {
            kind: EventKind::Advance(status),
            slot,
            tries: 0,
        }
    }
}
