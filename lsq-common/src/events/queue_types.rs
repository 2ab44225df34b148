//! Queue change type definitions

use serde::{Deserialize, Serialize};

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    /// Context lane replaced (new liveset, new collection)
    ContextReplaced,
    UserEnqueue,
    UserDequeue,
    ManualCleared,
    /// Player advanced on its own; manual entries may have been consumed
    PlayerTransition,
    /// Manual lane reloaded from the store at startup
    Restored,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::ContextReplaced => write!(f, "ContextReplaced"),
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::UserDequeue => write!(f, "UserDequeue"),
            QueueChangeTrigger::ManualCleared => write!(f, "ManualCleared"),
            QueueChangeTrigger::PlayerTransition => write!(f, "PlayerTransition"),
            QueueChangeTrigger::Restored => write!(f, "Restored"),
        }
    }
}
