//! `Checkpoint` pre-processor (§4.1 step 3).
//!
//! Fires `listener.onCheckpoint(state)`. The invariant this relies on:
//! state here is consistent with the *prior* node's committed mutations —
//! safe for crash recovery — because it runs before the current node's
//! executor has touched anything.

use crate::listeners::ListenerRegistry;
use crate::state::HensuState;

pub async fn run(state: &HensuState, listeners: &ListenerRegistry) {
    listeners.fire_checkpoint(state).await;
}
