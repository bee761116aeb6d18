//! Rollback mechanism: put the board back exactly as it was before the drag.

use crate::board::Board;
use crate::policy::PendingTransition;

/// Restore the board from the pending transition's snapshot and clear it.
///
/// Returns whether anything was restored. Calling again is a no-op: the
/// board already equals the snapshot and there is nothing pending.
pub fn roll_back(board: &mut Board, pending: &mut Option<PendingTransition>) -> bool {
    match pending.take() {
        Some(transition) => {
            board.restore(transition.snapshot());
            tracing::info!(
                record_id = transition.record_id,
                from = %transition.from_stage,
                to = %transition.to_stage,
                "rolled back stage transition"
            );
            true
        }
        None => false,
    }
}
