//! Tender lifecycle phase derived from deadlines and ledger flags.
//!
//! ```text
//! Commit ──► Reveal ──► Evaluation ──► Completed
//!   └───────────────────────────────────►┘   (winner selected)
//! ```
//!
//! Completion is a ledger fact and overrides the clock. Otherwise both
//! deadlines are inclusive. An empty reveal window (commit ≥ reveal) goes
//! straight from Commit to Evaluation.

use serde::Serialize;

use crate::types::Tender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Phase {
    Commit,
    Reveal,
    Evaluation,
    Completed,
}

impl Phase {
    /// Zero-based position for progress bars.
    pub fn ordinal(self) -> u8 {
        self as u8
    }
}

pub fn phase(tender: &Tender, now: u64) -> Phase {
    if tender.winner_selected {
        Phase::Completed
    } else if now <= tender.commit_deadline {
        Phase::Commit
    } else if now <= tender.reveal_deadline {
        Phase::Reveal
    } else {
        Phase::Evaluation
    }
}

/// Deadline that ends the current phase, if it is time-bounded.
pub fn phase_ends_at(tender: &Tender, now: u64) -> Option<u64> {
    match phase(tender, now) {
        Phase::Commit => Some(tender.commit_deadline),
        Phase::Reveal => Some(tender.reveal_deadline),
        Phase::Evaluation | Phase::Completed => None,
    }
}

/// Current wall-clock time in Unix seconds.
pub fn unix_now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}
