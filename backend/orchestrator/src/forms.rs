//! Two-phase form state for ledger writes.
//!
//! A form's draft is only cleared once its write has been confirmed and
//! read back. While a write is pending the slot refuses a second submit.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::errors::{ErrorKind, Result, TenderError};
use crate::format::parse_deadline;
use crate::ledger::Receipt;

/// Create-tender form, as typed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TenderDraft {
    pub title: String,
    pub description: String,
    pub budget: String,
    pub commit_deadline: String,
    pub reveal_deadline: String,
}

impl TenderDraft {
    /// The off-chain document and both deadlines in Unix seconds.
    pub fn parse(&self) -> Result<(Value, u64, u64)> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TenderError::Validation("title is required".into()));
        }
        let commit = parse_deadline(&self.commit_deadline)?;
        let reveal = parse_deadline(&self.reveal_deadline)?;
        let doc = json!({
            "title": title,
            "description": self.description.trim(),
            "budget": self.budget.trim(),
        });
        Ok((doc, commit, reveal))
    }
}

/// Sealed-bid form. Both fields stay text until submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BidDraft {
    pub amount: String,
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SlotStatus {
    Idle,
    Pending,
    Confirmed { tx: String },
    Cancelled,
    Failed { kind: ErrorKind, message: String },
}

#[derive(Debug, Clone)]
pub struct FormSlot<D> {
    draft: D,
    status: SlotStatus,
}

impl<D: Clone + Default> Default for FormSlot<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Clone + Default> FormSlot<D> {
    pub fn new() -> Self {
        Self {
            draft: D::default(),
            status: SlotStatus::Idle,
        }
    }

    pub fn status(&self) -> &SlotStatus {
        &self.status
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn is_pending(&self) -> bool {
        self.status == SlotStatus::Pending
    }

    /// Edit the draft. Locked while a write is pending.
    pub fn edit(&mut self) -> Result<&mut D> {
        if self.is_pending() {
            return Err(TenderError::FormBusy);
        }
        Ok(&mut self.draft)
    }

    /// Mark a write as started and hand out the draft to submit.
    pub fn begin(&mut self) -> Result<D> {
        if self.is_pending() {
            return Err(TenderError::FormBusy);
        }
        self.status = SlotStatus::Pending;
        Ok(self.draft.clone())
    }

    /// Record the outcome of the write started by [`FormSlot::begin`].
    /// `outcome` must be the confirmed, read-back result, not the submission.
    pub fn settle(&mut self, outcome: &Result<Receipt>) {
        self.status = match outcome {
            Ok(receipt) => {
                debug!(tx = %receipt.hash, "Form write confirmed, clearing draft");
                self.draft = D::default();
                SlotStatus::Confirmed {
                    tx: receipt.hash.to_string(),
                }
            }
            Err(TenderError::Cancelled) => SlotStatus::Cancelled,
            Err(e) => SlotStatus::Failed {
                kind: e.kind(),
                message: e.to_string(),
            },
        };
    }
}
