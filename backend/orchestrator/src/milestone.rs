//! # Milestone payout workflow
//!
//! Per-milestone state is derived from the ledger record:
//!
//! ```text
//! Pending ──(winner uploads proof)──► ProofSubmitted ──(government approves)──► Approved
//! ```
//!
//! Transitions move exactly one step forward. `Approved` is terminal and
//! implies the payout was made: approval and payment are one ledger call.
//! Milestone indices are stable; the list is append-only.

use serde::Serialize;

use crate::errors::{Result, TenderError};
use crate::role::Role;
use crate::types::{Address, ContentHash, Milestone, Tender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneState {
    Pending,
    ProofSubmitted,
    Approved,
}

impl MilestoneState {
    pub fn of(milestone: &Milestone) -> Self {
        if milestone.approved {
            Self::Approved
        } else if !milestone.proof_hash.is_empty() {
            Self::ProofSubmitted
        } else {
            Self::Pending
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::ProofSubmitted),
            Self::ProofSubmitted => Some(Self::Approved),
            Self::Approved => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MilestoneAction {
    SubmitProof { proof_hash: ContentHash },
    Approve,
}

impl MilestoneAction {
    fn target(&self) -> MilestoneState {
        match self {
            Self::SubmitProof { .. } => MilestoneState::ProofSubmitted,
            Self::Approve => MilestoneState::Approved,
        }
    }
}

fn is_winner(tender: &Tender, caller: &Address) -> bool {
    tender.winner_selected && tender.winner.as_ref() == Some(caller)
}

/// Check that `caller` acting as `role` may apply `action` to `milestone`.
pub fn guard(
    tender: &Tender,
    milestone: &Milestone,
    action: &MilestoneAction,
    caller: &Address,
    role: Role,
) -> Result<()> {
    if let MilestoneAction::SubmitProof { proof_hash } = action {
        if proof_hash.is_empty() {
            return Err(TenderError::Validation("proof hash is required".into()));
        }
    }

    match action {
        MilestoneAction::SubmitProof { .. } if !is_winner(tender, caller) => {
            return Err(TenderError::NotPermitted(
                "only the tender winner may submit milestone proof".into(),
            ));
        }
        MilestoneAction::Approve if !role.is_government() => {
            return Err(TenderError::NotPermitted(
                "only government officials may approve milestones".into(),
            ));
        }
        _ => {}
    }

    let state = MilestoneState::of(milestone);
    if state.next() != Some(action.target()) {
        let reason = match state {
            MilestoneState::Approved => "milestone is already approved".to_string(),
            MilestoneState::Pending => "no proof has been submitted for this milestone".to_string(),
            MilestoneState::ProofSubmitted => "proof has already been submitted".to_string(),
        };
        return Err(TenderError::Rejected(reason));
    }
    Ok(())
}

/// Actions `caller` could take on `milestone` right now.
pub fn allowed_actions(
    tender: &Tender,
    milestone: &Milestone,
    caller: Option<&Address>,
    role: Option<Role>,
) -> Vec<&'static str> {
    let (Some(caller), Some(role)) = (caller, role) else {
        return Vec::new();
    };
    let mut actions = Vec::new();
    let candidate = MilestoneAction::SubmitProof {
        proof_hash: ContentHash::new("QmCandidate"),
    };
    if guard(tender, milestone, &candidate, caller, role).is_ok() {
        actions.push("submit_proof");
    }
    if guard(tender, milestone, &MilestoneAction::Approve, caller, role).is_ok() {
        actions.push("approve");
    }
    actions
}

/// Inputs for `addMilestone`.
pub fn validate_new_milestone(description: &str, payment_amount: u128) -> Result<()> {
    if description.trim().is_empty() {
        return Err(TenderError::Validation("milestone description is required".into()));
    }
    if payment_amount == 0 {
        return Err(TenderError::Validation("milestone payment must be positive".into()));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneView {
    #[serde(flatten)]
    pub milestone: Milestone,
    pub state: MilestoneState,
}

/// All milestones of one tender with payout totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MilestoneBook {
    pub tender_id: u64,
    pub milestones: Vec<MilestoneView>,
    #[serde(with = "crate::types::decimal")]
    pub total_committed: u128,
    #[serde(with = "crate::types::decimal")]
    pub total_paid: u128,
    /// Ledger custody balance, as reported by `tenderFunds`.
    #[serde(with = "crate::types::decimal")]
    pub funds: u128,
}

fn checked_total<'a>(tender_id: u64, mut milestones: impl Iterator<Item = &'a Milestone>) -> Result<u128> {
    milestones.try_fold(0u128, |acc, m| {
        acc.checked_add(m.payment_amount).ok_or_else(|| {
            TenderError::Decode(format!("milestone payments of tender {tender_id} overflow"))
        })
    })
}

impl MilestoneBook {
    /// Fails with [`TenderError::Decode`] when the ledger's amounts do not
    /// fit the totals.
    pub fn new(tender: &Tender, milestones: Vec<Milestone>) -> Result<Self> {
        let total_committed = checked_total(tender.id, milestones.iter())?;
        let total_paid = checked_total(tender.id, milestones.iter().filter(|m| m.paid))?;
        Ok(Self {
            tender_id: tender.id,
            milestones: milestones
                .into_iter()
                .map(|m| MilestoneView {
                    state: MilestoneState::of(&m),
                    milestone: m,
                })
                .collect(),
            total_committed,
            total_paid,
            funds: tender.funds,
        })
    }

    pub fn get(&self, index: u64) -> Option<&Milestone> {
        self.milestones
            .get(usize::try_from(index).ok()?)
            .map(|v| &v.milestone)
    }

    /// Payments not yet released.
    pub fn outstanding(&self) -> u128 {
        self.total_committed.saturating_sub(self.total_paid)
    }

    /// Whether custody covers every unpaid milestone.
    pub fn is_covered(&self) -> bool {
        self.funds >= self.outstanding()
    }
}
