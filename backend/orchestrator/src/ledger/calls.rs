//! Typed write surface of the tender ledger.

use serde::Serialize;
use serde_json::{json, Value};

use crate::types::{Address, Bytes32, ContentHash, NetworkId, TxHash};

/// Every state-changing entry point the client may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    CreateTender {
        metadata_hash: ContentHash,
        commit_deadline: u64,
        reveal_deadline: u64,
    },
    ApproveContractor {
        contractor: Address,
        profile_hash: ContentHash,
        score: u8,
    },
    RegisterContractor {
        profile_hash: ContentHash,
    },
    SubmitBid {
        tender_id: u64,
        commit_hash: Bytes32,
    },
    /// Resubmits the raw amount and padded secret, never the digest.
    RevealBid {
        tender_id: u64,
        amount: u128,
        secret: Bytes32,
    },
    EvaluateWinner {
        tender_id: u64,
    },
    /// Value-bearing: `amount` is attached to the transaction.
    FundTender {
        tender_id: u64,
        amount: u128,
    },
    AddMilestone {
        tender_id: u64,
        description: String,
        payment_amount: u128,
    },
    UploadMilestoneProof {
        tender_id: u64,
        milestone_id: u64,
        proof_hash: ContentHash,
    },
    /// Approval and payout are one ledger operation.
    ApproveMilestone {
        tender_id: u64,
        milestone_id: u64,
    },
    AddGovernmentOfficial {
        official: Address,
    },
    SetCompetenceScore {
        contractor: Address,
        score: u8,
    },
}

impl WriteCall {
    /// Ledger function name.
    pub fn function(&self) -> &'static str {
        match self {
            Self::CreateTender { .. } => "createTender",
            Self::ApproveContractor { .. } => "approveContractor",
            Self::RegisterContractor { .. } => "registerContractor",
            Self::SubmitBid { .. } => "submitBid",
            Self::RevealBid { .. } => "revealBid",
            Self::EvaluateWinner { .. } => "evaluateWinner",
            Self::FundTender { .. } => "fundTender",
            Self::AddMilestone { .. } => "addMilestone",
            Self::UploadMilestoneProof { .. } => "uploadMilestoneProof",
            Self::ApproveMilestone { .. } => "approveMilestone",
            Self::AddGovernmentOfficial { .. } => "addGovernmentOfficial",
            Self::SetCompetenceScore { .. } => "setCompetenceScore",
        }
    }

    /// Positional arguments in ledger order. `u128` values travel as strings.
    pub fn args(&self) -> Vec<Value> {
        match self {
            Self::CreateTender {
                metadata_hash,
                commit_deadline,
                reveal_deadline,
            } => vec![
                json!(metadata_hash.as_str()),
                json!(commit_deadline),
                json!(reveal_deadline),
            ],
            Self::ApproveContractor {
                contractor,
                profile_hash,
                score,
            } => vec![
                json!(contractor.as_str()),
                json!(profile_hash.as_str()),
                json!(score),
            ],
            Self::RegisterContractor { profile_hash } => vec![json!(profile_hash.as_str())],
            Self::SubmitBid {
                tender_id,
                commit_hash,
            } => vec![json!(tender_id), json!(commit_hash.to_hex())],
            Self::RevealBid {
                tender_id,
                amount,
                secret,
            } => vec![
                json!(tender_id),
                json!(amount.to_string()),
                json!(secret.to_hex()),
            ],
            Self::EvaluateWinner { tender_id } => vec![json!(tender_id)],
            Self::FundTender { tender_id, .. } => vec![json!(tender_id)],
            Self::AddMilestone {
                tender_id,
                description,
                payment_amount,
            } => vec![
                json!(tender_id),
                json!(description),
                json!(payment_amount.to_string()),
            ],
            Self::UploadMilestoneProof {
                tender_id,
                milestone_id,
                proof_hash,
            } => vec![
                json!(tender_id),
                json!(milestone_id),
                json!(proof_hash.as_str()),
            ],
            Self::ApproveMilestone {
                tender_id,
                milestone_id,
            } => vec![json!(tender_id), json!(milestone_id)],
            Self::AddGovernmentOfficial { official } => vec![json!(official.as_str())],
            Self::SetCompetenceScore { contractor, score } => {
                vec![json!(contractor.as_str()), json!(score)]
            }
        }
    }

    /// Native value transferred with the call.
    pub fn value(&self) -> Option<u128> {
        match self {
            Self::FundTender { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    /// Tender the call affects, for confirmation read-back.
    pub fn tender_id(&self) -> Option<u64> {
        match self {
            Self::SubmitBid { tender_id, .. }
            | Self::RevealBid { tender_id, .. }
            | Self::EvaluateWinner { tender_id }
            | Self::FundTender { tender_id, .. }
            | Self::AddMilestone { tender_id, .. }
            | Self::UploadMilestoneProof { tender_id, .. }
            | Self::ApproveMilestone { tender_id, .. } => Some(*tender_id),
            _ => None,
        }
    }
}

/// Result of a dry run against current ledger state.
#[derive(Debug, Clone, PartialEq)]
pub enum Simulation {
    /// The call would succeed; `request` is what the signer needs.
    Ok { request: Value },
    /// The ledger would refuse; `reason` is the verbatim revert reason.
    Refused { reason: String },
}

/// A simulated call that passed and may now be signed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedCall {
    pub network: NetworkId,
    pub from: Address,
    pub function: &'static str,
    pub args: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none", with = "optional_decimal")]
    pub value: Option<u128>,
    pub request: Value,
}

/// Handle for a submitted, not yet confirmed, transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTx {
    pub network: NetworkId,
    pub hash: TxHash,
    pub function: &'static str,
}

/// Final receipt state reported by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Success { block_number: Option<u64> },
    Reverted { reason: String },
}

/// A write whose success has been observed on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub hash: TxHash,
    pub function: &'static str,
    pub block_number: Option<u64>,
}

mod optional_decimal {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Option<u128>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }
}
