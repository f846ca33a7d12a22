//! User actions composed from the gateway, codec, cache and workflow.
//!
//! Every write follows the same path:
//!
//! 1. validate input locally (no network),
//! 2. simulate → sign → send through [`LedgerGateway::execute`],
//! 3. wait for the receipt,
//! 4. re-read the affected record and check the effect is visible. Writes
//!    that add to a total (tenders, funds, milestones) compare against a
//!    baseline read before sending.
//!
//! Only when step 4 succeeds is the returned [`Receipt`] handed back, so a
//! [`crate::forms::FormSlot`] settled with it clears its draft only after
//! the ledger state has been observed.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::bid::{self, BidStatus, Secret};
use crate::errors::{Result, TenderError};
use crate::format::{format_ether, truncate_address};
use crate::forms::TenderDraft;
use crate::ledger::{LedgerGateway, Receipt, WriteCall};
use crate::metadata::{EnrichedTender, MetadataCache};
use crate::milestone::{self, MilestoneAction, MilestoneBook};
use crate::phase::{phase, phase_ends_at, Phase};
use crate::role::resolve_role;
use crate::session::Session;
use crate::types::{Address, Bytes32, ContentHash, Contractor, NetworkId, TenderWinner};

/// One row of the tender board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderSummary {
    #[serde(flatten)]
    pub tender: EnrichedTender,
    pub phase: Phase,
    /// Position of `phase` in the lifecycle, for progress indicators.
    pub phase_step: u8,
    pub phase_ends_at: Option<u64>,
    /// Custody balance rendered in ether.
    pub funds_ether: String,
}

impl TenderSummary {
    pub fn new(tender: EnrichedTender, now: u64) -> Self {
        let current = phase(&tender.tender, now);
        Self {
            phase: current,
            phase_step: current.ordinal(),
            phase_ends_at: phase_ends_at(&tender.tender, now),
            funds_ether: format_ether(tender.tender.funds),
            tender,
        }
    }
}

/// Everything the tender detail page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderView {
    #[serde(flatten)]
    pub summary: TenderSummary,
    pub bidders: Vec<Address>,
    pub winner: Option<TenderWinner>,
    pub milestones: MilestoneBook,
}

/// Creation-time deadline check. The ledger enforces the same ordering.
pub fn validate_deadlines(commit_deadline: u64, reveal_deadline: u64, now: u64) -> Result<()> {
    if commit_deadline <= now {
        return Err(TenderError::Validation("commit deadline must be in the future".into()));
    }
    if reveal_deadline <= commit_deadline {
        return Err(TenderError::Validation(
            "reveal deadline must be after the commit deadline".into(),
        ));
    }
    Ok(())
}

fn require_document(doc: &Value, what: &str) -> Result<()> {
    if doc.as_object().map_or(true, |o| o.is_empty()) {
        return Err(TenderError::Validation(format!("{what} must be a non-empty JSON object")));
    }
    Ok(())
}

fn require_tender_id(tender_id: u64) -> Result<()> {
    if tender_id == 0 {
        return Err(TenderError::Validation("tender id 0 is reserved".into()));
    }
    Ok(())
}

fn require_score(score: u8) -> Result<()> {
    if score > 100 {
        return Err(TenderError::Validation(format!(
            "competence score {score} is outside 0-100"
        )));
    }
    Ok(())
}

/// Ledger state captured before a write whose effect is an increment.
#[derive(Debug, Clone, Copy)]
enum Baseline {
    None,
    TenderCount(u64),
    Funds(u128),
    MilestoneCount(usize),
}

impl Baseline {
    fn tender_count(self) -> u64 {
        match self {
            Self::TenderCount(n) => n,
            _ => 0,
        }
    }

    fn funds(self) -> u128 {
        match self {
            Self::Funds(n) => n,
            _ => 0,
        }
    }

    fn milestone_count(self) -> usize {
        match self {
            Self::MilestoneCount(n) => n,
            _ => 0,
        }
    }
}

pub struct TenderService {
    gateway: Arc<LedgerGateway>,
    cache: Arc<MetadataCache>,
}

impl TenderService {
    pub fn new(gateway: Arc<LedgerGateway>, cache: Arc<MetadataCache>) -> Self {
        Self { gateway, cache }
    }

    pub fn gateway(&self) -> &Arc<LedgerGateway> {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    // ─────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────

    pub async fn board(&self, network: NetworkId, now: u64) -> Result<Vec<TenderSummary>> {
        let tenders = self.gateway.all_tenders(network).await?;
        let enriched = self.cache.resolve_all(tenders).await;
        Ok(enriched
            .into_iter()
            .map(|t| TenderSummary::new(t, now))
            .collect())
    }

    pub async fn summary(&self, network: NetworkId, tender_id: u64, now: u64) -> Result<Option<TenderSummary>> {
        let Some(tender) = self.gateway.tender(network, tender_id).await? else {
            return Ok(None);
        };
        Ok(Some(TenderSummary::new(self.cache.resolve(tender).await, now)))
    }

    pub async fn tender_view(&self, network: NetworkId, tender_id: u64, now: u64) -> Result<Option<TenderView>> {
        let Some(tender) = self.gateway.tender(network, tender_id).await? else {
            return Ok(None);
        };
        let (bidders, winner, milestones, enriched) = tokio::join!(
            self.gateway.tender_bidders(network, tender_id),
            self.gateway.tender_winner(network, tender_id),
            self.gateway.milestones(network, tender_id),
            self.cache.resolve(tender.clone()),
        );
        Ok(Some(TenderView {
            summary: TenderSummary::new(enriched, now),
            bidders: bidders?,
            winner: winner?,
            milestones: MilestoneBook::new(&tender, milestones?)?,
        }))
    }

    /// The contractor registry in ledger order, details fetched concurrently.
    pub async fn contractors(&self, network: NetworkId) -> Result<Vec<Contractor>> {
        let addresses = self.gateway.contractor_list(network).await?;
        let details = futures::future::try_join_all(
            addresses
                .iter()
                .map(|a| self.gateway.contractor_details(network, a)),
        )
        .await?;
        Ok(details.into_iter().flatten().collect())
    }

    pub async fn bid_status(&self, network: NetworkId, tender_id: u64, bidder: &Address) -> Result<BidStatus> {
        let sealed = self.gateway.bid(network, tender_id, bidder).await?;
        Ok(BidStatus::of(sealed.as_ref()))
    }

    /// Publish an off-chain document (tender description, profile, proof).
    pub async fn publish_document(&self, doc: &Value, name: &str) -> Result<ContentHash> {
        require_document(doc, name)?;
        self.cache.publish(doc, name).await
    }

    // ─────────────────────────────────────────────────────────
    // Government actions
    // ─────────────────────────────────────────────────────────

    /// Publish the tender description and create the tender.
    pub async fn publish_tender(
        &self,
        session: &Session,
        metadata: &Value,
        commit_deadline: u64,
        reveal_deadline: u64,
        now: u64,
    ) -> Result<(Receipt, ContentHash)> {
        require_document(metadata, "tender metadata")?;
        validate_deadlines(commit_deadline, reveal_deadline, now)?;

        let metadata_hash = self.cache.publish(metadata, "tender").await?;
        info!(%metadata_hash, "Tender metadata published");
        let receipt = self
            .run(
                session,
                WriteCall::CreateTender {
                    metadata_hash: metadata_hash.clone(),
                    commit_deadline,
                    reveal_deadline,
                },
            )
            .await?;
        Ok((receipt, metadata_hash))
    }

    /// [`TenderService::publish_tender`] from the form as typed.
    pub async fn publish_tender_draft(
        &self,
        session: &Session,
        draft: &TenderDraft,
        now: u64,
    ) -> Result<(Receipt, ContentHash)> {
        let (metadata, commit_deadline, reveal_deadline) = draft.parse()?;
        self.publish_tender(session, &metadata, commit_deadline, reveal_deadline, now)
            .await
    }

    pub async fn approve_contractor(
        &self,
        session: &Session,
        contractor: &Address,
        profile_hash: ContentHash,
        score: u8,
    ) -> Result<Receipt> {
        require_score(score)?;
        if profile_hash.is_empty() {
            return Err(TenderError::Validation("profile hash is required".into()));
        }
        self.run(
            session,
            WriteCall::ApproveContractor {
                contractor: contractor.clone(),
                profile_hash,
                score,
            },
        )
        .await
    }

    pub async fn set_competence_score(&self, session: &Session, contractor: &Address, score: u8) -> Result<Receipt> {
        require_score(score)?;
        self.run(
            session,
            WriteCall::SetCompetenceScore {
                contractor: contractor.clone(),
                score,
            },
        )
        .await
    }

    pub async fn add_government_official(&self, session: &Session, official: &Address) -> Result<Receipt> {
        if official.is_zero() {
            return Err(TenderError::Validation("official address must not be zero".into()));
        }
        self.run(
            session,
            WriteCall::AddGovernmentOfficial {
                official: official.clone(),
            },
        )
        .await
    }

    pub async fn evaluate_winner(&self, session: &Session, tender_id: u64) -> Result<Receipt> {
        require_tender_id(tender_id)?;
        self.run(session, WriteCall::EvaluateWinner { tender_id }).await
    }

    pub async fn add_milestone(
        &self,
        session: &Session,
        tender_id: u64,
        description: &str,
        payment_amount: &str,
    ) -> Result<Receipt> {
        require_tender_id(tender_id)?;
        let payment_amount = bid::parse_amount(payment_amount)?;
        milestone::validate_new_milestone(description, payment_amount)?;
        self.run(
            session,
            WriteCall::AddMilestone {
                tender_id,
                description: description.trim().to_string(),
                payment_amount,
            },
        )
        .await
    }

    /// Approve a milestone. Approval releases its payment in the same call.
    pub async fn approve_milestone(&self, session: &Session, tender_id: u64, milestone_id: u64) -> Result<Receipt> {
        require_tender_id(tender_id)?;
        self.check_milestone(session, tender_id, milestone_id, &MilestoneAction::Approve)
            .await?;
        self.run(
            session,
            WriteCall::ApproveMilestone {
                tender_id,
                milestone_id,
            },
        )
        .await
    }

    // ─────────────────────────────────────────────────────────
    // Contractor actions
    // ─────────────────────────────────────────────────────────

    /// Publish the contractor profile and request registration.
    pub async fn register_contractor(&self, session: &Session, profile: &Value) -> Result<(Receipt, ContentHash)> {
        require_document(profile, "contractor profile")?;
        let profile_hash = self.cache.publish(profile, "contractor").await?;
        let receipt = self
            .run(
                session,
                WriteCall::RegisterContractor {
                    profile_hash: profile_hash.clone(),
                },
            )
            .await?;
        Ok((receipt, profile_hash))
    }

    /// Seal and submit a bid. Returns the commitment that was sent.
    pub async fn submit_bid(
        &self,
        session: &Session,
        tender_id: u64,
        amount: &str,
        secret: &str,
    ) -> Result<(Receipt, Bytes32)> {
        require_tender_id(tender_id)?;
        let amount = bid::parse_amount(amount)?;
        let secret = Secret::parse(secret)?;
        let commit_hash = bid::commit(amount, &secret);
        let receipt = self
            .run(
                session,
                WriteCall::SubmitBid {
                    tender_id,
                    commit_hash,
                },
            )
            .await?;
        Ok((receipt, commit_hash))
    }

    /// Reveal a sealed bid. The opening is checked locally first so a wrong
    /// amount or secret never reaches the ledger.
    pub async fn reveal_bid(&self, session: &Session, tender_id: u64, amount: &str, secret: &str) -> Result<Receipt> {
        require_tender_id(tender_id)?;
        let amount = bid::parse_amount(amount)?;
        let secret = Secret::parse(secret)?;

        let sealed = self
            .gateway
            .bid(session.network(), tender_id, session.account())
            .await?
            .ok_or_else(|| TenderError::Rejected("no sealed bid on this tender".into()))?;
        if sealed.revealed {
            return Err(TenderError::Rejected("bid is already revealed".into()));
        }
        if !bid::verify(&sealed.commit_hash, amount, &secret) {
            return Err(TenderError::Validation(
                "amount and secret do not match the sealed bid".into(),
            ));
        }

        self.run(
            session,
            WriteCall::RevealBid {
                tender_id,
                amount,
                secret: secret.word(),
            },
        )
        .await
    }

    pub async fn submit_milestone_proof(
        &self,
        session: &Session,
        tender_id: u64,
        milestone_id: u64,
        proof_hash: ContentHash,
    ) -> Result<Receipt> {
        require_tender_id(tender_id)?;
        let action = MilestoneAction::SubmitProof {
            proof_hash: proof_hash.clone(),
        };
        self.check_milestone(session, tender_id, milestone_id, &action)
            .await?;
        self.run(
            session,
            WriteCall::UploadMilestoneProof {
                tender_id,
                milestone_id,
                proof_hash,
            },
        )
        .await
    }

    // ─────────────────────────────────────────────────────────
    // Anyone
    // ─────────────────────────────────────────────────────────

    /// Add custody funds to a tender. The amount travels as call value.
    pub async fn fund_tender(&self, session: &Session, tender_id: u64, amount: &str) -> Result<Receipt> {
        require_tender_id(tender_id)?;
        let amount = bid::parse_amount(amount)?;
        if amount == 0 {
            return Err(TenderError::Validation("funding amount must be positive".into()));
        }
        self.run(session, WriteCall::FundTender { tender_id, amount })
            .await
    }

    // ─────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────

    async fn check_milestone(
        &self,
        session: &Session,
        tender_id: u64,
        milestone_id: u64,
        action: &MilestoneAction,
    ) -> Result<()> {
        let network = session.network();
        let (tender, milestones, role) = tokio::try_join!(
            self.gateway.tender(network, tender_id),
            self.gateway.milestones(network, tender_id),
            resolve_role(&self.gateway, network, session.account()),
        )?;
        let tender =
            tender.ok_or_else(|| TenderError::Rejected(format!("tender {tender_id} does not exist")))?;
        let book = MilestoneBook::new(&tender, milestones)?;
        let m = book.get(milestone_id).ok_or_else(|| {
            TenderError::Rejected(format!("tender {tender_id} has no milestone {milestone_id}"))
        })?;
        milestone::guard(&tender, m, action, session.account(), role.role)
    }

    async fn run(&self, session: &Session, call: WriteCall) -> Result<Receipt> {
        let before = self.baseline(session.network(), &call).await?;
        let receipt = self.gateway.execute_and_confirm(session, call.clone()).await?;
        if !self.read_back(session, &call, before).await? {
            warn!(tx = %receipt.hash, "Confirmed write not yet visible on read-back");
            return Err(TenderError::Unavailable(format!(
                "{} confirmed in {} but not yet visible",
                call.function(),
                receipt.hash
            )));
        }
        info!(
            from = %truncate_address(session.account()),
            function = call.function(),
            tx = %receipt.hash,
            "Write confirmed and visible"
        );
        Ok(receipt)
    }

    /// State that `call` is expected to grow, read before it is sent.
    async fn baseline(&self, network: NetworkId, call: &WriteCall) -> Result<Baseline> {
        let g = &self.gateway;
        Ok(match call {
            WriteCall::CreateTender { .. } => Baseline::TenderCount(g.tender_count(network).await?),
            WriteCall::FundTender { tender_id, .. } => {
                Baseline::Funds(g.tender_funds(network, *tender_id).await?)
            }
            WriteCall::AddMilestone { tender_id, .. } => {
                Baseline::MilestoneCount(g.milestones(network, *tender_id).await?.len())
            }
            _ => Baseline::None,
        })
    }

    /// Re-read what `call` changed. `false` means the effect is not visible.
    async fn read_back(&self, session: &Session, call: &WriteCall, before: Baseline) -> Result<bool> {
        let network = session.network();
        let me = session.account();
        let g = &self.gateway;
        let visible = match call {
            WriteCall::CreateTender { metadata_hash, .. } => {
                let highest = before.tender_count();
                g.all_tenders(network)
                    .await?
                    .iter()
                    .any(|t| t.id > highest && &t.metadata_hash == metadata_hash)
            }
            WriteCall::RegisterContractor { .. } => g.contractor_details(network, me).await?.is_some(),
            WriteCall::ApproveContractor { contractor, .. } => g
                .contractor_details(network, contractor)
                .await?
                .map_or(false, |c| c.registered),
            WriteCall::SetCompetenceScore { contractor, score } => {
                g.contractor(network, contractor).await?.competence_score == *score
            }
            WriteCall::AddGovernmentOfficial { official } => {
                g.is_government_official(network, official).await?
            }
            WriteCall::SubmitBid {
                tender_id,
                commit_hash,
            } => g
                .bid(network, *tender_id, me)
                .await?
                .map_or(false, |b| &b.commit_hash == commit_hash),
            WriteCall::RevealBid { tender_id, .. } => g
                .bid(network, *tender_id, me)
                .await?
                .map_or(false, |b| b.revealed),
            WriteCall::EvaluateWinner { tender_id } => g
                .tender(network, *tender_id)
                .await?
                .map_or(false, |t| t.winner_selected),
            WriteCall::FundTender { tender_id, amount } => {
                let expected = before.funds().saturating_add(*amount);
                g.tender_funds(network, *tender_id).await? >= expected
            }
            WriteCall::AddMilestone {
                tender_id,
                description,
                payment_amount,
            } => {
                let known = before.milestone_count();
                g.milestones(network, *tender_id)
                    .await?
                    .iter()
                    .skip(known)
                    .any(|m| &m.description == description && m.payment_amount == *payment_amount)
            }
            WriteCall::UploadMilestoneProof {
                tender_id,
                milestone_id,
                proof_hash,
            } => g
                .milestones(network, *tender_id)
                .await?
                .iter()
                .any(|m| m.index == *milestone_id && &m.proof_hash == proof_hash),
            WriteCall::ApproveMilestone {
                tender_id,
                milestone_id,
            } => g
                .milestones(network, *tender_id)
                .await?
                .iter()
                .any(|m| m.index == *milestone_id && m.approved),
        };
        Ok(visible)
    }
}
