//! Typed facade over the ledger's function surface.
//!
//! Reads return normalized entities and are retried at most once on a
//! transient failure. Writes always go simulate → sign → send; a call that
//! fails simulation is never signed or sent.

pub mod calls;
pub mod decode;
pub mod rpc;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::errors::{Result, TenderError};
use crate::session::{NetworkPolicy, Session, SignedCall};
use crate::types::{
    Address, Bid, Contractor, ContractorRecord, Milestone, NetworkId, Tender,
    TenderWinner, TxHash,
};

pub use calls::{PendingTx, PreparedCall, Receipt, Simulation, TxStatus, WriteCall};

/// Raw transport to the ledger. Implementations never retry on their own.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Invoke a read-only contract function and return its raw result.
    async fn call(&self, network: NetworkId, function: &str, args: Vec<Value>) -> Result<Value>;

    /// Dry-run `call` as `from` against current state. Mutates nothing.
    async fn simulate(&self, network: NetworkId, from: &Address, call: &WriteCall)
        -> Result<Simulation>;

    /// Submit a signed envelope.
    async fn send(&self, network: NetworkId, signed: &SignedCall) -> Result<TxHash>;

    /// `None` while the transaction is not yet final.
    async fn receipt(&self, network: NetworkId, tx: &TxHash) -> Result<Option<TxStatus>>;
}

/// Bounded windows used by the gateway.
#[derive(Debug, Clone)]
pub struct GatewayTimings {
    pub read_timeout: Duration,
    /// Pause before the single retry of a failed read.
    pub retry_delay: Duration,
    pub confirmation_poll: Duration,
    pub confirmation_timeout: Duration,
}

impl Default for GatewayTimings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_millis(500),
            confirmation_poll: Duration::from_millis(1500),
            confirmation_timeout: Duration::from_secs(180),
        }
    }
}

/// Revert reasons that mean "this caller may not do this".
const AUTHORIZATION_MARKERS: &[&str] = &[
    "not authorized",
    "not authorised",
    "unauthorized",
    "access denied",
    "caller is not",
    "only government",
    "only official",
    "only winner",
    "only the winner",
    "only registered",
    "not a government",
    "not government",
    "not the winner",
    "not registered",
];

/// Split a refusal into an authorization failure or a terminal rejection.
pub fn classify_refusal(reason: String) -> TenderError {
    let lower = reason.to_ascii_lowercase();
    if AUTHORIZATION_MARKERS.iter().any(|m| lower.contains(m)) {
        TenderError::NotPermitted(reason)
    } else {
        TenderError::Rejected(reason)
    }
}

pub struct LedgerGateway {
    backend: Arc<dyn LedgerBackend>,
    policy: NetworkPolicy,
    timings: GatewayTimings,
}

impl LedgerGateway {
    pub fn new(backend: Arc<dyn LedgerBackend>, policy: NetworkPolicy, timings: GatewayTimings) -> Self {
        Self {
            backend,
            policy,
            timings,
        }
    }

    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    // ─────────────────────────────────────────────────────────
    // Raw read with timeout and single retry
    // ─────────────────────────────────────────────────────────

    async fn read(&self, network: NetworkId, function: &'static str, args: Vec<Value>) -> Result<Value> {
        self.policy.require(network)?;
        match self.read_once(network, function, args.clone()).await {
            Ok(v) => Ok(v),
            Err(e) if e.is_transient() => {
                warn!("Read {function} failed, retrying once: {e}");
                tokio::time::sleep(self.timings.retry_delay).await;
                self.read_once(network, function, args).await.map_err(|e| {
                    if e.is_transient() {
                        TenderError::Unavailable(format!("{function}: {e}"))
                    } else {
                        e
                    }
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn read_once(&self, network: NetworkId, function: &'static str, args: Vec<Value>) -> Result<Value> {
        let window = self.timings.read_timeout;
        match timeout(window, self.backend.call(network, function, args)).await {
            Ok(Err(TenderError::Rpc { code, message })) if code == rpc::EXECUTION_REVERTED => {
                Err(TenderError::Rejected(rpc::strip_revert_prefix(&message)))
            }
            Ok(result) => result,
            Err(_) => Err(TenderError::Timeout(window.as_secs())),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Typed reads
    // ─────────────────────────────────────────────────────────

    pub async fn tender_count(&self, network: NetworkId) -> Result<u64> {
        decode::as_u64(&self.read(network, "tenderCount", vec![]).await?)
    }

    /// `None` for id 0 and for ids the ledger never created.
    pub async fn tender(&self, network: NetworkId, id: u64) -> Result<Option<Tender>> {
        if id == 0 {
            return Ok(None);
        }
        let (raw, funds) = tokio::try_join!(
            self.read(network, "tenders", vec![json!(id)]),
            self.tender_funds(network, id),
        )?;
        decode::tender(&raw, funds)
    }

    pub async fn all_tenders(&self, network: NetworkId) -> Result<Vec<Tender>> {
        let raw = self.read(network, "getAllTenders", vec![]).await?;
        let items = raw
            .as_array()
            .ok_or_else(|| TenderError::Decode(format!("getAllTenders returned {raw}")))?;
        let mut tenders = Vec::with_capacity(items.len());
        for item in items {
            if let Some(t) = decode::tender(item, 0)? {
                tenders.push(t);
            }
        }
        let funds = futures::future::try_join_all(
            tenders.iter().map(|t| self.tender_funds(network, t.id)),
        )
        .await?;
        for (t, f) in tenders.iter_mut().zip(funds) {
            t.funds = f;
        }
        Ok(tenders)
    }

    pub async fn tender_ids(&self, network: NetworkId) -> Result<Vec<u64>> {
        decode::tender_ids(&self.read(network, "getTenderIds", vec![]).await?)
    }

    pub async fn contractor(&self, network: NetworkId, address: &Address) -> Result<ContractorRecord> {
        decode::contractor_record(
            &self
                .read(network, "contractors", vec![json!(address.as_str())])
                .await?,
        )
    }

    /// `None` when the address never attempted registration.
    pub async fn contractor_details(&self, network: NetworkId, address: &Address) -> Result<Option<Contractor>> {
        let raw = self
            .read(network, "getContractorDetails", vec![json!(address.as_str())])
            .await?;
        decode::contractor(address, &raw)
    }

    pub async fn contractor_list(&self, network: NetworkId) -> Result<Vec<Address>> {
        decode::addresses(&self.read(network, "getContractorList", vec![]).await?)
    }

    pub async fn is_government_official(&self, network: NetworkId, address: &Address) -> Result<bool> {
        decode::as_bool(
            &self
                .read(network, "governmentOfficials", vec![json!(address.as_str())])
                .await?,
        )
    }

    /// `None` when `bidder` has not committed on `tender_id`.
    pub async fn bid(&self, network: NetworkId, tender_id: u64, bidder: &Address) -> Result<Option<Bid>> {
        let raw = self
            .read(network, "bids", vec![json!(tender_id), json!(bidder.as_str())])
            .await?;
        decode::bid(tender_id, bidder, &raw)
    }

    pub async fn tender_bidders(&self, network: NetworkId, tender_id: u64) -> Result<Vec<Address>> {
        decode::addresses(
            &self
                .read(network, "getTenderBidders", vec![json!(tender_id)])
                .await?,
        )
    }

    pub async fn milestones(&self, network: NetworkId, tender_id: u64) -> Result<Vec<Milestone>> {
        decode::milestones(
            &self
                .read(network, "getMilestones", vec![json!(tender_id)])
                .await?,
        )
    }

    pub async fn tender_winner(&self, network: NetworkId, tender_id: u64) -> Result<Option<TenderWinner>> {
        decode::winner(
            &self
                .read(network, "getTenderWinner", vec![json!(tender_id)])
                .await?,
        )
    }

    pub async fn tender_funds(&self, network: NetworkId, tender_id: u64) -> Result<u128> {
        decode::as_u128(
            &self
                .read(network, "tenderFunds", vec![json!(tender_id)])
                .await?,
        )
    }

    // ─────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────

    /// Dry-run `call` for the session's account.
    pub async fn simulate(&self, session: &Session, call: &WriteCall) -> Result<PreparedCall> {
        let network = session.network();
        self.policy.require(network)?;
        session.ensure_current()?;

        let window = self.timings.read_timeout;
        let outcome = timeout(window, self.backend.simulate(network, session.account(), call))
            .await
            .map_err(|_| TenderError::Timeout(window.as_secs()))??;

        match outcome {
            Simulation::Ok { request } => {
                debug!(function = call.function(), "Simulation passed");
                Ok(PreparedCall {
                    network,
                    from: session.account().clone(),
                    function: call.function(),
                    args: call.args(),
                    value: call.value(),
                    request,
                })
            }
            Simulation::Refused { reason } => {
                info!(function = call.function(), "Simulation refused: {reason}");
                Err(classify_refusal(reason))
            }
        }
    }

    /// Simulate, sign and submit. Returns once the ledger has accepted the
    /// envelope; use [`LedgerGateway::confirm`] to wait for finality.
    pub async fn execute(&self, session: &Session, call: WriteCall) -> Result<PendingTx> {
        let prepared = self.simulate(session, &call).await?;
        let signed = session.sign(&prepared).await?;
        // The wallet may have switched while the signing prompt was open.
        session.ensure_current()?;
        let hash = self.backend.send(prepared.network, &signed).await?;
        info!(function = prepared.function, tx = %hash, "Transaction submitted");
        Ok(PendingTx {
            network: prepared.network,
            hash,
            function: prepared.function,
        })
    }

    /// Poll for the receipt of `pending`. A revert is terminal; running out
    /// of time is transient and never causes the write to be re-sent.
    pub async fn confirm(&self, pending: &PendingTx) -> Result<Receipt> {
        let started = Instant::now();
        loop {
            match timeout(
                self.timings.read_timeout,
                self.backend.receipt(pending.network, &pending.hash),
            )
            .await
            {
                Ok(Ok(Some(TxStatus::Success { block_number }))) => {
                    info!(tx = %pending.hash, "Transaction confirmed");
                    return Ok(Receipt {
                        hash: pending.hash.clone(),
                        function: pending.function,
                        block_number,
                    });
                }
                Ok(Ok(Some(TxStatus::Reverted { reason }))) => {
                    warn!(tx = %pending.hash, "Transaction reverted: {reason}");
                    return Err(TenderError::Reverted(reason));
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) if e.is_transient() => {
                    debug!(tx = %pending.hash, "Receipt poll failed: {e}");
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => debug!(tx = %pending.hash, "Receipt poll timed out"),
            }

            if started.elapsed() >= self.timings.confirmation_timeout {
                return Err(TenderError::Unavailable(format!(
                    "confirmation of {} not observed yet",
                    pending.hash
                )));
            }
            tokio::time::sleep(self.timings.confirmation_poll).await;
        }
    }

    pub async fn execute_and_confirm(&self, session: &Session, call: WriteCall) -> Result<Receipt> {
        let pending = self.execute(session, call).await?;
        self.confirm(&pending).await
    }
}
