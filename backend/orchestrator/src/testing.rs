//! In-process doubles for the wallet, the ledger and the content store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::bid;
use crate::errors::{Result, TenderError};
use crate::ledger::{GatewayTimings, LedgerBackend, LedgerGateway, PreparedCall, Simulation, TxStatus, WriteCall};
use crate::metadata::store::{local_content_address, ContentStore};
use crate::metadata::MetadataCache;
use crate::service::TenderService;
use crate::session::{NetworkPolicy, Session, SignError, SignedCall, WalletProvider};
use crate::types::{Address, Bytes32, ContentHash, NetworkId, TxHash};

pub const SEPOLIA: NetworkId = NetworkId(11155111);

pub fn addr(n: u8) -> Address {
    Address::parse(&format!("0x{}{n:02x}", "0".repeat(38))).unwrap()
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap()
}

// ─────────────────────────────────────────────────────────
// Wallet
// ─────────────────────────────────────────────────────────

pub struct MockWallet {
    account: Mutex<Option<Address>>,
    network: Mutex<NetworkId>,
    decline: AtomicBool,
    sign_requests: AtomicUsize,
}

impl MockWallet {
    pub fn new(account: Address, network: NetworkId) -> Self {
        Self {
            account: Mutex::new(Some(account)),
            network: Mutex::new(network),
            decline: AtomicBool::new(false),
            sign_requests: AtomicUsize::new(0),
        }
    }

    pub fn disconnected(network: NetworkId) -> Self {
        let w = Self::new(Address::zero(), network);
        w.set_account(None);
        w
    }

    pub fn set_account(&self, account: Option<Address>) {
        *lock(&self.account) = account;
    }

    pub fn set_network(&self, network: NetworkId) {
        *lock(&self.network) = network;
    }

    pub fn decline_signing(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    pub fn sign_requests(&self) -> usize {
        self.sign_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn account(&self) -> Option<Address> {
        lock(&self.account).clone()
    }

    fn network(&self) -> NetworkId {
        *lock(&self.network)
    }

    async fn sign(&self, call: &PreparedCall) -> std::result::Result<SignedCall, SignError> {
        self.sign_requests.fetch_add(1, Ordering::SeqCst);
        if self.decline.load(Ordering::SeqCst) {
            return Err(SignError::Declined);
        }
        let envelope = json!({ "from": call.from.as_str(), "request": call.request });
        Ok(SignedCall {
            envelope: envelope.to_string().into_bytes(),
        })
    }

    async fn switch_network(&self, network: NetworkId) -> Result<()> {
        self.set_network(network);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Ledger
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct TenderRow {
    metadata_hash: String,
    commit_deadline: u64,
    reveal_deadline: u64,
    winner: Option<Address>,
    winning_bid_amount: u128,
}

#[derive(Clone)]
struct ContractorRow {
    id: u64,
    registered: bool,
    company_name: String,
    profile_hash: String,
    score: u8,
}

#[derive(Clone)]
struct BidRow {
    commit: Bytes32,
    amount: u128,
    revealed: bool,
}

#[derive(Clone)]
struct MilestoneRow {
    description: String,
    proof_hash: String,
    approved: bool,
    payment_amount: u128,
}

#[derive(Default)]
struct LedgerState {
    now: u64,
    tenders: BTreeMap<u64, TenderRow>,
    funds: HashMap<u64, u128>,
    officials: HashSet<Address>,
    contractors: HashMap<Address, ContractorRow>,
    contractor_order: Vec<Address>,
    bids: HashMap<(u64, Address), BidRow>,
    bidders: HashMap<u64, Vec<Address>>,
    milestones: HashMap<u64, Vec<MilestoneRow>>,
    prepared: HashMap<u64, (Address, WriteCall)>,
    receipts: HashMap<String, TxStatus>,
    next_request: u64,
    next_tx: u64,
    fail_reads: usize,
    /// Reads of `(function, first argument)` that always fail with an RPC error.
    failing_reads: Vec<(String, Value, i64, String)>,
    drop_writes: usize,
    revert_next: Option<String>,
    read_delay: Duration,
    read_calls: usize,
    simulate_calls: usize,
    sent: usize,
}

/// Ledger double that enforces the tender contract's rules in memory.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

fn bad_params(function: &str) -> TenderError {
    TenderError::Rpc {
        code: -32602,
        message: format!("invalid params for {function}"),
    }
}

fn arg_u64(args: &[Value], i: usize, function: &str) -> Result<u64> {
    args.get(i).and_then(Value::as_u64).ok_or_else(|| bad_params(function))
}

fn arg_addr(args: &[Value], i: usize, function: &str) -> Result<Address> {
    args.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| bad_params(function))
        .and_then(Address::parse)
}

impl LedgerState {
    fn is_official(&self, a: &Address) -> bool {
        self.officials.contains(a)
    }

    fn tender_tuple(&self, id: u64) -> Value {
        match self.tenders.get(&id) {
            Some(t) => json!([
                id,
                t.metadata_hash,
                t.commit_deadline,
                t.reveal_deadline,
                t.winner.is_some(),
                t.winner.as_ref().map_or(ZERO_ADDRESS, |w| w.as_str()),
                t.winning_bid_amount.to_string(),
            ]),
            None => json!([0, "", 0, 0, false, ZERO_ADDRESS, "0"]),
        }
    }

    fn read(&self, function: &str, args: &[Value]) -> Result<Value> {
        let v = match function {
            "tenderCount" => json!(self.tenders.keys().max().copied().unwrap_or(0)),
            "tenders" => self.tender_tuple(arg_u64(args, 0, function)?),
            "getAllTenders" => Value::Array(self.tenders.keys().map(|id| self.tender_tuple(*id)).collect()),
            "getTenderIds" => json!(self.tenders.keys().collect::<Vec<_>>()),
            "tenderFunds" => {
                let id = arg_u64(args, 0, function)?;
                json!(self.funds.get(&id).copied().unwrap_or(0).to_string())
            }
            "contractors" => {
                let a = arg_addr(args, 0, function)?;
                match self.contractors.get(&a) {
                    Some(c) => json!([c.registered, c.profile_hash, c.score]),
                    None => json!([false, "", 0]),
                }
            }
            "getContractorDetails" => {
                let a = arg_addr(args, 0, function)?;
                let c = self.contractors.get(&a);
                json!({
                    "contractorId": c.map_or(0, |c| c.id),
                    "registered": c.map_or(false, |c| c.registered),
                    "companyName": c.map_or("", |c| c.company_name.as_str()),
                    "ipfsProfileHash": c.map_or("", |c| c.profile_hash.as_str()),
                    "competenceScore": c.map_or(0, |c| c.score),
                })
            }
            "getContractorList" => json!(self
                .contractor_order
                .iter()
                .map(Address::as_str)
                .collect::<Vec<_>>()),
            "governmentOfficials" => json!(self.is_official(&arg_addr(args, 0, function)?)),
            "bids" => {
                let id = arg_u64(args, 0, function)?;
                let a = arg_addr(args, 1, function)?;
                match self.bids.get(&(id, a)) {
                    Some(b) => json!([b.commit.to_hex(), b.amount.to_string(), b.revealed]),
                    None => json!([Bytes32::ZERO.to_hex(), "0", false]),
                }
            }
            "getTenderBidders" => {
                let id = arg_u64(args, 0, function)?;
                json!(self
                    .bidders
                    .get(&id)
                    .map(|b| b.iter().map(Address::as_str).collect::<Vec<_>>())
                    .unwrap_or_default())
            }
            "getMilestones" => {
                let id = arg_u64(args, 0, function)?;
                Value::Array(
                    self.milestones
                        .get(&id)
                        .map(|ms| {
                            ms.iter()
                                .map(|m| {
                                    json!({
                                        "description": m.description,
                                        "ipfsProofHash": m.proof_hash,
                                        "approved": m.approved,
                                        "paymentAmount": m.payment_amount.to_string(),
                                    })
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                )
            }
            "getTenderWinner" => {
                let id = arg_u64(args, 0, function)?;
                match self.tenders.get(&id).and_then(|t| t.winner.clone().map(|w| (t, w))) {
                    Some((t, w)) => {
                        let c = self.contractors.get(&w);
                        json!([
                            w.as_str(),
                            c.map_or("", |c| c.company_name.as_str()),
                            c.map_or("", |c| c.profile_hash.as_str()),
                            c.map_or(0, |c| c.score),
                            t.winning_bid_amount.to_string(),
                            true,
                        ])
                    }
                    None => json!([ZERO_ADDRESS, "", "", 0, "0", false]),
                }
            }
            other => {
                return Err(TenderError::Rpc {
                    code: -32601,
                    message: format!("unknown function {other}"),
                })
            }
        };
        Ok(v)
    }

    fn tender(&self, id: u64) -> std::result::Result<&TenderRow, String> {
        self.tenders
            .get(&id)
            .filter(|_| id != 0)
            .ok_or_else(|| "Tender does not exist".to_string())
    }

    fn milestone(&self, tender_id: u64, index: u64) -> std::result::Result<&MilestoneRow, String> {
        self.milestones
            .get(&tender_id)
            .and_then(|ms| ms.get(index as usize))
            .ok_or_else(|| "Invalid milestone".to_string())
    }

    fn require_official(&self, from: &Address) -> std::result::Result<(), String> {
        if self.is_official(from) {
            Ok(())
        } else {
            Err("Only government officials".into())
        }
    }

    /// The contract's `require` checks for `call` made by `from`.
    fn check(&self, from: &Address, call: &WriteCall) -> std::result::Result<(), String> {
        match call {
            WriteCall::CreateTender { .. }
            | WriteCall::ApproveContractor { .. }
            | WriteCall::AddGovernmentOfficial { .. } => self.require_official(from),
            WriteCall::RegisterContractor { .. } => match self.contractors.get(from) {
                Some(c) if c.registered => Err("Already registered".into()),
                _ => Ok(()),
            },
            WriteCall::SubmitBid { tender_id, .. } => {
                let t = self.tender(*tender_id)?;
                if !self.contractors.get(from).map_or(false, |c| c.registered) {
                    return Err("Not registered contractor".into());
                }
                if self.now > t.commit_deadline {
                    return Err("Commit phase over".into());
                }
                if self.bids.contains_key(&(*tender_id, from.clone())) {
                    return Err("Bid already submitted".into());
                }
                Ok(())
            }
            WriteCall::RevealBid {
                tender_id,
                amount,
                secret,
            } => {
                let t = self.tender(*tender_id)?;
                if self.now <= t.commit_deadline || self.now > t.reveal_deadline {
                    return Err("Not in reveal phase".into());
                }
                let b = self
                    .bids
                    .get(&(*tender_id, from.clone()))
                    .ok_or_else(|| "No bid found".to_string())?;
                if b.revealed {
                    return Err("Already revealed".into());
                }
                let mut preimage = [0u8; 64];
                preimage[..32].copy_from_slice(&bid::amount_word(*amount).0);
                preimage[32..].copy_from_slice(&secret.0);
                if Bytes32(bid::keccak256(&preimage)) != b.commit {
                    return Err("Invalid reveal".into());
                }
                Ok(())
            }
            WriteCall::EvaluateWinner { tender_id } => {
                self.require_official(from)?;
                let t = self.tender(*tender_id)?;
                if self.now <= t.reveal_deadline {
                    return Err("Reveal phase not over".into());
                }
                if t.winner.is_some() {
                    return Err("Winner already selected".into());
                }
                if self.lowest_revealed(*tender_id).is_none() {
                    return Err("No revealed bids".into());
                }
                Ok(())
            }
            WriteCall::FundTender { tender_id, amount } => {
                self.tender(*tender_id)?;
                if *amount == 0 {
                    return Err("No value sent".into());
                }
                Ok(())
            }
            WriteCall::AddMilestone { tender_id, .. } => {
                self.require_official(from)?;
                self.tender(*tender_id).map(|_| ())
            }
            WriteCall::UploadMilestoneProof {
                tender_id,
                milestone_id,
                ..
            } => {
                let t = self.tender(*tender_id)?;
                if t.winner.as_ref() != Some(from) {
                    return Err("Only winner can upload proof".into());
                }
                if self.milestone(*tender_id, *milestone_id)?.approved {
                    return Err("Milestone already approved".into());
                }
                Ok(())
            }
            WriteCall::ApproveMilestone {
                tender_id,
                milestone_id,
            } => {
                self.require_official(from)?;
                let m = self.milestone(*tender_id, *milestone_id)?;
                if m.proof_hash.is_empty() {
                    return Err("No proof uploaded".into());
                }
                if m.approved {
                    return Err("Milestone already approved".into());
                }
                if self.funds.get(tender_id).copied().unwrap_or(0) < m.payment_amount {
                    return Err("Insufficient funds".into());
                }
                Ok(())
            }
            WriteCall::SetCompetenceScore { contractor, score } => {
                self.require_official(from)?;
                if !self.contractors.contains_key(contractor) {
                    return Err("Contractor not found".into());
                }
                if *score > 100 {
                    return Err("Score out of range".into());
                }
                Ok(())
            }
        }
    }

    fn lowest_revealed(&self, tender_id: u64) -> Option<(Address, u128)> {
        self.bidders
            .get(&tender_id)?
            .iter()
            .filter_map(|a| {
                self.bids
                    .get(&(tender_id, a.clone()))
                    .filter(|b| b.revealed)
                    .map(|b| (a.clone(), b.amount))
            })
            .min_by_key(|(_, amount)| *amount)
    }

    fn upsert_contractor(&mut self, a: &Address) -> &mut ContractorRow {
        if !self.contractors.contains_key(a) {
            self.contractor_order.push(a.clone());
        }
        let id = self.contractor_order.len() as u64;
        self.contractors.entry(a.clone()).or_insert_with(|| ContractorRow {
            id,
            registered: false,
            company_name: String::new(),
            profile_hash: String::new(),
            score: 0,
        })
    }

    fn apply(&mut self, from: &Address, call: &WriteCall) {
        match call {
            WriteCall::CreateTender {
                metadata_hash,
                commit_deadline,
                reveal_deadline,
            } => {
                let id = self.tenders.keys().max().copied().unwrap_or(0) + 1;
                self.tenders.insert(
                    id,
                    TenderRow {
                        metadata_hash: metadata_hash.as_str().to_string(),
                        commit_deadline: *commit_deadline,
                        reveal_deadline: *reveal_deadline,
                        winner: None,
                        winning_bid_amount: 0,
                    },
                );
            }
            WriteCall::ApproveContractor {
                contractor,
                profile_hash,
                score,
            } => {
                let c = self.upsert_contractor(contractor);
                c.registered = true;
                c.profile_hash = profile_hash.as_str().to_string();
                c.score = *score;
            }
            WriteCall::RegisterContractor { profile_hash } => {
                self.upsert_contractor(from).profile_hash = profile_hash.as_str().to_string();
            }
            WriteCall::SubmitBid {
                tender_id,
                commit_hash,
            } => {
                self.bids.insert(
                    (*tender_id, from.clone()),
                    BidRow {
                        commit: *commit_hash,
                        amount: 0,
                        revealed: false,
                    },
                );
                self.bidders.entry(*tender_id).or_default().push(from.clone());
            }
            WriteCall::RevealBid {
                tender_id, amount, ..
            } => {
                if let Some(b) = self.bids.get_mut(&(*tender_id, from.clone())) {
                    b.revealed = true;
                    b.amount = *amount;
                }
            }
            WriteCall::EvaluateWinner { tender_id } => {
                let best = self.lowest_revealed(*tender_id);
                if let (Some(t), Some((winner, amount))) = (self.tenders.get_mut(tender_id), best) {
                    t.winner = Some(winner);
                    t.winning_bid_amount = amount;
                }
            }
            WriteCall::FundTender { tender_id, amount } => {
                *self.funds.entry(*tender_id).or_default() += amount;
            }
            WriteCall::AddMilestone {
                tender_id,
                description,
                payment_amount,
            } => self.milestones.entry(*tender_id).or_default().push(MilestoneRow {
                description: description.clone(),
                proof_hash: String::new(),
                approved: false,
                payment_amount: *payment_amount,
            }),
            WriteCall::UploadMilestoneProof {
                tender_id,
                milestone_id,
                proof_hash,
            } => {
                if let Some(m) = self
                    .milestones
                    .get_mut(tender_id)
                    .and_then(|ms| ms.get_mut(*milestone_id as usize))
                {
                    m.proof_hash = proof_hash.as_str().to_string();
                }
            }
            WriteCall::ApproveMilestone {
                tender_id,
                milestone_id,
            } => {
                let paid = self
                    .milestones
                    .get_mut(tender_id)
                    .and_then(|ms| ms.get_mut(*milestone_id as usize))
                    .map(|m| {
                        m.approved = true;
                        m.payment_amount
                    })
                    .unwrap_or(0);
                let funds = self.funds.entry(*tender_id).or_default();
                *funds = funds.saturating_sub(paid);
            }
            WriteCall::AddGovernmentOfficial { official } => {
                self.officials.insert(official.clone());
            }
            WriteCall::SetCompetenceScore { contractor, score } => {
                if let Some(c) = self.contractors.get_mut(contractor) {
                    c.score = *score;
                }
            }
        }
    }
}

impl MockLedger {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        lock(&self.state)
    }

    pub fn set_now(&self, now: u64) {
        self.state().now = now;
    }

    pub fn insert_tender(&self, id: u64, metadata_hash: &str, commit_deadline: u64, reveal_deadline: u64) {
        self.state().tenders.insert(
            id,
            TenderRow {
                metadata_hash: metadata_hash.to_string(),
                commit_deadline,
                reveal_deadline,
                winner: None,
                winning_bid_amount: 0,
            },
        );
    }

    pub fn select_winner(&self, tender_id: u64, winner: Address, amount: u128) {
        if let Some(t) = self.state().tenders.get_mut(&tender_id) {
            t.winner = Some(winner);
            t.winning_bid_amount = amount;
        }
    }

    pub fn push_milestone(&self, tender_id: u64, description: &str, payment_amount: u128) {
        self.state()
            .milestones
            .entry(tender_id)
            .or_default()
            .push(MilestoneRow {
                description: description.to_string(),
                proof_hash: String::new(),
                approved: false,
                payment_amount,
            });
    }

    pub fn set_funds(&self, tender_id: u64, amount: u128) {
        self.state().funds.insert(tender_id, amount);
    }

    pub fn add_official(&self, a: Address) {
        self.state().officials.insert(a);
    }

    pub fn register_contractor(&self, a: Address, registered: bool) {
        let mut state = self.state();
        let c = state.upsert_contractor(&a);
        c.registered = registered;
        c.company_name = format!("Contractor {}", c.id);
        c.profile_hash = format!("QmProfile{}", c.id);
        c.score = 50;
    }

    pub fn fail_next_reads(&self, n: usize) {
        self.state().fail_reads = n;
    }

    pub fn fail_reads_of(&self, function: &str, first_arg: Value, code: i64, message: &str) {
        self.state()
            .failing_reads
            .push((function.to_string(), first_arg, code, message.to_string()));
    }

    /// The next `n` sends confirm as successful without changing any state.
    pub fn drop_next_writes(&self, n: usize) {
        self.state().drop_writes = n;
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.state().read_delay = delay;
    }

    pub fn revert_next_send(&self, reason: &str) {
        self.state().revert_next = Some(reason.to_string());
    }

    pub fn read_calls(&self) -> usize {
        self.state().read_calls
    }

    pub fn simulate_calls(&self) -> usize {
        self.state().simulate_calls
    }

    pub fn sent_count(&self) -> usize {
        self.state().sent
    }
}

#[async_trait]
impl LedgerBackend for MockLedger {
    async fn call(&self, _network: NetworkId, function: &str, args: Vec<Value>) -> Result<Value> {
        let delay = {
            let mut state = self.state();
            state.read_calls += 1;
            state.read_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(TenderError::Unavailable("injected read failure".into()));
        }
        let failing = state
            .failing_reads
            .iter()
            .find(|(f, arg, ..)| f == function && args.first() == Some(arg));
        if let Some((_, _, code, message)) = failing {
            return Err(TenderError::Rpc {
                code: *code,
                message: message.clone(),
            });
        }
        state.read(function, &args)
    }

    async fn simulate(&self, _network: NetworkId, from: &Address, call: &WriteCall) -> Result<Simulation> {
        let mut state = self.state();
        state.simulate_calls += 1;
        if let Err(reason) = state.check(from, call) {
            return Ok(Simulation::Refused { reason });
        }
        state.next_request += 1;
        let id = state.next_request;
        state.prepared.insert(id, (from.clone(), call.clone()));
        Ok(Simulation::Ok {
            request: json!({ "id": id }),
        })
    }

    async fn send(&self, _network: NetworkId, signed: &SignedCall) -> Result<TxHash> {
        let envelope: Value = serde_json::from_slice(&signed.envelope)?;
        let id = envelope["request"]["id"]
            .as_u64()
            .ok_or_else(|| bad_params("sendTransaction"))?;
        let mut state = self.state();
        let (from, call) = state
            .prepared
            .remove(&id)
            .ok_or_else(|| bad_params("sendTransaction"))?;
        state.sent += 1;
        state.next_tx += 1;
        let hash = TxHash(format!("0x{:064x}", state.next_tx));

        let status = if let Some(reason) = state.revert_next.take() {
            TxStatus::Reverted { reason }
        } else if let Err(reason) = state.check(&from, &call) {
            TxStatus::Reverted { reason }
        } else if state.drop_writes > 0 {
            state.drop_writes -= 1;
            TxStatus::Success {
                block_number: Some(state.next_tx),
            }
        } else {
            state.apply(&from, &call);
            TxStatus::Success {
                block_number: Some(state.next_tx),
            }
        };
        state.receipts.insert(hash.0.clone(), status);
        Ok(hash)
    }

    async fn receipt(&self, _network: NetworkId, tx: &TxHash) -> Result<Option<TxStatus>> {
        Ok(self.state().receipts.get(&tx.0).cloned())
    }
}

// ─────────────────────────────────────────────────────────
// Content store
// ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryContentStore {
    docs: Mutex<HashMap<ContentHash, Vec<u8>>>,
    latency: Duration,
    fetches: AtomicUsize,
    fail_fetches: AtomicUsize,
}

impl MemoryContentStore {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn put(&self, hash: &ContentHash, bytes: Vec<u8>) {
        lock(&self.docs).insert(hash.clone(), bytes);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fail_next_fetches(&self, n: usize) {
        self.fail_fetches.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn store(&self, bytes: Vec<u8>, _name: &str) -> Result<ContentHash> {
        let hash = local_content_address(&bytes);
        self.put(&hash, bytes);
        Ok(hash)
    }

    async fn fetch(&self, hash: &ContentHash) -> Result<Option<Vec<u8>>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let failing = self
            .fail_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TenderError::Unavailable("injected fetch failure".into()));
        }
        Ok(lock(&self.docs).get(hash).cloned())
    }
}

// ─────────────────────────────────────────────────────────
// Fixture
// ─────────────────────────────────────────────────────────

pub struct Fixture {
    pub ledger: Arc<MockLedger>,
    pub gateway: Arc<LedgerGateway>,
    pub content: Arc<MemoryContentStore>,
    wallets: Mutex<HashMap<Address, Arc<MockWallet>>>,
}

pub fn fast_timings() -> GatewayTimings {
    GatewayTimings {
        read_timeout: Duration::from_secs(1),
        retry_delay: Duration::from_millis(1),
        confirmation_poll: Duration::from_millis(1),
        confirmation_timeout: Duration::from_secs(1),
    }
}

pub fn fixture() -> Fixture {
    let ledger = Arc::new(MockLedger::default());
    let policy = NetworkPolicy::new(vec![SEPOLIA]).unwrap();
    let gateway = Arc::new(LedgerGateway::new(ledger.clone(), policy, fast_timings()));
    Fixture {
        ledger,
        gateway,
        content: Arc::new(MemoryContentStore::default()),
        wallets: Mutex::new(HashMap::new()),
    }
}

impl Fixture {
    /// Connect a fresh wallet for `account` on the supported network.
    pub fn session(&self, account: Address) -> Session {
        let wallet = Arc::new(MockWallet::new(account.clone(), SEPOLIA));
        lock(&self.wallets).insert(account, wallet.clone());
        Session::connect(wallet, self.gateway.policy()).unwrap()
    }

    pub fn wallet_for(&self, session: &Session) -> Arc<MockWallet> {
        lock(&self.wallets)[session.account()].clone()
    }

    pub fn cache(&self) -> Arc<MetadataCache> {
        Arc::new(MetadataCache::new(self.content.clone(), Duration::from_millis(1)))
    }

    pub fn service(&self) -> TenderService {
        TenderService::new(self.gateway.clone(), self.cache())
    }
}
