//! Wallet session and network gate.
//!
//! A [`Session`] is a snapshot of (account, network) taken when the wallet
//! connects.  It is passed explicitly to every write; once the wallet
//! disconnects or changes account/network the snapshot is stale and every
//! write through it fails with [`TenderError::SessionExpired`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::errors::{Result, TenderError};
use crate::ledger::PreparedCall;
use crate::types::{Address, NetworkId};

/// Why a signing request produced no signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignError {
    /// The user declined in the wallet UI.
    Declined,
    /// The wallet could not sign (locked device, transport failure).
    Failed(String),
}

/// Opaque signed transaction envelope, ready for `sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCall {
    pub envelope: Vec<u8>,
}

/// The wallet/session provider. Implemented by whatever signs for the user.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Currently selected account, `None` when disconnected.
    fn account(&self) -> Option<Address>;

    /// Network the wallet is currently pointed at.
    fn network(&self) -> NetworkId;

    async fn sign(&self, call: &PreparedCall) -> std::result::Result<SignedCall, SignError>;

    /// Ask the wallet to switch networks. The user may refuse.
    async fn switch_network(&self, network: NetworkId) -> Result<()>;
}

/// Fixed allow-list of networks the ledger contract is deployed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPolicy {
    supported: Vec<NetworkId>,
}

impl NetworkPolicy {
    pub fn new(supported: Vec<NetworkId>) -> Result<Self> {
        if supported.is_empty() {
            return Err(TenderError::Config(
                "at least one supported network is required".to_string(),
            ));
        }
        Ok(Self { supported })
    }

    pub fn is_supported(&self, network: NetworkId) -> bool {
        self.supported.contains(&network)
    }

    /// Blocking precondition for every ledger read and write.
    pub fn require(&self, network: NetworkId) -> Result<()> {
        if self.is_supported(network) {
            Ok(())
        } else {
            Err(TenderError::WrongNetwork {
                actual: network,
                supported: self.supported.clone(),
            })
        }
    }

    /// The network a wrong-network prompt offers to switch to.
    pub fn preferred(&self) -> NetworkId {
        self.supported[0]
    }

    pub fn supported(&self) -> &[NetworkId] {
        &self.supported
    }
}

#[derive(Clone)]
pub struct Session {
    account: Address,
    network: NetworkId,
    wallet: Arc<dyn WalletProvider>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("account", &self.account)
            .field("network", &self.network)
            .finish()
    }
}

impl Session {
    /// Open a session against the wallet's current account and network.
    pub fn connect(wallet: Arc<dyn WalletProvider>, policy: &NetworkPolicy) -> Result<Self> {
        let account = wallet.account().ok_or(TenderError::Disconnected)?;
        let network = wallet.network();
        policy.require(network)?;
        info!(%account, %network, "Wallet session opened");
        Ok(Self {
            account,
            network,
            wallet,
        })
    }

    pub fn account(&self) -> &Address {
        &self.account
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    /// Fail if the wallet has moved away from this session's snapshot.
    pub fn ensure_current(&self) -> Result<()> {
        match self.wallet.account() {
            None => Err(TenderError::Disconnected),
            Some(a) if a != self.account => Err(TenderError::SessionExpired),
            Some(_) if self.wallet.network() != self.network => Err(TenderError::SessionExpired),
            Some(_) => Ok(()),
        }
    }

    pub(crate) async fn sign(&self, call: &PreparedCall) -> Result<SignedCall> {
        match self.wallet.sign(call).await {
            Ok(signed) => Ok(signed),
            Err(SignError::Declined) => {
                info!(function = call.function, "Signing declined by user");
                Err(TenderError::Cancelled)
            }
            Err(SignError::Failed(reason)) => {
                warn!(function = call.function, "Signing failed: {reason}");
                Err(TenderError::Rejected(format!("signing failed: {reason}")))
            }
        }
    }
}

/// Ask the wallet to move onto the policy's preferred network.
pub async fn request_supported_network(
    wallet: &dyn WalletProvider,
    policy: &NetworkPolicy,
) -> Result<()> {
    let target = policy.preferred();
    if wallet.network() == target {
        return Ok(());
    }
    info!(from = %wallet.network(), to = %target, "Requesting network switch");
    wallet.switch_network(target).await
}
