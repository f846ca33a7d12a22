//! Caller authorization class inferred from the ledger.
//!
//! Precedence, strongest first:
//!
//! 1. `Government`: `governmentOfficials(address)` is true, whatever the
//!    contractor record says.
//! 2. `RegisteredContractor`: contractor record with `registered`.
//! 3. `PendingContractor`: contractor record exists but is unregistered.
//! 4. `Public`: everything else.
//!
//! While a resolution is in flight the published state is `Loading`, never
//! `Public`; a failed read publishes `Error`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::ledger::LedgerGateway;
use crate::session::Session;
use crate::types::{Address, Contractor, NetworkId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Government,
    RegisteredContractor,
    PendingContractor,
    Public,
}

impl Role {
    pub fn from_ledger(is_official: bool, contractor: Option<&Contractor>) -> Self {
        match contractor {
            _ if is_official => Self::Government,
            Some(c) if c.registered => Self::RegisteredContractor,
            Some(_) => Self::PendingContractor,
            None => Self::Public,
        }
    }

    pub fn is_government(self) -> bool {
        self == Self::Government
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInfo {
    pub address: Address,
    pub role: Role,
    /// Present for contractors of either kind; carries the competence score.
    pub contractor: Option<Contractor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoleState {
    Disconnected,
    Loading,
    Resolved(RoleInfo),
    Error { message: String },
}

impl RoleState {
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Resolved(info) => Some(info.role),
            _ => None,
        }
    }
}

/// Issue both role reads concurrently and combine them.
pub async fn resolve_role(gateway: &LedgerGateway, network: NetworkId, address: &Address) -> Result<RoleInfo> {
    let (is_official, contractor) = tokio::try_join!(
        gateway.is_government_official(network, address),
        gateway.contractor_details(network, address),
    )?;
    let role = Role::from_ledger(is_official, contractor.as_ref());
    debug!(%address, ?role, "Role resolved");
    Ok(RoleInfo {
        address: address.clone(),
        role,
        contractor,
    })
}

/// Publishes the connected account's role and re-resolves on session change.
pub struct RoleResolver {
    gateway: Arc<LedgerGateway>,
    state: watch::Sender<RoleState>,
    generation: AtomicU64,
    last_key: Mutex<Option<(Address, NetworkId)>>,
}

impl RoleResolver {
    pub fn new(gateway: Arc<LedgerGateway>) -> Self {
        let (state, _) = watch::channel(RoleState::Disconnected);
        Self {
            gateway,
            state,
            generation: AtomicU64::new(0),
            last_key: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RoleState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> RoleState {
        self.state.borrow().clone()
    }

    /// Resolve unconditionally for `session` (or publish `Disconnected`).
    pub async fn refresh(&self, session: Option<&Session>) -> RoleState {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let key = session.map(|s| (s.account().clone(), s.network()));
        if let Ok(mut last) = self.last_key.lock() {
            *last = key.clone();
        }

        let Some((address, network)) = key else {
            self.state.send_replace(RoleState::Disconnected);
            return RoleState::Disconnected;
        };

        self.state.send_replace(RoleState::Loading);
        let next = match resolve_role(&self.gateway, network, &address).await {
            Ok(info) => RoleState::Resolved(info),
            Err(e) => {
                warn!(%address, "Role resolution failed: {e}");
                RoleState::Error {
                    message: e.to_string(),
                }
            }
        };

        // A newer refresh started while this one was in flight; drop ours.
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state.send_replace(next.clone());
        }
        next
    }

    /// Resolve only if the (account, network) pair differs from the last one
    /// or the last attempt did not produce a role.
    pub async fn on_session(&self, session: Option<&Session>) -> RoleState {
        let key = session.map(|s| (s.account().clone(), s.network()));
        let unchanged = self
            .last_key
            .lock()
            .map(|last| *last == key)
            .unwrap_or(false);
        let current = self.current();
        if unchanged && matches!(current, RoleState::Resolved(_) | RoleState::Disconnected) {
            return current;
        }
        self.refresh(session).await
    }
}
