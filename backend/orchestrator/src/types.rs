//! # Types
//!
//! Typed entities produced at the ledger boundary.  Nothing past
//! [`crate::ledger::LedgerGateway`] sees a positional tuple; every read is
//! normalized into one of these structs first.
//!
//! ## Monotonic flags
//!
//! Several flags only ever move `false → true` on the ledger:
//!
//! | Entity       | Flag              |
//! |--------------|-------------------|
//! | `Tender`     | `winner_selected` |
//! | `Bid`        | `revealed`        |
//! | `Contractor` | `registered`      |
//! | `Milestone`  | `approved`, `paid`|
//!
//! The client derives state from them but never writes them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, TenderError};

/// Identifier of a ledger network (chain id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 20-byte account address, stored lower-case with its `0x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| TenderError::Validation(format!("address {raw:?} must start with 0x")))?;
        if body.len() != 40 || hex::decode(body).is_err() {
            return Err(TenderError::Validation(format!(
                "address {raw:?} must be 20 hex-encoded bytes"
            )));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(40)))
    }

    pub fn is_zero(&self) -> bool {
        self.0[2..].bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = TenderError;

    fn try_from(value: String) -> Result<Self> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// A fixed 32-byte word (digests, padded integers).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Bytes32(pub [u8; 32]);

impl Bytes32 {
    pub const ZERO: Bytes32 = Bytes32([0u8; 32]);

    pub fn from_hex(raw: &str) -> Result<Self> {
        let body = raw.trim().trim_start_matches("0x");
        let bytes = hex::decode(body)
            .map_err(|e| TenderError::Decode(format!("bytes32 {raw:?}: {e}")))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| TenderError::Decode(format!("bytes32 {raw:?} is not 32 bytes")))?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes32({})", self.to_hex())
    }
}

impl fmt::Display for Bytes32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Bytes32 {
    type Error = TenderError;

    fn try_from(value: String) -> Result<Self> {
        Bytes32::from_hex(&value)
    }
}

impl From<Bytes32> for String {
    fn from(value: Bytes32) -> Self {
        value.to_hex()
    }
}

/// Content address of an off-chain document. Empty means "nothing published".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// On-chain tender record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tender {
    /// Positive identifier; 0 is reserved and never surfaces.
    pub id: u64,
    /// Authoritative pointer to the off-chain description.
    pub metadata_hash: ContentHash,
    /// Unix seconds; last instant a sealed bid may be committed.
    pub commit_deadline: u64,
    /// Unix seconds; last instant a bid may be revealed.
    pub reveal_deadline: u64,
    pub winner_selected: bool,
    /// Present only once `winner_selected` is set.
    pub winner: Option<Address>,
    #[serde(with = "decimal")]
    pub winning_bid_amount: u128,
    /// Custody balance held for payouts.
    #[serde(with = "decimal")]
    pub funds: u128,
}

/// A bidder's sealed (or revealed) bid on one tender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub tender_id: u64,
    pub bidder: Address,
    pub commit_hash: Bytes32,
    #[serde(with = "decimal")]
    pub revealed_amount: u128,
    pub revealed: bool,
}

/// The short `contractors(address)` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractorRecord {
    pub registered: bool,
    pub profile_hash: ContentHash,
    pub competence_score: u8,
}

/// Full contractor details as returned by `getContractorDetails`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contractor {
    pub address: Address,
    pub contractor_id: u64,
    pub registered: bool,
    pub company_name: String,
    pub profile_hash: ContentHash,
    /// 0–100 inclusive.
    pub competence_score: u8,
}

/// A payout milestone, addressed by its stable ordinal within the tender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub index: u64,
    pub description: String,
    /// Empty until the winner uploads proof.
    pub proof_hash: ContentHash,
    pub approved: bool,
    pub paid: bool,
    #[serde(with = "decimal")]
    pub payment_amount: u128,
}

/// Winner summary from `getTenderWinner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderWinner {
    pub address: Address,
    pub company_name: String,
    pub profile_hash: ContentHash,
    pub competence_score: u8,
    #[serde(with = "decimal")]
    pub winning_bid_amount: u128,
}

/// Serialize `u128` amounts as decimal strings so they survive JSON consumers
/// limited to 53-bit numbers.
pub mod decimal {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.parse().map_err(de::Error::custom),
            Raw::Number(n) => Ok(n as u128),
        }
    }
}
