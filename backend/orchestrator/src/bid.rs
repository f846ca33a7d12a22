//! Sealed-bid commitment codec.
//!
//! ```text
//! commit = keccak256( be32(amount) ‖ be32(secret) )
//! ```
//!
//! Both words are fixed-width 32-byte big-endian, left-padded with zeros.
//! The ledger recomputes the same digest from the raw `(amount, secret)`
//! submitted at reveal time, so the layout here must never change.

use std::fmt;

use sha3::{Digest, Keccak256};

use crate::errors::{Result, TenderError};
use crate::types::{Bid, Bytes32};

/// Commitment the ledger reports for a bidder who never committed.
pub const NO_BID_COMMITMENT: Bytes32 = Bytes32::ZERO;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Left-pad an amount into a 32-byte big-endian word.
pub fn amount_word(amount: u128) -> Bytes32 {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&amount.to_be_bytes());
    Bytes32(word)
}

/// Parse a user-entered amount. Negative and non-numeric input is refused.
pub fn parse_amount(raw: &str) -> Result<u128> {
    let s = raw.trim();
    if s.starts_with('-') {
        return Err(TenderError::Validation("amount must not be negative".into()));
    }
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TenderError::Validation(format!("amount {raw:?} is not a whole number")));
    }
    s.parse()
        .map_err(|_| TenderError::Validation(format!("amount {raw:?} is too large")))
}

/// The bidder's blinding value, held as its padded 32-byte word.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Secret(Bytes32);

impl Secret {
    /// Decimal text, or `0x`-prefixed hex of at most 32 bytes.
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if let Some(hex_digits) = s.strip_prefix("0x") {
            return Self::parse_hex(hex_digits);
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TenderError::Validation(
                "secret must be a non-negative whole number".into(),
            ));
        }

        let mut word = [0u8; 32];
        for digit in s.bytes().map(|b| u32::from(b - b'0')) {
            // word = word * 10 + digit, big-endian, carrying leftwards.
            let mut carry = digit;
            for byte in word.iter_mut().rev() {
                let v = u32::from(*byte) * 10 + carry;
                *byte = (v & 0xff) as u8;
                carry = v >> 8;
            }
            if carry != 0 {
                return Err(TenderError::Validation("secret does not fit in 32 bytes".into()));
            }
        }
        Ok(Self(Bytes32(word)))
    }

    fn parse_hex(digits: &str) -> Result<Self> {
        if digits.is_empty() || digits.len() > 64 {
            return Err(TenderError::Validation("secret does not fit in 32 bytes".into()));
        }
        let padded = format!("{digits:0>64}");
        let bytes = hex::decode(&padded)
            .map_err(|_| TenderError::Validation("secret is not valid hex".into()))?;
        let mut word = [0u8; 32];
        word.copy_from_slice(&bytes);
        Ok(Self(Bytes32(word)))
    }

    pub fn from_u128(value: u128) -> Self {
        Self(amount_word(value))
    }

    pub fn word(&self) -> Bytes32 {
        self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Commitment digest for `(amount, secret)`.
pub fn commit(amount: u128, secret: &Secret) -> Bytes32 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&amount_word(amount).0);
    preimage[32..].copy_from_slice(&secret.word().0);
    Bytes32(keccak256(&preimage))
}

/// Whether `(amount, secret)` opens `commitment`.
pub fn verify(commitment: &Bytes32, amount: u128, secret: &Secret) -> bool {
    *commitment != NO_BID_COMMITMENT && commit(amount, secret) == *commitment
}

/// Unset → Committed → Revealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Unset,
    Committed,
    Revealed,
}

impl BidStatus {
    pub fn of(bid: Option<&Bid>) -> Self {
        match bid {
            None => Self::Unset,
            Some(b) if b.revealed => Self::Revealed,
            Some(_) => Self::Committed,
        }
    }
}
