//! Normalization of raw ledger results into typed entities.
//!
//! The ledger answers either positionally (`[id, hash, ...]`) or with named
//! members (`{"tenderId": .., ...}`) depending on the function. Both shapes
//! are accepted here and nothing else in the crate ever sees them.

use serde_json::Value;

use crate::errors::{Result, TenderError};
use crate::types::{
    Address, Bid, Bytes32, ContentHash, Contractor, ContractorRecord, Milestone, Tender,
    TenderWinner,
};

/// Look up member `idx` of a tuple, or the first matching name of a struct.
fn field<'a>(value: &'a Value, idx: usize, names: &[&str]) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items.get(idx),
        Value::Object(map) => names.iter().find_map(|n| map.get(*n)),
        _ => None,
    }
}

fn required<'a>(value: &'a Value, idx: usize, names: &[&str], entity: &str) -> Result<&'a Value> {
    field(value, idx, names)
        .ok_or_else(|| TenderError::Decode(format!("{entity}: missing member {}", names[0])))
}

pub(crate) fn as_u128(value: &Value) -> Result<u128> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| TenderError::Decode(format!("expected unsigned integer, got {n}"))),
        Value::String(s) => {
            let s = s.trim();
            let parsed = match s.strip_prefix("0x") {
                Some(hex) => u128::from_str_radix(hex, 16),
                None => s.parse(),
            };
            parsed.map_err(|_| TenderError::Decode(format!("expected unsigned integer, got {s:?}")))
        }
        other => Err(TenderError::Decode(format!(
            "expected unsigned integer, got {other}"
        ))),
    }
}

pub(crate) fn as_u64(value: &Value) -> Result<u64> {
    let wide = as_u128(value)?;
    u64::try_from(wide).map_err(|_| TenderError::Decode(format!("{wide} does not fit in u64")))
}

fn as_u8(value: &Value) -> Result<u8> {
    let wide = as_u128(value)?;
    u8::try_from(wide).map_err(|_| TenderError::Decode(format!("{wide} does not fit in u8")))
}

pub(crate) fn as_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::String(s) if s == "true" => Ok(true),
        Value::String(s) if s == "false" => Ok(false),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        other => Err(TenderError::Decode(format!("expected bool, got {other}"))),
    }
}

fn as_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Null => Ok(String::new()),
        other => Err(TenderError::Decode(format!("expected string, got {other}"))),
    }
}

fn as_address(value: &Value) -> Result<Address> {
    let text = as_text(value)?;
    Address::parse(&text).map_err(|_| TenderError::Decode(format!("bad address {text:?}")))
}

fn as_bytes32(value: &Value) -> Result<Bytes32> {
    Bytes32::from_hex(&as_text(value)?)
}

/// `tenders(id)` / `getAllTenders()` element. `funds` comes from `tenderFunds`.
///
/// Returns `None` for the reserved id 0, which the ledger reports for
/// ids that were never created.
pub fn tender(value: &Value, funds: u128) -> Result<Option<Tender>> {
    const E: &str = "tender";
    let id = as_u64(required(value, 0, &["tenderId", "id"], E)?)?;
    if id == 0 {
        return Ok(None);
    }
    let winner_selected = as_bool(required(value, 4, &["winnerSelected"], E)?)?;
    let winner = match field(value, 5, &["winner"]) {
        Some(v) if winner_selected => Some(as_address(v)?).filter(|a| !a.is_zero()),
        _ => None,
    };
    Ok(Some(Tender {
        id,
        metadata_hash: ContentHash::new(as_text(required(
            value,
            1,
            &["metadataHash", "ipfsTenderHash"],
            E,
        )?)?),
        commit_deadline: as_u64(required(value, 2, &["commitDeadline"], E)?)?,
        reveal_deadline: as_u64(required(value, 3, &["revealDeadline"], E)?)?,
        winner_selected,
        winner,
        winning_bid_amount: field(value, 6, &["winningBidAmount"])
            .map(as_u128)
            .transpose()?
            .unwrap_or(0),
        funds,
    }))
}

/// `contractors(address)`.
pub fn contractor_record(value: &Value) -> Result<ContractorRecord> {
    const E: &str = "contractor record";
    Ok(ContractorRecord {
        registered: as_bool(required(value, 0, &["registered"], E)?)?,
        profile_hash: ContentHash::new(as_text(required(
            value,
            1,
            &["profileHash", "ipfsProfileHash"],
            E,
        )?)?),
        competence_score: as_u8(required(value, 2, &["competenceScore"], E)?)?,
    })
}

/// `getContractorDetails(address)`. An all-default record means the address
/// never attempted registration.
pub fn contractor(address: &Address, value: &Value) -> Result<Option<Contractor>> {
    const E: &str = "contractor";
    let c = Contractor {
        address: address.clone(),
        contractor_id: as_u64(required(value, 0, &["contractorId", "id"], E)?)?,
        registered: as_bool(required(value, 1, &["registered"], E)?)?,
        company_name: as_text(required(value, 2, &["companyName"], E)?)?,
        profile_hash: ContentHash::new(as_text(required(
            value,
            3,
            &["profileHash", "ipfsProfileHash"],
            E,
        )?)?),
        competence_score: as_u8(required(value, 4, &["competenceScore"], E)?)?,
    };
    let exists = c.registered
        || c.contractor_id != 0
        || !c.company_name.is_empty()
        || !c.profile_hash.is_empty();
    Ok(exists.then_some(c))
}

/// `bids(tenderId, address)`. The zero commitment means no bid was placed.
pub fn bid(tender_id: u64, bidder: &Address, value: &Value) -> Result<Option<Bid>> {
    const E: &str = "bid";
    let commit_hash = as_bytes32(required(value, 0, &["commitHash"], E)?)?;
    if commit_hash == crate::bid::NO_BID_COMMITMENT {
        return Ok(None);
    }
    Ok(Some(Bid {
        tender_id,
        bidder: bidder.clone(),
        commit_hash,
        revealed_amount: as_u128(required(value, 1, &["revealedAmount"], E)?)?,
        revealed: as_bool(required(value, 2, &["revealed"], E)?)?,
    }))
}

/// `getMilestones(tenderId)`. List position is the milestone id.
pub fn milestones(value: &Value) -> Result<Vec<Milestone>> {
    const E: &str = "milestone";
    let items = value
        .as_array()
        .ok_or_else(|| TenderError::Decode(format!("milestones: expected list, got {value}")))?;
    items
        .iter()
        .enumerate()
        .map(|(index, m)| {
            let approved = as_bool(required(m, 2, &["approved"], E)?)?;
            Ok(Milestone {
                index: index as u64,
                description: as_text(required(m, 0, &["description"], E)?)?,
                proof_hash: ContentHash::new(as_text(required(
                    m,
                    1,
                    &["proofHash", "ipfsProofHash"],
                    E,
                )?)?),
                approved,
                // Payout rides on approval; older deployments omit the flag.
                paid: field(m, 3, &["paid"]).map(as_bool).transpose()?.unwrap_or(approved),
                payment_amount: field(m, 4, &["paymentAmount"])
                    .map(as_u128)
                    .transpose()?
                    .unwrap_or(0),
            })
        })
        .collect()
}

/// `getTenderWinner(tenderId)`; `None` until a winner is selected.
pub fn winner(value: &Value) -> Result<Option<TenderWinner>> {
    const E: &str = "winner";
    if !as_bool(required(value, 5, &["winnerSelected"], E)?)? {
        return Ok(None);
    }
    Ok(Some(TenderWinner {
        address: as_address(required(value, 0, &["winnerAddress", "winner"], E)?)?,
        company_name: as_text(required(value, 1, &["companyName"], E)?)?,
        profile_hash: ContentHash::new(as_text(required(
            value,
            2,
            &["profileHash", "ipfsProfileHash"],
            E,
        )?)?),
        competence_score: as_u8(required(value, 3, &["competenceScore"], E)?)?,
        winning_bid_amount: as_u128(required(value, 4, &["winningBidAmount"], E)?)?,
    }))
}

/// `getTenderIds()`; the reserved id 0 is dropped.
pub fn tender_ids(value: &Value) -> Result<Vec<u64>> {
    let items = value
        .as_array()
        .ok_or_else(|| TenderError::Decode(format!("tender ids: expected list, got {value}")))?;
    let ids = items.iter().map(as_u64).collect::<Result<Vec<_>>>()?;
    Ok(ids.into_iter().filter(|id| *id != 0).collect())
}

/// `getContractorList()` / `getTenderBidders()`.
pub fn addresses(value: &Value) -> Result<Vec<Address>> {
    value
        .as_array()
        .ok_or_else(|| TenderError::Decode(format!("addresses: expected list, got {value}")))?
        .iter()
        .map(as_address)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WINNER: &str = "0x00000000000000000000000000000000000000aa";
    const ZERO: &str = "0x0000000000000000000000000000000000000000";

    #[test]
    fn tender_from_positional_tuple() {
        let raw = json!([7, "QmTender", 1000, "2000", false, ZERO, "0"]);
        let t = tender(&raw, 50).unwrap().unwrap();
        assert_eq!(t.id, 7);
        assert_eq!(t.metadata_hash.as_str(), "QmTender");
        assert_eq!(t.commit_deadline, 1000);
        assert_eq!(t.reveal_deadline, 2000);
        assert!(!t.winner_selected);
        assert_eq!(t.winner, None);
        assert_eq!(t.funds, 50);
    }

    #[test]
    fn tender_from_named_struct() {
        let raw = json!({
            "tenderId": "9",
            "ipfsTenderHash": "QmNamed",
            "commitDeadline": 10,
            "revealDeadline": 20,
            "winnerSelected": true,
            "winner": WINNER,
            "winningBidAmount": "123456789012345678901234567890",
        });
        let t = tender(&raw, 0).unwrap().unwrap();
        assert_eq!(t.id, 9);
        assert_eq!(t.winner.unwrap().as_str(), WINNER);
        assert_eq!(t.winning_bid_amount, 123_456_789_012_345_678_901_234_567_890);
    }

    #[test]
    fn reserved_tender_id_is_absent() {
        let raw = json!([0, "", 0, 0, false, ZERO, 0]);
        assert!(tender(&raw, 0).unwrap().is_none());
    }

    #[test]
    fn winner_ignored_until_selected() {
        let raw = json!([3, "Qm", 1, 2, false, WINNER, 0]);
        assert_eq!(tender(&raw, 0).unwrap().unwrap().winner, None);
    }

    #[test]
    fn zero_commitment_is_no_bid() {
        let bidder = Address::parse(WINNER).unwrap();
        let raw = json!([format!("0x{}", "00".repeat(32)), 0, false]);
        assert!(bid(1, &bidder, &raw).unwrap().is_none());

        let raw = json!([format!("0x{}", "11".repeat(32)), "0", false]);
        let b = bid(1, &bidder, &raw).unwrap().unwrap();
        assert!(!b.revealed);
        assert_eq!(b.commit_hash.0, [0x11; 32]);
    }

    #[test]
    fn unknown_contractor_is_absent() {
        let a = Address::parse(WINNER).unwrap();
        let raw = json!([0, false, "", "", 0]);
        assert!(contractor(&a, &raw).unwrap().is_none());

        let raw = json!([4, false, "Acme Build", "QmProfile", 0]);
        let c = contractor(&a, &raw).unwrap().unwrap();
        assert!(!c.registered);
        assert_eq!(c.company_name, "Acme Build");
    }

    #[test]
    fn milestones_are_indexed_by_position() {
        let raw = json!([
            {"description": "Survey", "ipfsProofHash": "QmProof", "approved": true},
            ["Foundations", "", false, false, "2500"],
        ]);
        let ms = milestones(&raw).unwrap();
        assert_eq!(ms.len(), 2);
        assert_eq!(ms[0].index, 0);
        assert!(ms[0].approved && ms[0].paid);
        assert_eq!(ms[1].index, 1);
        assert_eq!(ms[1].payment_amount, 2500);
        assert!(ms[1].proof_hash.is_empty());
    }

    #[test]
    fn tender_id_list_drops_zero() {
        assert_eq!(tender_ids(&json!([0, 1, "2", 3])).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn missing_member_is_a_decode_error() {
        let err = tender(&json!([1, "Qm"]), 0).unwrap_err();
        assert!(matches!(err, TenderError::Decode(_)));
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        assert!(contractor_record(&json!([true, "Qm", 300])).is_err());
    }
}
