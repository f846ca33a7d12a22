//! Display and input helpers shared by forms and HTTP responses.

use chrono::{DateTime, NaiveDateTime};

use crate::errors::{Result, TenderError};
use crate::types::Address;

const WEI_DECIMALS: usize = 18;

/// Parse a deadline given as Unix seconds, RFC 3339, or a bare
/// `YYYY-MM-DDTHH:MM[:SS]` local-picker value (read as UTC).
pub fn parse_deadline(raw: &str) -> Result<u64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(TenderError::Validation("deadline is required".into()));
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw
            .parse()
            .map_err(|_| TenderError::Validation(format!("deadline {raw:?} is out of range")));
    }

    let seconds = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.timestamp()
    } else {
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
            .map(|dt| dt.and_utc().timestamp())
            .ok_or_else(|| TenderError::Validation(format!("unrecognised deadline {raw:?}")))?
    };
    u64::try_from(seconds)
        .map_err(|_| TenderError::Validation(format!("deadline {raw:?} is before 1970")))
}

/// `0x1234...abcd`
pub fn truncate_address(address: &Address) -> String {
    let s = address.as_str();
    if s.len() <= 10 {
        return s.to_string();
    }
    format!("{}...{}", &s[..6], &s[s.len() - 4..])
}

/// Render a wei amount in ether without trailing zeros.
pub fn format_ether(wei: u128) -> String {
    let digits = format!("{wei:0>width$}", width = WEI_DECIMALS + 1);
    let (whole, frac) = digits.split_at(digits.len() - WEI_DECIMALS);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{frac}")
    }
}
