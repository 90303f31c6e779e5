//! Entitlement records: who may claim, and how much.

use std::fmt;
use std::str::FromStr;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::common::{hex_encode, parse_address};
use crate::error::{DistributionError, Result};

/// Number of fractional digits in one whole token (ether → wei).
pub const TOKEN_DECIMALS: usize = 18;

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl FromStr for Address {
    type Err = DistributionError;

    fn from_str(s: &str) -> Result<Self> {
        parse_address(s)
            .map(Self)
            .map_err(|e| DistributionError::InvalidRecord(format!("{s:?}: {e}")))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex_encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A claimant's entitlement. Immutable once included in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    pub address: Address,
    pub amount: U256,
}

impl Record {
    /// Creates a record, rejecting the zero address.
    pub fn new(address: Address, amount: U256) -> Result<Self> {
        if address.is_zero() {
            return Err(DistributionError::InvalidRecord(
                "zero address not allowed".to_string(),
            ));
        }
        Ok(Self { address, amount })
    }

    /// Parses a record from an address string and a base-unit amount string.
    pub fn parse(address: &str, amount: &str) -> Result<Self> {
        Self::new(address.parse()?, parse_amount(amount)?)
    }
}

/// Parses a non-negative decimal integer amount in base units.
pub fn parse_amount(text: &str) -> Result<U256> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DistributionError::InvalidRecord(
            "amount is required".to_string(),
        ));
    }
    if trimmed.starts_with('-') {
        return Err(DistributionError::InvalidRecord(format!(
            "amount {trimmed} is negative"
        )));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DistributionError::InvalidRecord(format!(
            "amount {trimmed:?} is not a decimal integer"
        )));
    }
    U256::from_dec_str(trimmed).map_err(|_| {
        DistributionError::InvalidRecord(format!("amount {trimmed} exceeds 256 bits"))
    })
}

/// Parses a whole-token decimal amount (e.g. `"1.5"`) into base units,
/// allowing up to [`TOKEN_DECIMALS`] fractional digits.
pub fn parse_ether(text: &str) -> Result<U256> {
    let trimmed = text.trim();
    let invalid =
        |reason: &str| DistributionError::InvalidRecord(format!("amount {trimmed:?} {reason}"));

    if trimmed.is_empty() {
        return Err(DistributionError::InvalidRecord(
            "reward amount is required".to_string(),
        ));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("is negative"));
    }

    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("is not a number"));
    }
    if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid("is not a decimal number"));
    }
    if fraction.len() > TOKEN_DECIMALS {
        return Err(invalid("has too many decimal places"));
    }

    let digits = format!("{whole}{fraction:0<width$}", width = TOKEN_DECIMALS);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_dec_str(digits).map_err(|_| invalid("exceeds 256 bits"))
}

/// Formats a base-unit amount as whole tokens, trimming trailing zeros.
pub fn format_ether(amount: U256) -> String {
    let digits = amount.to_string();
    let padded = format!("{digits:0>width$}", width = TOKEN_DECIMALS + 1);
    let (whole, fraction) = padded.split_at(padded.len() - TOKEN_DECIMALS);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_address_display_roundtrip() {
        let address: Address = "0xABCDEFabcdef0123456789abcdef0123456789AB".parse().unwrap();
        assert_eq!(
            address.to_string(),
            "0xabcdefabcdef0123456789abcdef0123456789ab"
        );
        assert_eq!(address.to_string().parse::<Address>().unwrap(), address);
    }

    #[test]
    fn test_address_rejects_garbage() {
        assert!(matches!(
            "0x12".parse::<Address>(),
            Err(DistributionError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_record_rejects_zero_address() {
        let zero = Address::from_bytes([0u8; 20]);
        assert!(Record::new(zero, U256::one()).is_err());
    }

    #[test]
    fn test_record_parse() {
        let record = Record::parse(ADDR, "100").unwrap();
        assert_eq!(record.amount, U256::from(100u64));
        assert_eq!(record.address.as_bytes(), &[0x11; 20]);
    }

    #[test]
    fn test_parse_amount_rejects_negative_and_overflow() {
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("").is_err());
        assert!(parse_amount("12a").is_err());
        // 2^256
        let too_big =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(parse_amount(too_big).is_err());
        let max =
            "115792089237316195423570985008687907853269984665640564039457584007913129639935";
        assert_eq!(parse_amount(max).unwrap(), U256::max_value());
    }

    #[test]
    fn test_parse_ether() {
        let one = U256::exp10(18);
        assert_eq!(parse_ether("1").unwrap(), one);
        assert_eq!(parse_ether("1.5").unwrap(), one + one / U256::from(2u64));
        assert_eq!(parse_ether("0.000000000000000001").unwrap(), U256::one());
        assert_eq!(parse_ether(".25").unwrap(), one / U256::from(4u64));
        assert_eq!(parse_ether("0").unwrap(), U256::zero());
    }

    #[test]
    fn test_parse_ether_rejects_bad_input() {
        assert!(parse_ether("").is_err());
        assert!(parse_ether("-1").is_err());
        assert!(parse_ether(".").is_err());
        assert!(parse_ether("1.2.3").is_err());
        assert!(parse_ether("0.0000000000000000001").is_err());
        assert!(parse_ether("abc").is_err());
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(U256::exp10(18)), "1");
        assert_eq!(format_ether(parse_ether("2.05").unwrap()), "2.05");
        assert_eq!(format_ether(U256::one()), "0.000000000000000001");
        assert_eq!(format_ether(U256::zero()), "0");
    }
}
