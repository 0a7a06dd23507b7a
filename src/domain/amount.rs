//! Amount and Balance types
//!
//! Domain primitives for money. Both are exact fixed-point decimals with at
//! most two fractional digits, bounded by the `decimal(15,2)` column they are
//! stored in. Invalid values cannot be constructed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum decimal places (centimes)
pub const MAX_SCALE: u32 = 2;

/// Largest value representable in a `decimal(15,2)` column.
pub fn max_value() -> Decimal {
    Decimal::new(999_999_999_999_999, MAX_SCALE)
}

/// Amount of a single deposit, withdrawal or transfer.
///
/// # Invariants
/// - Value is zero or positive (zero amounts are accepted and produce a
///   ledger entry whose before and after balances are equal)
/// - At most 2 decimal places, never rounded
/// - At most 9 999 999 999 999.99
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use microfinance_ledger::domain::Amount;
///
/// let amount = Amount::new(Decimal::new(50000, 2)).unwrap();
/// assert_eq!(amount.to_string(), "500.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(Decimal);

/// Errors that can occur when creating an Amount or Balance
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Amount must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

/// Shared construction rules for Amount and Balance.
fn checked(value: Decimal) -> Result<Decimal, AmountError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::Negative(value));
    }

    // normalize() drops trailing zeros so "10.500" is still accepted
    let scale = value.normalize().scale();
    if scale > MAX_SCALE {
        return Err(AmountError::TooManyDecimals(scale));
    }

    if value > max_value() {
        return Err(AmountError::Overflow);
    }

    let mut value = value.normalize();
    value.rescale(MAX_SCALE);
    Ok(value)
}

impl Amount {
    /// Create a new Amount with validation.
    ///
    /// # Errors
    /// - `AmountError::Negative` if value < 0
    /// - `AmountError::TooManyDecimals` if more than 2 decimal places
    /// - `AmountError::Overflow` if value exceeds the column maximum
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        checked(value).map(Self)
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Amount::new(decimal)
    }
}

impl TryFrom<String> for Amount {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Amount::from_str(&value)
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

/// Balance of an account. Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Balance(Decimal);

impl Balance {
    /// Create a new balance (zero or positive)
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        checked(value).map(Self)
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::new(0, MAX_SCALE))
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check if balance covers a withdrawal of `amount`
    pub fn is_sufficient_for(&self, amount: &Amount) -> bool {
        self.0 >= amount.value()
    }

    /// Add amount to balance
    pub fn credit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        Balance::new(self.0 + amount.value())
    }

    /// Subtract amount from balance
    pub fn debit(&self, amount: &Amount) -> Result<Balance, AmountError> {
        Balance::new(self.0 - amount.value())
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}

impl FromStr for Balance {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())
            .map_err(|e| AmountError::ParseError(e.to_string()))?;
        Balance::new(decimal)
    }
}

impl TryFrom<String> for Balance {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Balance::from_str(&value)
    }
}

impl From<Balance> for String {
    fn from(balance: Balance) -> Self {
        balance.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amount_positive() {
        let amount = Amount::new(dec!(500.00)).unwrap();
        assert_eq!(amount.value(), dec!(500));
    }

    #[test]
    fn test_amount_zero_accepted() {
        let amount = Amount::new(Decimal::ZERO).unwrap();
        assert!(amount.is_zero());
        assert_eq!(amount.to_string(), "0.00");
    }

    #[test]
    fn test_amount_negative_rejected() {
        let amount = Amount::new(dec!(-100));
        assert!(matches!(amount, Err(AmountError::Negative(_))));
    }

    #[test]
    fn test_amount_too_many_decimals() {
        let amount = Amount::new(dec!(10.005));
        assert!(matches!(amount, Err(AmountError::TooManyDecimals(3))));
    }

    #[test]
    fn test_amount_trailing_zeros_are_not_extra_precision() {
        let amount = Amount::new(dec!(10.500)).unwrap();
        assert_eq!(amount.to_string(), "10.50");
    }

    #[test]
    fn test_amount_overflow() {
        let amount = Amount::new(dec!(10000000000000.00));
        assert!(matches!(amount, Err(AmountError::Overflow)));
    }

    #[test]
    fn test_amount_max_value_ok() {
        let amount = Amount::new(dec!(9999999999999.99));
        assert!(amount.is_ok());
    }

    #[test]
    fn test_amount_from_str() {
        let amount: Amount = " 123.4 ".parse().unwrap();
        assert_eq!(amount.value(), dec!(123.40));
        assert!("abc".parse::<Amount>().is_err());
    }

    #[test]
    fn test_amount_serializes_as_two_digit_string() {
        let amount = Amount::new(dec!(1500)).unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1500.00\"");

        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_balance_credit_debit() {
        let balance = Balance::new(dec!(1000.00)).unwrap();

        let balance = balance.credit(&Amount::new(dec!(500.00)).unwrap()).unwrap();
        assert_eq!(balance.value(), dec!(1500.00));

        let balance = balance.debit(&Amount::new(dec!(1500.00)).unwrap()).unwrap();
        assert_eq!(balance, Balance::zero());
    }

    #[test]
    fn test_balance_insufficient() {
        let balance = Balance::new(dec!(1500)).unwrap();
        let amount = Amount::new(dec!(2000)).unwrap();

        assert!(!balance.is_sufficient_for(&amount));
        assert!(matches!(balance.debit(&amount), Err(AmountError::Negative(_))));
    }

    #[test]
    fn test_balance_credit_overflow() {
        let balance = Balance::new(dec!(9999999999999.99)).unwrap();
        let amount = Amount::new(dec!(0.01)).unwrap();
        assert!(matches!(balance.credit(&amount), Err(AmountError::Overflow)));
    }
}
