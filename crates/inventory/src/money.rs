//! Prices: decimal amounts tagged with an ISO 4217 currency code.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{DomainError, DomainResult, ValueObject};

/// Three-letter uppercase currency code (e.g. "EUR").
///
/// Only the shape is checked here; whether the code is known is a reference
/// data lookup done by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    pub fn parse(code: &str) -> DomainResult<Self> {
        let code = code.trim();
        if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "currency code must be three uppercase letters (got '{code}')"
            )));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl core::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An amount of money in a given currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: CurrencyCode,
}

impl ValueObject for Money {}

impl Money {
    /// Any non-negative amount (movement prices may be zero).
    pub fn new(amount: Decimal, currency: CurrencyCode) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::validation("price cannot be negative"));
        }
        Ok(Self { amount, currency })
    }

    /// A unit price, which must be strictly positive.
    pub fn unit_price(amount: Decimal, currency: CurrencyCode) -> DomainResult<Self> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation("unit price must be positive"));
        }
        Ok(Self { amount, currency })
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.currency
    }

    /// Same currency, different amount.
    pub fn with_amount(&self, amount: Decimal) -> DomainResult<Self> {
        Self::new(amount, self.currency.clone())
    }

    /// `amount × quantity`, saturating at the decimal range.
    pub fn times(&self, quantity: i64) -> Decimal {
        self.amount
            .checked_mul(Decimal::from(quantity))
            .unwrap_or(Decimal::MAX)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur() -> CurrencyCode {
        CurrencyCode::parse("EUR").unwrap()
    }

    #[test]
    fn currency_code_shape_is_enforced() {
        assert!(CurrencyCode::parse("EUR").is_ok());
        assert!(CurrencyCode::parse("eur").is_err());
        assert!(CurrencyCode::parse("EURO").is_err());
        assert!(CurrencyCode::parse("").is_err());
    }

    #[test]
    fn currency_code_rejects_bad_input_on_deserialize() {
        assert!(serde_json::from_str::<CurrencyCode>("\"usd\"").is_err());
        let ok: CurrencyCode = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(ok.as_str(), "USD");
    }

    #[test]
    fn unit_price_must_be_positive() {
        assert!(Money::unit_price(Decimal::new(150, 2), eur()).is_ok());
        assert!(Money::unit_price(Decimal::ZERO, eur()).is_err());
        assert!(Money::unit_price(Decimal::new(-1, 0), eur()).is_err());
    }

    #[test]
    fn movement_price_may_be_zero_but_not_negative() {
        assert!(Money::new(Decimal::ZERO, eur()).is_ok());
        assert!(Money::new(Decimal::new(-5, 1), eur()).is_err());
    }

    #[test]
    fn times_multiplies_by_quantity() {
        let price = Money::unit_price(Decimal::new(150, 2), eur()).unwrap();
        assert_eq!(price.times(4), Decimal::new(600, 2));
        assert_eq!(price.to_string(), "1.50 EUR");
    }
}
