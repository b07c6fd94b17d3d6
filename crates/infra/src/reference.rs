//! Currency reference data (read-only lookups).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use stockbook_inventory::CurrencyCode;

/// Display information for a currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: CurrencyCode,
    pub symbol: String,
    pub name: String,
}

/// Lookup of currency labels by code.
///
/// Used for existence checks on item currencies and to stamp display labels;
/// never for pricing logic.
pub trait ReferenceData: Send + Sync {
    fn currency(&self, code: &CurrencyCode) -> Option<CurrencyInfo>;
}

impl<R> ReferenceData for Arc<R>
where
    R: ReferenceData + ?Sized,
{
    fn currency(&self, code: &CurrencyCode) -> Option<CurrencyInfo> {
        (**self).currency(code)
    }
}

const BUILT_IN: &[(&str, &str, &str)] = &[
    ("EUR", "€", "Euro"),
    ("USD", "$", "US Dollar"),
    ("GBP", "£", "Pound Sterling"),
    ("CHF", "CHF", "Swiss Franc"),
    ("JPY", "¥", "Japanese Yen"),
    ("CAD", "CA$", "Canadian Dollar"),
    ("AUD", "A$", "Australian Dollar"),
    ("SEK", "kr", "Swedish Krona"),
    ("PLN", "zł", "Polish Zloty"),
    ("INR", "₹", "Indian Rupee"),
];

/// Fixed in-process currency table.
#[derive(Debug, Clone)]
pub struct StaticReferenceData {
    currencies: HashMap<String, CurrencyInfo>,
}

impl StaticReferenceData {
    /// An empty table.
    pub fn empty() -> Self {
        Self {
            currencies: HashMap::new(),
        }
    }

    /// Add (or replace) a currency. Codes that are not three uppercase
    /// letters are ignored.
    pub fn with_currency(mut self, code: &str, symbol: &str, name: &str) -> Self {
        match CurrencyCode::parse(code) {
            Ok(code) => {
                self.currencies.insert(
                    code.as_str().to_string(),
                    CurrencyInfo {
                        code,
                        symbol: symbol.to_string(),
                        name: name.to_string(),
                    },
                );
            }
            Err(err) => tracing::warn!(%err, "ignoring malformed currency code"),
        }
        self
    }
}

impl Default for StaticReferenceData {
    /// The built-in table of common currencies.
    fn default() -> Self {
        BUILT_IN
            .iter()
            .fold(Self::empty(), |table, (code, symbol, name)| {
                table.with_currency(code, symbol, name)
            })
    }
}

impl ReferenceData for StaticReferenceData {
    fn currency(&self, code: &CurrencyCode) -> Option<CurrencyInfo> {
        self.currencies.get(code.as_str()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: &str) -> CurrencyCode {
        CurrencyCode::parse(c).unwrap()
    }

    #[test]
    fn built_in_table_knows_euro() {
        let refs = StaticReferenceData::default();
        let eur = refs.currency(&code("EUR")).unwrap();
        assert_eq!(eur.symbol, "€");
        assert_eq!(eur.name, "Euro");
        assert!(refs.currency(&code("XYZ")).is_none());
    }

    #[test]
    fn extra_currencies_can_be_added() {
        let refs = StaticReferenceData::empty()
            .with_currency("THB", "฿", "Thai Baht")
            .with_currency("bad", "?", "ignored");
        assert_eq!(refs.currency(&code("THB")).unwrap().symbol, "฿");
        assert!(refs.currency(&code("EUR")).is_none());
    }
}
