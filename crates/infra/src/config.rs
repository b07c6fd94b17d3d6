//! Service configuration.
//!
//! Defaults in code, overridable from the environment:
//!
//! - `STOCKBOOK_CATEGORY_REMOVAL`: `reject` (default) or `cascade`
//! - `STOCKBOOK_INITIAL_STOCK_REASON`: reason stamped on opening-stock movements

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockbook_inventory::INITIAL_STOCK_REASON;

pub const CATEGORY_REMOVAL_ENV: &str = "STOCKBOOK_CATEGORY_REMOVAL";
pub const INITIAL_STOCK_REASON_ENV: &str = "STOCKBOOK_INITIAL_STOCK_REASON";

/// What removing a category does to the items still in it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryRemovalPolicy {
    /// Refuse with a conflict while any item references the category.
    #[default]
    Reject,
    /// Remove the items and their movement histories with the category.
    Cascade,
}

impl FromStr for CategoryRemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(Self::Reject),
            "cascade" => Ok(Self::Cascade),
            other => Err(format!("unknown category removal policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryConfig {
    pub category_removal: CategoryRemovalPolicy,
    pub initial_stock_reason: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            category_removal: CategoryRemovalPolicy::default(),
            initial_stock_reason: INITIAL_STOCK_REASON.to_string(),
        }
    }
}

impl InventoryConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unknown or blank values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(CATEGORY_REMOVAL_ENV) {
            match raw.parse() {
                Ok(policy) => config.category_removal = policy,
                Err(err) => {
                    tracing::warn!(%err, key = CATEGORY_REMOVAL_ENV, "ignoring category removal override; using reject")
                }
            }
        }

        if let Some(reason) = lookup(INITIAL_STOCK_REASON_ENV) {
            let reason = reason.trim();
            if !reason.is_empty() {
                config.initial_stock_reason = reason.to_string();
            }
        }

        config
    }

    pub fn with_category_removal(mut self, policy: CategoryRemovalPolicy) -> Self {
        self.category_removal = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_reject_and_initial_stock() {
        let config = InventoryConfig::from_lookup(lookup(&[]));
        assert_eq!(config.category_removal, CategoryRemovalPolicy::Reject);
        assert_eq!(config.initial_stock_reason, "initial stock");
    }

    #[test]
    fn overrides_are_applied() {
        let config = InventoryConfig::from_lookup(lookup(&[
            (CATEGORY_REMOVAL_ENV, " Cascade "),
            (INITIAL_STOCK_REASON_ENV, "opening balance"),
        ]));
        assert_eq!(config.category_removal, CategoryRemovalPolicy::Cascade);
        assert_eq!(config.initial_stock_reason, "opening balance");
    }

    #[test]
    fn unknown_policy_falls_back_to_reject() {
        let config = InventoryConfig::from_lookup(lookup(&[(CATEGORY_REMOVAL_ENV, "orphan")]));
        assert_eq!(config.category_removal, CategoryRemovalPolicy::Reject);
    }
}
