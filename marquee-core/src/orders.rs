//! Read-only view of the cart/order subsystem
//!
//! Marquee does not own orders. It reads purchase items through
//! [`PurchaseLedger`] and aggregates them for the staff report.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One line of a customer order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseItem {
    pub order_id: u64,
    pub username: String,
    pub movie_id: u64,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopCustomer {
    pub username: String,
    pub total_quantity: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse ledger {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait PurchaseLedger: Send + Sync {
    async fn items(&self) -> Result<Vec<PurchaseItem>, LedgerError>;
}

/// Fixed set of items, for tests and deployments without an order system
#[derive(Debug, Clone, Default)]
pub struct MemoryPurchaseLedger {
    items: Vec<PurchaseItem>,
}

impl MemoryPurchaseLedger {
    pub fn new(items: Vec<PurchaseItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl PurchaseLedger for MemoryPurchaseLedger {
    async fn items(&self) -> Result<Vec<PurchaseItem>, LedgerError> {
        Ok(self.items.clone())
    }
}

/// JSON array of [`PurchaseItem`] exported by the order system
///
/// The file is re-read on every call so the report follows the export.
#[derive(Debug, Clone)]
pub struct JsonFilePurchaseLedger {
    path: PathBuf,
}

impl JsonFilePurchaseLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PurchaseLedger for JsonFilePurchaseLedger {
    async fn items(&self) -> Result<Vec<PurchaseItem>, LedgerError> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| LedgerError::Read { path: self.path.clone(), source })?;
        serde_json::from_str(&content)
            .map_err(|source| LedgerError::Parse { path: self.path.clone(), source })
    }
}

/// Customer with the highest total quantity; ties go to the smallest username
///
/// Totals saturate at `u64::MAX` instead of wrapping.
pub fn top_customer(items: &[PurchaseItem]) -> Option<TopCustomer> {
    let mut totals: HashMap<&str, u64> = HashMap::new();
    for item in items {
        let total = totals.entry(item.username.as_str()).or_insert(0);
        *total = total.saturating_add(item.quantity);
    }

    totals
        .into_iter()
        .max_by(|(name_a, qty_a), (name_b, qty_b)| qty_a.cmp(qty_b).then(name_b.cmp(name_a)))
        .map(|(username, total_quantity)| TopCustomer { username: username.to_string(), total_quantity })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn item(order_id: u64, username: &str, quantity: u64) -> PurchaseItem {
        PurchaseItem { order_id, username: username.into(), movie_id: 1, quantity }
    }

    #[test]
    fn test_top_customer_sums_quantities() {
        let items = vec![item(1, "ana", 2), item(2, "bob", 3), item(3, "ana", 2)];
        assert_eq!(
            top_customer(&items),
            Some(TopCustomer { username: "ana".into(), total_quantity: 4 })
        );
    }

    #[test]
    fn test_top_customer_tie_and_empty() {
        let items = vec![item(1, "zoe", 5), item(2, "bob", 5), item(3, "kim", 1)];
        assert_eq!(top_customer(&items).unwrap().username, "bob");
        assert_eq!(top_customer(&[]), None);
    }

    #[test]
    fn test_top_customer_total_saturates() {
        let items = vec![item(1, "ana", u64::MAX), item(2, "ana", 1), item(3, "bob", u64::MAX - 1)];
        assert_eq!(
            top_customer(&items),
            Some(TopCustomer { username: "ana".into(), total_quantity: u64::MAX })
        );
    }

    #[tokio::test]
    async fn test_json_file_ledger() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"order_id":1,"username":"ana","movie_id":3,"quantity":2}}]"#
        )
        .unwrap();

        let ledger = JsonFilePurchaseLedger::new(file.path());
        let items = ledger.items().await.unwrap();
        assert_eq!(items, vec![PurchaseItem { order_id: 1, username: "ana".into(), movie_id: 3, quantity: 2 }]);

        let missing = JsonFilePurchaseLedger::new("/definitely/not/here.json");
        assert!(matches!(missing.items().await, Err(LedgerError::Read { .. })));
    }
}
