use super::{App, Reply};
use crate::error::CatalogResult;
use crate::orders::top_customer;
use crate::views::TopCustomerView;
use serde_json::json;

impl App {
    /// Liveness plus table sizes
    pub(super) async fn health(&self) -> CatalogResult<Reply> {
        Ok(Reply::page(&json!({
            "status": "ok",
            "stats": self.store.stats(),
            "journal_events": self.store.journal_appended().await,
        })))
    }

    pub(super) async fn top_customer(&self) -> CatalogResult<Reply> {
        let items = self.ledger.items().await?;
        Ok(Reply::page(&TopCustomerView { top_customer: top_customer(&items) }))
    }
}
