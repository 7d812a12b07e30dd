use crate::core::Storage;
use crate::domain::model::{Order, SupportTicket, Transaction};
use crate::utils::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const INCOMING_ORDER_KEY: &str = "incoming_order.json";
pub const TRANSACTIONS_KEY: &str = "transactions.json";
pub const SUPPORT_TICKETS_KEY: &str = "support_tickets.json";

/// Shared slots the store and driver sides talk through: one incoming order
/// plus newest-first record lists.
#[derive(Debug, Clone)]
pub struct OrderBoard<S: Storage> {
    storage: S,
}

impl<S: Storage> OrderBoard<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// 覆寫目前的待接訂單
    pub async fn post(&self, order: &Order) -> Result<()> {
        let data = serde_json::to_vec_pretty(order)?;
        self.storage.write_file(INCOMING_ORDER_KEY, &data).await?;
        tracing::info!("📮 Posted order {} from {}", order.id, order.restaurant);
        Ok(())
    }

    /// Reads and clears the incoming order slot.
    pub async fn take(&self) -> Result<Option<Order>> {
        if !self.storage.exists(INCOMING_ORDER_KEY).await? {
            return Ok(None);
        }
        let data = self.storage.read_file(INCOMING_ORDER_KEY).await?;
        self.storage.remove_file(INCOMING_ORDER_KEY).await?;

        match serde_json::from_slice::<Order>(&data) {
            Ok(order) => {
                tracing::debug!("Took order {} from the board", order.id);
                Ok(Some(order))
            }
            Err(e) => {
                // 壞掉的內容直接丟棄，避免每次輪詢都卡住
                tracing::warn!("⚠️ Discarding unreadable incoming order: {}", e);
                Ok(None)
            }
        }
    }

    pub async fn has_pending(&self) -> Result<bool> {
        self.storage.exists(INCOMING_ORDER_KEY).await
    }

    pub async fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        self.prepend(TRANSACTIONS_KEY, transaction).await
    }

    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.load_list(TRANSACTIONS_KEY).await
    }

    pub async fn open_ticket(&self, ticket: &SupportTicket) -> Result<()> {
        self.prepend(SUPPORT_TICKETS_KEY, ticket).await
    }

    pub async fn tickets(&self) -> Result<Vec<SupportTicket>> {
        self.load_list(SUPPORT_TICKETS_KEY).await
    }

    async fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        if !self.storage.exists(key).await? {
            return Ok(Vec::new());
        }
        let data = self.storage.read_file(key).await?;
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&data)?)
    }

    async fn prepend<T: Serialize + DeserializeOwned>(&self, key: &str, item: &T) -> Result<()> {
        let existing: Vec<serde_json::Value> = self.load_list(key).await?;
        let mut list = Vec::with_capacity(existing.len() + 1);
        list.push(serde_json::to_value(item)?);
        list.extend(existing);

        let data = serde_json::to_vec_pretty(&list)?;
        self.storage.write_file(key, &data).await
    }
}
