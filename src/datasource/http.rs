//! JSON gateway client for the remote ledger.
//!
//! Every call is a `POST {base_url}/ledger` with a `type` discriminator.

use super::{DataSourceError, ItemCatalog, LedgerSource, ProfitOracle, SettlementGateway};
use crate::domain::{
    Address, Amount, EstimateRequest, FeeSettings, InvestmentOrder, ItemLimits, LockRecord,
    SettlementBatch, SettlementReceipt,
};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Remote ledger reached over the JSON gateway.
#[derive(Debug, Clone)]
pub struct HttpLedger {
    client: Client,
    base_url: String,
}

/// Whether a call may be repeated after a transient failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retry {
    /// Idempotent metadata reads.
    Transient,
    /// Lock reads, estimates and writes: one attempt, the caller decides.
    Never,
}

impl HttpLedger {
    /// Create a new gateway client.
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        payload: serde_json::Value,
        policy: Retry,
    ) -> Result<serde_json::Value, DataSourceError> {
        let url = format!("{}/ledger", self.base_url);
        match policy {
            Retry::Transient => {
                let backoff = ExponentialBackoff {
                    max_elapsed_time: Some(Duration::from_secs(30)),
                    ..Default::default()
                };
                retry(backoff, || self.attempt(&url, &payload)).await
            }
            Retry::Never => self.attempt(&url, &payload).await.map_err(|e| match e {
                backoff::Error::Permanent(err) => err,
                backoff::Error::Transient { err, .. } => err,
            }),
        }
    }

    async fn attempt(
        &self,
        url: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, backoff::Error<DataSourceError>> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| backoff::Error::transient(DataSourceError::NetworkError(e.to_string())))?;

        let status = response.status();
        if status == 429 {
            return Err(backoff::Error::transient(DataSourceError::RateLimited));
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(DataSourceError::HttpError {
                status: status.as_u16(),
                message: "Server error".to_string(),
            }));
        }
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(|v| v.as_str()).map(str::to_string))
                .unwrap_or_else(|| "Client error".to_string());
            return Err(backoff::Error::permanent(DataSourceError::HttpError {
                status: status.as_u16(),
                message,
            }));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| backoff::Error::permanent(DataSourceError::ParseError(e.to_string())))
    }

    async fn fetch_locks(
        &self,
        kind: &str,
        account: &Address,
    ) -> Result<Vec<LockRecord>, DataSourceError> {
        debug!("Fetching {} for account={}", kind, account);
        let payload = serde_json::json!({ "type": kind, "account": account });
        let response = self.post(payload, Retry::Never).await?;
        parse_lock_records(response)
    }
}

/// Decode a lock sequence. A malformed element fails the whole response: skipping it
/// would shift the sequence indices of every later lock.
fn parse_lock_records(response: serde_json::Value) -> Result<Vec<LockRecord>, DataSourceError> {
    let items = response
        .as_array()
        .ok_or_else(|| DataSourceError::ParseError("Expected array response".to_string()))?;
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<LockRecord>(item.clone()).map_err(|e| {
                DataSourceError::ParseError(format!("Invalid lock at index {}: {}", index, e))
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemInfoWire {
    token_id: u64,
    min_investment: String,
    max_investment: String,
    min_lock_duration: u64,
    max_lock_duration: u64,
    apr: u32,
    strategy_id: u32,
}

fn parse_item_limits(response: serde_json::Value) -> Result<ItemLimits, DataSourceError> {
    let wire: ItemInfoWire = serde_json::from_value(response)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid item info: {}", e)))?;
    let min_investment = Amount::from_ether_str(&wire.min_investment)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid minInvestment: {}", e)))?;
    let max_investment = Amount::from_ether_str(&wire.max_investment)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid maxInvestment: {}", e)))?;

    Ok(ItemLimits {
        token_id: wire.token_id,
        min_investment,
        max_investment,
        min_lock_duration: wire.min_lock_duration,
        max_lock_duration: wire.max_lock_duration,
        apr_bps: wire.apr,
        strategy_id: wire.strategy_id,
    })
}

fn parse_amount_field(
    response: &serde_json::Value,
    field: &str,
) -> Result<Amount, DataSourceError> {
    let raw = response
        .get(field)
        .and_then(|v| v.as_str())
        .ok_or_else(|| DataSourceError::ParseError(format!("Missing {} field", field)))?;
    raw.parse::<Amount>()
        .map_err(|e| DataSourceError::ParseError(format!("Invalid {}: {}", field, e)))
}

fn parse_receipt(response: serde_json::Value) -> Result<SettlementReceipt, DataSourceError> {
    serde_json::from_value(response)
        .map_err(|e| DataSourceError::ParseError(format!("Invalid receipt: {}", e)))
}

/// Client errors on write calls mean the ledger refused the transaction.
fn into_rejection(err: DataSourceError) -> DataSourceError {
    match err {
        DataSourceError::HttpError { status, message } if (400..500).contains(&status) => {
            DataSourceError::Rejected(message)
        }
        other => other,
    }
}

#[async_trait]
impl LedgerSource for HttpLedger {
    async fn fetch_fungible_locks(
        &self,
        account: &Address,
    ) -> Result<Vec<LockRecord>, DataSourceError> {
        self.fetch_locks("fungibleLocks", account).await
    }

    async fn fetch_native_locks(
        &self,
        account: &Address,
    ) -> Result<Vec<LockRecord>, DataSourceError> {
        self.fetch_locks("nativeLocks", account).await
    }

    async fn fetch_fee_settings(&self) -> Result<FeeSettings, DataSourceError> {
        debug!("Fetching fee settings");
        let response = self
            .post(serde_json::json!({ "type": "feeSettings" }), Retry::Transient)
            .await?;
        serde_json::from_value(response)
            .map_err(|e| DataSourceError::ParseError(format!("Invalid fee settings: {}", e)))
    }

    async fn fetch_vault_balance(&self, account: &Address) -> Result<Amount, DataSourceError> {
        let payload = serde_json::json!({ "type": "vaultBalance", "account": account });
        let response = self.post(payload, Retry::Never).await?;
        parse_amount_field(&response, "balance")
    }
}

#[async_trait]
impl ProfitOracle for HttpLedger {
    async fn expected_profit(&self, request: &EstimateRequest) -> Result<Amount, DataSourceError> {
        let payload = serde_json::json!({
            "type": "expectedProfit",
            "amount": request.amount,
            "duration": request.duration,
            "apr": request.apr_bps,
            "strategyId": request.strategy_id
        });
        let response = self.post(payload, Retry::Never).await?;
        parse_amount_field(&response, "profit")
    }
}

#[async_trait]
impl ItemCatalog for HttpLedger {
    async fn item_limits(&self, token_id: u64) -> Result<ItemLimits, DataSourceError> {
        debug!("Fetching item info for token_id={}", token_id);
        let payload = serde_json::json!({ "type": "itemInfo", "tokenId": token_id });
        let response = self.post(payload, Retry::Transient).await?;
        parse_item_limits(response)
    }
}

#[async_trait]
impl SettlementGateway for HttpLedger {
    async fn submit(
        &self,
        account: &Address,
        batch: &SettlementBatch,
    ) -> Result<SettlementReceipt, DataSourceError> {
        let payload = serde_json::json!({
            "type": "settle",
            "account": account,
            "batch": batch
        });
        let response = self
            .post(payload, Retry::Never)
            .await
            .map_err(into_rejection)?;
        parse_receipt(response)
    }

    async fn invest(
        &self,
        account: &Address,
        order: &InvestmentOrder,
    ) -> Result<SettlementReceipt, DataSourceError> {
        let payload = serde_json::json!({
            "type": "invest",
            "account": account,
            "order": order
        });
        let response = self
            .post(payload, Retry::Never)
            .await
            .map_err(into_rejection)?;
        parse_receipt(response)
    }
}
