//! Jupiter v6 aggregator executor for the Solana chain family.
//!
//! Quote, then swap: the aggregator returns a ready-to-submit transaction
//! which is decoded, signed with the operator key, and sent without waiting
//! for confirmation. The receipt therefore reports `confirmed: false`; the
//! reconciliation sweep resolves inclusion later.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, info};
use reqwest::Client;
use serde_json::{json, Value};
use solana_rpc_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::transaction::VersionedTransaction;

use super::{SwapError, SwapExecutor, SwapOrder, SwapReceipt, WalletContext};

pub const DEFAULT_BASE_URL: &str = "https://quote-api.jup.ag/v6";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct JupiterExecutor {
    http: Client,
    rpc: Arc<RpcClient>,
    base_url: String,
}

impl JupiterExecutor {
    pub fn new(http: Client, rpc: Arc<RpcClient>, base_url: String) -> Self {
        Self {
            http,
            rpc,
            base_url,
        }
    }

    async fn fetch_quote(&self, order: &SwapOrder) -> Result<Value, SwapError> {
        let response = self
            .http
            .get(format!("{}/quote", self.base_url))
            .timeout(HTTP_TIMEOUT)
            .query(&[
                ("inputMint", order.from_asset.to_string()),
                ("outputMint", order.to_asset.to_string()),
                ("amount", order.amount_raw.to_string()),
                ("slippageBps", order.max_slippage_bps.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SwapError::Quote(format!("{status}: {body}")));
        }

        let quote: Value = response.json().await?;
        if quote.get("outAmount").and_then(Value::as_str).is_none() {
            return Err(SwapError::Quote("quote response missing outAmount".into()));
        }
        Ok(quote)
    }

    async fn fetch_swap_transaction(
        &self,
        quote: &Value,
        order: &SwapOrder,
        wallet: &WalletContext,
    ) -> Result<Vec<u8>, SwapError> {
        let mut body = json!({
            "quoteResponse": quote,
            "userPublicKey": wallet.pubkey.to_string(),
            "wrapAndUnwrapSol": true,
        });
        if order.priority_fee_lamports > 0 {
            body["prioritizationFeeLamports"] = json!(order.priority_fee_lamports);
        }

        let response = self
            .http
            .post(format!("{}/swap", self.base_url))
            .timeout(HTTP_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SwapError::Rejected(format!("{status}: {text}")));
        }

        let payload: Value = response.json().await?;
        let encoded = payload
            .get("swapTransaction")
            .and_then(Value::as_str)
            .ok_or_else(|| SwapError::Rejected("swap response missing transaction".into()))?;

        general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SwapError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SwapExecutor for JupiterExecutor {
    async fn execute(
        &self,
        order: &SwapOrder,
        wallet: &WalletContext,
    ) -> Result<SwapReceipt, SwapError> {
        let quote = self.fetch_quote(order).await?;
        let output_amount = quote
            .get("outAmount")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<u64>().ok());
        debug!(
            "Jupiter quote {} -> {} | in={} out={:?}",
            order.from_asset, order.to_asset, order.amount_raw, output_amount
        );

        let tx_bytes = self.fetch_swap_transaction(&quote, order, wallet).await?;
        let unsigned: VersionedTransaction =
            bincode::deserialize(&tx_bytes).map_err(|e| SwapError::Decode(e.to_string()))?;
        let signed =
            VersionedTransaction::try_new(unsigned.message, &[wallet.keypair.as_ref()])
                .map_err(|e| SwapError::Signing(e.to_string()))?;

        // Fire-and-forget: accepted by the RPC node, not awaited to finality.
        let signature = self
            .rpc
            .send_transaction(&signed)
            .await
            .map_err(|e| SwapError::Submit(e.to_string()))?;

        info!(
            "Submitted Jupiter swap {} -> {} | sig={}",
            order.from_asset, order.to_asset, signature
        );

        Ok(SwapReceipt {
            tx_hash: signature.to_string(),
            output_amount,
            confirmed: false,
        })
    }
}
