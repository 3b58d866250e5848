//! Minimal Solana JSON-RPC client.
//!
//! Only `getLatestBlockhash` is needed: signing and submission are done by the
//! custody provider. The client speaks plain JSON-RPC over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::address::blockhash_to_bytes;
use crate::error::SolError;

pub const DEVNET_RPC_URL: &str = "https://api.devnet.solana.com";
pub const MAINNET_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Commitment level attached to RPC reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    #[default]
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

/// A recent blockhash and the last block height at which it is still valid.
///
/// Transactions bound to it expire after that height; nothing here refreshes
/// or extends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

impl LatestBlockhash {
    pub fn to_base58(&self) -> String {
        bs58::encode(self.blockhash).into_string()
    }
}

/// Anything that can hand out a recent blockhash.
#[async_trait]
pub trait BlockhashSource: Send + Sync {
    async fn latest_blockhash(&self) -> Result<LatestBlockhash, SolError>;
}

#[async_trait]
impl<T: BlockhashSource + ?Sized> BlockhashSource for std::sync::Arc<T> {
    async fn latest_blockhash(&self) -> Result<LatestBlockhash, SolError> {
        (**self).latest_blockhash().await
    }
}

/// HTTP JSON-RPC client bound to one endpoint.
#[derive(Debug, Clone)]
pub struct SolanaRpcClient {
    http: Client,
    url: String,
    commitment: Commitment,
}

impl SolanaRpcClient {
    pub fn new(url: impl Into<String>) -> Result<Self, SolError> {
        Self::with_options(url, Commitment::default(), DEFAULT_TIMEOUT)
    }

    pub fn with_options(
        url: impl Into<String>,
        commitment: Commitment,
        timeout: Duration,
    ) -> Result<Self, SolError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SolError::BlockhashFetchFailed(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
            commitment,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, SolError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SolError::BlockhashFetchFailed(format!("{method}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SolError::BlockhashFetchFailed(format!(
                "{method}: http status {status}"
            )));
        }

        resp.json::<Value>()
            .await
            .map_err(|e| SolError::BlockhashFetchFailed(format!("{method}: invalid json: {e}")))
    }
}

#[async_trait]
impl BlockhashSource for SolanaRpcClient {
    async fn latest_blockhash(&self) -> Result<LatestBlockhash, SolError> {
        tracing::debug!(
            url = %self.url,
            commitment = self.commitment.as_str(),
            "getLatestBlockhash"
        );
        let params = json!([{ "commitment": self.commitment.as_str() }]);
        let response = self.call("getLatestBlockhash", params).await?;
        parse_latest_blockhash(&response)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
    last_valid_block_height: u64,
}

/// Extract the blockhash from a `getLatestBlockhash` JSON-RPC response.
///
/// Every failure, including a JSON-RPC `error` object, is reported as
/// [`SolError::BlockhashFetchFailed`].
pub fn parse_latest_blockhash(response: &Value) -> Result<LatestBlockhash, SolError> {
    if let Some(err) = response.get("error") {
        let msg = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown rpc error");
        return Err(SolError::BlockhashFetchFailed(format!("rpc error: {msg}")));
    }

    let value = response
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .ok_or_else(|| SolError::BlockhashFetchFailed("response has no result.value".into()))?;

    let value: BlockhashValue = serde_json::from_value(value)
        .map_err(|e| SolError::BlockhashFetchFailed(format!("malformed result: {e}")))?;

    let blockhash = blockhash_to_bytes(&value.blockhash)
        .map_err(|e| SolError::BlockhashFetchFailed(e.to_string()))?;

    Ok(LatestBlockhash {
        blockhash,
        last_valid_block_height: value.last_valid_block_height,
    })
}

/// Fixed blockhash, for offline use and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticBlockhash(pub LatestBlockhash);

impl StaticBlockhash {
    pub fn new(blockhash: [u8; 32]) -> Self {
        Self(LatestBlockhash {
            blockhash,
            last_valid_block_height: 0,
        })
    }
}

#[async_trait]
impl BlockhashSource for StaticBlockhash {
    async fn latest_blockhash(&self) -> Result<LatestBlockhash, SolError> {
        Ok(self.0)
    }
}

/// A source whose every fetch fails, simulating an unreachable endpoint.
#[derive(Debug, Clone)]
pub struct FailingBlockhash(pub String);

#[async_trait]
impl BlockhashSource for FailingBlockhash {
    async fn latest_blockhash(&self) -> Result<LatestBlockhash, SolError> {
        Err(SolError::BlockhashFetchFailed(self.0.clone()))
    }
}
