use anyhow::{Context, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::TokenApi;
use crate::schema::Address;

/// ERC-20 `balanceOf(address)` function selector.
const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Token balance lookup through an Ethereum JSON-RPC node.
///
/// Each call is a single `eth_call` against the `latest` block. No
/// retries happen here; a failed call fails the sub-query.
pub struct EthTokenClient {
    http: reqwest::Client,
    url: String,
    contract: Address,
}

#[derive(Debug, Deserialize)]
struct RpcReply {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl EthTokenClient {
    pub fn new(http: reqwest::Client, url: String, contract: Address) -> Self {
        Self { http, url, contract }
    }

    fn call_payload(&self, holder: Address) -> Value {
        let mut data = Vec::with_capacity(36);
        data.extend_from_slice(&BALANCE_OF_SELECTOR);
        data.extend_from_slice(&[0u8; 12]);
        data.extend_from_slice(holder.as_bytes());

        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_call",
            "params": [
                { "to": self.contract.to_string(), "data": format!("0x{}", hex::encode(data)) },
                "latest",
            ],
        })
    }
}

/// Decodes an ABI-encoded uint256 that must fit into 128 bits.
fn decode_uint(raw: &str) -> anyhow::Result<u128> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.is_empty() {
        bail!("empty eth_call result (is the token contract deployed?)");
    }

    let bytes = hex::decode(digits).context("eth_call result is not hex")?;
    if bytes.len() != 32 {
        bail!("expected 32 byte uint256, got {} bytes", bytes.len());
    }
    if bytes[..16].iter().any(|b| *b != 0) {
        bail!("balance does not fit into 128 bits");
    }

    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Ok(u128::from_be_bytes(low))
}

#[async_trait]
impl TokenApi for EthTokenClient {
    async fn balance_of(&self, addr: Address) -> anyhow::Result<u128> {
        let reply: RpcReply = self
            .http
            .post(&self.url)
            .json(&self.call_payload(addr))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .context("malformed JSON-RPC reply")?;

        if let Some(err) = reply.error {
            return Err(anyhow!("eth_call failed ({}): {}", err.code, err.message));
        }

        let result = reply
            .result
            .ok_or_else(|| anyhow!("JSON-RPC reply has neither result nor error"))?;
        decode_uint(&result)
    }
}
