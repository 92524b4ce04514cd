use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Serialize;

use super::{CountReply, DealsRequest, DwhClient, OrdersRequest};

/// DWH client over its JSON HTTP gateway.
///
/// Every method maps to `POST {url}/DWHServer/<Method>/` with the request
/// serialized as the JSON body.
pub struct HttpDwhClient {
    http: reqwest::Client,
    url: String,
}

impl HttpDwhClient {
    pub fn new(http: reqwest::Client, url: String) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn call<R: Serialize + Sync>(&self, rpc: &str, req: &R) -> anyhow::Result<CountReply> {
        let resp = self
            .http
            .post(format!("{}/DWHServer/{}/", self.url, rpc))
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("DWH {rpc} returned {status}: {body}");
        }

        let reply = resp
            .json()
            .await
            .with_context(|| format!("malformed DWH {rpc} reply"))?;
        Ok(reply)
    }
}

#[async_trait]
impl DwhClient for HttpDwhClient {
    async fn get_deals(&self, req: &DealsRequest) -> anyhow::Result<CountReply> {
        self.call("GetDeals", req).await
    }

    async fn get_orders(&self, req: &OrdersRequest) -> anyhow::Result<CountReply> {
        self.call("GetOrders", req).await
    }
}
