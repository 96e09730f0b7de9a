//! Fullnode nano-contract log client.
//!
//! Queries `/v1a/nano_contract/logs` for the execution outcome of a
//! submitted bet. A 404 is expected while a transaction is still
//! propagating and is reported as `NotReady`, never as an error.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{LedgerApi, LogQueryOutcome, NanoContractLogs};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FullnodeClient {
    http: Client,
    base_url: String,
}

impl FullnodeClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build fullnode HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LedgerApi for FullnodeClient {
    async fn execution_log(&self, hash: &str) -> Result<LogQueryOutcome> {
        let url = format!("{}/v1a/nano_contract/logs", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("id", hash)])
            .send()
            .await
            .context("Fullnode request failed")?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(hash, "Execution logs not ready yet (404)");
            return Ok(LogQueryOutcome::NotReady);
        }

        if !response.status().is_success() {
            return Err(anyhow!(
                "fullnode returned status {} for tx {hash}",
                response.status()
            ));
        }

        let logs: NanoContractLogs = response
            .json()
            .await
            .context("Failed to parse nano contract logs")?;

        Ok(LogQueryOutcome::Response(logs))
    }
}
