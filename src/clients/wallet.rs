//! Hathor headless wallet client.
//!
//! The headless wallet holds the keys; this client only submits
//! nano-contract calls and reads address balances over its HTTP API.
//! Every request carries the wallet id header. No funds move without a
//! success acknowledgment from the wallet, so a transport failure here
//! never leaves money in flight.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ContractCall, NanoAction, SubmitResult, WalletApi};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Request/response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    nc_id: &'a str,
    method: &'a str,
    address: &'a str,
    data: ExecuteData<'a>,
}

#[derive(Debug, Serialize)]
struct ExecuteData<'a> {
    args: &'a [serde_json::Value],
    actions: &'a [NanoAction],
}

#[derive(Debug, Deserialize)]
struct AddressInfoResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    total_amount_available: u64,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct HeadlessWalletClient {
    http: Client,
    base_url: String,
}

impl HeadlessWalletClient {
    pub fn new(base_url: &str, wallet_id: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-Wallet-Id",
            HeaderValue::from_str(wallet_id).context("Invalid wallet id header value")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build wallet HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl WalletApi for HeadlessWalletClient {
    async fn submit_contract_call(&self, call: &ContractCall) -> Result<SubmitResult> {
        let url = format!("{}/wallet/nano-contracts/execute", self.base_url);
        let body = ExecuteRequest {
            nc_id: &call.contract_id,
            method: &call.method,
            address: &call.caller,
            data: ExecuteData {
                args: &call.args,
                actions: &call.actions,
            },
        };

        debug!(method = %call.method, contract = %call.contract_id, "Submitting contract call");

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Wallet request failed")?;

        // The wallet answers rejections with a structured body too, so
        // parse it on any status rather than bailing on non-2xx.
        let result: SubmitResult = response
            .json()
            .await
            .context("Failed to parse wallet response")?;

        Ok(result)
    }

    async fn address_balance(&self, address: &str, token: &str) -> Result<u64> {
        let url = format!("{}/wallet/address-info", self.base_url);

        let info: AddressInfoResponse = self
            .http
            .get(&url)
            .query(&[("address", address), ("token", token)])
            .send()
            .await
            .context("Wallet request failed")?
            .json()
            .await
            .context("Failed to parse address info")?;

        if !info.success {
            return Err(anyhow!(
                "wallet could not fetch address info: {}",
                info.error.unwrap_or_else(|| "unknown error".to_string())
            ));
        }

        Ok(info.total_amount_available)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
