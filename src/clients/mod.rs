//! External service clients.
//!
//! Defines the three narrow interfaces the settlement engine consumes
//! — wallet submission, ledger log query, user notification — and the
//! wire types they exchange. Implementations:
//! - `wallet` — Hathor headless wallet HTTP API
//! - `fullnode` — fullnode nano-contract log endpoint
//! - `telegram` — Telegram Bot API notifier

pub mod fullnode;
pub mod telegram;
pub mod wallet;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token id of native HTR.
pub const HTR_TOKEN: &str = "00";

// ---------------------------------------------------------------------------
// Contract call wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Deposit,
    Withdrawal,
}

/// A token movement attached to a nano-contract call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NanoAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub token: String,
    /// Amount in minor units.
    pub amount: u64,
    pub address: String,
    #[serde(rename = "changeAddress")]
    pub change_address: String,
}

impl NanoAction {
    /// Deposit `amount` from `address`, change back to the same address.
    pub fn deposit(token: &str, amount: u64, address: &str) -> Self {
        Self {
            action_type: ActionType::Deposit,
            token: token.to_string(),
            amount,
            address: address.to_string(),
            change_address: address.to_string(),
        }
    }

    /// Withdraw `amount` to `address`, change back to the same address.
    pub fn withdrawal(token: &str, amount: u64, address: &str) -> Self {
        Self {
            action_type: ActionType::Withdrawal,
            token: token.to_string(),
            amount,
            address: address.to_string(),
            change_address: address.to_string(),
        }
    }
}

/// A fully specified nano-contract method invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ContractCall {
    pub contract_id: String,
    pub method: String,
    /// Address signing and paying for the call.
    pub caller: String,
    pub args: Vec<serde_json::Value>,
    pub actions: Vec<NanoAction>,
}

/// Wallet acknowledgment, mirroring the headless-wallet response body.
/// The wallet guarantees no funds move without a success acknowledgment.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SubmitResult {
    pub fn error_message(&self) -> String {
        self.error.clone().unwrap_or_else(|| "unknown error".to_string())
    }
}

// ---------------------------------------------------------------------------
// Execution log wire types
// ---------------------------------------------------------------------------

/// Body of the fullnode `/v1a/nano_contract/logs` response. The event
/// log is nested: tx hash → execution traces → events.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NanoContractLogs {
    #[serde(default)]
    pub success: bool,
    /// "success" once the contract call executed cleanly; any other
    /// value after confirmation is a definitive execution failure.
    #[serde(default)]
    pub nc_execution: Option<String>,
    #[serde(default)]
    pub logs: HashMap<String, Vec<ExecutionTrace>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionTrace {
    #[serde(default)]
    pub logs: Vec<LogEvent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogEvent {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub key_values: HashMap<String, serde_json::Value>,
}

impl LogEvent {
    /// Payout carried by this event, if any. Depending on node version
    /// the value arrives as a JSON number or a numeric string.
    pub fn payout(&self) -> Option<u64> {
        match self.key_values.get("payout")? {
            serde_json::Value::Number(n) => {
                n.as_u64().or_else(|| n.as_f64().map(|f| f as u64))
            }
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl NanoContractLogs {
    /// The execution trace for the queried transaction. The map is
    /// keyed by tx hash and carries a single entry in practice.
    pub fn first_trace(&self) -> Option<&ExecutionTrace> {
        self.logs.values().next().and_then(|traces| traces.first())
    }

    /// Whether the contract call itself executed successfully.
    pub fn executed_ok(&self) -> bool {
        self.nc_execution.as_deref() == Some("success")
    }

    /// The positive payout recorded by a winning roll, if any.
    pub fn winning_payout(&self) -> Option<u64> {
        self.first_trace()?
            .logs
            .iter()
            .filter(|e| e.event_type == "LOG")
            .find_map(|e| e.payout().filter(|p| *p > 0))
    }
}

/// Outcome of a ledger log query, separating "the resource does not
/// exist yet" (normal while a transaction propagates) from a parsed
/// response. Transport failures surface as `Err` from the trait.
#[derive(Debug, Clone)]
pub enum LogQueryOutcome {
    NotReady,
    Response(NanoContractLogs),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Wallet-transaction submission and balance queries.
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Submit a nano-contract call. `Err` means transport failure;
    /// a wallet-level rejection comes back as an unsuccessful
    /// [`SubmitResult`].
    async fn submit_contract_call(&self, call: &ContractCall) -> Result<SubmitResult>;

    /// Available balance for an address, in minor units.
    async fn address_balance(&self, address: &str, token: &str) -> Result<u64>;
}

/// Nano-contract execution log queries.
#[async_trait]
pub trait LedgerApi: Send + Sync {
    async fn execution_log(&self, hash: &str) -> Result<LogQueryOutcome>;
}

/// Best-effort user notification. Failures are logged by callers and
/// never influence ledger state.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: i64, chat_id: Option<i64>, text: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
