//! Settlement poller.
//!
//! A single periodic task that drives every pending bet to exactly one
//! terminal, notified state. Each sweep walks the ledger sequentially,
//! queries the fullnode for the execution outcome, and either leaves
//! the row for the next tick (unconfirmed, or claim still failing) or
//! settles it (loss, refund, or claimed win) and deletes it.
//!
//! Failure policy: transport errors and not-found responses are
//! retried forever; a claim that was submitted is never submitted
//! again; no single bet's error stops the rest of the sweep; and
//! notification failures never touch ledger state.

use anyhow::{anyhow, bail, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::clients::{
    ContractCall, LedgerApi, LogQueryOutcome, NanoAction, NanoContractLogs, Notifier, WalletApi,
};
use crate::storage::BetLedger;
use crate::types::PendingBet;

/// Contract method invoked to claim a winning payout.
const CLAIM_METHOD: &str = "claim_balance";

/// Settlement-side settings.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    pub contract_id: String,
    pub token_id: String,
    /// Network name used to build explorer links ("mainnet", "testnet").
    pub network: String,
    pub poll_interval: Duration,
}

/// Classification of one execution-log query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    /// Not confirmed yet, or logs not available. Retry next tick.
    Unconfirmed,
    /// The contract call itself failed; funds were returned.
    ExecutionFailed,
    Lose,
    /// Winning payout in minor units.
    Win(u64),
}

/// Claim progress for a confirmed win, kept in memory so later sweeps
/// skip the log re-query and never submit a second claim.
#[derive(Debug, Clone)]
enum ClaimState {
    /// Win confirmed, claim not yet acknowledged.
    Unclaimed { payout: u64 },
    /// Claim acknowledged but the row could not be deleted yet.
    Claimed { payout: u64, claim_hash: String },
}

pub struct SettlementPoller<W, L, N> {
    wallet: Arc<W>,
    node: Arc<L>,
    notifier: Arc<N>,
    ledger: Arc<BetLedger>,
    cfg: SettlementConfig,
    claims: Mutex<HashMap<String, ClaimState>>,
}

impl<W, L, N> SettlementPoller<W, L, N>
where
    W: WalletApi,
    L: LedgerApi,
    N: Notifier,
{
    pub fn new(
        wallet: Arc<W>,
        node: Arc<L>,
        notifier: Arc<N>,
        ledger: Arc<BetLedger>,
        cfg: SettlementConfig,
    ) -> Self {
        Self {
            wallet,
            node,
            notifier,
            ledger,
            cfg,
            claims: Mutex::new(HashMap::new()),
        }
    }

    /// Run sweeps forever at the configured interval. The first sweep
    /// starts immediately; a sweep that overruns the interval delays
    /// the next tick instead of overlapping it.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.cfg.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.cfg.poll_interval.as_secs(),
            "Settlement poller started"
        );

        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }

    /// One full pass over the ledger, strictly sequential. Never fails:
    /// a bet that errors is logged and retried on the next sweep.
    pub async fn sweep(&self) {
        let bets = self.ledger.all();
        if bets.is_empty() {
            return;
        }

        info!(pending = bets.len(), "Checking pending bets");

        for bet in &bets {
            if let Err(e) = self.settle(bet).await {
                warn!(hash = %bet.hash, error = %e, "Bet left pending; will retry next sweep");
            }
        }
    }

    /// Drive one bet as far as it can go this sweep.
    async fn settle(&self, bet: &PendingBet) -> Result<()> {
        // A win already confirmed on an earlier sweep skips the log
        // re-query and goes straight to the claim retry.
        let claim_state = self.claims.lock().unwrap().get(&bet.hash).cloned();
        match claim_state {
            Some(ClaimState::Unclaimed { payout }) => return self.handle_win(bet, payout).await,
            Some(ClaimState::Claimed { payout, claim_hash }) => {
                return self.finish_win(bet, payout, &claim_hash).await
            }
            None => {}
        }

        debug!(hash = %bet.hash, "Querying execution log");

        let outcome = match self.node.execution_log(&bet.hash).await? {
            LogQueryOutcome::NotReady => Outcome::Unconfirmed,
            LogQueryOutcome::Response(logs) => classify(&logs),
        };

        match outcome {
            Outcome::Unconfirmed => {
                debug!(hash = %bet.hash, "Not confirmed yet");
                Ok(())
            }
            Outcome::ExecutionFailed => {
                info!(hash = %bet.hash, user_id = bet.user_id, "Bet execution failed, refunding");
                self.notify(
                    bet,
                    &format!(
                        "❌ Your dice bet execution failed and your funds have been returned.\nHash: {}",
                        bet.hash
                    ),
                )
                .await;
                self.ledger.remove(&bet.hash)?;
                Ok(())
            }
            Outcome::Lose => {
                info!(hash = %bet.hash, user_id = bet.user_id, "Bet lost");
                self.notify(
                    bet,
                    &format!(
                        "🎲 You lost your bet of **{} HTR**. Better luck next time!",
                        bet.stake
                    ),
                )
                .await;
                self.ledger.remove(&bet.hash)?;
                Ok(())
            }
            Outcome::Win(payout) => self.handle_win(bet, payout).await,
        }
    }

    /// Submit (or re-submit) the claim for a confirmed win.
    async fn handle_win(&self, bet: &PendingBet, payout: u64) -> Result<()> {
        match self.claim(&bet.address, payout).await {
            Ok(claim_hash) => {
                // Record the acknowledged claim before touching the
                // ledger so a failed delete can never claim twice.
                self.claims.lock().unwrap().insert(
                    bet.hash.clone(),
                    ClaimState::Claimed {
                        payout,
                        claim_hash: claim_hash.clone(),
                    },
                );
                self.finish_win(bet, payout, &claim_hash).await
            }
            Err(e) => {
                warn!(hash = %bet.hash, error = %e, "Claim submission failed, will retry");
                self.claims.lock().unwrap().insert(
                    bet.hash.clone(),
                    ClaimState::Unclaimed { payout },
                );
                self.notify(
                    bet,
                    &format!(
                        "⚠️ You won, but I failed to claim your winnings. Retrying shortly.\nError: {e}"
                    ),
                )
                .await;
                Ok(())
            }
        }
    }

    /// Terminal step for a claimed win: delete the row, tell the user.
    async fn finish_win(&self, bet: &PendingBet, payout: u64, claim_hash: &str) -> Result<()> {
        self.ledger.remove(&bet.hash)?;
        self.claims.lock().unwrap().remove(&bet.hash);

        let payout_htr = payout as f64 / 100.0;
        info!(
            hash = %bet.hash,
            user_id = bet.user_id,
            payout = format!("{payout_htr:.2} HTR"),
            claim_hash,
            "Bet won and claimed"
        );
        self.notify(
            bet,
            &format!(
                "🎉 **YOU WON!** Payout: **{payout_htr} HTR**.\n\nThis is the transaction claiming your winnings: [{claim_hash}]({})",
                self.explorer_url(claim_hash)
            ),
        )
        .await;

        Ok(())
    }

    /// Withdraw a payout to the winner's address.
    async fn claim(&self, address: &str, payout: u64) -> Result<String> {
        let call = ContractCall {
            contract_id: self.cfg.contract_id.clone(),
            method: CLAIM_METHOD.to_string(),
            caller: address.to_string(),
            args: Vec::new(),
            actions: vec![NanoAction::withdrawal(&self.cfg.token_id, payout, address)],
        };

        let result = self.wallet.submit_contract_call(&call).await?;
        if !result.success {
            bail!("{}", result.error_message());
        }
        result
            .hash
            .ok_or_else(|| anyhow!("wallet returned no claim hash"))
    }

    /// Best effort; a failed delivery is logged and the settlement
    /// proceeds regardless.
    async fn notify(&self, bet: &PendingBet, text: &str) {
        if let Err(e) = self.notifier.send(bet.user_id, bet.chat_id, text).await {
            warn!(user_id = bet.user_id, error = %e, "Failed to notify user");
        }
    }

    fn explorer_url(&self, hash: &str) -> String {
        format!(
            "https://explorer.{}.hathor.network/transaction/{hash}",
            self.cfg.network
        )
    }
}

/// Classify an execution-log response.
///
/// Anything short of a conclusive state stays `Unconfirmed`: an
/// unsuccessful query, or a confirmed call whose logs haven't been
/// indexed yet. A confirmed execution with a trace is conclusive —
/// either a positive payout event (win) or none (loss).
fn classify(logs: &NanoContractLogs) -> Outcome {
    if !logs.success {
        return Outcome::Unconfirmed;
    }
    if !logs.executed_ok() {
        return Outcome::ExecutionFailed;
    }
    if logs.first_trace().is_none() {
        return Outcome::Unconfirmed;
    }

    match logs.winning_payout() {
        Some(payout) => Outcome::Win(payout),
        None => Outcome::Lose,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn logs(json: &str) -> NanoContractLogs {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_classify_unsuccessful_query() {
        assert_eq!(classify(&logs(r#"{"success": false}"#)), Outcome::Unconfirmed);
    }

    #[test]
    fn test_classify_execution_failure() {
        assert_eq!(
            classify(&logs(r#"{"success": true, "nc_execution": "failure"}"#)),
            Outcome::ExecutionFailed
        );
        // Missing nc_execution after a successful query is also a
        // definitive failure signal per the node contract.
        assert_eq!(
            classify(&logs(r#"{"success": true}"#)),
            Outcome::ExecutionFailed
        );
    }

    #[test]
    fn test_classify_missing_trace_is_unconfirmed() {
        assert_eq!(
            classify(&logs(r#"{"success": true, "nc_execution": "success", "logs": {}}"#)),
            Outcome::Unconfirmed
        );
        assert_eq!(
            classify(&logs(
                r#"{"success": true, "nc_execution": "success", "logs": {"00aa": []}}"#
            )),
            Outcome::Unconfirmed
        );
    }

    #[test]
    fn test_classify_lose() {
        assert_eq!(
            classify(&logs(
                r#"{"success": true, "nc_execution": "success",
                    "logs": {"00aa": [{"logs": [{"type": "LOG", "key_values": {"roll": 60000}}]}]}}"#
            )),
            Outcome::Lose
        );
        // An empty event list on a confirmed execution is a loss too
        assert_eq!(
            classify(&logs(
                r#"{"success": true, "nc_execution": "success", "logs": {"00aa": [{"logs": []}]}}"#
            )),
            Outcome::Lose
        );
    }

    #[test]
    fn test_classify_win() {
        assert_eq!(
            classify(&logs(
                r#"{"success": true, "nc_execution": "success",
                    "logs": {"00aa": [{"logs": [{"type": "LOG", "key_values": {"payout": 1962}}]}]}}"#
            )),
            Outcome::Win(1962)
        );
    }

    #[test]
    fn test_classify_zero_payout_is_lose() {
        assert_eq!(
            classify(&logs(
                r#"{"success": true, "nc_execution": "success",
                    "logs": {"00aa": [{"logs": [{"type": "LOG", "key_values": {"payout": 0}}]}]}}"#
            )),
            Outcome::Lose
        );
    }
}
