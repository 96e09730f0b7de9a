//! Bet intake validation and submission.
//!
//! Turns a `BetRequest` into a submitted contract call plus a pending
//! ledger row, or a rejection. The balance check is advisory only; the
//! wallet's acknowledgment is the sole source of truth on whether
//! funds moved, so a rejected submission never puts the stake at risk.

use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::clients::{ContractCall, NanoAction, WalletApi};
use crate::odds::OddsCalculator;
use crate::storage::{BetLedger, InsertError};
use crate::types::{BetError, BetReceipt, BetRequest, PendingBet};

/// Contract method invoked to place a bet.
const PLACE_BET_METHOD: &str = "place_bet";

/// Intake-side settings.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Nano-contract id of the dice game.
    pub contract_id: String,
    /// Token the game is played in.
    pub token_id: String,
    /// Maximum stake, in minor units.
    pub max_bet_minor_units: u64,
}

pub struct BetIntake<W: WalletApi> {
    wallet: Arc<W>,
    ledger: Arc<BetLedger>,
    odds: OddsCalculator,
    cfg: IntakeConfig,
}

impl<W: WalletApi> BetIntake<W> {
    pub fn new(
        wallet: Arc<W>,
        ledger: Arc<BetLedger>,
        odds: OddsCalculator,
        cfg: IntakeConfig,
    ) -> Self {
        Self {
            wallet,
            ledger,
            odds,
            cfg,
        }
    }

    /// Validate, submit, and record a bet.
    ///
    /// Checks run in a fixed order: pending-bet uniqueness, stake
    /// shape, stake ceiling, live balance, odds. Only then is the
    /// contract call submitted, and only an acknowledged submission
    /// creates a ledger row.
    pub async fn place_bet(&self, req: &BetRequest) -> Result<BetReceipt, BetError> {
        if self.ledger.live_bet_for(req.user_id).is_some() {
            return Err(BetError::AlreadyPending);
        }

        if req.stake.is_sign_negative() || req.stake.is_zero() || req.has_over_precision() {
            return Err(BetError::InvalidAmount);
        }

        let stake_minor = req.stake_minor_units().ok_or(BetError::InvalidAmount)?;
        if stake_minor == 0 {
            return Err(BetError::InvalidAmount);
        }
        if stake_minor > self.cfg.max_bet_minor_units {
            return Err(BetError::StakeTooLarge {
                max_htr: self.cfg.max_bet_minor_units as f64 / 100.0,
            });
        }

        // Advisory: prevents obviously-doomed submissions, races with
        // concurrent spends. The wallet has the final say at submit.
        let available = self
            .wallet
            .address_balance(&req.address, &self.cfg.token_id)
            .await
            .map_err(|e| BetError::Balance(e.to_string()))?;
        if stake_minor > available {
            return Err(BetError::InsufficientFunds {
                balance_htr: available as f64 / 100.0,
            });
        }

        let odds = self.odds.for_target(req.target)?;

        let call = ContractCall {
            contract_id: self.cfg.contract_id.clone(),
            method: PLACE_BET_METHOD.to_string(),
            caller: req.address.clone(),
            args: vec![
                serde_json::json!(stake_minor),
                serde_json::json!(odds.threshold),
            ],
            actions: vec![NanoAction::deposit(
                &self.cfg.token_id,
                stake_minor,
                &req.address,
            )],
        };

        let result = self
            .wallet
            .submit_contract_call(&call)
            .await
            .map_err(|e| BetError::Submission(e.to_string()))?;

        if !result.success {
            return Err(BetError::Submission(result.error_message()));
        }
        let hash = result
            .hash
            .ok_or_else(|| BetError::Submission("wallet returned no transaction hash".into()))?;

        let pending = PendingBet {
            hash: hash.clone(),
            user_id: req.user_id,
            chat_id: req.chat_id,
            address: req.address.clone(),
            stake: req.stake,
            placed_at: chrono::Utc::now(),
        };

        match self.ledger.insert(pending) {
            Ok(()) => {}
            Err(InsertError::UserHasLiveBet(_)) => {
                // Lost the check-then-act race against a concurrent
                // request from the same user; only the winner persists.
                warn!(user_id = req.user_id, hash, "Duplicate bet lost the insert race");
                return Err(BetError::AlreadyPending);
            }
            Err(e) => {
                // The bet is on-chain but untracked. Operator attention
                // needed; surface the hash so it can be settled by hand.
                error!(hash, error = %e, "Submitted bet could not be recorded");
                return Err(BetError::Submission(format!(
                    "bet submitted as {hash} but could not be recorded: {e}"
                )));
            }
        }

        let potential_payout = req.stake.to_f64().unwrap_or(0.0) * odds.multiplier;
        info!(
            user_id = req.user_id,
            hash,
            stake = %req.stake,
            threshold = odds.threshold,
            win_chance = format!("{:.2}%", odds.win_chance),
            multiplier = format!("{:.2}x", odds.multiplier),
            "Bet placed"
        );

        Ok(BetReceipt {
            hash,
            stake: req.stake,
            odds,
            potential_payout,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
