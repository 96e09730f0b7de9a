//! Shared types for the dice settlement engine.
//!
//! These types form the data model used across all modules. They are
//! designed to be stable so that client, odds, and engine modules can
//! depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Bet request
// ---------------------------------------------------------------------------

/// What the user asked for: a payout multiplier or a win chance.
/// Exactly one is supplied per bet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BetTarget {
    /// Desired payout multiplier, must be > 1.
    Multiplier(f64),
    /// Desired win chance in percent, exclusive (0, 100).
    WinChance(f64),
}

impl fmt::Display for BetTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetTarget::Multiplier(m) => write!(f, "{m}x"),
            BetTarget::WinChance(w) => write!(f, "{w}%"),
        }
    }
}

/// A bet as requested by a user, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    /// Telegram user id of the requester.
    pub user_id: i64,
    /// Chat the request came from; `None` for direct messages.
    pub chat_id: Option<i64>,
    /// The user's deposit/claim address.
    pub address: String,
    /// Stake in HTR, at most 2 decimal places.
    pub stake: Decimal,
    pub target: BetTarget,
}

impl BetRequest {
    /// Stake converted to integer minor units (2 decimal places, floored).
    /// Returns `None` for negative or absurdly large stakes.
    pub fn stake_minor_units(&self) -> Option<u64> {
        // checked_mul: stakes near Decimal::MAX would overflow the
        // scaling step before any range check can run.
        self.stake.checked_mul(Decimal::ONE_HUNDRED)?.floor().to_u64()
    }

    /// Whether the stake carries more than 2 decimal digits.
    pub fn has_over_precision(&self) -> bool {
        self.stake.normalize().scale() > 2
    }
}

// ---------------------------------------------------------------------------
// Odds
// ---------------------------------------------------------------------------

/// A consistent (multiplier, win chance, threshold) triple.
///
/// Always produced from a clamped threshold, so the three fields are
/// never mutually stale. `threshold` is the literal value sent
/// on-chain; the floats are display-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsResult {
    /// Payout multiplier; `0.0` sentinel only when `threshold == 0`.
    pub multiplier: f64,
    /// Win chance in percent.
    pub win_chance: f64,
    /// Integer cutoff in `[0, 2^bit_length]` compared against the
    /// on-chain random draw.
    pub threshold: u64,
}

impl fmt::Display for OddsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}% @ {:.2}x (threshold {})",
            self.win_chance, self.multiplier, self.threshold,
        )
    }
}

// ---------------------------------------------------------------------------
// Pending bet (persistent)
// ---------------------------------------------------------------------------

/// A submitted bet awaiting settlement. Keyed by transaction hash in
/// the bet ledger; at most one live row per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBet {
    /// Transaction hash of the `place_bet` call. Primary key.
    pub hash: String,
    pub user_id: i64,
    /// Notification routing target; falls back to `user_id` when absent.
    pub chat_id: Option<i64>,
    /// The user's deposit/claim address.
    pub address: String,
    /// Stake in HTR.
    pub stake: Decimal,
    pub placed_at: DateTime<Utc>,
}

impl fmt::Display for PendingBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bet {} by user {} ({} HTR)",
            self.hash, self.user_id, self.stake,
        )
    }
}

// ---------------------------------------------------------------------------
// Intake receipt
// ---------------------------------------------------------------------------

/// Returned to the caller after a bet is accepted and submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetReceipt {
    pub hash: String,
    pub stake: Decimal,
    pub odds: OddsResult,
    /// Stake × multiplier, in HTR.
    pub potential_payout: f64,
}

impl fmt::Display for BetReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} HTR at {} → up to {:.2} HTR [{}]",
            self.stake, self.odds, self.potential_payout, self.hash,
        )
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rejection reasons surfaced at bet intake. All variants are
/// user-recoverable; none leaves a row in the ledger.
#[derive(Debug, thiserror::Error)]
pub enum BetError {
    #[error("you already have a pending bet; wait for the result")]
    AlreadyPending,

    #[error("invalid bet amount: must be positive with at most 2 decimal places")]
    InvalidAmount,

    #[error("bet amount too high: maximum bet is {max_htr:.2} HTR")]
    StakeTooLarge { max_htr: f64 },

    #[error("insufficient funds: your balance is {balance_htr:.2} HTR")]
    InsufficientFunds { balance_htr: f64 },

    #[error("multiplier too high: maximum allowed is {max}x")]
    MultiplierTooHigh { max: f64 },

    #[error("win chance too low: it maps to a zero threshold")]
    DegenerateThreshold,

    #[error("invalid target: {0}")]
    InvalidTarget(String),

    #[error("failed to check balance: {0}")]
    Balance(String),

    #[error("transaction submission failed: {0}")]
    Submission(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
