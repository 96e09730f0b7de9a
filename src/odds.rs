//! Odds calculation for the dice contract.
//!
//! Maps a requested payout multiplier or win chance to the integer
//! `threshold` the nano contract compares against its random draw,
//! under a fixed house edge. Pure functions, no I/O.
//!
//! The floor semantics here must stay bit-exact with the contract:
//! `threshold` is the literal value sent on-chain, so every formula
//! uses `f64` arithmetic followed by `floor()`, nothing cleverer.

use crate::types::{BetError, BetTarget, OddsResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Dice odds configuration.
#[derive(Debug, Clone)]
pub struct OddsConfig {
    /// Width of the on-chain random draw in bits. 16 ⇒ range 65536.
    pub bit_length: u32,
    /// House edge in basis points (190 = 1.9%).
    pub house_edge_basis_points: u32,
    /// Maximum payout multiplier a user may request.
    pub max_multiplier: f64,
    /// Lower bound applied to every threshold before submission.
    pub min_threshold: u64,
    /// Upper bound applied to every threshold before submission.
    pub max_threshold: u64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            bit_length: 16,
            house_edge_basis_points: 190,
            max_multiplier: 100.0,
            min_threshold: 1,
            max_threshold: 65535,
        }
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

pub struct OddsCalculator {
    cfg: OddsConfig,
}

impl OddsCalculator {
    pub fn new(cfg: OddsConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &OddsConfig {
        &self.cfg
    }

    /// `2^bit_length`, the size of the random draw space.
    fn range(&self) -> u64 {
        1u64 << self.cfg.bit_length
    }

    /// Win chance in percent implied by a threshold.
    fn win_chance_at(&self, threshold: u64) -> f64 {
        threshold as f64 * 100.0 / self.range() as f64
    }

    /// Payout multiplier implied by a threshold. `0.0` sentinel for a
    /// zero threshold (unreachable once clamping is applied).
    fn multiplier_at(&self, threshold: u64) -> f64 {
        if threshold == 0 {
            return 0.0;
        }
        let edge = self.cfg.house_edge_basis_points as f64;
        self.range() as f64 * (10_000.0 - edge) / (10_000.0 * threshold as f64)
    }

    /// Odds for a requested payout multiplier.
    ///
    /// `threshold = floor(range · (10000 − edge_bp) / (10000 · m))`
    pub fn from_multiplier(&self, multiplier: f64) -> Result<OddsResult, BetError> {
        if !multiplier.is_finite() || multiplier <= 1.0 {
            return Err(BetError::InvalidTarget(format!(
                "multiplier must be greater than 1, got {multiplier}"
            )));
        }
        if multiplier > self.cfg.max_multiplier {
            return Err(BetError::MultiplierTooHigh {
                max: self.cfg.max_multiplier,
            });
        }

        let edge = self.cfg.house_edge_basis_points as f64;
        let threshold =
            (self.range() as f64 * (10_000.0 - edge) / (10_000.0 * multiplier)).floor() as u64;

        Ok(OddsResult {
            multiplier,
            win_chance: self.win_chance_at(threshold),
            threshold,
        })
    }

    /// Odds for a requested win chance in percent.
    ///
    /// `threshold = floor(w · range / 100)`
    pub fn from_win_chance(&self, win_chance: f64) -> Result<OddsResult, BetError> {
        if !win_chance.is_finite() || win_chance <= 0.0 || win_chance >= 100.0 {
            return Err(BetError::InvalidTarget(format!(
                "win chance must be between 0 and 100 exclusive, got {win_chance}"
            )));
        }

        let threshold = (win_chance * self.range() as f64 / 100.0).floor() as u64;
        if threshold == 0 {
            return Err(BetError::DegenerateThreshold);
        }

        let multiplier = self.multiplier_at(threshold);
        if multiplier > self.cfg.max_multiplier {
            return Err(BetError::MultiplierTooHigh {
                max: self.cfg.max_multiplier,
            });
        }

        Ok(OddsResult {
            multiplier,
            win_chance,
            threshold,
        })
    }

    /// Clamp a threshold into `[min_threshold, max_threshold]` and
    /// recompute both display fields from the clamped value, so the
    /// triple stays mutually consistent.
    ///
    /// This is the authoritative last step before submission; the
    /// caller-chosen multiplier or win chance is advisory only.
    pub fn clamp(&self, threshold: u64) -> OddsResult {
        let clamped = threshold.clamp(self.cfg.min_threshold, self.cfg.max_threshold);

        OddsResult {
            multiplier: self.multiplier_at(clamped),
            win_chance: self.win_chance_at(clamped),
            threshold: clamped,
        }
    }

    /// Full pipeline for a bet target: dispatch, clamp, and re-check
    /// the multiplier cap on the clamped result. Clamping down to
    /// `max_threshold` can only lower the multiplier, but clamping up
    /// from below `min_threshold` never happens for valid targets; the
    /// re-check guards the `max_threshold`-lowered case where the
    /// recomputed multiplier rises above the cap.
    pub fn for_target(&self, target: BetTarget) -> Result<OddsResult, BetError> {
        let raw = match target {
            BetTarget::Multiplier(m) => self.from_multiplier(m)?,
            BetTarget::WinChance(w) => self.from_win_chance(w)?,
        };

        let clamped = self.clamp(raw.threshold);
        if clamped.multiplier > self.cfg.max_multiplier {
            return Err(BetError::MultiplierTooHigh {
                max: self.cfg.max_multiplier,
            });
        }

        Ok(clamped)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn calc() -> OddsCalculator {
        OddsCalculator::new(OddsConfig::default())
    }

    #[test]
    fn test_from_multiplier_2x() {
        // range=65536, edge=190bp: floor(65536·9810/20000) = 32145
        let odds = calc().from_multiplier(2.0).unwrap();
        assert_eq!(odds.threshold, 32145);
        assert!((odds.win_chance - 32145.0 * 100.0 / 65536.0).abs() < 1e-12);
        assert_eq!(odds.multiplier, 2.0);
    }

    #[test]
    fn test_from_win_chance_50_percent() {
        // floor(50·65536/100) = 32768; multiplier = 65536·9810/(10000·32768)
        let odds = calc().from_win_chance(50.0).unwrap();
        assert_eq!(odds.threshold, 32768);
        assert!((odds.multiplier - 1.96189).abs() < 1e-4);
        assert_eq!(odds.win_chance, 50.0);
    }

    #[test]
    fn test_from_multiplier_rejects_at_most_one() {
        assert!(matches!(
            calc().from_multiplier(1.0),
            Err(BetError::InvalidTarget(_))
        ));
        assert!(matches!(
            calc().from_multiplier(0.5),
            Err(BetError::InvalidTarget(_))
        ));
        assert!(matches!(
            calc().from_multiplier(f64::NAN),
            Err(BetError::InvalidTarget(_))
        ));
    }

    #[test]
    fn test_from_multiplier_rejects_over_cap() {
        assert!(matches!(
            calc().from_multiplier(100.5),
            Err(BetError::MultiplierTooHigh { .. })
        ));
        // Exactly at the cap is allowed
        assert!(calc().from_multiplier(100.0).is_ok());
    }

    #[test]
    fn test_from_win_chance_rejects_out_of_range() {
        for w in [0.0, -5.0, 100.0, 150.0, f64::INFINITY] {
            assert!(matches!(
                calc().from_win_chance(w),
                Err(BetError::InvalidTarget(_))
            ));
        }
    }

    #[test]
    fn test_from_win_chance_degenerate_threshold() {
        // 0.001% of 65536 floors to 0
        assert!(matches!(
            calc().from_win_chance(0.001),
            Err(BetError::DegenerateThreshold)
        ));
    }

    #[test]
    fn test_from_win_chance_derived_multiplier_over_cap() {
        // Tiny win chance ⇒ huge multiplier, above the 100x cap.
        // 0.01% of 65536 = 6.5 → threshold 6 → multiplier ≈ 10716x
        assert!(matches!(
            calc().from_win_chance(0.01),
            Err(BetError::MultiplierTooHigh { .. })
        ));
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let c = OddsCalculator::new(OddsConfig {
            min_threshold: 655,
            max_threshold: 58982,
            ..OddsConfig::default()
        });
        for t in [0, 1, 654, 655, 656, 32768, 58981, 58982, 60000, 65536, u64::MAX] {
            let once = c.clamp(t);
            let twice = c.clamp(once.threshold);
            assert_eq!(once, twice, "clamp not idempotent at t={t}");
        }
    }

    #[test]
    fn test_clamp_bounds() {
        let c = OddsCalculator::new(OddsConfig {
            min_threshold: 1000,
            max_threshold: 60000,
            ..OddsConfig::default()
        });

        let low = c.clamp(10);
        assert_eq!(low.threshold, 1000);
        let high = c.clamp(65000);
        assert_eq!(high.threshold, 60000);
        let mid = c.clamp(32768);
        assert_eq!(mid.threshold, 32768);

        // Display fields are recomputed from the clamped threshold
        assert!((low.win_chance - 1000.0 * 100.0 / 65536.0).abs() < 1e-12);
        assert!((low.multiplier - 65536.0 * 9810.0 / (10_000.0 * 1000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_clamp_zero_threshold_sentinel() {
        // Only reachable with a zero min_threshold configuration
        let c = OddsCalculator::new(OddsConfig {
            min_threshold: 0,
            ..OddsConfig::default()
        });
        let odds = c.clamp(0);
        assert_eq!(odds.threshold, 0);
        assert_eq!(odds.multiplier, 0.0);
        assert_eq!(odds.win_chance, 0.0);
    }

    #[test]
    fn test_flooring_never_favours_the_player() {
        // The threshold is floored, so the realised win chance can only
        // be at or below the chance implied by the requested multiplier,
        // and the implied multiplier at that threshold at or above it.
        let c = calc();
        for m in [1.01, 1.5, 1.962, 2.0, 3.3, 10.0, 25.0, 99.0, 100.0] {
            let odds = c.from_multiplier(m).unwrap();
            let implied_chance = 9810.0 / (100.0 * m); // percent, pre-floor
            assert!(
                odds.win_chance <= implied_chance + 1e-9,
                "win chance {} above implied {} at m={m}",
                odds.win_chance,
                implied_chance,
            );
            assert!(
                c.clamp(odds.threshold).multiplier >= m - 1e-9,
                "implied multiplier dropped below requested at m={m}",
            );
        }
    }

    #[test]
    fn test_win_chance_multiplier_round_trip() {
        // from_win_chance then from_multiplier on the derived multiplier
        // reproduces the threshold, modulo floor rounding at the boundary.
        let c = calc();
        for w in [1.0, 5.0, 12.5, 25.0, 49.03, 50.0, 66.6, 75.0, 90.0, 98.0] {
            let first = c.from_win_chance(w).unwrap();
            let second = c.from_multiplier(first.multiplier).unwrap();
            let diff = first.threshold.abs_diff(second.threshold);
            assert!(
                diff <= 1,
                "round trip drifted by {diff} at w={w} (t={} vs {})",
                first.threshold,
                second.threshold,
            );
        }
    }

    #[test]
    fn test_for_target_applies_clamp() {
        let c = OddsCalculator::new(OddsConfig {
            min_threshold: 35000,
            max_threshold: 60000,
            ..OddsConfig::default()
        });
        // 2x maps to 32145, below the floor → clamped up to 35000
        let odds = c.for_target(BetTarget::Multiplier(2.0)).unwrap();
        assert_eq!(odds.threshold, 35000);
        assert!((odds.multiplier - 65536.0 * 9810.0 / (10_000.0 * 35000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_for_target_revalidates_after_clamp() {
        // A cap tight enough that lowering the threshold to max_threshold
        // pushes the recomputed multiplier back over max_multiplier.
        let c = OddsCalculator::new(OddsConfig {
            max_multiplier: 1.5,
            min_threshold: 1,
            max_threshold: 40000,
            ..OddsConfig::default()
        });
        // 70% win chance → threshold 45875 → clamped to 40000 →
        // multiplier 65536·9810/(10000·40000) ≈ 1.607 > 1.5
        assert!(matches!(
            c.for_target(BetTarget::WinChance(70.0)),
            Err(BetError::MultiplierTooHigh { .. })
        ));
    }

    #[test]
    fn test_different_bit_length() {
        let c = OddsCalculator::new(OddsConfig {
            bit_length: 8,
            max_threshold: 255,
            ..OddsConfig::default()
        });
        // range=256: floor(256·9810/20000) = floor(125.568) = 125
        let odds = c.from_multiplier(2.0).unwrap();
        assert_eq!(odds.threshold, 125);
    }
}
