// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Underwriting Helper
//!
//! Pure arithmetic deriving the max-offer amount and deal score from a lead's
//! financial inputs. Outputs are never user-set; the lead aggregate recomputes
//! them whenever any input changes.
//!
//! | Output | Formula |
//! |--------|---------|
//! | `max_offer_amount` | `arv × multiplier − repairs − fee` |
//! | `deal_score` | `clamp(round(200 × (arv − all_in) / arv), 0, 100)` |
//!
//! `all_in` is the purchase price (offer price when set, else max-offer) plus
//! estimated repairs.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INVESTOR_MULTIPLIER: Decimal = dec!(0.70);
pub const DEFAULT_DESIRED_FEE: Decimal = dec!(10000);

const SCORE_SCALE: Decimal = dec!(200);
const MAX_SCORE: Decimal = dec!(100);

/// Financial inputs of a lead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderwritingInputs {
    /// After-repair value
    pub arv: Option<Decimal>,
    pub estimated_repairs: Option<Decimal>,
    pub investor_multiplier: Decimal,
    pub desired_fee: Decimal,
    pub offer_price: Option<Decimal>,
}

impl Default for UnderwritingInputs {
    fn default() -> Self {
        Self {
            arv: None,
            estimated_repairs: None,
            investor_multiplier: DEFAULT_INVESTOR_MULTIPLIER,
            desired_fee: DEFAULT_DESIRED_FEE,
            offer_price: None,
        }
    }
}

/// Derived outputs, a pure function of [`UnderwritingInputs`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderwritingOutputs {
    pub max_offer_amount: Option<Decimal>,
    pub deal_score: Option<u8>,
}

pub fn compute_underwriting(inputs: &UnderwritingInputs) -> UnderwritingOutputs {
    let repairs = inputs.estimated_repairs.unwrap_or(Decimal::ZERO);

    let max_offer_amount = inputs
        .arv
        .map(|arv| arv * inputs.investor_multiplier - repairs - inputs.desired_fee);

    let deal_score = match inputs.arv {
        Some(arv) if arv > Decimal::ZERO => inputs
            .offer_price
            .or(max_offer_amount)
            .map(|purchase| score_spread(arv, purchase + repairs)),
        _ => None,
    };

    UnderwritingOutputs {
        max_offer_amount,
        deal_score,
    }
}

fn score_spread(arv: Decimal, all_in: Decimal) -> u8 {
    let raw = (SCORE_SCALE * (arv - all_in) / arv).round();
    raw.clamp(Decimal::ZERO, MAX_SCORE).to_u8().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(arv: Option<Decimal>, repairs: Option<Decimal>) -> UnderwritingInputs {
        UnderwritingInputs {
            arv,
            estimated_repairs: repairs,
            ..UnderwritingInputs::default()
        }
    }

    #[test]
    fn test_max_offer_with_defaults() {
        let out = compute_underwriting(&inputs(Some(dec!(300000)), Some(dec!(40000))));
        assert_eq!(out.max_offer_amount, Some(dec!(160000)));
    }

    #[test]
    fn test_no_arv_yields_no_outputs() {
        let out = compute_underwriting(&inputs(None, Some(dec!(40000))));
        assert_eq!(out, UnderwritingOutputs::default());
    }

    #[test]
    fn test_missing_repairs_treated_as_zero() {
        let out = compute_underwriting(&inputs(Some(dec!(100000)), None));
        assert_eq!(out.max_offer_amount, Some(dec!(60000)));
    }

    #[test]
    fn test_score_uses_offer_price_when_set() {
        let mut i = inputs(Some(dec!(300000)), Some(dec!(40000)));
        // all-in 200000 -> spread ratio 1/3 -> 67
        assert_eq!(compute_underwriting(&i).deal_score, Some(67));

        i.offer_price = Some(dec!(250000));
        // all-in 290000 -> spread ratio 1/30 -> 7
        assert_eq!(compute_underwriting(&i).deal_score, Some(7));
    }

    #[test]
    fn test_score_is_clamped() {
        let mut i = inputs(Some(dec!(100000)), Some(dec!(50000)));
        i.offer_price = Some(dec!(90000));
        assert_eq!(compute_underwriting(&i).deal_score, Some(0));

        i.offer_price = Some(dec!(0));
        i.estimated_repairs = None;
        assert_eq!(compute_underwriting(&i).deal_score, Some(100));
    }

    #[test]
    fn test_zero_arv_has_no_score() {
        let out = compute_underwriting(&inputs(Some(Decimal::ZERO), None));
        assert_eq!(out.deal_score, None);
        assert_eq!(out.max_offer_amount, Some(dec!(-10000)));
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let i = inputs(Some(dec!(275000)), Some(dec!(31500)));
        assert_eq!(compute_underwriting(&i), compute_underwriting(&i));
    }
}
