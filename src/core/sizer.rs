// src/core/sizer.rs
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{Result, SentinelError};
use crate::types::{Balance, ContractSpec, Sizing};
use crate::utils::precision::floor_to_lot;

/// Computes order size for a notional budget of `available * leverage`.
///
/// Feasibility demands strict margin headroom: an attempt whose required
/// margin consumes the entire available balance leaves nothing for taker
/// fee or funding and is treated as infeasible. Exactly one degrade step:
/// retry once at the fallback leverage with the notional target halved,
/// then fail with InsufficientFunds. Size is floored to lot but never
/// below one lot, so it is never zero or negative.
pub fn size_order(
    balance: &Balance,
    price: Decimal,
    contract: &ContractSpec,
    preferred_leverage: u32,
    fallback_leverage: u32,
) -> Result<Sizing> {
    if price <= Decimal::ZERO {
        return Err(SentinelError::InvalidPrice(price));
    }

    let preferred = preferred_leverage.min(contract.max_leverage);
    let fallback = fallback_leverage.min(contract.max_leverage);

    if let Some(sizing) = attempt(balance.available, price, contract, preferred, Decimal::ONE) {
        return Ok(sizing);
    }
    debug!(
        leverage = preferred,
        "preferred leverage infeasible, degrading"
    );
    if let Some(sizing) = attempt(balance.available, price, contract, fallback, Decimal::TWO) {
        return Ok(sizing);
    }

    // Report the margin the cheapest attempt would have needed.
    let required = minimal_margin(price, contract, fallback);
    Err(SentinelError::InsufficientFunds {
        required,
        available: balance.available,
    })
}

fn attempt(
    available: Decimal,
    price: Decimal,
    contract: &ContractSpec,
    leverage: u32,
    budget_divisor: Decimal,
) -> Option<Sizing> {
    if leverage == 0 || price <= Decimal::ZERO {
        return None;
    }
    let leverage_dec = Decimal::from(leverage);
    let unit_value = price * contract.multiplier;
    if unit_value <= Decimal::ZERO {
        return None;
    }

    let budget = available * leverage_dec / budget_divisor;
    let size = floor_to_lot(budget / unit_value, contract.lot_size).max(contract.lot_size);
    let notional = size * unit_value;
    let required_margin = notional / leverage_dec;

    if required_margin >= available {
        return None;
    }
    Some(Sizing {
        leverage,
        size,
        notional,
        required_margin,
    })
}

fn minimal_margin(price: Decimal, contract: &ContractSpec, leverage: u32) -> Decimal {
    contract.lot_size * price * contract.multiplier / Decimal::from(leverage.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contract() -> ContractSpec {
        ContractSpec {
            symbol: "ETHUSDTM".to_string(),
            multiplier: dec!(0.001),
            lot_size: dec!(1),
            max_leverage: 20,
            tick_size: dec!(0.01),
        }
    }

    fn balance(available: Decimal) -> Balance {
        Balance {
            available,
            committed_margin: Decimal::ZERO,
        }
    }

    #[test]
    fn falls_back_when_preferred_margin_consumes_balance() {
        // Preferred 10x on 100 USDT at 2000: 500 contracts at exactly 100
        // margin, no headroom. Fallback 5x with halved budget: 125
        // contracts, margin 50.
        let sizing = size_order(&balance(dec!(100)), dec!(2000), &contract(), 10, 5).unwrap();

        assert_eq!(sizing.leverage, 5);
        assert_eq!(sizing.size, dec!(125));
        assert!(sizing.required_margin <= dec!(100));
        assert!(sizing.size > Decimal::ZERO);
    }

    #[test]
    fn preferred_leverage_used_when_it_fits() {
        // Lot flooring leaves margin headroom at the preferred leverage.
        let sizing = size_order(&balance(dec!(1000)), dec!(2001), &contract(), 5, 3).unwrap();
        assert_eq!(sizing.leverage, 5);
        assert_eq!(sizing.size, dec!(2498));
        assert!(sizing.required_margin < dec!(1000));
    }

    #[test]
    fn leverage_capped_at_contract_max() {
        let sizing = size_order(&balance(dec!(1000)), dec!(2001), &contract(), 50, 5).unwrap();
        assert_eq!(sizing.leverage, 20);
    }

    #[test]
    fn dust_balance_is_insufficient_funds() {
        // One lot needs 0.4 USDT margin at 5x; only 0.1 available.
        let err = size_order(&balance(dec!(0.1)), dec!(2000), &contract(), 10, 5).unwrap_err();
        match err {
            SentinelError::InsufficientFunds {
                required,
                available,
            } => {
                assert!(required > available);
                assert!(required > Decimal::ZERO);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[test]
    fn size_never_below_lot() {
        // Halved fallback budget floors to two lots, not zero.
        let sizing = size_order(&balance(dec!(10)), dec!(2000), &contract(), 1, 1).unwrap();
        assert!(sizing.size >= dec!(1));
        assert_eq!(sizing.size, dec!(2));
    }
}
