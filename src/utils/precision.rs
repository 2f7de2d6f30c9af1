// src/utils/precision.rs
use rust_decimal::Decimal;

/// Floors a quantity DOWN to the nearest multiple of lot_size.
/// Example: size=10.999, lot=1.0 -> 10.0
pub fn floor_to_lot(size: Decimal, lot_size: Decimal) -> Decimal {
    if lot_size.is_zero() {
        return size;
    }
    (size / lot_size).floor() * lot_size
}

/// Rounds a price to the NEAREST multiple of tick_size, never truncates,
/// so rounding error does not systematically favor one side.
/// Example: price=100.16, tick=0.1 -> 100.2
pub fn round_to_tick(price: Decimal, tick_size: Decimal) -> Decimal {
    if tick_size.is_zero() {
        return price;
    }
    (price / tick_size).round() * tick_size
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn floors_quantity_to_lot() {
        assert_eq!(floor_to_lot(dec!(10.999), dec!(1)), dec!(10));
        assert_eq!(floor_to_lot(dec!(0.07), dec!(0.01)), dec!(0.07));
        assert_eq!(floor_to_lot(dec!(5), Decimal::ZERO), dec!(5));
    }

    #[test]
    fn rounds_price_to_nearest_tick() {
        assert_eq!(round_to_tick(dec!(100.16), dec!(0.1)), dec!(100.2));
        assert_eq!(round_to_tick(dec!(100.14), dec!(0.1)), dec!(100.1));
        // banker-unfriendly midpoint still lands on a tick multiple
        let rounded = round_to_tick(dec!(2020.004), dec!(0.01));
        assert_eq!(rounded, dec!(2020.00));
    }
}
