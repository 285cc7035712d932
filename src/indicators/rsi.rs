use rust_decimal::Decimal;

/// Lookback used for every RSI shown on the dashboard.
pub const DEFAULT_RSI_PERIOD: usize = 14;

/// Neutral reading returned while there is not enough history.
pub const NEUTRAL_RSI: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Simple-average RSI over the last `period` price changes.
///
/// Needs `period + 1` closes; anything shorter reads as neutral (50).
/// A window without any losing change reads as 100.
pub fn rsi(closes: &[Decimal], period: usize) -> Decimal {
    if period == 0 || closes.len() < period + 1 {
        return NEUTRAL_RSI;
    }

    let window = &closes[closes.len() - (period + 1)..];
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;

    for pair in window.windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let period_dec = Decimal::from(period as u32);
    let avg_gain = gains / period_dec;
    let avg_loss = losses / period_dec;

    if avg_loss.is_zero() {
        return Decimal::ONE_HUNDRED;
    }

    let rs = avg_gain / avg_loss;
    Decimal::ONE_HUNDRED - (Decimal::ONE_HUNDRED / (Decimal::ONE + rs))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsiZone {
    Oversold,
    BearishNeutral,
    BullishNeutral,
    Overbought,
}

impl RsiZone {
    pub fn of(value: Decimal) -> Self {
        if value < Decimal::from(30) {
            RsiZone::Oversold
        } else if value > Decimal::from(70) {
            RsiZone::Overbought
        } else if value < Decimal::from(50) {
            RsiZone::BearishNeutral
        } else {
            RsiZone::BullishNeutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rising(n: usize) -> Vec<Decimal> {
        (0..n).map(|i| Decimal::from(100 + i as u32)).collect()
    }

    #[test]
    fn test_insufficient_history_is_neutral() {
        assert_eq!(rsi(&[], 14), dec!(50));
        assert_eq!(rsi(&rising(14), 14), dec!(50));
    }

    #[test]
    fn test_no_losses_is_100() {
        assert_eq!(rsi(&rising(15), 14), dec!(100));
        assert_eq!(rsi(&rising(40), 14), dec!(100));

        let flat = vec![dec!(10); 15];
        assert_eq!(rsi(&flat, 14), dec!(100));
    }

    #[test]
    fn test_closed_form() {
        // +2 then -1: avg gain 1, avg loss 0.5, rs 2 -> 100 - 100/3
        let value = rsi(&[dec!(10), dec!(12), dec!(11)], 2);
        assert_eq!(value.round_dp(4), dec!(66.6667));
    }

    #[test]
    fn test_uses_most_recent_window() {
        let value = rsi(&[dec!(100), dec!(50), dec!(10), dec!(12), dec!(11)], 2);
        assert_eq!(value.round_dp(4), dec!(66.6667));
    }

    #[test]
    fn test_all_falling_is_zero() {
        let falling: Vec<Decimal> = (0..15).map(|i| Decimal::from(200 - i)).collect();
        assert_eq!(rsi(&falling, 14), Decimal::ZERO);
    }

    #[test]
    fn test_zones() {
        assert_eq!(RsiZone::of(dec!(25)), RsiZone::Oversold);
        assert_eq!(RsiZone::of(dec!(45)), RsiZone::BearishNeutral);
        assert_eq!(RsiZone::of(dec!(50)), RsiZone::BullishNeutral);
        assert_eq!(RsiZone::of(dec!(75)), RsiZone::Overbought);
        assert_eq!(RsiZone::of(dec!(70)), RsiZone::BullishNeutral);
        assert_eq!(RsiZone::of(dec!(30)), RsiZone::BearishNeutral);
    }
}
