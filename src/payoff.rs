//! Expiration payoff model, shared by the payoff curve and trade settlement.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::types::{
    check_price, Action, OptionLeg, OptionType, Strategy, ValidationError, CONTRACT_MULTIPLIER,
};
use crate::utils::round_cents;

/// Samples per curve, inclusive of both ends.
pub const SAMPLE_COUNT: usize = 51;

const RANGE_LOW: Decimal = dec!(0.5);

/// P&L of one leg at expiration with the stock at `price`, in dollars.
pub fn leg_payoff(leg: &OptionLeg, price: Decimal) -> Decimal {
    let c = leg.contract();
    let intrinsic = match c.option_type() {
        OptionType::Call => (price - c.strike()).max(Decimal::ZERO),
        OptionType::Put => (c.strike() - price).max(Decimal::ZERO),
    };
    let exercise_value = intrinsic * CONTRACT_MULTIPLIER * leg.contracts();
    let premium = leg.fill_price() * CONTRACT_MULTIPLIER * leg.contracts();
    match leg.action() {
        Action::Buy => exercise_value - premium,
        Action::Sell => premium - exercise_value,
    }
}

/// Strategy P&L at expiration, rounded to cents.
pub fn payoff_at(legs: &[OptionLeg], price: Decimal) -> Decimal {
    round_cents(legs.iter().map(|leg| leg_payoff(leg, price)).sum())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PayoffPoint {
    pub price: Decimal,
    pub pnl: Decimal,
}

/// Evenly spaced expiration P&L over [0.5 P, 1.5 P] for current price P.
///
/// Holds no samples itself; every call to [`PayoffCurve::iter`] starts over
/// and yields the same [`SAMPLE_COUNT`] points.
#[derive(Debug, Clone, Copy)]
pub struct PayoffCurve<'a> {
    legs: &'a [OptionLeg],
    start: Decimal,
    step: Decimal,
}

impl<'a> PayoffCurve<'a> {
    pub fn new(strategy: &'a Strategy, current_price: Decimal) -> Result<Self, ValidationError> {
        check_price("current stock price", current_price)?;
        let intervals = Decimal::from(SAMPLE_COUNT - 1);
        Ok(Self {
            legs: strategy.legs(),
            start: current_price * RANGE_LOW,
            // Range width is exactly P.
            step: current_price / intervals,
        })
    }

    /// Distance between neighbouring sample prices.
    pub fn step(&self) -> Decimal {
        self.step
    }

    pub fn price_at(&self, index: usize) -> Decimal {
        self.start + self.step * Decimal::from(index)
    }

    pub fn iter(&self) -> PayoffSamples<'a> {
        PayoffSamples {
            curve: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for PayoffCurve<'a> {
    type Item = PayoffPoint;
    type IntoIter = PayoffSamples<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct PayoffSamples<'a> {
    curve: PayoffCurve<'a>,
    next: usize,
}

impl Iterator for PayoffSamples<'_> {
    type Item = PayoffPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= SAMPLE_COUNT {
            return None;
        }
        let price = self.curve.price_at(self.next);
        self.next += 1;
        Some(PayoffPoint {
            price,
            pnl: payoff_at(self.curve.legs, price),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = SAMPLE_COUNT.saturating_sub(self.next);
        (left, Some(left))
    }
}

impl ExactSizeIterator for PayoffSamples<'_> {}

/// Collected curve, for callers that want an owned series.
pub fn generate_payoff_curve(
    strategy: &Strategy,
    current_price: Decimal,
) -> Result<Vec<PayoffPoint>, ValidationError> {
    Ok(PayoffCurve::new(strategy, current_price)?.iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_strategy_metrics;
    use crate::types::fixtures::*;

    #[test]
    fn per_leg_formulas() {
        let long_call = leg(Action::Buy, OptionType::Call, dec!(150), dec!(8.50), dec!(8.70));
        assert_eq!(leg_payoff(&long_call, dec!(140)), dec!(-870));
        assert_eq!(leg_payoff(&long_call, dec!(170)), dec!(1130));

        let long_put = leg(Action::Buy, OptionType::Put, dec!(150), dec!(9.50), dec!(9.70));
        assert_eq!(leg_payoff(&long_put, dec!(160)), dec!(-970));
        assert_eq!(leg_payoff(&long_put, dec!(130)), dec!(1030));

        let short_call = leg(Action::Sell, OptionType::Call, dec!(155), dec!(6.80), dec!(7.00));
        assert_eq!(leg_payoff(&short_call, dec!(150)), dec!(680));
        assert_eq!(leg_payoff(&short_call, dec!(165)), dec!(-320));

        let short_put = leg(Action::Sell, OptionType::Put, dec!(140), dec!(5.20), dec!(5.40));
        assert_eq!(leg_payoff(&short_put, dec!(150)), dec!(520));
        assert_eq!(leg_payoff(&short_put, dec!(130)), dec!(-480));
    }

    #[test]
    fn curve_spans_half_to_one_and_a_half_times_price() {
        let s = long_call();
        let points = generate_payoff_curve(&s, dec!(150)).unwrap();
        assert_eq!(points.len(), SAMPLE_COUNT);
        assert_eq!(points[0].price, dec!(75));
        assert_eq!(points[SAMPLE_COUNT - 1].price, dec!(225));
        assert_eq!(points[1].price - points[0].price, dec!(3));
        assert_eq!(points[0].pnl, dec!(-870.00));
        assert_eq!(points[SAMPLE_COUNT - 1].pnl, dec!(6630.00));
    }

    #[test]
    fn spread_curve_stays_within_bounds() {
        let s = bull_call_spread();
        let points = generate_payoff_curve(&s, dec!(150)).unwrap();
        let min = points.iter().map(|p| p.pnl).min().unwrap();
        let max = points.iter().map(|p| p.pnl).max().unwrap();
        assert_eq!(min, dec!(-540.00));
        assert_eq!(max, dec!(460.00));
    }

    #[test]
    fn curve_is_restartable_and_idempotent() {
        let s = bear_put_spread();
        let curve = PayoffCurve::new(&s, dec!(147.35)).unwrap();
        let first: Vec<_> = curve.iter().collect();
        let second: Vec<_> = curve.iter().collect();
        assert_eq!(first, second);
        assert_eq!(first, generate_payoff_curve(&s, dec!(147.35)).unwrap());

        let mut it = curve.iter();
        assert_eq!(it.len(), SAMPLE_COUNT);
        it.next();
        assert_eq!(it.len(), SAMPLE_COUNT - 1);
        assert_eq!(it.count(), SAMPLE_COUNT - 1);
    }

    #[test]
    fn non_positive_price_rejected() {
        let s = long_call();
        assert!(matches!(
            PayoffCurve::new(&s, Decimal::ZERO),
            Err(ValidationError::NonPositivePrice { .. })
        ));
        assert!(generate_payoff_curve(&s, dec!(-1)).is_err());
        assert!(matches!(
            PayoffCurve::new(&s, dec!(2000000)),
            Err(ValidationError::PriceTooLarge { .. })
        ));
    }

    #[test]
    fn payoff_is_zero_at_breakeven() {
        let bear_call = strategy(vec![
            leg(Action::Sell, OptionType::Call, dec!(145), dec!(12.00), dec!(12.20)),
            leg(Action::Buy, OptionType::Call, dec!(155), dec!(6.80), dec!(7.00)),
        ]);
        let short_put = strategy(vec![leg(Action::Sell, OptionType::Put, dec!(140), dec!(5.20), dec!(5.40))]);
        let short_call = strategy(vec![leg(Action::Sell, OptionType::Call, dec!(155), dec!(6.80), dec!(7.00))]);
        let long_put = strategy(vec![leg(Action::Buy, OptionType::Put, dec!(150), dec!(9.50), dec!(9.70))]);

        for s in [
            bull_call_spread(),
            bear_put_spread(),
            bull_put_spread(),
            bear_call,
            long_call(),
            long_put,
            short_call,
            short_put,
        ] {
            let m = calculate_strategy_metrics(&s).unwrap();
            let be = m.breakeven_points()[0];
            assert_eq!(payoff_at(s.legs(), be), Decimal::ZERO, "breakeven {be} for {s:?}");
        }
    }

    #[test]
    fn sample_nearest_breakeven_is_within_one_step_of_zero() {
        for (s, price) in [
            (bull_call_spread(), dec!(150)),
            (bear_put_spread(), dec!(143.20)),
            (bull_put_spread(), dec!(151.75)),
            (long_call(), dec!(149.10)),
        ] {
            let be = calculate_strategy_metrics(&s).unwrap().breakeven_points()[0];
            let curve = PayoffCurve::new(&s, price).unwrap();
            let nearest = curve
                .iter()
                .min_by_key(|p| (p.price - be).abs())
                .unwrap();
            let slope = CONTRACT_MULTIPLIER * s.legs()[0].contracts();
            assert!(
                nearest.pnl.abs() <= curve.step() * slope,
                "pnl {} at {} too far from zero",
                nearest.pnl,
                nearest.price
            );
        }
    }
}
