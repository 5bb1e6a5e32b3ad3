//! Strategy metrics: net premium, profit/loss bounds, breakevens, margin and return on margin.
//!
//! Money results are dollars (per-share quote x 100 x quantity). Breakevens are
//! per-share stock prices. Unlimited profit or loss is reported as [`UNBOUNDED`](crate::types::UNBOUNDED).

use rust_decimal::Decimal;

use crate::types::{
    Action, Bound, OptionLeg, OptionType, Strategy, StrategyMetrics, ValidationError,
    CONTRACT_MULTIPLIER, MAX_LEGS,
};
use crate::utils::round_cents;

/// Leg layouts the calculator understands.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Shape<'a> {
    Single(&'a OptionLeg),
    /// Same type, opposite actions, different strikes, equal quantity.
    Vertical {
        option_type: OptionType,
        lower: &'a OptionLeg,
        upper: &'a OptionLeg,
        contracts: Decimal,
    },
}

pub(crate) fn classify(legs: &[OptionLeg]) -> Result<Shape<'_>, ValidationError> {
    match legs {
        [] => Err(ValidationError::NoLegs),
        [leg] => Ok(Shape::Single(leg)),
        [a, b] => {
            let (ca, cb) = (a.contract(), b.contract());
            if ca.option_type() != cb.option_type() {
                return Err(ValidationError::UnsupportedShape(
                    "legs mix a call and a put (straddle/strangle)",
                ));
            }
            if a.action() == b.action() {
                return Err(ValidationError::UnsupportedShape(
                    "both legs buy or both legs sell",
                ));
            }
            if ca.strike() == cb.strike() {
                return Err(ValidationError::UnsupportedShape("legs share the same strike"));
            }
            if a.quantity() != b.quantity() {
                return Err(ValidationError::UnsupportedShape(
                    "legs have different quantities (ratio spread)",
                ));
            }
            if ca.expiration() != cb.expiration() {
                return Err(ValidationError::UnsupportedShape(
                    "legs expire on different dates (calendar spread)",
                ));
            }
            let (lower, upper) = if ca.strike() < cb.strike() { (a, b) } else { (b, a) };
            Ok(Shape::Vertical {
                option_type: ca.option_type(),
                lower,
                upper,
                contracts: a.contracts(),
            })
        }
        more => Err(ValidationError::TooManyLegs(more.len())),
    }
}

/// Dollar value of the distance between the strikes.
fn spread_value(lower: &OptionLeg, upper: &OptionLeg, contracts: Decimal) -> Decimal {
    (upper.contract().strike() - lower.contract().strike()) * CONTRACT_MULTIPLIER * contracts
}

/// Sum of signed leg premiums, rounded to cents. Positive = credit.
pub fn calculate_net_premium(legs: &[OptionLeg]) -> Result<Decimal, ValidationError> {
    if legs.is_empty() {
        return Err(ValidationError::NoLegs);
    }
    if legs.len() > MAX_LEGS {
        return Err(ValidationError::TooManyLegs(legs.len()));
    }
    Ok(round_cents(legs.iter().map(OptionLeg::premium).sum()))
}

fn profit_bound(legs: &[OptionLeg], net_premium: Decimal) -> Result<Bound, ValidationError> {
    Ok(match classify(legs)? {
        Shape::Single(leg) => {
            let c = leg.contract();
            match (leg.action(), c.option_type()) {
                (Action::Buy, OptionType::Call) => Bound::Unbounded,
                // Stock can fall no further than zero.
                (Action::Buy, OptionType::Put) => Bound::Limited(
                    (c.strike() * CONTRACT_MULTIPLIER * leg.contracts() - net_premium.abs())
                        .max(Decimal::ZERO),
                ),
                (Action::Sell, _) => Bound::Limited(net_premium),
            }
        }
        Shape::Vertical {
            lower,
            upper,
            contracts,
            ..
        } => Bound::Limited(if net_premium >= Decimal::ZERO {
            net_premium
        } else {
            spread_value(lower, upper, contracts) - net_premium.abs()
        }),
    })
}

fn loss_bound(legs: &[OptionLeg], net_premium: Decimal) -> Result<Bound, ValidationError> {
    Ok(match classify(legs)? {
        Shape::Single(leg) => {
            let c = leg.contract();
            match (leg.action(), c.option_type()) {
                (Action::Buy, _) => Bound::Limited(net_premium.abs()),
                (Action::Sell, OptionType::Call) => Bound::Unbounded,
                (Action::Sell, OptionType::Put) => Bound::Limited(
                    (c.strike() * CONTRACT_MULTIPLIER * leg.contracts() - net_premium)
                        .max(Decimal::ZERO),
                ),
            }
        }
        Shape::Vertical {
            lower,
            upper,
            contracts,
            ..
        } => Bound::Limited(if net_premium >= Decimal::ZERO {
            spread_value(lower, upper, contracts) - net_premium
        } else {
            net_premium.abs()
        }),
    })
}

/// Max profit in dollars, or [`UNBOUNDED`](crate::types::UNBOUNDED) for a long call.
pub fn calculate_max_profit(legs: &[OptionLeg]) -> Result<Decimal, ValidationError> {
    let net_premium = calculate_net_premium(legs)?;
    Ok(profit_bound(legs, net_premium)?.amount())
}

/// Max loss in dollars, or [`UNBOUNDED`](crate::types::UNBOUNDED) for a short call.
pub fn calculate_max_loss(legs: &[OptionLeg]) -> Result<Decimal, ValidationError> {
    let net_premium = calculate_net_premium(legs)?;
    Ok(loss_bound(legs, net_premium)?.amount())
}

/// Stock price at expiration where the position nets zero.
///
/// Calls break even above the anchor strike and puts below it, by the per-share
/// premium. This holds for long and short single legs and for credit and debit
/// verticals alike, so the sign of the premium never flips the direction.
pub(crate) fn breakeven_price(
    anchor: Decimal,
    option_type: OptionType,
    net_premium: Decimal,
    contracts: Decimal,
) -> Decimal {
    let per_share = net_premium.abs() / (CONTRACT_MULTIPLIER * contracts);
    round_cents(match option_type {
        OptionType::Call => anchor + per_share,
        OptionType::Put => anchor - per_share,
    })
}

/// One breakeven for every supported shape. The anchor is the strike for a
/// single leg, the lower strike for call spreads and the higher for put spreads.
pub fn calculate_breakeven_points(
    legs: &[OptionLeg],
    net_premium: Decimal,
) -> Result<Vec<Decimal>, ValidationError> {
    let (anchor, option_type, contracts) = match classify(legs)? {
        Shape::Single(leg) => (
            leg.contract().strike(),
            leg.contract().option_type(),
            leg.contracts(),
        ),
        Shape::Vertical {
            option_type: OptionType::Call,
            lower,
            contracts,
            ..
        } => (lower.contract().strike(), OptionType::Call, contracts),
        Shape::Vertical {
            option_type: OptionType::Put,
            upper,
            contracts,
            ..
        } => (upper.contract().strike(), OptionType::Put, contracts),
    };
    Ok(vec![breakeven_price(anchor, option_type, net_premium, contracts)])
}

fn margin_bound(legs: &[OptionLeg], net_premium: Decimal, max_loss: Bound) -> Result<Bound, ValidationError> {
    let collects_credit = match classify(legs)? {
        Shape::Single(leg) => leg.action() == Action::Sell,
        Shape::Vertical { .. } => net_premium >= Decimal::ZERO,
    };
    Ok(if collects_credit {
        max_loss
    } else {
        Bound::Limited(net_premium.abs())
    })
}

/// Credit spreads and naked shorts tie up their max loss; debits and longs tie up the premium paid.
pub fn calculate_margin_requirement(
    legs: &[OptionLeg],
    net_premium: Decimal,
    max_loss: Decimal,
) -> Result<Decimal, ValidationError> {
    Ok(margin_bound(legs, net_premium, Bound::from_amount(max_loss))?.amount())
}

fn return_on_bounds(max_profit: Bound, margin: Bound) -> Decimal {
    match (max_profit, margin) {
        (Bound::Limited(profit), Bound::Limited(margin)) if margin > Decimal::ZERO => {
            round_cents(profit * Decimal::ONE_HUNDRED / margin)
        }
        _ => Decimal::ZERO,
    }
}

/// Percentage return on margin, or zero when either side is the unbounded sentinel or margin is not positive.
pub fn calculate_return_on_margin(max_profit: Decimal, margin: Decimal) -> Decimal {
    return_on_bounds(Bound::from_amount(max_profit), Bound::from_amount(margin))
}

pub fn calculate_strategy_metrics(strategy: &Strategy) -> Result<StrategyMetrics, ValidationError> {
    let legs = strategy.legs();
    let net_premium = calculate_net_premium(legs)?;
    let max_profit = profit_bound(legs, net_premium)?;
    let max_loss = loss_bound(legs, net_premium)?;
    let breakeven_points = calculate_breakeven_points(legs, net_premium)?;
    let margin = margin_bound(legs, net_premium, max_loss)?;
    let return_on_margin = return_on_bounds(max_profit, margin);

    Ok(StrategyMetrics::new(
        net_premium,
        max_profit,
        max_loss,
        breakeven_points,
        margin,
        return_on_margin,
    ))
}
