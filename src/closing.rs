//! Trade settlement: realized P&L at a closing stock price and the closed journal record.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info};

use crate::calculator::{classify, Shape};
use crate::payoff::payoff_at;
use crate::types::{
    check_price, Strategy, StrategyMetrics, TradeRecord, TradeStatus, ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosingError {
    #[error("trade {0} not found")]
    NotFound(u64),
    #[error("trade {0} is already closed")]
    AlreadyClosed(u64),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Realized P&L in dollars with the stock at `closing_price` on expiration.
///
/// A credit spread closing strictly between its strikes books its max profit
/// (the credit collected). Everything else is the payoff model evaluated at the
/// closing price: debit spreads move continuously between max loss and max
/// profit, and single legs use the per-leg formula.
pub fn calculate_final_pnl(
    strategy: &Strategy,
    metrics: &StrategyMetrics,
    closing_price: Decimal,
) -> Result<Decimal, ValidationError> {
    check_price("closing price", closing_price)?;
    let pnl = match classify(strategy.legs())? {
        Shape::Vertical { lower, upper, .. }
            if metrics.is_credit()
                && lower.contract().strike() < closing_price
                && closing_price < upper.contract().strike() =>
        {
            debug!(%closing_price, "credit spread closed between strikes");
            metrics.max_profit()
        }
        Shape::Vertical { .. } => payoff_at(strategy.legs(), closing_price),
        Shape::Single(leg) => payoff_at(std::slice::from_ref(leg), closing_price),
    };
    debug!(
        %closing_price,
        %pnl,
        max_profit = %metrics.max_profit_bound(),
        max_loss = %metrics.max_loss_bound(),
        "settled strategy"
    );
    Ok(pnl)
}

/// Settle an open record. The input is left untouched; the closed copy is returned.
pub fn close_trade(record: &TradeRecord, closing_price: Decimal) -> Result<TradeRecord, ClosingError> {
    if record.status() == TradeStatus::Closed {
        return Err(ClosingError::AlreadyClosed(record.id()));
    }
    let pnl = calculate_final_pnl(record.strategy(), record.metrics(), closing_price)?;
    info!(
        "Closed trade {} ({}) at ${:.2}: P&L ${:.2}",
        record.id(),
        record.strategy().underlying_symbol(),
        closing_price,
        pnl
    );
    Ok(record.closed(closing_price, pnl))
}
