//! Core domain types: option contracts, legs, strategies, metrics and journal records.
//!
//! Every value type is built through a validating constructor, and deserialization
//! is routed through the same constructors, so a malformed leg can never reach the
//! calculator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::sanitize_symbol;

/// Shares controlled by one option contract.
pub const CONTRACT_MULTIPLIER: Decimal = dec!(100);

/// Numeric stand-in for "no finite bound" on profit, loss or margin.
pub const UNBOUNDED: Decimal = dec!(99999);

/// Leg count supported by the calculator.
pub const MAX_LEGS: usize = 2;

/// Quantity used when a leg does not state one.
pub const DEFAULT_QUANTITY: u32 = 1;

/// Largest strike, quote or stock price accepted.
pub const MAX_PRICE: Decimal = dec!(1_000_000);

/// Largest contract count accepted on one leg.
pub const MAX_QUANTITY: u32 = 100_000;

/// True when `value` is exactly the unbounded sentinel. Finite amounts above it are real bounds.
pub fn is_unbounded(value: Decimal) -> bool {
    value == UNBOUNDED
}

/// Positive and no larger than [`MAX_PRICE`].
pub(crate) fn check_price(field: &'static str, value: Decimal) -> Result<(), ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice { field, value });
    }
    if value > MAX_PRICE {
        return Err(ValidationError::PriceTooLarge { field, value });
    }
    Ok(())
}

/// Malformed or out-of-policy input, rejected before any calculation runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("strike price {0} must be positive")]
    NonPositiveStrike(Decimal),
    #[error("bid price {0} cannot be negative")]
    NegativeBid(Decimal),
    #[error("ask price {ask} cannot be less than bid {bid}")]
    AskBelowBid { bid: Decimal, ask: Decimal },
    #[error("option type must be 'call' or 'put', got '{0}'")]
    InvalidOptionType(String),
    #[error("action must be 'buy' or 'sell', got '{0}'")]
    InvalidAction(String),
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(u32),
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("strategy must have at least one leg")]
    NoLegs,
    #[error("only one- and two-leg strategies are supported, got {0} legs")]
    TooManyLegs(usize),
    #[error("leg underlying {found} does not match strategy underlying {expected}")]
    MixedUnderlying { expected: String, found: String },
    #[error("leg expiration {found} does not match strategy expiration {expected}")]
    MixedExpiration { expected: NaiveDate, found: NaiveDate },
    #[error("unsupported strategy shape: {0}")]
    UnsupportedShape(&'static str),
    #[error("{field} must be positive, got {value}")]
    NonPositivePrice { field: &'static str, value: Decimal },
    #[error("{field} {value} exceeds the supported maximum of {max}", max = MAX_PRICE)]
    PriceTooLarge { field: &'static str, value: Decimal },
    #[error("quantity {0} exceeds the supported maximum of {max}", max = MAX_QUANTITY)]
    QuantityTooLarge(u32),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// +1 for premium received, -1 for premium paid.
    pub fn premium_sign(self) -> Decimal {
        match self {
            Action::Buy => Decimal::NEGATIVE_ONE,
            Action::Sell => Decimal::ONE,
        }
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            _ => Err(ValidationError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl FromStr for OptionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionType::Call),
            "put" | "p" => Ok(OptionType::Put),
            _ => Err(ValidationError::InvalidOptionType(s.to_string())),
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        })
    }
}

/// Profit, loss or margin ceiling, with the sentinel decoded.
///
/// Stored as `null` when unbounded so a finite 99999 survives a round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<Decimal>", into = "Option<Decimal>")]
pub enum Bound {
    Limited(Decimal),
    Unbounded,
}

impl Bound {
    pub fn from_amount(amount: Decimal) -> Self {
        if is_unbounded(amount) {
            Bound::Unbounded
        } else {
            Bound::Limited(amount)
        }
    }

    /// Numeric form; `Unbounded` maps back to the sentinel.
    pub fn amount(self) -> Decimal {
        match self {
            Bound::Limited(v) => v,
            Bound::Unbounded => UNBOUNDED,
        }
    }
}

impl From<Option<Decimal>> for Bound {
    fn from(v: Option<Decimal>) -> Self {
        v.map_or(Bound::Unbounded, Bound::Limited)
    }
}

impl From<Bound> for Option<Decimal> {
    fn from(b: Bound) -> Self {
        match b {
            Bound::Limited(v) => Some(v),
            Bound::Unbounded => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Limited(v) => write!(f, "${:.2}", v),
            Bound::Unbounded => f.write_str("unlimited"),
        }
    }
}

/// Real-time stock price for an underlying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuote {
    symbol: String,
    price: Decimal,
    latest_trading_day: NaiveDate,
}

impl StockQuote {
    pub fn new(
        symbol: &str,
        price: Decimal,
        latest_trading_day: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let symbol = sanitize_symbol(symbol);
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        check_price("stock price", price)?;
        Ok(Self {
            symbol,
            price,
            latest_trading_day,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn latest_trading_day(&self) -> NaiveDate {
        self.latest_trading_day
    }
}

/// A single listed option with its current quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContractFields")]
pub struct OptionContract {
    symbol: String,
    strike: Decimal,
    expiration: NaiveDate,
    option_type: OptionType,
    bid: Decimal,
    ask: Decimal,
}

#[derive(Deserialize)]
struct ContractFields {
    symbol: String,
    strike: Decimal,
    expiration: NaiveDate,
    option_type: OptionType,
    bid: Decimal,
    ask: Decimal,
}

impl TryFrom<ContractFields> for OptionContract {
    type Error = ValidationError;

    fn try_from(f: ContractFields) -> Result<Self, Self::Error> {
        Self::new(&f.symbol, f.strike, f.expiration, f.option_type, f.bid, f.ask)
    }
}

impl OptionContract {
    pub fn new(
        symbol: &str,
        strike: Decimal,
        expiration: NaiveDate,
        option_type: OptionType,
        bid: Decimal,
        ask: Decimal,
    ) -> Result<Self, ValidationError> {
        let symbol = sanitize_symbol(symbol);
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        if strike <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveStrike(strike));
        }
        if strike > MAX_PRICE {
            return Err(ValidationError::PriceTooLarge {
                field: "strike price",
                value: strike,
            });
        }
        if bid < Decimal::ZERO {
            return Err(ValidationError::NegativeBid(bid));
        }
        if ask < bid {
            return Err(ValidationError::AskBelowBid { bid, ask });
        }
        if ask > MAX_PRICE {
            return Err(ValidationError::PriceTooLarge {
                field: "ask price",
                value: ask,
            });
        }
        Ok(Self {
            symbol,
            strike,
            expiration,
            option_type,
            bid,
            ask,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn strike(&self) -> Decimal {
        self.strike
    }

    pub fn expiration(&self) -> NaiveDate {
        self.expiration
    }

    pub fn option_type(&self) -> OptionType {
        self.option_type
    }

    pub fn bid(&self) -> Decimal {
        self.bid
    }

    pub fn ask(&self) -> Decimal {
        self.ask
    }
}

/// One buy or sell position in a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LegFields")]
pub struct OptionLeg {
    action: Action,
    contract: OptionContract,
    quantity: u32,
}

#[derive(Deserialize)]
struct LegFields {
    action: Action,
    contract: OptionContract,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    DEFAULT_QUANTITY
}

impl TryFrom<LegFields> for OptionLeg {
    type Error = ValidationError;

    fn try_from(f: LegFields) -> Result<Self, Self::Error> {
        Self::new(f.action, f.contract, f.quantity)
    }
}

impl OptionLeg {
    pub fn new(action: Action, contract: OptionContract, quantity: u32) -> Result<Self, ValidationError> {
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity(quantity));
        }
        if quantity > MAX_QUANTITY {
            return Err(ValidationError::QuantityTooLarge(quantity));
        }
        Ok(Self {
            action,
            contract,
            quantity,
        })
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn contract(&self) -> &OptionContract {
        &self.contract
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// Quantity as a decimal, for money arithmetic.
    pub fn contracts(&self) -> Decimal {
        Decimal::from(self.quantity)
    }

    /// Per-share price the leg trades at: bid when selling, ask when buying.
    pub fn fill_price(&self) -> Decimal {
        match self.action {
            Action::Buy => self.contract.ask,
            Action::Sell => self.contract.bid,
        }
    }

    /// Signed dollar premium (positive = received). Unrounded.
    pub fn premium(&self) -> Decimal {
        self.action.premium_sign() * self.fill_price() * CONTRACT_MULTIPLIER * self.contracts()
    }
}

/// An ordered set of one or two legs on the same underlying and expiration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StrategyFields")]
pub struct Strategy {
    underlying_symbol: String,
    created_at: DateTime<Utc>,
    legs: Vec<OptionLeg>,
}

#[derive(Deserialize)]
struct StrategyFields {
    underlying_symbol: String,
    created_at: DateTime<Utc>,
    legs: Vec<OptionLeg>,
}

impl TryFrom<StrategyFields> for Strategy {
    type Error = ValidationError;

    fn try_from(f: StrategyFields) -> Result<Self, Self::Error> {
        Self::new(&f.underlying_symbol, f.created_at, f.legs)
    }
}

impl Strategy {
    pub fn new(
        underlying_symbol: &str,
        created_at: DateTime<Utc>,
        legs: Vec<OptionLeg>,
    ) -> Result<Self, ValidationError> {
        let underlying_symbol = sanitize_symbol(underlying_symbol);
        if underlying_symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        let first = legs.first().ok_or(ValidationError::NoLegs)?;
        if legs.len() > MAX_LEGS {
            return Err(ValidationError::TooManyLegs(legs.len()));
        }
        let expiration = first.contract().expiration();
        for leg in &legs {
            if leg.contract().symbol() != underlying_symbol {
                return Err(ValidationError::MixedUnderlying {
                    expected: underlying_symbol,
                    found: leg.contract().symbol().to_string(),
                });
            }
            if leg.contract().expiration() != expiration {
                return Err(ValidationError::MixedExpiration {
                    expected: expiration,
                    found: leg.contract().expiration(),
                });
            }
        }
        Ok(Self {
            underlying_symbol,
            created_at,
            legs,
        })
    }

    pub fn underlying_symbol(&self) -> &str {
        &self.underlying_symbol
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn legs(&self) -> &[OptionLeg] {
        &self.legs
    }

    /// Shared expiration of all legs.
    pub fn expiration(&self) -> NaiveDate {
        self.legs[0].contract().expiration()
    }
}

/// Risk/reward profile derived from a strategy. All money fields are dollars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    net_premium: Decimal,
    max_profit: Bound,
    max_loss: Bound,
    breakeven_points: Vec<Decimal>,
    margin_requirement: Bound,
    return_on_margin: Decimal,
}

impl StrategyMetrics {
    pub(crate) fn new(
        net_premium: Decimal,
        max_profit: Bound,
        max_loss: Bound,
        breakeven_points: Vec<Decimal>,
        margin_requirement: Bound,
        return_on_margin: Decimal,
    ) -> Self {
        Self {
            net_premium,
            max_profit,
            max_loss,
            breakeven_points,
            margin_requirement,
            return_on_margin,
        }
    }

    /// Positive = credit, negative = debit.
    pub fn net_premium(&self) -> Decimal {
        self.net_premium
    }

    pub fn is_credit(&self) -> bool {
        self.net_premium >= Decimal::ZERO
    }

    /// Numeric form; the unbounded sentinel when there is no ceiling.
    pub fn max_profit(&self) -> Decimal {
        self.max_profit.amount()
    }

    /// Numeric form; the unbounded sentinel when there is no ceiling.
    pub fn max_loss(&self) -> Decimal {
        self.max_loss.amount()
    }

    pub fn max_profit_bound(&self) -> Bound {
        self.max_profit
    }

    pub fn max_loss_bound(&self) -> Bound {
        self.max_loss
    }

    pub fn breakeven_points(&self) -> &[Decimal] {
        &self.breakeven_points
    }

    pub fn margin_requirement(&self) -> Decimal {
        self.margin_requirement.amount()
    }

    pub fn margin_bound(&self) -> Bound {
        self.margin_requirement
    }

    /// Percentage, 2 dp.
    pub fn return_on_margin(&self) -> Decimal {
        self.return_on_margin
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeStatus::Open => "open",
            TradeStatus::Closed => "closed",
        })
    }
}

/// Paper trade in the journal: an entry snapshot plus its settlement, once closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    id: u64,
    strategy: Strategy,
    metrics: StrategyMetrics,
    entry_date: NaiveDate,
    status: TradeStatus,
    closing_price: Option<Decimal>,
    final_pnl: Option<Decimal>,
}

impl TradeRecord {
    pub(crate) fn open(
        id: u64,
        strategy: Strategy,
        metrics: StrategyMetrics,
        entry_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            strategy,
            metrics,
            entry_date,
            status: TradeStatus::Open,
            closing_price: None,
            final_pnl: None,
        }
    }

    /// Settled copy of this record.
    pub(crate) fn closed(&self, closing_price: Decimal, final_pnl: Decimal) -> Self {
        Self {
            status: TradeStatus::Closed,
            closing_price: Some(closing_price),
            final_pnl: Some(final_pnl),
            ..self.clone()
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn metrics(&self) -> &StrategyMetrics {
        &self.metrics
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn status(&self) -> TradeStatus {
        self.status
    }

    pub fn closing_price(&self) -> Option<Decimal> {
        self.closing_price
    }

    pub fn final_pnl(&self) -> Option<Decimal> {
        self.final_pnl
    }
}
