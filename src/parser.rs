//! Parse leg specifications typed on the command line.
//! Supported: "<buy|sell> [qty] <call|put|c|p> <strike> @ <bid>/<ask>".

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;

use crate::types::{
    Action, OptionContract, OptionLeg, OptionType, ValidationError, DEFAULT_QUANTITY,
};

static LEG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(buy|sell)\s+(?:(\d+)\s+)?(call|put|c|p)\s+(\d+(?:\.\d+)?)\s*@\s*(\d+(?:\.\d+)?)\s*/\s*(\d+(?:\.\d+)?)$",
    )
    .expect("leg pattern compiles")
});

/// A leg as typed, before contract validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegSpec {
    pub action: Action,
    pub quantity: u32,
    pub option_type: OptionType,
    pub strike: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl LegSpec {
    /// Attach the strategy's underlying and expiration and run the leg validation.
    pub fn into_leg(self, symbol: &str, expiration: NaiveDate) -> Result<OptionLeg, ValidationError> {
        let contract = OptionContract::new(
            symbol,
            self.strike,
            expiration,
            self.option_type,
            self.bid,
            self.ask,
        )?;
        OptionLeg::new(self.action, contract, self.quantity)
    }
}

pub fn parse_leg(text: &str) -> Option<LegSpec> {
    let c = LEG_RE.captures(text.trim())?;

    let action = Action::from_str(&c[1]).ok()?;
    let quantity = match c.get(2) {
        Some(q) => q.as_str().parse().ok()?,
        None => DEFAULT_QUANTITY, // default when qty missing
    };
    let option_type = OptionType::from_str(&c[3]).ok()?;
    let strike = Decimal::from_str(&c[4]).ok()?;
    let bid = Decimal::from_str(&c[5]).ok()?;
    let ask = Decimal::from_str(&c[6]).ok()?;

    Some(LegSpec {
        action,
        quantity,
        option_type,
        strike,
        bid,
        ask,
    })
}
