//! Small helpers.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

pub fn sanitize_symbol(sym: &str) -> String {
    sym.trim().to_uppercase()
}

/// Parse an expiration given as YYYY-MM-DD.
pub fn parse_expiration(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Round a dollar amount to cents, half away from zero.
pub fn round_cents(v: Decimal) -> Decimal {
    v.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Print first two chars, then mask the rest (for logs only).
pub fn mask_secret(s: &str) -> String {
    let mut cs = s.chars();
    let a = cs.next().unwrap_or('*');
    let b = cs.next().unwrap_or('*');
    format!("{}{}****", a, b)
}
