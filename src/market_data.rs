//! Alpha Vantage client for stock quotes and option chains.

use std::{str::FromStr, time::Duration};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::MarketDataCfg;
use crate::types::{OptionContract, OptionType, StockQuote, ValidationError};
use crate::utils::{mask_secret, parse_expiration, sanitize_symbol};

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("invalid symbol {0}")]
    InvalidSymbol(String),
    #[error("Alpha Vantage rate limit reached: {0}")]
    RateLimited(String),
    #[error("no data for {0}")]
    NoData(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("market data request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

pub struct MarketDataService {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MarketDataService {
    pub fn new(cfg: &MarketDataCfg, api_key: impl Into<String>) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_sec))
            .build()?;
        let api_key = api_key.into();
        info!(
            "Market data client ready: base_url={}, key={}",
            cfg.base_url,
            mask_secret(&api_key)
        );
        Ok(Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key,
        })
    }

    async fn query(&self, params: &[(&str, &str)]) -> Result<Value, MarketDataError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let v: Value = resp.json().await?;
        check_api_errors(&v)?;
        Ok(v)
    }

    // ---------- Quotes ----------

    pub async fn get_stock_quote(&self, symbol: &str) -> Result<StockQuote, MarketDataError> {
        let symbol = sanitize_symbol(symbol);
        debug!("GLOBAL_QUOTE {}", symbol);
        let v = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol.as_str())])
            .await?;
        parse_stock_quote(&symbol, &v)
    }

    // ---------- Options ----------

    pub async fn get_options_chain(
        &self,
        symbol: &str,
        expiration: NaiveDate,
    ) -> Result<Vec<OptionContract>, MarketDataError> {
        let symbol = sanitize_symbol(symbol);
        let date = expiration.format("%Y-%m-%d").to_string();
        debug!("REALTIME_OPTIONS {} {}", symbol, date);
        let v = self
            .query(&[
                ("function", "REALTIME_OPTIONS"),
                ("symbol", symbol.as_str()),
                ("date", date.as_str()),
            ])
            .await?;
        let chain = parse_options_chain(&symbol, expiration, &v)?;
        info!("Fetched {} contracts for {} {}", chain.len(), symbol, date);
        Ok(chain)
    }
}

fn check_api_errors(v: &Value) -> Result<(), MarketDataError> {
    if let Some(msg) = v.get("Error Message").and_then(|m| m.as_str()) {
        return Err(MarketDataError::InvalidSymbol(msg.to_string()));
    }
    for key in ["Note", "Information"] {
        if let Some(msg) = v.get(key).and_then(|m| m.as_str()) {
            if msg.to_lowercase().contains("rate limit") {
                return Err(MarketDataError::RateLimited(msg.to_string()));
            }
        }
    }
    Ok(())
}

/// Alpha Vantage sends numbers as strings; accept both.
fn decimal_field(v: &Value, key: &str) -> Option<Decimal> {
    match v.get(key)? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

fn parse_stock_quote(symbol: &str, v: &Value) -> Result<StockQuote, MarketDataError> {
    let q = v
        .get("Global Quote")
        .filter(|q| q.as_object().is_some_and(|o| !o.is_empty()))
        .ok_or_else(|| MarketDataError::NoData(symbol.to_string()))?;
    let price = decimal_field(q, "05. price")
        .ok_or_else(|| MarketDataError::InvalidResponse("missing or bad '05. price'".into()))?;
    let day = q
        .get("07. latest trading day")
        .and_then(|d| d.as_str())
        .and_then(parse_expiration)
        .ok_or_else(|| {
            MarketDataError::InvalidResponse("missing or bad '07. latest trading day'".into())
        })?;
    let quoted = q
        .get("01. symbol")
        .and_then(|s| s.as_str())
        .unwrap_or(symbol);
    Ok(StockQuote::new(quoted, price, day)?)
}

fn parse_contract(symbol: &str, expiration: NaiveDate, it: &Value) -> Result<OptionContract, String> {
    let option_type = it
        .get("type")
        .and_then(|t| t.as_str())
        .and_then(|t| OptionType::from_str(t).ok())
        .ok_or("missing or bad 'type'")?;
    let strike = decimal_field(it, "strike").ok_or("missing or bad 'strike'")?;
    let bid = decimal_field(it, "bid").ok_or("missing or bad 'bid'")?;
    let ask = decimal_field(it, "ask").ok_or("missing or bad 'ask'")?;
    OptionContract::new(symbol, strike, expiration, option_type, bid, ask)
        .map_err(|e| format!("{} {}: {}", strike, option_type, e))
}

fn parse_options_chain(
    symbol: &str,
    expiration: NaiveDate,
    v: &Value,
) -> Result<Vec<OptionContract>, MarketDataError> {
    let arr = v
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| MarketDataError::NoData(format!("{} options", symbol)))?;
    let mut out = Vec::with_capacity(arr.len());
    for it in arr {
        match parse_contract(symbol, expiration, it) {
            Ok(c) => out.push(c),
            Err(reason) => warn!("Skipping {} option entry: {}", symbol, reason),
        }
    }
    if out.is_empty() {
        return Err(MarketDataError::NoData(format!(
            "{} options expiring {}",
            symbol, expiration
        )));
    }
    Ok(out)
}
