//! Persisted paper-trading journal: every saved strategy with its entry metrics and settlement.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::closing::{self, ClosingError};
use crate::types::{Strategy, StrategyMetrics, TradeRecord};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("journal file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Closing(#[from] ClosingError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct JournalState {
    next_id: u64,
    trades: Vec<TradeRecord>,
}

/// JSON-file journal. Mutations take `&mut self` and rewrite the whole file.
#[derive(Debug)]
pub struct TradingJournal {
    path: PathBuf,
    state: JournalState,
}

impl TradingJournal {
    /// Open the journal at `path`; a missing file starts an empty journal.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let s = fs::read_to_string(&path).map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&s).map_err(|source| JournalError::Corrupt {
                path: path.clone(),
                source,
            })?
        } else {
            JournalState {
                next_id: 1,
                trades: Vec::new(),
            }
        };
        Ok(Self { path, state })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, state: &JournalState) -> Result<(), JournalError> {
        let io_err = |source| JournalError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let s = serde_json::to_string_pretty(state).map_err(|source| JournalError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, s).map_err(io_err)
    }

    /// Record a new open trade.
    pub fn save_trade(
        &mut self,
        strategy: Strategy,
        metrics: StrategyMetrics,
        entry_date: NaiveDate,
    ) -> Result<TradeRecord, JournalError> {
        let mut next = self.state.clone();
        let id = next.next_id.max(1);
        let record = TradeRecord::open(id, strategy, metrics, entry_date);
        next.next_id = id + 1;
        next.trades.push(record.clone());
        self.write(&next)?;
        self.state = next;
        info!("Saved trade {} ({})", id, record.strategy().underlying_symbol());
        Ok(record)
    }

    /// All trades, newest entry first (ties broken by id, newest first).
    pub fn all_trades(&self) -> Vec<&TradeRecord> {
        let mut out: Vec<&TradeRecord> = self.state.trades.iter().collect();
        out.sort_by(|a, b| {
            b.entry_date()
                .cmp(&a.entry_date())
                .then_with(|| b.id().cmp(&a.id()))
        });
        out
    }

    pub fn get(&self, id: u64) -> Option<&TradeRecord> {
        self.state.trades.iter().find(|t| t.id() == id)
    }

    /// Settle trade `id` at `closing_price` and persist the closed record.
    pub fn close_trade(&mut self, id: u64, closing_price: Decimal) -> Result<TradeRecord, JournalError> {
        let idx = self
            .state
            .trades
            .iter()
            .position(|t| t.id() == id)
            .ok_or(ClosingError::NotFound(id))?;
        let closed = closing::close_trade(&self.state.trades[idx], closing_price)?;
        let mut next = self.state.clone();
        next.trades[idx] = closed.clone();
        self.write(&next)?;
        self.state = next;
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::calculate_strategy_metrics;
    use crate::types::fixtures::*;
    use crate::types::TradeStatus;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 8, d).unwrap()
    }

    fn journal(dir: &TempDir) -> TradingJournal {
        TradingJournal::open(dir.path().join("journal.json")).unwrap()
    }

    fn save(j: &mut TradingJournal, s: Strategy, d: u32) -> TradeRecord {
        let m = calculate_strategy_metrics(&s).unwrap();
        j.save_trade(s, m, day(d)).unwrap()
    }

    #[test]
    fn empty_journal_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let j = journal(&dir);
        assert!(j.all_trades().is_empty());
        assert!(!j.path().exists());
    }

    #[test]
    fn save_assigns_ids_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut j = journal(&dir);
        let a = save(&mut j, bull_call_spread(), 1);
        let b = save(&mut j, bear_put_spread(), 1);
        assert_eq!((a.id(), b.id()), (1, 2));
        assert_eq!(a.status(), TradeStatus::Open);

        let reopened = journal(&dir);
        assert_eq!(reopened.get(1), Some(&a));
        assert_eq!(reopened.get(2), Some(&b));
    }

    #[test]
    fn trades_listed_newest_first() {
        let dir = TempDir::new().unwrap();
        let mut j = journal(&dir);
        save(&mut j, bull_call_spread(), 1);
        save(&mut j, long_call(), 3);
        save(&mut j, bear_put_spread(), 1);
        let ids: Vec<u64> = j.all_trades().iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn close_trade_persists_settlement() {
        let dir = TempDir::new().unwrap();
        let mut j = journal(&dir);
        let rec = save(&mut j, bull_call_spread(), 1);
        let closed = j.close_trade(rec.id(), dec!(158.50)).unwrap();
        assert_eq!(closed.final_pnl(), Some(dec!(460.00)));

        let reopened = journal(&dir);
        let stored = reopened.get(rec.id()).unwrap();
        assert_eq!(stored.status(), TradeStatus::Closed);
        assert_eq!(stored.closing_price(), Some(dec!(158.50)));
        assert_eq!(stored.final_pnl(), Some(dec!(460.00)));
        assert_eq!(stored.strategy(), rec.strategy());
        assert_eq!(stored.metrics(), rec.metrics());
    }

    #[test]
    fn close_missing_or_closed_trade_fails() {
        let dir = TempDir::new().unwrap();
        let mut j = journal(&dir);
        assert!(matches!(
            j.close_trade(42, dec!(150)),
            Err(JournalError::Closing(ClosingError::NotFound(42)))
        ));

        let rec = save(&mut j, bull_call_spread(), 1);
        j.close_trade(rec.id(), dec!(140)).unwrap();
        assert!(matches!(
            j.close_trade(rec.id(), dec!(160)),
            Err(JournalError::Closing(ClosingError::AlreadyClosed(1)))
        ));
        assert_eq!(j.get(1).unwrap().final_pnl(), Some(dec!(-540.00)));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            TradingJournal::open(&path),
            Err(JournalError::Corrupt { .. })
        ));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let mut j = TradingJournal::open(dir.path().join("nested/deeper/journal.json")).unwrap();
        save(&mut j, long_call(), 2);
        assert!(j.path().exists());
    }
}
