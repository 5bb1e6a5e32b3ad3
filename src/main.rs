//! Entry point. Wires CLI -> Market data -> Calculator -> Journal / AI.

mod ai_analyzer;
mod calculator;
mod closing;
mod config;
mod journal;
mod market_data;
mod parser;
mod payoff;
mod types;
mod utils;

use anyhow::{bail, Context};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use crate::config::{api_key, AppConfig, Service, JOURNAL_PATH_ENV};
use crate::journal::TradingJournal;
use crate::market_data::MarketDataService;
use crate::payoff::{PayoffCurve, PayoffPoint};
use crate::types::{OptionType, Strategy, StrategyMetrics, TradeRecord, TradeStatus};
use crate::utils::{parse_expiration, sanitize_symbol};

const BAR_WIDTH: usize = 30;

#[derive(Parser)]
#[command(name = "optionpilot")]
#[command(about = "Options strategy calculator and paper-trading journal", long_about = None)]
struct Cli {
    /// Path to the YAML config
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Latest stock price
    Quote { symbol: String },

    /// Option chain for one expiration, strikes nearest the money
    Chain {
        symbol: String,
        /// Expiration (YYYY-MM-DD)
        #[arg(value_parser = expiration_arg)]
        expiration: NaiveDate,
        /// Strikes shown per side
        #[arg(short, long, default_value_t = 6)]
        limit: usize,
    },

    /// Evaluate a strategy built from one or two legs
    Build {
        #[arg(short, long)]
        symbol: String,
        /// Expiration (YYYY-MM-DD)
        #[arg(short, long, value_parser = expiration_arg)]
        expiration: NaiveDate,
        /// "<buy|sell> [qty] <call|put> <strike> @ <bid>/<ask>", repeatable
        #[arg(short, long = "leg", required = true)]
        legs: Vec<String>,
        /// Current stock price; fetched when needed and omitted
        #[arg(short, long)]
        price: Option<Decimal>,
        /// Print the expiration payoff table
        #[arg(long)]
        payoff: bool,
        /// Ask the AI model for commentary
        #[arg(long)]
        analyze: bool,
        /// Record the strategy in the journal
        #[arg(long)]
        save: bool,
    },

    /// List journal entries, newest first
    Trades,

    /// Settle an open journal entry at a closing stock price
    Close {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        price: Decimal,
    },
}

fn expiration_arg(s: &str) -> Result<NaiveDate, String> {
    parse_expiration(s).ok_or_else(|| format!("expected YYYY-MM-DD, got '{}'", s))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(&cli.config)?;
    cfg.validate()?;

    match cli.command {
        Commands::Quote { symbol } => cmd_quote(&cfg, &symbol).await,
        Commands::Chain {
            symbol,
            expiration,
            limit,
        } => cmd_chain(&cfg, &symbol, expiration, limit).await,
        Commands::Build {
            symbol,
            expiration,
            legs,
            price,
            payoff,
            analyze,
            save,
        } => {
            let opts = BuildOpts {
                price,
                payoff,
                analyze,
                save,
            };
            cmd_build(&cfg, &symbol, expiration, &legs, opts).await
        }
        Commands::Trades => cmd_trades(&cfg),
        Commands::Close { id, price } => cmd_close(&cfg, id, price),
    }
}

// ---------------- Commands ----------------

fn ensure_supported(cfg: &AppConfig, symbol: &str) -> anyhow::Result<String> {
    let symbol = sanitize_symbol(symbol);
    if !cfg.is_supported(&symbol) {
        bail!(
            "{} is not supported (supported: {})",
            symbol,
            cfg.symbols.supported.join(", ")
        );
    }
    Ok(symbol)
}

fn market_data(cfg: &AppConfig) -> anyhow::Result<MarketDataService> {
    let key = api_key(Service::AlphaVantage)?;
    Ok(MarketDataService::new(&cfg.market_data, key)?)
}

fn open_journal(cfg: &AppConfig) -> anyhow::Result<TradingJournal> {
    let path = cfg.journal_path(std::env::var(JOURNAL_PATH_ENV).ok())?;
    info!("Journal: {}", path.display());
    Ok(TradingJournal::open(path)?)
}

async fn cmd_quote(cfg: &AppConfig, symbol: &str) -> anyhow::Result<()> {
    let symbol = ensure_supported(cfg, symbol)?;
    let q = market_data(cfg)?.get_stock_quote(&symbol).await?;
    println!(
        "{}  ${:.2}  (as of {})",
        q.symbol(),
        q.price(),
        q.latest_trading_day()
    );
    Ok(())
}

async fn cmd_chain(
    cfg: &AppConfig,
    symbol: &str,
    expiration: NaiveDate,
    limit: usize,
) -> anyhow::Result<()> {
    let symbol = ensure_supported(cfg, symbol)?;
    let md = market_data(cfg)?;
    let quote = md.get_stock_quote(&symbol).await?;
    let chain = md.get_options_chain(&symbol, expiration).await?;

    println!(
        "{} {} chain (stock ${:.2})",
        symbol,
        expiration,
        quote.price()
    );
    for option_type in [OptionType::Call, OptionType::Put] {
        let mut side: Vec<_> = chain
            .iter()
            .filter(|c| c.option_type() == option_type)
            .collect();
        side.sort_by_key(|c| (c.strike() - quote.price()).abs());
        side.truncate(limit);
        side.sort_by_key(|c| c.strike());

        println!("\n{:>6}  {:>9}  {:>8}  {:>8}", option_type, "strike", "bid", "ask");
        for c in side {
            println!(
                "{:>6}  {:>9.2}  {:>8.2}  {:>8.2}",
                "",
                c.strike(),
                c.bid(),
                c.ask()
            );
        }
    }
    Ok(())
}

struct BuildOpts {
    price: Option<Decimal>,
    payoff: bool,
    analyze: bool,
    save: bool,
}

async fn cmd_build(
    cfg: &AppConfig,
    symbol: &str,
    expiration: NaiveDate,
    leg_texts: &[String],
    opts: BuildOpts,
) -> anyhow::Result<()> {
    let symbol = ensure_supported(cfg, symbol)?;
    let mut legs = Vec::with_capacity(leg_texts.len());
    for text in leg_texts {
        let spec = parser::parse_leg(text)
            .with_context(|| format!("cannot parse leg '{}'", text))?;
        legs.push(spec.into_leg(&symbol, expiration)?);
    }
    let strategy = Strategy::new(&symbol, Utc::now(), legs)?;
    let metrics = calculator::calculate_strategy_metrics(&strategy)?;
    print_metrics(&strategy, &metrics);

    let needs_price = opts.payoff || opts.analyze;
    let price = match opts.price {
        Some(p) => Some(p),
        None if needs_price => Some(market_data(cfg)?.get_stock_quote(&symbol).await?.price()),
        None => None,
    };

    if let (true, Some(p)) = (opts.payoff, price) {
        let curve = PayoffCurve::new(&strategy, p)?;
        println!("\nPayoff at expiration (stock ${:.2}):", p);
        for line in render_payoff(curve) {
            println!("{}", line);
        }
    }

    if let (true, Some(p)) = (opts.analyze, price) {
        let analyzer = ai_analyzer::AiAnalyzer::new(&cfg.ai, api_key(Service::OpenRouter)?)?;
        match analyzer.analyze_strategy(&strategy, &metrics, p).await {
            Ok(a) => {
                println!("\nInterpretation: {}", a.interpretation);
                println!("Market outlook: {}", a.market_outlook);
                println!("Risk warning:   {}", a.risk_warning);
            }
            // Analysis is advisory; the numbers above still stand.
            Err(e) => error!("AI analysis failed: {:#}", e),
        }
    }

    if opts.save {
        let mut journal = open_journal(cfg)?;
        let rec = journal.save_trade(strategy, metrics, Local::now().date_naive())?;
        println!("\nSaved as trade #{}", rec.id());
    }
    Ok(())
}

fn cmd_trades(cfg: &AppConfig) -> anyhow::Result<()> {
    let journal = open_journal(cfg)?;
    let trades = journal.all_trades();
    if trades.is_empty() {
        println!("No trades recorded.");
        return Ok(());
    }
    println!(
        "{:>4}  {:<10}  {:<6}  {:<34}  {:<6}  {:>12}",
        "id", "entered", "symbol", "legs", "status", "P&L"
    );
    for t in trades {
        println!("{}", trade_row(t));
    }
    Ok(())
}

fn cmd_close(cfg: &AppConfig, id: u64, price: Decimal) -> anyhow::Result<()> {
    let mut journal = open_journal(cfg)?;
    let rec = journal.close_trade(id, price)?;
    println!(
        "Trade #{} closed at ${:.2}: P&L ${:.2}",
        rec.id(),
        price,
        rec.final_pnl().unwrap_or_default()
    );
    Ok(())
}

// ---------------- Rendering ----------------

fn describe_legs(strategy: &Strategy) -> String {
    strategy
        .legs()
        .iter()
        .map(|l| {
            format!(
                "{} {} {} {:.2}",
                l.action(),
                l.quantity(),
                l.contract().option_type(),
                l.contract().strike()
            )
        })
        .collect::<Vec<_>>()
        .join(" / ")
}

fn print_metrics(strategy: &Strategy, m: &StrategyMetrics) {
    let kind = if m.is_credit() { "credit" } else { "debit" };
    let breakevens: Vec<String> = m
        .breakeven_points()
        .iter()
        .map(|b| format!("${:.2}", b))
        .collect();
    println!(
        "{} {}  {}",
        strategy.underlying_symbol(),
        strategy.expiration(),
        describe_legs(strategy)
    );
    println!("Net premium:   ${:.2} ({})", m.net_premium(), kind);
    println!("Max profit:    {}", m.max_profit_bound());
    println!("Max loss:      {}", m.max_loss_bound());
    println!("Breakeven:     {}", breakevens.join(", "));
    println!("Margin:        {}", m.margin_bound());
    println!("Return/margin: {:.2}%", m.return_on_margin());
}

fn trade_row(t: &TradeRecord) -> String {
    let (status, pnl) = match t.status() {
        TradeStatus::Open => ("open", "-".to_string()),
        TradeStatus::Closed => (
            "closed",
            format!("${:.2}", t.final_pnl().unwrap_or_default()),
        ),
    };
    format!(
        "{:>4}  {:<10}  {:<6}  {:<34}  {:<6}  {:>12}",
        t.id(),
        t.entry_date(),
        t.strategy().underlying_symbol(),
        describe_legs(t.strategy()),
        status,
        pnl
    )
}

/// One line per sample: price, P&L and a bar scaled to the largest |P&L|.
fn render_payoff(curve: PayoffCurve<'_>) -> Vec<String> {
    let points: Vec<PayoffPoint> = curve.iter().collect();
    let scale = points
        .iter()
        .map(|p| p.pnl.abs())
        .max()
        .unwrap_or_default();
    points
        .iter()
        .map(|p| {
            let len = if scale.is_zero() {
                0
            } else {
                (p.pnl.abs() * Decimal::from(BAR_WIDTH) / scale)
                    .round()
                    .to_usize()
                    .unwrap_or(0)
            };
            let ch = if p.pnl >= Decimal::ZERO { '+' } else { '-' };
            format!(
                "{:>9.2}  {:>11.2}  {}",
                p.price,
                p.pnl,
                ch.to_string().repeat(len)
            )
        })
        .collect()
}
