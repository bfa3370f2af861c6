// Mini-Disclaimer: Educational/experimental use; not investment advice or affiliation; see README & DISCLAIMER.
#![forbid(unsafe_code)]
#![warn(unused, rust_2018_idioms)]
//! Process entry point (spec.md §2): wires every crate in the workspace into
//! a single binary. The four processes spec.md §2 describes (Feed Publisher,
//! Feed Logger, Strategy Orchestrator, Strategy) run as tasks of one process
//! sharing an in-process [`kestrel_data::bus::TopicBus`], per
//! `kestrel_core::system::config::Config`'s own note that a real multi-process
//! deployment would split them behind a real AMQP broker.
//!
//! No real venue wire adapter ships in this workspace (spec.md §1); live mode
//! runs the pipeline against [`kestrel_execution::client::mock::MockPublicStream`],
//! a synthetic paper-trading feed, and each `Strategy` against its own
//! [`kestrel_execution::client::mock::MockExecutionClient`].

use clap::Parser;
use kestrel_core::system::config::Config;
use kestrel_core::system::orchestrator::Orchestrator;
use kestrel_core::system::{feed_logger, feed_publisher, replay};
use kestrel_core::{logging, shutdown, ExchangeState, KestrelError};
use kestrel_data::books::BookCache;
use kestrel_data::bus::TopicBus;
use kestrel_execution::client::mock::{MockExecutionClient, MockExecutionConfig, MockPublicStream};
use kestrel_execution::client::UserStream;
use kestrel_execution::model::{Order, Position};
use kestrel_markets::{Contract, ExchangeId, Symbol, Timeframe};
use kestrel_store::mongo::MongoStore;
use kestrel_store::Store;
use kestrel_trader::Strategy;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Kestrel crypto-derivatives automated trading platform")]
struct Cli {
    /// Emit JSON logs instead of human-readable ones (suited to log
    /// aggregators).
    #[arg(long, env = "KESTREL_JSON_LOGS", default_value_t = false)]
    json_logs: bool,
}

/// Placeholder contract spec for a symbol this deployment has no real venue
/// to fetch `Contract` metadata from (spec.md §1 venue adapter out of
/// scope). A real `PublicRest::get_contracts` call would replace this.
fn placeholder_contract(symbol: &Symbol) -> Contract {
    Contract {
        exchange: ExchangeId::BinanceTestnet,
        symbol: symbol.clone(),
        base_asset: symbol.as_str().trim_end_matches("usdt").to_uppercase(),
        quote_asset: "USDT".into(),
        price_decimals: 2,
        quantity_decimals: 3,
        tick_size: Decimal::new(1, 2),
        lot_size: Decimal::new(1, 3),
        min_notional: Decimal::new(5, 0),
    }
}

#[tokio::main]
async fn main() -> Result<(), KestrelError> {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_json_logging();
    } else {
        logging::init_logging();
    }

    let config = Config::from_env()?;
    info!(symbols = config.symbols.len(), strategies = config.strategies.len(), replay = config.replay, "kestrel starting");

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri).await?;
    let db = mongo_client.database("kestrel");

    let order_store = MongoStore::<Order>::new(&db);
    order_store.ensure_indexes().await?;
    let position_store = MongoStore::<Position>::new(&db);
    position_store.ensure_indexes().await?;
    let update_log_store = MongoStore::<kestrel_core::system::UpdateLogModel>::new(&db);
    update_log_store.ensure_indexes().await?;

    let order_store: Arc<dyn Store<Order>> = Arc::new(order_store);
    let position_store: Arc<dyn Store<Position>> = Arc::new(position_store);
    let update_log_store: Arc<dyn Store<kestrel_core::system::UpdateLogModel>> = Arc::new(update_log_store);

    let contracts: HashMap<Symbol, Contract> = config
        .symbols
        .iter()
        .map(|symbol| (symbol.clone(), placeholder_contract(symbol)))
        .collect();
    let price_decimals_by_symbol: HashMap<Symbol, u32> =
        contracts.iter().map(|(symbol, contract)| (symbol.clone(), contract.price_decimals)).collect();

    let books = Arc::new(BookCache::new());
    let state = ExchangeState::new(contracts.clone(), Timeframe::ALL.to_vec(), config.candles_limit, config.depth_limit, books.clone());

    let mut strategies = Vec::with_capacity(config.strategies.len());
    let mut user_streams: Vec<Box<dyn UserStream + Send>> = Vec::with_capacity(config.strategies.len());
    for rules in &config.strategies {
        let mock_config = MockExecutionConfig {
            contracts: contracts.clone(),
            starting_balances: HashMap::from([("USDT".to_string(), Decimal::new(100_000, 0))]),
        };
        let (client, mut user_stream) = MockExecutionClient::new(mock_config);
        let mut strategy = Strategy::new(rules.clone(), Arc::new(client), order_store.clone(), position_store.clone());
        strategy
            .startup(&mut user_stream, &position_store, &order_store, &price_decimals_by_symbol)
            .await?;
        strategies.push(strategy);
        user_streams.push(Box::new(user_stream));
    }

    let mut orchestrator = Orchestrator::new(state, strategies);

    if config.replay {
        let replayed = replay::run(update_log_store, &mut orchestrator, config.replay_from, config.replay_to, config.replay_speed)
            .await
            .map_err(KestrelError::Store)?;
        info!(replayed, "replay complete");
        return Ok(());
    }

    let bus = Arc::new(TopicBus::new(4096));

    let publisher_bus = bus.clone();
    let publisher_books = books.clone();
    let publisher_symbols = config.symbols.clone();
    let publisher = tokio::spawn(async move {
        let stream = MockPublicStream::new(Decimal::new(100, 0), Duration::from_millis(250));
        feed_publisher::run(stream, publisher_symbols, publisher_bus, publisher_books).await
    });

    let logger_queue = bus.subscribe(vec!["#".into()]);
    let logger = tokio::spawn(feed_logger::run(update_log_store.clone(), logger_queue));

    // Each strategy's `UserStream` half is polled on its own task and fed
    // back through `account_tx`, tagged by index, so the orchestrator's
    // single loop remains the only mutator of `strategies` (spec.md §5).
    let (account_tx, account_rx) = mpsc::unbounded_channel();
    let mut account_pollers = Vec::with_capacity(user_streams.len());
    for (index, mut stream) in user_streams.into_iter().enumerate() {
        let tx = account_tx.clone();
        account_pollers.push(tokio::spawn(async move {
            loop {
                match stream.recv().await {
                    Ok(event) => {
                        if tx.send((index, event)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(strategy_index = index, error = %err, "account stream closed");
                        break;
                    }
                }
            }
        }));
    }
    drop(account_tx);

    let orchestrator_queue = bus.subscribe(vec!["#".into()]);
    let run_future = orchestrator.run_with_account_events(orchestrator_queue, account_rx);

    tokio::select! {
        _ = run_future => {
            info!("orchestrator stopped (feed lag watchdog or bus closed)");
        }
        _ = shutdown::wait_for_shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    publisher.abort();
    logger.abort();
    for poller in account_pollers {
        poller.abort();
    }

    Ok(())
}
