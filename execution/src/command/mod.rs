//! The trading state machine (spec.md §4.6), grounded on
//! `services/bot/commands/command_handler.py`.
//!
//! [`Command`] is a tagged sum type, not an inheritance tree (spec.md §9):
//! `PlaceOrder | TrailingStop | Notify`, each wrapped in a [`QueuedCommand`]
//! carrying the `next_time` re-queue flag. [`CommandHandler`] owns a
//! per-symbol ordered, hash-deduplicated queue of these and the short-TTL
//! `waiting` map that is the at-most-once placement guard.

use crate::client::UserRest;
use crate::error::ExecutionError;
use crate::model::{ClientOrderId, Order, OrderContext, OrderType, TimeInForce};
use crate::storage::LocalStorage;
use kestrel_data::event::BookUpdate;
use kestrel_markets::{Contract, OrderSide, PositionSide, Symbol};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// The short-TTL "at-most-once" guard (spec.md §5 "`waiting[client_order_id]`
/// auto-expires after 30 s").
pub const WAITING_TTL: Duration = Duration::from_secs(30);

/// Cross-symbol execution batch size and pacing (spec.md §4.6/§5).
pub const BATCH_SIZE: usize = 10;
pub const BATCH_GAP: Duration = Duration::from_millis(500);

/// Poll cadence for `wait_for_processed` (spec.md §5).
pub const ORDER_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceOrder {
    pub contract: Contract,
    pub position_side: PositionSide,
    pub order_side: OrderSide,
    pub quantity: Decimal,
    pub context: OrderContext,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notify {
    pub position_id: String,
    pub order_id: Option<String>,
    pub message: String,
}

/// A trailing-reference-price command (spec.md §4.6 "Trailing semantics").
/// `stop_loss` is the mutable reference price; `next_command` forms a short
/// linear chain, never a cycle (spec.md §9).
#[derive(Debug, Clone, PartialEq)]
pub struct TrailingStop {
    pub contract: Contract,
    pub book: BookUpdate,
    pub order_side: OrderSide,
    pub callback_rate: Decimal,
    pub stop_loss: Decimal,
    pub next_command: Box<Command>,
}

impl TrailingStop {
    pub fn new(contract: Contract, book: BookUpdate, order_side: OrderSide, callback_rate: Decimal, next_command: Command) -> Self {
        let stop_loss = Self::reference(order_side, book, callback_rate);
        Self {
            contract,
            book,
            order_side,
            callback_rate,
            stop_loss,
            next_command: Box::new(next_command),
        }
    }

    fn reference(order_side: OrderSide, book: BookUpdate, callback_rate: Decimal) -> Decimal {
        match order_side {
            OrderSide::Buy => book.bid + book.bid * callback_rate,
            OrderSide::Sell => book.ask - book.ask * callback_rate,
        }
    }

    /// Feeds a book update. Returns the chained command the moment the
    /// reference is crossed (spec.md §4.6, Testable Property 4 "Trailing
    /// law"); abnormal prices are ignored (spec.md §4.6 "Abnormal prices").
    pub fn on_book(&mut self, book: BookUpdate) -> Option<Command> {
        if book.is_abnormal() {
            return None;
        }
        match self.order_side {
            OrderSide::Buy => {
                let candidate = book.bid + book.bid * self.callback_rate;
                if candidate < self.stop_loss {
                    self.stop_loss = candidate;
                    self.book = book;
                    None
                } else if book.bid >= self.stop_loss {
                    Some((*self.next_command).clone())
                } else {
                    None
                }
            }
            OrderSide::Sell => {
                let candidate = book.ask - book.ask * self.callback_rate;
                if candidate > self.stop_loss {
                    self.stop_loss = candidate;
                    self.book = book;
                    None
                } else if book.ask <= self.stop_loss {
                    Some((*self.next_command).clone())
                } else {
                    None
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PlaceOrder(PlaceOrder),
    TrailingStop(TrailingStop),
    Notify(Notify),
}

/// Structural hash used for dedup (spec.md §4.6 `append` / Testable
/// Property 3 "Command dedup"). Debug-formatting every field is simpler and
/// just as correct as deriving `Hash` across types (`Decimal`,
/// `serde_json::Value`) that don't all implement it uniformly.
fn command_hash(command: &Command) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    format!("{command:?}").hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct QueuedCommand {
    pub command: Command,
    pub next_time: bool,
}

#[derive(Default)]
struct CommandQueue {
    items: Vec<QueuedCommand>,
    hashes: HashSet<u64>,
}

impl CommandQueue {
    fn append(&mut self, command: Command) -> bool {
        let hash = command_hash(&command);
        if self.hashes.contains(&hash) {
            return false;
        }
        self.hashes.insert(hash);
        self.items.push(QueuedCommand { command, next_time: false });
        true
    }

    fn take(&mut self) -> Vec<QueuedCommand> {
        self.hashes.clear();
        std::mem::take(&mut self.items)
    }

    fn restore(&mut self, items: Vec<QueuedCommand>) {
        self.hashes = items.iter().map(|q| command_hash(&q.command)).collect();
        self.items = items;
    }

    fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

struct WaitingEntry {
    place_order: PlaceOrder,
    inserted_at: Instant,
}

enum HandleOutcome {
    Consumed,
    Requeue(Command),
    Chain(Command),
}

/// Owns every symbol's ordered command queue and the `waiting` at-most-once
/// guard (spec.md §4.6).
pub struct CommandHandler {
    user_rest: Arc<dyn UserRest>,
    queues: HashMap<Symbol, CommandQueue>,
    waiting: HashMap<ClientOrderId, WaitingEntry>,
}

impl CommandHandler {
    pub fn new(user_rest: Arc<dyn UserRest>) -> Self {
        Self {
            user_rest,
            queues: HashMap::new(),
            waiting: HashMap::new(),
        }
    }

    /// `append(symbol, cmd)` (spec.md §4.6): deduplicates by structural
    /// hash, logging and discarding a duplicate.
    pub fn append(&mut self, symbol: Symbol, command: Command) {
        let queue = self.queues.entry(symbol.clone()).or_default();
        if !queue.append(command) {
            info!(%symbol, "duplicate command ignored");
        }
    }

    pub fn has_pending(&self, symbol: &Symbol) -> bool {
        self.queues.get(symbol).is_some_and(|q| !q.is_empty())
    }

    /// Drops `waiting` entries older than [`WAITING_TTL`] (spec.md §5): the
    /// at-most-once guard. An Order that later arrives for an expired
    /// client_order_id is silently ignored by `update_order`.
    pub fn prune_waiting(&mut self) {
        let now = Instant::now();
        self.waiting.retain(|_, entry| now.duration_since(entry.inserted_at) < WAITING_TTL);
    }

    /// Runs one tick of `symbol`'s queue to completion (spec.md §4.6
    /// `execute(symbol)`): every command either consumes itself, re-queues
    /// for next tick, or chains into an immediately-processed successor.
    /// Execution is serialized per symbol by construction: callers must not
    /// invoke this concurrently for the same symbol.
    pub async fn execute(&mut self, symbol: &Symbol, book: BookUpdate, storage: &mut LocalStorage) {
        let Some(items) = self.queues.get_mut(symbol).map(CommandQueue::take) else {
            return;
        };

        let mut remaining = Vec::new();
        for queued in items {
            let mut current = queued.command;
            loop {
                match self.handle(symbol, current, book, storage).await {
                    HandleOutcome::Consumed => break,
                    HandleOutcome::Requeue(command) => {
                        remaining.push(QueuedCommand { command, next_time: true });
                        break;
                    }
                    HandleOutcome::Chain(next) => {
                        current = next;
                        continue;
                    }
                }
            }
        }

        self.queues.entry(symbol.clone()).or_default().restore(remaining);
    }

    /// Batches `execute` across many symbols in groups of [`BATCH_SIZE`]
    /// with a [`BATCH_GAP`] pacing sleep between groups, to stay under the
    /// venue's rate budget (spec.md §4.6/§5).
    pub async fn execute_batch(&mut self, updates: &[(Symbol, BookUpdate)], storage: &mut LocalStorage) {
        for chunk in updates.chunks(BATCH_SIZE) {
            for (symbol, book) in chunk {
                self.execute(symbol, *book, storage).await;
            }
            if chunk.len() == BATCH_SIZE {
                tokio::time::sleep(BATCH_GAP).await;
            }
        }
    }

    async fn handle(
        &mut self,
        symbol: &Symbol,
        command: Command,
        book: BookUpdate,
        storage: &mut LocalStorage,
    ) -> HandleOutcome {
        match command {
            Command::Notify(notify) => {
                info!(position_id = %notify.position_id, message = %notify.message, "strategy notification");
                HandleOutcome::Consumed
            }
            Command::TrailingStop(mut trailing) => match trailing.on_book(book) {
                Some(next) => HandleOutcome::Chain(next),
                None => HandleOutcome::Requeue(Command::TrailingStop(trailing)),
            },
            Command::PlaceOrder(place) => {
                if let Err(err) = self.handle_place_order(symbol, place, storage).await {
                    warn!(%symbol, error = %err, "place order failed");
                }
                HandleOutcome::Consumed
            }
        }
    }

    async fn handle_place_order(
        &mut self,
        symbol: &Symbol,
        place: PlaceOrder,
        storage: &mut LocalStorage,
    ) -> Result<(), ExecutionError> {
        let client_order_id = ClientOrderId::new();
        self.waiting.insert(
            client_order_id,
            WaitingEntry {
                place_order: place.clone(),
                inserted_at: Instant::now(),
            },
        );

        let mut order = self
            .user_rest
            .place_order(
                client_order_id,
                &place.contract,
                OrderType::Market,
                place.quantity,
                place.order_side,
                place.position_side,
                None,
                Some(TimeInForce::ImmediateOrCancel),
            )
            .await?;

        while !order.status.is_processed() {
            tokio::time::sleep(ORDER_POLL_INTERVAL).await;
            order = self.user_rest.get_order(symbol, &order.id).await?;
        }

        self.update_order(order, storage).await
    }

    /// Idempotent order-fill persistence (spec.md §4.6 `update_order`): the
    /// same path both `handle_place_order`'s own poll loop and any
    /// user-stream order-trade-update event run through, which is what
    /// makes at-most-once placement hold (Testable Property 7).
    pub async fn update_order(&mut self, order: Order, storage: &mut LocalStorage) -> Result<(), ExecutionError> {
        if !storage.owns_symbol(&order.symbol) {
            return Ok(());
        }
        let Some(waiting_entry) = self.waiting.get(&order.client_order_id) else {
            return Ok(());
        };

        let mut order = order;
        let is_new = storage.get_order(&order.id).is_none();
        if is_new {
            order.context = waiting_entry.place_order.context.clone();
        }

        if order.status.is_filled() {
            let mut position = storage.get_or_create_position(&order.symbol, order.position_side, order.timestamp);
            position.apply_fill(&order, order.timestamp);
            order.position_id = Some(position.id.clone());
            storage
                .upsert_position(position)
                .await
                .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        }

        storage
            .upsert_order(order.clone())
            .await
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;

        if order.status.is_processed() {
            self.waiting.remove(&order.client_order_id);
        }
        Ok(())
    }
}
