//! The top-level aggregate: symbols, users, order books, and the global order
//! index, plus the public mutation API.

use std::collections::HashMap;

use tracing::{info, trace, warn};

use crate::book::OrderBook;
use crate::error::{MarketError, MarketResult};
use crate::level::LevelUpdate;
use crate::matching;
use crate::order::Order;
use crate::snapshot::MarketManagerSnapshot;
use crate::symbol::Symbol;
use crate::user::User;

/// A callback invoked with every [`LevelUpdate`] produced by a mutation, in
/// emission order. Installed via [`MarketManager::set_level_update_listener`];
/// purely an observability hook, never required for correctness.
pub type LevelUpdateListener = Box<dyn FnMut(&LevelUpdate) + Send>;

/// Owns all market state: symbols, users, order books, and every live order.
///
/// `MarketManager` is not internally synchronized (see the crate's concurrency
/// notes) — it is meant to be driven by one thread at a time, or wrapped in a
/// `Mutex` by a caller that needs shared access.
pub struct MarketManager {
    symbols: Vec<Option<Symbol>>,
    users: Vec<Option<User>>,
    order_books: Vec<Option<OrderBook>>,
    orders: HashMap<u64, Order>,
    orders_count: u64,
    listener: Option<LevelUpdateListener>,
}

impl Default for MarketManager {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_len<T>(vec: &mut Vec<Option<T>>, idx: usize) {
    if vec.len() <= idx {
        vec.resize_with(idx + 1, || None);
    }
}

impl MarketManager {
    pub fn new() -> Self {
        Self {
            symbols: Vec::new(),
            users: Vec::new(),
            order_books: Vec::new(),
            orders: HashMap::new(),
            orders_count: 1,
            listener: None,
        }
    }

    /// Installs a callback to be invoked synchronously with every `LevelUpdate`
    /// produced by subsequent mutations.
    pub fn set_level_update_listener(&mut self, listener: LevelUpdateListener) {
        self.listener = Some(listener);
    }

    pub fn orders_count(&self) -> u64 {
        self.orders_count
    }

    fn dispatch_updates(&mut self, updates: Vec<LevelUpdate>) {
        if let Some(listener) = self.listener.as_mut() {
            for update in &updates {
                listener(update);
            }
        }
    }

    // -- read accessors -------------------------------------------------------

    pub fn symbol(&self, id: u64) -> Option<&Symbol> {
        self.symbols.get(id as usize).and_then(|s| s.as_ref())
    }

    pub fn user(&self, id: u64) -> Option<&User> {
        self.users.get(id as usize).and_then(|u| u.as_ref())
    }

    pub fn order_book(&self, symbol_id: u64) -> Option<&OrderBook> {
        self.order_books.get(symbol_id as usize).and_then(|b| b.as_ref())
    }

    pub fn order(&self, id: u64) -> Option<&Order> {
        self.orders.get(&id)
    }

    // -- symbol / user registry -------------------------------------------------

    pub fn add_symbol(&mut self, symbol: Symbol) -> MarketResult<()> {
        let idx = symbol.id as usize;
        ensure_len(&mut self.symbols, idx);
        if self.symbols[idx].is_some() {
            return Err(MarketError::SymbolDuplicate);
        }
        info!(symbol_id = symbol.id, "symbol added");
        self.symbols[idx] = Some(symbol);
        Ok(())
    }

    pub fn delete_symbol(&mut self, id: u64) -> MarketResult<()> {
        let idx = id as usize;
        if !self.symbols.get(idx).map(|s| s.is_some()).unwrap_or(false) {
            return Err(MarketError::SymbolNotFound);
        }
        self.symbols[idx] = None;
        info!(symbol_id = id, "symbol deleted");
        Ok(())
    }

    pub fn add_user(&mut self, user: User) -> MarketResult<()> {
        let idx = user.id as usize;
        ensure_len(&mut self.users, idx);
        if self.users[idx].is_some() {
            return Err(MarketError::UserDuplicate);
        }
        info!(user_id = user.id, "user added");
        self.users[idx] = Some(user);
        Ok(())
    }

    /// Deletes a user. Does not cancel the user's open orders — they continue
    /// to rest and trade exactly as before. See the crate-level design notes
    /// for why this follows the reference implementation's behavior here.
    pub fn delete_user(&mut self, id: u64) -> MarketResult<()> {
        let idx = id as usize;
        if !self.users.get(idx).map(|u| u.is_some()).unwrap_or(false) {
            return Err(MarketError::UserNotFound);
        }
        self.users[idx] = None;
        warn!(user_id = id, "user deleted while possibly holding open orders");
        Ok(())
    }

    // -- order book lifecycle -------------------------------------------------

    pub fn add_order_book(&mut self, symbol_id: u64) -> MarketResult<()> {
        let idx = symbol_id as usize;
        let symbol = self
            .symbols
            .get(idx)
            .and_then(|s| s.clone())
            .ok_or(MarketError::SymbolNotFound)?;
        ensure_len(&mut self.order_books, idx);
        if self.order_books[idx].is_some() {
            return Err(MarketError::OrderBookDuplicate);
        }
        info!(symbol_id, "order book added");
        self.order_books[idx] = Some(OrderBook::new(symbol));
        Ok(())
    }

    pub fn delete_order_book(&mut self, symbol_id: u64) -> MarketResult<()> {
        let idx = symbol_id as usize;
        if !self.order_books.get(idx).map(|b| b.is_some()).unwrap_or(false) {
            return Err(MarketError::OrderBookNotFound);
        }
        self.order_books[idx] = None;
        info!(symbol_id, "order book deleted");
        Ok(())
    }

    // -- order placement / reduction / deletion --------------------------------

    /// Submits a new order: matches it against the book immediately, rests any
    /// remainder (as a limit, stop, or trailing-stop order depending on its
    /// fields), then runs the match/stop-activation cascade.
    pub fn add_order(&mut self, mut order: Order) -> MarketResult<()> {
        let idx = order.symbol_id as usize;
        if !self.order_books.get(idx).map(|b| b.is_some()).unwrap_or(false) {
            return Err(MarketError::OrderBookNotFound);
        }

        self.orders_count += 1;

        if self.orders.contains_key(&order.id) {
            return Err(MarketError::OrderDuplicate);
        }

        let symbol_id = order.symbol_id;
        let mut updates = Vec::new();
        {
            let book = self.order_books[idx].as_mut().expect("checked above");
            // Regular limit/iceberg orders aggress immediately; a fresh stop or
            // trailing-stop order never trades on arrival — it only rests and
            // waits for activation.
            if !order.is_stop() && !order.is_trailing_stop() {
                matching::match_incoming_order(book, &mut self.orders, &mut self.users, &mut order, &mut updates);
            }
            if order.leaves > 0 {
                matching::rest_order(book, &mut self.orders, &mut updates, order);
            }
            matching::match_book(book, &mut self.orders, &mut self.users, &mut updates);
            book.reset_matching_price();
        }
        trace!(symbol_id, updates = updates.len(), "add_order completed");
        self.dispatch_updates(updates);
        Ok(())
    }

    /// Reduces a resting order's leaves by `qty` (capped at its current
    /// leaves), removing it if that empties it, then runs the cascade.
    pub fn reduce_order(&mut self, id: u64, qty: u64) -> MarketResult<()> {
        if id == 0 {
            return Err(MarketError::OrderIdInvalid);
        }
        if qty == 0 {
            return Err(MarketError::OrderQuantityInvalid);
        }
        let order = self.orders.get(&id).ok_or(MarketError::OrderNotFound)?;
        let symbol_id = order.symbol_id;
        let idx = symbol_id as usize;
        let mut updates = Vec::new();
        {
            let book = self.order_books[idx].as_mut().ok_or(MarketError::OrderBookNotFound)?;
            matching::reduce_order_in_tree(book, &mut self.orders, &mut updates, id, qty);
            matching::match_book(book, &mut self.orders, &mut self.users, &mut updates);
            book.reset_matching_price();
        }
        trace!(order_id = id, "reduce_order completed");
        self.dispatch_updates(updates);
        Ok(())
    }

    /// Removes an order outright, regardless of remaining leaves, then runs
    /// the cascade.
    pub fn delete_order(&mut self, id: u64) -> MarketResult<()> {
        if id == 0 {
            return Err(MarketError::OrderIdInvalid);
        }
        let order = self.orders.get(&id).ok_or(MarketError::OrderNotFound)?;
        let symbol_id = order.symbol_id;
        let idx = symbol_id as usize;
        let mut updates = Vec::new();
        {
            let book = self.order_books[idx].as_mut().ok_or(MarketError::OrderBookNotFound)?;
            matching::delete_order_in_tree(book, &mut self.orders, &mut updates, id);
            matching::match_book(book, &mut self.orders, &mut self.users, &mut updates);
            book.reset_matching_price();
        }
        trace!(order_id = id, "delete_order completed");
        self.dispatch_updates(updates);
        Ok(())
    }

    /// Builds a point-in-time snapshot of everything currently held.
    pub fn snapshot(&self) -> MarketManagerSnapshot {
        MarketManagerSnapshot {
            symbols: self.symbols.iter().flatten().cloned().collect(),
            users: self.users.iter().flatten().cloned().collect(),
            order_books: self.order_books.iter().flatten().cloned().collect(),
            orders: self.orders.values().cloned().collect(),
            orders_count: self.orders_count,
        }
    }
}
