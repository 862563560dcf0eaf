//! Per-symbol order book: six price-level trees, best-level access, and the
//! price watermarks used to synthesize a market price for stop activation.
//!
//! The reference implementation keeps each tree as an intrusive `boost::intrusive`
//! set with cached `best_*` pointers and manual `GetNextLevel`-style iterators to
//! advance past a level it just deleted. A `BTreeMap<u64, Level>` gives the same
//! ordering for free and makes "best" a `first_key_value`/`last_key_value` call
//! rather than a pointer that has to be kept in sync by hand — the original
//! design notes call this out explicitly as an equivalent substitution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::level::{Level, LevelKind, UpdateKind, LevelUpdate};
use crate::order::Side;
use crate::symbol::Symbol;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: Symbol,

    pub bids: BTreeMap<u64, Level>,
    pub asks: BTreeMap<u64, Level>,

    pub buy_stop: BTreeMap<u64, Level>,
    pub sell_stop: BTreeMap<u64, Level>,

    pub trailing_buy_stop: BTreeMap<u64, Level>,
    pub trailing_sell_stop: BTreeMap<u64, Level>,

    pub last_bid_price: u64,
    pub last_ask_price: u64,
    pub matching_bid_price: u64,
    pub matching_ask_price: u64,
    pub trailing_bid_price: u64,
    pub trailing_ask_price: u64,
}

impl OrderBook {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            buy_stop: BTreeMap::new(),
            sell_stop: BTreeMap::new(),
            trailing_buy_stop: BTreeMap::new(),
            trailing_sell_stop: BTreeMap::new(),
            last_bid_price: 0,
            last_ask_price: u64::MAX,
            matching_bid_price: 0,
            matching_ask_price: u64::MAX,
            trailing_bid_price: 0,
            trailing_ask_price: u64::MAX,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty()
            && self.asks.is_empty()
            && self.buy_stop.is_empty()
            && self.sell_stop.is_empty()
            && self.trailing_buy_stop.is_empty()
            && self.trailing_sell_stop.is_empty()
    }

    // -- best-level access -------------------------------------------------

    pub fn best_bid(&self) -> Option<&Level> {
        self.bids.values().next_back()
    }

    pub fn best_ask(&self) -> Option<&Level> {
        self.asks.values().next()
    }

    /// Buy-stop levels are typed `Ask`; best is the minimum stop price, matching
    /// the side that first activates as the market falls toward it from above.
    pub fn best_buy_stop(&self) -> Option<&Level> {
        self.buy_stop.values().next()
    }

    /// Sell-stop levels are typed `Bid`; best is the maximum stop price.
    pub fn best_sell_stop(&self) -> Option<&Level> {
        self.sell_stop.values().next_back()
    }

    pub fn best_trailing_buy_stop(&self) -> Option<&Level> {
        self.trailing_buy_stop.values().next()
    }

    pub fn best_trailing_sell_stop(&self) -> Option<&Level> {
        self.trailing_sell_stop.values().next_back()
    }

    // -- market price synthesis --------------------------------------------

    pub fn market_price_bid(&self) -> u64 {
        let best = self.best_bid().map(|l| l.price).unwrap_or(0);
        self.matching_bid_price.max(best)
    }

    pub fn market_price_ask(&self) -> u64 {
        let best = self.best_ask().map(|l| l.price).unwrap_or(u64::MAX);
        self.matching_ask_price.min(best)
    }

    pub fn market_trailing_stop_price_bid(&self) -> u64 {
        let best = self.best_bid().map(|l| l.price).unwrap_or(0);
        self.last_bid_price.min(best)
    }

    pub fn market_trailing_stop_price_ask(&self) -> u64 {
        let best = self.best_ask().map(|l| l.price).unwrap_or(u64::MAX);
        self.last_ask_price.max(best)
    }

    pub fn update_last_price(&mut self, side: Side, price: u64) {
        match side {
            Side::Buy => self.last_bid_price = price,
            Side::Sell => self.last_ask_price = price,
        }
    }

    pub fn update_matching_price(&mut self, side: Side, price: u64) {
        match side {
            Side::Buy => self.matching_bid_price = price,
            Side::Sell => self.matching_ask_price = price,
        }
    }

    pub fn reset_matching_price(&mut self) {
        self.matching_bid_price = 0;
        self.matching_ask_price = u64::MAX;
    }

    // -- generic tree mutation ----------------------------------------------

    fn tree_mut(&mut self, tree: Tree) -> &mut BTreeMap<u64, Level> {
        match tree {
            Tree::Bids => &mut self.bids,
            Tree::Asks => &mut self.asks,
            Tree::BuyStop => &mut self.buy_stop,
            Tree::SellStop => &mut self.sell_stop,
            Tree::TrailingBuyStop => &mut self.trailing_buy_stop,
            Tree::TrailingSellStop => &mut self.trailing_sell_stop,
        }
    }

    fn is_top(&self, tree: Tree, price: u64) -> bool {
        match tree {
            Tree::Bids => self.best_bid().map(|l| l.price) == Some(price),
            Tree::Asks => self.best_ask().map(|l| l.price) == Some(price),
            Tree::BuyStop => self.best_buy_stop().map(|l| l.price) == Some(price),
            Tree::SellStop => self.best_sell_stop().map(|l| l.price) == Some(price),
            Tree::TrailingBuyStop => self.best_trailing_buy_stop().map(|l| l.price) == Some(price),
            Tree::TrailingSellStop => self.best_trailing_sell_stop().map(|l| l.price) == Some(price),
        }
    }

    /// Adds `order_id` to the level at `price` in `tree`, creating the level if
    /// absent. Returns the resulting [`LevelUpdate`].
    fn add_to_tree(
        &mut self,
        tree: Tree,
        kind: LevelKind,
        price: u64,
        order_id: u64,
        leaves: u64,
        hidden: u64,
        visible: u64,
    ) -> LevelUpdate {
        let map = self.tree_mut(tree);
        let created = !map.contains_key(&price);
        let level = map.entry(price).or_insert_with(|| Level::new(kind, price));
        level.push(order_id, leaves, hidden, visible);
        let snapshot = level.clone();
        LevelUpdate {
            kind: if created { UpdateKind::Add } else { UpdateKind::Update },
            is_top: self.is_top(tree, price),
            level: snapshot,
        }
    }

    /// Shrinks the level at `price` in `tree` by the given deltas, removing
    /// `order_id` from its list when `remove_from_list`, and deleting the level
    /// entirely if it becomes empty. Returns the resulting [`LevelUpdate`], or
    /// `None` if the level did not exist.
    fn shrink_in_tree(
        &mut self,
        tree: Tree,
        price: u64,
        order_id: u64,
        delta: u64,
        hidden_delta: u64,
        visible_delta: u64,
        remove_from_list: bool,
    ) -> Option<LevelUpdate> {
        let is_top = self.is_top(tree, price);
        let map = self.tree_mut(tree);
        let level = map.get_mut(&price)?;
        level.shrink(order_id, delta, hidden_delta, visible_delta, remove_from_list);
        if level.is_empty() {
            let snapshot = map.remove(&price).expect("level present");
            Some(LevelUpdate {
                kind: UpdateKind::Delete,
                is_top,
                level: snapshot,
            })
        } else {
            let snapshot = level.clone();
            Some(LevelUpdate {
                kind: UpdateKind::Update,
                is_top,
                level: snapshot,
            })
        }
    }

    // -- regular limit orders ------------------------------------------------

    pub fn add_limit(&mut self, side: Side, order_id: u64, price: u64, leaves: u64, hidden: u64, visible: u64) -> LevelUpdate {
        let (tree, kind) = match side {
            Side::Buy => (Tree::Bids, LevelKind::Bid),
            Side::Sell => (Tree::Asks, LevelKind::Ask),
        };
        self.add_to_tree(tree, kind, price, order_id, leaves, hidden, visible)
    }

    pub fn shrink_limit(
        &mut self,
        side: Side,
        order_id: u64,
        price: u64,
        delta: u64,
        hidden_delta: u64,
        visible_delta: u64,
        remove_from_list: bool,
    ) -> Option<LevelUpdate> {
        let tree = match side {
            Side::Buy => Tree::Bids,
            Side::Sell => Tree::Asks,
        };
        self.shrink_in_tree(tree, price, order_id, delta, hidden_delta, visible_delta, remove_from_list)
    }

    // -- regular stop orders --------------------------------------------------

    /// Buy-stop levels are typed `Ask` (compared against the ask side); sell-stop
    /// levels are typed `Bid`.
    pub fn add_stop(&mut self, side: Side, order_id: u64, stop_price: u64, leaves: u64, hidden: u64, visible: u64) -> LevelUpdate {
        let (tree, kind) = match side {
            Side::Buy => (Tree::BuyStop, LevelKind::Ask),
            Side::Sell => (Tree::SellStop, LevelKind::Bid),
        };
        self.add_to_tree(tree, kind, stop_price, order_id, leaves, hidden, visible)
    }

    pub fn shrink_stop(
        &mut self,
        side: Side,
        order_id: u64,
        stop_price: u64,
        delta: u64,
        hidden_delta: u64,
        visible_delta: u64,
        remove_from_list: bool,
    ) -> Option<LevelUpdate> {
        let tree = match side {
            Side::Buy => Tree::BuyStop,
            Side::Sell => Tree::SellStop,
        };
        self.shrink_in_tree(tree, stop_price, order_id, delta, hidden_delta, visible_delta, remove_from_list)
    }

    // -- trailing stop orders ---------------------------------------------------

    pub fn add_trailing_stop(&mut self, side: Side, order_id: u64, stop_price: u64, leaves: u64, hidden: u64, visible: u64) -> LevelUpdate {
        let (tree, kind) = match side {
            Side::Buy => (Tree::TrailingBuyStop, LevelKind::Ask),
            Side::Sell => (Tree::TrailingSellStop, LevelKind::Bid),
        };
        self.add_to_tree(tree, kind, stop_price, order_id, leaves, hidden, visible)
    }

    pub fn shrink_trailing_stop(
        &mut self,
        side: Side,
        order_id: u64,
        stop_price: u64,
        delta: u64,
        hidden_delta: u64,
        visible_delta: u64,
        remove_from_list: bool,
    ) -> Option<LevelUpdate> {
        let tree = match side {
            Side::Buy => Tree::TrailingBuyStop,
            Side::Sell => Tree::TrailingSellStop,
        };
        self.shrink_in_tree(tree, stop_price, order_id, delta, hidden_delta, visible_delta, remove_from_list)
    }
}

#[derive(Debug, Clone, Copy)]
enum Tree {
    Bids,
    Asks,
    BuyStop,
    SellStop,
    TrailingBuyStop,
    TrailingSellStop,
}
