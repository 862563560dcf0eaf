//! Order intent and in-flight progress.

use serde::{Deserialize, Serialize};

/// Which side of the book an order rests or trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Which tree an order is currently resting in, and at what key.
///
/// This replaces the reference implementation's intrusive back-pointer from an
/// order to its owning level: rather than an order holding a raw pointer into a
/// level's node, it holds a plain, invalidatable key. Removing an order from a
/// level simply sets this field back to `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resting {
    /// Resting as a plain limit order at `price` in the bid/ask tree.
    Limit { price: u64 },
    /// Resting as a regular stop order at `stop_price` in the stop tree.
    Stop { stop_price: u64 },
    /// Resting as a trailing stop order at `stop_price` in the trailing-stop tree.
    TrailingStop { stop_price: u64 },
}

/// An order: immutable intent plus mutable execution progress.
///
/// Invariant: `executed + leaves == quantity` holds for the lifetime of the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub symbol_id: u64,
    pub user_id: u64,
    pub side: Side,
    pub price: u64,
    pub stop_price: u64,
    pub quantity: u64,
    pub executed: u64,
    pub leaves: u64,
    pub max_visible: u64,
    pub trailing_distance: i64,
    pub trailing_step: i64,

    /// Where this order currently rests, if anywhere. `None` while an order is
    /// being matched transiently during a call (it is inserted into a tree only
    /// after the aggressor match phase leaves it with leftover quantity).
    #[serde(skip)]
    pub resting: Option<Resting>,
}

impl Order {
    /// A plain limit order (`stop_price = 0`, fully visible).
    pub fn limit(id: u64, symbol_id: u64, user_id: u64, side: Side, price: u64, quantity: u64) -> Self {
        Self {
            id,
            symbol_id,
            user_id,
            side,
            price,
            stop_price: 0,
            quantity,
            executed: 0,
            leaves: quantity,
            max_visible: u64::MAX,
            trailing_distance: 0,
            trailing_step: 0,
            resting: None,
        }
    }

    /// A limit order that only ever shows `max_visible` quantity (iceberg).
    pub fn iceberg(
        id: u64,
        symbol_id: u64,
        user_id: u64,
        side: Side,
        price: u64,
        quantity: u64,
        max_visible: u64,
    ) -> Self {
        Self {
            max_visible,
            ..Self::limit(id, symbol_id, user_id, side, price, quantity)
        }
    }

    /// A regular stop order: rests in the stop tree until `stop_price` is crossed.
    pub fn stop(
        id: u64,
        symbol_id: u64,
        user_id: u64,
        side: Side,
        price: u64,
        stop_price: u64,
        quantity: u64,
    ) -> Self {
        Self {
            stop_price,
            ..Self::limit(id, symbol_id, user_id, side, price, quantity)
        }
    }

    /// A trailing stop order. `trailing_distance` is absolute ticks when
    /// non-negative, basis points of the market price when negative (see
    /// [`crate::repricing::calculate_trailing_stop_price`]).
    pub fn trailing_stop(
        id: u64,
        symbol_id: u64,
        user_id: u64,
        side: Side,
        price: u64,
        stop_price: u64,
        quantity: u64,
        trailing_distance: i64,
        trailing_step: i64,
    ) -> Self {
        Self {
            stop_price,
            trailing_distance,
            trailing_step,
            ..Self::limit(id, symbol_id, user_id, side, price, quantity)
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self.side, Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self.side, Side::Sell)
    }

    /// Non-zero stop price and no trailing distance: a regular stop order.
    pub fn is_stop(&self) -> bool {
        self.stop_price != 0 && self.trailing_distance == 0
    }

    /// Non-zero stop price and a non-zero trailing distance: a trailing stop.
    pub fn is_trailing_stop(&self) -> bool {
        self.stop_price != 0 && self.trailing_distance != 0
    }

    pub fn hidden_quantity(&self) -> u64 {
        self.leaves.saturating_sub(self.max_visible)
    }

    pub fn visible_quantity(&self) -> u64 {
        self.leaves.min(self.max_visible)
    }

    /// Reduces `leaves`/`executed` by `qty`, clamped to the current leaves.
    /// Returns the amount actually removed.
    pub fn apply_execution(&mut self, qty: u64) -> u64 {
        let qty = qty.min(self.leaves);
        self.leaves -= qty;
        self.executed += qty;
        qty
    }

    /// Reduces `leaves` by `qty` without counting it as executed (a cancel-style
    /// reduction). Returns the amount actually removed.
    pub fn apply_reduction(&mut self, qty: u64) -> u64 {
        let qty = qty.min(self.leaves);
        self.leaves -= qty;
        qty
    }
}
