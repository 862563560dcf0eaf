//! Point-in-time serialization of the whole market, for introspection and
//! tests. Not a persistence format — there is no versioning or checksum
//! machinery here, since durability is out of scope for this engine.

use serde::{Deserialize, Serialize};

use crate::book::OrderBook;
use crate::order::Order;
use crate::symbol::Symbol;
use crate::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketManagerSnapshot {
    pub symbols: Vec<Symbol>,
    pub users: Vec<User>,
    pub order_books: Vec<OrderBook>,
    pub orders: Vec<Order>,
    pub orders_count: u64,
}
