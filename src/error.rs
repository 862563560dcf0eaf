//! Error taxonomy for the matching engine.
//!
//! Mirrors the reference implementation's `ErrorCode` enum one-to-one, but as an
//! idiomatic Rust error type with a hand-written [`std::fmt::Display`] and
//! [`std::error::Error`] impl rather than a derive, matching how this crate's
//! other error types are written.

use std::fmt;

/// Everything that can go wrong calling into [`crate::manager::MarketManager`].
///
/// Every public mutating method on `MarketManager` returns `Result<(), MarketError>`;
/// `Ok(())` stands in for a successful call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum MarketError {
    /// `add_symbol` was called with an id that is already registered.
    SymbolDuplicate,
    /// A symbol id was referenced that does not exist.
    SymbolNotFound,
    /// `add_order_book` was called for a symbol that already has a book.
    OrderBookDuplicate,
    /// An order book was referenced for a symbol with no book.
    OrderBookNotFound,
    /// An order id collided with one already present in the global index.
    OrderDuplicate,
    /// An order id was referenced that does not exist.
    OrderNotFound,
    /// Order id 0 is reserved and never valid.
    OrderIdInvalid,
    /// A reduce quantity of 0 was supplied.
    OrderQuantityInvalid,
    /// `add_user` was called with an id that is already registered.
    UserDuplicate,
    /// A user id was referenced that does not exist.
    UserNotFound,
}

impl fmt::Display for MarketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            MarketError::SymbolDuplicate => "symbol already exists",
            MarketError::SymbolNotFound => "symbol not found",
            MarketError::OrderBookDuplicate => "order book already exists",
            MarketError::OrderBookNotFound => "order book not found",
            MarketError::OrderDuplicate => "order already exists",
            MarketError::OrderNotFound => "order not found",
            MarketError::OrderIdInvalid => "order id is invalid",
            MarketError::OrderQuantityInvalid => "order quantity is invalid",
            MarketError::UserDuplicate => "user already exists",
            MarketError::UserNotFound => "user not found",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for MarketError {}

pub type MarketResult<T> = Result<T, MarketError>;
