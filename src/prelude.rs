//! Convenience re-exports for consumers of this crate.

pub use crate::book::OrderBook;
pub use crate::error::{MarketError, MarketResult};
pub use crate::level::{Level, LevelKind, LevelUpdate, UpdateKind};
pub use crate::manager::MarketManager;
pub use crate::order::{Order, Resting, Side};
pub use crate::symbol::Symbol;
pub use crate::user::User;
