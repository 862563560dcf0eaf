//! Tradable instrument identity.

use serde::{Deserialize, Serialize};

/// Identity for a tradable instrument.
///
/// Symbol ids are dense indices into [`crate::manager::MarketManager`]'s symbol
/// table; registering symbol id `N` may grow the table up to `N`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: u64,
    pub name: String,
}

impl Symbol {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
