//! Participant identity and cash balance.

use serde::{Deserialize, Serialize};

/// A trading participant.
///
/// `balance` accumulates signed trade cash as the user's resting and aggressor
/// orders execute: a buy subtracts `price * quantity`, a sell adds it. It starts
/// at zero and may go negative; this engine does not enforce margin or risk limits
/// (see the crate-level Non-goals).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub balance: i64,
}

impl User {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            balance: 0,
        }
    }
}
