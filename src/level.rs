//! Price levels: one price bucket, one side, an insertion-ordered order list.

use serde::{Deserialize, Serialize};

/// Which side of a tree a level belongs to, for comparison purposes.
///
/// Regular stop levels are typed `Ask` for the buy-stop tree and `Bid` for the
/// sell-stop tree (and likewise for trailing stops) even though they hold stop
/// prices rather than limit prices — this mirrors the reference implementation's
/// `LevelType` tagging, which exists purely so shared level-tree code can compare
/// "is this level on the side whose best element is the maximum/minimum price".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelKind {
    Bid,
    Ask,
}

/// A single price bucket on one side of one tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    pub kind: LevelKind,
    pub price: u64,
    pub total_volume: u64,
    pub hidden_volume: u64,
    pub visible_volume: u64,
    /// Order ids at this level, oldest first (time priority).
    pub order_ids: Vec<u64>,
}

impl Level {
    pub fn new(kind: LevelKind, price: u64) -> Self {
        Self {
            kind,
            price,
            total_volume: 0,
            hidden_volume: 0,
            visible_volume: 0,
            order_ids: Vec::new(),
        }
    }

    pub fn orders_count(&self) -> usize {
        self.order_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_volume == 0
    }

    pub fn push(&mut self, order_id: u64, leaves: u64, hidden: u64, visible: u64) {
        self.order_ids.push(order_id);
        self.total_volume += leaves;
        self.hidden_volume += hidden;
        self.visible_volume += visible;
    }

    /// Removes `delta` leaves (and the associated hidden/visible split) from the
    /// level's aggregates. If `remove_from_list` the order is also dropped from
    /// `order_ids` (used when the order's leaves hit zero or it is being deleted
    /// outright).
    pub fn shrink(&mut self, order_id: u64, delta: u64, hidden_delta: u64, visible_delta: u64, remove_from_list: bool) {
        self.total_volume = self.total_volume.saturating_sub(delta);
        self.hidden_volume = self.hidden_volume.saturating_sub(hidden_delta);
        self.visible_volume = self.visible_volume.saturating_sub(visible_delta);
        if remove_from_list {
            if let Some(pos) = self.order_ids.iter().position(|&id| id == order_id) {
                self.order_ids.remove(pos);
            }
        }
    }
}

/// The kind of mutation a [`LevelUpdate`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateKind {
    /// The mutation created the level.
    Add,
    /// The level already existed and was mutated in place.
    Update,
    /// The mutation emptied and removed the level.
    Delete,
}

/// A notification describing one level mutation, for observability.
///
/// This is a pure data contract: the engine emits these through a `tracing`
/// event on every mutation and, if a caller installed one via
/// [`crate::manager::MarketManager::set_level_update_listener`], passes a copy to
/// that listener too. Nothing internal depends on a `LevelUpdate` being observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub kind: UpdateKind,
    pub level: Level,
    pub is_top: bool,
}
