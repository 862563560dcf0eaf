//! Trade execution and the match/stop-activation cascade.
//!
//! Functions here take the pieces of [`crate::manager::MarketManager`] they need
//! as explicit `&mut` parameters instead of `&mut self`, so the manager can hold
//! several of them mutably at once (its order book, its order arena, its user
//! table) without fighting the borrow checker over one god-method.

use std::collections::HashMap;

use tracing::trace;

use crate::book::OrderBook;
use crate::level::LevelUpdate;
use crate::order::{Order, Side};
use crate::repricing::{
    calculate_trailing_stop_price, recalculate_trailing_buy_stop_watermark,
    recalculate_trailing_sell_stop_watermark,
};
use crate::user::User;

fn record(updates: &mut Vec<LevelUpdate>, update: LevelUpdate) {
    trace!(kind = ?update.kind, price = update.level.price, is_top = update.is_top, "level update");
    updates.push(update);
}

fn apply_trade_balance(users: &mut [Option<User>], user_id: u64, side: Side, qty: u64, price: u64) {
    let Some(Some(user)) = users.get_mut(user_id as usize) else {
        // The user was deleted while their order was still resting. Matching
        // still proceeds (the order itself is the source of truth for the
        // trade), but there is no balance to credit or debit.
        return;
    };
    let notional = (qty as i64).saturating_mul(price as i64);
    match side {
        Side::Buy => user.balance -= notional,
        Side::Sell => user.balance += notional,
    }
}

/// Rests a fully- or partially-filled order into the book, choosing the tree by
/// its stop/trailing-stop fields, and registers it in the order arena.
pub fn rest_order(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, updates: &mut Vec<LevelUpdate>, mut order: Order) {
    let hidden = order.hidden_quantity();
    let visible = order.visible_quantity();
    let update = if order.is_trailing_stop() {
        order.resting = Some(crate::order::Resting::TrailingStop { stop_price: order.stop_price });
        book.add_trailing_stop(order.side, order.id, order.stop_price, order.leaves, hidden, visible)
    } else if order.is_stop() {
        order.resting = Some(crate::order::Resting::Stop { stop_price: order.stop_price });
        book.add_stop(order.side, order.id, order.stop_price, order.leaves, hidden, visible)
    } else {
        order.resting = Some(crate::order::Resting::Limit { price: order.price });
        book.add_limit(order.side, order.id, order.price, order.leaves, hidden, visible)
    };
    record(updates, update);
    orders.insert(order.id, order);
}

/// Aggressor phase: walks the opposite side of the book against `incoming`
/// while it crosses, trading at the resting order's price. Stops once
/// `incoming` is filled or the book no longer crosses.
pub fn match_incoming_order(
    book: &mut OrderBook,
    orders: &mut HashMap<u64, Order>,
    users: &mut [Option<User>],
    incoming: &mut Order,
    updates: &mut Vec<LevelUpdate>,
) {
    loop {
        if incoming.leaves == 0 {
            break;
        }
        let crosses = match incoming.side {
            Side::Buy => book.best_ask().map(|l| incoming.price >= l.price).unwrap_or(false),
            Side::Sell => book.best_bid().map(|l| incoming.price <= l.price).unwrap_or(false),
        };
        if !crosses {
            break;
        }
        let resting_side = incoming.side.opposite();
        let price = match incoming.side {
            Side::Buy => book.best_ask().expect("checked above").price,
            Side::Sell => book.best_bid().expect("checked above").price,
        };
        let resting_id = match resting_side {
            Side::Sell => book.asks.get(&price).and_then(|l| l.order_ids.first().copied()),
            Side::Buy => book.bids.get(&price).and_then(|l| l.order_ids.first().copied()),
        };
        let Some(resting_id) = resting_id else { break };

        let qty = {
            let resting = orders.get(&resting_id).expect("resting order indexed");
            incoming.leaves.min(resting.leaves)
        };

        book.update_last_price(incoming.side, price);
        book.update_matching_price(incoming.side, price);
        book.update_last_price(resting_side, price);
        book.update_matching_price(resting_side, price);

        apply_trade_balance(users, incoming.user_id, incoming.side, qty, price);
        let resting_user = orders.get(&resting_id).unwrap().user_id;
        apply_trade_balance(users, resting_user, resting_side, qty, price);

        incoming.apply_execution(qty);

        let (hidden_delta, visible_delta, remove_fully) = {
            let resting = orders.get_mut(&resting_id).unwrap();
            let hidden_before = resting.hidden_quantity();
            let visible_before = resting.visible_quantity();
            resting.apply_execution(qty);
            let remove_fully = resting.leaves == 0;
            (
                hidden_before - resting.hidden_quantity(),
                visible_before - resting.visible_quantity(),
                remove_fully,
            )
        };

        if let Some(update) = book.shrink_limit(resting_side, resting_id, price, qty, hidden_delta, visible_delta, remove_fully) {
            record(updates, update);
        }
        if remove_fully {
            orders.remove(&resting_id);
        }
    }
}

/// Removes `order_id` entirely (used for deletion, and for the smaller-leaves
/// side of a cascade trade). `recursive` callers must not trigger a nested
/// `match_book` — only the top-level caller resets matching prices and runs
/// the cascade.
pub fn delete_order_in_tree(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, updates: &mut Vec<LevelUpdate>, order_id: u64) {
    let Some(order) = orders.remove(&order_id) else { return };
    let hidden = order.hidden_quantity();
    let visible = order.visible_quantity();
    let update = match order.resting {
        Some(crate::order::Resting::Limit { price }) => book.shrink_limit(order.side, order_id, price, order.leaves, hidden, visible, true),
        Some(crate::order::Resting::Stop { stop_price }) => book.shrink_stop(order.side, order_id, stop_price, order.leaves, hidden, visible, true),
        Some(crate::order::Resting::TrailingStop { stop_price }) => {
            book.shrink_trailing_stop(order.side, order_id, stop_price, order.leaves, hidden, visible, true)
        }
        None => None,
    };
    if let Some(update) = update {
        record(updates, update);
    }
}

/// Reduces `order_id`'s leaves by `qty`, removing it from its level (and the
/// arena) if that empties it.
pub fn reduce_order_in_tree(
    book: &mut OrderBook,
    orders: &mut HashMap<u64, Order>,
    updates: &mut Vec<LevelUpdate>,
    order_id: u64,
    qty: u64,
) {
    let Some(order) = orders.get_mut(&order_id) else { return };
    let hidden_before = order.hidden_quantity();
    let visible_before = order.visible_quantity();
    let removed = order.apply_reduction(qty);
    let leaves_now_zero = order.leaves == 0;
    let hidden_delta = hidden_before - order.hidden_quantity();
    let visible_delta = visible_before - order.visible_quantity();
    let side = order.side;
    let resting = order.resting;

    let update = match resting {
        Some(crate::order::Resting::Limit { price }) => {
            book.shrink_limit(side, order_id, price, removed, hidden_delta, visible_delta, leaves_now_zero)
        }
        Some(crate::order::Resting::Stop { stop_price }) => {
            book.shrink_stop(side, order_id, stop_price, removed, hidden_delta, visible_delta, leaves_now_zero)
        }
        Some(crate::order::Resting::TrailingStop { stop_price }) => {
            book.shrink_trailing_stop(side, order_id, stop_price, removed, hidden_delta, visible_delta, leaves_now_zero)
        }
        None => None,
    };
    if let Some(update) = update {
        record(updates, update);
    }
    if leaves_now_zero {
        orders.remove(&order_id);
    }
}

/// Drains all crossing trades at the current best bid/ask, repeatedly, trading
/// the smaller-leaves side away in full and reducing the other side by the
/// traded quantity — the maker price is always the smaller (executing) side's
/// price.
fn drain_crossed_levels(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, users: &mut [Option<User>], updates: &mut Vec<LevelUpdate>) -> bool {
    let mut any = false;
    loop {
        let (Some(bid_price), Some(ask_price)) = (book.best_bid().map(|l| l.price), book.best_ask().map(|l| l.price)) else {
            break;
        };
        if bid_price < ask_price {
            break;
        }
        let bid_id = book.bids.get(&bid_price).and_then(|l| l.order_ids.first().copied());
        let ask_id = book.asks.get(&ask_price).and_then(|l| l.order_ids.first().copied());
        let (Some(bid_id), Some(ask_id)) = (bid_id, ask_id) else { break };

        let bid_leaves = orders.get(&bid_id).unwrap().leaves;
        let ask_leaves = orders.get(&ask_id).unwrap().leaves;
        let (executing_id, reducing_id) = if bid_leaves <= ask_leaves { (bid_id, ask_id) } else { (ask_id, bid_id) };
        let qty = orders.get(&executing_id).unwrap().leaves;
        let price = orders.get(&executing_id).unwrap().price;

        book.update_last_price(Side::Buy, price);
        book.update_matching_price(Side::Buy, price);
        book.update_last_price(Side::Sell, price);
        book.update_matching_price(Side::Sell, price);

        apply_trade_balance(users, orders.get(&bid_id).unwrap().user_id, Side::Buy, qty, price);
        apply_trade_balance(users, orders.get(&ask_id).unwrap().user_id, Side::Sell, qty, price);

        delete_order_in_tree(book, orders, updates, executing_id);
        reduce_order_in_tree(book, orders, updates, reducing_id, qty);
        any = true;
    }
    any
}

/// One activation pass over a regular stop tree: fires every order in every
/// activating level, snapshotting each level's order ids before mutating it.
fn activate_regular_stops(
    book: &mut OrderBook,
    orders: &mut HashMap<u64, Order>,
    users: &mut [Option<User>],
    updates: &mut Vec<LevelUpdate>,
    side: Side,
) -> bool {
    let mut any = false;
    loop {
        let activates = match side {
            Side::Buy => book.best_buy_stop().map(|l| l.price <= book.market_price_ask()).unwrap_or(false),
            Side::Sell => book.best_sell_stop().map(|l| l.price >= book.market_price_bid()).unwrap_or(false),
        };
        if !activates {
            break;
        }
        let level_price = match side {
            Side::Buy => book.best_buy_stop().unwrap().price,
            Side::Sell => book.best_sell_stop().unwrap().price,
        };
        let ids: Vec<u64> = match side {
            Side::Buy => book.buy_stop.get(&level_price).map(|l| l.order_ids.clone()).unwrap_or_default(),
            Side::Sell => book.sell_stop.get(&level_price).map(|l| l.order_ids.clone()).unwrap_or_default(),
        };
        if ids.is_empty() {
            break;
        }
        for id in ids {
            activate_stop_order(book, orders, users, updates, id);
            any = true;
        }
    }
    any
}

fn activate_trailing_stops(
    book: &mut OrderBook,
    orders: &mut HashMap<u64, Order>,
    users: &mut [Option<User>],
    updates: &mut Vec<LevelUpdate>,
    side: Side,
) -> bool {
    let mut any = false;
    loop {
        let activates = match side {
            Side::Buy => book.best_trailing_buy_stop().map(|l| l.price <= book.market_price_ask()).unwrap_or(false),
            Side::Sell => book.best_trailing_sell_stop().map(|l| l.price >= book.market_price_bid()).unwrap_or(false),
        };
        if !activates {
            break;
        }
        let level_price = match side {
            Side::Buy => book.best_trailing_buy_stop().unwrap().price,
            Side::Sell => book.best_trailing_sell_stop().unwrap().price,
        };
        let ids: Vec<u64> = match side {
            Side::Buy => book.trailing_buy_stop.get(&level_price).map(|l| l.order_ids.clone()).unwrap_or_default(),
            Side::Sell => book.trailing_sell_stop.get(&level_price).map(|l| l.order_ids.clone()).unwrap_or_default(),
        };
        if ids.is_empty() {
            break;
        }
        for id in ids {
            activate_stop_order(book, orders, users, updates, id);
            any = true;
        }
    }
    any
}

/// Converts a resting stop order into a plain limit order and runs it through
/// the aggressor phase; rests the remainder (if any) as a normal limit order.
fn activate_stop_order(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, users: &mut [Option<User>], updates: &mut Vec<LevelUpdate>, order_id: u64) {
    let Some(mut order) = orders.remove(&order_id) else { return };
    let hidden = order.hidden_quantity();
    let visible = order.visible_quantity();
    let update = match order.resting {
        Some(crate::order::Resting::Stop { stop_price }) => book.shrink_stop(order.side, order_id, stop_price, order.leaves, hidden, visible, true),
        Some(crate::order::Resting::TrailingStop { stop_price }) => {
            book.shrink_trailing_stop(order.side, order_id, stop_price, order.leaves, hidden, visible, true)
        }
        _ => None,
    };
    if let Some(update) = update {
        record(updates, update);
    }

    order.stop_price = 0;
    order.trailing_distance = 0;
    order.trailing_step = 0;
    order.resting = None;

    trace!(order_id, "stop order activated");

    match_incoming_order(book, orders, users, &mut order, updates);
    if order.leaves > 0 {
        rest_order(book, orders, updates, order);
    }
}

/// Walks the trailing-buy-stop tree in best-first order, recalculating each
/// order's stop price and re-inserting it if it moved. Restarts from the best
/// level whenever a level's contents change underneath it.
fn recalc_trailing_buy_stop_orders(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, updates: &mut Vec<LevelUpdate>) {
    loop {
        let Some(level_price) = book.best_trailing_buy_stop().map(|l| l.price) else { return };
        let ids: Vec<u64> = book.trailing_buy_stop.get(&level_price).map(|l| l.order_ids.clone()).unwrap_or_default();
        let mut changed = false;
        for id in ids {
            let Some(order) = orders.get(&id) else { continue };
            let new_stop = calculate_trailing_stop_price(order, book);
            if new_stop == order.stop_price {
                continue;
            }
            reprice_trailing_order(book, orders, updates, id, new_stop);
            changed = true;
        }
        if !changed {
            return;
        }
    }
}

fn recalc_trailing_sell_stop_orders(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, updates: &mut Vec<LevelUpdate>) {
    loop {
        let Some(level_price) = book.best_trailing_sell_stop().map(|l| l.price) else { return };
        let ids: Vec<u64> = book.trailing_sell_stop.get(&level_price).map(|l| l.order_ids.clone()).unwrap_or_default();
        let mut changed = false;
        for id in ids {
            let Some(order) = orders.get(&id) else { continue };
            let new_stop = calculate_trailing_stop_price(order, book);
            if new_stop == order.stop_price {
                continue;
            }
            reprice_trailing_order(book, orders, updates, id, new_stop);
            changed = true;
        }
        if !changed {
            return;
        }
    }
}

fn reprice_trailing_order(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, updates: &mut Vec<LevelUpdate>, order_id: u64, new_stop: u64) {
    let Some(mut order) = orders.remove(&order_id) else { return };
    let old_stop = order.stop_price;
    let hidden = order.hidden_quantity();
    let visible = order.visible_quantity();
    if let Some(update) = book.shrink_trailing_stop(order.side, order_id, old_stop, order.leaves, hidden, visible, true) {
        record(updates, update);
    }
    order.stop_price = new_stop;
    let update = book.add_trailing_stop(order.side, order_id, new_stop, order.leaves, hidden, visible);
    record(updates, update);
    order.resting = Some(crate::order::Resting::TrailingStop { stop_price: new_stop });
    orders.insert(order_id, order);
}

/// One full pass of stop activation: trailing recalculation on both sides,
/// then regular and trailing activation on both sides. Returns whether
/// anything activated (not whether anything merely repriced).
fn activate_stop_orders_once(
    book: &mut OrderBook,
    orders: &mut HashMap<u64, Order>,
    users: &mut [Option<User>],
    updates: &mut Vec<LevelUpdate>,
) -> bool {
    if recalculate_trailing_buy_stop_watermark(book) {
        recalc_trailing_buy_stop_orders(book, orders, updates);
    }
    if recalculate_trailing_sell_stop_watermark(book) {
        recalc_trailing_sell_stop_orders(book, orders, updates);
    }

    let buy = activate_regular_stops(book, orders, users, updates, Side::Buy);
    let sell = activate_regular_stops(book, orders, users, updates, Side::Sell);
    let trailing_buy = activate_trailing_stops(book, orders, users, updates, Side::Buy);
    let trailing_sell = activate_trailing_stops(book, orders, users, updates, Side::Sell);
    buy || sell || trailing_buy || trailing_sell
}

/// Repeats [`activate_stop_orders_once`] until a pass activates nothing.
fn activate_stop_orders_until_dry(
    book: &mut OrderBook,
    orders: &mut HashMap<u64, Order>,
    users: &mut [Option<User>],
    updates: &mut Vec<LevelUpdate>,
) -> bool {
    let mut any = false;
    while activate_stop_orders_once(book, orders, users, updates) {
        any = true;
    }
    any
}

/// Top-level cascade: alternates draining crossed levels with stop activation
/// until neither makes progress.
pub fn match_book(book: &mut OrderBook, orders: &mut HashMap<u64, Order>, users: &mut [Option<User>], updates: &mut Vec<LevelUpdate>) {
    loop {
        drain_crossed_levels(book, orders, users, updates);
        if !activate_stop_orders_until_dry(book, orders, users, updates) {
            break;
        }
    }
}
