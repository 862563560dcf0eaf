//! Trailing-stop price recalculation.

use tracing::trace;

use crate::book::OrderBook;
use crate::order::Order;

/// Computes the candidate new stop price for a trailing-stop order, or returns
/// its current `stop_price` unchanged if the move is not in the favorable
/// direction or doesn't clear `trailing_step`.
///
/// `trailing_distance < 0` means the distance (and step) are basis points of the
/// market price rather than absolute ticks: `ticks = (-distance * market) / 10000`.
/// A buy-side trailing stop only ever ratchets down; a sell-side trailing stop
/// only ever ratchets up.
pub fn calculate_trailing_stop_price(order: &Order, book: &OrderBook) -> u64 {
    let market = if order.is_buy() {
        book.market_trailing_stop_price_ask()
    } else {
        book.market_trailing_stop_price_bid()
    };

    let (distance, step) = if order.trailing_distance < 0 {
        let bp_distance = (-order.trailing_distance) as u128;
        let bp_step = (-order.trailing_step) as u128;
        let distance = (bp_distance * market as u128) / 10_000;
        let step = (bp_step * market as u128) / 10_000;
        (distance as u64, step as u64)
    } else {
        (order.trailing_distance as u64, order.trailing_step as u64)
    };

    let old_stop = order.stop_price;

    if order.is_buy() {
        if market == u64::MAX {
            return old_stop;
        }
        let new_stop = market.saturating_add(distance);
        if new_stop < old_stop && old_stop - new_stop >= step {
            new_stop
        } else {
            old_stop
        }
    } else {
        let new_stop = market.saturating_sub(distance);
        if new_stop > old_stop && new_stop - old_stop >= step {
            new_stop
        } else {
            old_stop
        }
    }
}

/// Re-evaluates every resting trailing-buy-stop order against the current ask
/// side. `reinsert` receives `(order_id, old_stop_price, new_stop_price)` for
/// every order whose stop moved and is responsible for actually moving it
/// between trailing-stop levels (it needs the global order arena, which this
/// module does not own).
///
/// Returns `true` if the market's trailing ask watermark moved (even if no
/// individual order ended up repricing), mirroring the reference
/// implementation's early-exit when the watermark hasn't changed.
pub fn recalculate_trailing_buy_stop_watermark(book: &mut OrderBook) -> bool {
    let new_trailing_ask = book.market_trailing_stop_price_ask();
    if new_trailing_ask >= book.trailing_ask_price {
        return false;
    }
    book.trailing_ask_price = new_trailing_ask;
    trace!(new_trailing_ask, "trailing ask watermark fell");
    true
}

pub fn recalculate_trailing_sell_stop_watermark(book: &mut OrderBook) -> bool {
    let new_trailing_bid = book.market_trailing_stop_price_bid();
    if new_trailing_bid <= book.trailing_bid_price {
        return false;
    }
    book.trailing_bid_price = new_trailing_bid;
    trace!(new_trailing_bid, "trailing bid watermark rose");
    true
}
