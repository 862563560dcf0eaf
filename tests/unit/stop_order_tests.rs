//! Stop and trailing-stop activation. The reference implementation this engine
//! is modeled on leaves these paths untested because its front-end never
//! submits stop orders; these scenarios close that gap end to end.

use market_engine::prelude::*;

fn setup() -> MarketManager {
    let mut m = MarketManager::new();
    m.add_symbol(Symbol::new(0, "USDRUB")).unwrap();
    m.add_order_book(0).unwrap();
    m.add_user(User::new(0, "provider")).unwrap();
    m.add_user(User::new(1, "provider2")).unwrap();
    m.add_user(User::new(2, "aggressor")).unwrap();
    m.add_user(User::new(3, "stop_holder")).unwrap();
    m
}

#[test]
fn regular_buy_stop_activates_once_market_ask_rises_to_meet_it() {
    let mut m = setup();
    m.add_order(Order::limit(1, 0, 0, Side::Sell, 100, 5)).unwrap();
    m.add_order(Order::limit(2, 0, 0, Side::Sell, 110, 5)).unwrap();

    // Buy-stop: triggers once the market ask rises to 108 or above.
    m.add_order(Order::stop(3, 0, 3, Side::Buy, 115, 108, 5)).unwrap();
    assert!(m.order(3).unwrap().is_stop());

    // Consume the 100 level; this call's matching-price watermark still holds
    // the just-traded 100, so the stop does not fire within this same call.
    m.add_order(Order::limit(4, 0, 2, Side::Buy, 105, 5)).unwrap();
    assert!(m.order(3).unwrap().is_stop());
    assert_eq!(m.order_book(0).unwrap().best_ask().unwrap().price, 110);

    // Any subsequent call resets the matching-price watermark, so the next
    // cascade sees the bare best ask (110) and the stop fires.
    m.add_order(Order::limit(5, 0, 2, Side::Buy, 1, 1)).unwrap();
    assert!(m.order(3).is_none());
    assert!(m.order_book(0).unwrap().best_ask().is_none());
    assert_eq!(m.user(3).unwrap().balance, -550);
    // user 0 sold both the 100 level (to order 4) and the 110 level (to the
    // activated stop): 500 + 550.
    assert_eq!(m.user(0).unwrap().balance, 1050);
}

#[test]
fn regular_sell_stop_activates_once_market_bid_falls_to_meet_it() {
    let mut m = setup();
    m.add_order(Order::limit(1, 0, 0, Side::Buy, 100, 5)).unwrap();
    m.add_order(Order::limit(2, 0, 0, Side::Buy, 90, 5)).unwrap();

    // Sell-stop: triggers once the market bid falls to 92 or below.
    m.add_order(Order::stop(3, 0, 3, Side::Sell, 85, 92, 5)).unwrap();
    assert!(m.order(3).unwrap().is_stop());

    m.add_order(Order::limit(4, 0, 2, Side::Sell, 95, 5)).unwrap();
    assert!(m.order(3).unwrap().is_stop());
    assert_eq!(m.order_book(0).unwrap().best_bid().unwrap().price, 90);

    m.add_order(Order::limit(5, 0, 2, Side::Sell, 1_000_000, 1)).unwrap();
    assert!(m.order(3).is_none());
    assert!(m.order_book(0).unwrap().best_bid().is_none());
    assert_eq!(m.user(3).unwrap().balance, 450);
    // user 0 bought both the 100 level (from order 4) and the 90 level (from
    // the activated stop): -500 + -450.
    assert_eq!(m.user(0).unwrap().balance, -950);
}

#[test]
fn trailing_buy_stop_ratchets_down_then_fires_on_a_rebound() {
    let mut m = setup();
    m.add_order(Order::limit(1, 0, 0, Side::Sell, 90, 5)).unwrap();
    m.add_order(Order::limit(2, 0, 0, Side::Sell, 93, 5)).unwrap();
    m.add_order(Order::limit(3, 0, 0, Side::Sell, 96, 5)).unwrap();

    m.add_order(Order::trailing_stop(10, 0, 3, Side::Buy, 1_000, 1_000, 5, 5, 1))
        .unwrap();

    // A generously-priced crossing buy always trades at the book's current
    // lowest ask; walking the stack this way drains it from 90 up to 96.
    m.add_order(Order::limit(4, 0, 2, Side::Buy, 100, 5)).unwrap();
    // Traded at 90; the remaining best ask (93) becomes the new trailing
    // watermark, so the stop ratchets down to 93 + 5.
    assert_eq!(m.order(10).unwrap().stop_price, 98);

    m.add_order(Order::limit(5, 0, 2, Side::Buy, 100, 5)).unwrap();
    // Traded at 93, leaving only the 96 ask. The watermark is the max of the
    // last trade and the best remaining ask (96), which is higher than the
    // previous watermark (93) — the ratchet only ever moves down, so it holds.
    assert_eq!(m.order(10).unwrap().stop_price, 98);

    m.add_order(Order::limit(6, 0, 2, Side::Buy, 100, 5)).unwrap();
    // Traded at 96; no asks remain. With nothing resting, the watermark falls
    // back to the MAX sentinel, which never counts as a further fall, so the
    // stop stays frozen at 98.
    assert_eq!(m.order(10).unwrap().stop_price, 98);
    assert!(m.order_book(0).unwrap().best_ask().is_none());

    // A fresh, higher ask lets the market rise back through the frozen stop.
    m.add_order(Order::limit(7, 0, 0, Side::Sell, 120, 5)).unwrap();
    assert!(m.order(10).is_none());
    assert_eq!(m.user(3).unwrap().balance, -600);
    // user 0 sold all four levels (90, 93, 96, then the fresh 120): 450 + 465
    // + 480 + 600.
    assert_eq!(m.user(0).unwrap().balance, 1995);
}

#[test]
fn trailing_sell_stop_ratchets_up_then_fires_on_a_pullback() {
    let mut m = setup();
    m.add_order(Order::limit(1, 0, 0, Side::Buy, 100, 5)).unwrap();
    m.add_order(Order::limit(2, 0, 0, Side::Buy, 105, 5)).unwrap();
    m.add_order(Order::limit(3, 0, 0, Side::Buy, 110, 5)).unwrap();

    m.add_order(Order::trailing_stop(10, 0, 3, Side::Sell, 1, 1, 5, 5, 1))
        .unwrap();

    // A crossing sell at 100 matches the highest resting bid first (110).
    m.add_order(Order::limit(4, 0, 2, Side::Sell, 100, 5)).unwrap();
    assert_eq!(m.order(10).unwrap().stop_price, 100);

    m.add_order(Order::limit(5, 0, 2, Side::Sell, 100, 5)).unwrap();
    // Bid fell 105 -> 100 relative to the last trade; no further ratchet up.
    assert_eq!(m.order(10).unwrap().stop_price, 100);

    // Next call's cascade resets the matching-price watermark and the stop,
    // now at the level of the only remaining bid, fires.
    m.add_order(Order::limit(6, 0, 2, Side::Buy, 1, 1)).unwrap();
    assert!(m.order(10).is_none());
    assert_eq!(m.user(3).unwrap().balance, 500);
    // user 0 bought all three levels (110, 105, then the remaining 100): 550 +
    // 525 + 500.
    assert_eq!(m.user(0).unwrap().balance, -1575);
}

#[test]
fn trailing_stop_with_basis_point_distance_computes_ticks_from_market_price() {
    // Covered in detail at the unit level in `repricing`; here we only check the
    // engine wires a negative trailing_distance through end to end.
    let mut m = setup();
    m.add_order(Order::limit(1, 0, 0, Side::Sell, 10_000, 10)).unwrap();
    m.add_order(Order::trailing_stop(10, 0, 3, Side::Buy, 20_000, 20_000, 5, -50, -1))
        .unwrap();
    m.add_order(Order::limit(2, 0, 2, Side::Buy, 10_000, 5)).unwrap();
    // market ask after the trade settles at 10_000; -50 bps => 50 ticks of slack.
    assert_eq!(m.order(10).unwrap().stop_price, 10_050);
}
