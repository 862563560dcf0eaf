//! Invariants that must hold after every mutation, checked against randomly
//! generated sequences of limit orders rather than hand-picked scenarios.

use market_engine::prelude::*;
use proptest::prelude::*;

fn manager_with_two_traders() -> MarketManager {
    let mut m = MarketManager::new();
    m.add_symbol(Symbol::new(0, "PROP")).unwrap();
    m.add_order_book(0).unwrap();
    m.add_user(User::new(0, "a")).unwrap();
    m.add_user(User::new(1, "b")).unwrap();
    m
}

fn assert_book_not_crossed(book: &OrderBook) {
    if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
        assert!(bid.price < ask.price, "book left crossed: bid {} >= ask {}", bid.price, ask.price);
    }
}

fn assert_levels_have_no_stale_volume(book: &OrderBook) {
    for level in book.bids.values().chain(book.asks.values()).chain(book.buy_stop.values()).chain(book.sell_stop.values()) {
        assert!(!level.is_empty(), "an empty level was left in the tree instead of being removed");
        assert_eq!(
            level.hidden_volume + level.visible_volume,
            level.total_volume,
            "hidden + visible must equal total volume for a level"
        );
    }
}

/// A buy order debits its side's price*qty and a sell credits the same
/// amount; with only two participants trading against each other, the sum of
/// their balances must stay at zero no matter how many trades occur.
fn assert_cash_neutral(manager: &MarketManager) {
    let a = manager.user(0).unwrap().balance;
    let b = manager.user(1).unwrap().balance;
    assert_eq!(a + b, 0, "two-party trading must be cash neutral, got a={a} b={b}");
}

proptest! {
    #[test]
    fn book_never_rests_crossed_and_stays_volume_coherent(
        orders in prop::collection::vec(
            (any::<bool>(), 90u64..120, 1u64..20),
            1..60,
        )
    ) {
        let mut m = manager_with_two_traders();
        for (i, (is_buy, price, qty)) in orders.into_iter().enumerate() {
            let id = i as u64 + 1;
            let (side, user_id) = if is_buy { (Side::Buy, 0) } else { (Side::Sell, 1) };
            m.add_order(Order::limit(id, 0, user_id, side, price, qty)).unwrap();

            let book = m.order_book(0).unwrap();
            assert_book_not_crossed(book);
            assert_levels_have_no_stale_volume(book);
            assert_cash_neutral(&m);
        }
    }

    /// Reducing and deleting orders in the middle of a sequence must never
    /// leave a dangling level or break cash neutrality either.
    #[test]
    fn reductions_and_deletions_preserve_invariants(
        orders in prop::collection::vec(
            (any::<bool>(), 90u64..120, 1u64..20, 0u8..3),
            1..60,
        )
    ) {
        let mut m = manager_with_two_traders();
        let mut live_ids = Vec::new();
        for (i, (is_buy, price, qty, op)) in orders.into_iter().enumerate() {
            let id = i as u64 + 1;
            let (side, user_id) = if is_buy { (Side::Buy, 0) } else { (Side::Sell, 1) };

            match op {
                // Reduce or delete a previously placed order, if any still exist.
                0 if !live_ids.is_empty() => {
                    let target: u64 = live_ids[price as usize % live_ids.len()];
                    if m.order(target).is_some() {
                        let _ = m.reduce_order(target, qty);
                    }
                }
                1 if !live_ids.is_empty() => {
                    let target: u64 = live_ids[price as usize % live_ids.len()];
                    let _ = m.delete_order(target);
                }
                _ => {
                    m.add_order(Order::limit(id, 0, user_id, side, price, qty)).unwrap();
                    live_ids.push(id);
                }
            }

            let book = m.order_book(0).unwrap();
            assert_book_not_crossed(book);
            assert_levels_have_no_stale_volume(book);
            assert_cash_neutral(&m);
        }
    }
}
