//! End-to-end cart scenarios over a fully initialized server state

use rust_decimal::Decimal;
use shopie_server::auth::{Identity, Role};
use shopie_server::cart::CartError;
use shopie_server::catalog::CatalogError;
use shopie_server::reservation::ReservationError;
use shopie_server::{Config, ServerState};

fn test_state(dir: &tempfile::TempDir) -> ServerState {
    let config = Config::with_overrides(dir.path().to_str().unwrap(), 0);
    ServerState::initialize(&config).unwrap()
}

fn admin() -> Identity {
    Identity::new("admin", Role::Admin)
}

fn seed_product(state: &ServerState, name: &str, price: Decimal, total: u32) -> String {
    state
        .catalog
        .create(
            &admin(),
            shared::models::ProductCreate {
                name: name.to_string(),
                description: String::new(),
                price,
                image: None,
                category: None,
                total_stock: total,
            },
        )
        .unwrap()
        .id
}

#[test]
fn test_add_then_remove_restores_availability() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let product_id = seed_product(&state, "Widget", Decimal::new(1500, 2), 10);

    let item = state.carts.add_item("alice", &product_id, 4).unwrap();
    assert_eq!(state.catalog.get(&product_id).unwrap().available_stock, 6);

    state.carts.remove_quantity("alice", &item.id, None).unwrap();
    let product = state.catalog.get(&product_id).unwrap();
    assert_eq!(product.available_stock, 10);
    assert_eq!(product.reserved_stock, 0);
    assert!(state.invariants.check_all().is_clean());
}

#[test]
fn test_contended_add_then_quantity_adjustments() {
    let dir = tempfile::tempdir().unwrap();
    let state = std::sync::Arc::new(test_state(&dir));
    let product_id = seed_product(&state, "Hot item", Decimal::ONE, 10);

    // Two shoppers race for 6 of 10 units; only one fits
    let mut handles = Vec::new();
    for user in ["alice", "bob"] {
        let state = std::sync::Arc::clone(&state);
        let product_id = product_id.clone();
        handles.push(std::thread::spawn(move || {
            state.carts.add_item(user, &product_id, 6).map(|item| (user, item))
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
    assert_eq!(winners.len(), 1);

    let counters = state.reservation.counters(&product_id).unwrap();
    assert_eq!((counters.total, counters.available, counters.reserved), (10, 4, 6));

    // Growing 6 -> 9 reserves only the delta of 3, fitting the remaining 4
    let (winner, item) = results.into_iter().flatten().next().unwrap();
    state
        .carts
        .update_item_quantity(winner, &item.id, 9)
        .unwrap();
    assert_eq!(state.reservation.counters(&product_id).unwrap().available, 1);

    // Shrinking 9 -> 5 always succeeds and frees the delta
    state
        .carts
        .update_item_quantity(winner, &item.id, 5)
        .unwrap();
    let counters = state.reservation.counters(&product_id).unwrap();
    assert_eq!(counters.available, 5);
    assert_eq!(counters.reserved, 5);
    assert!(state.invariants.check_all().is_clean());
}

#[test]
fn test_total_cannot_shrink_below_reserved() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let product_id = seed_product(&state, "Widget", Decimal::ONE, 10);
    state.carts.add_item("alice", &product_id, 6).unwrap();

    let shrink = shared::models::ProductUpdate {
        name: None,
        description: None,
        price: None,
        image: None,
        category: None,
        total_stock: Some(4),
    };
    let err = state
        .catalog
        .update(&admin(), &product_id, shrink)
        .unwrap_err();
    assert!(matches!(
        err,
        CatalogError::Reservation(ReservationError::InvalidAdjustment {
            requested_total: 4,
            reserved: 6
        })
    ));

    // Shrinking exactly to the reserved quantity is allowed
    let to_reserved = shared::models::ProductUpdate {
        name: None,
        description: None,
        price: None,
        image: None,
        category: None,
        total_stock: Some(6),
    };
    let product = state
        .catalog
        .update(&admin(), &product_id, to_reserved)
        .unwrap();
    assert_eq!(product.total_stock, 6);
    assert_eq!(product.available_stock, 0);
    assert_eq!(product.reserved_stock, 6);
}

#[test]
fn test_summary_uses_live_prices() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let product_id = seed_product(&state, "Widget", Decimal::new(1000, 2), 10);
    state.carts.add_item("alice", &product_id, 2).unwrap();

    let before = state.carts.summary("alice", &state.catalog);
    assert_eq!(before.total_price, Decimal::new(2000, 2));
    assert_eq!(before.total_items, 2);

    let reprice = shared::models::ProductUpdate {
        name: None,
        description: None,
        price: Some(Decimal::new(2500, 2)),
        image: None,
        category: None,
        total_stock: None,
    };
    state.catalog.update(&admin(), &product_id, reprice).unwrap();

    let after = state.carts.summary("alice", &state.catalog);
    assert_eq!(after.total_price, Decimal::new(5000, 2));
    // Reading twice changes nothing
    assert_eq!(after, state.carts.summary("alice", &state.catalog));
}

#[test]
fn test_clear_cart_releases_all_products() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let a = seed_product(&state, "A", Decimal::ONE, 10);
    let b = seed_product(&state, "B", Decimal::ONE, 5);
    state.carts.add_item("alice", &a, 3).unwrap();
    state.carts.add_item("alice", &b, 2).unwrap();

    state.carts.clear_cart("alice").unwrap();

    let summary = state.carts.summary("alice", &state.catalog);
    assert!(summary.items.is_empty());
    assert_eq!(summary.total_items, 0);
    assert_eq!(state.catalog.get(&a).unwrap().available_stock, 10);
    assert_eq!(state.catalog.get(&b).unwrap().available_stock, 5);
    assert!(state.invariants.check_all().is_clean());
}

#[test]
fn test_removal_beyond_held_is_refused_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let product_id = seed_product(&state, "Widget", Decimal::ONE, 10);
    let item = state.carts.add_item("alice", &product_id, 3).unwrap();

    let err = state
        .carts
        .remove_quantity("alice", &item.id, Some(5))
        .unwrap_err();
    assert!(matches!(
        err,
        CartError::RemovalExceedsHeld {
            requested: 5,
            held: 3
        }
    ));

    // Neither the line nor the counters moved
    let summary = state.carts.summary("alice", &state.catalog);
    assert_eq!(summary.total_items, 3);
    assert_eq!(state.catalog.get(&product_id).unwrap().reserved_stock, 3);
}

#[test]
fn test_update_quantity_moves_only_the_delta() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let product_id = seed_product(&state, "Widget", Decimal::ONE, 10);
    let item = state.carts.add_item("alice", &product_id, 2).unwrap();

    state
        .carts
        .update_item_quantity("alice", &item.id, 7)
        .unwrap();
    assert_eq!(state.catalog.get(&product_id).unwrap().reserved_stock, 7);

    // Growing beyond availability fails without touching the line
    let err = state
        .carts
        .update_item_quantity("alice", &item.id, 12)
        .unwrap_err();
    assert!(matches!(
        err,
        CartError::Reservation(ReservationError::InsufficientStock { .. })
    ));
    let summary = state.carts.summary("alice", &state.catalog);
    assert_eq!(summary.total_items, 7);
}

#[test]
fn test_deleted_product_leaves_cart_line_without_product_data() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let keep = seed_product(&state, "Keep", Decimal::new(500, 2), 10);
    let gone = seed_product(&state, "Gone", Decimal::new(300, 2), 10);
    state.carts.add_item("alice", &keep, 1).unwrap();
    state.carts.add_item("bob", &gone, 2).unwrap();

    // Holding carts block deletion
    assert!(matches!(
        state.catalog.delete(&admin(), &gone, &state.carts),
        Err(CatalogError::InUse { carts: 1 })
    ));

    state.carts.clear_cart("bob").unwrap();
    state.catalog.delete(&admin(), &gone, &state.carts).unwrap();

    // Alice's summary is unaffected
    let summary = state.carts.summary("alice", &state.catalog);
    assert_eq!(summary.items.len(), 1);
    assert!(summary.items[0].product.is_some());
}

#[test]
fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let product_id;
    let expected_summary;
    {
        let state = test_state(&dir);
        product_id = seed_product(&state, "Durable", Decimal::new(1200, 2), 20);
        state.carts.add_item("alice", &product_id, 5).unwrap();
        state.carts.add_item("bob", &product_id, 3).unwrap();
        expected_summary = state.carts.summary("alice", &state.catalog);
    }

    let state = test_state(&dir);
    let product = state.catalog.get(&product_id).unwrap();
    assert_eq!(product.total_stock, 20);
    assert_eq!(product.reserved_stock, 8);
    assert_eq!(product.available_stock, 12);

    let summary = state.carts.summary("alice", &state.catalog);
    assert_eq!(summary, expected_summary);
    assert!(state.invariants.check_all().is_clean());
}

#[test]
fn test_restart_repairs_drifted_counters() {
    let dir = tempfile::tempdir().unwrap();
    let product_id;
    {
        let state = test_state(&dir);
        product_id = seed_product(&state, "Drifty", Decimal::ONE, 10);
        state.carts.add_item("alice", &product_id, 2).unwrap();
        // Counter drift with no matching cart line, as a crash between
        // reserve and item persist would leave behind
        state.reservation.reserve(&product_id, 4).unwrap();
        assert!(!state.invariants.check_all().is_clean());
    }

    // Startup reconcile trusts cart holdings
    let state = test_state(&dir);
    let product = state.catalog.get(&product_id).unwrap();
    assert_eq!(product.reserved_stock, 2);
    assert_eq!(product.available_stock, 8);
    assert!(state.invariants.check_all().is_clean());
}
