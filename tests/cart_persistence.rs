use std::fs;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use fieldcart_lib::cart::{CartError, CartQueue, CartStore};
use fieldcart_lib::model::{CoreFilters, CustomFilters, FilterSnapshot, TimeWindow};

fn camera_snapshot(device: &str) -> FilterSnapshot {
    FilterSnapshot::new(
        CoreFilters {
            window: TimeWindow::LastDays { days: 30 },
            bbox: None,
        },
        CustomFilters::CameraTrap {
            device_ids: vec![device.to_string()],
            labels: vec![],
            require_image: false,
        },
        25,
        vec![],
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
    )
}

#[test]
fn cart_round_trips_through_a_fresh_store() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cart.json");

    let store = CartStore::at_path(path.clone());
    let mut cart = CartQueue::default();
    cart.append(camera_snapshot("cam-01")).expect("append");
    cart.append(camera_snapshot("cam-02")).expect("append");
    store.save(&cart).expect("save");

    let reloaded = CartStore::at_path(path).load();
    assert_eq!(reloaded.snapshots(), cart.snapshots());
}

#[test]
fn newest_entry_stays_first_across_reload() {
    let dir = tempdir().expect("tempdir");
    let store = CartStore::at_path(dir.path().join("cart.json"));

    let mut cart = CartQueue::default();
    let first = camera_snapshot("cam-01");
    let second = camera_snapshot("cam-02");
    cart.append(first.clone()).expect("append");
    cart.append(second.clone()).expect("append");
    store.save(&cart).expect("save");

    let reloaded = store.load();
    assert_eq!(reloaded.snapshots()[0].id, second.id);
    assert_eq!(reloaded.snapshots()[1].id, first.id);
}

#[test]
fn missing_cart_file_loads_empty() {
    let dir = tempdir().expect("tempdir");
    let store = CartStore::at_path(dir.path().join("nowhere").join("cart.json"));

    let cart = store.load();
    assert!(cart.is_empty());
}

#[test]
fn corrupt_cart_file_loads_empty() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cart.json");
    fs::write(&path, "{ not json at all").expect("write garbage");

    let cart = CartStore::at_path(path).load();
    assert!(cart.is_empty());
}

#[test]
fn corrupt_cart_is_replaced_on_next_save() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("cart.json");
    fs::write(&path, "\u{0}\u{1}\u{2}").expect("write garbage");

    let store = CartStore::at_path(path.clone());
    let mut cart = store.load();
    cart.append(camera_snapshot("cam-01")).expect("append");
    store.save(&cart).expect("save over garbage");

    let reloaded = CartStore::at_path(path).load();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn full_cart_rejects_appends_without_eviction() {
    let mut cart = CartQueue::with_capacity(2);
    let first = camera_snapshot("cam-01");
    let second = camera_snapshot("cam-02");
    cart.append(first.clone()).expect("append");
    cart.append(second.clone()).expect("append");

    let err = cart
        .append(camera_snapshot("cam-03"))
        .expect_err("append at capacity should fail");
    assert!(matches!(err, CartError::CapacityExceeded { capacity: 2 }));
    assert_eq!(cart.len(), 2);
    assert_eq!(cart.snapshots()[0].id, second.id);
    assert_eq!(cart.snapshots()[1].id, first.id);
}

#[test]
fn remove_by_prefix_survives_reload() {
    let dir = tempdir().expect("tempdir");
    let store = CartStore::at_path(dir.path().join("cart.json"));

    let mut cart = CartQueue::default();
    let keep = camera_snapshot("cam-01");
    let stale = camera_snapshot("cam-02");
    cart.append(keep.clone()).expect("append");
    cart.append(stale.clone()).expect("append");
    store.save(&cart).expect("save");

    let mut reloaded = store.load();
    let removed = reloaded
        .remove(stale.short_id())
        .expect("remove by short id");
    assert_eq!(removed.id, stale.id);
    store.save(&reloaded).expect("save");

    let last = store.load();
    assert_eq!(last.len(), 1);
    assert_eq!(last.snapshots()[0].id, keep.id);
}
