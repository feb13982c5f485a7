//! Reconciliation cycles end to end: fetch, diff, persist, notify, escalate.

mod common;

use common::{Harness, ROOT};
use std::fs;

const IN_STOCK: &str = "https://schema.org/InStock";
const OUT_OF_STOCK: &str = "https://schema.org/OutOfStock";

async fn tracked(products: &[(&str, &str)]) -> Harness {
    let h = Harness::new().await;
    h.root("/add_channel @deals").await;
    h.root("/add_service_channel @ops").await;
    for (name, url) in products {
        h.root(&format!("/add_product {} {}", name, url)).await;
    }
    h.sink.clear();
    h
}

#[tokio::test]
async fn test_price_change_is_reported() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);

    let first = h.watch.reconciler().check(false).await;
    assert!(first.changed);
    assert!(first.notified);
    assert_eq!(
        h.sink.last_to("@deals").unwrap(),
        "- ✅ A: InStock @ 1.00 EUR\nhttps://shop.example/a"
    );

    h.fetcher.set("https://shop.example/a", 150, IN_STOCK);
    let second = h.watch.reconciler().check(false).await;
    assert!(second.changed);
    assert!(h.sink.last_to("@deals").unwrap().contains("1.50"));
    assert_eq!(h.sink.sent_to("@deals").len(), 2);
    assert!(second.errors.is_empty());
}

#[tokio::test]
async fn test_unchanged_cycle_is_silent() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);

    h.watch.reconciler().check(false).await;
    let again = h.watch.reconciler().check(false).await;

    assert!(!again.changed);
    assert!(!again.notified);
    assert_eq!(h.sink.sent_to("@deals").len(), 1);
    assert!(h.sink.sent_to("@ops").is_empty());
}

#[tokio::test]
async fn test_failed_fetch_is_not_found_and_alerted() {
    let h = tracked(&[
        ("A", "https://shop.example/a"),
        ("B", "https://shop.example/b"),
    ])
    .await;
    h.fetcher.set("https://shop.example/a", 999, OUT_OF_STOCK);

    let outcome = h.watch.reconciler().check(false).await;

    assert_eq!(
        outcome.report,
        "- ❌ A: OutOfStock @ 9.99 EUR\nhttps://shop.example/a\n\n\
         - ❌ B: not found\nhttps://shop.example/b"
    );
    assert_eq!(outcome.errors.len(), 1);

    let alerts = h.sink.sent_to("@ops");
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].starts_with("[SERVICE]"));
    assert!(alerts[0].contains("When fetching https://shop.example/b: no offer in page"));
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn test_forced_cycle_notifies_without_rewriting_baseline() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);
    h.watch.reconciler().check(false).await;

    // Same manifest in a different layout; a rewrite would pretty-print it.
    let manifest = h.watch.reconciler().last_manifest().unwrap();
    let compact = serde_json::to_string(&manifest).unwrap();
    fs::write(h.manifest_path(), &compact).unwrap();

    let outcome = h.watch.reconciler().check(true).await;

    assert!(!outcome.changed);
    assert!(outcome.notified);
    assert_eq!(h.sink.sent_to("@deals").len(), 2);
    assert_eq!(fs::read_to_string(h.manifest_path()).unwrap(), compact);
}

#[tokio::test]
async fn test_errors_without_change_still_alert() {
    let h = tracked(&[("B", "https://shop.example/b")]).await;

    h.watch.reconciler().check(false).await;
    let again = h.watch.reconciler().check(false).await;

    assert!(!again.changed);
    assert_eq!(h.sink.sent_to("@deals").len(), 1);
    assert_eq!(h.sink.sent_to("@ops").len(), 2);
}

#[tokio::test]
async fn test_delivery_failure_is_escalated_and_batch_continues() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.root("/add_channel @broken").await;
    h.root("/add_channel @more").await;
    h.sink.break_channel("@broken");
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);

    let outcome = h.watch.reconciler().check(false).await;

    assert_eq!(h.sink.sent_to("@deals").len(), 1);
    assert_eq!(h.sink.sent_to("@more").len(), 1);
    assert_eq!(outcome.errors.len(), 1);
    assert!(
        h.sink.last_to("@ops").unwrap()
            .contains("Cannot send message to channel @broken: chat not found")
    );
}

#[tokio::test]
async fn test_corrupt_baseline_is_replaced_and_alerted() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);
    fs::write(h.manifest_path(), "{ not json").unwrap();

    let outcome = h.watch.reconciler().check(false).await;

    assert!(outcome.changed);
    assert_eq!(h.sink.sent_to("@deals").len(), 1);
    assert_eq!(h.sink.sent_to("@ops").len(), 1);
    assert!(h.watch.reconciler().last_manifest().unwrap().get("A").is_some());
}

#[tokio::test]
async fn test_baseline_survives_restart() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);
    h.watch.reconciler().check(false).await;
    h.watch.shutdown().await;

    let Harness { dir, watch, .. } = h;
    drop(watch);

    let restarted = Harness::in_dir(dir).await;
    restarted.fetcher.set("https://shop.example/a", 100, IN_STOCK);
    assert_eq!(restarted.watch.config().get().products.len(), 1);

    let outcome = restarted.watch.reconciler().check(false).await;
    assert!(!outcome.changed);
    assert!(restarted.sink.sent_to("@deals").is_empty());
    restarted.watch.shutdown().await;
}

#[tokio::test]
async fn test_check_now_acknowledges_first() {
    let h = tracked(&[("A", "https://shop.example/a")]).await;
    h.fetcher.set("https://shop.example/a", 100, IN_STOCK);

    h.root("/check_now").await;

    let sent = h.sink.sent();
    assert_eq!(sent[0], (ROOT.to_string(), "Updating".to_string()));
    assert_eq!(sent[1].0, "@deals");
    assert!(h.watch.reconciler().clock().last_check().is_some());
}
