//! Operator commands through the public entry point.

mod common;

use common::{Harness, ROOT};
use std::fs;
use stockwatch::commands::UNAUTHORIZED;
use stockwatch::engine::SchedulerState;

#[tokio::test]
async fn test_unauthorized_user_only_gets_denial() {
    let h = Harness::new().await;
    h.root("/add_service_channel @ops").await;
    let snapshot = fs::read_to_string(h.config_path()).unwrap();
    h.sink.clear();

    let reply = h.command("@mallory", "/add_user mallory").await;

    assert_eq!(reply.as_deref(), Some(UNAUTHORIZED));
    assert!(!h.watch.config().get().whitelist.contains("@mallory"));
    assert_eq!(fs::read_to_string(h.config_path()).unwrap(), snapshot);
    assert_eq!(h.sink.sent().len(), 1);
}

#[tokio::test]
async fn test_non_commands_are_ignored() {
    let h = Harness::new().await;
    assert!(
        !h.watch
            .handle(&stockwatch::prelude::CommandRequest::new(ROOT, ROOT, "hello"))
            .await
    );
    assert!(h.command("@mallory", "/frobnicate").await.is_none());
    assert!(h.sink.sent().is_empty());
}

#[tokio::test]
async fn test_user_management() {
    let h = Harness::new().await;

    assert_eq!(h.root("/add_user alice").await, "User \"@alice\" added.");
    assert_eq!(
        h.root("/add_user @alice").await,
        "User \"@alice\" is already whitelisted."
    );
    assert_eq!(h.root("/list_users").await, "Whitelist: [@alice, @root]");

    // The new operator is obeyed
    assert_eq!(
        h.command("@alice", "/add_user bob").await.as_deref(),
        Some("User \"@bob\" added.")
    );

    assert_eq!(h.root("/remove_user root").await, "Cannot remove root user.");
    assert_eq!(h.root("/remove_user carol").await, "User \"@carol\" is not in whitelist.");
    assert_eq!(h.root("/remove_user bob").await, "User \"@bob\" removed.");
    assert!(h.watch.config().get().whitelist.contains(ROOT));
}

#[tokio::test]
async fn test_channel_management() {
    let h = Harness::new().await;

    assert_eq!(h.root("/add_channel zeta").await, "Channel \"zeta\" added.");
    assert_eq!(h.root("/add_channel alpha").await, "Channel \"alpha\" added.");
    assert_eq!(h.root("/add_channel zeta").await, "Channel \"zeta\" is already added.");
    assert_eq!(
        h.root("/add_service_channel ops").await,
        "Service channel \"ops\" added."
    );
    assert_eq!(
        h.root("/list_channels").await,
        "Notify: [alpha, zeta]\nService: [ops]"
    );

    // Stored order is insertion order
    assert_eq!(h.watch.config().get().notify_channels.as_slice(), ["zeta", "alpha"]);

    assert_eq!(h.root("/remove_channel nope").await, "Channel \"nope\" is not found.");
    assert_eq!(
        h.root("/remove_service_channel ops").await,
        "Service channel \"ops\" will not be notified anymore."
    );
}

#[tokio::test]
async fn test_product_management() {
    let h = Harness::new().await;

    assert_eq!(h.root("/list_products").await, "There are no products tracked.");
    assert_eq!(
        h.root("/add_product sensor https://shop.example/s").await,
        "Product \"sensor\" added with url \"https://shop.example/s\"."
    );
    assert_eq!(
        h.root("/add_product sensor https://shop.example/s").await,
        "Product \"sensor\" is already tracked with url \"https://shop.example/s\"."
    );
    assert_eq!(
        h.root("/add_product sensor https://shop.example/s2").await,
        "Product \"sensor\" now has url \"https://shop.example/s2\" instead of \"https://shop.example/s\"."
    );
    h.root("/add_product board https://shop.example/b").await;
    assert_eq!(
        h.root("/list_products").await,
        "board - https://shop.example/b\nsensor - https://shop.example/s2"
    );

    assert_eq!(h.root("/remove_product gone").await, "Product \"gone\" is not found.");
    assert_eq!(h.root("/remove_product board").await, "Product \"board\" is deleted.");

    let reloaded = h.watch.config().load().unwrap();
    assert_eq!(reloaded.products.len(), 1);
    assert_eq!(reloaded.products["sensor"], "https://shop.example/s2");
}

#[tokio::test]
async fn test_idempotent_add_does_not_persist() {
    let h = Harness::new().await;
    h.root("/add_channel deals").await;

    // A marker the store would drop if it rewrote the file
    let mut raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(h.config_path()).unwrap()).unwrap();
    raw["marker"] = serde_json::json!(true);
    let marked = serde_json::to_string(&raw).unwrap();
    fs::write(h.config_path(), &marked).unwrap();

    h.root("/add_channel deals").await;
    h.root("/remove_channel missing").await;
    h.root("/add_user root").await;

    assert_eq!(fs::read_to_string(h.config_path()).unwrap(), marked);
}

#[tokio::test]
async fn test_syntax_errors() {
    let h = Harness::new().await;

    assert_eq!(h.root("/add_product lonely").await, "Syntax: /add_product <name_of_product> <url>");
    assert_eq!(h.root("/add_user").await, "Syntax: /add_user <username>");
    assert_eq!(
        h.root("/set_update_interval").await,
        "Syntax: /set_update_interval <number of minutes>"
    );
}

#[tokio::test]
async fn test_set_interval() {
    let h = Harness::new().await;
    assert_eq!(h.watch.scheduler().live_tasks(), 1);

    assert_eq!(
        h.root("/set_update_interval 90").await,
        "Interval updated to 1 hours 30 minutes."
    );
    assert_eq!(h.watch.config().get().interval.as_secs(), 90 * 60);
    assert_eq!(
        h.watch.scheduler().interval().map(|i| i.as_secs()),
        Some(90 * 60)
    );
    assert_eq!(h.watch.scheduler().live_tasks(), 1);

    h.root("/set_update_interval 30").await;
    assert_eq!(h.watch.scheduler().live_tasks(), 1);
    assert_eq!(h.watch.config().load().unwrap().interval.as_secs(), 30 * 60);
}

#[tokio::test]
async fn test_invalid_interval_is_rejected() {
    let h = Harness::new().await;

    for bad in ["0", "-1", "soon"] {
        assert_eq!(
            h.root(&format!("/set_update_interval {}", bad)).await,
            "Expected positive integer as first argument"
        );
    }
    assert_eq!(h.watch.config().get().interval.as_secs(), 3600);
    assert_eq!(h.watch.scheduler().interval().map(|i| i.as_secs()), Some(3600));
}

#[tokio::test]
async fn test_start_and_stop() {
    let h = Harness::new().await;

    assert_eq!(h.root("/stop_updates").await, "Update cycle stopped.");
    assert!(!h.watch.config().get().active);
    assert!(!h.watch.config().load().unwrap().active);
    assert_eq!(h.watch.scheduler().state(), SchedulerState::Stopped);
    assert_eq!(h.watch.scheduler().live_tasks(), 0);

    assert_eq!(h.root("/stop_updates").await, "Update cycle stopped.");

    assert_eq!(h.root("/start_updates").await, "Update cycle started.");
    assert!(h.watch.config().get().active);
    assert_eq!(h.watch.scheduler().state(), SchedulerState::Running);

    assert_eq!(h.root("/start_updates").await, "Update cycle started.");
    assert_eq!(h.watch.scheduler().live_tasks(), 1);
    h.watch.shutdown().await;
}

#[tokio::test]
async fn test_set_interval_while_stopped_resumes_updates() {
    let h = Harness::new().await;
    h.root("/stop_updates").await;

    assert_eq!(
        h.root("/set_update_interval 30").await,
        "Interval updated to 0 hours 30 minutes."
    );

    assert_eq!(h.watch.scheduler().state(), SchedulerState::Running);
    assert_eq!(h.watch.scheduler().live_tasks(), 1);
    assert_eq!(h.watch.scheduler().interval().map(|i| i.as_secs()), Some(30 * 60));

    let saved = h.watch.config().load().unwrap();
    assert!(saved.active);
    assert_eq!(saved.interval.as_secs(), 30 * 60);
    h.watch.shutdown().await;
}

#[tokio::test]
async fn test_status() {
    let h = Harness::new().await;
    h.root("/add_channel deals").await;
    h.root("/add_product sensor https://shop.example/s").await;

    let status = h.root("/status").await;
    assert!(status.starts_with("Current config:\n```json\n{"));
    assert!(status.contains("\"interval_secs\": 3600"));
    assert!(status.contains("Human readable interval: 1h 0m"));
    assert!(status.contains("Last manifest:\n(empty)"));
    assert!(status.contains("Last check: never"));
    assert!(status.contains("Next check: "));
    assert!(status.ends_with("Channels: 1\nService channels: 0\nProducts: 1\nAdmins: 1"));

    h.fetcher.set("https://shop.example/s", 1999, "https://schema.org/InStock");
    h.root("/check_now").await;
    h.root("/stop_updates").await;

    let status = h.root("/status").await;
    assert!(status.contains("- ✅ sensor: InStock @ 19.99 EUR"));
    assert!(!status.contains("Last check: never"));
    assert!(!status.contains("Next check"));
}

#[tokio::test]
async fn test_reply_failure_is_escalated() {
    let h = Harness::new().await;
    h.root("/add_service_channel ops").await;
    h.root("/add_user alice").await;
    h.sink.break_channel("@alice");

    assert!(h.command("@alice", "/list_users").await.is_none());
    assert!(
        h.sink
            .last_to("ops")
            .unwrap()
            .contains("Cannot send message to channel @alice")
    );
}

#[tokio::test]
async fn test_commands_run_concurrently() {
    let h = std::sync::Arc::new(Harness::new().await);

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let h = std::sync::Arc::clone(&h);
            tokio::spawn(async move { h.root(&format!("/add_channel c{}", i)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(h.watch.config().get().notify_channels.len(), 16);
    assert_eq!(h.watch.config().load().unwrap().notify_channels.len(), 16);
}
