use kitchen_sync::bus::SubscriptionScope;
use kitchen_sync::domain::{Actor, CustomerRef, Money, NewItem, NewOrder, TicketStatus};
use kitchen_sync::lifecycle::KitchenSystem;
use kitchen_sync::mock::{MockStore, MockTransport};
use kitchen_sync::store::MemoryStore;
use kitchen_sync::subscription::TeardownReason;
use kitchen_sync::{SyncConfig, SyncError};
use std::sync::Arc;
use std::time::Duration;

fn new_order(items: Vec<NewItem>) -> NewOrder {
    NewOrder {
        customer: CustomerRef::from("cust_1"),
        table: Some("T3".into()),
        items,
    }
}

/// Every concurrent writer sees exactly its predecessor's result.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_lose_no_updates() {
    let system = Arc::new(KitchenSystem::new(
        Arc::new(MemoryStore::new()),
        SyncConfig::default(),
    ));
    let created = system.writer.create_order(new_order(vec![])).await.unwrap();
    let order_id = created.order.id;

    let writers: Vec<_> = (0..20)
        .map(|i| {
            let system = system.clone();
            tokio::spawn(async move {
                system
                    .writer
                    .add_item(order_id, NewItem::new(format!("Skewer {i}"), Money(100), 1))
                    .await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for writer in writers {
        outcomes.push(writer.await.unwrap().expect("add_item failed"));
    }
    outcomes.sort_by_key(|o| o.previous_total);

    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.previous_total, Money(100 * i as i64));
        assert_eq!(outcome.order.total, Money(100 * (i as i64 + 1)));
        assert_eq!(outcome.order.items.len(), i + 1);
    }
    assert_eq!(system.writer.locked_orders(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_ticket_updates_on_one_order() {
    let system = Arc::new(KitchenSystem::new(
        Arc::new(MemoryStore::new()),
        SyncConfig::default(),
    ));
    let created = system
        .writer
        .create_order(new_order(vec![NewItem::new("Ramen", Money(1100), 1)]))
        .await
        .unwrap();
    let mut tickets = vec![created.ticket.unwrap().id];
    for _ in 0..7 {
        let added = system
            .writer
            .add_item(created.order.id, NewItem::new("Gyoza", Money(600), 1))
            .await
            .unwrap();
        tickets.push(added.ticket.unwrap().id);
    }

    let writers: Vec<_> = tickets
        .into_iter()
        .map(|ticket_id| {
            let system = system.clone();
            tokio::spawn(async move {
                system
                    .writer
                    .mutate_ticket(ticket_id, TicketStatus::Ready.into(), &Actor::staff("cook"))
                    .await
            })
        })
        .collect();

    let mut ready_seen = 0;
    for writer in writers {
        let outcome = writer.await.unwrap().unwrap();
        if outcome.order.status == kitchen_sync::domain::OrderStatus::Ready {
            ready_seen += 1;
        }
    }
    // only the last writer under the lock sees every ticket ready
    assert_eq!(ready_seen, 1);
}

#[tokio::test(start_paused = true)]
async fn test_lock_wait_is_bounded() {
    let store = Arc::new(MockStore::new());
    let config = SyncConfig {
        lock_timeout: Duration::from_secs(5),
        ..SyncConfig::default()
    };
    let system = Arc::new(KitchenSystem::new(store.clone(), config));
    let created = system
        .writer
        .create_order(new_order(vec![NewItem::new("Curry", Money(900), 1)]))
        .await
        .unwrap();
    let order_id = created.order.id;
    let ticket_id = created.ticket.unwrap().id;

    store.set_save_delay(Duration::from_secs(10));
    let slow = {
        let system = system.clone();
        tokio::spawn(async move {
            system
                .writer
                .mutate_ticket(ticket_id, TicketStatus::Ready.into(), &Actor::staff("cook"))
                .await
        })
    };
    // let the slow writer take the lock and park in its save
    tokio::time::sleep(Duration::from_secs(1)).await;

    let err = system
        .writer
        .add_item(order_id, NewItem::new("Naan", Money(300), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::LockTimeout { .. }));
    assert!(err.is_retryable());

    let outcome = slow.await.unwrap().expect("slow writer should still succeed");
    assert_eq!(outcome.order.items.len(), 1);
}

/// A viewer that never acknowledges is reaped; later publishes skip it
/// without any error reaching the writer.
#[tokio::test(start_paused = true)]
async fn test_silent_viewer_is_reaped() {
    let system = Arc::new(KitchenSystem::new(
        Arc::new(MemoryStore::new()),
        SyncConfig::default(),
    ));
    let created = system
        .writer
        .create_order(new_order(vec![NewItem::new("Pho", Money(1300), 1)]))
        .await
        .unwrap();

    let silent = MockTransport::new();
    let mut silent_handle = system
        .subscriptions
        .connect(SubscriptionScope::All, silent.clone())
        .await
        .unwrap();

    let live = MockTransport::new();
    let live_handle = system
        .subscriptions
        .connect(SubscriptionScope::All, live.clone())
        .await
        .unwrap();
    let acker = {
        let subscriptions = system.subscriptions.clone();
        let id = live_handle.id;
        tokio::spawn(async move {
            while subscriptions.acknowledge(id) {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
        })
    };

    let reason = tokio::time::timeout(Duration::from_secs(60), silent_handle.closed())
        .await
        .expect("silent viewer outlived the heartbeat window");
    assert_eq!(reason, TeardownReason::HeartbeatTimeout);
    assert!(silent.frames().iter().any(|f| f.starts_with(": keep-alive")));
    assert!(system.subscriptions.is_active(live_handle.id));
    assert_eq!(system.bus.subscriber_count(), 1);

    let outcome = system
        .writer
        .mutate_ticket(
            created.ticket.unwrap().id,
            TicketStatus::Ready.into(),
            &Actor::staff("cook"),
        )
        .await
        .expect("publisher must not see the reaped viewer");
    assert_eq!(outcome.events.len(), 2);

    tokio::time::timeout(Duration::from_secs(1), live.wait_for_messages(3))
        .await
        .unwrap();
    assert_eq!(silent.messages().len(), 1);

    system.subscriptions.disconnect(live_handle.id);
    acker.await.unwrap();
}

/// Explicit disconnects, a transport drop and the heartbeat reaper racing
/// each other still end the subscription exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_teardowns_run_once() {
    for _ in 0..20 {
        let config = SyncConfig {
            ping_interval: Duration::from_millis(1),
            heartbeat_timeout: Duration::from_millis(1),
            ..SyncConfig::default()
        };
        let system = KitchenSystem::new(Arc::new(MemoryStore::new()), config);
        let transport = MockTransport::new();
        let mut handle = system
            .subscriptions
            .connect(SubscriptionScope::All, transport.clone())
            .await
            .unwrap();
        let id = handle.id;

        let racers: Vec<_> = (0..6)
            .map(|i| {
                let subscriptions = system.subscriptions.clone();
                let transport = transport.clone();
                tokio::spawn(async move {
                    if i == 0 {
                        transport.simulate_disconnect();
                        false
                    } else {
                        subscriptions.disconnect(id)
                    }
                })
            })
            .collect();

        let mut explicit_wins = 0;
        for racer in racers {
            if racer.await.unwrap() {
                explicit_wins += 1;
            }
        }

        let reason = tokio::time::timeout(Duration::from_secs(5), handle.closed())
            .await
            .unwrap();
        assert!(explicit_wins <= 1);
        if explicit_wins == 1 {
            assert_eq!(reason, TeardownReason::ClientDisconnect);
        }
        assert_eq!(system.subscriptions.active_count(), 0);
        assert_eq!(system.bus.subscriber_count(), 0);
        assert!(!system.subscriptions.disconnect(id));
    }
}
