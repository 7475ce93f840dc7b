//! Integration tests for the viewport-driven trigger loop

use labeling_media::visibility::{Rect, RootMargin, TriggerOptions, VisibilityTracker};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn counter() -> (Arc<AtomicU32>, impl FnOnce() + Send + 'static) {
    let fired = Arc::new(AtomicU32::new(0));
    let hook = Arc::clone(&fired);
    (fired, move || {
        hook.fetch_add(1, Ordering::SeqCst);
    })
}

/// Let the driver task observe the latest update
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

fn options() -> TriggerOptions {
    TriggerOptions::new(0.1, "100px".parse::<RootMargin>().unwrap())
}

#[tokio::test]
async fn test_driver_fires_on_scroll() {
    let (tx, rx) = watch::channel(Rect::new(0.0, 0.0, 800.0, 600.0));
    let tracker = VisibilityTracker::new();
    let driver = tracker.spawn_driver(rx);

    let (fired, hook) = counter();
    let handle = tracker.attach(Rect::new(0.0, 1500.0, 200.0, 200.0), options(), hook);
    settle().await;
    assert!(!handle.should_load());

    // Within the 100px margin but not yet on screen
    tx.send(Rect::new(0.0, 850.0, 800.0, 600.0)).unwrap();
    settle().await;
    assert!(handle.should_load());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    // Scrolling past and back never fires again
    tx.send(Rect::new(0.0, 5000.0, 800.0, 600.0)).unwrap();
    settle().await;
    tx.send(Rect::new(0.0, 1400.0, 800.0, 600.0)).unwrap();
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(handle.should_load());
    assert_eq!(tracker.pending(), 0);

    drop(tx);
    driver.await.unwrap();
}

#[tokio::test]
async fn test_attach_while_visible_fires_once() {
    let (_tx, rx) = watch::channel(Rect::new(0.0, 0.0, 800.0, 600.0));
    let tracker = VisibilityTracker::new();
    let driver = tracker.spawn_driver(rx);
    settle().await;

    let (fired, hook) = counter();
    let handle = tracker.attach(Rect::new(10.0, 10.0, 100.0, 100.0), options(), hook);
    settle().await;

    assert!(handle.should_load());
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    tracker.tick();
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    driver.abort();
}

#[tokio::test]
async fn test_dropped_handle_never_fires() {
    let (tx, rx) = watch::channel(Rect::new(0.0, 0.0, 800.0, 600.0));
    let tracker = VisibilityTracker::new();
    let driver = tracker.spawn_driver(rx);

    let (fired, hook) = counter();
    let handle = tracker.attach(Rect::new(0.0, 3000.0, 100.0, 100.0), options(), hook);
    settle().await;
    drop(handle);
    assert_eq!(tracker.pending(), 0);

    tx.send(Rect::new(0.0, 2800.0, 800.0, 600.0)).unwrap();
    settle().await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    drop(tx);
    driver.await.unwrap();
}

#[tokio::test]
async fn test_layout_change_wakes_driver() {
    let (_tx, rx) = watch::channel(Rect::new(0.0, 0.0, 800.0, 600.0));
    let tracker = VisibilityTracker::new();
    let driver = tracker.spawn_driver(rx);

    let (fired, hook) = counter();
    let handle = tracker.attach(Rect::new(0.0, 4000.0, 100.0, 100.0), options(), hook);
    settle().await;
    assert!(!handle.should_load());

    // Content above collapsed; the placeholder moved into view
    handle.set_bounds(Rect::new(0.0, 300.0, 100.0, 100.0));
    settle().await;
    assert!(handle.should_load());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!handle.is_attached());

    driver.abort();
}

#[tokio::test]
async fn test_many_placeholders_fire_independently() {
    let (tx, rx) = watch::channel(Rect::new(0.0, 0.0, 800.0, 600.0));
    let tracker = VisibilityTracker::new();
    let driver = tracker.spawn_driver(rx);

    let fired = Arc::new(AtomicU32::new(0));
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let fired = Arc::clone(&fired);
            tracker.attach(
                Rect::new(0.0, i as f64 * 500.0, 800.0, 400.0),
                options(),
                move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                },
            )
        })
        .collect();

    settle().await;
    // Rows at 0 and 500 are visible; 1000 is outside the 100px margin
    assert_eq!(fired.load(Ordering::SeqCst), 2);

    for top in (0..=4500).step_by(300) {
        tx.send(Rect::new(0.0, top as f64, 800.0, 600.0)).unwrap();
        settle().await;
    }

    assert_eq!(fired.load(Ordering::SeqCst), 10);
    assert!(handles.iter().all(|h| h.should_load()));

    drop(tx);
    tokio::time::timeout(Duration::from_secs(1), driver)
        .await
        .unwrap()
        .unwrap();
}
