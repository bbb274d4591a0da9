//! Refresh scheduler integration tests.
//!
//! Run on a paused clock so debounce and polling windows elapse instantly.

mod common;

use std::time::Duration;

use common::*;
use tokio::time::sleep;
use upnext::continue_watching::Phase;
use upnext::refresh::{AppLifecycle, RefreshScheduler, SchedulerHandle, SchedulerSettings};
use upnext::store::{MemoryProgressStore, ProgressStore};
use upnext_common::{ContentType, ProgressPatch, SetOptions};

fn settings() -> SchedulerSettings {
    SchedulerSettings {
        debounce: Duration::from_millis(500),
        poll_interval: Duration::from_secs(120),
    }
}

fn spawn(h: &TestHarness) -> SchedulerHandle {
    RefreshScheduler::spawn(h.engine.clone(), h.engine.store_updates(), settings())
}

fn movies(provider: StubProvider, ids: &[&str]) -> StubProvider {
    ids.iter().fold(provider, |p, id| p.movie(id, &id.to_uppercase()))
}

async fn watch_movie(h: &TestHarness, content_id: &str, current_time: f64) {
    h.store
        .set(
            movie_key(content_id),
            ProgressPatch::playback(current_time, 100.0),
            SetOptions::default(),
        )
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn mount_runs_a_foreground_refresh() {
    let store = MemoryProgressStore::new()
        .with_records([record(ContentType::Movie, "tt1", None, 10.0, 100.0, 100)]);
    let h = TestHarness::new(store, movies(StubProvider::new(), &["tt1"]));
    let handle = spawn(&h);

    assert!(handle.mount().await);

    let state = handle.state().borrow().clone();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.rows.len(), 1);
    assert_eq!(h.store.get_all_calls(), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn update_bursts_collapse_into_one_refresh() {
    let h = TestHarness::new(
        MemoryProgressStore::new(),
        movies(StubProvider::new(), &["tt1", "tt2", "tt3"]),
    );
    let handle = spawn(&h);

    assert!(!handle.mount().await);
    assert_eq!(h.store.get_all_calls(), 1);

    for content_id in ["tt1", "tt2", "tt3"] {
        watch_movie(&h, content_id, 20.0).await;
        sleep(Duration::from_millis(100)).await;
    }
    // Still inside the quiet period of the last write.
    assert_eq!(h.store.get_all_calls(), 1);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.store.get_all_calls(), 2);
    assert_eq!(handle.state().borrow().rows.len(), 3);
    assert!(h.engine.has_content());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn external_updates_are_debounced() {
    let h = TestHarness::new(MemoryProgressStore::new(), StubProvider::new());
    let handle = spawn(&h);
    handle.mount().await;

    handle.notify_external_update().await;
    handle.notify_external_update().await;
    sleep(Duration::from_millis(400)).await;
    handle.notify_external_update().await;
    sleep(Duration::from_millis(400)).await;
    assert_eq!(h.store.get_all_calls(), 1);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(h.store.get_all_calls(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn polls_when_the_store_cannot_push_updates() {
    let h = TestHarness::new(MemoryProgressStore::without_events(), StubProvider::new());
    assert!(h.engine.store_updates().is_none());
    let handle = spawn(&h);
    handle.mount().await;

    sleep(Duration::from_secs(119)).await;
    assert_eq!(h.store.get_all_calls(), 1);

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.store.get_all_calls(), 2);

    sleep(Duration::from_secs(120)).await;
    assert_eq!(h.store.get_all_calls(), 3);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_polling_when_updates_are_pushed() {
    let h = TestHarness::new(MemoryProgressStore::new(), StubProvider::new());
    let handle = spawn(&h);
    handle.mount().await;

    sleep(Duration::from_secs(600)).await;
    assert_eq!(h.store.get_all_calls(), 1);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn request_during_refresh_is_dropped() {
    let store = MemoryProgressStore::new()
        .with_records([record(ContentType::Movie, "tt1", None, 10.0, 100.0, 100)]);
    let provider = movies(StubProvider::with_delay(Duration::from_secs(1)), &["tt1"]);
    let h = TestHarness::new(store, provider);
    let handle = spawn(&h);

    let (mounted, dropped) = tokio::join!(handle.mount(), async {
        sleep(Duration::from_millis(10)).await;
        handle.refresh(true).await
    });

    // The dropped request answers with the list as it was.
    assert!(mounted);
    assert!(!dropped);
    assert_eq!(h.store.get_all_calls(), 1);
    assert_eq!(h.provider.meta_calls(), 1);

    // Once idle, a new request runs.
    assert!(handle.refresh(false).await);
    assert_eq!(h.store.get_all_calls(), 2);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn foregrounding_the_app_refreshes() {
    let h = TestHarness::new(MemoryProgressStore::new(), StubProvider::new());
    let handle = spawn(&h);
    handle.mount().await;

    // Already active: nothing to do.
    handle.app_state_changed(AppLifecycle::Active).await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.get_all_calls(), 1);

    handle.app_state_changed(AppLifecycle::Background).await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.get_all_calls(), 1);

    handle.app_state_changed(AppLifecycle::Active).await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.get_all_calls(), 2);
    assert!(!handle.state().borrow().loading);

    handle.app_state_changed(AppLifecycle::Inactive).await;
    handle.app_state_changed(AppLifecycle::Active).await;
    sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.get_all_calls(), 3);

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remove_row_through_the_handle() {
    let store = MemoryProgressStore::new()
        .with_records([record(ContentType::Movie, "tt1", None, 10.0, 100.0, 100)]);
    let h = TestHarness::new(store, movies(StubProvider::new(), &["tt1"]));
    let handle = spawn(&h);
    handle.mount().await;

    let row = handle.state().borrow().rows[0].clone();
    handle.remove_row(&row).await.unwrap();

    assert!(handle.state().borrow().rows.is_empty());
    assert!(!h.engine.has_content());
    assert!(h.store.get_all().await.unwrap().is_empty());

    handle.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_clears_metadata_cache() {
    let store = MemoryProgressStore::new()
        .with_records([record(ContentType::Movie, "tt1", None, 10.0, 100.0, 100)]);
    let h = TestHarness::new(store, movies(StubProvider::new(), &["tt1"]));
    let handle = spawn(&h);
    handle.mount().await;
    assert_eq!(h.engine.resolver().cached_len(), 1);

    handle.shutdown().await;
    assert_eq!(h.engine.resolver().cached_len(), 0);

    // No timers survive the scheduler.
    watch_movie(&h, "tt1", 30.0).await;
    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.store.get_all_calls(), 1);
}
