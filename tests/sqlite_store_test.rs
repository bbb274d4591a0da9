//! Engine over the SQLite progress store.

mod common;

use std::sync::Arc;

use common::*;
use upnext::continue_watching::{ContinueWatchingEngine, EngineSettings};
use upnext::metadata::{MetadataProvider, MetadataResolver, ResolverSettings};
use upnext::store::{ProgressStore, SqliteProgressStore};
use upnext_common::{ProgressEvent, ProgressPatch, RowKind, SetOptions};
use upnext_db::pool::{init_memory_pool, init_pool};

fn engine(store: Arc<SqliteProgressStore>, provider: StubProvider) -> ContinueWatchingEngine {
    let resolver = MetadataResolver::new(
        Arc::new(provider) as Arc<dyn MetadataProvider>,
        ResolverSettings::default(),
    );
    ContinueWatchingEngine::new(store, resolver, None, EngineSettings::default())
}

#[tokio::test]
async fn movie_progress_round_trips_through_sqlite() {
    let store = Arc::new(SqliteProgressStore::new(init_memory_pool().unwrap()));
    let mut updates = store.subscribe().expect("sqlite store pushes updates");

    store
        .set(
            movie_key("tt1"),
            ProgressPatch::playback(50.0, 100.0).at(100),
            SetOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(
        updates.recv().await.unwrap(),
        ProgressEvent::Updated(movie_key("tt1"))
    );

    let engine = engine(Arc::clone(&store), StubProvider::new().movie("tt1", "Movie One"));
    assert_eq!(engine.refresh(true).await, Some(true));
    let rows = engine.state().rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].progress, 50.0);
    assert_eq!(rows[0].last_updated, 100);

    store
        .set(
            movie_key("tt1"),
            ProgressPatch::playback(90.0, 100.0).at(200),
            SetOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(engine.refresh(true).await, Some(false));
}

#[tokio::test]
async fn stale_writes_are_rejected() {
    let store = SqliteProgressStore::new(init_memory_pool().unwrap());
    let key = episode_key("tt2", "tt2:1:1");

    assert!(store
        .set(key.clone(), ProgressPatch::playback(40.0, 100.0).at(200), SetOptions::default())
        .await
        .unwrap());
    assert!(!store
        .set(key.clone(), ProgressPatch::playback(80.0, 100.0).at(100), SetOptions::default())
        .await
        .unwrap());

    let stored = store.get_all().await.unwrap();
    assert_eq!(stored[&key].current_time, 40.0);
}

#[tokio::test]
async fn up_next_from_file_backed_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upnext.db");
    let pool = init_pool(path.to_str().unwrap()).unwrap();
    let store = Arc::new(SqliteProgressStore::without_events(pool));
    assert!(store.subscribe().is_none());

    store
        .set(
            episode_key("tt2", "tt2:s01e01"),
            ProgressPatch::playback(1350.0, 1500.0).at(200),
            SetOptions::default(),
        )
        .await
        .unwrap();

    let provider = StubProvider::new().series("tt2", "Show Two", vec![aired(1, 1, 8), aired(1, 2, 1)]);
    let engine = engine(Arc::clone(&store), provider);
    engine.refresh(true).await;

    let rows = engine.state().rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, RowKind::UpNext);
    assert_eq!(rows[0].episode, Some(2));

    let row = rows[0].clone();
    engine.remove_row(&row).await.unwrap();
    assert!(store.get_all().await.unwrap().is_empty());
    assert!(store
        .tombstone(row.content_type, &row.content_id)
        .await
        .unwrap()
        .is_some());
}
