use unwindd_front::taset::{TrustAnchorSet, TrustAnchorStore};

#[tokio::test]
async fn persist_then_load_round_trips_the_current_set() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unwind.key");

    let mut store = TrustAnchorStore::new(&path, TrustAnchorSet::from_lines(""));
    store.begin_staging();
    store.stage("example.com. IN DS 12345 8 2 ABCD".to_string());
    store.diff_and_swap();
    store.persist().await.unwrap();

    let reloaded = TrustAnchorStore::load(&path).await.unwrap();
    assert!(reloaded
        .current()
        .contains("example.com. IN DS 12345 8 2 ABCD"));
}

#[tokio::test]
async fn load_tolerates_a_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("does-not-exist.key");

    let store = TrustAnchorStore::load(&path).await.unwrap();
    assert!(store.current().is_empty());
}
