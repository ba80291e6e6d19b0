//! Tests for the in-memory state store.

use super::*;

const KEY: &str = "QueueContext";

// ============================================================================
// Direct Access Tests
// ============================================================================

#[tokio::test]
async fn test_missing_key_reads_none() {
    let store = InMemoryStateStore::new();

    assert!(store.get(KEY).await.unwrap().is_none());
    assert_eq!(store.version(KEY).unwrap(), 0);
}

#[tokio::test]
async fn test_put_then_get_bumps_version() {
    let store = InMemoryStateStore::new();

    store.put(KEY, Bytes::from_static(b"one")).await.unwrap();
    store.put(KEY, Bytes::from_static(b"two")).await.unwrap();

    assert_eq!(store.get(KEY).await.unwrap(), Some(Bytes::from_static(b"two")));
    assert_eq!(store.version(KEY).unwrap(), 2);
}

#[tokio::test]
async fn test_clones_share_storage() {
    let store = InMemoryStateStore::new();
    let clone = store.clone();

    clone.put(KEY, Bytes::from_static(b"shared")).await.unwrap();
    assert_eq!(store.get(KEY).await.unwrap(), Some(Bytes::from_static(b"shared")));
}

// ============================================================================
// Transaction Tests
// ============================================================================

mod transactions {
    use super::*;

    #[tokio::test]
    async fn test_writes_invisible_until_commit() {
        let store = InMemoryStateStore::new();
        let tx = store.begin();

        tx.put(KEY, Bytes::from_static(b"pending")).await.unwrap();
        assert!(store.get(KEY).await.unwrap().is_none());

        tx.commit().unwrap();
        assert_eq!(store.get(KEY).await.unwrap(), Some(Bytes::from_static(b"pending")));
    }

    #[tokio::test]
    async fn test_transaction_reads_its_own_writes() {
        let store = InMemoryStateStore::new();
        let tx = store.begin();

        tx.put(KEY, Bytes::from_static(b"mine")).await.unwrap();
        assert_eq!(tx.get(KEY).await.unwrap(), Some(Bytes::from_static(b"mine")));
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryStateStore::new();
        {
            let tx = store.begin();
            tx.put(KEY, Bytes::from_static(b"discarded")).await.unwrap();
        }

        assert!(store.get(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_read_conflicts_on_commit() {
        let store = InMemoryStateStore::new();
        store.put(KEY, Bytes::from_static(b"v1")).await.unwrap();

        let first = store.begin();
        let second = store.begin();
        first.get(KEY).await.unwrap();
        second.get(KEY).await.unwrap();

        first.put(KEY, Bytes::from_static(b"first")).await.unwrap();
        second.put(KEY, Bytes::from_static(b"second")).await.unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();

        assert!(matches!(err, StateError::Conflict { ref key } if key == KEY));
        assert!(err.is_retryable());
        assert_eq!(store.get(KEY).await.unwrap(), Some(Bytes::from_static(b"first")));
    }

    #[tokio::test]
    async fn test_conflict_detected_when_key_created_after_read() {
        let store = InMemoryStateStore::new();

        let tx = store.begin();
        assert!(tx.get(KEY).await.unwrap().is_none());

        store.put(KEY, Bytes::from_static(b"racer")).await.unwrap();
        tx.put(KEY, Bytes::from_static(b"late")).await.unwrap();

        assert!(matches!(tx.commit(), Err(StateError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_blind_write_commits_without_conflict() {
        let store = InMemoryStateStore::new();
        let tx = store.begin();

        store.put(KEY, Bytes::from_static(b"other")).await.unwrap();
        tx.put(KEY, Bytes::from_static(b"blind")).await.unwrap();

        tx.commit().unwrap();
        assert_eq!(store.version(KEY).unwrap(), 2);
    }
}
