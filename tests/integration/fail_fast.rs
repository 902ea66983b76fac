use std::sync::Arc;
use std::time::{Duration, Instant};

use rehydrate::RestoreError;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::integration::support::{file, index, restorer, CountingStore, MtimeAsCtime};

fn numbered_files(count: usize) -> Vec<rehydrate::Node> {
    (0..count)
        .map(|i| file(&format!("f{i}.bin"), &[(&format!("c{i}"), 0)]))
        .collect()
}

#[tokio::test]
async fn missing_chunk_stops_the_run_and_is_returned() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let store = Arc::new(CountingStore::new());
    for i in (0..10).filter(|i| *i != 1) {
        store.insert(&format!("c{i}"), b"data");
    }

    let err = restorer(index(numbered_files(10)), store, Arc::new(MtimeAsCtime::default()), 1)
        .restore("rp-test", &dest)
        .await
        .unwrap_err();

    assert!(
        matches!(err, RestoreError::ObjectNotFound { ref key, .. } if key == "c1"),
        "unexpected error: {err}"
    );
    assert_eq!(std::fs::read(dest.join("f0.bin")).unwrap(), b"data");
    for i in 2..10 {
        assert!(
            !dest.join(format!("f{i}.bin")).exists(),
            "f{i}.bin should never have been started"
        );
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn only_one_error_surfaces_when_several_units_fail() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    // Nothing is stored, so every admitted unit fails.
    let store = Arc::new(CountingStore::with_delay(Duration::from_millis(5)));

    let err = restorer(index(numbered_files(8)), store, Arc::new(MtimeAsCtime::default()), 4)
        .restore("rp-test", &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreError::ObjectNotFound { .. }));
}

#[tokio::test]
async fn cancelled_before_start_creates_nothing() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let store = Arc::new(CountingStore::new());
    store.insert("c0", b"data");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = restorer(index(numbered_files(1)), store.clone(), Arc::new(MtimeAsCtime::default()), 2)
        .restore_index(Arc::new(index(numbered_files(1))), &dest, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, RestoreError::Cancelled));
    assert!(!dest.exists());
    assert_eq!(store.gets(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelling_mid_run_interrupts_chunk_fetches() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let store = Arc::new(CountingStore::with_delay(Duration::from_secs(5)));
    for i in 0..4 {
        store.insert(&format!("c{i}"), b"data");
    }
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = restorer(index(numbered_files(4)), store, Arc::new(MtimeAsCtime::default()), 2)
        .restore_with_cancel("rp-test", &dest, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, RestoreError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failure_with_several_workers_stops_later_units() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let store = Arc::new(CountingStore::with_delay(Duration::from_millis(50)));
    for i in (0..10).filter(|i| *i != 1) {
        store.insert(&format!("c{i}"), b"data");
    }

    let err = restorer(index(numbered_files(10)), store.clone(), Arc::new(MtimeAsCtime::default()), 3)
        .restore("rp-test", &dest)
        .await
        .unwrap_err();
    assert!(matches!(err, RestoreError::ObjectNotFound { ref key, .. } if key == "c1"));

    // Slots freed by f0 and f2 may admit f3 and f4 before the failure lands;
    // their fetches are then cut short by the cancellation.
    for i in 3..5 {
        let path = dest.join(format!("f{i}.bin"));
        if path.exists() {
            assert!(std::fs::read(&path).unwrap().is_empty(), "f{i}.bin got content");
        }
    }
    for i in 5..10 {
        assert!(
            !dest.join(format!("f{i}.bin")).exists(),
            "f{i}.bin was started after the failure"
        );
    }
    assert!(store.gets() <= 5, "{} fetches issued", store.gets());
}
