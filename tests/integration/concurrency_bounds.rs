use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use crate::integration::support::{
    file, index, restorer, CountingStore, MtimeAsCtime, StaticIndex, BUCKET,
};

fn delayed_store(keys: usize) -> Arc<CountingStore> {
    let store = Arc::new(CountingStore::with_delay(Duration::from_millis(20)));
    for i in 0..keys {
        store.insert(&format!("c{i}"), &[i as u8; 16]);
    }
    store
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn units_in_flight_never_exceed_the_worker_limit() {
    let temp = TempDir::new().unwrap();
    let store = delayed_store(12);
    let nodes = (0..12)
        .map(|i| file(&format!("f{i:02}.bin"), &[(&format!("c{i}"), 0)]))
        .collect();

    let report = restorer(index(nodes), store.clone(), Arc::new(MtimeAsCtime::default()), 3)
        .restore("rp-test", &temp.path().join("out"))
        .await
        .unwrap();

    assert_eq!(report.created, 12);
    assert!(store.peak() <= 3, "peak was {}", store.peak());
    assert!(store.peak() >= 2, "units never overlapped");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_restores_sequentially() {
    let temp = TempDir::new().unwrap();
    let store = delayed_store(5);
    let nodes = (0..5)
        .map(|i| file(&format!("f{i}.bin"), &[(&format!("c{i}"), 0)]))
        .collect();

    restorer(index(nodes), store.clone(), Arc::new(MtimeAsCtime::default()), 1)
        .restore("rp-test", &temp.path().join("out"))
        .await
        .unwrap();

    assert_eq!(store.peak(), 1);
    assert_eq!(store.gets(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn chunk_fetches_within_a_file_are_bounded() {
    let temp = TempDir::new().unwrap();
    let dest = temp.path().join("out");
    let store = delayed_store(6);
    let chunks: Vec<(String, u64)> = (0..6).map(|i| (format!("c{i}"), i * 16)).collect();
    let refs: Vec<(&str, u64)> = chunks.iter().map(|(k, s)| (k.as_str(), *s)).collect();
    let idx = index(vec![file("big.bin", &refs)]);

    let restorer = rehydrate::Restorer::new(
        Arc::new(StaticIndex(idx)),
        store.clone(),
        Arc::new(MtimeAsCtime::default()),
        rehydrate::RestoreOptions::new(BUCKET)
            .with_max_workers(1)
            .with_chunk_fetch_concurrency(3),
    );
    let report = restorer.restore("rp-test", &dest).await.unwrap();

    assert_eq!(report.bytes_written, 96);
    assert!(store.peak() <= 3, "peak was {}", store.peak());
    let bytes = std::fs::read(dest.join("big.bin")).unwrap();
    for (i, block) in bytes.chunks(16).enumerate() {
        assert!(block.iter().all(|b| *b == i as u8), "block {i} misplaced");
    }
}
