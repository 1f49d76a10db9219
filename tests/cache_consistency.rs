//! Timing and invalidation behaviour of the stale-while-revalidate cache.
//!
//! Every test runs on a paused clock, so ages are exact.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use startupcoders::cache::{Cache, CacheConfig, CacheError, Invalidator, list_key, startup_key};
use tokio::time::sleep;

const REFRESH_LATENCY: Duration = Duration::from_millis(100);

fn cache() -> Cache {
    Cache::new(CacheConfig::from_millis(1000, 3000).expect("valid windows"))
}

type Fetch = Pin<Box<dyn Future<Output = io::Result<String>> + Send>>;

/// A fetch that counts its calls and resolves to `value` after
/// [`REFRESH_LATENCY`].
fn slow_fetch(calls: &Arc<AtomicUsize>, value: &'static str) -> impl FnOnce() -> Fetch {
    let calls = Arc::clone(calls);
    move || -> Fetch {
        calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            sleep(REFRESH_LATENCY).await;
            Ok(value.to_string())
        })
    }
}

async fn at(elapsed_ms: u64, start: tokio::time::Instant) {
    let target = start + Duration::from_millis(elapsed_ms);
    tokio::time::sleep_until(target).await;
}

#[tokio::test(start_paused = true)]
async fn fresh_stale_and_expired_reads_follow_the_timeline() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let start = tokio::time::Instant::now();

    cache.set("k", "v1".to_string()).expect("valid key");

    at(500, start).await;
    let value = cache.get("k", slow_fetch(&calls, "unused")).await.expect("hit");
    assert_eq!(value, "v1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    at(1500, start).await;
    let value = cache.get("k", slow_fetch(&calls, "v2")).await.expect("stale hit");
    assert_eq!(value, "v1", "stale data is served without waiting");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // The refresh resolves at t=1600.
    at(2000, start).await;
    let value = cache.get("k", slow_fetch(&calls, "unused")).await.expect("hit");
    assert_eq!(value, "v2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Expired relative to the t=1600 refresh (t=4600).
    at(5000, start).await;
    let value = cache.get("k", slow_fetch(&calls, "v3")).await.expect("refetch");
    assert_eq!(value, "v3");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn expiry_is_measured_from_the_refresh() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));
    let start = tokio::time::Instant::now();

    cache.set("k", "v1".to_string()).expect("valid key");
    at(1500, start).await;
    cache.get("k", slow_fetch(&calls, "v2")).await.expect("stale hit");

    // 3050ms after the refresh was triggered, but only 2950ms after it landed.
    at(4550, start).await;
    let value = cache.get("k", slow_fetch(&calls, "v3")).await.expect("stale hit");
    assert_eq!(value, "v2");
}

#[tokio::test(start_paused = true)]
async fn concurrent_stale_reads_trigger_one_refresh() {
    let cache = cache();
    let calls = Arc::new(AtomicUsize::new(0));

    cache.set("k", "v1".to_string()).expect("valid key");
    sleep(Duration::from_millis(1500)).await;

    let (a, b, c) = tokio::join!(
        cache.get("k", slow_fetch(&calls, "v2")),
        cache.get("k", slow_fetch(&calls, "v2")),
        cache.get("k", slow_fetch(&calls, "v2")),
    );
    for value in [a, b, c] {
        assert_eq!(value.expect("stale hit"), "v1");
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().refreshing, 1);

    sleep(REFRESH_LATENCY * 2).await;
    assert_eq!(cache.stats().refreshing, 0);
    assert!(cache.is_fresh("k"));
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_serving_stale_data() {
    let cache = cache();
    cache.set("k", "v1".to_string()).expect("valid key");
    sleep(Duration::from_millis(1500)).await;

    let value = cache
        .get("k", || async { Err::<String, _>(io::Error::other("db down")) })
        .await
        .expect("stale hit despite failing refresh");
    assert_eq!(value, "v1");

    sleep(REFRESH_LATENCY).await;
    assert!(cache.has("k"));
    assert_eq!(cache.stats().refreshing, 0, "marker cleared after failure");

    // The next stale read may try again.
    let calls = Arc::new(AtomicUsize::new(0));
    cache.get("k", slow_fetch(&calls, "v2")).await.expect("stale hit");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn miss_failures_surface_and_cache_nothing() {
    let cache = cache();

    let err = cache
        .get("k", || async { Err::<String, _>(io::Error::other("db down")) })
        .await
        .expect_err("nothing to fall back on");
    assert!(matches!(err, CacheError::Fetch(_)));
    assert!(!cache.has("k"));
}

#[tokio::test(start_paused = true)]
async fn invalidated_startup_is_refetched_once() {
    let cache = cache();
    let invalidator = Invalidator::new(cache.clone());
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .set(&startup_key("abc"), "old".to_string())
        .expect("valid key");
    assert!(invalidator.invalidate_startup("abc"));

    let value = cache
        .get(&startup_key("abc"), slow_fetch(&calls, "new"))
        .await
        .expect("refetch");
    assert_eq!(value, "new");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_racing_an_invalidation_is_discarded() {
    let cache = cache();
    let invalidator = Invalidator::new(cache.clone());
    let calls = Arc::new(AtomicUsize::new(0));
    let key = startup_key("abc");

    cache.set(&key, "v1".to_string()).expect("valid key");
    sleep(Duration::from_millis(1500)).await;
    cache.get(&key, slow_fetch(&calls, "outdated")).await.expect("stale hit");

    invalidator.invalidate_startup("abc");
    sleep(REFRESH_LATENCY * 2).await;

    assert!(!cache.has(&key), "the in-flight refresh must not resurrect the entry");
}

#[test]
fn equivalent_list_filters_share_a_key() {
    assert_eq!(
        list_key(1, Some("react"), &[1, 2, 3]),
        list_key(1, Some("react"), &[1, 2, 3])
    );
    assert_eq!(
        list_key(1, Some(" React "), &[3, 1, 2]),
        list_key(1, Some("react"), &[1, 2, 3])
    );
    assert_ne!(list_key(1, None, &[]), list_key(2, None, &[]));
}
