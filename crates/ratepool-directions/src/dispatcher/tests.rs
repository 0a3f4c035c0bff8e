use crate::{Coord, Dispatcher, Error, Mode, Trip};
use core::time::Duration;
use futures::FutureExt;
use ratepool::{PoolConfig, handler_fn};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

fn trip(lat: f64) -> Trip {
    Trip::new(Coord::new(lat, 0.0), Coord::new(lat, 1.0), Mode::Walking)
}

/// Handler keyed on the origin latitude: 1 -> 5 m, 2 -> no route, 3 -> 7 m,
/// 4 -> panic, anything else -> 100 m.
fn scripted(
    calls: Arc<AtomicUsize>,
) -> impl ratepool::Handler<Trip, Output = u64, Error = Error> {
    handler_fn(move |_worker_id: usize, trip: Trip| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            let res: Result<u64, Error> = match trip.origin.lat as u64 {
                1 => Ok(5),
                2 => Err(Error::NoRoute),
                3 => Ok(7),
                4 => panic!("bad trip"),
                _ => Ok(100),
            };
            res
        }
    })
}

fn dispatcher(
    calls: &Arc<AtomicUsize>,
) -> Dispatcher<impl ratepool::Handler<Trip, Output = u64, Error = Error>> {
    Dispatcher::with_handler(PoolConfig::new(4, 1_000), scripted(Arc::clone(calls))).unwrap()
}

#[tokio::test]
async fn single_lookup_round_trips_success_and_failure() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    assert_eq!(api.get_distance(trip(1.0)).await.unwrap(), 5);
    assert!(matches!(api.get_distance(trip(2.0)).await, Err(Error::NoRoute)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn batch_omits_failures() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    let distances = api.get_distances([trip(1.0), trip(2.0), trip(3.0)]).await;

    assert_eq!(distances.len(), 2);
    assert_eq!(distances[&trip(1.0)], 5);
    assert_eq!(distances[&trip(3.0)], 7);
    assert!(!distances.contains_key(&trip(2.0)));
}

#[tokio::test]
async fn duplicate_trips_run_twice_and_share_one_entry() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    let distances = api.get_distances([trip(1.0), trip(1.0)]).await;

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(distances.len(), 1);
    assert_eq!(distances[&trip(1.0)], 5);
}

#[tokio::test]
async fn try_get_distances_keeps_order_and_errors() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    let results = api
        .try_get_distances([trip(3.0), trip(2.0), trip(1.0)])
        .await;

    let trips: Vec<_> = results.iter().map(|(trip, _)| *trip).collect();
    assert_eq!(trips, [trip(3.0), trip(2.0), trip(1.0)]);
    assert_eq!(results[0].1.as_ref().ok(), Some(&7));
    assert!(matches!(results[1].1, Err(Error::NoRoute)));
    assert_eq!(results[2].1.as_ref().ok(), Some(&5));
}

#[tokio::test]
async fn empty_batch_is_empty() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    assert!(api.get_distances(Vec::new()).await.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_lookup_is_unexpected_and_pool_survives() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    assert!(matches!(
        api.get_distance(trip(4.0)).await,
        Err(Error::Unexpected { .. })
    ));
    assert_eq!(api.get_distance(trip(9.0)).await.unwrap(), 100);
}

#[tokio::test]
async fn concurrent_callers_share_the_pool() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = Arc::new(dispatcher(&calls));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let api = Arc::clone(&api);
            tokio::spawn(async move { api.get_distances([trip(1.0), trip(3.0)]).await })
        })
        .collect();

    for task in tasks {
        let distances = task.await.unwrap();
        assert_eq!(distances.len(), 2);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 16);
}

#[tokio::test]
async fn lookups_after_shutdown_are_cancelled() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);
    api.shutdown().await;

    assert!(matches!(
        api.get_distance(trip(1.0)).await,
        Err(Error::Cancelled)
    ));
    assert!(api.get_distances([trip(1.0)]).await.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn batch_is_throttled_to_the_configured_rate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = Dispatcher::with_handler(PoolConfig::new(10, 8), scripted(Arc::clone(&calls)))
        .unwrap();

    let start = tokio::time::Instant::now();
    let distances = api.get_distances((0..20).map(|n| trip(f64::from(10 + n)))).await;

    assert_eq!(distances.len(), 20);
    // 8 start at once, 8 more a second later, the last 4 after two seconds.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn rejects_invalid_pool_config() {
    let calls = Arc::new(AtomicUsize::new(0));
    let res = Dispatcher::with_handler(PoolConfig::new(0, 8), scripted(calls));
    assert!(matches!(res, Err(Error::Pool(_))));
}

#[tokio::test(start_paused = true)]
async fn abandoned_lookup_leaves_the_pending_count() {
    let calls = Arc::new(AtomicUsize::new(0));
    let api = dispatcher(&calls);

    let mut lookup = Box::pin(api.get_distance(trip(1.0)));
    assert!(lookup.as_mut().now_or_never().is_none());
    assert_eq!(api.pending(), 1);
    drop(lookup);
    assert_eq!(api.pending(), 0);

    // The handler sleeps 5ms, so a 1ms deadline drops the lookup unresolved.
    let res = tokio::time::timeout(Duration::from_millis(1), api.get_distance(trip(3.0))).await;
    assert!(res.is_err());
    assert_eq!(api.pending(), 0);

    assert_eq!(api.get_distance(trip(1.0)).await.unwrap(), 5);
    api.get_distances([trip(1.0), trip(2.0)]).await;
    assert_eq!(api.pending(), 0);
}
