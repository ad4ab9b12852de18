//! Leader election behaviour against shared stores.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use operator_manager::coordination::{CoordinationStore, FileStore, InMemoryStore};
use operator_manager::leader::{ElectionError, LeaderStatus};

mod common;
use common::{CountingCallbacks, EventLog, Leadership, PartitionableStore};

struct Candidate {
    store: PartitionableStore,
    callbacks: Arc<CountingCallbacks>,
    status: Arc<LeaderStatus>,
    handle: JoinHandle<Result<(), ElectionError>>,
}

fn spawn_candidate(
    identity: &str,
    shared: &InMemoryStore,
    callbacks: CountingCallbacks,
    token: &CancellationToken,
) -> Candidate {
    let store = PartitionableStore::new(shared.clone());
    let callbacks = Arc::new(callbacks);
    let elector = common::elector(identity, Arc::new(store.clone()), callbacks.clone());
    let status = elector.status();
    let handle = tokio::spawn(elector.run(token.clone()));
    Candidate {
        store,
        callbacks,
        status,
        handle,
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_candidate_acquires_on_first_attempt() {
    let shared = InMemoryStore::new();
    let token = CancellationToken::new();
    let a = spawn_candidate("pod-a", &shared, CountingCallbacks::new(), &token);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(a.status.is_leading());
    assert_eq!(a.status.holder().as_deref(), Some("pod-a"));
    assert_eq!(a.callbacks.started(), 1);
    assert_eq!(a.callbacks.leaders.lock().unwrap().as_slice(), ["pod-a".to_string()]);

    token.cancel();
    a.handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_mutual_exclusion_with_partitioned_leader() {
    let shared = InMemoryStore::new();
    let leadership = Arc::new(Leadership::default());
    let token = CancellationToken::new();

    let candidates: Vec<Candidate> = ["pod-a", "pod-b", "pod-c"]
        .into_iter()
        .map(|id| spawn_candidate(id, &shared, CountingCallbacks::with_leadership(leadership.clone()), &token))
        .collect();

    tokio::time::sleep(Duration::from_secs(20)).await;
    let leaders: Vec<&Candidate> = candidates.iter().filter(|c| c.status.is_leading()).collect();
    assert_eq!(leaders.len(), 1);
    let first = leaders[0];
    let first_holder = first.status.holder();

    // Cut the leader off from the store; it must stand down before anyone
    // else can take the lease.
    first.store.partition();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert!(!first.status.is_leading());
    assert_eq!(first.callbacks.stopped(), 1);
    let successors: Vec<&Candidate> = candidates.iter().filter(|c| c.status.is_leading()).collect();
    assert_eq!(successors.len(), 1);
    assert_ne!(successors[0].status.holder(), first_holder);

    // everyone still connected heard about the new leader
    let successor = successors[0].status.holder().unwrap();
    for candidate in candidates.iter().filter(|c| !std::ptr::eq(*c, first)) {
        let leaders = candidate.callbacks.leaders.lock().unwrap();
        assert!(leaders.contains(&successor), "leaders seen: {:?}", leaders);
    }

    assert_eq!(leadership.max(), 1);
    let total_started: usize = candidates.iter().map(|c| c.callbacks.started()).sum();
    assert_eq!(total_started, 2);

    token.cancel();
    for candidate in candidates {
        candidate.handle.await.unwrap().unwrap();
    }
}

#[tokio::test(start_paused = true)]
async fn test_root_cancel_propagates_to_episode() {
    let shared = InMemoryStore::new();
    let log = EventLog::default();
    let token = CancellationToken::new();
    let a = spawn_candidate(
        "pod-a",
        &shared,
        CountingCallbacks::with_sequencer(common::recording_sequencer(&log)),
        &token,
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(a.status.is_leading());
    token.cancel();
    a.handle.await.unwrap().unwrap();

    assert_eq!(a.callbacks.started(), 1);
    assert_eq!(a.callbacks.stopped(), 1);
    assert_eq!(a.callbacks.cancelled_seen.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert!(log.position("control_loop:returned").is_some());
    assert!(log.position("reporter:cancelled").is_some());

    // release_on_cancel leaves the record free for the next candidate
    let record = shared.snapshot(&common::lock_key()).unwrap();
    assert!(!record.value.is_held());
}

#[tokio::test(start_paused = true)]
async fn test_reporter_completes_after_control_loop_returns() {
    let shared = InMemoryStore::new();
    let log = EventLog::default();
    let token = CancellationToken::new();
    let a = spawn_candidate(
        "pod-a",
        &shared,
        CountingCallbacks::with_sequencer(common::recording_sequencer(&log)),
        &token,
    );

    tokio::time::sleep(Duration::from_secs(1)).await;
    token.cancel();
    a.handle.await.unwrap().unwrap();

    let events = log.events();
    assert_eq!(events[0], "reporter:started");
    assert_eq!(events[1], "control_loop:registered");
    assert_eq!(events[2], "control_loop:started");
    let returned = log.position("control_loop:returned").unwrap();
    let completed = log.position("reporter:completed").unwrap();
    assert!(returned < completed, "events: {:?}", events);
}

#[tokio::test(start_paused = true)]
async fn test_reacquires_after_loss_with_fresh_episode() {
    let shared = InMemoryStore::new();
    let token = CancellationToken::new();
    let a = spawn_candidate("pod-a", &shared, CountingCallbacks::new(), &token);

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(a.status.episodes(), 1);

    a.store.partition();
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(!a.status.is_leading());
    assert_eq!(a.callbacks.stopped(), 1);

    a.store.heal();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(a.status.is_leading());
    assert_eq!(a.status.episodes(), 2);
    assert_eq!(a.callbacks.started(), 2);

    token.cancel();
    a.handle.await.unwrap().unwrap();
    assert_eq!(a.callbacks.stopped(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_released_lock_is_taken_without_waiting_for_expiry() {
    let shared = InMemoryStore::new();
    let first_token = CancellationToken::new();
    let a = spawn_candidate("pod-a", &shared, CountingCallbacks::new(), &first_token);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(a.status.is_leading());

    let second_token = CancellationToken::new();
    let b = spawn_candidate("pod-b", &shared, CountingCallbacks::new(), &second_token);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!b.status.is_leading());

    first_token.cancel();
    a.handle.await.unwrap().unwrap();

    // one jittered retry period, well under the 9s lease
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(b.status.is_leading());

    second_token.cancel();
    b.handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_before_first_acquire_is_retried() {
    let shared = InMemoryStore::new();
    let store = PartitionableStore::new(shared.clone());
    store.partition();
    let callbacks = Arc::new(CountingCallbacks::new());
    let elector = common::elector("pod-a", Arc::new(store.clone()) as Arc<dyn CoordinationStore>, callbacks.clone());
    let status = elector.status();
    let token = CancellationToken::new();
    let handle = tokio::spawn(elector.run(token.clone()));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!status.is_leading());
    assert_eq!(callbacks.started(), 0);

    store.heal();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(status.is_leading());

    token.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_episode_returning_at_once_waits_a_retry_period() {
    let shared = InMemoryStore::new();
    let token = CancellationToken::new();
    let began = tokio::time::Instant::now();
    let a = spawn_candidate("pod-a", &shared, CountingCallbacks::returning_at_once(), &token);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let elapsed = began.elapsed();
    let retry = common::fast_timing().retry_period();
    let allowed = 1 + (elapsed.as_millis() / retry.as_millis()) as usize;

    let started = a.callbacks.started();
    assert!(started >= 1);
    assert!(started <= allowed, "{} episodes in {:?} with retry {:?}", started, elapsed, retry);

    token.cancel();
    a.handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reaches_candidate_while_store_hangs() {
    let shared = InMemoryStore::new();
    let store = PartitionableStore::new(shared);
    store.stall();
    let callbacks = Arc::new(CountingCallbacks::new());
    let elector = common::elector("pod-a", Arc::new(store), callbacks.clone());
    let token = CancellationToken::new();
    let handle = tokio::spawn(elector.run(token.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(3), handle).await;
    result.expect("elector did not stop").unwrap().unwrap();
    assert_eq!(callbacks.started(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_release_gives_up_when_store_hangs() {
    let shared = InMemoryStore::new();
    let token = CancellationToken::new();
    let a = spawn_candidate("pod-a", &shared, CountingCallbacks::new(), &token);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(a.status.is_leading());

    a.store.stall();
    token.cancel();

    let result = tokio::time::timeout(Duration::from_secs(3), a.handle).await;
    result.expect("elector did not stop").unwrap().unwrap();
    assert_eq!(a.callbacks.stopped(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_file_store_contention_over_shared_directory() {
    let dir = TempDir::new().unwrap();
    let open = || Arc::new(FileStore::open(dir.path()).unwrap());

    let a_token = CancellationToken::new();
    let a_callbacks = Arc::new(CountingCallbacks::new());
    let a = common::elector("pod-a", open(), a_callbacks.clone());
    let a_status = a.status();
    let a_handle = tokio::spawn(a.run(a_token.clone()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(a_status.is_leading());

    let b_token = CancellationToken::new();
    let b_callbacks = Arc::new(CountingCallbacks::new());
    let b = common::elector("pod-b", open(), b_callbacks.clone());
    let b_status = b.status();
    let b_handle = tokio::spawn(b.run(b_token.clone()));

    // several renewals by pod-a while pod-b keeps polling
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert!(a_status.is_leading());
    assert!(!b_status.is_leading());
    assert_eq!(b_status.holder().as_deref(), Some("pod-a"));

    a_token.cancel();
    a_handle.await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(b_status.is_leading());
    assert_eq!(b_callbacks.started(), 1);
    assert_eq!(a_callbacks.started(), 1);

    let on_disk = FileStore::open(dir.path())
        .unwrap()
        .read(&common::lock_key())
        .unwrap()
        .unwrap();
    assert_eq!(on_disk.value.holder_identity, "pod-b");

    b_token.cancel();
    b_handle.await.unwrap().unwrap();
}
