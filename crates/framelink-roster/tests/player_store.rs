//! Roster behavior across sequences of platform snapshots.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use framelink_protocol::PlayerDto;
use framelink_roster::{PlayerEvent, PlayerEventKind, PlayerStore, RosterError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =========================================================================
// Helpers
// =========================================================================

fn dto(id: &str) -> PlayerDto {
    PlayerDto::new(id)
}

fn ready(id: &str) -> PlayerDto {
    let mut dto = PlayerDto::new(id);
    dto.ready = true;
    dto
}

/// Records `(kind, connection_id)` for every event the store emits.
fn record_events(store: &PlayerStore) -> Arc<Mutex<Vec<(PlayerEventKind, String)>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    // Lives for the whole test.
    let _subscription = store.add_listener(None, move |event: &PlayerEvent| {
        sink.lock()
            .unwrap()
            .push((event.kind, event.player.connection_id().to_owned()));
    });
    log
}

fn take(log: &Mutex<Vec<(PlayerEventKind, String)>>) -> Vec<(PlayerEventKind, String)> {
    std::mem::take(&mut *log.lock().unwrap())
}

fn ids(store: &PlayerStore) -> BTreeSet<String> {
    store.connection_ids().into_iter().collect()
}

// =========================================================================
// Join / kick
// =========================================================================

#[test]
fn test_join_then_kick_sequence() {
    let store = PlayerStore::new();
    let log = record_events(&store);

    store.smart_update_players(&[dto("A"), dto("B")]);
    assert_eq!(
        take(&log),
        vec![
            (PlayerEventKind::Joined, "A".into()),
            (PlayerEventKind::Joined, "B".into()),
        ]
    );

    store.smart_update_players(&[dto("B"), dto("C")]);
    assert_eq!(
        take(&log),
        vec![
            (PlayerEventKind::Joined, "C".into()),
            (PlayerEventKind::Kicked, "A".into()),
        ]
    );

    store.smart_update_players(&[]);
    assert_eq!(
        take(&log),
        vec![
            (PlayerEventKind::Kicked, "B".into()),
            (PlayerEventKind::Kicked, "C".into()),
        ]
    );
    assert!(store.is_empty());
}

#[test]
fn test_join_listener_sees_post_update_roster() {
    let store = Arc::new(PlayerStore::new());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let inner_store = Arc::clone(&store);
    let sink = Arc::clone(&seen);
    let _sub = store.add_join_listener(move |player| {
        sink.lock()
            .unwrap()
            .push((player.connection_id().to_owned(), inner_store.len()));
    });

    store.smart_update_players(&[dto("A"), dto("B")]);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("A".to_owned(), 2), ("B".to_owned(), 2)]
    );
}

#[test]
fn test_kick_listener_receives_last_known_record() {
    let store = PlayerStore::new();
    let kicked = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&kicked);
    let _sub = store.add_kick_listener(move |player| {
        *sink.lock().unwrap() = player.screen_name();
    });

    let mut ada = dto("A");
    ada.screen_name = Some("Ada".into());
    store.smart_update_players(&[ada]);
    store.smart_update_players(&[]);

    assert_eq!(kicked.lock().unwrap().as_deref(), Some("Ada"));
}

// =========================================================================
// Identity
// =========================================================================

#[test]
fn test_surviving_player_keeps_its_handle() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A"), dto("B")]);
    let before = store.player("B").unwrap();

    let mut renamed = dto("B");
    renamed.screen_name = Some("Bo".into());
    store.smart_update_players(&[renamed, dto("C")]);

    let after = store.player("B").unwrap();
    assert!(before.ptr_eq(&after));
    assert_eq!(before.screen_name().as_deref(), Some("Bo"));
}

#[test]
fn test_rejoining_player_gets_a_new_handle() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A")]);
    let first = store.player("A").unwrap();

    store.smart_update_players(&[]);
    store.smart_update_players(&[dto("A")]);

    assert!(!first.ptr_eq(&store.player("A").unwrap()));
}

// =========================================================================
// Field events
// =========================================================================

#[test]
fn test_reordered_snapshot_emits_nothing() {
    let store = PlayerStore::new();
    store.smart_update_players(&[ready("A"), dto("B")]);
    let log = record_events(&store);

    store.smart_update_players(&[dto("B"), ready("A")]);

    assert!(take(&log).is_empty());
}

#[test]
fn test_field_events_keyed_by_connection_id_not_position() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A"), ready("B")]);
    let log = record_events(&store);

    // Swap positions and flip both: B unready, A ready.
    store.smart_update_players(&[dto("B"), ready("A")]);

    let mut events = take(&log);
    events.sort_by(|a, b| a.1.cmp(&b.1));
    assert_eq!(
        events,
        vec![
            (PlayerEventKind::Ready, "A".into()),
            (PlayerEventKind::Unready, "B".into()),
        ]
    );
}

#[test]
fn test_joins_and_kicks_precede_field_events() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A"), dto("B")]);
    let log = record_events(&store);

    let mut a = dto("A");
    a.active = false;
    store.smart_update_players(&[a, dto("C")]);

    assert_eq!(
        take(&log),
        vec![
            (PlayerEventKind::Joined, "C".into()),
            (PlayerEventKind::Kicked, "B".into()),
            (PlayerEventKind::Inactive, "A".into()),
        ]
    );
}

#[test]
fn test_new_player_gets_no_field_events() {
    let store = PlayerStore::new();
    let log = record_events(&store);

    let mut host = ready("A");
    host.is_host = true;
    host.has_connection = false;
    store.smart_update_players(&[host]);

    assert_eq!(take(&log), vec![(PlayerEventKind::Joined, "A".into())]);
}

#[test]
fn test_connection_and_host_events() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A")]);
    let log = record_events(&store);

    let mut a = dto("A");
    a.has_connection = false;
    a.is_host = true;
    store.smart_update_players(&[a]);
    store.smart_update_players(&[dto("A")]);

    assert_eq!(
        take(&log),
        vec![
            (PlayerEventKind::Disconnected, "A".into()),
            (PlayerEventKind::HostChanged, "A".into()),
            (PlayerEventKind::Connected, "A".into()),
            (PlayerEventKind::HostChanged, "A".into()),
        ]
    );
}

#[test]
fn test_player_listener_filters_by_id_and_kind() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A"), dto("B")]);

    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    let _sub = store.add_player_listener("B", Some(PlayerEventKind::Ready), move |_| {
        *sink.lock().unwrap() += 1;
    });

    store.smart_update_players(&[ready("A"), ready("B")]);
    store.smart_update_players(&[dto("A"), dto("B")]);

    assert_eq!(*hits.lock().unwrap(), 1);
}

#[test]
fn test_destroyed_listener_hears_nothing() {
    let store = PlayerStore::new();
    let hits = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&hits);
    let sub = store.add_join_listener(move |_| *sink.lock().unwrap() += 1);

    sub.destroy();
    sub.destroy();
    store.smart_update_players(&[dto("A")]);

    assert_eq!(*hits.lock().unwrap(), 0);
}

// =========================================================================
// Random snapshot sequences
// =========================================================================

/// After any sequence of snapshots the roster holds exactly the last
/// snapshot's ids, and summing join/kick events reproduces it.
#[test]
fn test_roster_matches_last_snapshot_for_random_sequences() {
    const POOL: [&str; 6] = ["p0", "p1", "p2", "p3", "p4", "p5"];

    for seed in 0..64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let store = PlayerStore::new();
        let log = record_events(&store);
        let mut replayed: BTreeSet<String> = BTreeSet::new();
        let mut ready_state: HashMap<String, bool> = HashMap::new();

        for _ in 0..20 {
            let mut snapshot: Vec<PlayerDto> = Vec::new();
            for id in POOL {
                if rng.random_bool(0.5) {
                    let mut entry = dto(id);
                    entry.ready = rng.random_bool(0.5);
                    snapshot.push(entry);
                }
            }
            // Shuffle positions so order can't stand in for identity.
            for i in (1..snapshot.len()).rev() {
                let j = rng.random_range(0..=i);
                snapshot.swap(i, j);
            }

            store.smart_update_players(&snapshot);

            for (kind, id) in take(&log) {
                match kind {
                    PlayerEventKind::Joined => {
                        assert!(replayed.insert(id.clone()), "{id} joined twice");
                        let dto = snapshot.iter().find(|d| d.connection_id == id).unwrap();
                        ready_state.insert(id, dto.ready);
                    }
                    PlayerEventKind::Kicked => {
                        assert!(replayed.remove(&id), "{id} kicked while absent");
                        ready_state.remove(&id);
                    }
                    PlayerEventKind::Ready => {
                        assert_eq!(ready_state.insert(id, true), Some(false));
                    }
                    PlayerEventKind::Unready => {
                        assert_eq!(ready_state.insert(id, false), Some(true));
                    }
                    other => panic!("unexpected event {other}"),
                }
            }

            let expected: BTreeSet<String> =
                snapshot.iter().map(|d| d.connection_id.clone()).collect();
            assert_eq!(ids(&store), expected, "seed {seed}");
            assert_eq!(replayed, expected, "seed {seed}");
            for dto in &snapshot {
                assert_eq!(ready_state[&dto.connection_id], dto.ready, "seed {seed}");
            }
        }
    }
}

// =========================================================================
// Waiting
// =========================================================================

#[tokio::test]
async fn test_wait_for_ready_resolves_on_snapshot() {
    let store = Arc::new(PlayerStore::new());
    store.smart_update_players(&[dto("A")]);
    let player = store.player("A").unwrap();

    let waiter = tokio::spawn(async move { player.wait_for_ready(None).await });
    tokio::task::yield_now().await;

    store.smart_update_players(&[ready("A")]);
    waiter.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_wait_for_ready_fails_on_kick() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A")]);
    let player = store.player("A").unwrap();

    let waiter = tokio::spawn(async move { player.wait_for_ready(None).await });
    tokio::task::yield_now().await;

    store.smart_update_players(&[]);
    assert!(matches!(waiter.await.unwrap(), Err(RosterError::Removed(_))));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_ready_timeout() {
    let store = PlayerStore::new();
    store.smart_update_players(&[dto("A")]);
    let player = store.player("A").unwrap();

    let result = player.wait_for_ready(Some(Duration::from_millis(500))).await;
    assert!(matches!(
        result,
        Err(RosterError::Timeout { ref connection_id, .. }) if connection_id == "A"
    ));
}
