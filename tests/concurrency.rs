//! Concurrency tests for the unlock engine and the rate guard.
//!
//! Many threads race on the same store. The commit lock must serialize the
//! load/apply/save cycle so no debit is duplicated and no update is lost.

use std::sync::{Arc, Barrier};
use std::thread;

use coachvault::guard::GuardConfig;
use coachvault::storage::InMemorySnapshotStore;
use coachvault::{
    EconomyConfig, GuardPolicy, Item, ItemId, PreconditionFailure, RateGuard, RateLimit,
    RequestContext, Snapshot, SnapshotStore, UnlockEngine, UnlockError, UnlockRequest,
    UnlockService, User, UserId,
};

const THREADS: usize = 16;

#[test]
fn test_concurrent_unlocks_of_one_item_commit_once() {
    let store = Arc::new(InMemorySnapshotStore::new(
        Snapshot::new(EconomyConfig::default())
            .with_user(User::new("u1", "Ana", 100))
            .with_item(Item::new("c1", "Coach One", 7)),
    ));
    let engine = UnlockEngine::new(store.clone());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.unlock(&UserId::new("u1"), &ItemId::new("c1"))
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert_eq!(err.precondition(), Some(PreconditionFailure::AlreadyUnlocked));
    }

    let snap = store.load().unwrap();
    assert_eq!(snap.users[0].tokens, 93);
    assert_eq!(snap.users[0].xp, 10);
    assert_eq!(snap.users[0].unlocked_items.len(), 1);
    assert_eq!(snap.history.len(), 1);
    assert_eq!(store.save_count(), 1);
}

#[test]
fn test_concurrent_unlocks_across_users_lose_no_updates() {
    let mut snapshot = Snapshot::new(EconomyConfig::default()).with_item(Item::new("c1", "Coach One", 2));
    for i in 0..THREADS {
        snapshot = snapshot.with_user(User::new(format!("u{i}"), format!("User {i}"), 10));
    }
    let store = Arc::new(InMemorySnapshotStore::new(snapshot));
    let engine = UnlockEngine::new(store.clone());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.unlock(&UserId::new(format!("u{i}")), &ItemId::new("c1"))
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap().unwrap();
    }

    let snap = store.load().unwrap();
    assert_eq!(snap.history.len(), THREADS);
    for user in &snap.users {
        assert_eq!(user.tokens, 8, "user {}", user.id);
        assert_eq!(user.unlocked_items, vec![ItemId::new("c1")]);
    }
    assert!(snap.integrity_violations().is_empty());
}

#[test]
fn test_concurrent_spend_never_overdraws() {
    // Ten tokens, five items at three tokens: at most three unlocks fit.
    let mut snapshot = Snapshot::new(EconomyConfig::default()).with_user(User::new("u1", "Ana", 10));
    for i in 0..5 {
        snapshot = snapshot.with_item(Item::new(format!("c{i}"), format!("Coach {i}"), 3));
    }
    let store = Arc::new(InMemorySnapshotStore::new(snapshot));
    let engine = UnlockEngine::new(store.clone());
    let barrier = Arc::new(Barrier::new(5));

    let handles: Vec<_> = (0..5)
        .map(|i| {
            let engine = engine.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                engine.unlock(&UserId::new("u1"), &ItemId::new(format!("c{i}")))
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 3);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| matches!(
        e.precondition(),
        Some(PreconditionFailure::InsufficientFunds { required: 3, available: 1 })
    )));
    assert_eq!(store.load().unwrap().users[0].tokens, 1);
}

#[test]
fn test_guard_admits_one_of_many_concurrent_requests() {
    let store = Arc::new(InMemorySnapshotStore::new(
        Snapshot::new(EconomyConfig::default())
            .with_user(User::new("u1", "Ana", 100))
            .with_item(Item::new("c1", "Coach One", 1)),
    ));
    let service = UnlockService::new(
        UnlockEngine::new(store.clone()),
        Arc::new(RateGuard::new(GuardConfig::default())),
        GuardPolicy::unlock().with_limit(RateLimit::new(60_000, 1)),
    );
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let service = service.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                service.unlock(
                    &RequestContext::new("unlock"),
                    &ItemId::new("c1"),
                    &UnlockRequest {
                        user_id: UserId::new("u1"),
                    },
                )
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(UnlockError::RateLimited { .. })))
            .count(),
        THREADS - 1
    );
    assert_eq!(store.save_count(), 1);
}
