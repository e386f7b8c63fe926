//! Conformance suite for [`TokenStore`] implementations.
//!
//! Every backend runs the same async checks so that swapping backends never
//! changes token semantics. Enable the `testutil` feature and call each
//! function with a fresh store and the clock that store was built with:
//!
//! ```ignore
//! use tokenauth_storage::{ManualClock, conformance};
//!
//! #[tokio::test]
//! async fn token_save_supersedes_previous() {
//!     let clock = Arc::new(ManualClock::starting_now());
//!     let store = MemoryTokenStore::with_clock(clock.clone());
//!     conformance::token_save_supersedes_previous(&store, clock.as_ref()).await;
//! }
//! ```
//!
//! | Category | Contract aspect |
//! |----------|-----------------|
//! | Audience | CRUD keyed by id, missing is `None` |
//! | Token | save/get/delete, input validation |
//! | Supersession | one live token per principal, flush keeps itself |
//! | Concurrent | independent principals under parallel saves |
//!
//! Checks never depend on time passing inside the backend, so stores with
//! native expiry run the suite unchanged.

use std::sync::Arc;

use crate::clock::Clock;
use crate::traits::{DynTokenStore, TokenStore};
use crate::types::{Audience, Principal, Token};

const HOUR: i64 = 3600;

fn live_token(value: &str, principal: Principal, clock: &dyn Clock) -> Token {
    Token::new(value, principal, clock.now_unix() + HOUR)
}

// ============================================================================
// Audience
// ============================================================================

/// `get_audience` on an unknown id returns `Ok(None)`.
pub async fn audience_get_missing_returns_none<S: TokenStore + ?Sized>(store: &S) {
    let result = store
        .get_audience("aud-missing")
        .await
        .expect("get_audience should not fail for a missing id");
    assert!(result.is_none(), "missing audience must be None");
}

/// `save_audience` then `get_audience` returns an equal audience.
pub async fn audience_save_then_get<S: TokenStore + ?Sized>(store: &S) {
    let audience = Audience::new("aud-1", "billing", "sk_secret", 3600);
    store.save_audience(&audience).await.expect("save_audience");

    let loaded = store.get_audience("aud-1").await.expect("get_audience");
    assert_eq!(loaded, Some(audience));
}

/// Saving an audience twice overwrites the first record.
pub async fn audience_save_overwrites<S: TokenStore + ?Sized>(store: &S) {
    store
        .save_audience(&Audience::new("aud-2", "old", "sk_a", 60))
        .await
        .expect("save original");
    let updated = Audience::new("aud-2", "new", "sk_b", 0);
    store.save_audience(&updated).await.expect("save update");

    let loaded = store.get_audience("aud-2").await.expect("get_audience");
    assert_eq!(loaded, Some(updated));
}

/// Deleting an audience removes it and a second delete is a no-op.
pub async fn audience_delete_is_idempotent<S: TokenStore + ?Sized>(store: &S) {
    store
        .save_audience(&Audience::new("aud-3", "tmp", "sk_c", 60))
        .await
        .expect("save_audience");
    store.delete_audience("aud-3").await.expect("first delete");
    store
        .delete_audience("aud-3")
        .await
        .expect("second delete must succeed");
    assert!(store.get_audience("aud-3").await.expect("get").is_none());
}

/// Saving, reading or deleting an audience with an empty id is rejected.
pub async fn audience_empty_id_rejected<S: TokenStore + ?Sized>(store: &S) {
    let err = store
        .save_audience(&Audience::new("", "nameless", "sk_d", 60))
        .await
        .expect_err("empty audience id must be rejected");
    assert!(err.is_invalid_input(), "unexpected error: {err}");

    let err = store
        .get_audience("")
        .await
        .expect_err("get with empty id must be rejected");
    assert!(err.is_invalid_input(), "unexpected error: {err}");

    let err = store
        .delete_audience("")
        .await
        .expect_err("delete with empty id must be rejected");
    assert!(err.is_invalid_input(), "unexpected error: {err}");
}

// ============================================================================
// Token
// ============================================================================

/// `get_token` on an unknown value returns `Ok(None)`.
pub async fn token_get_missing_returns_none<S: TokenStore + ?Sized>(store: &S) {
    let result = store
        .get_token("tok-never-issued")
        .await
        .expect("get_token should not fail for a missing value");
    assert!(result.is_none());
}

/// `save_token` then `get_token` returns an equal token.
pub async fn token_save_then_get<S: TokenStore + ?Sized>(store: &S, clock: &dyn Clock) {
    let token = live_token("tok-a", Principal::client("client-a"), clock);
    store.save_token(&token).await.expect("save_token");

    let loaded = store.get_token("tok-a").await.expect("get_token");
    assert_eq!(loaded, Some(token));
}

/// A token with deadline `0` is stored without expiry.
pub async fn token_without_deadline_roundtrips<S: TokenStore + ?Sized>(store: &S) {
    let token = Token::new("tok-forever", Principal::single("user-forever"), 0);
    store.save_token(&token).await.expect("save_token");

    let loaded = store
        .get_token("tok-forever")
        .await
        .expect("get_token")
        .expect("token present");
    assert!(loaded.never_expires());
}

/// Empty values, missing principals and past deadlines are rejected.
pub async fn token_save_rejects_invalid<S: TokenStore + ?Sized>(store: &S, clock: &dyn Clock) {
    let now = clock.now_unix();

    let empty = Token::new("", Principal::client("client-b"), now + HOUR);
    let err = store.save_token(&empty).await.expect_err("empty value");
    assert!(err.is_invalid_input(), "unexpected error: {err}");

    let orphan = Token::new("tok-orphan", Principal::new("", ""), now + HOUR);
    let err = store.save_token(&orphan).await.expect_err("no principal");
    assert!(err.is_invalid_input(), "unexpected error: {err}");

    let stale = Token::new("tok-stale", Principal::client("client-b"), now - 10);
    let err = store.save_token(&stale).await.expect_err("expired token");
    assert!(err.is_invalid_input(), "unexpected error: {err}");

    assert!(store.get_token("tok-stale").await.expect("get").is_none());
}

/// `delete_token` removes the token, and deleting again is a no-op.
pub async fn token_delete_is_idempotent<S: TokenStore + ?Sized>(store: &S, clock: &dyn Clock) {
    let token = live_token("tok-del", Principal::client("client-del"), clock);
    store.save_token(&token).await.expect("save_token");

    store.delete_token("tok-del").await.expect("first delete");
    store.delete_token("tok-del").await.expect("second delete");
    store
        .delete_token("tok-never-existed")
        .await
        .expect("delete of a missing value");
    assert!(store.get_token("tok-del").await.expect("get").is_none());
}

/// `delete_token` with an empty value is rejected.
pub async fn token_delete_empty_rejected<S: TokenStore + ?Sized>(store: &S) {
    let err = store
        .delete_token("")
        .await
        .expect_err("empty value must be rejected");
    assert!(err.is_invalid_input(), "unexpected error: {err}");
}

/// After deleting a token, a new token for the same principal can be saved.
pub async fn token_delete_clears_principal_index<S: TokenStore + ?Sized>(
    store: &S,
    clock: &dyn Clock,
) {
    let principal = Principal::single("user-reissue");
    store
        .save_token(&live_token("tok-r1", principal.clone(), clock))
        .await
        .expect("save first");
    store.delete_token("tok-r1").await.expect("delete");
    store
        .save_token(&live_token("tok-r2", principal, clock))
        .await
        .expect("save second");

    assert!(store.get_token("tok-r1").await.expect("get").is_none());
    assert!(store.get_token("tok-r2").await.expect("get").is_some());
}

// ============================================================================
// Supersession
// ============================================================================

/// Saving a second token for a principal deletes the first one.
pub async fn token_save_supersedes_previous<S: TokenStore + ?Sized>(
    store: &S,
    clock: &dyn Clock,
) {
    let principal = Principal::single("user-1");
    store
        .save_token(&live_token("tok-old", principal.clone(), clock))
        .await
        .expect("save old");
    store
        .save_token(&live_token("tok-new", principal, clock))
        .await
        .expect("save new");

    assert!(
        store.get_token("tok-old").await.expect("get old").is_none(),
        "superseded token must be gone"
    );
    assert!(store.get_token("tok-new").await.expect("get new").is_some());
}

/// Supersession only touches tokens of the same principal.
pub async fn token_save_keeps_other_principals<S: TokenStore + ?Sized>(
    store: &S,
    clock: &dyn Clock,
) {
    store
        .save_token(&live_token("tok-c1", Principal::client("c1"), clock))
        .await
        .expect("save c1");
    store
        .save_token(&live_token("tok-u1", Principal::single("c1"), clock))
        .await
        .expect("save single with same id");
    store
        .save_token(&live_token("tok-c2", Principal::client("c2"), clock))
        .await
        .expect("save c2");

    for value in ["tok-c1", "tok-u1", "tok-c2"] {
        assert!(
            store.get_token(value).await.expect("get").is_some(),
            "{value} must survive saves for other principals"
        );
    }
}

/// Flushing a token keeps it live, updates its deadline and drops every
/// other token of the principal.
pub async fn token_flush_keeps_itself<S: TokenStore + ?Sized>(store: &S, clock: &dyn Clock) {
    let principal = Principal::client("client-flush");
    store
        .save_token(&live_token("tok-f1", principal.clone(), clock))
        .await
        .expect("save f1");

    let mut current = live_token("tok-f1", principal.clone(), clock);
    current.deadline += HOUR;
    store.flush_token(&current).await.expect("flush f1");

    let loaded = store
        .get_token("tok-f1")
        .await
        .expect("get f1")
        .expect("flushed token must stay live");
    assert_eq!(loaded.deadline, current.deadline);

    store
        .flush_token(&live_token("tok-f2", principal, clock))
        .await
        .expect("flush f2");
    assert!(store.get_token("tok-f1").await.expect("get f1").is_none());
    assert!(store.get_token("tok-f2").await.expect("get f2").is_some());
}

/// `flush_token` applies the same validation as `save_token`.
pub async fn token_flush_rejects_invalid<S: TokenStore + ?Sized>(store: &S, clock: &dyn Clock) {
    let now = clock.now_unix();

    let empty = Token::new("", Principal::client("client-flush-empty"), now + HOUR);
    let err = store.flush_token(&empty).await.expect_err("empty value");
    assert!(err.is_invalid_input(), "unexpected error: {err}");

    let orphan = Token::new("tok-flush-orphan", Principal::new("", ""), now + HOUR);
    let err = store.flush_token(&orphan).await.expect_err("no principal");
    assert!(err.is_invalid_input(), "unexpected error: {err}");
    assert!(store.get_token("tok-flush-orphan").await.expect("get").is_none());

    let stale = Token::new(
        "tok-flush-stale",
        Principal::client("client-flush-stale"),
        now - 1,
    );
    let err = store.flush_token(&stale).await.expect_err("expired token");
    assert!(err.is_invalid_input(), "unexpected error: {err}");
}

/// `refresh_token` moves the deadline of a stored token and reports a
/// superseded or unknown token as `None`.
pub async fn token_refresh_updates_deadline<S: TokenStore + ?Sized>(
    store: &S,
    clock: &dyn Clock,
) {
    let principal = Principal::single("user-refresh");
    store
        .save_token(&live_token("tok-r1", principal.clone(), clock))
        .await
        .expect("save r1");

    let deadline = clock.now_unix() + 2 * HOUR;
    let refreshed = store
        .refresh_token("tok-r1", deadline)
        .await
        .expect("refresh r1")
        .expect("stored token must be refreshed");
    assert_eq!(refreshed.deadline, deadline);
    assert_eq!(refreshed.principal(), principal);
    let loaded = store.get_token("tok-r1").await.expect("get r1").expect("r1");
    assert_eq!(loaded.deadline, deadline);

    store
        .save_token(&live_token("tok-r2", principal, clock))
        .await
        .expect("save r2");
    let gone = store.refresh_token("tok-r1", deadline).await.expect("refresh r1");
    assert!(gone.is_none(), "superseded token must not be refreshed");
    assert!(store.get_token("tok-r1").await.expect("get r1").is_none());
    assert!(store.get_token("tok-r2").await.expect("get r2").is_some());

    let unknown = store
        .refresh_token("tok-never-issued", deadline)
        .await
        .expect("refresh unknown");
    assert!(unknown.is_none());

    let err = store
        .refresh_token("tok-r2", clock.now_unix() - 1)
        .await
        .expect_err("past deadline");
    assert!(err.is_invalid_input(), "unexpected error: {err}");
}

// ============================================================================
// Concurrent
// ============================================================================

/// Parallel saves for distinct principals all succeed and stay visible.
pub async fn concurrent_saves_for_distinct_principals(store: DynTokenStore, clock: Arc<dyn Clock>) {
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = Arc::clone(&store);
        let clock = Arc::clone(&clock);
        handles.push(tokio::spawn(async move {
            let token = live_token(
                &format!("tok-par-{i}"),
                Principal::client(format!("client-par-{i}")),
                clock.as_ref(),
            );
            store.save_token(&token).await.expect("parallel save");
        }));
    }
    for handle in handles {
        handle.await.expect("task panicked");
    }

    for i in 0..16 {
        let value = format!("tok-par-{i}");
        assert!(
            store.get_token(&value).await.expect("get").is_some(),
            "{value} missing after parallel saves"
        );
    }
}

/// Runs every check against one store.
///
/// Each check uses its own ids, so they can share the store.
pub async fn run_all(store: DynTokenStore, clock: Arc<dyn Clock>) {
    let s = store.as_ref();
    let c = clock.as_ref();

    audience_get_missing_returns_none(s).await;
    audience_save_then_get(s).await;
    audience_save_overwrites(s).await;
    audience_delete_is_idempotent(s).await;
    audience_empty_id_rejected(s).await;

    token_get_missing_returns_none(s).await;
    token_save_then_get(s, c).await;
    token_without_deadline_roundtrips(s).await;
    token_save_rejects_invalid(s, c).await;
    token_delete_is_idempotent(s, c).await;
    token_delete_empty_rejected(s).await;
    token_delete_clears_principal_index(s, c).await;

    token_save_supersedes_previous(s, c).await;
    token_save_keeps_other_principals(s, c).await;
    token_flush_keeps_itself(s, c).await;
    token_flush_rejects_invalid(s, c).await;
    token_refresh_updates_deadline(s, c).await;

    concurrent_saves_for_distinct_principals(Arc::clone(&store), Arc::clone(&clock)).await;
}
