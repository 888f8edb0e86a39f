//! Races between identity changes, in-flight fetches, and detach.
//!
//! The harness source holds every fetch open until the test settles it,
//! so superseded and late settlements can be delivered in any order the
//! scenario calls for.

mod common;

use common::{harness, item_ids, next_request, page};
use pagefeed::{FetchError, LoadPhase, LoadState, Loader, LoaderError, PageToken, Query};
use std::time::Duration;

#[tokio::test]
async fn late_reply_for_a_superseded_identity_is_discarded() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let stale = next_request(&mut requests).await;

    loader.observe(Query::new("susan", "voice")).await.unwrap();
    let live = next_request(&mut requests).await;
    assert!(stale.token.is_cancelled());
    assert!(live.token.is_live());

    // The old identity's page arrives after the switch. It must go nowhere.
    stale.respond(Ok(page(90..93, Some(1))));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = loader.state();
    assert_eq!(state.phase, LoadPhase::InitialLoading);
    assert_eq!(state.items, None);

    // The new identity's own fetch proceeds normally.
    live.respond(Ok(page(0..3, None)));
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::Ready)
        .await
        .unwrap();
    assert_eq!(item_ids(&state), ["0", "1", "2"]);
}

#[tokio::test]
async fn stale_failures_are_not_surfaced_either() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let stale = next_request(&mut requests).await;
    loader.observe(Query::new("susan", "voice")).await.unwrap();
    let live = next_request(&mut requests).await;

    stale.respond(Err(FetchError::Unavailable("old backend".into())));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(loader.state().phase, LoadPhase::InitialLoading);

    live.respond(Ok(page(0..3, None)));
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::Ready)
        .await
        .unwrap();
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn discarded_settlements_do_not_wake_subscribers() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let stale = next_request(&mut requests).await;
    loader.observe(Query::new("susan", "voice")).await.unwrap();
    let live = next_request(&mut requests).await;

    let mut states = loader.subscribe();
    states.borrow_and_update();

    // The discarded settlement changes nothing, so nothing is published.
    stale.respond(Ok(page(90..93, Some(1))));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!states.has_changed().unwrap());

    // A real transition still comes through.
    live.respond(Ok(page(0..3, None)));
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::Ready)
        .await
        .unwrap();
    assert_eq!(item_ids(&state), ["0", "1", "2"]);
    assert!(states.has_changed().unwrap());
}

#[tokio::test]
async fn two_identity_changes_while_the_first_fetch_is_pending() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let first = next_request(&mut requests).await;
    loader.observe(Query::new("susan", "browser")).await.unwrap();
    let second = next_request(&mut requests).await;
    loader.observe(Query::new("bill", "voice")).await.unwrap();
    let third = next_request(&mut requests).await;

    // Settle out of order: both superseded replies land before the live one.
    second.respond(Ok(page(50..53, Some(1))));
    first.respond(Ok(page(90..93, Some(1))));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(loader.state().items, None);

    assert_eq!(third.identity, Query::new("bill", "voice"));
    third.respond(Ok(page(0..3, Some(1))));
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::Ready)
        .await
        .unwrap();
    assert_eq!(item_ids(&state), ["0", "1", "2"]);
}

#[tokio::test]
async fn load_more_racing_an_identity_change_defers_to_the_change() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    next_request(&mut requests).await.respond(Ok(page(0..3, Some(1))));
    loader.wait_for(|s| s.phase == LoadPhase::Ready).await.unwrap();

    loader.request_more().await.unwrap();
    let more = next_request(&mut requests).await;

    loader.observe(Query::new("susan", "voice")).await.unwrap();
    let fresh = next_request(&mut requests).await;
    assert!(more.token.is_cancelled());

    // The load-more reply for the old identity must not contaminate the
    // new identity's empty state.
    more.respond(Ok(page(3..6, None)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    let state = loader.state();
    assert_eq!(state.phase, LoadPhase::InitialLoading);
    assert_eq!(state.items, None);

    fresh.respond(Ok(page(10..13, None)));
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::Ready)
        .await
        .unwrap();
    assert_eq!(item_ids(&state), ["10", "11", "12"]);
}

#[tokio::test]
async fn re_observing_an_equal_identity_does_not_refetch() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let request = next_request(&mut requests).await;

    // Same identity, rebuilt value: must not cancel or restart anything.
    loader.observe(Query::new("bill", "browser")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(request.token.is_live());
    assert!(requests.try_recv().is_err());

    request.respond(Ok(page(0..3, None)));
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::Ready)
        .await
        .unwrap();
    assert_eq!(item_ids(&state), ["0", "1", "2"]);
}

#[tokio::test]
async fn detach_cancels_the_live_fetch_and_freezes_state() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let pending = next_request(&mut requests).await;

    loader.detach().await;
    // The loader task exits, which closes the state watch.
    let err = loader.wait_for(|_| false).await.unwrap_err();
    assert!(matches!(err, LoaderError::Detached));
    assert!(pending.token.is_cancelled());

    // A settlement arriving after detach reaches nothing.
    pending.respond(Ok(page(0..3, Some(1))));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(loader.state(), LoadState::new());

    // Commands are refused once detached.
    let err = loader.observe(Query::new("susan", "voice")).await.unwrap_err();
    assert!(matches!(err, LoaderError::Detached));
    let err = loader.request_more().await.unwrap_err();
    assert!(matches!(err, LoaderError::Detached));
}

#[tokio::test]
async fn dropping_the_last_handle_cancels_the_live_fetch() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    let pending = next_request(&mut requests).await;
    let mut states = loader.subscribe();
    drop(loader);

    // The watch closing proves the loader task has shut down.
    while states.changed().await.is_ok() {}
    assert!(pending.token.is_cancelled());
}

#[tokio::test]
async fn identity_change_clears_items_immediately() {
    let (source, mut requests) = harness();
    let loader = Loader::spawn(source);

    loader.observe(Query::new("bill", "browser")).await.unwrap();
    next_request(&mut requests).await.respond(Ok(page(0..3, Some(1))));
    loader.wait_for(|s| s.phase == LoadPhase::Ready).await.unwrap();

    // The moment the identity changes, the old items are gone; nothing of
    // the previous dataset stays visible during the transition.
    loader.observe(Query::new("susan", "voice")).await.unwrap();
    let state = loader
        .wait_for(|s| s.phase == LoadPhase::InitialLoading)
        .await
        .unwrap();
    assert_eq!(state.items, None);
    assert_eq!(state.continuation, None);

    let request = next_request(&mut requests).await;
    assert_eq!(request.page, PageToken::FIRST);
}
