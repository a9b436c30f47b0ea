use std::sync::Arc;

use anyhow::Result;
use tokio::time::Instant;

use rps_duel::config::MatchConfig;
use rps_duel::engine::{Move, Outcome};
use rps_duel::game::{MatchCoordinator, MatchError, MatchSnapshot, Notice, Phase, RevealStep, Shown};
use rps_duel::room::RoomError;
use rps_duel::store::InMemoryDocumentStore;

fn pair(
    store: &InMemoryDocumentStore,
    config: MatchConfig,
) -> (MatchCoordinator, MatchCoordinator) {
    (
        MatchCoordinator::spawn(config.clone(), Arc::new(store.clone())),
        MatchCoordinator::spawn(config, Arc::new(store.clone())),
    )
}

async fn seated(
    store: &InMemoryDocumentStore,
    config: MatchConfig,
) -> Result<(MatchCoordinator, MatchCoordinator)> {
    let (a, b) = pair(store, config);
    a.create_room("Ann", "ab12").await?;
    a.wait_for(|s| s.phase == Phase::Waiting).await?;
    let entry = b.join_room("Bo", "AB12").await?;
    assert_eq!(entry.opponent_name.as_deref(), Some("Ann"));
    a.wait_for(|s| s.phase == Phase::Selecting).await?;
    b.wait_for(|s| s.phase == Phase::Selecting).await?;
    Ok((a, b))
}

async fn round_over(c: &MatchCoordinator, round: u32) -> Result<MatchSnapshot, MatchError> {
    c.wait_for(|s| s.round == round && matches!(s.phase, Phase::RoundOver | Phase::GameOver))
        .await
}

#[tokio::test(start_paused = true)]
async fn rock_against_paper_reveals_in_order() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = seated(&store, MatchConfig::default()).await?;

    a.select_move(Move::Rock).await?;
    a.confirm().await?;
    b.select_move(Move::Paper).await?;
    b.set_message("wrapped").await?;
    b.confirm().await?;

    a.wait_for(|s| s.phase == Phase::Revealing).await?;
    let started = Instant::now();
    let mut rx = a.subscribe();
    let mut steps = Vec::new();
    loop {
        rx.changed().await?;
        let s = rx.borrow_and_update().clone();
        if let Some(step) = s.reveal.step {
            if steps.last().map(|(last, _)| *last) != Some(step) {
                steps.push((step, started.elapsed().as_secs()));
            }
        }
        if s.phase != Phase::Revealing {
            break;
        }
    }
    assert_eq!(
        steps,
        vec![
            (RevealStep::OwnMove, 4),
            (RevealStep::OpponentMove, 5),
            (RevealStep::Verdict, 6),
            (RevealStep::Messages, 7),
            (RevealStep::Health, 8),
        ]
    );

    let seen_by_a = round_over(&a, 1).await?;
    assert_eq!(seen_by_a.phase, Phase::RoundOver);
    assert_eq!(seen_by_a.reveal.verdict, Some(Outcome::Lose));
    assert_eq!(seen_by_a.reveal.verdict.map(Outcome::verdict), Some("Lose"));
    assert_eq!(seen_by_a.reveal.own_move, Some(Shown::Played(Move::Rock)));
    assert_eq!((seen_by_a.own_health, seen_by_a.opponent_health), (Some(4), Some(5)));
    let messages = seen_by_a.reveal.messages.expect("messages disclosed");
    assert_eq!(messages.opponent.as_deref(), Some("wrapped"));

    let seen_by_b = round_over(&b, 1).await?;
    assert_eq!(seen_by_b.reveal.verdict, Some(Outcome::Win));
    assert_eq!((seen_by_b.own_health, seen_by_b.opponent_health), (Some(5), Some(4)));

    let doc = &store.dump()["rooms"]["AB12"];
    assert_eq!(doc["resolvedRound"], 1);
    assert_eq!(doc["players"]["a"]["health"], 4);
    assert_eq!(doc["players"]["b"]["health"], 5);

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn deadline_forfeits_the_silent_player() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = seated(&store, MatchConfig::default()).await?;
    let started = Instant::now();

    a.select_move(Move::Paper).await?;

    let seen_by_a = round_over(&a, 1).await?;
    assert!(started.elapsed().as_secs() >= 30);
    assert_eq!(seen_by_a.reveal.verdict, Some(Outcome::Win));
    assert_eq!(seen_by_a.reveal.opponent_move, Some(Shown::NoSelection));
    assert_eq!((seen_by_a.own_health, seen_by_a.opponent_health), (Some(5), Some(4)));

    let seen_by_b = round_over(&b, 1).await?;
    assert_eq!(seen_by_b.reveal.verdict, Some(Outcome::Lose));
    assert_eq!(seen_by_b.reveal.opponent_move, Some(Shown::Played(Move::Paper)));

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn next_round_waits_for_both_players() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = seated(&store, MatchConfig::default()).await?;

    for (c, choice) in [(&a, Move::Rock), (&b, Move::Rock)] {
        c.select_move(choice).await?;
        c.confirm().await?;
    }
    round_over(&a, 1).await?;
    round_over(&b, 1).await?;

    a.request_next_round().await?;
    b.wait_for(|s| s.opponent_next_round_ready).await?;
    tokio::time::sleep(std::time::Duration::from_secs(120)).await;
    assert_eq!(a.snapshot().phase, Phase::RoundOver);
    assert_eq!(b.snapshot().phase, Phase::RoundOver);
    assert!(a.snapshot().own_next_round_ready);

    b.request_next_round().await?;
    let next_a = a.wait_for(|s| s.phase == Phase::Selecting).await?;
    let next_b = b.wait_for(|s| s.phase == Phase::Selecting).await?;
    assert_eq!((next_a.round, next_b.round), (2, 2));
    assert_eq!((next_a.own_health, next_a.opponent_health), (Some(4), Some(4)));
    assert!(!next_a.own_ready && !next_a.opponent_ready);
    assert!(!next_a.own_next_round_ready && !next_a.opponent_next_round_ready);

    let doc = &store.dump()["rooms"]["AB12"];
    assert_eq!(doc["round"], 2);
    assert!(doc.get("moves").map_or(true, |m| m["a"].is_null() && m["b"].is_null()));

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn game_over_is_terminal() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let config = MatchConfig::default().with_auto_next_round(true);
    let (a, b) = seated(&store, config).await?;

    for round in 1..=5 {
        a.wait_for(|s| s.phase == Phase::Selecting && s.round == round).await?;
        b.wait_for(|s| s.phase == Phase::Selecting && s.round == round).await?;
        a.select_move(Move::Scissors).await?;
        a.confirm().await?;
        b.select_move(Move::Paper).await?;
        b.confirm().await?;
        round_over(&a, round).await?;
    }

    let final_a = a.wait_for(|s| s.phase == Phase::GameOver).await?;
    let final_b = b.wait_for(|s| s.phase == Phase::GameOver).await?;
    assert_eq!(final_a.final_outcome, Some(Outcome::Win));
    assert_eq!(final_b.final_outcome, Some(Outcome::Lose));
    assert_eq!(final_b.own_health, Some(0));

    b.request_next_round().await?;
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    assert_eq!(b.snapshot().phase, Phase::GameOver);
    assert_eq!(store.dump()["rooms"]["AB12"]["status"], "gameOver");

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn leaving_sends_the_opponent_back_to_login() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = seated(&store, MatchConfig::default()).await?;

    a.leave_and_reset().await?;
    let left = b.wait_for(|s| s.phase == Phase::Login).await?;
    assert_eq!(left.notice, Some(Notice::OpponentLeft));
    assert_eq!(a.wait_for(|s| s.phase == Phase::Login).await?.notice, None);
    assert!(store.dump().get("rooms").is_none());

    // A fresh room can reuse the code, and stale timers stay silent.
    a.create_room("Ann", "AB12").await?;
    tokio::time::sleep(std::time::Duration::from_secs(45)).await;
    assert_eq!(a.snapshot().phase, Phase::Waiting);

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn leaving_then_recreating_the_same_room_succeeds() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = pair(&store, MatchConfig::default());

    let first = a.create_room("Ann", "AB12").await?;
    a.wait_for(|s| s.phase == Phase::Waiting).await?;

    a.leave_and_reset().await?;
    let second = a.create_room("Ann", "AB12").await?;
    assert_eq!(second.code, first.code);

    let waiting = a
        .wait_for(|s| s.phase == Phase::Waiting && s.room_code.as_deref() == Some("AB12"))
        .await?;
    assert_eq!(waiting.notice, None);
    let room = &store.dump()["rooms"]["AB12"];
    assert_eq!(room["status"], "waiting");
    assert!(room["players"]["b"].is_null());

    // The room is really there: an opponent can take the second seat.
    let entry = b.join_room("Bo", "AB12").await?;
    assert_eq!(entry.opponent_name.as_deref(), Some("Ann"));
    a.wait_for(|s| s.phase == Phase::Selecting).await?;

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn room_errors_reach_the_caller() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = pair(&store, MatchConfig::default());

    assert!(matches!(
        a.create_room("", "AB12").await,
        Err(MatchError::Room(RoomError::InvalidName))
    ));
    assert!(matches!(
        a.create_room("Ann", "ABCDE").await,
        Err(MatchError::Room(RoomError::InvalidCode))
    ));
    assert!(matches!(
        b.join_room("Bo", "ZZZZ").await,
        Err(MatchError::Room(RoomError::NotFound(_)))
    ));

    a.create_room("Ann", "AB12").await?;
    assert!(matches!(
        a.create_room("Ann", "CD34").await,
        Err(MatchError::Room(RoomError::AlreadyInSession))
    ));
    assert!(matches!(
        b.create_room("Bo", "AB12").await,
        Err(MatchError::Room(RoomError::RoomActive(_)))
    ));
    assert_eq!(b.snapshot().phase, Phase::Login);

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_confirm_is_retried_before_committing() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = seated(&store, MatchConfig::default()).await?;

    // Two failures stay within the retry budget.
    store.fail_next_writes(2);
    a.select_move(Move::Rock).await?;
    a.confirm().await?;
    b.wait_for(|s| s.opponent_ready).await?;
    assert!(a.wait_for(|s| s.own_ready).await?.notice.is_none());

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_leave_the_choice_open() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let (a, b) = seated(&store, MatchConfig::default()).await?;

    store.fail_next_writes(3);
    a.select_move(Move::Rock).await?;
    a.confirm().await?;
    let failed = a
        .wait_for(|s| matches!(s.notice, Some(Notice::StoreWriteFailed { .. })))
        .await?;
    assert_eq!(failed.phase, Phase::Selecting);
    assert!(!failed.own_ready);

    a.select_move(Move::Paper).await?;
    a.confirm().await?;
    let snapshot = a.wait_for(|s| s.own_ready).await?;
    assert_eq!(snapshot.pending_selection, Some(Move::Paper));

    a.shutdown().await?;
    b.shutdown().await?;
    Ok(())
}
