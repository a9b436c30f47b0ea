use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

use super::service::{plan_create, plan_join};
use super::*;
use crate::config::RetryPolicy;
use crate::game::expiry::ExpiryMonitor;
use crate::session::{Apply, Role, SessionDocument, SessionRepository, SessionStatus};
use crate::store::{InMemoryDocumentStore, StoreError};

fn lobby(store: &InMemoryDocumentStore) -> RoomLobby {
    let repo = SessionRepository::new(Arc::new(store.clone()), RetryPolicy::none());
    RoomLobby::new(
        repo,
        ExpiryMonitor::new(Duration::from_secs(300)),
        Uuid::new_v4(),
    )
}

fn committed(plan: Apply<Result<SessionDocument, RoomError>>) -> SessionDocument {
    match plan {
        Apply::Commit(doc, Ok(_)) => doc,
        other => panic!("expected a commit, got {other:?}"),
    }
}

#[test]
fn codes_must_be_four_characters() {
    assert!(validate_code("AB12"));
    assert!(!validate_code("AB1"));
    assert!(!validate_code("AB123"));
    assert!(!validate_code(""));
    assert!(validate_code("ÄÖÜ1"));
    assert_eq!(RoomCode::parse("ab12").unwrap().as_str(), "AB12");
    assert!(matches!(RoomCode::parse("abc"), Err(RoomError::InvalidCode)));
}

#[test]
fn names_are_trimmed_and_required() {
    assert_eq!(validate_name("  Ann ").unwrap(), "Ann");
    assert!(matches!(validate_name("   "), Err(RoomError::InvalidName)));
    assert!(RoomError::InvalidName.is_input_error());
}

#[test]
fn create_refuses_an_active_room_but_replaces_stale_or_finished_ones() {
    let code = RoomCode::parse("AB12").unwrap();
    let expiry = ExpiryMonitor::new(Duration::from_secs(300));
    let now = Utc::now();
    let active = committed(plan_create(None, &code, "Ann", Uuid::new_v4(), &expiry, now));

    let again = plan_create(Some(active.clone()), &code, "Cy", Uuid::new_v4(), &expiry, now);
    assert!(matches!(again, Apply::Skip(Err(RoomError::RoomActive(_)))));

    let later = now + chrono::Duration::minutes(6);
    let replaced = committed(plan_create(
        Some(active.clone()),
        &code,
        "Cy",
        Uuid::new_v4(),
        &expiry,
        later,
    ));
    assert_eq!(replaced.player(Role::A).unwrap().display_name, "Cy");

    let mut finished = active;
    finished.status = SessionStatus::GameOver;
    let replaced = committed(plan_create(
        Some(finished),
        &code,
        "Cy",
        Uuid::new_v4(),
        &expiry,
        now,
    ));
    assert_eq!(replaced.status, SessionStatus::Waiting);
    assert_eq!(replaced.round, 1);
}

#[test]
fn join_only_succeeds_on_waiting_rooms() {
    let code = RoomCode::parse("AB12").unwrap();
    let expiry = ExpiryMonitor::new(Duration::from_secs(300));
    let now = Utc::now();

    let missing = plan_join(None, &code, "Bo", Uuid::new_v4(), &expiry, now);
    assert!(matches!(missing, Apply::Skip(Err(RoomError::NotFound(_)))));

    let waiting = committed(plan_create(None, &code, "Ann", Uuid::new_v4(), &expiry, now));
    let playing = committed(plan_join(
        Some(waiting.clone()),
        &code,
        "Bo",
        Uuid::new_v4(),
        &expiry,
        now,
    ));
    assert_eq!(playing.status, SessionStatus::Playing);
    assert_eq!(playing.player(Role::B).unwrap().health, 5);

    let third = plan_join(Some(playing), &code, "Cy", Uuid::new_v4(), &expiry, now);
    assert!(matches!(third, Apply::Skip(Err(RoomError::NotJoinable(_)))));

    let stale = plan_join(
        Some(waiting),
        &code,
        "Bo",
        Uuid::new_v4(),
        &expiry,
        now + chrono::Duration::minutes(10),
    );
    assert!(matches!(stale, Apply::Skip(Err(RoomError::NotJoinable(_)))));
}

#[tokio::test]
async fn create_then_join_through_the_store() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let host = lobby(&store);
    let guest = lobby(&store);

    let created = host.create_room("Ann", "ab12").await?;
    assert_eq!(created.role, Role::A);
    assert_eq!(created.code.as_str(), "AB12");

    let joined = guest.join_room(" Bo ", "AB12").await?;
    assert_eq!(joined.role, Role::B);
    assert_eq!(joined.display_name, "Bo");
    assert_eq!(joined.opponent_name.as_deref(), Some("Ann"));
    assert_eq!(store.dump()["rooms"]["AB12"]["status"], "playing");

    let err = lobby(&store).join_room("Cy", "AB12").await.unwrap_err();
    assert!(matches!(err, RoomError::NotJoinable(_)));

    let err = lobby(&store).create_room("Cy", "AB12").await.unwrap_err();
    assert!(matches!(err, RoomError::RoomActive(_)));
    Ok(())
}

#[tokio::test]
async fn invalid_input_never_touches_the_store() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let lobby = lobby(&store);
    assert!(matches!(
        lobby.create_room("Ann", "AB1").await,
        Err(RoomError::InvalidCode)
    ));
    assert!(matches!(
        lobby.join_room("", "AB12").await,
        Err(RoomError::InvalidName)
    ));
    assert!(store.dump().get("rooms").is_none());
    Ok(())
}

#[tokio::test]
async fn abandon_removes_the_document_and_reports_store_failures() -> Result<()> {
    let store = InMemoryDocumentStore::new();
    let lobby = lobby(&store);
    let entry = lobby.create_room("Ann", "AB12").await?;

    store.fail_next_writes(1);
    let err = lobby.abandon(&entry.code).await.unwrap_err();
    assert!(matches!(err, RoomError::Store(StoreError::Injected)));

    lobby.abandon(&entry.code).await?;
    assert!(store.dump().get("rooms").is_none());
    Ok(())
}
