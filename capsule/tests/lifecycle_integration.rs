//! Integration tests for capsule creation, reads and lifecycle transitions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{Duration, TimeZone, Utc};
use time_capsule::code::is_valid_code;
use time_capsule::mocks::{FixedClock, InMemoryCapsuleRepository, SequenceCodeGenerator, test_clock};
use time_capsule::providers::CapsuleRepository;
use time_capsule::{
    CapsuleConfig, CapsuleError, CapsuleService, Lifecycle, RandomCodeGenerator, SealedState,
    UserId, Vessel,
};

const OWNER: UserId = UserId(1);
const FRIEND: UserId = UserId(2);
const STRANGER: UserId = UserId(99);

type Service = CapsuleService<InMemoryCapsuleRepository, RandomCodeGenerator, FixedClock>;

fn create_test_service() -> (Service, FixedClock) {
    let clock = test_clock();
    let service = CapsuleService::new(
        InMemoryCapsuleRepository::new(),
        RandomCodeGenerator,
        clock.clone(),
        CapsuleConfig::default(),
    );
    (service, clock)
}

#[tokio::test]
async fn test_concrete_scenario() {
    let (service, _clock) = create_test_service();

    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    assert!(is_valid_code(&created.code, 10));

    let capsule = service.get_capsule(OWNER, created.id).await.unwrap();
    assert_eq!(capsule.vessel, Vessel::Box);
    assert!(capsule.public);
    assert_eq!(capsule.name, "My Time Capsule");
    assert_eq!(capsule.state(), SealedState::Preseal);
    assert_eq!(capsule.date_to_open(), None);

    assert_eq!(
        service.join_capsule(FRIEND, "zzzzzzzzzz").await,
        Err(CapsuleError::NotFound)
    );

    // Past date: opening right away succeeds.
    service.seal_capsule(OWNER, created.id, "2020-01-01").await.unwrap();
    let opened = service.open_capsule(OWNER, created.id).await.unwrap();
    assert_eq!(
        opened,
        Lifecycle::Opened {
            date_to_open: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
        }
    );

    // Future date: opening right away is too early.
    let second = service.create_capsule(OWNER, "bottle", false).await.unwrap();
    service.seal_capsule(OWNER, second.id, "2030-06-01").await.unwrap();
    assert_eq!(
        service.open_capsule(OWNER, second.id).await,
        Err(CapsuleError::TooEarly {
            date_to_open: Utc.with_ymd_and_hms(2030, 6, 1, 0, 0, 0).unwrap()
        })
    );
}

#[tokio::test]
async fn test_invalid_vessel_draws_no_code() {
    let codes = SequenceCodeGenerator::default();
    let repository = InMemoryCapsuleRepository::new();
    let service = CapsuleService::new(repository.clone(), codes.clone(), test_clock(), CapsuleConfig::default());

    assert_eq!(
        service.create_capsule(OWNER, "crate", true).await,
        Err(CapsuleError::InvalidVessel("crate".to_string()))
    );
    assert_eq!(codes.draws(), 0);
    assert_eq!(repository.capsule_count().unwrap(), 0);
}

#[tokio::test]
async fn test_unset_owner_is_rejected() {
    let codes = SequenceCodeGenerator::default();
    let repository = InMemoryCapsuleRepository::new();
    let service = CapsuleService::new(repository.clone(), codes.clone(), test_clock(), CapsuleConfig::default());

    for raw in [0, -7] {
        assert_eq!(
            service.create_capsule(UserId(raw), "box", true).await,
            Err(CapsuleError::InvalidUserId(raw))
        );
    }
    assert_eq!(codes.draws(), 0);
    assert_eq!(repository.capsule_count().unwrap(), 0);

    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    assert_eq!(
        service.join_capsule(UserId(0), &created.code).await,
        Err(CapsuleError::InvalidUserId(0))
    );
    let capsule = service.get_capsule(OWNER, created.id).await.unwrap();
    assert!(capsule.members.is_empty());
}

#[tokio::test]
async fn test_guitar_case_vessel() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "guitar case", false).await.unwrap();
    let capsule = service.get_capsule_unsafe(OWNER, created.id).await.unwrap();
    assert_eq!(capsule.vessel, Vessel::GuitarCase);
}

#[tokio::test]
async fn test_open_before_seal() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    assert_eq!(
        service.open_capsule(OWNER, created.id).await,
        Err(CapsuleError::NotSealed)
    );
}

#[tokio::test]
async fn test_seal_twice() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    service.seal_capsule(OWNER, created.id, "2030-01-01").await.unwrap();
    assert_eq!(
        service.seal_capsule(OWNER, created.id, "2031-01-01").await,
        Err(CapsuleError::AlreadySealed)
    );

    // The first date stands.
    let capsule = service.get_capsule_unsafe(OWNER, created.id).await.unwrap();
    assert_eq!(
        capsule.date_to_open(),
        Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_open_once_date_passes() {
    let (service, clock) = create_test_service();
    let created = service.create_capsule(OWNER, "shoe", false).await.unwrap();
    service.seal_capsule(OWNER, created.id, "2025-01-10").await.unwrap();

    assert!(matches!(
        service.open_capsule(OWNER, created.id).await,
        Err(CapsuleError::TooEarly { .. })
    ));

    clock.advance(Duration::days(9));
    service.open_capsule(OWNER, created.id).await.unwrap();
    assert_eq!(
        service.open_capsule(OWNER, created.id).await,
        Err(CapsuleError::NotSealed)
    );
    assert_eq!(
        service.seal_capsule(OWNER, created.id, "2040-01-01").await,
        Err(CapsuleError::AlreadySealed)
    );
}

#[tokio::test]
async fn test_invalid_date_leaves_capsule_untouched() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    for input in ["2030-13-01", "tomorrow", "2030/01/01", ""] {
        assert_eq!(
            service.seal_capsule(OWNER, created.id, input).await,
            Err(CapsuleError::InvalidDate(input.to_string()))
        );
    }
    let capsule = service.get_capsule(OWNER, created.id).await.unwrap();
    assert_eq!(capsule.state(), SealedState::Preseal);
}

#[tokio::test]
async fn test_invalid_date_is_reported_before_lookup() {
    let (service, _clock) = create_test_service();
    assert_eq!(
        service.seal_capsule(OWNER, time_capsule::CapsuleId(404), "nope").await,
        Err(CapsuleError::InvalidDate("nope".to_string()))
    );
}

#[tokio::test]
async fn test_only_owner_changes_lifecycle() {
    let (service, clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(FRIEND, &created.code).await.unwrap();

    assert_eq!(
        service.seal_capsule(FRIEND, created.id, "2020-01-01").await,
        Err(CapsuleError::NotOwner)
    );
    assert_eq!(
        service.seal_capsule(STRANGER, created.id, "2020-01-01").await,
        Err(CapsuleError::Forbidden)
    );

    service.seal_capsule(OWNER, created.id, "2020-01-01").await.unwrap();
    clock.advance(Duration::days(1));
    assert_eq!(
        service.open_capsule(FRIEND, created.id).await,
        Err(CapsuleError::NotOwner)
    );
}

#[tokio::test]
async fn test_seal_after_concurrent_seal() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    // Another request sealed the capsule after our read.
    let sealed = Lifecycle::Sealed {
        date_to_open: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
    };
    let applied = service
        .repository()
        .update_lifecycle(created.id, OWNER, SealedState::Preseal, sealed)
        .await
        .unwrap();
    assert!(applied);
    let again = service
        .repository()
        .update_lifecycle(created.id, OWNER, SealedState::Preseal, sealed)
        .await
        .unwrap();
    assert!(!again);

    assert_eq!(
        service.seal_capsule(OWNER, created.id, "2030-01-01").await,
        Err(CapsuleError::AlreadySealed)
    );
}

#[tokio::test]
async fn test_safe_read_refuses_frozen_capsules() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(FRIEND, &created.code).await.unwrap();

    assert!(service.get_capsule(FRIEND, created.id).await.is_ok());
    assert_eq!(
        service.get_capsule(STRANGER, created.id).await,
        Err(CapsuleError::Forbidden)
    );
    assert_eq!(
        service.get_capsule(OWNER, time_capsule::CapsuleId(404)).await,
        Err(CapsuleError::NotFound)
    );

    service.seal_capsule(OWNER, created.id, "2020-01-01").await.unwrap();
    assert_eq!(
        service.get_capsule(OWNER, created.id).await,
        Err(CapsuleError::AlreadySealed)
    );
    assert!(service.get_capsule_unsafe(FRIEND, created.id).await.is_ok());

    service.open_capsule(OWNER, created.id).await.unwrap();
    assert_eq!(
        service.get_capsule(OWNER, created.id).await,
        Err(CapsuleError::AlreadySealed)
    );
}

#[tokio::test]
async fn test_view_hides_sealed_capsules_only() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(FRIEND, &created.code).await.unwrap();

    assert!(service.view_capsule(FRIEND, created.id).await.is_ok());

    service.seal_capsule(OWNER, created.id, "2020-01-01").await.unwrap();
    assert_eq!(
        service.view_capsule(FRIEND, created.id).await,
        Err(CapsuleError::CapsuleSealed)
    );

    service.open_capsule(OWNER, created.id).await.unwrap();
    let capsule = service.view_capsule(FRIEND, created.id).await.unwrap();
    assert_eq!(capsule.state(), SealedState::Opened);
}

#[tokio::test]
async fn test_rename() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(FRIEND, &created.code).await.unwrap();

    service.rename_capsule(OWNER, created.id, "  Class of 2025  ").await.unwrap();
    let capsule = service.get_capsule_unsafe(OWNER, created.id).await.unwrap();
    assert_eq!(capsule.name, "Class of 2025");

    assert_eq!(
        service.rename_capsule(FRIEND, created.id, "Mine now").await,
        Err(CapsuleError::NotOwner)
    );
    assert_eq!(
        service.rename_capsule(OWNER, created.id, "   ").await,
        Err(CapsuleError::InvalidName)
    );
    assert_eq!(
        service.rename_capsule(OWNER, created.id, &"x".repeat(65)).await,
        Err(CapsuleError::InvalidName)
    );

    // Renaming is allowed after sealing.
    service.seal_capsule(OWNER, created.id, "2030-01-01").await.unwrap();
    service.rename_capsule(OWNER, created.id, &"é".repeat(64)).await.unwrap();
}

#[tokio::test]
async fn test_get_capsules_lists_owned_and_joined() {
    let (service, _clock) = create_test_service();
    let mine = service.create_capsule(OWNER, "box", true).await.unwrap();
    let theirs = service.create_capsule(FRIEND, "suitcase", false).await.unwrap();
    let unrelated = service.create_capsule(STRANGER, "garbage", false).await.unwrap();
    service.join_capsule(OWNER, &theirs.code).await.unwrap();

    let ids: Vec<_> = service
        .get_capsules(OWNER)
        .await
        .unwrap()
        .into_iter()
        .map(|capsule| capsule.id)
        .collect();
    assert_eq!(ids, vec![mine.id, theirs.id]);
    assert!(!ids.contains(&unrelated.id));
}

#[tokio::test]
async fn test_store_errors_propagate() {
    let (service, _clock) = create_test_service();
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.repository().set_unavailable(true).unwrap();

    let err = service.seal_capsule(OWNER, created.id, "2030-01-01").await.unwrap_err();
    assert!(matches!(err, CapsuleError::StoreError(_)));
    assert!(err.is_retryable());
    assert!(!err.is_user_error());
}
