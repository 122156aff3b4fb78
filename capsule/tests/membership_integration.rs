//! Integration tests for join codes and membership.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use time_capsule::mocks::{FixedClock, InMemoryCapsuleRepository, SequenceCodeGenerator, test_clock};
use time_capsule::{CapsuleConfig, CapsuleError, CapsuleService, RandomCodeGenerator, SealedState, UserId};

const OWNER: UserId = UserId(1);

fn create_service_with_codes(
    codes: SequenceCodeGenerator,
) -> CapsuleService<InMemoryCapsuleRepository, SequenceCodeGenerator, FixedClock> {
    CapsuleService::new(
        InMemoryCapsuleRepository::new(),
        codes,
        test_clock(),
        CapsuleConfig::default(),
    )
}

fn occupied_codes(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("TAKEN{i:05}")).collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Code generation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_nine_collisions_then_success() {
    let taken = occupied_codes(9);
    let mut script = taken.clone();
    script.push("FreshCode1".to_string());

    let codes = SequenceCodeGenerator::new(script);
    let service = create_service_with_codes(codes.clone());
    for code in &taken {
        service.repository().occupy_code(code).unwrap();
    }

    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    assert_eq!(created.code, "FreshCode1");
    assert_eq!(codes.draws(), 10);
}

#[tokio::test]
async fn test_ten_collisions_exhaust() {
    let taken = occupied_codes(10);
    let codes = SequenceCodeGenerator::new(taken.clone());
    let service = create_service_with_codes(codes.clone());
    for code in &taken {
        service.repository().occupy_code(code).unwrap();
    }

    assert_eq!(
        service.create_capsule(OWNER, "box", true).await,
        Err(CapsuleError::CodeGenerationExhausted { attempts: 10 })
    );
    assert_eq!(codes.draws(), 10);
    assert_eq!(service.repository().capsule_count().unwrap(), 0);
}

#[tokio::test]
async fn test_eleven_collisions_exhaust_after_ten_draws() {
    let taken = occupied_codes(11);
    let codes = SequenceCodeGenerator::new(taken.clone());
    let service = create_service_with_codes(codes.clone());
    for code in &taken {
        service.repository().occupy_code(code).unwrap();
    }

    assert_eq!(
        service.create_capsule(OWNER, "box", true).await,
        Err(CapsuleError::CodeGenerationExhausted { attempts: 10 })
    );
    assert_eq!(codes.draws(), 10);
}

#[tokio::test]
async fn test_insert_race_counts_as_collision() {
    let codes = SequenceCodeGenerator::new(["RacedCode1", "WinnerCode"]);
    let service = create_service_with_codes(codes.clone());
    service.repository().race_code("RacedCode1").unwrap();

    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    assert_eq!(created.code, "WinnerCode");
    assert_eq!(codes.draws(), 2);
}

#[tokio::test]
async fn test_codes_unique_across_creations() {
    // Later creations collide on the repeated code, then fall back to the counter.
    let service = CapsuleService::new(
        InMemoryCapsuleRepository::new(),
        SequenceCodeGenerator::new(["SameCode00"; 3]),
        test_clock(),
        CapsuleConfig::default(),
    );

    let mut seen = HashSet::new();
    for _ in 0..20 {
        let created = service.create_capsule(OWNER, "box", true).await.unwrap();
        assert!(seen.insert(created.code));
    }
}

#[tokio::test]
async fn test_random_codes_unique_across_creations() {
    let service = CapsuleService::new(
        InMemoryCapsuleRepository::new(),
        RandomCodeGenerator,
        test_clock(),
        CapsuleConfig::default(),
    );

    let mut seen = HashSet::new();
    for _ in 0..200 {
        let created = service.create_capsule(OWNER, "box", true).await.unwrap();
        assert!(seen.insert(created.code));
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Joining
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_join_assigns_slots_in_order() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    for (user, expected_slot) in (2..=6).zip(1..=5) {
        assert_eq!(service.join_capsule(UserId(user), &created.code).await, Ok(expected_slot));
    }

    let capsule = service.get_capsule(OWNER, created.id).await.unwrap();
    let slots: Vec<(i64, u8)> = capsule.members.iter().map(|m| (m.user_id.0, m.slot)).collect();
    assert_eq!(slots, vec![(2, 1), (3, 2), (4, 3), (5, 4), (6, 5)]);
    assert!(capsule.members.iter().all(|m| !m.sealed));
}

#[tokio::test]
async fn test_already_member_never_mutates_slots() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    for user in 2..=4 {
        service.join_capsule(UserId(user), &created.code).await.unwrap();
    }
    let before = service.get_capsule(OWNER, created.id).await.unwrap();

    for user in [1, 2, 3, 4] {
        assert_eq!(
            service.join_capsule(UserId(user), &created.code).await,
            Err(CapsuleError::AlreadyMember)
        );
    }

    let after = service.get_capsule(OWNER, created.id).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_full_capsule_rejects_join() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    for user in 2..=6 {
        service.join_capsule(UserId(user), &created.code).await.unwrap();
    }
    let before = service.get_capsule(OWNER, created.id).await.unwrap();

    assert_eq!(
        service.join_capsule(UserId(7), &created.code).await,
        Err(CapsuleError::CapsuleFull)
    );
    assert_eq!(service.get_capsule(OWNER, created.id).await.unwrap(), before);
}

#[tokio::test]
async fn test_member_slots_configurable() {
    let service = CapsuleService::new(
        InMemoryCapsuleRepository::new(),
        SequenceCodeGenerator::default(),
        test_clock(),
        CapsuleConfig::default().with_member_slots(2),
    );
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(UserId(2), &created.code).await.unwrap();
    service.join_capsule(UserId(3), &created.code).await.unwrap();
    assert_eq!(
        service.join_capsule(UserId(4), &created.code).await,
        Err(CapsuleError::CapsuleFull)
    );
}

#[tokio::test]
async fn test_join_unknown_or_malformed_code() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    service.create_capsule(OWNER, "box", true).await.unwrap();

    for code in ["Unknown123", "short", "has space!", ""] {
        assert_eq!(
            service.join_capsule(UserId(2), code).await,
            Err(CapsuleError::NotFound)
        );
    }
}

#[tokio::test]
async fn test_concurrent_joins_never_overfill() {
    let service = std::sync::Arc::new(create_service_with_codes(SequenceCodeGenerator::default()));
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    let mut handles = Vec::new();
    for user in 2..=21 {
        let service = std::sync::Arc::clone(&service);
        let code = created.code.clone();
        handles.push(tokio::spawn(async move { service.join_capsule(UserId(user), &code).await }));
    }

    let mut joined = 0;
    let mut full = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => joined += 1,
            Err(CapsuleError::CapsuleFull) => full += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!((joined, full), (5, 15));

    let capsule = service.get_capsule(OWNER, created.id).await.unwrap();
    let slots: HashSet<u8> = capsule.members.iter().map(|m| m.slot).collect();
    assert_eq!(slots, (1..=5).collect());
}

// ═══════════════════════════════════════════════════════════════════════
// Member seal confirmation
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_member_confirms_seal() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(UserId(2), &created.code).await.unwrap();
    service.join_capsule(UserId(3), &created.code).await.unwrap();

    service.confirm_member_seal(UserId(3), created.id).await.unwrap();
    service.confirm_member_seal(UserId(3), created.id).await.unwrap();

    let capsule = service.get_capsule(OWNER, created.id).await.unwrap();
    assert!(!capsule.member(UserId(2)).unwrap().sealed);
    assert!(capsule.member(UserId(3)).unwrap().sealed);
    assert_eq!(capsule.state(), SealedState::Preseal);
}

#[tokio::test]
async fn test_owner_and_strangers_cannot_confirm_seal() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();

    assert_eq!(
        service.confirm_member_seal(OWNER, created.id).await,
        Err(CapsuleError::Forbidden)
    );
    assert_eq!(
        service.confirm_member_seal(UserId(50), created.id).await,
        Err(CapsuleError::Forbidden)
    );
}

#[tokio::test]
async fn test_confirm_seal_after_capsule_sealed() {
    let service = create_service_with_codes(SequenceCodeGenerator::default());
    let created = service.create_capsule(OWNER, "box", true).await.unwrap();
    service.join_capsule(UserId(2), &created.code).await.unwrap();
    service.seal_capsule(OWNER, created.id, "2030-01-01").await.unwrap();

    assert_eq!(
        service.confirm_member_seal(UserId(2), created.id).await,
        Err(CapsuleError::AlreadySealed)
    );
}
