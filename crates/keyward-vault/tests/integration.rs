//! Integration tests for the keyward-vault crate.
//!
//! These exercise the verify and lease policy operations end to end over
//! both storage engines, including concurrent consumers.

use std::sync::Arc;
use std::time::Duration;

use keyward_store::{InMemoryStorage, SqliteStorage, Storage, StorageEntry};
use keyward_vault::{
    Backend, DurationInput, EventBus, LeaseResponse, LeaseWriteRequest, PasscodeEntry,
    RejectReason, Salter, VaultConfig, VaultError, VaultEvent, VerifyRequest,
};

fn backend_over(storage: Arc<dyn Storage>) -> Backend {
    Backend::new(
        storage,
        Arc::new(Salter::new(b"integration-salt").unwrap()),
        EventBus::new(64),
    )
}

fn verify_request(otp: &str) -> VerifyRequest {
    VerifyRequest {
        otp: Some(otp.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Passcode lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn never_issued_passcodes_are_absent() {
    let backend = backend_over(Arc::new(InMemoryStorage::new()));
    for otp in ["000000", "123456", "not-a-code"] {
        assert_eq!(backend.verify(verify_request(otp)).await.unwrap(), None);
    }
}

#[tokio::test]
async fn passcode_verifies_exactly_once() {
    let backend = backend_over(Arc::new(SqliteStorage::open_in_memory().unwrap()));
    backend
        .insert_passcode("482913", &PasscodeEntry::new("deploy", "10.0.0.7"))
        .await
        .unwrap();

    let first = backend.verify(verify_request("482913")).await.unwrap().unwrap();
    assert_eq!(first.username, "deploy");
    assert_eq!(first.ip, "10.0.0.7");
    assert_eq!(first.valid, "yes");

    for _ in 0..3 {
        assert_eq!(backend.verify(verify_request("482913")).await.unwrap(), None);
    }
}

#[tokio::test]
async fn passcodes_are_independent() {
    let backend = backend_over(Arc::new(InMemoryStorage::new()));
    backend
        .insert_passcode("111111", &PasscodeEntry::new("alice", "10.0.0.1"))
        .await
        .unwrap();
    backend
        .insert_passcode("222222", &PasscodeEntry::new("bob", "10.0.0.2"))
        .await
        .unwrap();

    let bob = backend.verify(verify_request("222222")).await.unwrap().unwrap();
    assert_eq!(bob.username, "bob");

    let alice = backend.verify(verify_request("111111")).await.unwrap().unwrap();
    assert_eq!(alice.username, "alice");
}

#[tokio::test]
async fn undecodable_entry_never_verifies() {
    let storage = Arc::new(InMemoryStorage::new());
    let backend = backend_over(storage.clone());
    let mut events = backend.events().subscribe();

    let key = backend.verifier().store().salted_key("333333");
    storage
        .put(StorageEntry::new(format!("otp/{key}"), b"{\"username\": 5}".to_vec()))
        .await
        .unwrap();

    for _ in 0..2 {
        assert_eq!(backend.verify(verify_request("333333")).await.unwrap(), None);
        let event = events.recv().await.unwrap();
        match &*event {
            VaultEvent::PasscodeRejected { reason, .. } => {
                assert_eq!(*reason, RejectReason::CorruptEntry);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}

#[tokio::test]
async fn storage_outage_surfaces_as_error() {
    let storage = Arc::new(InMemoryStorage::new());
    let backend = backend_over(storage.clone());
    storage.set_offline(true);

    let result = backend.verify(verify_request("444444")).await;
    assert!(matches!(result, Err(VaultError::Storage(_))));

    let result = backend.read_lease().await;
    assert!(matches!(result, Err(VaultError::Storage(_))));
}

// ═══════════════════════════════════════════════════════════════════════
//  Concurrency
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_verifies_admit_one_caller() {
    let engines: Vec<Arc<dyn Storage>> = vec![
        Arc::new(InMemoryStorage::new()),
        Arc::new(SqliteStorage::open_in_memory().unwrap()),
    ];

    for storage in engines {
        let backend = backend_over(storage);
        backend
            .insert_passcode("555555", &PasscodeEntry::new("deploy", "10.0.0.7"))
            .await
            .unwrap();

        let attempts = (0..32).map(|_| {
            let backend = backend.clone();
            async move { backend.verify(verify_request("555555")).await.unwrap() }
        });
        let results = futures::future::join_all(attempts).await;

        let successes = results.iter().filter(|r| r.is_some()).count();
        assert_eq!(successes, 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn separate_backends_sharing_a_database_admit_one_caller() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    // Two backends, two connections, two lock tables: only the atomic
    // delete stands between them.
    let a = backend_over(Arc::new(SqliteStorage::open_async(path.clone()).await.unwrap()));
    let b = backend_over(Arc::new(SqliteStorage::open_async(path).await.unwrap()));

    a.insert_passcode("666666", &PasscodeEntry::new("deploy", "10.0.0.7"))
        .await
        .unwrap();

    let attempts = (0..16).map(|i| {
        let backend = if i % 2 == 0 { a.clone() } else { b.clone() };
        tokio::spawn(async move { backend.verify(verify_request("666666")).await.unwrap() })
    });

    let mut successes = 0;
    for handle in attempts.collect::<Vec<_>>() {
        if handle.await.unwrap().is_some() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
}

// ═══════════════════════════════════════════════════════════════════════
//  Lease policy
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn lease_policy_absent_until_written() {
    let backend = backend_over(Arc::new(SqliteStorage::open_in_memory().unwrap()));
    assert_eq!(backend.read_lease().await.unwrap(), None);

    backend
        .write_lease(LeaseWriteRequest {
            ttl: Some(DurationInput::Seconds(3600)),
            max_ttl: Some(DurationInput::Seconds(7200)),
        })
        .await
        .unwrap();

    assert_eq!(
        backend.read_lease().await.unwrap(),
        Some(LeaseResponse {
            ttl: 3600,
            max_ttl: 7200
        })
    );
}

#[tokio::test]
async fn lease_policy_max_ttl_is_independent_of_ttl() {
    let backend = backend_over(Arc::new(InMemoryStorage::new()));
    backend
        .write_lease(LeaseWriteRequest {
            ttl: Some("30m".into()),
            max_ttl: Some("1d".into()),
        })
        .await
        .unwrap();

    let policy = backend.leases().read().await.unwrap().unwrap();
    assert_eq!(policy.ttl, Duration::from_secs(1800));
    assert_eq!(policy.max_ttl, Duration::from_secs(86_400));
}

#[tokio::test]
async fn lease_update_emits_event() {
    let backend = backend_over(Arc::new(InMemoryStorage::new()));
    let mut events = backend.events().subscribe();

    backend
        .write_lease(LeaseWriteRequest {
            ttl: Some(DurationInput::Seconds(60)),
            max_ttl: Some(DurationInput::Seconds(120)),
        })
        .await
        .unwrap();

    let event = events.recv().await.unwrap();
    assert!(matches!(
        &*event,
        VaultEvent::LeasePolicyUpdated {
            ttl_secs: 60,
            max_ttl_secs: 120,
            ..
        }
    ));
}

// ═══════════════════════════════════════════════════════════════════════
//  Configuration and restart
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn generated_salt_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = VaultConfig::default();
    config.storage.path = Some(dir.path().join("keyward.db"));

    {
        let backend = Backend::from_config(&config).await.unwrap();
        backend
            .insert_passcode("777777", &PasscodeEntry::new("deploy", "10.0.0.7"))
            .await
            .unwrap();
    }

    let backend = Backend::from_config(&config).await.unwrap();
    let verified = backend.verify(verify_request("777777")).await.unwrap();
    assert!(verified.is_some());
}

#[tokio::test]
async fn different_salts_do_not_share_passcodes() {
    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
    let issuer = Backend::new(
        Arc::clone(&storage),
        Arc::new(Salter::new(b"salt-one").unwrap()),
        EventBus::default(),
    );
    let other = Backend::new(
        storage,
        Arc::new(Salter::new(b"salt-two").unwrap()),
        EventBus::default(),
    );

    issuer
        .insert_passcode("888888", &PasscodeEntry::new("deploy", "10.0.0.7"))
        .await
        .unwrap();

    assert_eq!(other.verify(verify_request("888888")).await.unwrap(), None);
    assert!(issuer.verify(verify_request("888888")).await.unwrap().is_some());
}
