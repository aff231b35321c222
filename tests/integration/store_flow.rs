//! Orchestrator results persisted through the environment store.

use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use envplane::{EnvironmentState, EnvironmentStore, Error};

use crate::fixtures::{orchestrator, spec, FakeGateway, Failure, ONE_HOUR};

/// Test: full lifecycle through the store
/// Given an environment created, saved and reloaded
/// When it is destroyed using the stored service
/// Then the reloaded aggregate carries all three references
#[tokio::test]
async fn test_create_store_destroy_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("environments.json");
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let env = assert_ok!(
        orchestrator
            .create(&ctx, spec("pr-42", "checkout", ONE_HOUR))
            .await
    );
    let mut store = EnvironmentStore::new(path.clone());
    assert_ok!(store.insert(env.clone()));
    assert_ok!(store.save().await);

    let mut store = assert_ok!(EnvironmentStore::load_from(path.clone()).await);
    let stored = assert_ok!(store.get("pr-42"));
    assert_eq!(stored, &env);

    let service = stored.spec().service.clone();
    let destroy = assert_ok!(orchestrator.destroy(&ctx, "pr-42", &service).await);
    assert_ok!(store.record_destroy("pr-42", destroy.clone()));
    assert_ok!(store.save().await);

    let store = assert_ok!(EnvironmentStore::load_from(path).await);
    let stored = assert_ok!(store.get("pr-42"));
    assert_eq!(stored.state(), EnvironmentState::Destroying);
    assert_eq!(stored.destroy_workflow(), Some(&destroy));
    assert_eq!(stored.create_workflow(), env.create_workflow());
    assert_eq!(stored.ttl_workflow(), env.ttl_workflow());

    let submissions = gateway.submissions();
    assert_eq!(submissions[2].labels["platform.service"], "checkout");
}

/// Test: a partial create can still be recorded and summarized
#[tokio::test]
async fn test_partial_create_is_storable() {
    let dir = TempDir::new().unwrap();
    let gateway = FakeGateway::new();
    gateway.fail_submit("env-ttl-cleanup-template", Failure::Transport);
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let environment = match orchestrator
        .create(&ctx, spec("pr-42", "checkout", ONE_HOUR))
        .await
    {
        Err(Error::PartialCreate { environment, .. }) => *environment,
        other => panic!("expected partial create, got {:?}", other),
    };

    let mut store = EnvironmentStore::new(dir.path().join("environments.json"));
    assert_ok!(store.insert(environment));
    assert_ok!(store.save().await);

    let summary = orchestrator
        .summarize(&ctx, assert_ok!(store.get("pr-42")), None)
        .await;
    assert_eq!(summary.state, EnvironmentState::Creating);
    assert!(summary.workflows.ttl.is_none());
}

/// Test: the store rejects a second environment with the same name
#[tokio::test]
async fn test_store_enforces_unique_names() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();
    let dir = TempDir::new().unwrap();
    let mut store = EnvironmentStore::new(dir.path().join("environments.json"));

    let first = assert_ok!(orchestrator.create(&ctx, spec("pr-42", "checkout", ONE_HOUR)).await);
    let second = assert_ok!(orchestrator.create(&ctx, spec("pr-42", "checkout", ONE_HOUR)).await);

    assert_ok!(store.insert(first));
    let err = assert_err!(store.insert(second));
    assert!(matches!(err, Error::EnvironmentExists(_)));
}
