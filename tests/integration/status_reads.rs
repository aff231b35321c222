//! Status read integration tests.
//!
//! Reads always go to the gateway, and only for references that exist.
//! Failures stay distinguishable for direct calls and degrade to "no
//! status" inside a summary.

use std::time::Duration;

use tokio_test::{assert_err, assert_ok};
use tokio_util::sync::CancellationToken;

use envplane::{EnvironmentState, GatewayError, WorkflowLinks};

use crate::fixtures::{orchestrator, spec, FakeGateway, Failure, ONE_HOUR};

/// Test: no TTL reference, no gateway call
/// Given an environment created without TTL
/// When get_ttl_status is called
/// Then it returns no status and the gateway was never asked
#[tokio::test]
async fn test_ttl_status_without_reference_skips_gateway() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let env = assert_ok!(
        orchestrator
            .create(&ctx, spec("pr-42", "checkout", Duration::ZERO))
            .await
    );

    let status = assert_ok!(orchestrator.get_ttl_status(&ctx, &env).await);
    assert!(status.is_none());
    let status = assert_ok!(orchestrator.get_destroy_status(&ctx, &env).await);
    assert!(status.is_none());
    assert!(gateway.get_calls().is_empty());
}

/// Test: status is read live on every call
#[tokio::test]
async fn test_status_reflects_execution_plane() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let env = assert_ok!(
        orchestrator
            .create(&ctx, spec("pr-42", "checkout", ONE_HOUR))
            .await
    );
    let create_name = env.create_workflow().name().to_string();

    // Submitted but not yet picked up by the controller.
    let status = assert_ok!(orchestrator.get_create_status(&ctx, &env).await);
    assert!(status.is_none());

    gateway.set_status(&create_name, "Running", Some("2026-10-19T12:00:00Z"), None);
    let status = assert_ok!(orchestrator.get_create_status(&ctx, &env).await).unwrap();
    assert_eq!(status.phase, "Running");
    assert!(status.started_at.is_some());
    assert!(status.finished_at.is_none());

    gateway.set_status(
        &create_name,
        "Succeeded",
        Some("2026-10-19T12:00:00Z"),
        Some("2026-10-19T12:04:10Z"),
    );
    let status = assert_ok!(orchestrator.get_create_status(&ctx, &env).await).unwrap();
    assert_eq!(status.phase, "Succeeded");
    assert!(status.finished_at.is_some());

    assert_eq!(gateway.get_calls(), vec![create_name.clone(); 3]);
}

/// Test: not-found and transport failures are different error kinds
#[tokio::test]
async fn test_not_found_distinct_from_transport() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let env = assert_ok!(
        orchestrator
            .create(&ctx, spec("pr-42", "checkout", ONE_HOUR))
            .await
    );

    gateway.delete(env.create_workflow().name());
    let missing = assert_err!(orchestrator.get_create_status(&ctx, &env).await);
    assert!(missing.is_not_found());

    gateway.fail_get(env.ttl_workflow().unwrap().name(), Failure::Transport);
    let transport = assert_err!(orchestrator.get_ttl_status(&ctx, &env).await);
    assert!(!transport.is_not_found());
    assert!(matches!(
        transport,
        envplane::Error::StatusRead {
            source: GatewayError::Transport(_),
            ..
        }
    ));
}

/// Test: a cancelled caller aborts the read
#[tokio::test]
async fn test_status_read_with_cancelled_context() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);

    let env = assert_ok!(
        orchestrator
            .create(&CancellationToken::new(), spec("pr-42", "checkout", ONE_HOUR))
            .await
    );

    let ctx = CancellationToken::new();
    ctx.cancel();
    let err = assert_err!(orchestrator.get_create_status(&ctx, &env).await);
    assert!(err.is_cancelled());
}

/// Test: summary tolerates failed reads
/// Given one missing workflow and one unreachable read
/// When the environment is summarized
/// Then the summary is still produced with those statuses absent
#[tokio::test]
async fn test_summary_tolerates_read_failures() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let env = assert_ok!(
        orchestrator
            .create(&ctx, spec("pr-42", "checkout", ONE_HOUR).with_parameter("branch", "main"))
            .await
    );
    let create_name = env.create_workflow().name().to_string();
    gateway.set_status(&create_name, "Succeeded", None, None);
    gateway.fail_get(env.ttl_workflow().unwrap().name(), Failure::Transport);

    let destroy = assert_ok!(orchestrator.destroy(&ctx, "pr-42", "checkout").await);
    let env = env.with_destroy(destroy);
    gateway.delete(env.destroy_workflow().unwrap().name());

    let summary = orchestrator.summarize(&ctx, &env, None).await;

    assert_eq!(summary.state, EnvironmentState::Destroying);
    assert_eq!(summary.environment.name, "pr-42");
    assert_eq!(summary.environment.ttl_seconds, 3600);
    assert_eq!(summary.environment.parameters["branch"], "main");
    assert_eq!(
        summary.workflows.create.status.as_ref().map(|s| s.phase.as_str()),
        Some("Succeeded")
    );
    let ttl = summary.workflows.ttl.as_ref().unwrap();
    assert!(ttl.status.is_none());
    let destroy = summary.workflows.destroy.as_ref().unwrap();
    assert!(destroy.status.is_none());
    assert!(summary.workflows.create.url.is_none());
}

/// Test: summary links and JSON shape
#[tokio::test]
async fn test_summary_links_and_json() {
    let gateway = FakeGateway::new();
    let orchestrator = orchestrator(&gateway);
    let ctx = CancellationToken::new();

    let env = assert_ok!(
        orchestrator
            .create(&ctx, spec("pr-42", "checkout", Duration::ZERO))
            .await
    );
    let links = WorkflowLinks::new("https://argo.example.com/");

    let summary = orchestrator.summarize(&ctx, &env, Some(&links)).await;
    let url = summary.workflows.create.url.clone().unwrap();
    assert_eq!(
        url,
        format!(
            "https://argo.example.com/workflows/argo/{}",
            env.create_workflow().name()
        )
    );

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["environment"]["name"], "pr-42");
    assert_eq!(json["state"], "active");
    assert!(json["workflows"].get("ttl").is_none());
    assert!(json["workflows"]["create"].get("status").is_none());
}
