//! Runner and fixture behavior against a live server.

mod common;

use common::{assert_passed, auth_config, local_config, random_bytes};
use davprobe_client::{StatusCode, Verb};
use davprobe_harness::{
    Check, Expect, FailureKind, Fixture, Harness, HarnessConfig, HarnessError, Scenario, Step,
    catalog,
};
use davprobe_server::{ServerConfig, ServerLifecycle, StopOutcome};
use tempfile::TempDir;
use tokio::net::TcpStream;

#[tokio::test]
async fn test_status_mismatch_reports_step_and_stops() {
    let scenario = Scenario::new("double-create")
        .step(Step::mkcol("/dup/"))
        .step(Step::put_new("/dup/file.txt", catalog::DATA1))
        .step(Step::put_new("/dup/file.txt", catalog::DATA2))
        .step(Step::mkcol("/dup/never/"));

    let fixture = Fixture::start(&local_config()).await.unwrap();
    let report = fixture.run(&scenario).await;

    let failure = report.failure.as_ref().expect("second PUT must fail its policy");
    assert_eq!(failure.index, 2);
    assert_eq!(failure.method, Verb::Put);
    match &failure.kind {
        FailureKind::StatusMismatch { expected, actual } => {
            assert_eq!(*expected, Expect::Status(StatusCode::CREATED));
            assert_eq!(*actual, StatusCode::NO_CONTENT);
        }
        other => panic!("Expected StatusMismatch, got {other:?}"),
    }
    assert_eq!(report.steps.len(), 3);

    // Fail-fast: the step after the failure never ran
    let resp = fixture.client().get("/dup/never/").await.unwrap();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    // Steps before the failure are not rolled back
    let resp = fixture.client().get("/dup/file.txt").await.unwrap();
    assert_eq!(resp.text(), catalog::DATA2);

    fixture.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_passing_turns_failure_into_error() {
    let scenario = Scenario::new("wrong").step(Step::get("/absent.txt"));

    let err = Harness::run_passing(&local_config(), &scenario)
        .await
        .unwrap_err();

    match err {
        HarnessError::Scenario { scenario, failure } => {
            assert_eq!(scenario, "wrong");
            assert_eq!(failure.index, 0);
        }
        other => panic!("Expected Scenario error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_stopped_after_failed_scenario() {
    let fixture = Fixture::start(&local_config()).await.unwrap();
    let addr = fixture.addr().unwrap();

    let report = fixture
        .run(&Scenario::new("fails").step(Step::get("/absent")))
        .await;
    assert!(!report.passed());

    let outcome = fixture.shutdown().await.unwrap();
    assert!(matches!(outcome, Some(StopOutcome::Drained { .. })), "{outcome:?}");
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_random_payload_round_trip() {
    let payload = random_bytes(3 * 1024 * 1024 + 7);
    let scenario = Scenario::new("random")
        .step(Step::put_new("/random.bin", payload.clone()))
        .step(Step::get("/random.bin").check(Check::body(payload.clone())))
        .step(Step::put_replace("/random.bin", payload[..1024].to_vec()))
        .step(Step::get("/random.bin").check(Check::body(payload[..1024].to_vec())));

    let report = Harness::run(&local_config(), &scenario).await.unwrap();
    assert_passed(&report);
}

#[tokio::test]
async fn test_missing_credentials_fail_first_strict_step() {
    let root = TempDir::new().unwrap();
    let mut server = ServerLifecycle::new(root.path());
    server.start(&auth_config().server).await.unwrap();
    let config = HarnessConfig::default().with_external_url(server.url().unwrap());

    let report = Harness::run(&config, &catalog::reference()).await.unwrap();

    // The tolerated cleanup accepts the 401; MKCOL does not.
    let failure = report.failure.unwrap();
    assert_eq!(failure.index, 1);
    assert!(matches!(
        failure.kind,
        FailureKind::StatusMismatch { actual, .. } if actual == StatusCode::UNAUTHORIZED
    ));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_external_server_reference_is_repeatable() {
    let root = TempDir::new().unwrap();
    let mut server = ServerLifecycle::new(root.path());
    server.start(&ServerConfig::default()).await.unwrap();
    let config = HarnessConfig::default().with_external_url(server.url().unwrap());

    // The leading cleanup makes a second pass over leftover state pass too
    for _ in 0..2 {
        let report = Harness::run(&config, &catalog::reference()).await.unwrap();
        assert_passed(&report);
    }

    assert!(server.addr().is_some(), "External server is not stopped by the harness");
    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_configured_root_keeps_resources() {
    let parent = TempDir::new().unwrap();
    let root = parent.path().join("dav-root");
    let config = local_config().with_root(&root);

    let report = Harness::run(&config, &catalog::reference()).await.unwrap();
    assert_passed(&report);

    let moved = std::fs::read_to_string(root.join("test").join("file2_moved.txt")).unwrap();
    assert_eq!(moved, catalog::DATA2);
    assert!(root.join("test").join("folder").is_dir());
    assert!(!root.join("test").join("file2.txt").exists());
}

#[tokio::test]
async fn test_bind_conflict_is_harness_error() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let config = local_config().with_server(
        ServerConfig::default()
            .with_port(port)
            .with_bind_attempts(1),
    );

    let err = Harness::run(&config, &catalog::missing_resource())
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Lifecycle(_)), "{err:?}");
}
