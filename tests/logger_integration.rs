//! End-to-end tests against a local HTTP endpoint

use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sumo_logger::{
    FlushOutcome, LogOutcome, Logger, LoggerError, LoggerOptions, PerMessageOptions, TransportKind,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RECEIVER_PATH: &str = "/receiver/v1/http/token";

fn options_for(server: &MockServer, transport: TransportKind) -> LoggerOptions {
    LoggerOptions {
        session_key: "integration".to_string(),
        source_category: "test/integration".to_string(),
        transport,
        http_timeout: Duration::from_secs(5),
        ..LoggerOptions::new(format!("{}{}", server.uri(), RECEIVER_PATH))
    }
}

async fn received_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| String::from_utf8_lossy(&r.body).to_string())
        .collect()
}

#[tokio::test]
async fn test_http_transport_delivers_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECEIVER_PATH))
        .and(header("X-Sumo-Client", "sumo-javascript-sdk"))
        .and(header("X-Sumo-Category", "test/integration"))
        .and(header("Content-Type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
        .expect(1)
        .mount(&server)
        .await;

    let logger = Logger::new(options_for(&server, TransportKind::Http));
    let outcome = logger.log("hello from reqwest", PerMessageOptions::default()).await;

    let LogOutcome::Flushed(FlushOutcome::Delivered(response)) = outcome else {
        panic!("expected a delivered flush");
    };
    assert_eq!(response.status, 200);
    assert_eq!(response.data, json!({"accepted": true}));

    let bodies = received_bodies(&server).await;
    let line: Value = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(line["msg"], "hello from reqwest");
    assert_eq!(line["sessionId"], "integration");
}

#[tokio::test]
async fn test_socket_transport_delivers_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(RECEIVER_PATH))
        .and(header("X-Sumo-Client", "sumo-javascript-sdk"))
        .respond_with(ResponseTemplate::new(200).set_body_string("accepted"))
        .expect(1)
        .mount(&server)
        .await;

    let logger = Logger::new(LoggerOptions {
        use_interval_only: true,
        ..options_for(&server, TransportKind::Socket)
    });
    logger.log(vec!["first", "second"], PerMessageOptions::default()).await;
    logger.log("third", PerMessageOptions::default()).await;

    let outcome = logger.flush().await;
    let response = outcome.response().expect("delivered response");
    assert_eq!(response.status, 200);
    assert_eq!(response.data, Value::String("accepted".to_string()));
    assert_eq!(logger.pending_count(), 0);

    let bodies = received_bodies(&server).await;
    let msgs: Vec<String> = bodies[0]
        .split('\n')
        .map(|l| serde_json::from_str::<Value>(l).unwrap()["msg"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(msgs, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_error_status_drops_batch_and_reports() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let errors = Arc::new(AtomicUsize::new(0));
    let logger = Logger::new(LoggerOptions {
        on_error: Some({
            let errors = errors.clone();
            Arc::new(move |err: &LoggerError| {
                assert!(matches!(err, LoggerError::Status { status: 500, .. }));
                errors.fetch_add(1, Ordering::SeqCst);
            })
        }),
        ..options_for(&server, TransportKind::Http)
    });

    let outcome = logger.log("rejected upstream", PerMessageOptions::default()).await;
    assert!(matches!(outcome, LogOutcome::Flushed(FlushOutcome::Delivered(_))));
    assert_eq!(errors.load(Ordering::SeqCst), 1);
    assert_eq!(logger.pending_count(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_keeps_queue() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    for transport in [TransportKind::Http, TransportKind::Socket] {
        let errors = Arc::new(AtomicUsize::new(0));
        let logger = Logger::new(LoggerOptions {
            on_error: Some({
                let errors = errors.clone();
                Arc::new(move |_: &LoggerError| {
                    errors.fetch_add(1, Ordering::SeqCst);
                })
            }),
            transport,
            http_timeout: Duration::from_secs(2),
            ..LoggerOptions::new(format!("http://127.0.0.1:{}{}", port, RECEIVER_PATH))
        });

        let outcome = logger.log("nobody listening", PerMessageOptions::default()).await;
        assert!(matches!(outcome, LogOutcome::Flushed(FlushOutcome::Failed(_))));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(logger.pending_count(), 1);
        assert!(!logger.stats().sending);
    }
}

#[tokio::test]
async fn test_interval_timer_ships_pending_lines() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let logger = Logger::new(LoggerOptions {
        interval: Duration::from_millis(100),
        ..options_for(&server, TransportKind::Http)
    });
    assert!(logger.stats().timer_active);

    assert!(matches!(
        logger.log("tick", PerMessageOptions::default()).await,
        LogOutcome::Queued
    ));

    for _ in 0..50 {
        if logger.pending_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(logger.pending_count(), 0);
    assert_eq!(received_bodies(&server).await.len(), 1);
    logger.stop_timer();
}

#[tokio::test]
async fn test_concurrent_callers_share_one_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let logger = Logger::new(LoggerOptions {
        use_interval_only: true,
        ..options_for(&server, TransportKind::Http)
    });

    let calls = (0..20).map(|i| {
        let logger = &logger;
        async move { logger.log(format!("line {}", i), PerMessageOptions::default()).await }
    });
    let outcomes = futures::future::join_all(calls).await;
    assert!(outcomes.iter().all(|o| matches!(o, LogOutcome::Queued)));
    assert_eq!(logger.pending_count(), 20);

    assert!(logger.flush().await.is_delivered());
    let bodies = received_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0].split('\n').count(), 20);
}
