/// Deadline and shutdown tests
///
/// Sessions whose producers never answer must still resolve: missing
/// labels become synthesized 408 entries, shutdown finalizes everything
/// that is still open. Uses the paused tokio clock, so no real waiting.
/// Run with: cargo test --test timeout_tests
use http::StatusCode;
use std::collections::BTreeMap;
use std::time::Duration;
use twinbridge::{
    AckLabel, Acknowledgement, Channel, Command, CommandHeaders, CorrelationId, EngineConfig,
    Gateway,
};

#[tokio::test(start_paused = true)]
async fn test_missing_label_becomes_timeout_entry() {
    let gateway = Gateway::new();
    let command = Command::new(
        CommandHeaders::new(Channel::Twin).request_ack(AckLabel::new("custom-ack")),
    );
    let correlation_id = command.correlation_id().clone();

    let rx = gateway.submit(command).await.unwrap();
    gateway
        .deliver_response(&correlation_id, StatusCode::NO_CONTENT, BTreeMap::new(), None)
        .await;
    // custom-ack never arrives; the paused clock jumps to the deadline

    let response = rx.await.unwrap();
    assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);

    let body = response.payload().unwrap();
    assert_eq!(body["twin-persisted"]["status"], 204);
    assert_eq!(body["custom-ack"]["status"], 408);
    assert_eq!(
        body["custom-ack"]["payload"]["error"],
        "acknowledgement.request.timeout"
    );
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_label_equals_delivered_timeout_entry() {
    // a session that never hears from 'custom-ack' and one that receives
    // the synthesized failure explicitly must produce identical results
    let timed_out = {
        let gateway = Gateway::new();
        let command = Command::new(
            CommandHeaders::new(Channel::Twin).request_ack(AckLabel::new("custom-ack")),
        );
        let correlation_id = command.correlation_id().clone();

        let rx = gateway.submit(command).await.unwrap();
        gateway
            .deliver_response(&correlation_id, StatusCode::NO_CONTENT, BTreeMap::new(), None)
            .await;
        rx.await.unwrap()
    };

    let delivered = {
        let gateway = Gateway::new();
        let command = Command::new(
            CommandHeaders::new(Channel::Twin).request_ack(AckLabel::new("custom-ack")),
        );
        let correlation_id = command.correlation_id().clone();

        let rx = gateway.submit(command).await.unwrap();
        gateway
            .deliver_response(&correlation_id, StatusCode::NO_CONTENT, BTreeMap::new(), None)
            .await;
        gateway
            .deliver_ack(
                &correlation_id,
                Acknowledgement::timed_out(AckLabel::new("custom-ack")),
            )
            .await;
        rx.await.unwrap()
    };

    assert_eq!(timed_out, delivered);
}

#[tokio::test(start_paused = true)]
async fn test_single_label_timeout_passes_408_through() {
    // only the implicit label expected: the synthesized failure is the
    // pass-through result, not wrapped in an aggregate
    let gateway = Gateway::new();
    let command = Command::new(CommandHeaders::new(Channel::Twin));

    let rx = gateway.submit(command).await.unwrap();

    let response = rx.await.unwrap();
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(
        response.payload().unwrap()["error"],
        "acknowledgement.request.timeout"
    );
}

#[tokio::test(start_paused = true)]
async fn test_per_command_timeout_override() {
    let gateway = Gateway::with_config(
        EngineConfig::new().ack_timeout(Duration::from_secs(3600)),
    )
    .unwrap();
    let command = Command::new(
        CommandHeaders::new(Channel::Live).ack_timeout(Duration::from_millis(250)),
    );

    let started = tokio::time::Instant::now();
    let rx = gateway.submit(command).await.unwrap();
    let response = rx.await.unwrap();

    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    // resolved at the command's deadline, not the engine default
    assert!(started.elapsed() < Duration::from_secs(3600));
}

#[tokio::test]
async fn test_shutdown_times_out_all_open_sessions() {
    let gateway = Gateway::new();
    let mut receivers = Vec::new();

    for index in 0..5 {
        let command = Command::new(
            CommandHeaders::new(Channel::Twin).request_ack(AckLabel::new("custom-ack")),
        )
        .with_correlation_id(CorrelationId::new(format!("shutdown-{}", index)));
        receivers.push(gateway.submit(command).await.unwrap());
    }
    assert_eq!(gateway.in_flight(), 5);

    gateway.shutdown().await;

    for rx in receivers {
        let response = rx.await.unwrap();
        assert_eq!(response.status(), StatusCode::FAILED_DEPENDENCY);
        let body = response.payload().unwrap();
        assert_eq!(body["custom-ack"]["status"], 408);
        assert_eq!(body["twin-persisted"]["status"], 408);
    }
    assert_eq!(gateway.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_completion_cancels_the_deadline() {
    let gateway = Gateway::new();
    let command = Command::new(CommandHeaders::new(Channel::Twin));
    let correlation_id = command.correlation_id().clone();

    let rx = gateway.submit(command).await.unwrap();
    gateway
        .deliver_response(&correlation_id, StatusCode::NO_CONTENT, BTreeMap::new(), None)
        .await;

    let response = rx.await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // the deadline firing later must not produce a second result or leak
    // the session
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(gateway.in_flight(), 0);
}
