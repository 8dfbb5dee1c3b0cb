use fanlog::test_support::{RecordingDiagnostics, RecordingTransport};
use fanlog::{DiagnosticEvent, Level, Log};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn delivery_matches_rank_comparison_for_every_level_pair() {
    for min in Level::ALL {
        let log = Log::new();
        let transport = RecordingTransport::new("probe", min);
        log.add_transport(transport.clone());

        for entry_level in Level::ALL {
            log.log(entry_level.as_str(), "probe", None).await.unwrap();
        }

        let delivered: Vec<Level> = transport
            .entries()
            .into_iter()
            .map(|entry| entry.level)
            .collect();
        let expected: Vec<Level> = Level::ALL
            .into_iter()
            .filter(|level| level.rank() <= min.rank())
            .collect();
        assert_eq!(delivered, expected, "min level {min}");
    }
}

#[tokio::test]
async fn unknown_level_fails_synchronously_and_nothing_is_delivered() {
    let log = Log::new();
    let transport = RecordingTransport::new("probe", Level::Debug);
    log.add_transport(transport.clone());

    assert!(log.log("trace", "never seen", None).await.is_err());
    assert!(transport.entries().is_empty());
}

#[tokio::test]
async fn one_rejecting_transport_never_affects_its_siblings() {
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let log = Log::with_diagnostics(diagnostics.clone());

    let broken = RecordingTransport::new("broken", Level::Debug);
    broken.set_should_fail(true);
    let healthy = RecordingTransport::new("healthy", Level::Debug);
    log.add_transport(broken);
    log.add_transport(healthy.clone());

    log.log("info", "delivered anyway", Some(json!({"attempt": 1})))
        .await
        .unwrap();

    assert_eq!(healthy.entries().len(), 1);
    assert_eq!(healthy.entries()[0].message, "delivered anyway");
    assert!(diagnostics.events().iter().any(|event| matches!(
        event,
        DiagnosticEvent::WriteFailed { transport, .. } if transport == "broken"
    )));
}

#[tokio::test]
async fn removed_transports_stop_receiving_subsequent_entries() {
    let log = Log::new();
    let doomed = RecordingTransport::new("doomed", Level::Debug);
    let survivor = RecordingTransport::new("survivor", Level::Debug);
    log.add_transport(doomed.clone());
    log.add_transport(survivor.clone());

    log.log("info", "both", None).await.unwrap();
    log.remove_transport_by_name("doomed");
    log.log("info", "one", None).await.unwrap();

    assert_eq!(doomed.entries().len(), 1);
    assert_eq!(survivor.entries().len(), 2);
}

#[tokio::test]
async fn entries_carry_a_parseable_timestamp_and_the_meta_payload() {
    let log = Log::new();
    let transport = RecordingTransport::new("probe", Level::Debug);
    log.add_transport(transport.clone());

    log.log("warn", "queue depth high", Some(json!({"depth": 512})))
        .await
        .unwrap();

    let entry = &transport.entries()[0];
    assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    assert_eq!(entry.meta, Some(json!({"depth": 512})));
}
