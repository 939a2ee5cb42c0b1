//! Integration tests for HTTP endpoints fed by a player.
//!
//! The transport side is simulated: a thread feeds `TransportEvent`s through
//! `EndpointTransportHandler`, the way an HTTP server would on request
//! arrival, while the test waits on lifecycle events.

use ice::candidate::{CandidateType, unmarshal_candidate};
use ice::classifier::{classify, configuration_directive};
use media_endpoint::event::bus::observer;
use media_endpoint::{
    EndpointConfiguration, EndpointConfigurationBuilder, EndpointKind, EndpointSessionState,
    EndpointTransportHandler, InMemoryPipeline, LifecycleEvent, LifecycleEventKind, MediaPipeline,
    TerminationReason, TransportEvent,
};
use sansio::Protocol;
use shared::error::Result;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);
const PLAYER_URI: &str = "http://files.example.com/video/small.webm";

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn player_kind() -> EndpointKind {
    EndpointKind::Player {
        uri: PLAYER_URI.to_owned(),
    }
}

#[test]
fn test_http_get_endpoint_url() -> Result<()> {
    init_log();

    let pipeline = MediaPipeline::new(InMemoryPipeline::new("127.0.0.1", 8888));
    let http = pipeline.create_endpoint(EndpointKind::HttpGet, &EndpointConfiguration::default())?;

    let url = pipeline.public_url(http.handle())?;
    assert!(!url.is_empty());
    assert!(url.starts_with("http://127.0.0.1:8888/"), "{url}");

    pipeline.close()?;
    Ok(())
}

#[test]
fn test_media_session_started_and_end_of_stream() -> Result<()> {
    init_log();

    let pipeline = MediaPipeline::new(InMemoryPipeline::new("127.0.0.1", 8888));
    let http_config = EndpointConfigurationBuilder::new()
        .with_terminate_on_eos(true)
        .build();
    let player = pipeline.create_endpoint(player_kind(), &EndpointConfiguration::default())?;
    let http = pipeline.create_endpoint(EndpointKind::HttpGet, &http_config)?;
    pipeline.connect(&player, &http)?;

    // start playing as soon as a client pulls from the http endpoint
    {
        let player_session = player.session().clone();
        http.session().register_observer(
            LifecycleEventKind::SessionStarted,
            observer(move |_| {
                player_session.notify_started()?;
                Ok(())
            }),
        );
    }

    let (tx, rx) = mpsc::channel::<LifecycleEvent>();
    for kind in [
        LifecycleEventKind::SessionStarted,
        LifecycleEventKind::EndOfStream,
        LifecycleEventKind::SessionTerminated,
    ] {
        let tx = tx.clone();
        http.session().register_observer(
            kind,
            observer(move |event| {
                tx.send(event.clone())?;
                Ok(())
            }),
        );
    }

    let mut http_transport =
        EndpointTransportHandler::new(http.session().clone(), http_config.clone())?;
    let player_session = player.session().clone();
    let client = thread::spawn(move || -> Result<()> {
        http_transport.handle_read(TransportEvent::RequestArrived)?;

        // the player runs through its file
        player_session.notify_data_flowing()?;
        player_session.notify_end_of_stream()?;
        Ok(())
    });

    let started = rx.recv_timeout(EVENT_TIMEOUT).expect("session started");
    assert_eq!(started.kind(), LifecycleEventKind::SessionStarted);

    let eos = rx.recv_timeout(EVENT_TIMEOUT).expect("end of stream");
    assert_eq!(eos.kind(), LifecycleEventKind::EndOfStream);
    assert_eq!(eos.session_id(), started.session_id());

    let terminated = rx.recv_timeout(EVENT_TIMEOUT).expect("session terminated");
    assert_eq!(terminated.reason(), Some(TerminationReason::Normal));
    assert_eq!(terminated.session_id(), started.session_id());
    assert!(started.timestamp() <= terminated.timestamp());

    client.join().expect("client thread")?;
    assert_eq!(http.session().state(), EndpointSessionState::Terminated);
    assert_eq!(player.session().state(), EndpointSessionState::Ending);

    pipeline.close()?;
    assert_eq!(player.session().state(), EndpointSessionState::Terminated);
    Ok(())
}

#[test]
fn test_release_endpoint_terminates_session() -> Result<()> {
    init_log();

    let pipeline = MediaPipeline::new(InMemoryPipeline::new("127.0.0.1", 8888));
    let http = pipeline.create_endpoint(EndpointKind::HttpGet, &EndpointConfiguration::default())?;

    let (tx, rx) = mpsc::channel::<LifecycleEvent>();
    http.session().register_observer(
        LifecycleEventKind::SessionTerminated,
        observer(move |event| {
            tx.send(event.clone())?;
            Ok(())
        }),
    );

    let mut http_transport =
        EndpointTransportHandler::new(http.session().clone(), EndpointConfiguration::default())?;
    http_transport.handle_read(TransportEvent::RequestArrived)?;
    http_transport.handle_read(TransportEvent::DataFlowing)?;

    let handle = http.handle();
    thread::spawn(move || pipeline.release(handle))
        .join()
        .expect("release thread")?;

    let terminated = rx.recv_timeout(EVENT_TIMEOUT).expect("session terminated");
    assert_eq!(terminated.reason(), Some(TerminationReason::Released));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    let err = http_transport
        .handle_read(TransportEvent::RequestArrived)
        .expect_err("released endpoint");
    assert_eq!(
        err,
        shared::error::Error::ErrEndpointReleased(http.session().name().to_owned())
    );

    Ok(())
}

#[test]
fn test_relay_candidate_needs_directive() -> Result<()> {
    init_log();

    let tests = vec![
        (
            "candidate:1 1 udp 2130706431 192.168.1.100 54321 typ host",
            CandidateType::Host,
            None,
        ),
        (
            "candidate:2 1 udp 1694498815 203.0.113.7 61000 typ srflx raddr 192.168.1.100 rport 54321",
            CandidateType::ServerReflexive,
            None,
        ),
        (
            "candidate:3 1 udp 16777215 198.51.100.10 3478 typ relay raddr 203.0.113.7 rport 61000",
            CandidateType::Relay,
            Some("setIceServers('turn:example.com', 'u', 'p');".to_owned()),
        ),
    ];

    for (raw, expected_type, expected_directive) in tests {
        let candidate = unmarshal_candidate(raw)?;
        let candidate_type = classify(&candidate)?;
        assert_eq!(candidate_type, expected_type, "testCase: {raw}");
        assert_eq!(
            configuration_directive(candidate_type, "turn:example.com", "u", "p"),
            expected_directive,
            "testCase: {raw}"
        );
    }

    Ok(())
}
