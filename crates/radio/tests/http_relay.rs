use std::time::Duration;

use tokio::net::TcpListener;

use sos_relay_core::{encode_status, ProtocolVersion, StatusPacket, StatusPacketV1};
use sos_relay_gateway::EventStore;
use sos_relay_radio::{
    DrainOutcome, HttpBackend, Interpretation, RadioConfig, RelayScheduler, SchedulerConfig,
    SimulatedRadio,
};

async fn start_gateway() -> (String, EventStore) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/api/events", listener.local_addr().unwrap());
    let gateway = EventStore::new();
    tokio::spawn(sos_relay_gateway::serve(listener, gateway.clone()));
    (url, gateway)
}

#[tokio::test]
async fn test_frame_reaches_gateway_as_flat_json() {
    let (url, gateway) = start_gateway().await;
    let (radio, link) = SimulatedRadio::new();
    let mut scheduler = RelayScheduler::start(
        radio,
        &RadioConfig::default(),
        HttpBackend::new(url).unwrap(),
        ProtocolVersion::V1,
        SchedulerConfig::default(),
    )
    .unwrap();

    link.transmit(encode_status(&StatusPacket::V1(StatusPacketV1 {
        packet_type: 1,
        handheld_id: 5,
        tower_id: 2,
        latitude: 377_749_000,
        longitude: -1_224_194_000,
        status: 1,
        msg_id: 42,
    })));

    let (interpretation, outcome) = scheduler.tick().await;
    assert_eq!(interpretation, Interpretation::Relayed { msg_id: 42, acked: true });
    assert_eq!(
        outcome,
        DrainOutcome::Delivered {
            msg_id: 42,
            attempts: 1,
            status: 201
        }
    );

    let events = gateway.events().await;
    assert_eq!(events.len(), 1);
    let fields = &events[0].fields;
    assert_eq!(fields["msg_id"], 42);
    assert_eq!(fields["type"], 1);
    assert_eq!(fields["handheld_id"], 5);
    assert_eq!(fields["tower_id"], 2);
    assert_eq!(fields["status"], 1);
    assert_eq!(fields["status_str"], "EMERGENCY / CRITICAL");
    assert!((fields["lat"].as_f64().unwrap() - 37.7749).abs() < 1e-7);
    assert!(fields["timestamp"].is_string());
    assert_eq!(link.take_acks(), vec![(1, vec![1, 42, 0])]);
}

#[tokio::test]
async fn test_unreachable_backend_requeues() {
    // Bind then drop to get a loopback port with nothing listening.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let (radio, link) = SimulatedRadio::new();
    let config = SchedulerConfig {
        retry: sos_relay_radio::RetryPolicy {
            max_attempts: 2,
            attempt_timeout: Duration::from_secs(1),
            retry_delay: Duration::from_millis(10),
        },
        ..Default::default()
    };
    let mut scheduler = RelayScheduler::start(
        radio,
        &RadioConfig::default(),
        HttpBackend::new(format!("http://127.0.0.1:{port}/api/events")).unwrap(),
        ProtocolVersion::V1,
        config,
    )
    .unwrap();

    link.transmit(encode_status(&StatusPacket::V1(StatusPacketV1 {
        packet_type: 1,
        handheld_id: 1,
        tower_id: 1,
        latitude: 0,
        longitude: 0,
        status: 2,
        msg_id: 8,
    })));

    let (_, outcome) = scheduler.tick().await;
    assert_eq!(outcome, DrainOutcome::Requeued { msg_id: 8, attempts: 2 });
    assert_eq!(scheduler.queue().len(), 1);
    assert_eq!(link.take_acks().len(), 1);
}
