//! Pipeline Integration Tests
//!
//! Real sockets end to end: sensor clients -> IngestionListener -> DroneState
//! -> ForwardScheduler -> TcpCollectorSink -> CollectorListener. Ports are
//! ephemeral; forward ticks are driven by hand.

use drone_edge::acquisition::IngestionListener;
use drone_edge::collector::{CollectorListener, ReceivedBatch};
use drone_edge::forwarding::{ForwardOutcome, ForwardScheduler, TcpCollectorSink};
use drone_edge::pipeline::{DroneState, StateSettings};
use drone_edge::types::{OperatingMode, Reading};

use chrono::Utc;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const SEND_TIMEOUT: Duration = Duration::from_secs(2);

struct Harness {
    state: Arc<DroneState>,
    sensor_addr: SocketAddr,
    cancel: CancellationToken,
}

impl Harness {
    async fn start(window_capacity: usize, threshold: f64) -> Self {
        let state = Arc::new(DroneState::new(StateSettings {
            window_capacity,
            battery_threshold: threshold,
            ..StateSettings::default()
        }));
        let listener = IngestionListener::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let sensor_addr = listener.local_addr();
        let cancel = CancellationToken::new();
        tokio::spawn(listener.run(Arc::clone(&state), cancel.clone()));
        Self {
            state,
            sensor_addr,
            cancel,
        }
    }

    async fn wait_for_readings(&self, n: u64) {
        for _ in 0..300 {
            if self.state.counters().readings_ingested >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "only {} of {n} readings ingested",
            self.state.counters().readings_ingested
        );
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn start_collector(addr: SocketAddr) -> (mpsc::Receiver<ReceivedBatch>, CancellationToken) {
    let collector = CollectorListener::bind(addr).await.unwrap();
    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    tokio::spawn(collector.run(tx, cancel.clone()));
    (rx, cancel)
}

fn reading_line(n: usize, temperature: f64, humidity: f64) -> String {
    format!(
        "{{\"sensor_id\": \"sensor_{n}\", \"temperature\": {temperature}, \"humidity\": {humidity}, \"timestamp\": \"2025-03-14T09:00:{:02}+00:00\"}}\n",
        n % 60
    )
}

async fn free_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn twelve_readings_window_of_ten() {
    let harness = Harness::start(10, 20.0).await;
    let mut sensor = TcpStream::connect(harness.sensor_addr).await.unwrap();

    sensor.write_all(reading_line(1, 100.0, 50.0).as_bytes()).await.unwrap();
    for n in 2..=12 {
        let line = reading_line(n, 20.0 + n as f64, 40.0 + n as f64);
        sensor.write_all(line.as_bytes()).await.unwrap();
    }
    harness.wait_for_readings(12).await;

    let window = harness.state.window_snapshot();
    assert_eq!(window.len(), 10);
    assert!(window.iter().all(|r| r.sensor_id != "sensor_1" && r.sensor_id != "sensor_2"));

    let anomalies = harness.state.recent_anomalies(usize::MAX);
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0].reading.sensor_id, "sensor_1");

    let (avg_temp, avg_humid) = harness.state.current_average();
    assert!((avg_temp - 27.5).abs() < 1e-9);
    assert!((avg_humid - 47.5).abs() < 1e-9);
}

#[tokio::test]
async fn readings_are_forwarded_to_the_collector() {
    let harness = Harness::start(10, 20.0).await;
    let collector_addr = free_addr().await;
    let (mut batches, collector_cancel) = start_collector(collector_addr).await;

    let mut sensor = TcpStream::connect(harness.sensor_addr).await.unwrap();
    sensor.write_all(reading_line(1, 20.0, 40.0).as_bytes()).await.unwrap();
    sensor.write_all(b"{broken\n").await.unwrap();
    sensor.write_all(reading_line(2, 61.0, 42.0).as_bytes()).await.unwrap();
    harness.wait_for_readings(2).await;

    let scheduler = ForwardScheduler::new(
        Arc::clone(&harness.state),
        TcpCollectorSink::new(collector_addr, SEND_TIMEOUT),
    );
    assert_eq!(scheduler.tick().await, ForwardOutcome::Sent(3));
    assert_eq!(harness.state.forward_queue_len(), 0);

    let received = tokio::time::timeout(Duration::from_secs(5), batches.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.summaries.len(), 2);
    assert_eq!(received.anomalies.len(), 1);
    assert_eq!(received.anomalies[0].reading.temperature, 61.0);
    assert_eq!(received.summaries[0].avg_temp, 20.0);
    assert_eq!(received.summaries[1].avg_temp, 40.5);
    assert_eq!(harness.state.counters().malformed_records, 1);

    collector_cancel.cancel();
}

#[tokio::test]
async fn unreachable_collector_keeps_queue_until_it_returns() {
    let harness = Harness::start(10, 20.0).await;
    let collector_addr = free_addr().await;
    let scheduler = ForwardScheduler::new(
        Arc::clone(&harness.state),
        TcpCollectorSink::new(collector_addr, SEND_TIMEOUT),
    );

    let mut sensor = TcpStream::connect(harness.sensor_addr).await.unwrap();
    sensor.write_all(reading_line(1, 20.0, 40.0).as_bytes()).await.unwrap();
    harness.wait_for_readings(1).await;

    let before = harness.state.forward_queue_snapshot();
    assert_eq!(scheduler.tick().await, ForwardOutcome::Failed);
    assert_eq!(harness.state.forward_queue_snapshot(), before);

    sensor.write_all(reading_line(2, 22.0, 42.0).as_bytes()).await.unwrap();
    harness.wait_for_readings(2).await;
    assert_eq!(scheduler.tick().await, ForwardOutcome::Failed);
    assert_eq!(harness.state.forward_queue_len(), 2);

    let (mut batches, collector_cancel) = start_collector(collector_addr).await;
    assert_eq!(scheduler.tick().await, ForwardOutcome::Sent(2));
    let received = tokio::time::timeout(Duration::from_secs(5), batches.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.summaries.len(), 2);
    assert_eq!(harness.state.counters().forward_failures, 2);

    collector_cancel.cancel();
}

#[tokio::test]
async fn stalled_collector_fails_the_tick_and_keeps_the_queue() {
    let state = Arc::new(DroneState::new(StateSettings::default()));
    for n in 0..300_000 {
        state.ingest(Reading {
            sensor_id: format!("sensor_{}", n % 8),
            temperature: 21.0,
            humidity: 45.0,
            timestamp: Utc::now(),
        });
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let collector_addr = listener.local_addr().unwrap();
    let holder = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
    });

    let scheduler = ForwardScheduler::new(
        Arc::clone(&state),
        TcpCollectorSink::new(collector_addr, Duration::from_millis(300)),
    );
    let before = state.forward_queue_snapshot();
    assert_eq!(scheduler.tick().await, ForwardOutcome::Failed);
    assert_eq!(state.forward_queue_snapshot(), before);
    assert_eq!(state.counters().forward_failures, 1);
    assert_eq!(state.counters().batches_forwarded, 0);

    holder.abort();
}

#[tokio::test]
async fn returning_drone_ingests_but_never_sends() {
    let harness = Harness::start(10, 99.5).await;
    let collector_addr = free_addr().await;
    let (mut batches, collector_cancel) = start_collector(collector_addr).await;
    let scheduler = ForwardScheduler::new(
        Arc::clone(&harness.state),
        TcpCollectorSink::new(collector_addr, SEND_TIMEOUT),
    );

    harness.state.battery_tick(0.5);
    assert_eq!(harness.state.mode(), OperatingMode::Returning);

    let mut sensor = TcpStream::connect(harness.sensor_addr).await.unwrap();
    for n in 1..=3 {
        sensor.write_all(reading_line(n, 20.0, 40.0).as_bytes()).await.unwrap();
    }
    harness.wait_for_readings(3).await;

    assert_eq!(scheduler.tick().await, ForwardOutcome::Suppressed);
    assert_eq!(harness.state.forward_queue_len(), 3);
    assert!(batches.try_recv().is_err());

    // Reset resumes forwarding with everything accumulated meanwhile
    harness.state.reset_battery();
    assert_eq!(scheduler.tick().await, ForwardOutcome::Sent(3));
    let received = tokio::time::timeout(Duration::from_secs(5), batches.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.len(), 3);

    collector_cancel.cancel();
}

#[tokio::test]
async fn many_sensors_in_parallel() {
    let harness = Harness::start(1_000, 20.0).await;

    let mut clients = Vec::new();
    for sensor in 0..8 {
        let addr = harness.sensor_addr;
        clients.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            for n in 0..25 {
                let line = reading_line(sensor * 100 + n, 21.0, 45.0);
                stream.write_all(line.as_bytes()).await.unwrap();
            }
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    harness.wait_for_readings(200).await;
    assert_eq!(harness.state.window_snapshot().len(), 200);
    assert_eq!(harness.state.current_average(), (21.0, 45.0));
    assert_eq!(harness.state.counters().connections_total, 8);
}
