use agvmon::decode::{encode, WORD_WIDTH};
use agvmon::server::{decode_event, serve};
use agvmon::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn agv(id: CommunicationId, battery: u16) -> AgvRecord {
    let mut record = AgvRecord::new(id);
    record.enable_raw = Some(1);
    record.battery_raw = encode(battery, WORD_WIDTH);
    record
}

async fn start(store: Arc<FixtureStore>) -> (Arc<Monitor>, std::net::SocketAddr) {
    let monitor = Arc::new(Monitor::new(store, Duration::from_millis(3000), Duration::from_millis(2000)));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::clone(&monitor)));
    (monitor, addr)
}

async fn wait_for_subscribers(monitor: &Monitor, count: usize) {
    timeout(WAIT, async {
        while monitor.hub().subscriber_count() != count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_viewer_receives_snapshot_on_connect_and_on_change() {
    let store = Arc::new(FixtureStore::new(vec![agv(1, 80)]));
    let (monitor, addr) = start(store.clone()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let mut lines = BufReader::new(stream).lines();

    // Connecting triggers the first poll
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    assert!(line.starts_with(r#"{"event":"agvData","data":["#));
    let first = decode_event(&line).unwrap();
    assert_eq!(first.find(1).unwrap().battery_raw, encode(80, WORD_WIDTH));

    store.set_rows(vec![agv(1, 79), agv(2, 50)]);
    assert_eq!(monitor.tick().await, TickOutcome::Published(1));

    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    let second = decode_event(&line).unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second.find(1).unwrap().battery_raw, encode(79, WORD_WIDTH));
}

#[tokio::test]
async fn test_viewer_input_is_ignored_and_disconnect_unsubscribes() {
    let store = Arc::new(FixtureStore::new(vec![agv(1, 80)]));
    let (monitor, addr) = start(store.clone()).await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    wait_for_subscribers(&monitor, 1).await;

    writer.write_all(b"{\"command\":\"stop\"}\n").await.unwrap();
    store.set_rows(vec![agv(1, 10)]);
    monitor.tick().await;
    let line = timeout(WAIT, lines.next_line()).await.unwrap().unwrap().unwrap();
    assert!(decode_event(&line).is_ok());

    writer.shutdown().await.unwrap();
    drop(writer);
    wait_for_subscribers(&monitor, 0).await;
    assert_eq!(store.query_count(), 2);
}

#[tokio::test]
async fn test_two_viewers_get_identical_streams() {
    let store = Arc::new(FixtureStore::new(vec![agv(1, 90)]));
    let (monitor, addr) = start(store.clone()).await;

    let mut a = BufReader::new(TcpStream::connect(addr).await.unwrap()).lines();
    let mut b = BufReader::new(TcpStream::connect(addr).await.unwrap()).lines();
    wait_for_subscribers(&monitor, 2).await;

    for battery in [70, 50] {
        store.set_rows(vec![agv(1, battery)]);
        monitor.tick().await;
    }

    let mut seen_a = Vec::new();
    let mut seen_b = Vec::new();
    for _ in 0..3 {
        seen_a.push(timeout(WAIT, a.next_line()).await.unwrap().unwrap().unwrap());
        seen_b.push(timeout(WAIT, b.next_line()).await.unwrap().unwrap().unwrap());
    }
    assert_eq!(seen_a, seen_b);

    let last = decode_event(&seen_a[2]).unwrap();
    assert_eq!(last.find(1).unwrap().battery_raw, encode(50, WORD_WIDTH));
}
